use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::grid::{Field2, Field3, RomsGrid, round_index};
use crate::time::TimeArrow;
use crate::types::GridPos;
use crate::vertical::{SCoordinate, zeta_correction};

use super::{Dataset, DatasetError, HydroRecord, RecordSource};

/// One record with its derived vertical fields.
#[derive(Clone, Debug)]
struct Snapshot {
    record: HydroRecord,
    /// w-level depths with the free surface, `nz + 1` levels.
    z_w: Field3<f64>,
    /// Vertical velocity at w levels (m/s).
    w: Field3<f64>,
}

/// ROMS dataset interpolating between the two records bracketing the
/// current time.
///
/// Works for 3-D outputs (with an [`SCoordinate`]) and depth-averaged 2-D
/// outputs (`nz = 1`, no vertical velocity).
pub struct RomsDataset<S> {
    source: S,
    grid: RomsGrid,
    sc: Option<SCoordinate>,
    nz: usize,
    subdomain: Option<(usize, usize, usize, usize)>,
    z_r_cst: Field3<f64>,
    z_w_cst: Field3<f64>,
    required: BTreeSet<String>,
    record_times: Vec<f64>,
    arrow: TimeArrow,
    /// Rank of the tp1 record.
    rank: usize,
    dt_hymo: f64,
    tp0: Option<Snapshot>,
    tp1: Option<Snapshot>,
}

impl<S: RecordSource> RomsDataset<S> {
    pub fn new(source: S) -> Result<Self, DatasetError> {
        let grid = source.grid()?;
        Self::build(source, grid, None)
    }

    /// Dataset restricted to the rho window `[ipo, ipo + nx) x [jpo, jpo + ny)`.
    pub fn with_subdomain(source: S, ipo: usize, jpo: usize, nx: usize, ny: usize) -> Result<Self, DatasetError> {
        let grid = source.grid()?.crop(ipo, jpo, nx, ny)?;
        Self::build(source, grid, Some((ipo, jpo, nx, ny)))
    }

    /// Dataset restricted to the window spanned by two `(lon, lat)` corners.
    pub fn with_range(source: S, p1: (f64, f64), p2: (f64, f64)) -> Result<Self, DatasetError> {
        let (ipo, jpo, nx, ny) = source.grid()?.subdomain(p1, p2)?;
        Self::with_subdomain(source, ipo, jpo, nx, ny)
    }

    fn build(source: S, grid: RomsGrid, subdomain: Option<(usize, usize, usize, usize)>) -> Result<Self, DatasetError> {
        let sc = source.s_coordinate()?;
        let nz = sc.as_ref().map_or(1, |s| s.nz());
        let (nx, ny) = (grid.nx(), grid.ny());

        let z_r_cst = Field3::from_fn(nx, ny, nz, |i, j, k| match &sc {
            Some(s) => s.z0_r(k, grid.h(i, j)),
            None => -0.5 * grid.h(i, j),
        });
        let z_w_cst = Field3::from_fn(nx, ny, nz + 1, |i, j, k| match &sc {
            Some(s) => s.z0_w(k, grid.h(i, j)),
            None => {
                if k == 0 {
                    -grid.h(i, j)
                } else {
                    0.0
                }
            }
        });

        info!(
            nx,
            ny,
            nz,
            water_points = grid.n_water_points(),
            extent = %grid.geo_bounds(),
            source = %source.describe(),
            "ROMS dataset opened"
        );

        Ok(Self {
            source,
            grid,
            sc,
            nz,
            subdomain,
            z_r_cst,
            z_w_cst,
            required: BTreeSet::new(),
            record_times: Vec::new(),
            arrow: TimeArrow::Forward,
            rank: 0,
            dt_hymo: 0.0,
            tp0: None,
            tp1: None,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn s_coordinate(&self) -> Option<&SCoordinate> {
        self.sc.as_ref()
    }

    /// Rank of the record ahead of the current time.
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn required_variables(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str)
    }

    /// Vertical velocity (m/s) at w level `k` of the tp1 record.
    pub fn w_tp1(&self, i: usize, j: usize, k: usize) -> Option<f64> {
        self.tp1.as_ref().map(|s| s.w.get(i, j, k))
    }

    // =========================================================================
    // Record reading
    // =========================================================================

    fn read(&self, rank: usize) -> Result<Snapshot, DatasetError> {
        let tracers: Vec<String> = self.required.iter().cloned().collect();
        let mut record = self.source.read_record(rank, &tracers)?;
        if let Some((ipo, jpo, nx, ny)) = self.subdomain {
            record = record.crop(ipo, jpo, nx, ny)?;
        }
        record.validate(self.grid.nx(), self.grid.ny(), self.nz)?;

        let z_w = self.sig_levels(record.zeta.as_ref());
        let w = if self.is_3d() {
            self.compute_w(&record, &z_w)
        } else {
            Field3::filled(self.grid.nx(), self.grid.ny(), self.nz + 1, 0.0)
        };
        Ok(Snapshot { record, z_w, w })
    }

    /// w-level depths with the free-surface correction.
    fn sig_levels(&self, zeta: Option<&Field2<f32>>) -> Field3<f64> {
        let (nx, ny) = (self.grid.nx(), self.grid.ny());
        Field3::from_fn(nx, ny, self.nz + 1, |i, j, k| {
            let z0 = self.z_w_cst.get(i, j, k);
            match zeta {
                Some(z) => zeta_correction(z0, z.get(i, j), self.grid.h(i, j)),
                None => z0,
            }
        })
    }

    /// Vertical velocity from the continuity equation.
    fn compute_w(&self, record: &HydroRecord, z_w: &Field3<f64>) -> Field3<f64> {
        let g = &self.grid;
        let (nx, ny, nz) = (g.nx(), g.ny(), self.nz);
        let dz = |i: usize, j: usize, k: usize| z_w.get(i, j, k + 1) - z_w.get(i, j, k);

        // Horizontal volume fluxes through the west (huon) and south (hvom)
        // faces of each rho cell.
        let mut huon = Field3::filled(nx, ny, nz, 0.0f64);
        let mut hvom = Field3::filled(nx, ny, nz, 0.0f64);
        for k in 0..nz {
            for j in 0..ny {
                for i in 1..nx {
                    let flux = (dz(i, j, k) + dz(i - 1, j, k)) / (g.pn(i, j) + g.pn(i - 1, j))
                        * record.u.get(i - 1, j, k) as f64;
                    huon.set(i, j, k, if flux.is_nan() { 0.0 } else { flux });
                }
            }
            for j in 1..ny {
                for i in 0..nx {
                    let flux = (dz(i, j, k) + dz(i, j - 1, k)) / (g.pm(i, j) + g.pm(i, j - 1))
                        * record.v.get(i, j - 1, k) as f64;
                    hvom.set(i, j, k, if flux.is_nan() { 0.0 } else { flux });
                }
            }
        }

        let mut w = Field3::filled(nx, ny, nz + 1, 0.0f64);
        let mut wrk = vec![0.0; nx];
        for j in 0..ny - 1 {
            for k in 1..=nz {
                for i in 0..nx - 1 {
                    let div = huon.get(i, j, k - 1) - huon.get(i + 1, j, k - 1) + hvom.get(i, j, k - 1)
                        - hvom.get(i, j + 1, k - 1);
                    w.set(i, j, k, w.get(i, j, k - 1) + div);
                }
            }
            // Remove the surface flux linearly over the column
            for (i, wr) in wrk.iter_mut().enumerate() {
                *wr = w.get(i, j, nz) / (z_w.get(i, j, nz) - z_w.get(i, j, 0));
            }
            for k in 1..nz {
                for i in 0..nx {
                    let corrected = w.get(i, j, k) - wrk[i] * (z_w.get(i, j, k) - z_w.get(i, j, 0));
                    w.set(i, j, k, corrected);
                }
            }
            for i in 0..nx {
                w.set(i, j, nz, 0.0);
            }
        }

        for k in 0..=nz {
            for j in 0..ny {
                w.set(0, j, k, w.get(1, j, k));
                w.set(nx - 1, j, k, w.get(nx - 2, j, k));
            }
            for i in 0..nx {
                w.set(i, 0, k, w.get(i, 1, k));
                w.set(i, ny - 1, k, w.get(i, ny - 2, k));
            }
        }

        for k in 0..=nz {
            for j in 0..ny {
                for i in 0..nx {
                    let wv = w.get(i, j, k) * g.pm(i, j) * g.pn(i, j);
                    w.set(i, j, k, if wv.is_finite() { wv } else { 0.0 });
                }
            }
        }
        w
    }

    // =========================================================================
    // Interpolation helpers
    // =========================================================================

    fn snapshots(&self) -> Option<(&Snapshot, &Snapshot)> {
        Some((self.tp0.as_ref()?, self.tp1.as_ref()?))
    }

    /// Weight of the tp1 record at `time`.
    #[inline]
    fn time_weight(&self, time: f64) -> f64 {
        let tp1 = self.time_tp1();
        (self.dt_hymo - (tp1 - time).abs()) / self.dt_hymo
    }

    /// `(k, dz, number of levels in the stencil)` for a fractional level.
    #[inline]
    fn vertical_stencil(&self, z: f64, round: bool) -> (isize, f64, usize) {
        if self.nz < 2 {
            return (0, 0.0, 1);
        }
        let kz = z.clamp(0.0, self.nz as f64 - 1.00001);
        let k = if round { round_index(kz) } else { kz.floor() as isize };
        (k, kz - k as f64, 2)
    }

    #[inline]
    fn pm_at(&self, i: isize, j: isize) -> f64 {
        let (i, j) = self.grid.clamp_index(i, j);
        self.grid.pm(i, j)
    }

    #[inline]
    fn pn_at(&self, i: isize, j: isize) -> f64 {
        let (i, j) = self.grid.clamp_index(i, j);
        self.grid.pn(i, j)
    }

    /// Free surface of the tp0 record at a rho point.
    #[inline]
    fn zeta0(&self, i: usize, j: usize) -> f32 {
        self.tp0
            .as_ref()
            .and_then(|s| s.record.zeta.as_ref())
            .map_or(0.0, |z| z.get(i, j))
    }

    /// Bilinear depth of rho level `k` over the surrounding water points.
    fn get_depth(&self, x: f64, y: f64, k: usize) -> f64 {
        let i = x.floor() as isize;
        let j = y.floor() as isize;
        let dx = x - i as f64;
        let dy = y - j as f64;
        let mut hh = 0.0;
        for ii in 0..2 {
            for jj in 0..2 {
                if self.grid.is_in_water(i + ii, j + jj) {
                    let co = ((1.0 - ii as f64 - dx) * (1.0 - jj as f64 - dy)).abs();
                    let (iu, ju) = ((i + ii) as usize, (j + jj) as usize);
                    hh += co * self.level_depth(iu, ju, k);
                }
            }
        }
        hh
    }

    fn tracer_fields(&self, name: &str) -> Result<(&Field3<f32>, &Field3<f32>), DatasetError> {
        let (tp0, tp1) = self.snapshots().ok_or(DatasetError::NotSetUp)?;
        let f0 = tp0.record.tracers.get(name);
        let f1 = tp1.record.tracers.get(name);
        match (f0, f1) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(DatasetError::VariableNotLoaded(name.to_string())),
        }
    }
}

impl<S: RecordSource> Dataset for RomsDataset<S> {
    fn grid(&self) -> &RomsGrid {
        &self.grid
    }

    fn nz(&self) -> usize {
        self.nz
    }

    fn is_3d(&self) -> bool {
        self.sc.is_some()
    }

    fn depth2z(&self, x: f64, y: f64, depth: f64) -> f64 {
        if !self.is_3d() {
            return 0.0;
        }
        let mut lk = self.nz - 1;
        while lk > 0 && self.get_depth(x, y, lk) > depth {
            lk -= 1;
        }
        if lk == self.nz - 1 {
            lk as f64
        } else {
            let pr = self.get_depth(x, y, lk);
            (lk as f64 + (depth - pr) / (self.get_depth(x, y, lk + 1) - pr)).max(0.0)
        }
    }

    fn z2depth(&self, x: f64, y: f64, z: f64) -> f64 {
        if !self.is_3d() {
            return f64::NAN;
        }
        let kz = z.clamp(0.0, self.nz as f64 - 1.00001);
        let i = x.floor() as isize;
        let j = y.floor() as isize;
        let k = kz.floor() as usize;
        let dx = x - i as f64;
        let dy = y - j as f64;
        let dz = kz - k as f64;

        let mut depth = 0.0;
        for ii in 0..2 {
            for jj in 0..2 {
                if !self.grid.is_in_water(i + ii, j + jj) {
                    continue;
                }
                let (iu, ju) = ((i + ii) as usize, (j + jj) as usize);
                for kk in 0..2 {
                    let co = ((1.0 - ii as f64 - dx) * (1.0 - jj as f64 - dy) * (1.0 - kk as f64 - dz)).abs();
                    depth += co * self.level_depth(iu, ju, k + kk);
                }
            }
        }
        depth
    }

    fn level_depth(&self, i: usize, j: usize, k: usize) -> f64 {
        zeta_correction(self.z_r_cst.get(i, j, k), self.zeta0(i, j), self.grid.h(i, j))
    }

    fn get_dux(&self, p: GridPos, time: f64) -> f64 {
        let Some((tp0, tp1)) = self.snapshots() else {
            return 0.0;
        };
        let n = if self.grid.is_close_to_coast(p.x, p.y) { 1 } else { 2 };
        let x_euler = self.time_weight(time);
        let i = round_index(p.x);
        let j = if n == 1 { round_index(p.y) } else { p.y.floor() as isize };
        let (k, dz, nk) = self.vertical_stencil(p.z, false);
        let dx = p.x - i as f64;
        let dy = p.y - j as f64;

        let mut du = 0.0;
        let mut co_sum = 0.0;
        for ii in 0..2isize {
            for jj in 0..n {
                for kk in 0..nk as isize {
                    let co = ((0.5 - ii as f64 - dx) * (1.0 - jj as f64 - dy) * (1.0 - kk as f64 - dz)).abs();
                    co_sum += co;
                    let (iu, ju, ku) = (i + ii - 1, j + jj, k + kk);
                    let (Some(u0), Some(u1)) = (tp0.record.u.checked(iu, ju, ku), tp1.record.u.checked(iu, ju, ku))
                    else {
                        continue;
                    };
                    if u0.is_nan() {
                        continue;
                    }
                    let u = (1.0 - x_euler) * u0 as f64 + x_euler * u1 as f64;
                    du += 0.5 * u * co * (self.pm_at((i + ii - 1).max(0), ju) + self.pm_at(i + ii, ju));
                }
            }
        }
        if co_sum != 0.0 { du / co_sum } else { du }
    }

    fn get_dvy(&self, p: GridPos, time: f64) -> f64 {
        let Some((tp0, tp1)) = self.snapshots() else {
            return 0.0;
        };
        let n = if self.grid.is_close_to_coast(p.x, p.y) { 1 } else { 2 };
        let x_euler = self.time_weight(time);
        let i = if n == 1 { round_index(p.x) } else { p.x.floor() as isize };
        let j = round_index(p.y);
        let (k, dz, nk) = self.vertical_stencil(p.z, false);
        let dx = p.x - i as f64;
        let dy = p.y - j as f64;

        let mut dv = 0.0;
        let mut co_sum = 0.0;
        for kk in 0..nk as isize {
            for jj in 0..2isize {
                for ii in 0..n {
                    let co = ((1.0 - ii as f64 - dx) * (0.5 - jj as f64 - dy) * (1.0 - kk as f64 - dz)).abs();
                    co_sum += co;
                    let (iv, jv, kv) = (i + ii, j + jj - 1, k + kk);
                    let (Some(v0), Some(v1)) = (tp0.record.v.checked(iv, jv, kv), tp1.record.v.checked(iv, jv, kv))
                    else {
                        continue;
                    };
                    if v0.is_nan() {
                        continue;
                    }
                    let v = (1.0 - x_euler) * v0 as f64 + x_euler * v1 as f64;
                    dv += 0.5 * v * co * (self.pn_at(iv, (j + jj - 1).max(0)) + self.pn_at(iv, j + jj));
                }
            }
        }
        if co_sum != 0.0 { dv / co_sum } else { dv }
    }

    fn get_dwz(&self, p: GridPos, time: f64) -> f64 {
        if !self.is_3d() {
            return 0.0;
        }
        let Some((tp0, tp1)) = self.snapshots() else {
            return 0.0;
        };
        let nz = self.nz as isize;
        let n = if self.grid.is_close_to_coast(p.x, p.y) { 1 } else { 2 };
        let x_euler = self.time_weight(time);
        let i = if n == 1 { round_index(p.x) } else { p.x.floor() as isize };
        let j = if n == 1 { round_index(p.y) } else { p.y.floor() as isize };
        let (k, dz, _) = self.vertical_stencil(p.z, true);
        let dx = p.x - i as f64;
        let dy = p.y - j as f64;

        let mut dw = 0.0;
        let mut co_sum = 0.0;
        for ii in 0..n {
            for jj in 0..n {
                for kk in 0..2isize {
                    let co = ((1.0 - ii as f64 - dx) * (1.0 - jj as f64 - dy) * (0.5 - kk as f64 - dz)).abs();
                    co_sum += co;
                    let (iw, jw, kw) = (i + ii, j + jj, k + kk);
                    let (Some(w0), Some(w1)) = (tp0.w.checked(iw, jw, kw), tp1.w.checked(iw, jw, kw)) else {
                        continue;
                    };
                    let w = (1.0 - x_euler) * w0 + x_euler * w1;
                    let z_top = tp0.z_w.checked(iw, jw, (kw + 1).min(nz));
                    let z_bot = tp0.z_w.checked(iw, jw, (kw - 1).max(0));
                    if let (Some(top), Some(bot)) = (z_top, z_bot) {
                        let thickness = top - bot;
                        if thickness != 0.0 {
                            dw += 2.0 * w * co / thickness;
                        }
                    }
                }
            }
        }
        if co_sum != 0.0 { dw / co_sum } else { dw }
    }

    fn get(&self, name: &str, p: GridPos, time: f64) -> Result<f64, DatasetError> {
        let (f0, f1) = self.tracer_fields(name)?;
        let x_euler = self.time_weight(time);
        let n = if self.grid.is_close_to_coast(p.x, p.y) { 1 } else { 2 };
        let i = if n == 1 { round_index(p.x) } else { p.x.floor() as isize };
        let j = if n == 1 { round_index(p.y) } else { p.y.floor() as isize };
        let (k, dz, nk) = if f0.nz() > 1 {
            self.vertical_stencil(p.z, false)
        } else {
            (0, 0.0, 1)
        };
        let dx = p.x - i as f64;
        let dy = p.y - j as f64;

        let mut value = 0.0;
        let mut co_sum = 0.0;
        for kk in 0..nk as isize {
            for jj in 0..n {
                for ii in 0..n {
                    if !self.grid.is_in_water(i + ii, j + jj) {
                        continue;
                    }
                    let (Some(v0), Some(v1)) = (f0.checked(i + ii, j + jj, k + kk), f1.checked(i + ii, j + jj, k + kk))
                    else {
                        continue;
                    };
                    if v0.is_nan() || v1.is_nan() {
                        continue;
                    }
                    let co = ((1.0 - ii as f64 - dx) * (1.0 - jj as f64 - dy) * (1.0 - kk as f64 - dz)).abs();
                    value += co * ((1.0 - x_euler) * v0 as f64 + x_euler * v1 as f64);
                    co_sum += co;
                }
            }
        }
        Ok(if co_sum > 0.0 { value / co_sum } else { f64::NAN })
    }

    fn column(&self, name: &str, i: usize, j: usize, time: f64) -> Result<Vec<f64>, DatasetError> {
        let (f0, f1) = self.tracer_fields(name)?;
        let (i, j) = self.grid.clamp_index(i as isize, j as isize);
        let x_euler = self.time_weight(time);
        Ok((0..f0.nz())
            .map(|k| (1.0 - x_euler) * f0.get(i, j, k) as f64 + x_euler * f1.get(i, j, k) as f64)
            .collect())
    }

    fn time_tp0(&self) -> f64 {
        self.tp0.as_ref().map_or(f64::NAN, |s| s.record.time)
    }

    fn time_tp1(&self) -> f64 {
        self.tp1.as_ref().map_or(f64::NAN, |s| s.record.time)
    }

    fn require_variable(&mut self, name: &str) {
        self.required.insert(name.to_string());
    }

    fn setup(&mut self, t0: f64, arrow: TimeArrow) -> Result<(), DatasetError> {
        let n = self.source.n_records();
        if n == 0 {
            return Err(DatasetError::NoRecords);
        }
        self.record_times = (0..n)
            .map(|rank| self.source.record_time(rank))
            .collect::<Result<_, _>>()?;
        for (rank, pair) in self.record_times.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(DatasetError::DuplicateRecordTime {
                    rank,
                    next: rank + 1,
                    time: pair[1],
                });
            }
        }

        let first = self.record_times[0];
        let last = self.record_times[n - 1];
        let out_of_range = DatasetError::TimeOutOfRange { time: t0, first, last };
        let (rank0, rank1) = match arrow {
            TimeArrow::Forward => {
                if !(t0 >= first && t0 < last) {
                    return Err(out_of_range);
                }
                let r = self
                    .record_times
                    .iter()
                    .rposition(|&t| t <= t0)
                    .ok_or(out_of_range)?;
                (r, r + 1)
            }
            TimeArrow::Backward => {
                if !(t0 > first && t0 <= last) {
                    return Err(out_of_range);
                }
                let r = self
                    .record_times
                    .iter()
                    .position(|&t| t >= t0)
                    .ok_or(out_of_range)?;
                (r, r - 1)
            }
        };

        self.arrow = arrow;
        self.tp0 = Some(self.read(rank0)?);
        self.tp1 = Some(self.read(rank1)?);
        self.rank = rank1;
        self.dt_hymo = (self.record_times[rank1] - self.record_times[rank0]).abs();

        info!(
            t0,
            rank = rank0,
            time_tp0 = self.time_tp0(),
            time_tp1 = self.time_tp1(),
            variables = ?self.required,
            "Dataset setup"
        );
        Ok(())
    }

    fn update(&mut self, time: f64) -> Result<(), DatasetError> {
        if self.tp1.is_none() {
            return Err(DatasetError::NotSetUp);
        }
        let sign = self.arrow.sign();
        while sign * time >= sign * self.time_tp1() {
            let next = self.rank as isize + sign as isize;
            if next < 0 || next as usize >= self.record_times.len() {
                return Err(DatasetError::EndOfRecords { time });
            }
            let snapshot = self.read(next as usize)?;
            self.tp0 = self.tp1.take();
            self.tp1 = Some(snapshot);
            self.rank = next as usize;
            self.dt_hymo = (self.time_tp1() - self.time_tp0()).abs();
            debug!(rank = self.rank, time_tp1 = self.time_tp1(), "Dataset record loaded");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AnalyticSourceBuilder;
    use crate::grid::RectilinearGridBuilder;
    use crate::vertical::{UniformStretching, VerticalTransform};
    use approx::assert_relative_eq;

    const U: f64 = 0.25;

    fn grid(land: impl Fn(usize, usize) -> bool + 'static) -> RomsGrid {
        RectilinearGridBuilder::new(0.0, 1.1, 40.0, 41.1)
            .with_resolution(12, 12)
            .with_constant_depth(100.0)
            .with_land(land)
            .build()
            .unwrap()
    }

    fn dataset_3d(u: f64, v: f64) -> RomsDataset<crate::dataset::MemorySource> {
        let sc = SCoordinate::from_stretching(10, VerticalTransform::Old, 0.0, &UniformStretching).unwrap();
        let src = AnalyticSourceBuilder::new(grid(|_, _| false))
            .with_s_coordinate(sc)
            .with_records(0.0, 3600.0, 6)
            .with_uniform_velocity(u, v)
            .with_tracer("temp", |_, _, depth, t| 10.0 - depth / 10.0 + t / 3600.0)
            .build();
        let mut ds = RomsDataset::new(src).unwrap();
        ds.require_variable("temp");
        ds.setup(0.0, TimeArrow::Forward).unwrap();
        ds
    }

    #[test]
    fn test_uniform_u_in_grid_units() {
        let ds = dataset_3d(U, 0.0);
        let p = GridPos::new(5.3, 5.6, 4.2);
        let expected = U * ds.grid().pm(5, 6);
        assert_relative_eq!(ds.get_dux(p, 600.0), expected, max_relative = 1e-3);
        assert_relative_eq!(ds.get_dvy(p, 600.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_v_in_grid_units() {
        let ds = dataset_3d(0.0, -U);
        let p = GridPos::new(4.0, 7.5, 2.0);
        assert_relative_eq!(ds.get_dvy(p, 0.0), -U * ds.grid().pn(4, 7), max_relative = 1e-6);
    }

    #[test]
    fn test_uniform_flow_has_no_vertical_velocity() {
        let ds = dataset_3d(U, U);
        for k in 0..=10 {
            assert_relative_eq!(ds.w_tp1(5, 5, k).unwrap(), 0.0, epsilon = 1e-9);
        }
        assert_relative_eq!(ds.get_dwz(GridPos::new(5.5, 5.5, 3.3), 0.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_convergence_gives_downwelling() {
        // Surface flow converging on column i = 5, returning at depth
        let sc = SCoordinate::from_stretching(10, VerticalTransform::Old, 0.0, &UniformStretching).unwrap();
        let src = AnalyticSourceBuilder::new(grid(|_, _| false))
            .with_s_coordinate(sc)
            .with_records(0.0, 3600.0, 3)
            .with_velocity(|lon, _, depth, _| {
                let side = if lon < 0.5 { 1.0 } else { -1.0 };
                let layer = if depth > -50.0 { 1.0 } else { -1.0 };
                (0.1 * side * layer, 0.0)
            })
            .build();
        let mut ds = RomsDataset::new(src).unwrap();
        ds.setup(0.0, TimeArrow::Forward).unwrap();
        let w_mid = ds.w_tp1(5, 5, 5).unwrap();
        assert!(w_mid < 0.0, "w = {w_mid}");
        assert_eq!(ds.w_tp1(5, 5, 10).unwrap(), 0.0);
        assert_eq!(ds.w_tp1(5, 5, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_depth_conversions() {
        let ds = dataset_3d(0.0, 0.0);
        // 10 uniform levels in 100 m: rho level k at -95 + 10 k
        assert_relative_eq!(ds.z2depth(5.0, 5.0, 0.0), -95.0, epsilon = 1e-9);
        assert_relative_eq!(ds.z2depth(5.0, 5.0, 4.5), -50.0, epsilon = 1e-9);
        assert_relative_eq!(ds.depth2z(5.0, 5.0, -50.0), 4.5, epsilon = 1e-9);
        assert_relative_eq!(ds.depth2z(5.0, 5.0, -1.0), 9.0, epsilon = 1e-9);
        assert_relative_eq!(ds.depth2z(5.0, 5.0, -99.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tracer_interpolation() {
        let ds = dataset_3d(0.0, 0.0);
        let p = GridPos::new(5.5, 5.5, 4.5);
        // depth -50 m at t = 1800 s
        assert_relative_eq!(ds.get("temp", p, 1800.0).unwrap(), 15.5, epsilon = 1e-4);
        assert!(matches!(
            ds.get("salt", p, 0.0),
            Err(DatasetError::VariableNotLoaded(_))
        ));
        let col = ds.column("temp", 3, 3, 0.0).unwrap();
        assert_eq!(col.len(), 10);
        assert_relative_eq!(col[0], 19.5, epsilon = 1e-4);
    }

    #[test]
    fn test_setup_and_update() {
        let mut ds = dataset_3d(0.0, 0.0);
        assert_eq!(ds.time_tp0(), 0.0);
        assert_eq!(ds.time_tp1(), 3600.0);
        ds.update(1800.0).unwrap();
        assert_eq!(ds.time_tp1(), 3600.0);
        ds.update(3600.0).unwrap();
        assert_eq!(ds.time_tp0(), 3600.0);
        assert_eq!(ds.time_tp1(), 7200.0);
        ds.update(12_000.0).unwrap();
        assert_eq!(ds.time_tp1(), 14_400.0);
        assert!(matches!(ds.update(18_000.0), Err(DatasetError::EndOfRecords { .. })));
    }

    #[test]
    fn test_setup_backward() {
        let src = AnalyticSourceBuilder::new(grid(|_, _| false))
            .with_records(0.0, 100.0, 5)
            .build();
        let mut ds = RomsDataset::new(src).unwrap();
        assert!(matches!(
            ds.setup(0.0, TimeArrow::Backward),
            Err(DatasetError::TimeOutOfRange { .. })
        ));
        ds.setup(250.0, TimeArrow::Backward).unwrap();
        assert_eq!(ds.time_tp0(), 300.0);
        assert_eq!(ds.time_tp1(), 200.0);
        ds.update(190.0).unwrap();
        assert_eq!(ds.time_tp1(), 100.0);
    }

    #[test]
    fn test_setup_out_of_range() {
        let src = AnalyticSourceBuilder::new(grid(|_, _| false))
            .with_records(1000.0, 100.0, 3)
            .build();
        let mut ds = RomsDataset::new(src).unwrap();
        assert!(ds.setup(900.0, TimeArrow::Forward).is_err());
        assert!(ds.setup(1200.0, TimeArrow::Forward).is_err());
        assert!(ds.setup(1000.0, TimeArrow::Forward).is_ok());
    }

    #[test]
    fn test_two_dimensional_dataset() {
        let src = AnalyticSourceBuilder::new(grid(|i, _| i >= 9))
            .with_records(0.0, 3600.0, 3)
            .with_uniform_velocity(U, 0.0)
            .build();
        let mut ds = RomsDataset::new(src).unwrap();
        ds.setup(0.0, TimeArrow::Forward).unwrap();
        assert!(!ds.is_3d());
        assert_eq!(ds.nz(), 1);
        let p = GridPos::new(4.4, 4.4, 0.0);
        assert_relative_eq!(ds.get_dux(p, 100.0), U * ds.grid().pm(4, 4), max_relative = 1e-3);
        assert_eq!(ds.get_dwz(p, 100.0), 0.0);
        assert_eq!(ds.depth2z(4.4, 4.4, -10.0), 0.0);
    }

    #[test]
    fn test_subdomain() {
        let src = AnalyticSourceBuilder::new(grid(|_, _| false))
            .with_records(0.0, 3600.0, 2)
            .with_uniform_velocity(U, 0.0)
            .build();
        let mut ds = RomsDataset::with_subdomain(src, 2, 3, 6, 5).unwrap();
        ds.setup(0.0, TimeArrow::Forward).unwrap();
        assert_eq!((ds.nx(), ds.ny()), (6, 5));
        assert_relative_eq!(ds.grid().lon(0, 0), 0.2, epsilon = 1e-12);
    }
}
