//! Simulation runner implementation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::action::{
    ActionContext, ActionError, ActionSet, AgeMonitoring, MoveAction, RecruitmentZone,
};
use crate::config::SimulationConfig;
use crate::dataset::{Dataset, RecordSource, RomsDataset};
use crate::output::{OutputHeader, Recorder, Tracker, ZoneOutline, create_writer};
use crate::particle::{Mortality, Particle};
use crate::release::{ReleaseMethod, ReleaseSchedule, Releaser};
use crate::time::TimeManager;
use crate::zone::{ZoneKind, ZoneManager};

use super::{Population, SimulationError};

// =============================================================================
// Simulation Result
// =============================================================================

/// Outcome of a run.
#[derive(Clone, Debug)]
pub struct SimulationResult {
    /// Simulation time reached (s).
    pub final_time: f64,
    /// Steps computed.
    pub n_steps: usize,
    pub n_released: usize,
    pub n_alive: usize,
    /// Particles per death cause.
    pub mortality: BTreeMap<Mortality, usize>,
    pub n_records: usize,
    pub output_path: Option<PathBuf>,
    /// Wall-clock time (s).
    pub wall_time: f64,
    pub success: bool,
    pub error: Option<String>,
}

impl SimulationResult {
    pub fn success(final_time: f64, n_steps: usize, population: &Population, wall_time: f64) -> Self {
        Self {
            final_time,
            n_steps,
            n_released: population.len(),
            n_alive: population.n_alive(),
            mortality: population.mortality_counts(),
            n_records: 0,
            output_path: None,
            wall_time,
            success: true,
            error: None,
        }
    }

    pub fn failure(final_time: f64, n_steps: usize, population: &Population, error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Self::success(final_time, n_steps, population, 0.0)
        }
    }

    /// Particles that died of `cause`.
    pub fn count(&self, cause: Mortality) -> usize {
        self.mortality.get(&cause).copied().unwrap_or(0)
    }
}

/// State handed to the callback after every step.
#[derive(Clone, Copy, Debug)]
pub struct StepSnapshot<'a> {
    /// Steps computed so far.
    pub step: usize,
    /// Time at the end of the step (s).
    pub time: f64,
    pub particles: &'a [Particle],
    pub n_alive: usize,
}

// =============================================================================
// Simulation Runner
// =============================================================================

/// A configured run over one ROMS dataset.
pub struct Simulation<S: RecordSource> {
    config: SimulationConfig,
    dataset: RomsDataset<S>,
    zones: ZoneManager,
    clock: TimeManager,
    schedule: ReleaseSchedule,
    releaser: Releaser,
    actions: ActionSet,
    population: Population,
    /// Steps computed so far.
    steps_done: usize,
    max_steps: Option<usize>,
}

impl<S: RecordSource> Simulation<S> {
    /// Validate the configuration, open the dataset, load the zones and
    /// build the actions. The dataset is ready at the initial time.
    pub fn new(config: SimulationConfig, source: S) -> Result<Self, SimulationError> {
        config.validate()?;

        let mut dataset = match config.dataset.range_corners() {
            Some((p1, p2)) => RomsDataset::with_range(source, p1, p2)?,
            None => RomsDataset::new(source)?,
        };

        let mut clock = config.time.time_manager()?;
        let t0 = clock.t0();
        let arrow = clock.arrow();
        let schedule = ReleaseSchedule::new(config.time.release_event_times()?, t0, arrow)?;
        clock.initialize(schedule.span());

        let mut zones = ZoneManager::new();
        let mut releaser = Releaser::new(config.release.clone(), config.seed);
        releaser.prepare(&dataset, &mut zones)?;
        if let Some(recruitment) = &config.biology.recruitment {
            zones.load_file(&recruitment.zone_file, ZoneKind::Recruitment, &dataset)?;
        }

        let actions = build_actions(&config, &dataset, &zones, clock.transport_duration())?;

        for name in actions.required_variables() {
            dataset.require_variable(&name);
        }
        for name in &config.output.custom_tracers {
            dataset.require_variable(name);
        }
        dataset.setup(t0, arrow)?;

        info!(
            id = %config.id,
            nx = dataset.nx(),
            ny = dataset.ny(),
            nz = dataset.nz(),
            start = %clock.calendar().iso_string(t0),
            dt = clock.dt(),
            steps = clock.n_steps(),
            release = config.release.name(),
            events = schedule.n_events(),
            particles = releaser.number_particles(),
            actions = ?actions.names(),
            coastline = %actions.coastline(),
            "Simulation ready"
        );

        Ok(Self {
            config,
            dataset,
            zones,
            clock,
            schedule,
            releaser,
            actions,
            population: Population::new(),
            steps_done: 0,
            max_steps: None,
        })
    }

    /// Stop with a failure after `max_steps` steps.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn dataset(&self) -> &RomsDataset<S> {
        &self.dataset
    }

    pub fn zones(&self) -> &ZoneManager {
        &self.zones
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn clock(&self) -> &TimeManager {
        &self.clock
    }

    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    /// Drifters in the output: every particle the release method will place.
    pub fn n_drifters(&self) -> usize {
        self.releaser.number_particles()
    }

    /// Trackers recorded for this configuration.
    pub fn trackers(&self) -> Vec<Tracker> {
        let output = &self.config.output;
        let mut trackers = vec![Tracker::Lon, Tracker::Lat];
        if self.dataset.is_3d() {
            trackers.push(Tracker::Depth);
        }
        trackers.push(Tracker::Mortality);
        if output.zone_tracker {
            for kind in [ZoneKind::Release, ZoneKind::Recruitment] {
                if !self.zones.zones(kind).is_empty() {
                    trackers.push(Tracker::Zone(kind));
                }
            }
        }
        if output.release_zone_tracker {
            trackers.push(Tracker::ReleaseZone);
        }
        if self.config.biology.growth.is_some() {
            trackers.push(Tracker::Length);
            trackers.push(Tracker::Stage);
        }
        if self.config.biology.recruitment.is_some() {
            trackers.push(Tracker::Recruited);
        }
        trackers.extend(output.custom_tracers.iter().cloned().map(Tracker::Variable));
        trackers
    }

    pub fn output_header(&self) -> OutputHeader {
        let transport_dimension = if self.dataset.is_3d() { "3d" } else { "2d" };
        OutputHeader {
            trackers: self.trackers(),
            n_drifters: self.n_drifters(),
            transport_dimension: transport_dimension.to_string(),
            time_units: "seconds since 1900-01-01 00:00".to_string(),
            calendar: self.clock.calendar().to_string(),
            zones: ZoneOutline::from_manager(&self.zones),
            attributes: self.config.attributes(),
        }
    }

    /// Run to the end of the simulation.
    pub fn run(&mut self) -> SimulationResult {
        self.run_with_callback(|_| {})
    }

    /// Run, calling `callback` after every step.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> SimulationResult
    where
        F: FnMut(&StepSnapshot),
    {
        let start_wall = Instant::now();
        let mut recorder = None;
        let outcome = self.run_steps(&mut recorder, &mut callback);
        let n_steps = self.steps_done;

        let mut result = match outcome {
            Ok(()) => SimulationResult::success(
                self.clock.time(),
                n_steps,
                &self.population,
                start_wall.elapsed().as_secs_f64(),
            ),
            Err(e) => {
                error!(error = %e, step = n_steps, "Simulation failed");
                SimulationResult::failure(self.clock.time(), n_steps, &self.population, e.to_string())
            }
        };

        if let Some(mut recorder) = recorder {
            result.n_records = recorder.n_records();
            match recorder.finish() {
                Ok(path) => result.output_path = Some(path),
                Err(e) if result.success => {
                    error!(error = %e, "Cannot close the output file");
                    result.success = false;
                    result.error = Some(e.to_string());
                }
                Err(e) => warn!(error = %e, "Cannot close the output file"),
            }
        }
        result.wall_time = start_wall.elapsed().as_secs_f64();

        info!(
            steps = result.n_steps,
            released = result.n_released,
            alive = result.n_alive,
            records = result.n_records,
            wall_time = result.wall_time,
            success = result.success,
            "Simulation complete"
        );
        result
    }

    fn run_steps<F>(&mut self, recorder: &mut Option<Recorder>, callback: &mut F) -> Result<(), SimulationError>
    where
        F: FnMut(&StepSnapshot),
    {
        if self.config.output.enabled {
            let header = self.output_header();
            let path = self.config.output.file_path(&self.config.id);
            let writer = create_writer(self.config.output.format, &path, &header)?;
            info!(path = %path.display(), trackers = header.trackers.len(), "Output file created");
            *recorder = Some(Recorder::new(&header, self.config.output.record_frequency, writer));
        }

        let calendar = self.clock.calendar();
        loop {
            let step = self.steps_done;
            if let Some(max) = self.max_steps {
                if step >= max {
                    return Err(SimulationError::MaxSteps(max));
                }
            }
            let time = self.clock.time();
            let dt = self.clock.dt();

            self.dataset.update(time)?;
            self.release_due(time, dt)?;
            if let Some(rec) = recorder.as_mut() {
                rec.record(step, time, self.population.particles(), &self.dataset)?;
            }

            let ctx = ActionContext::new(&self.dataset, &self.zones, time, dt, calendar);
            self.population.step(&self.actions, &ctx)?;
            self.steps_done += 1;

            let has_next = self.clock.has_next_step();
            callback(&StepSnapshot {
                step: self.steps_done,
                time: time + dt,
                particles: self.population.particles(),
                n_alive: self.population.n_alive(),
            });
            debug!(step, time = %self.clock.step_string(), alive = self.population.n_alive(), "Step done");
            if !has_next {
                break;
            }
        }

        if let Some(rec) = recorder.as_mut() {
            rec.force_record(self.steps_done, self.clock.time(), self.population.particles(), &self.dataset)?;
        }
        Ok(())
    }

    /// Release the particles of the events falling in the step.
    fn release_due(&mut self, time: f64, dt: f64) -> Result<(), SimulationError> {
        for (k, event_time) in self.schedule.due_events(time, dt) {
            let n = self.particles_for_event(k);
            let first_index = self.population.len();
            let mut released = self
                .releaser
                .release(n, first_index, event_time, &self.dataset, &self.zones)?;
            for p in &mut released {
                self.actions.init_particle(p, &self.dataset, &self.zones);
            }
            info!(
                event = k,
                time = %self.clock.calendar().iso_string(event_time),
                requested = n,
                released = released.len(),
                "Release event"
            );
            self.population.extend(released);
        }
        Ok(())
    }

    /// Particles placed at release event `k`.
    fn particles_for_event(&self, k: usize) -> usize {
        match self.releaser.method() {
            ReleaseMethod::Patchy {
                number_patches,
                particles_per_patch,
                ..
            } => self.schedule.particles_for_event(*number_patches, k) * particles_per_patch,
            _ => self.schedule.particles_for_event(self.releaser.number_particles(), k),
        }
    }
}

/// Configured actions, sorted by priority, with the system actions.
fn build_actions(
    config: &SimulationConfig,
    dataset: &dyn Dataset,
    zones: &ZoneManager,
    transport_duration: f64,
) -> Result<ActionSet, ActionError> {
    let is_3d = dataset.is_3d();
    let bio = &config.biology;
    let growth = bio.growth.is_some();

    let mut actions = ActionSet::new(
        AgeMonitoring::new(transport_duration, config.time.keep_drifting),
        MoveAction::new(config.transport.coastline),
    )
    .with_zone_tracking(!zones.is_empty());

    if config.transport.advection.enabled {
        actions.push(Box::new(config.transport.advection.advection.clone()));
    }
    if let Some(h) = &config.dispersion.horizontal {
        actions.push(Box::new(h.clone()));
    }
    if let Some(v) = &config.dispersion.vertical {
        if !is_3d {
            return Err(ActionError::Requires3D {
                action: "vertical dispersion",
            });
        }
        actions.push(Box::new(v.clone()));
    }
    if let Some(g) = &bio.growth {
        g.validate()?;
        actions.push(Box::new(g.clone()));
    }
    if let Some(b) = &bio.buoyancy {
        if !is_3d {
            return Err(ActionError::Requires3D { action: "buoyancy" });
        }
        actions.push(Box::new(b.build(growth, transport_duration)?));
    }
    if let Some(l) = &bio.lethal_temperature {
        actions.push(Box::new(l.build(growth)?));
    }
    if let Some(m) = &bio.migration {
        actions.push(Box::new(m.build(growth, is_3d)?));
    }
    if let Some(r) = &bio.recruitment {
        let recruitment: RecruitmentZone = r.build(growth, zones.zones(ZoneKind::Recruitment).len())?;
        actions.push(Box::new(recruitment));
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BiologyConfig, TimeConfig};
    use crate::dataset::{AnalyticSourceBuilder, MemorySource};
    use crate::geodesy::Coordinate;
    use crate::grid::RectilinearGridBuilder;
    use crate::output::OutputConfig;

    /// 2-D channel, 0.01° cells, eastward current of 0.1 m/s, 4 days of
    /// hourly records from 1900-01-01.
    fn channel() -> MemorySource {
        let grid = RectilinearGridBuilder::new(0.0, 0.3, 45.0, 45.2)
            .with_resolution(31, 21)
            .with_constant_depth(50.0)
            .build()
            .unwrap();
        AnalyticSourceBuilder::new(grid)
            .with_records(0.0, 3600.0, 96)
            .with_uniform_velocity(0.1, 0.0)
            .with_tracer("temp", |_, _, _, _| 14.0)
            .build()
    }

    fn config(n: usize, output: OutputConfig) -> SimulationConfig {
        SimulationConfig::default()
            .with_seed(3)
            .with_time(TimeConfig::new(
                "year 1900 month 01 day 01 at 00:00",
                1800.0,
                "0000 day(s) 12 hour(s) 00 minute(s)",
            ))
            .with_release(ReleaseMethod::Stain {
                number_particles: n,
                lon: Coordinate(0.1),
                lat: Coordinate(45.1),
                depth: 0.0,
                radius: 1000.0,
                thickness: 0.0,
            })
            .with_output(output)
    }

    #[test]
    fn test_run_without_output() {
        let mut output = OutputConfig::default();
        output.enabled = false;
        let mut sim = Simulation::new(config(20, output), channel()).unwrap();
        assert_eq!(sim.clock().n_steps(), 24);

        let mut calls = 0;
        let result = sim.run_with_callback(|snapshot| {
            calls += 1;
            assert_eq!(snapshot.particles.len(), 20);
        });
        assert!(result.success, "{:?}", result.error);
        assert_eq!(calls, 24);
        assert_eq!(result.n_released, 20);
        assert_eq!(result.n_alive, 20);
        assert_eq!(result.count(Mortality::Alive), 20);
        assert!(result.output_path.is_none());

        // 12 h at 0.1 m/s eastward
        let lon0 = 0.1;
        let mean_lon: f64 = sim.population().particles().iter().map(|p| p.geo().lon).sum::<f64>() / 20.0;
        let expected = lon0 + 0.1 * 12.0 * 3600.0 / crate::geodesy::one_deg_longitude_in_meter(45.1);
        assert!((mean_lon - expected).abs() < 0.01, "{mean_lon} vs {expected}");
    }

    #[test]
    fn test_run_writes_records() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig::default()
            .with_output_path(dir.path())
            .with_record_frequency(6)
            .with_custom_tracer("temp");
        let mut sim = Simulation::new(config(5, output).with_id("channel"), channel()).unwrap();
        assert_eq!(
            sim.trackers(),
            vec![Tracker::Lon, Tracker::Lat, Tracker::Mortality, Tracker::Variable("temp".to_string())]
        );
        let result = sim.run();
        assert!(result.success, "{:?}", result.error);
        // steps 0, 6, 12, 18 and the final state
        assert_eq!(result.n_records, 5);

        let path = result.output_path.unwrap();
        assert_eq!(path, dir.path().join("roms-drift_channel.csv"));
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 1 + 5 * 5);
        assert!(text.lines().nth(1).unwrap().ends_with(",0,14"));
    }

    #[test]
    fn test_release_events_and_max_steps() {
        let mut output = OutputConfig::default();
        output.enabled = false;
        let mut cfg = config(10, output);
        cfg.time = cfg.time.with_release_events(vec![
            "year 1900 month 01 day 01 at 00:00".to_string(),
            "year 1900 month 01 day 01 at 03:00".to_string(),
        ]);
        let sim = Simulation::new(cfg, channel()).unwrap();
        // the run is extended by the 3 h release span
        assert_eq!(sim.clock().n_steps(), 30);

        let mut sim = sim.with_max_steps(4);
        let result = sim.run();
        assert!(!result.success);
        assert_eq!(result.n_steps, 4);
        assert_eq!(result.n_released, 5);

        let mut output = OutputConfig::default();
        output.enabled = false;
        let mut cfg = config(10, output);
        cfg.time = cfg.time.with_release_events(vec![
            "year 1900 month 01 day 01 at 00:00".to_string(),
            "year 1900 month 01 day 01 at 03:00".to_string(),
        ]);
        let result = Simulation::new(cfg, channel()).unwrap().run();
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.n_released, 10);
        assert_eq!(result.n_steps, 30);
    }

    #[test]
    fn test_depth_averaged_rejects_vertical_processes() {
        let mut output = OutputConfig::default();
        output.enabled = false;
        let cfg = config(5, output).with_vertical_dispersion(Default::default());
        assert!(matches!(
            Simulation::new(cfg, channel()),
            Err(SimulationError::Action(ActionError::Requires3D { .. }))
        ));
    }

    #[test]
    fn test_growth_trackers() {
        let mut output = OutputConfig::default();
        output.enabled = false;
        let biology = BiologyConfig {
            growth: Some(Default::default()),
            ..Default::default()
        };
        let sim = Simulation::new(config(5, output).with_biology(biology), channel()).unwrap();
        let trackers = sim.trackers();
        assert!(trackers.contains(&Tracker::Length));
        assert!(trackers.contains(&Tracker::Stage));
        assert!(!trackers.contains(&Tracker::Recruited));
        assert_eq!(sim.actions().names(), vec!["advection", "growth"]);
    }
}
