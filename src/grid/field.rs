//! Dense 2-D and 3-D arrays in ROMS index order.
//!
//! `Field2` is indexed `[j][i]` and `Field3` `[k][j][i]`, both stored
//! row-major in a flat `Vec` the way NetCDF hands them out.

use super::GridError;

#[derive(Clone, Debug, PartialEq)]
pub struct Field2<T> {
    nx: usize,
    ny: usize,
    data: Vec<T>,
}

impl<T: Copy> Field2<T> {
    /// Wrap a flat row-major buffer of `ny * nx` values.
    pub fn new(nx: usize, ny: usize, data: Vec<T>) -> Result<Self, GridError> {
        if data.len() != nx * ny {
            return Err(GridError::ShapeMismatch {
                expected: vec![ny, nx],
                got: data.len(),
            });
        }
        Ok(Self { nx, ny, data })
    }

    pub fn filled(nx: usize, ny: usize, value: T) -> Self {
        Self {
            nx,
            ny,
            data: vec![value; nx * ny],
        }
    }

    pub fn from_fn(nx: usize, ny: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                data.push(f(i, j));
            }
        }
        Self { nx, ny, data }
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Value at `(i, j)`; panics out of bounds.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[j * self.nx + i]
    }

    /// Value at signed indices, `None` out of bounds.
    #[inline]
    pub fn checked(&self, i: isize, j: isize) -> Option<T> {
        if i < 0 || j < 0 || i as usize >= self.nx || j as usize >= self.ny {
            None
        } else {
            Some(self.data[j as usize * self.nx + i as usize])
        }
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        self.data[j * self.nx + i] = value;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Field2<U> {
        Field2 {
            nx: self.nx,
            ny: self.ny,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Sub-array `[jpo, jpo + ny) x [ipo, ipo + nx)`.
    pub fn crop(&self, ipo: usize, jpo: usize, nx: usize, ny: usize) -> Result<Self, GridError> {
        if ipo + nx > self.nx || jpo + ny > self.ny {
            return Err(GridError::InvalidCrop {
                ipo,
                jpo,
                nx,
                ny,
                full_nx: self.nx,
                full_ny: self.ny,
            });
        }
        Ok(Self::from_fn(nx, ny, |i, j| self.get(ipo + i, jpo + j)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field3<T> {
    nx: usize,
    ny: usize,
    nz: usize,
    data: Vec<T>,
}

impl<T: Copy> Field3<T> {
    /// Wrap a flat `[k][j][i]` buffer of `nz * ny * nx` values.
    pub fn new(nx: usize, ny: usize, nz: usize, data: Vec<T>) -> Result<Self, GridError> {
        if data.len() != nx * ny * nz {
            return Err(GridError::ShapeMismatch {
                expected: vec![nz, ny, nx],
                got: data.len(),
            });
        }
        Ok(Self { nx, ny, nz, data })
    }

    pub fn filled(nx: usize, ny: usize, nz: usize, value: T) -> Self {
        Self {
            nx,
            ny,
            nz,
            data: vec![value; nx * ny * nz],
        }
    }

    pub fn from_fn(nx: usize, ny: usize, nz: usize, mut f: impl FnMut(usize, usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    data.push(f(i, j, k));
                }
            }
        }
        Self { nx, ny, nz, data }
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    #[inline]
    pub fn nz(&self) -> usize {
        self.nz
    }

    /// Value at `(i, j, k)`; panics out of bounds.
    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> T {
        self.data[(k * self.ny + j) * self.nx + i]
    }

    /// Value at signed indices, `None` out of bounds.
    #[inline]
    pub fn checked(&self, i: isize, j: isize, k: isize) -> Option<T> {
        if i < 0
            || j < 0
            || k < 0
            || i as usize >= self.nx
            || j as usize >= self.ny
            || k as usize >= self.nz
        {
            None
        } else {
            Some(self.get(i as usize, j as usize, k as usize))
        }
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: T) {
        self.data[(k * self.ny + j) * self.nx + i] = value;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Water column at `(i, j)`, bottom first.
    pub fn column(&self, i: usize, j: usize) -> Vec<T> {
        (0..self.nz).map(|k| self.get(i, j, k)).collect()
    }

    /// Horizontal crop keeping every level.
    pub fn crop(&self, ipo: usize, jpo: usize, nx: usize, ny: usize) -> Result<Self, GridError> {
        if ipo + nx > self.nx || jpo + ny > self.ny {
            return Err(GridError::InvalidCrop {
                ipo,
                jpo,
                nx,
                ny,
                full_nx: self.nx,
                full_ny: self.ny,
            });
        }
        Ok(Self::from_fn(nx, ny, self.nz, |i, j, k| self.get(ipo + i, jpo + j, k)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field2_layout() {
        let f = Field2::new(3, 2, vec![0, 1, 2, 10, 11, 12]).unwrap();
        assert_eq!(f.get(2, 1), 12);
        assert_eq!(f.checked(-1, 0), None);
        assert_eq!(f.checked(0, 2), None);
        assert_eq!(f.checked(1, 1), Some(11));
        assert!(Field2::new(3, 2, vec![0; 5]).is_err());
    }

    #[test]
    fn test_field3_layout() {
        let f = Field3::from_fn(2, 3, 4, |i, j, k| (100 * k + 10 * j + i) as f32);
        assert_eq!(f.get(1, 2, 3), 321.0);
        assert_eq!(f.column(1, 2), vec![21.0, 121.0, 221.0, 321.0]);
    }

    #[test]
    fn test_crop() {
        let f = Field2::from_fn(5, 4, |i, j| (i, j));
        let c = f.crop(1, 2, 3, 2).unwrap();
        assert_eq!(c.get(0, 0), (1, 2));
        assert_eq!(c.get(2, 1), (3, 3));
        assert!(f.crop(3, 0, 3, 1).is_err());

        let g = Field3::from_fn(4, 4, 2, |i, j, k| i + j + k);
        assert_eq!(g.crop(1, 1, 2, 2).unwrap().get(1, 1, 1), 5);
    }
}
