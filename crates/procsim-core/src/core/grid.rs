use nalgebra::Point3;
use thiserror::Error;

/// Integer grid coordinates. Axis 2 is always 0 in two-dimensional grids.
pub type GridIndex = [i64; 3];

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("Grid dimension must be 2 or 3, got {0}")]
    InvalidDimension(usize),
    #[error("Grid delta must be positive and finite, got {0}")]
    InvalidDelta(f64),
    #[error("Axis {axis} has no grid points (min index {min} > max index {max})")]
    EmptyAxis { axis: usize, min: i64, max: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryCondition {
    #[default]
    Reflective,
    Periodic,
    Infinite,
}

/// Regular grid shared by every level set of a domain.
///
/// The vertical axis is `dim - 1` and is treated as unbounded: neighbour lookups past its
/// ends return `None`, and the domain grows it on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    dim: usize,
    delta: f64,
    min_index: GridIndex,
    max_index: GridIndex,
    boundaries: [BoundaryCondition; 3],
}

impl Grid {
    pub fn new(
        dim: usize,
        delta: f64,
        min_index: GridIndex,
        max_index: GridIndex,
        lateral_boundary: BoundaryCondition,
    ) -> Result<Self, GridError> {
        if !(2..=3).contains(&dim) {
            return Err(GridError::InvalidDimension(dim));
        }
        if !(delta.is_finite() && delta > 0.0) {
            return Err(GridError::InvalidDelta(delta));
        }

        let mut min_index = min_index;
        let mut max_index = max_index;
        let mut boundaries = [BoundaryCondition::Infinite; 3];
        for axis in 0..3 {
            if axis >= dim {
                min_index[axis] = 0;
                max_index[axis] = 0;
                continue;
            }
            if min_index[axis] > max_index[axis] {
                return Err(GridError::EmptyAxis {
                    axis,
                    min: min_index[axis],
                    max: max_index[axis],
                });
            }
            if axis + 1 < dim {
                boundaries[axis] = lateral_boundary;
            }
        }

        Ok(Self {
            dim,
            delta,
            min_index,
            max_index,
            boundaries,
        })
    }

    /// Builds a grid whose lateral axes are centred at zero and whose vertical axis covers
    /// `[vertical_min, vertical_max]`.
    pub fn from_extents(
        dim: usize,
        delta: f64,
        lateral_extents: [f64; 2],
        vertical_min: f64,
        vertical_max: f64,
        lateral_boundary: BoundaryCondition,
    ) -> Result<Self, GridError> {
        if !(delta.is_finite() && delta > 0.0) {
            return Err(GridError::InvalidDelta(delta));
        }
        if !(2..=3).contains(&dim) {
            return Err(GridError::InvalidDimension(dim));
        }

        let mut min_index = [0i64; 3];
        let mut max_index = [0i64; 3];
        for axis in 0..dim - 1 {
            let extent = lateral_extents[axis];
            if lateral_boundary == BoundaryCondition::Periodic {
                let n = ((extent / delta).round() as i64).max(1);
                min_index[axis] = -(n / 2);
                max_index[axis] = min_index[axis] + n - 1;
            } else {
                let half = (extent / (2.0 * delta)).round() as i64;
                min_index[axis] = -half;
                max_index[axis] = half;
            }
        }
        let vertical = dim - 1;
        min_index[vertical] = (vertical_min / delta + 1e-9).floor() as i64;
        max_index[vertical] = (vertical_max / delta - 1e-9).ceil() as i64;

        Self::new(dim, delta, min_index, max_index, lateral_boundary)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn vertical_axis(&self) -> usize {
        self.dim - 1
    }

    pub fn min_index(&self) -> GridIndex {
        self.min_index
    }

    pub fn max_index(&self) -> GridIndex {
        self.max_index
    }

    pub fn boundary(&self, axis: usize) -> BoundaryCondition {
        self.boundaries[axis]
    }

    pub fn size(&self, axis: usize) -> usize {
        (self.max_index[axis] - self.min_index[axis] + 1) as usize
    }

    pub fn point_count(&self) -> usize {
        self.size(0) * self.size(1) * self.size(2)
    }

    pub fn contains(&self, index: &GridIndex) -> bool {
        (0..3).all(|a| index[a] >= self.min_index[a] && index[a] <= self.max_index[a])
    }

    pub fn linear_index(&self, index: &GridIndex) -> usize {
        let i = (index[0] - self.min_index[0]) as usize;
        let j = (index[1] - self.min_index[1]) as usize;
        let k = (index[2] - self.min_index[2]) as usize;
        (k * self.size(1) + j) * self.size(0) + i
    }

    pub fn index_of(&self, linear: usize) -> GridIndex {
        let nx = self.size(0);
        let ny = self.size(1);
        let i = linear % nx;
        let j = (linear / nx) % ny;
        let k = linear / (nx * ny);
        [
            self.min_index[0] + i as i64,
            self.min_index[1] + j as i64,
            self.min_index[2] + k as i64,
        ]
    }

    pub fn coordinate(&self, index: &GridIndex) -> Point3<f64> {
        Point3::new(
            index[0] as f64 * self.delta,
            index[1] as f64 * self.delta,
            index[2] as f64 * self.delta,
        )
    }

    /// Neighbour along `axis`, resolved through the boundary condition of that axis.
    pub fn neighbor(&self, index: &GridIndex, axis: usize, offset: i64) -> Option<GridIndex> {
        let min = self.min_index[axis];
        let max = self.max_index[axis];
        let mut value = index[axis] + offset;

        if value < min || value > max {
            match self.boundaries[axis] {
                BoundaryCondition::Infinite => return None,
                BoundaryCondition::Periodic => {
                    let n = max - min + 1;
                    value = (value - min).rem_euclid(n) + min;
                }
                BoundaryCondition::Reflective => {
                    if value < min {
                        value = 2 * min - value;
                    } else {
                        value = 2 * max - value;
                    }
                    value = value.clamp(min, max);
                }
            }
        }

        let mut result = *index;
        result[axis] = value;
        Some(result)
    }

    /// Maps an arbitrary index into the grid: periodic axes wrap, reflective axes mirror,
    /// infinite axes clamp.
    pub fn resolve_index(&self, index: &GridIndex) -> GridIndex {
        let mut resolved = *index;
        for (axis, value) in resolved.iter_mut().enumerate() {
            let min = self.min_index[axis];
            let max = self.max_index[axis];
            if *value >= min && *value <= max {
                continue;
            }
            *value = match self.boundaries[axis] {
                BoundaryCondition::Periodic => (*value - min).rem_euclid(max - min + 1) + min,
                BoundaryCondition::Reflective if *value < min => (2 * min - *value).clamp(min, max),
                BoundaryCondition::Reflective => (2 * max - *value).clamp(min, max),
                BoundaryCondition::Infinite => (*value).clamp(min, max),
            };
        }
        resolved
    }

    /// Physical extent of a lateral axis as seen by rays and boundary handling.
    pub fn lateral_bounds(&self, axis: usize) -> (f64, f64) {
        let lo = self.min_index[axis] as f64 * self.delta;
        match self.boundaries[axis] {
            BoundaryCondition::Periodic => (lo, (self.max_index[axis] + 1) as f64 * self.delta),
            _ => (lo, self.max_index[axis] as f64 * self.delta),
        }
    }

    pub fn with_vertical_range(&self, min: i64, max: i64) -> Result<Self, GridError> {
        let vertical = self.vertical_axis();
        let mut min_index = self.min_index;
        let mut max_index = self.max_index;
        min_index[vertical] = min;
        max_index[vertical] = max;
        Self::new(
            self.dim,
            self.delta,
            min_index,
            max_index,
            self.boundaries[0],
        )
    }

    /// Nearest grid index to a point, clamped into the grid.
    pub fn nearest_index(&self, point: &Point3<f64>) -> GridIndex {
        let mut index = [0i64; 3];
        for (axis, slot) in index.iter_mut().enumerate().take(self.dim) {
            let raw = (point[axis] / self.delta).round() as i64;
            *slot = raw.clamp(self.min_index[axis], self.max_index[axis]);
        }
        index
    }

    pub fn indices(&self) -> impl Iterator<Item = GridIndex> + '_ {
        (0..self.point_count()).map(move |linear| self.index_of(linear))
    }
}
