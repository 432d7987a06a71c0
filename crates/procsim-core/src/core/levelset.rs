use super::grid::{Grid, GridError, GridIndex};
use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LevelSetError {
    #[error("Level sets are defined on different grids")]
    GridMismatch,
    #[error("Level set contains {count} non-finite values")]
    NonFinite { count: usize },
    #[error("Level set has no surface (no sign change between neighbouring grid points)")]
    NoInterface,
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// A surface represented implicitly as a signed distance field on a dense grid.
///
/// Values are negative inside material and positive outside.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSet {
    grid: Grid,
    values: Vec<f64>,
}

impl LevelSet {
    pub fn new(grid: Grid, fill: f64) -> Self {
        let values = vec![fill; grid.point_count()];
        Self { grid, values }
    }

    /// Samples an implicit function at every grid point.
    pub fn from_fn<F>(grid: Grid, f: F) -> Self
    where
        F: Fn(&Point3<f64>) -> f64,
    {
        let values = grid
            .indices()
            .map(|index| f(&grid.coordinate(&index)))
            .collect();
        Self { grid, values }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn value(&self, index: &GridIndex) -> f64 {
        self.values[self.grid.linear_index(index)]
    }

    pub fn get(&self, index: &GridIndex) -> Option<f64> {
        self.grid
            .contains(index)
            .then(|| self.values[self.grid.linear_index(index)])
    }

    #[inline]
    pub fn set(&mut self, index: &GridIndex, value: f64) {
        let linear = self.grid.linear_index(index);
        self.values[linear] = value;
    }

    #[inline]
    pub fn value_linear(&self, linear: usize) -> f64 {
        self.values[linear]
    }

    #[inline]
    pub fn set_linear(&mut self, linear: usize, value: f64) {
        self.values[linear] = value;
    }

    #[inline]
    pub fn neighbor_value(&self, index: &GridIndex, axis: usize, offset: i64) -> Option<f64> {
        self.grid
            .neighbor(index, axis, offset)
            .map(|n| self.value(&n))
    }

    pub fn gradient(&self, index: &GridIndex) -> Vector3<f64> {
        let delta = self.grid.delta();
        let center = self.value(index);
        let mut gradient = Vector3::zeros();
        for axis in 0..self.grid.dim() {
            let plus = self.neighbor_value(index, axis, 1);
            let minus = self.neighbor_value(index, axis, -1);
            gradient[axis] = match (plus, minus) {
                (Some(p), Some(m)) => (p - m) / (2.0 * delta),
                (Some(p), None) => (p - center) / delta,
                (None, Some(m)) => (center - m) / delta,
                (None, None) => 0.0,
            };
        }
        gradient
    }

    /// Outward unit normal. Falls back to the vertical direction on flat regions.
    pub fn normal(&self, index: &GridIndex) -> Vector3<f64> {
        let gradient = self.gradient(index);
        let norm = gradient.norm();
        if norm > 1e-12 {
            gradient / norm
        } else {
            let mut up = Vector3::zeros();
            up[self.grid.vertical_axis()] = 1.0;
            up
        }
    }

    /// Multilinear interpolation of the field at an arbitrary point.
    pub fn interpolate(&self, point: &Point3<f64>) -> f64 {
        let dim = self.grid.dim();
        let delta = self.grid.delta();
        let mut base = [0i64; 3];
        let mut frac = [0.0f64; 3];
        for axis in 0..dim {
            let scaled = point[axis] / delta;
            let floor = scaled.floor();
            base[axis] = floor as i64;
            frac[axis] = scaled - floor;
        }

        let mut result = 0.0;
        for corner in 0..(1usize << dim) {
            let mut index = base;
            let mut weight = 1.0;
            for axis in 0..dim {
                if corner & (1 << axis) != 0 {
                    index[axis] += 1;
                    weight *= frac[axis];
                } else {
                    weight *= 1.0 - frac[axis];
                }
            }
            if weight == 0.0 {
                continue;
            }
            let resolved = self.grid.resolve_index(&index);
            result += weight * self.value(&resolved);
        }
        result
    }

    pub fn union(&mut self, other: &LevelSet) -> Result<(), LevelSetError> {
        self.combine(other, f64::min)
    }

    pub fn intersect(&mut self, other: &LevelSet) -> Result<(), LevelSetError> {
        self.combine(other, f64::max)
    }

    /// Removes the region of `other` from this level set.
    pub fn subtract(&mut self, other: &LevelSet) -> Result<(), LevelSetError> {
        self.combine(other, |a, b| a.max(-b))
    }

    fn combine<F>(&mut self, other: &LevelSet, op: F) -> Result<(), LevelSetError>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.grid != other.grid {
            return Err(LevelSetError::GridMismatch);
        }
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a = op(*a, *b);
        }
        Ok(())
    }

    fn is_interface(&self, index: &GridIndex, value: f64) -> bool {
        let outside = value > 0.0;
        (0..self.grid.dim()).any(|axis| {
            [-1, 1].iter().any(|&offset| {
                self.neighbor_value(index, axis, offset)
                    .is_some_and(|n| (n > 0.0) != outside)
            })
        })
    }

    /// Linear indices of points with a sign change towards a face neighbour.
    pub fn interface_points(&self) -> Vec<usize> {
        self.grid
            .indices()
            .enumerate()
            .filter(|(linear, index)| self.is_interface(index, self.values[*linear]))
            .map(|(linear, _)| linear)
            .collect()
    }

    /// Grid points in the narrow band `|phi| <= delta / 2`, in linear order.
    pub fn active_points(&self) -> Vec<GridIndex> {
        let half_delta = 0.5 * self.grid.delta();
        self.grid
            .indices()
            .enumerate()
            .filter(|(linear, _)| self.values[*linear].abs() <= half_delta)
            .map(|(_, index)| index)
            .collect()
    }

    /// Restores the signed distance property around the current narrow band.
    pub fn reinitialize(&mut self) {
        let band: Vec<usize> = self
            .active_points()
            .iter()
            .map(|index| self.grid.linear_index(index))
            .collect();
        self.reinitialize_from(&band);
    }

    /// Fast sweeping Eikonal redistancing with the given points held fixed.
    ///
    /// Each side of the surface is swept separately on signed values, so a point next to
    /// the surface picks up the fixed value on the other side plus one grid spacing.
    pub fn reinitialize_from(&mut self, fixed_points: &[usize]) {
        if fixed_points.is_empty() {
            return;
        }

        let mut fixed = vec![false; self.values.len()];
        for &linear in fixed_points {
            fixed[linear] = true;
        }
        let outside: Vec<bool> = self.values.iter().map(|v| *v > 0.0).collect();
        let mut signed: Vec<f64> = self
            .values
            .iter()
            .enumerate()
            .map(|(linear, v)| {
                if fixed[linear] {
                    *v
                } else if outside[linear] {
                    f64::INFINITY
                } else {
                    f64::NEG_INFINITY
                }
            })
            .collect();

        let dim = self.grid.dim();
        let delta = self.grid.delta();
        let min = self.grid.min_index();
        let max = self.grid.max_index();
        let axis_order = |axis: usize, reverse: bool| -> Vec<i64> {
            let range: Vec<i64> = (min[axis]..=max[axis]).collect();
            if reverse {
                range.into_iter().rev().collect()
            } else {
                range
            }
        };

        for _pass in 0..2 {
            for sweep in 0..(1usize << dim) {
                let xs = axis_order(0, sweep & 1 != 0);
                let ys = axis_order(1, sweep & 2 != 0);
                let zs = axis_order(2, sweep & 4 != 0);
                for &k in &zs {
                    for &j in &ys {
                        for &i in &xs {
                            let index = [i, j, k];
                            let linear = self.grid.linear_index(&index);
                            if fixed[linear] {
                                continue;
                            }
                            // Work on the distance from this point's side of the surface.
                            let side = if outside[linear] { 1.0 } else { -1.0 };
                            let mut upwind = [f64::INFINITY; 3];
                            for (axis, slot) in upwind.iter_mut().enumerate().take(dim) {
                                for offset in [-1, 1] {
                                    let Some(n) = self.grid.neighbor(&index, axis, offset) else {
                                        continue;
                                    };
                                    let n_linear = self.grid.linear_index(&n);
                                    if !fixed[n_linear] && outside[n_linear] != outside[linear] {
                                        continue;
                                    }
                                    *slot = slot.min(side * signed[n_linear]);
                                }
                            }
                            let candidate = solve_eikonal(upwind, dim, delta);
                            if candidate < side * signed[linear] {
                                signed[linear] = side * candidate;
                            }
                        }
                    }
                }
            }
        }

        for (linear, value) in self.values.iter_mut().enumerate() {
            if !fixed[linear] && signed[linear].is_finite() {
                *value = signed[linear];
            }
        }
    }

    /// Grows the grid along the vertical axis, extrapolating away from the surface with
    /// unit slope.
    pub fn extend_vertical(&mut self, below: usize, above: usize) -> Result<(), LevelSetError> {
        if below == 0 && above == 0 {
            return Ok(());
        }
        let vertical = self.grid.vertical_axis();
        let old_min = self.grid.min_index()[vertical];
        let old_max = self.grid.max_index()[vertical];
        let new_grid = self
            .grid
            .with_vertical_range(old_min - below as i64, old_max + above as i64)?;
        let delta = self.grid.delta();

        let values = new_grid
            .indices()
            .map(|index| {
                let v = index[vertical];
                let mut source = index;
                source[vertical] = v.clamp(old_min, old_max);
                let base = self.value(&source);
                let extra = (v - source[vertical]).unsigned_abs() as f64 * delta;
                base + base.signum() * extra
            })
            .collect();

        self.grid = new_grid;
        self.values = values;
        Ok(())
    }

    /// Range of the vertical coordinate covered by the narrow band.
    pub fn vertical_surface_range(&self) -> Option<(f64, f64)> {
        let vertical = self.grid.vertical_axis();
        let delta = self.grid.delta();
        self.active_points().iter().fold(None, |acc, index| {
            let z = index[vertical] as f64 * delta;
            Some(match acc {
                None => (z, z),
                Some((lo, hi)) => (f64::min(lo, z), f64::max(hi, z)),
            })
        })
    }

    pub fn validate(&self) -> Result<(), LevelSetError> {
        let count = self.values.iter().filter(|v| !v.is_finite()).count();
        if count > 0 {
            return Err(LevelSetError::NonFinite { count });
        }
        if self.interface_points().is_empty() {
            return Err(LevelSetError::NoInterface);
        }
        Ok(())
    }
}

/// Upwind solution of `|grad u| = 1` from the smallest neighbour distance on each axis.
fn solve_eikonal(upwind: [f64; 3], dim: usize, h: f64) -> f64 {
    let mut a = upwind;
    a[..dim].sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
    if !a[0].is_finite() {
        return f64::INFINITY;
    }

    let mut u = a[0] + h;
    if dim >= 2 && u > a[1] {
        let diff = a[0] - a[1];
        u = 0.5 * (a[0] + a[1] + (2.0 * h * h - diff * diff).max(0.0).sqrt());
        if dim == 3 && u > a[2] {
            let sum = a[0] + a[1] + a[2];
            let sum_sq = a[0] * a[0] + a[1] * a[1] + a[2] * a[2];
            let discriminant = sum * sum - 3.0 * (sum_sq - h * h);
            u = (sum + discriminant.max(0.0).sqrt()) / 3.0;
        }
    }
    u
}
