use super::grid::{Grid, GridIndex};
use super::material::Material;
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;

/// A surface sample: one disk centred on a narrow-band grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfacePoint {
    pub index: GridIndex,
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
    pub material: Material,
}

/// The discretized surface as seen by the ray tracer and the surface models.
#[derive(Debug, Clone)]
pub struct SurfacePointCloud {
    points: Vec<SurfacePoint>,
    disk_radius: f64,
    dim: usize,
    index_map: HashMap<GridIndex, usize>,
    neighbors: Vec<Vec<usize>>,
}

impl SurfacePointCloud {
    pub fn new(points: Vec<SurfacePoint>, grid: &Grid) -> Self {
        let dim = grid.dim();
        let disk_radius = 0.5 * (dim as f64).sqrt() * grid.delta() * (1.0 + 1e-5);
        let index_map: HashMap<GridIndex, usize> = points
            .iter()
            .enumerate()
            .map(|(id, p)| (p.index, id))
            .collect();

        let neighbors = points
            .iter()
            .enumerate()
            .map(|(id, point)| {
                let mut found: Vec<usize> = stencil(grid, &point.index)
                    .into_iter()
                    .filter_map(|index| index_map.get(&index).copied())
                    .filter(|&other| other != id)
                    .collect();
                found.sort_unstable();
                found.dedup();
                found
            })
            .collect();

        Self {
            points,
            disk_radius,
            dim,
            index_map,
            neighbors,
        }
    }

    pub fn points(&self) -> &[SurfacePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn disk_radius(&self) -> f64 {
        self.disk_radius
    }

    /// Surface points within the 3^D stencil around `id`, excluding `id` itself.
    pub fn neighbors(&self, id: usize) -> &[usize] {
        &self.neighbors[id]
    }

    pub fn index_map(&self) -> &HashMap<GridIndex, usize> {
        &self.index_map
    }

    pub fn grid_indices(&self) -> Vec<GridIndex> {
        self.points.iter().map(|p| p.index).collect()
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.points.iter().map(|p| p.position).collect()
    }

    pub fn normals(&self) -> Vec<Vector3<f64>> {
        self.points.iter().map(|p| p.normal).collect()
    }

    pub fn materials(&self) -> Vec<Material> {
        self.points.iter().map(|p| p.material).collect()
    }

    /// Axis-aligned bounds of all disk centres.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.points.first()?.position;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (lo.inf(&p.position), hi.sup(&p.position))
        }))
    }
}

/// Every grid index within one step along each axis, resolved through the boundaries.
fn stencil(grid: &Grid, center: &GridIndex) -> Vec<GridIndex> {
    let dim = grid.dim();
    let mut result = vec![*center];
    for axis in 0..dim {
        let mut expanded = Vec::with_capacity(result.len() * 3);
        for index in &result {
            expanded.push(*index);
            for offset in [-1, 1] {
                if let Some(n) = grid.neighbor(index, axis, offset) {
                    expanded.push(n);
                }
            }
        }
        result = expanded;
    }
    result
}
