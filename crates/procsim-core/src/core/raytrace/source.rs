use super::RayRng;
use super::ray::Ray;
use super::reflection::project_to_dimension;
use crate::core::grid::Grid;
use crate::core::surface::SurfacePointCloud;
use nalgebra::{Point3, Vector3};
use rand::Rng;
use std::f64::consts::PI;

/// Height of the source plane above the highest surface point, in grid spacings.
const SOURCE_OFFSET_CELLS: f64 = 2.0;

/// The plane rays are launched from, spanning the lateral extent of the domain.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePlane {
    dim: usize,
    height: f64,
    lower: [f64; 2],
    upper: [f64; 2],
}

impl SourcePlane {
    pub fn new(grid: &Grid, surface: &SurfacePointCloud) -> Option<Self> {
        let vertical = grid.vertical_axis();
        let (_, highest) = surface.bounds()?;
        let dim = grid.dim();
        let mut lower = [0.0; 2];
        let mut upper = [0.0; 2];
        for axis in 0..dim - 1 {
            let (lo, hi) = grid.lateral_bounds(axis);
            lower[axis] = lo;
            upper[axis] = hi;
        }
        Some(Self {
            dim,
            height: highest[vertical] + SOURCE_OFFSET_CELLS * grid.delta(),
            lower,
            upper,
        })
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Length (2D) or area (3D) of the source plane.
    pub fn area(&self) -> f64 {
        (0..self.dim - 1)
            .map(|axis| self.upper[axis] - self.lower[axis])
            .product()
    }

    /// Samples a ray with a uniformly distributed origin and a direction following
    /// `cos^power` around the downward vertical.
    pub fn sample(&self, rng: &mut RayRng, power: f64) -> Ray {
        let mut origin = Point3::origin();
        for axis in 0..self.dim - 1 {
            origin[axis] = rng.gen_range(self.lower[axis]..=self.upper[axis]);
        }
        origin[self.dim - 1] = self.height;
        Ray::new(origin, self.sample_direction(rng, power))
    }

    fn sample_direction(&self, rng: &mut RayRng, power: f64) -> Vector3<f64> {
        loop {
            let cos_theta = rng.r#gen::<f64>().powf(1.0 / (power + 1.0));
            let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
            let phi = 2.0 * PI * rng.r#gen::<f64>();
            let (a, b) = (sin_theta * phi.cos(), sin_theta * phi.sin());
            let direction = if self.dim == 2 {
                Vector3::new(a, -cos_theta, b)
            } else {
                Vector3::new(a, b, -cos_theta)
            };
            if let Some(direction) = project_to_dimension(direction, self.dim) {
                if direction[self.dim - 1] < 0.0 {
                    return direction;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::BoundaryCondition;
    use crate::core::material::Material;
    use crate::core::surface::SurfacePoint;
    use rand::SeedableRng;

    fn flat_surface(grid: &Grid, height_index: i64) -> SurfacePointCloud {
        let points = (-4..=4)
            .map(|i| {
                let index = [i, height_index, 0];
                SurfacePoint {
                    index,
                    position: grid.coordinate(&index),
                    normal: Vector3::y(),
                    material: Material::Si,
                }
            })
            .collect();
        SurfacePointCloud::new(points, grid)
    }

    fn grid(boundary: BoundaryCondition) -> Grid {
        Grid::new(2, 0.5, [-4, -4, 0], [4, 4, 0], boundary).unwrap()
    }

    #[test]
    fn source_sits_two_cells_above_the_surface() {
        let grid = grid(BoundaryCondition::Reflective);
        let source = SourcePlane::new(&grid, &flat_surface(&grid, 1)).unwrap();
        assert!((source.height() - 1.5).abs() < 1e-12);
        assert!((source.area() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn periodic_source_covers_one_full_period() {
        let grid = grid(BoundaryCondition::Periodic);
        let source = SourcePlane::new(&grid, &flat_surface(&grid, 0)).unwrap();
        assert!((source.area() - 4.5).abs() < 1e-12);
    }

    #[test]
    fn sampled_rays_start_on_the_plane_and_point_down() {
        let grid = grid(BoundaryCondition::Reflective);
        let source = SourcePlane::new(&grid, &flat_surface(&grid, 0)).unwrap();
        let mut rng = RayRng::seed_from_u64(1);
        for _ in 0..1000 {
            let ray = source.sample(&mut rng, 1.0);
            assert!((ray.origin.y - source.height()).abs() < 1e-12);
            assert!(ray.origin.x >= -2.0 && ray.origin.x <= 2.0);
            assert!(ray.direction.y < 0.0);
            assert_eq!(ray.direction.z, 0.0);
        }
    }

    #[test]
    fn high_power_source_is_nearly_vertical() {
        let grid = grid(BoundaryCondition::Reflective);
        let source = SourcePlane::new(&grid, &flat_surface(&grid, 0)).unwrap();
        let mut rng = RayRng::seed_from_u64(2);
        let mean_cos: f64 = (0..2000)
            .map(|_| -source.sample(&mut rng, 500.0).direction.y)
            .sum::<f64>()
            / 2000.0;
        assert!(mean_cos > 0.99);
    }

    #[test]
    fn empty_surface_has_no_source() {
        let grid = grid(BoundaryCondition::Reflective);
        let empty = SurfacePointCloud::new(Vec::new(), &grid);
        assert!(SourcePlane::new(&grid, &empty).is_none());
    }
}
