//! Monte-Carlo flux estimation on the surface disks.
//!
//! Rays are launched from the source plane in fixed-size chunks. Every chunk owns its own
//! random stream seeded from the chunk index, and chunk results are summed in chunk order, so
//! the estimate does not depend on the number of worker threads.

use super::error::EngineError;
use crate::core::grid::{BoundaryCondition, Grid};
use crate::core::models::{Particle, PointData, SurfaceHit};
use crate::core::raytrace::{DiskBvh, Ray, RayRng, SourcePlane};
use crate::core::surface::SurfacePointCloud;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const RAYS_PER_CHUNK: usize = 4096;
const ROULETTE_THRESHOLD: f64 = 0.1;
const ROULETTE_RENEWAL: f64 = 0.3;
const MAX_SURFACE_EVENTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Exit {
    /// The ray climbs back through the source plane or falls below the grid.
    Leave,
    Lateral { axis: usize, upper: bool },
}

pub struct Tracer<'a> {
    grid: &'a Grid,
    surface: &'a SurfacePointCloud,
    bvh: DiskBvh,
    source: SourcePlane,
    /// Fraction of each disk that lies inside the lateral domain bounds.
    inside_fractions: Vec<f64>,
    rays_per_point: usize,
    smoothing: bool,
}

impl<'a> Tracer<'a> {
    pub fn new(
        grid: &'a Grid,
        surface: &'a SurfacePointCloud,
        rays_per_point: usize,
        smoothing: bool,
    ) -> Result<Self, EngineError> {
        if surface.is_empty() {
            return Err(EngineError::NoSurface);
        }
        let source = SourcePlane::new(grid, surface).ok_or(EngineError::NoSurface)?;
        Ok(Self {
            grid,
            surface,
            bvh: DiskBvh::build(surface),
            source,
            inside_fractions: inside_fractions(grid, surface),
            rays_per_point,
            smoothing,
        })
    }

    pub fn num_rays(&self) -> usize {
        self.rays_per_point * self.surface.len()
    }

    pub fn source(&self) -> &SourcePlane {
        &self.source
    }

    /// Traces every particle type and returns the normalized rates under the particles'
    /// local data labels.
    #[instrument(skip_all, name = "trace_particles", fields(points = self.surface.len()))]
    pub fn trace(
        &self,
        particles: &[Box<dyn Particle>],
        global: Option<&PointData>,
        seed: u64,
    ) -> PointData {
        let mut rates = PointData::new();
        for (slot, particle) in particles.iter().enumerate() {
            let data = self.trace_particle(particle.as_ref(), global, mix_seed(seed, slot as u64));
            rates.extend(data);
        }
        rates
    }

    fn trace_particle(
        &self,
        particle: &dyn Particle,
        global: Option<&PointData>,
        seed: u64,
    ) -> PointData {
        let labels = particle.local_data_labels();
        let num_rays = self.num_rays();
        let chunks: Vec<usize> = (0..num_rays.div_ceil(RAYS_PER_CHUNK)).collect();
        debug!(num_rays, chunks = chunks.len(), "Tracing particle type.");

        #[cfg(not(feature = "parallel"))]
        let iterator = chunks.iter();

        #[cfg(feature = "parallel")]
        let iterator = chunks.par_iter();

        let partials: Vec<Vec<Vec<f64>>> = iterator
            .map(|&chunk| {
                let rays = RAYS_PER_CHUNK.min(num_rays - chunk * RAYS_PER_CHUNK);
                self.trace_chunk(
                    particle,
                    global,
                    rays,
                    labels.len(),
                    mix_seed(seed, chunk as u64),
                )
            })
            .collect();

        let mut totals = vec![vec![0.0; self.surface.len()]; labels.len()];
        for partial in partials {
            for (total, part) in totals.iter_mut().zip(partial) {
                for (t, p) in total.iter_mut().zip(part) {
                    *t += p;
                }
            }
        }

        let factor = self.normalization(num_rays);
        let mut data = PointData::new();
        for (label, mut values) in labels.iter().zip(totals) {
            for (value, fraction) in values.iter_mut().zip(&self.inside_fractions) {
                *value *= factor / fraction;
            }
            if self.smoothing {
                values = self.smooth(&values);
            }
            data.insert(label, values);
        }
        data
    }

    fn trace_chunk(
        &self,
        prototype: &dyn Particle,
        global: Option<&PointData>,
        num_rays: usize,
        num_labels: usize,
        seed: u64,
    ) -> Vec<Vec<f64>> {
        let mut rng = RayRng::seed_from_u64(seed);
        let mut particle = prototype.clone_box();
        let mut local = vec![vec![0.0; self.surface.len()]; num_labels];
        let power = particle.source_distribution_power();
        for _ in 0..num_rays {
            particle.initialize_new(&mut rng);
            let ray = self.source.sample(&mut rng, power);
            self.follow_ray(particle.as_mut(), ray, &mut local, global, &mut rng);
        }
        local
    }

    fn follow_ray(
        &self,
        particle: &mut dyn Particle,
        mut ray: Ray,
        local: &mut [Vec<f64>],
        global: Option<&PointData>,
        rng: &mut RayRng,
    ) {
        let points = self.surface.points();
        let dim = self.grid.dim();
        let mut weight = 1.0;
        let mut skip = None;

        for _ in 0..MAX_SURFACE_EVENTS {
            let hit = self.bvh.closest_hit(&ray, skip);
            if let Some((t_exit, exit)) = self.next_exit(&ray) {
                if hit.is_none_or(|h| h.t > t_exit) {
                    match self.cross_boundary(&ray, t_exit, exit) {
                        Some(next) => {
                            ray = next;
                            skip = None;
                            continue;
                        }
                        None => return,
                    }
                }
            }
            let Some(hit) = hit else {
                return;
            };

            let point = &points[hit.disk];
            let surface_hit = SurfaceHit {
                disk: hit.disk,
                direction: ray.direction,
                normal: point.normal,
                material: point.material,
                dim,
            };
            particle.surface_collision(weight, &surface_hit, local, global, rng);
            for &neighbor in self.surface.neighbors(hit.disk) {
                let Some(t) = self.bvh.intersect_disk(&ray, neighbor) else {
                    continue;
                };
                if (t - hit.t).abs() <= self.grid.delta() {
                    let other = &points[neighbor];
                    let neighbor_hit = SurfaceHit {
                        disk: neighbor,
                        normal: other.normal,
                        material: other.material,
                        ..surface_hit
                    };
                    particle.surface_collision(weight, &neighbor_hit, local, global, rng);
                }
            }

            let reflection = particle.surface_reflection(weight, &surface_hit, global, rng);
            weight *= 1.0 - reflection.sticking;
            if weight <= 0.0 || reflection.direction.norm_squared() == 0.0 {
                return;
            }
            if weight < ROULETTE_THRESHOLD {
                if rng.r#gen::<f64>() * ROULETTE_RENEWAL > weight {
                    return;
                }
                weight = ROULETTE_RENEWAL;
            }

            ray = Ray::new(ray.at(hit.t), reflection.direction);
            skip = Some(hit.disk);
        }
    }

    /// Nearest crossing of the source plane or a lateral domain bound.
    fn next_exit(&self, ray: &Ray) -> Option<(f64, Exit)> {
        let vertical = self.grid.vertical_axis();
        let mut best: Option<(f64, Exit)> = None;

        let up = ray.direction[vertical];
        let floor = self.grid.min_index()[vertical] as f64 * self.grid.delta();
        if up > 0.0 {
            let t = (self.source.height() - ray.origin[vertical]) / up;
            best = Some((t.max(0.0), Exit::Leave));
        } else if up < 0.0 {
            let t = (floor - ray.origin[vertical]) / up;
            best = Some((t.max(0.0), Exit::Leave));
        }

        for axis in 0..vertical {
            let (lower, upper) = self.grid.lateral_bounds(axis);
            let d = ray.direction[axis];
            let (t, towards_upper) = if d > 0.0 {
                ((upper - ray.origin[axis]) / d, true)
            } else if d < 0.0 {
                ((lower - ray.origin[axis]) / d, false)
            } else {
                continue;
            };
            let t = t.max(0.0);
            if best.is_none_or(|(best_t, _)| t < best_t) {
                best = Some((
                    t,
                    Exit::Lateral {
                        axis,
                        upper: towards_upper,
                    },
                ));
            }
        }
        best
    }

    /// Continues a ray across a lateral bound, or ends it.
    fn cross_boundary(&self, ray: &Ray, t: f64, exit: Exit) -> Option<Ray> {
        let Exit::Lateral { axis, upper } = exit else {
            return None;
        };
        let (lower_bound, upper_bound) = self.grid.lateral_bounds(axis);
        let mut origin = ray.at(t);
        let mut direction = ray.direction;
        match self.grid.boundary(axis) {
            BoundaryCondition::Reflective => {
                origin[axis] = if upper { upper_bound } else { lower_bound };
                direction[axis] = -direction[axis];
            }
            BoundaryCondition::Periodic => {
                origin[axis] = if upper { lower_bound } else { upper_bound };
            }
            BoundaryCondition::Infinite => return None,
        }
        Some(Ray::new(origin, direction))
    }

    fn normalization(&self, num_rays: usize) -> f64 {
        let radius = self.surface.disk_radius();
        let disk_area = if self.grid.dim() == 2 {
            2.0 * radius
        } else {
            PI * radius * radius
        };
        self.source.area() / (num_rays as f64 * disk_area)
    }

    /// Averages each value with its neighbours that face the same way.
    fn smooth(&self, values: &[f64]) -> Vec<f64> {
        let points = self.surface.points();
        (0..values.len())
            .map(|id| {
                let normal = &points[id].normal;
                let (sum, count) = self
                    .surface
                    .neighbors(id)
                    .iter()
                    .filter(|&&n| points[n].normal.dot(normal) > 0.0)
                    .fold((values[id], 1usize), |(sum, count), &n| {
                        (sum + values[n], count + 1)
                    });
                sum / count as f64
            })
            .collect()
    }
}

/// Disks centred on a lateral bound stick out of the domain, and rays never reach the outer
/// part. Each disk's share inside the bounds is estimated from its projected extent per axis.
fn inside_fractions(grid: &Grid, surface: &SurfacePointCloud) -> Vec<f64> {
    let radius = surface.disk_radius();
    surface
        .points()
        .iter()
        .map(|point| {
            (0..grid.vertical_axis())
                .map(|axis| {
                    let (lower, upper) = grid.lateral_bounds(axis);
                    let n = point.normal[axis];
                    let half = radius * (1.0 - n * n).max(0.0).sqrt();
                    if half < 1e-12 * radius {
                        return 1.0;
                    }
                    let center = point.position[axis];
                    let overlap = (center + half).min(upper) - (center - half).max(lower);
                    (overlap / (2.0 * half)).clamp(f64::EPSILON, 1.0)
                })
                .product::<f64>()
        })
        .collect()
}

/// SplitMix64 step over `seed + stream`, giving independent seeds per particle and chunk.
fn mix_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed.wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
