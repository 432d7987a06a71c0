use super::ModelError;
use super::point_data::PointData;
use crate::core::material::Material;
use crate::core::raytrace::RayRng;
use crate::core::surface::SurfacePointCloud;
use nalgebra::Vector3;

/// Where and how a ray met the surface.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceHit {
    /// Surface point (disk) id.
    pub disk: usize,
    /// Unit direction of the incoming ray.
    pub direction: Vector3<f64>,
    /// Outward unit normal of the disk.
    pub normal: Vector3<f64>,
    pub material: Material,
    pub dim: usize,
}

impl SurfaceHit {
    /// Cosine of the incidence angle, clamped to `[0, 1]`.
    pub fn cos_incidence(&self) -> f64 {
        (-self.direction.dot(&self.normal)).clamp(0.0, 1.0)
    }
}

/// Outcome of a surface interaction: the fraction of the ray weight that sticks and the
/// direction the remainder travels on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reflection {
    pub sticking: f64,
    pub direction: Vector3<f64>,
}

impl Reflection {
    pub fn absorbed() -> Self {
        Self {
            sticking: 1.0,
            direction: Vector3::zeros(),
        }
    }
}

/// A particle species traced from the source plane.
///
/// A fresh clone is made for every batch of rays, so implementations may keep per-ray state
/// (such as the current energy) in `self`.
pub trait Particle: Send + Sync {
    /// Called before each new ray is launched.
    fn initialize_new(&mut self, _rng: &mut RayRng) {}

    /// Records the contribution of a hit into `local`, one array per local data label.
    fn surface_collision(
        &mut self,
        weight: f64,
        hit: &SurfaceHit,
        local: &mut [Vec<f64>],
        global: Option<&PointData>,
        rng: &mut RayRng,
    );

    fn surface_reflection(
        &mut self,
        weight: f64,
        hit: &SurfaceHit,
        global: Option<&PointData>,
        rng: &mut RayRng,
    ) -> Reflection;

    /// Exponent of the cosine distribution of source directions.
    fn source_distribution_power(&self) -> f64 {
        1.0
    }

    fn local_data_labels(&self) -> Vec<String>;

    fn clone_box(&self) -> Box<dyn Particle>;
}

/// Turns fluxes into surface velocities, optionally through surface coverages.
pub trait SurfaceModel: Send + Sync {
    fn initialize_coverages(&mut self, _num_points: usize) {}

    fn coverages(&self) -> Option<&PointData> {
        None
    }

    fn coverages_mut(&mut self) -> Option<&mut PointData> {
        None
    }

    fn update_coverages(
        &mut self,
        _rates: &PointData,
        _materials: &[Material],
    ) -> Result<(), ModelError> {
        Ok(())
    }

    /// Velocity per surface point. Positive values deposit material, negative values etch.
    fn calculate_velocities(
        &mut self,
        rates: &PointData,
        surface: &SurfacePointCloud,
    ) -> Result<Vec<f64>, ModelError>;
}

/// A complete process: the particle species to trace and the surface model consuming them.
pub struct ProcessModel {
    name: String,
    particles: Vec<Box<dyn Particle>>,
    surface_model: Box<dyn SurfaceModel>,
}

impl ProcessModel {
    pub fn new(name: impl Into<String>, surface_model: Box<dyn SurfaceModel>) -> Self {
        Self {
            name: name.into(),
            particles: Vec::new(),
            surface_model,
        }
    }

    pub fn with_particle(mut self, particle: Box<dyn Particle>) -> Self {
        self.particles.push(particle);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn particles(&self) -> &[Box<dyn Particle>] {
        &self.particles
    }

    pub fn surface_model(&self) -> &dyn SurfaceModel {
        self.surface_model.as_ref()
    }

    pub fn surface_model_mut(&mut self) -> &mut dyn SurfaceModel {
        self.surface_model.as_mut()
    }

    /// Only meaningful once `initialize_coverages` has been called on the surface model.
    pub fn has_coverages(&self) -> bool {
        self.surface_model.coverages().is_some()
    }
}

impl std::fmt::Debug for ProcessModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessModel")
            .field("name", &self.name)
            .field("particles", &self.particles.len())
            .finish()
    }
}
