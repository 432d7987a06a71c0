use super::point_data::PointData;
use super::traits::{Particle, ProcessModel, Reflection, SurfaceHit, SurfaceModel};
use super::{ModelError, require_data, require_finite, require_probability};
use crate::core::material::Material;
use crate::core::raytrace::RayRng;
use crate::core::raytrace::reflection::diffuse;
use crate::core::surface::SurfacePointCloud;

pub const PARTICLE_FLUX: &str = "particle_flux";

/// A neutral particle that sticks with a fixed probability and otherwise reflects diffusely.
#[derive(Debug, Clone, PartialEq)]
pub struct StickingParticle {
    sticking_probability: f64,
    source_power: f64,
    label: String,
}

impl StickingParticle {
    pub fn new(
        sticking_probability: f64,
        source_power: f64,
        label: impl Into<String>,
    ) -> Result<Self, ModelError> {
        require_probability("sticking_probability", sticking_probability)?;
        if !(source_power.is_finite() && source_power >= 0.0) {
            return Err(ModelError::InvalidParameter {
                name: "source_power",
                reason: format!("must be non-negative, got {}", source_power),
            });
        }
        Ok(Self {
            sticking_probability,
            source_power,
            label: label.into(),
        })
    }

    pub fn sticking_probability(&self) -> f64 {
        self.sticking_probability
    }
}

impl Particle for StickingParticle {
    fn surface_collision(
        &mut self,
        weight: f64,
        hit: &SurfaceHit,
        local: &mut [Vec<f64>],
        _global: Option<&PointData>,
        _rng: &mut RayRng,
    ) {
        local[0][hit.disk] += weight;
    }

    fn surface_reflection(
        &mut self,
        _weight: f64,
        hit: &SurfaceHit,
        _global: Option<&PointData>,
        rng: &mut RayRng,
    ) -> Reflection {
        Reflection {
            sticking: self.sticking_probability,
            direction: diffuse(&hit.normal, hit.dim, rng),
        }
    }

    fn source_distribution_power(&self) -> f64 {
        self.source_power
    }

    fn local_data_labels(&self) -> Vec<String> {
        vec![self.label.clone()]
    }

    fn clone_box(&self) -> Box<dyn Particle> {
        Box::new(self.clone())
    }
}

/// Deposition (positive rate) or etching (negative rate) proportional to a single flux.
/// Mask materials do not move.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleParticleProcess {
    pub rate: f64,
    pub sticking_probability: f64,
    pub source_power: f64,
    pub mask_materials: Vec<Material>,
}

impl SingleParticleProcess {
    pub fn new(
        rate: f64,
        sticking_probability: f64,
        source_power: f64,
        mask_materials: Vec<Material>,
    ) -> Result<Self, ModelError> {
        require_finite("rate", rate)?;
        // Validates sticking and power up front.
        StickingParticle::new(sticking_probability, source_power, PARTICLE_FLUX)?;
        Ok(Self {
            rate,
            sticking_probability,
            source_power,
            mask_materials,
        })
    }

    pub fn process_model(&self) -> Result<ProcessModel, ModelError> {
        let particle =
            StickingParticle::new(self.sticking_probability, self.source_power, PARTICLE_FLUX)?;
        let surface = SingleParticleSurfaceModel {
            rate: self.rate,
            mask_materials: self.mask_materials.clone(),
        };
        Ok(ProcessModel::new("SingleParticleProcess", Box::new(surface))
            .with_particle(Box::new(particle)))
    }
}

#[derive(Debug, Clone)]
struct SingleParticleSurfaceModel {
    rate: f64,
    mask_materials: Vec<Material>,
}

impl SurfaceModel for SingleParticleSurfaceModel {
    fn calculate_velocities(
        &mut self,
        rates: &PointData,
        surface: &SurfacePointCloud,
    ) -> Result<Vec<f64>, ModelError> {
        let flux = require_data(rates, PARTICLE_FLUX, surface.len())?;
        Ok(surface
            .points()
            .iter()
            .zip(flux)
            .map(|(point, &f)| {
                if self.mask_materials.contains(&point.material) {
                    0.0
                } else {
                    self.rate * f
                }
            })
            .collect())
    }
}
