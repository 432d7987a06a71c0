use super::point_data::PointData;
use super::single_particle::StickingParticle;
use super::traits::{ProcessModel, SurfaceModel};
use super::{ModelError, require_data, require_finite, require_probability};
use crate::core::surface::SurfacePointCloud;

pub const FLUX_P1: &str = "particle_flux_1";
pub const FLUX_P2: &str = "particle_flux_2";

/// Sticking and reaction kinetics of one TEOS precursor species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeosParticleParameters {
    pub sticking_probability: f64,
    pub rate: f64,
    pub order: f64,
}

impl TeosParticleParameters {
    fn validate(&self) -> Result<(), ModelError> {
        require_probability("sticking_probability", self.sticking_probability)?;
        require_finite("rate", self.rate)?;
        require_finite("order", self.order)
    }

    #[inline]
    fn velocity(&self, flux: f64) -> f64 {
        self.rate * flux.powf(self.order)
    }
}

/// TEOS (tetraethyl orthosilicate) SiO2 deposition with one or two precursor species.
///
/// The growth rate is `rate_1 * flux_1^order_1`, plus `rate_2 * flux_2^order_2` in the two
/// particle variant.
#[derive(Debug, Clone, PartialEq)]
pub struct TeosDeposition {
    first: TeosParticleParameters,
    second: Option<TeosParticleParameters>,
}

impl TeosDeposition {
    pub fn single(first: TeosParticleParameters) -> Result<Self, ModelError> {
        first.validate()?;
        Ok(Self {
            first,
            second: None,
        })
    }

    pub fn multi(
        first: TeosParticleParameters,
        second: TeosParticleParameters,
    ) -> Result<Self, ModelError> {
        first.validate()?;
        second.validate()?;
        Ok(Self {
            first,
            second: Some(second),
        })
    }

    pub fn first(&self) -> &TeosParticleParameters {
        &self.first
    }

    pub fn second(&self) -> Option<&TeosParticleParameters> {
        self.second.as_ref()
    }

    pub fn process_model(&self) -> Result<ProcessModel, ModelError> {
        let surface = TeosSurfaceModel {
            first: self.first,
            second: self.second,
        };
        let mut model = ProcessModel::new("TEOSDeposition", Box::new(surface)).with_particle(
            Box::new(StickingParticle::new(
                self.first.sticking_probability,
                1.0,
                FLUX_P1,
            )?),
        );
        if let Some(second) = &self.second {
            model = model.with_particle(Box::new(StickingParticle::new(
                second.sticking_probability,
                1.0,
                FLUX_P2,
            )?));
        }
        Ok(model)
    }
}

#[derive(Debug, Clone)]
struct TeosSurfaceModel {
    first: TeosParticleParameters,
    second: Option<TeosParticleParameters>,
}

impl SurfaceModel for TeosSurfaceModel {
    fn calculate_velocities(
        &mut self,
        rates: &PointData,
        surface: &SurfacePointCloud,
    ) -> Result<Vec<f64>, ModelError> {
        let n = surface.len();
        let first_flux = require_data(rates, FLUX_P1, n)?;
        let mut velocities: Vec<f64> = first_flux
            .iter()
            .map(|&f| self.first.velocity(f))
            .collect();

        if let Some(second) = &self.second {
            let second_flux = require_data(rates, FLUX_P2, n)?;
            for (v, &f) in velocities.iter_mut().zip(second_flux) {
                *v += second.velocity(f);
            }
        }
        Ok(velocities)
    }
}
