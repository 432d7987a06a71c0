use thiserror::Error;

pub mod point_data;
pub mod sf6o2;
pub mod single_particle;
pub mod teos;
pub mod traits;

pub use point_data::PointData;
pub use sf6o2::{Sf6O2Etching, Sf6O2Parameters};
pub use single_particle::{SingleParticleProcess, StickingParticle};
pub use teos::{TeosDeposition, TeosParticleParameters};
pub use traits::{Particle, ProcessModel, Reflection, SurfaceHit, SurfaceModel};

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Invalid model parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Required point data '{0}' is missing")]
    MissingData(String),
    #[error("Point data '{label}' has {found} values, expected {expected}")]
    LengthMismatch {
        label: String,
        expected: usize,
        found: usize,
    },
}

/// Looks up a rate array and checks that it covers every surface point.
pub(crate) fn require_data<'a>(
    data: &'a PointData,
    label: &str,
    expected: usize,
) -> Result<&'a [f64], ModelError> {
    let values = data
        .get(label)
        .ok_or_else(|| ModelError::MissingData(label.to_string()))?;
    if values.len() != expected {
        return Err(ModelError::LengthMismatch {
            label: label.to_string(),
            expected,
            found: values.len(),
        });
    }
    Ok(values)
}

pub(crate) fn require_probability(name: &'static str, value: f64) -> Result<(), ModelError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ModelError::InvalidParameter {
            name,
            reason: format!("must lie in [0, 1], got {}", value),
        })
    }
}

pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<(), ModelError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ModelError::InvalidParameter {
            name,
            reason: format!("must be finite, got {}", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_data_checks_presence_and_length() {
        let mut data = PointData::new();
        data.insert("flux", vec![1.0, 2.0]);
        assert!(require_data(&data, "flux", 2).is_ok());
        assert_eq!(
            require_data(&data, "other", 2),
            Err(ModelError::MissingData("other".into()))
        );
        assert!(matches!(
            require_data(&data, "flux", 3),
            Err(ModelError::LengthMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn probabilities_outside_unit_interval_are_rejected() {
        assert!(require_probability("s", 0.0).is_ok());
        assert!(require_probability("s", 1.0).is_ok());
        assert!(require_probability("s", 1.5).is_err());
        assert!(require_probability("s", f64::NAN).is_err());
    }
}
