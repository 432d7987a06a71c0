use super::domain::DomainError;
use super::grid::{BoundaryCondition, GridError};
use nalgebra::Point3;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod hole;
pub mod plane;
pub mod trench;

pub use hole::HoleGeometry;
pub use plane::PlaneGeometry;
pub use trench::TrenchGeometry;

/// Free cells kept between the geometry and the vertical grid bounds.
const VERTICAL_PADDING_CELLS: f64 = 5.0;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("Invalid geometry parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    #[default]
    Two,
    Three,
}

impl Dimension {
    pub fn value(&self) -> usize {
        match self {
            Dimension::Two => 2,
            Dimension::Three => 3,
        }
    }
}

impl TryFrom<usize> for Dimension {
    type Error = GridError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Dimension::Two),
            3 => Ok(Dimension::Three),
            other => Err(GridError::InvalidDimension(other)),
        }
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2" | "2d" => Ok(Dimension::Two),
            "3" | "3d" => Ok(Dimension::Three),
            other => Err(format!("Invalid dimension '{}', expected 2 or 3", other)),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}D", self.value())
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), GeometryError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GeometryError::InvalidParameter {
            name,
            reason: format!("must be positive, got {}", value),
        })
    }
}

fn require_non_negative(name: &'static str, value: f64) -> Result<(), GeometryError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(GeometryError::InvalidParameter {
            name,
            reason: format!("must be non-negative, got {}", value),
        })
    }
}

fn require_finite(name: &'static str, value: f64) -> Result<(), GeometryError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::InvalidParameter {
            name,
            reason: format!("must be finite, got {}", value),
        })
    }
}

fn lateral_boundary(periodic: bool) -> BoundaryCondition {
    if periodic {
        BoundaryCondition::Periodic
    } else {
        BoundaryCondition::Reflective
    }
}

fn vertical_padding(grid_delta: f64) -> f64 {
    VERTICAL_PADDING_CELLS * grid_delta
}

#[inline]
fn vertical(point: &Point3<f64>, dim: Dimension) -> f64 {
    point[dim.value() - 1]
}

/// Signed distance to the region below `height`.
#[inline]
fn half_space_below(point: &Point3<f64>, dim: Dimension, height: f64) -> f64 {
    vertical(point, dim) - height
}

/// Signed distance to a tapered opening whose half width is `half_width` at `top` and shrinks
/// by `tan(taper)` per unit of depth, limited below by `bottom`. `lateral` is the distance from
/// the opening axis.
fn tapered_opening(
    lateral: f64,
    vertical: f64,
    half_width: f64,
    top: f64,
    bottom: f64,
    taper_rad: f64,
) -> f64 {
    let wall = (lateral - half_width + (top - vertical) * taper_rad.tan()) * taper_rad.cos();
    wall.max(bottom - vertical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_parses_common_spellings() {
        assert_eq!("2".parse::<Dimension>().unwrap(), Dimension::Two);
        assert_eq!("3D".parse::<Dimension>().unwrap(), Dimension::Three);
        assert!("4".parse::<Dimension>().is_err());
        assert_eq!(Dimension::try_from(3).unwrap(), Dimension::Three);
        assert_eq!(
            Dimension::try_from(1).unwrap_err(),
            GridError::InvalidDimension(1)
        );
    }

    #[test]
    fn tapered_opening_is_negative_inside_and_positive_outside() {
        assert!(tapered_opening(0.0, -1.0, 1.0, 0.0, -2.0, 0.0) < 0.0);
        assert!(tapered_opening(1.5, -1.0, 1.0, 0.0, -2.0, 0.0) > 0.0);
        assert!(tapered_opening(0.0, -2.5, 1.0, 0.0, -2.0, 0.0) > 0.0);

        let taper = 30f64.to_radians();
        // The wall moves inwards with depth.
        assert!(tapered_opening(0.9, 0.0, 1.0, 0.0, -2.0, taper) < 0.0);
        assert!(tapered_opening(0.9, -1.0, 1.0, 0.0, -2.0, taper) > 0.0);
    }

    #[test]
    fn validation_helpers_reject_bad_values() {
        assert!(require_positive("x", 0.0).is_err());
        assert!(require_positive("x", f64::NAN).is_err());
        assert!(require_non_negative("x", 0.0).is_ok());
        assert!(require_finite("x", f64::INFINITY).is_err());
    }
}
