use super::trench::{Opening, validate_taper};
use super::{Dimension, GeometryError, require_finite, require_non_negative, require_positive};
use crate::core::domain::Domain;
use crate::core::material::Material;
use tracing::debug;

/// A cylindrical hole in 3D. In 2D the cross-section is a trench of width `2 * hole_radius`.
#[derive(Debug, Clone, PartialEq)]
pub struct HoleGeometry {
    pub grid_delta: f64,
    pub x_extent: f64,
    pub y_extent: f64,
    pub hole_radius: f64,
    pub hole_depth: f64,
    pub taper_angle: f64,
    pub base_height: f64,
    pub periodic_boundary: bool,
    pub make_mask: bool,
    pub material: Material,
}

impl Default for HoleGeometry {
    fn default() -> Self {
        Self {
            grid_delta: 0.1,
            x_extent: 1.0,
            y_extent: 1.0,
            hole_radius: 0.2,
            hole_depth: 0.4,
            taper_angle: 0.0,
            base_height: 0.0,
            periodic_boundary: false,
            make_mask: false,
            material: Material::Si,
        }
    }
}

impl HoleGeometry {
    pub fn validate(&self, dim: Dimension) -> Result<(), GeometryError> {
        require_positive("grid_delta", self.grid_delta)?;
        require_positive("x_extent", self.x_extent)?;
        if dim == Dimension::Three {
            require_positive("y_extent", self.y_extent)?;
        }
        require_positive("hole_radius", self.hole_radius)?;
        require_non_negative("hole_depth", self.hole_depth)?;
        require_finite("base_height", self.base_height)?;

        let narrowest = match dim {
            Dimension::Two => self.x_extent,
            Dimension::Three => self.x_extent.min(self.y_extent),
        };
        if 2.0 * self.hole_radius >= narrowest {
            return Err(GeometryError::InvalidParameter {
                name: "hole_radius",
                reason: format!(
                    "hole diameter {} does not fit into the lateral extent {}",
                    2.0 * self.hole_radius,
                    narrowest
                ),
            });
        }
        validate_taper(self.taper_angle, self.hole_radius, self.hole_depth)
    }

    pub fn apply(&self, dim: Dimension) -> Result<Domain, GeometryError> {
        self.validate(dim)?;
        let opening = Opening {
            grid_delta: self.grid_delta,
            lateral_extents: [self.x_extent, self.y_extent],
            half_width: self.hole_radius,
            depth: self.hole_depth,
            taper_angle: self.taper_angle,
            base_height: self.base_height,
            periodic_boundary: self.periodic_boundary,
            make_mask: self.make_mask,
            material: self.material,
        };
        let domain = match dim {
            Dimension::Two => opening.build(dim, |p| p.x.abs())?,
            Dimension::Three => opening.build(dim, |p| (p.x * p.x + p.y * p.y).sqrt())?,
        };
        debug!(
            %dim,
            radius = self.hole_radius,
            depth = self.hole_depth,
            mask = self.make_mask,
            "Built hole geometry."
        );
        Ok(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_dimensional_hole_is_round() {
        let domain = HoleGeometry::default().apply(Dimension::Three).unwrap();
        let top = domain.top_level_set().unwrap();
        assert!(top.value(&[0, 0, -2]) > 0.0);
        assert!(top.value(&[1, 1, -2]) > 0.0);
        // (0.2, 0.2) lies outside the radius.
        assert!(top.value(&[3, 0, -2]) < 0.0);
        assert!(top.value(&[2, 2, -2]) < 0.0);
        assert!(top.value(&[0, 4, -2]) < 0.0);
    }

    #[test]
    fn two_dimensional_hole_matches_a_trench() {
        let hole = HoleGeometry::default().apply(Dimension::Two).unwrap();
        let trench = super::super::TrenchGeometry {
            trench_width: 0.4,
            trench_depth: 0.4,
            ..Default::default()
        }
        .apply(Dimension::Two)
        .unwrap();
        assert_eq!(
            hole.top_level_set().unwrap(),
            trench.top_level_set().unwrap()
        );
    }

    #[test]
    fn rejects_holes_wider_than_the_domain() {
        let hole = HoleGeometry {
            hole_radius: 0.6,
            ..Default::default()
        };
        assert!(matches!(
            hole.apply(Dimension::Three),
            Err(GeometryError::InvalidParameter { name: "hole_radius", .. })
        ));
    }
}
