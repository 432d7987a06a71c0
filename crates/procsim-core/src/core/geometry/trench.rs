use super::{
    Dimension, GeometryError, half_space_below, lateral_boundary, require_finite,
    require_non_negative, require_positive, tapered_opening, vertical, vertical_padding,
};
use crate::core::domain::Domain;
use crate::core::grid::Grid;
use crate::core::levelset::LevelSet;
use crate::core::material::Material;
use nalgebra::Point3;
use tracing::debug;

/// A trench running along the second lateral axis, or a plain 2D trench.
///
/// Without a mask the trench is cut `trench_depth` deep into the substrate. With a mask the
/// substrate stays flat at `base_height` and a `Mask` layer of thickness `trench_depth`, with
/// the trench opening cut through it, is placed on top.
#[derive(Debug, Clone, PartialEq)]
pub struct TrenchGeometry {
    pub grid_delta: f64,
    pub x_extent: f64,
    pub y_extent: f64,
    pub trench_width: f64,
    pub trench_depth: f64,
    /// Side wall angle in degrees. Positive values narrow the trench towards its bottom.
    pub taper_angle: f64,
    pub base_height: f64,
    pub periodic_boundary: bool,
    pub make_mask: bool,
    pub material: Material,
}

impl Default for TrenchGeometry {
    fn default() -> Self {
        Self {
            grid_delta: 0.1,
            x_extent: 1.0,
            y_extent: 1.0,
            trench_width: 0.4,
            trench_depth: 0.4,
            taper_angle: 0.0,
            base_height: 0.0,
            periodic_boundary: false,
            make_mask: false,
            material: Material::Si,
        }
    }
}

impl TrenchGeometry {
    pub fn validate(&self, dim: Dimension) -> Result<(), GeometryError> {
        require_positive("grid_delta", self.grid_delta)?;
        require_positive("x_extent", self.x_extent)?;
        if dim == Dimension::Three {
            require_positive("y_extent", self.y_extent)?;
        }
        require_positive("trench_width", self.trench_width)?;
        require_non_negative("trench_depth", self.trench_depth)?;
        require_finite("base_height", self.base_height)?;
        if self.trench_width >= self.x_extent {
            return Err(GeometryError::InvalidParameter {
                name: "trench_width",
                reason: format!(
                    "must be smaller than x_extent ({}), got {}",
                    self.x_extent, self.trench_width
                ),
            });
        }
        validate_taper(self.taper_angle, 0.5 * self.trench_width, self.trench_depth)
    }

    pub fn apply(&self, dim: Dimension) -> Result<Domain, GeometryError> {
        self.validate(dim)?;
        let opening = Opening {
            grid_delta: self.grid_delta,
            lateral_extents: [self.x_extent, self.y_extent],
            half_width: 0.5 * self.trench_width,
            depth: self.trench_depth,
            taper_angle: self.taper_angle,
            base_height: self.base_height,
            periodic_boundary: self.periodic_boundary,
            make_mask: self.make_mask,
            material: self.material,
        };
        let domain = opening.build(dim, |p| p.x.abs())?;
        debug!(
            %dim,
            width = self.trench_width,
            depth = self.trench_depth,
            mask = self.make_mask,
            "Built trench geometry."
        );
        Ok(domain)
    }
}

pub(super) fn validate_taper(
    taper_angle: f64,
    half_width: f64,
    depth: f64,
) -> Result<(), GeometryError> {
    require_finite("taper_angle", taper_angle)?;
    if taper_angle.abs() >= 90.0 {
        return Err(GeometryError::InvalidParameter {
            name: "taper_angle",
            reason: format!("must lie strictly between -90 and 90 degrees, got {}", taper_angle),
        });
    }
    let bottom_half_width = half_width - depth * taper_angle.to_radians().tan();
    if bottom_half_width <= 0.0 {
        return Err(GeometryError::InvalidParameter {
            name: "taper_angle",
            reason: format!(
                "side walls of {} degrees close the opening before depth {}",
                taper_angle, depth
            ),
        });
    }
    Ok(())
}

/// Shared construction of openings (trenches and holes) in a substrate or mask.
pub(super) struct Opening {
    pub grid_delta: f64,
    pub lateral_extents: [f64; 2],
    pub half_width: f64,
    pub depth: f64,
    pub taper_angle: f64,
    pub base_height: f64,
    pub periodic_boundary: bool,
    pub make_mask: bool,
    pub material: Material,
}

impl Opening {
    pub fn build<F>(&self, dim: Dimension, lateral: F) -> Result<Domain, GeometryError>
    where
        F: Fn(&Point3<f64>) -> f64,
    {
        let padding = vertical_padding(self.grid_delta);
        let (cut_depth, mask_height) = if self.make_mask {
            (0.0, self.depth)
        } else {
            (self.depth, 0.0)
        };
        let grid = Grid::from_extents(
            dim.value(),
            self.grid_delta,
            self.lateral_extents,
            self.base_height - cut_depth - padding,
            self.base_height + mask_height + padding,
            lateral_boundary(self.periodic_boundary),
        )?;

        let base = self.base_height;
        let taper = self.taper_angle.to_radians();
        let mut domain = Domain::new(grid.clone());

        if self.make_mask {
            let mut substrate = LevelSet::from_fn(grid.clone(), |p| half_space_below(p, dim, base));
            substrate.reinitialize();
            domain.insert_next_level_set(substrate, self.material, false)?;

            let top = base + mask_height;
            let mut mask = LevelSet::from_fn(grid, |p| {
                let v = vertical(p, dim);
                let slab = (v - top).max(base - v);
                let hole = tapered_opening(lateral(p), v, self.half_width, top, base, taper);
                slab.max(-hole)
            });
            mask.reinitialize();
            domain.insert_next_level_set(mask, Material::Mask, true)?;
        } else {
            let bottom = base - cut_depth;
            let mut substrate = LevelSet::from_fn(grid, |p| {
                let v = vertical(p, dim);
                let hole = tapered_opening(lateral(p), v, self.half_width, base, bottom, taper);
                (v - base).max(-hole)
            });
            substrate.reinitialize();
            domain.insert_next_level_set(substrate, self.material, false)?;
        }

        domain.validate()?;
        Ok(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trench() -> TrenchGeometry {
        TrenchGeometry {
            grid_delta: 0.1,
            x_extent: 1.0,
            y_extent: 1.0,
            trench_width: 0.4,
            trench_depth: 0.3,
            ..Default::default()
        }
    }

    #[test]
    fn trench_is_cut_into_the_substrate() {
        let domain = trench().apply(Dimension::Two).unwrap();
        assert_eq!(domain.len(), 1);
        let top = domain.top_level_set().unwrap();

        assert!(top.value(&[0, -2, 0]) > 0.0, "trench interior must be empty");
        assert!(top.value(&[4, -2, 0]) < 0.0, "beside the trench is material");
        assert!(top.value(&[0, -4, 0]) < 0.0, "below the trench is material");
        assert!(top.value(&[0, 2, 0]) > 0.0, "above the surface is empty");
    }

    #[test]
    fn trench_surface_covers_top_and_bottom() {
        let domain = trench().apply(Dimension::Two).unwrap();
        let surface = domain.surface_points().unwrap();
        let heights: Vec<f64> = surface.points().iter().map(|p| p.position.y).collect();
        assert!(heights.iter().any(|h| (h + 0.3).abs() < 1e-9));
        assert!(heights.iter().any(|h| h.abs() < 1e-9));
        assert!(surface.points().iter().all(|p| p.position.z == 0.0));
    }

    #[test]
    fn masked_trench_adds_a_mask_layer_on_a_flat_substrate() {
        let geometry = TrenchGeometry {
            make_mask: true,
            ..trench()
        };
        let domain = geometry.apply(Dimension::Two).unwrap();
        assert_eq!(domain.len(), 2);
        assert_eq!(domain.material_map().material_at(0), Some(Material::Si));
        assert_eq!(domain.material_map().top(), Some(Material::Mask));

        assert_eq!(domain.surface_material(&[4, 3, 0]), Material::Mask);
        assert_eq!(domain.surface_material(&[0, 0, 0]), Material::Si);
    }

    #[test]
    fn three_dimensional_trench_runs_along_y() {
        let domain = trench().apply(Dimension::Three).unwrap();
        let top = domain.top_level_set().unwrap();
        assert!(top.value(&[0, -4, -2]) > 0.0);
        assert!(top.value(&[0, 4, -2]) > 0.0);
        assert!(top.value(&[4, 0, -2]) < 0.0);
    }

    #[test]
    fn rejects_invalid_dimensions_of_the_trench() {
        let too_wide = TrenchGeometry {
            trench_width: 2.0,
            ..trench()
        };
        assert!(matches!(
            too_wide.apply(Dimension::Two),
            Err(GeometryError::InvalidParameter { name: "trench_width", .. })
        ));

        let closed = TrenchGeometry {
            taper_angle: 60.0,
            trench_depth: 1.0,
            ..trench()
        };
        assert!(matches!(
            closed.apply(Dimension::Two),
            Err(GeometryError::InvalidParameter { name: "taper_angle", .. })
        ));
    }

    #[test]
    fn tapered_walls_narrow_towards_the_bottom() {
        let geometry = TrenchGeometry {
            taper_angle: 20.0,
            ..trench()
        };
        let domain = geometry.apply(Dimension::Two).unwrap();
        let top = domain.top_level_set().unwrap();
        // The opening is wider than 0.3 at the top but only about 0.2 wide at its bottom.
        assert!(top.value(&[1, -1, 0]) > 0.0);
        assert!(top.interpolate(&Point3::new(0.15, -0.25, 0.0)) < 0.0);
    }
}
