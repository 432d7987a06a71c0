use super::{
    Dimension, GeometryError, half_space_below, lateral_boundary, require_finite,
    require_positive, vertical_padding,
};
use crate::core::domain::Domain;
use crate::core::grid::Grid;
use crate::core::levelset::LevelSet;
use crate::core::material::Material;
use tracing::debug;

/// A flat substrate filling everything below `base_height`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneGeometry {
    pub grid_delta: f64,
    pub x_extent: f64,
    pub y_extent: f64,
    pub base_height: f64,
    pub periodic_boundary: bool,
    pub material: Material,
}

impl Default for PlaneGeometry {
    fn default() -> Self {
        Self {
            grid_delta: 0.1,
            x_extent: 1.0,
            y_extent: 1.0,
            base_height: 0.0,
            periodic_boundary: false,
            material: Material::Si,
        }
    }
}

impl PlaneGeometry {
    pub fn validate(&self, dim: Dimension) -> Result<(), GeometryError> {
        require_positive("grid_delta", self.grid_delta)?;
        require_positive("x_extent", self.x_extent)?;
        if dim == Dimension::Three {
            require_positive("y_extent", self.y_extent)?;
        }
        require_finite("base_height", self.base_height)
    }

    pub fn apply(&self, dim: Dimension) -> Result<Domain, GeometryError> {
        self.validate(dim)?;
        let padding = vertical_padding(self.grid_delta);
        let grid = Grid::from_extents(
            dim.value(),
            self.grid_delta,
            [self.x_extent, self.y_extent],
            self.base_height - padding,
            self.base_height + padding,
            lateral_boundary(self.periodic_boundary),
        )?;

        let substrate = LevelSet::from_fn(grid.clone(), |p| {
            half_space_below(p, dim, self.base_height)
        });
        let mut domain = Domain::new(grid);
        domain.insert_next_level_set(substrate, self.material, false)?;
        domain.validate()?;
        debug!(%dim, material = %self.material, "Built plane geometry.");
        Ok(domain)
    }
}
