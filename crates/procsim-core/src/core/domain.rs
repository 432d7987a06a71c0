use super::grid::{Grid, GridIndex};
use super::levelset::{LevelSet, LevelSetError};
use super::material::{Material, MaterialMap};
use super::surface::{SurfacePoint, SurfacePointCloud};
use thiserror::Error;
use tracing::debug;

/// Tolerance, in grid spacings, for deciding that a lower layer is exposed at the surface.
const EXPOSURE_TOLERANCE: f64 = 0.1;

#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("Domain contains no level sets")]
    Empty,
    #[error("Level set grid does not match the domain grid")]
    GridMismatch,
    #[error(transparent)]
    LevelSet(#[from] LevelSetError),
}

/// A stack of material layers, each represented by its own level set.
///
/// Layers are nested: every layer contains all layers below it, so the top level set
/// describes the full surface and lower ones mark where each material ends.
#[derive(Debug, Clone)]
pub struct Domain {
    grid: Grid,
    level_sets: Vec<LevelSet>,
    material_map: MaterialMap,
}

impl Domain {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            level_sets: Vec::new(),
            material_map: MaterialMap::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn level_sets(&self) -> &[LevelSet] {
        &self.level_sets
    }

    pub fn material_map(&self) -> &MaterialMap {
        &self.material_map
    }

    pub fn len(&self) -> usize {
        self.level_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.level_sets.is_empty()
    }

    pub fn top_level_set(&self) -> Result<&LevelSet, DomainError> {
        self.level_sets.last().ok_or(DomainError::Empty)
    }

    pub fn top_level_set_mut(&mut self) -> Result<&mut LevelSet, DomainError> {
        self.level_sets.last_mut().ok_or(DomainError::Empty)
    }

    /// Adds a layer on top. With `wrap_lower` the new layer is united with the current top so
    /// the stack stays nested.
    pub fn insert_next_level_set(
        &mut self,
        mut level_set: LevelSet,
        material: Material,
        wrap_lower: bool,
    ) -> Result<(), DomainError> {
        if level_set.grid() != &self.grid {
            return Err(DomainError::GridMismatch);
        }
        if wrap_lower {
            if let Some(top) = self.level_sets.last() {
                level_set.union(top)?;
            }
        }
        self.level_sets.push(level_set);
        self.material_map.insert_next(material);
        debug!(
            layers = self.level_sets.len(),
            material = %material,
            "Inserted level set."
        );
        Ok(())
    }

    /// Copies the top layer as a new top layer, so later deposition ends up in `material`.
    pub fn duplicate_top_level_set(&mut self, material: Material) -> Result<(), DomainError> {
        let copy = self.top_level_set()?.clone();
        self.level_sets.push(copy);
        self.material_map.insert_next(material);
        Ok(())
    }

    pub fn remove_top_level_set(&mut self) -> Option<(LevelSet, Material)> {
        let level_set = self.level_sets.pop()?;
        let material = self.material_map.remove_top().unwrap_or(Material::Undefined);
        Some((level_set, material))
    }

    /// Material exposed at a surface grid point: the lowest layer that coincides with the top.
    pub fn surface_material(&self, index: &GridIndex) -> Material {
        let Some(top) = self.level_sets.last() else {
            return Material::Undefined;
        };
        let top_value = top.value(index);
        let tolerance = EXPOSURE_TOLERANCE * self.grid.delta();
        self.level_sets
            .iter()
            .position(|ls| ls.value(index) <= top_value + tolerance)
            .and_then(|layer| self.material_map.material_at(layer))
            .unwrap_or(Material::Undefined)
    }

    /// Surface disks on the narrow band of the top level set.
    pub fn surface_points(&self) -> Result<SurfacePointCloud, DomainError> {
        let top = self.top_level_set()?;
        let points = top
            .active_points()
            .into_iter()
            .map(|index| SurfacePoint {
                index,
                position: self.grid.coordinate(&index),
                normal: top.normal(&index),
                material: self.surface_material(&index),
            })
            .collect();
        Ok(SurfacePointCloud::new(points, &self.grid))
    }

    /// Clips every lower layer to the top one, removing etched material from all layers.
    pub fn enforce_nesting(&mut self) -> Result<(), DomainError> {
        let Some((top, lower)) = self.level_sets.split_last_mut() else {
            return Err(DomainError::Empty);
        };
        for level_set in lower.iter_mut() {
            level_set.intersect(top)?;
        }
        Ok(())
    }

    /// Grows every layer vertically when the surface comes within `margin_cells` of the
    /// vertical grid bounds. Returns whether the grid changed.
    pub fn extend_vertical_if_needed(&mut self, margin_cells: usize) -> Result<bool, DomainError> {
        let top = self.top_level_set()?;
        let Some((lowest, highest)) = top.vertical_surface_range() else {
            return Ok(false);
        };
        let delta = self.grid.delta();
        let vertical = self.grid.vertical_axis();
        let grid_min = self.grid.min_index()[vertical] as f64 * delta;
        let grid_max = self.grid.max_index()[vertical] as f64 * delta;
        let margin = margin_cells as f64 * delta;

        let below = if lowest - grid_min < margin {
            2 * margin_cells
        } else {
            0
        };
        let above = if grid_max - highest < margin {
            2 * margin_cells
        } else {
            0
        };
        if below == 0 && above == 0 {
            return Ok(false);
        }

        for level_set in self.level_sets.iter_mut() {
            level_set.extend_vertical(below, above)?;
        }
        self.grid = self.level_sets[0].grid().clone();
        debug!(below, above, "Extended domain grid vertically.");
        Ok(true)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.level_sets.is_empty() {
            return Err(DomainError::Empty);
        }
        for level_set in &self.level_sets {
            if level_set.grid() != &self.grid {
                return Err(DomainError::GridMismatch);
            }
            level_set.validate()?;
        }
        Ok(())
    }
}
