//! Voxel view of a layered domain.
//!
//! Every grid cell (the box spanned by `2^dim` neighbouring grid points) whose centre lies
//! inside the material stack becomes a cell. Cells carry the material of the lowest layer that
//! contains them, a filling fraction and any number of named scalar arrays. A horizontal plane
//! at `depth` closes the stack from below, or from above when the cells are meant to fill the
//! space over the surface.

use super::domain::{Domain, DomainError};
use super::grid::{BoundaryCondition, Grid, GridIndex};
use super::levelset::LevelSet;
use super::material::Material;
use super::models::PointData;
use nalgebra::Point3;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::ops::RangeInclusive;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const FILLING_FRACTION: &str = "fillingFraction";

/// Neighbour slots per cell, ordered -x, +x, -y, +y, -z, +z.
pub type CellNeighbors = [Option<usize>; 6];

#[derive(Debug, Error)]
pub enum CellSetError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("Cell set depth must be finite, got {0}")]
    InvalidDepth(f64),
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Cell data has {found} rows but the cell set has {expected} cells")]
    IncompatibleData { expected: usize, found: usize },
    #[error("Invalid value '{value}' in cell data column '{label}'")]
    InvalidValue { label: String, value: String },
}

/// Which side of the surface the cells fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellSetPosition {
    /// Material cells from `depth` up to the surface; everything below `depth` is cover.
    #[default]
    BelowSurface,
    /// Material cells plus cover cells over the surface up to `depth`.
    AboveSurface,
}

/// Contributions of one traced particle to the cells it crossed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TracePath {
    points: Vec<(usize, f64)>,
    grid_data: Vec<f64>,
}

impl TracePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, cell: usize, value: f64) {
        self.points.push((cell, value));
    }

    /// Dense contribution indexed by cell; grows as needed.
    pub fn add_grid_data(&mut self, cell: usize, value: f64) {
        if self.grid_data.len() <= cell {
            self.grid_data.resize(cell + 1, 0.0);
        }
        self.grid_data[cell] += value;
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.grid_data.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.grid_data.clear();
    }
}

#[derive(Debug, Clone)]
pub struct DenseCellSet {
    grid: Grid,
    depth: f64,
    position: CellSetPosition,
    cover_material: Material,
    /// Minimum corner of each cell.
    cells: Vec<GridIndex>,
    materials: Vec<Material>,
    lookup: HashMap<GridIndex, usize>,
    neighbors: Vec<CellNeighbors>,
    data: PointData,
    /// Top level set the cells were cut from.
    surface: LevelSet,
}

impl DenseCellSet {
    /// Cells below the surface of `domain`, down to `depth`, with undefined cover material.
    pub fn from_domain(domain: &Domain, depth: f64) -> Result<Self, CellSetError> {
        Self::new(
            domain,
            depth,
            CellSetPosition::BelowSurface,
            Material::Undefined,
        )
    }

    pub fn new(
        domain: &Domain,
        depth: f64,
        position: CellSetPosition,
        cover_material: Material,
    ) -> Result<Self, CellSetError> {
        if !depth.is_finite() {
            return Err(CellSetError::InvalidDepth(depth));
        }
        let surface = domain.top_level_set()?.clone();
        let grid = domain.grid().clone();

        let mut cell_set = Self {
            grid,
            depth,
            position,
            cover_material,
            cells: Vec::new(),
            materials: Vec::new(),
            lookup: HashMap::new(),
            neighbors: Vec::new(),
            data: PointData::new(),
            surface,
        };

        let mut filling_fractions = Vec::new();
        for index in cell_set.candidate_cells() {
            let Some(material) = cell_set.classify(domain, &index) else {
                continue;
            };
            let phi = cell_set.center_value(&cell_set.surface, &index);
            filling_fractions.push((0.5 - phi / cell_set.grid.delta()).clamp(0.0, 1.0));
            cell_set.cells.push(index);
            cell_set.materials.push(material);
        }
        cell_set.data.insert(FILLING_FRACTION, filling_fractions);
        cell_set.rebuild_lookup();

        debug!(
            cells = cell_set.cells.len(),
            depth,
            position = ?position,
            "Built dense cell set."
        );
        Ok(cell_set)
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn grid_delta(&self) -> f64 {
        self.grid.delta()
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn position(&self) -> CellSetPosition {
        self.position
    }

    pub fn cover_material(&self) -> Material {
        self.cover_material
    }

    pub fn surface(&self) -> &LevelSet {
        &self.surface
    }

    pub fn cell_index(&self, cell: usize) -> Option<GridIndex> {
        self.cells.get(cell).copied()
    }

    pub fn cell_center(&self, cell: usize) -> Option<Point3<f64>> {
        self.cells.get(cell).map(|index| self.center_of(index))
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material(&self, cell: usize) -> Option<Material> {
        self.materials.get(cell).copied()
    }

    /// Axis-aligned box enclosing every cell.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let delta = self.grid.delta();
        let dim = self.grid.dim();
        self.cells.iter().fold(None, |acc, index| {
            let lo = self.grid.coordinate(index);
            let mut hi = lo;
            for axis in 0..dim {
                hi[axis] += delta;
            }
            Some(match acc {
                None => (lo, hi),
                Some((min, max)) => (min.inf(&lo), max.sup(&hi)),
            })
        })
    }

    /// Cell containing `point`. Cells are half-open: a point on a shared face belongs to the
    /// cell above it.
    pub fn find_index(&self, point: &Point3<f64>) -> Option<usize> {
        let delta = self.grid.delta();
        let mut index = [0i64; 3];
        for (axis, slot) in index.iter_mut().enumerate().take(self.grid.dim()) {
            *slot = (point[axis] / delta).floor() as i64;
        }
        self.lookup.get(&index).copied()
    }

    pub fn filling_fractions(&self) -> &[f64] {
        self.data.get(FILLING_FRACTION).unwrap_or(&[])
    }

    pub fn filling_fraction(&self, point: &Point3<f64>) -> Option<f64> {
        let cell = self.find_index(point)?;
        self.filling_fractions().get(cell).copied()
    }

    /// Mean filling fraction of the cells whose centre is closer than `radius` to `point`.
    pub fn average_filling_fraction(&self, point: &Point3<f64>, radius: f64) -> Option<f64> {
        let (sum, count) = self
            .cells
            .iter()
            .zip(self.filling_fractions())
            .filter(|(index, _)| nalgebra::distance(&self.center_of(index), point) < radius)
            .fold((0.0, 0usize), |(sum, count), (_, fill)| (sum + fill, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    pub fn set_filling_fraction(&mut self, cell: usize, fill: f64) -> bool {
        match self.filling_fractions_mut().get_mut(cell) {
            Some(value) => {
                *value = fill;
                true
            }
            None => false,
        }
    }

    pub fn set_filling_fraction_at(&mut self, point: &Point3<f64>, fill: f64) -> bool {
        match self.find_index(point) {
            Some(cell) => self.set_filling_fraction(cell, fill),
            None => false,
        }
    }

    pub fn add_filling_fraction(&mut self, cell: usize, fill: f64) -> bool {
        match self.filling_fractions_mut().get_mut(cell) {
            Some(value) => {
                *value += fill;
                true
            }
            None => false,
        }
    }

    pub fn add_filling_fraction_at(&mut self, point: &Point3<f64>, fill: f64) -> bool {
        match self.find_index(point) {
            Some(cell) => self.add_filling_fraction(cell, fill),
            None => false,
        }
    }

    /// Adds to the cell containing `point` only if that cell is made of `material`.
    pub fn add_filling_fraction_in_material(
        &mut self,
        point: &Point3<f64>,
        fill: f64,
        material: Material,
    ) -> bool {
        match self.find_index(point) {
            Some(cell) if self.materials[cell] == material => self.add_filling_fraction(cell, fill),
            _ => false,
        }
    }

    /// Resets every filling fraction to zero.
    pub fn clear(&mut self) {
        self.filling_fractions_mut().fill(0.0);
    }

    /// Adds the contributions of `path`, divided by `factor`.
    pub fn merge_path(&mut self, path: &TracePath, factor: f64) {
        let fills = self.filling_fractions_mut();
        for &(cell, value) in &path.points {
            if let Some(fill) = fills.get_mut(cell) {
                *fill += value / factor;
            }
        }
        for (fill, value) in fills.iter_mut().zip(&path.grid_data) {
            *fill += value / factor;
        }
    }

    /// Creates (or resets) a scalar array with `init` in every cell.
    pub fn add_scalar_data(&mut self, label: &str, init: f64) -> &mut Vec<f64> {
        self.data.insert(label, vec![init; self.cells.len()]);
        self.data.get_or_insert(label, self.cells.len())
    }

    pub fn scalar_data(&self, label: &str) -> Option<&[f64]> {
        self.data.get(label)
    }

    pub fn scalar_data_mut(&mut self, label: &str) -> Option<&mut Vec<f64>> {
        self.data.get_mut(label)
    }

    pub fn scalar_data_labels(&self) -> &[String] {
        self.data.labels()
    }

    pub fn neighbors(&self, cell: usize) -> Option<&CellNeighbors> {
        self.neighbors.get(cell)
    }

    /// Reassigns materials after the layers changed underneath an unchanged surface.
    pub fn update_materials(&mut self, domain: &Domain) -> Result<(), CellSetError> {
        if domain.is_empty() {
            return Err(DomainError::Empty.into());
        }
        let materials: Vec<Material> = self
            .cells
            .iter()
            .map(|index| self.classify(domain, index).unwrap_or(self.cover_material))
            .collect();
        self.materials = materials;
        Ok(())
    }

    /// Removes the cells the surface of `domain` has receded from. The new surface must lie
    /// below the old one; cells are never added. Returns the number of removed cells.
    pub fn update_surface(&mut self, domain: &Domain) -> Result<usize, CellSetError> {
        let top = domain.top_level_set()?;
        let keep: Vec<bool> = self
            .cells
            .iter()
            .map(|index| {
                self.center_value(top, index) <= 0.0 || self.plane_value(index) <= 0.0
            })
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            self.surface = top.clone();
            return Ok(0);
        }

        let old_cells = std::mem::take(&mut self.cells);
        let old_materials = std::mem::take(&mut self.materials);
        let (cells, materials): (Vec<GridIndex>, Vec<Material>) = old_cells
            .iter()
            .zip(old_materials)
            .zip(&keep)
            .filter(|(_, keep)| **keep)
            .map(|((index, material), _)| (*index, material))
            .unzip();
        self.data = self.data.remap(&old_cells, &cells);
        self.cells = cells;
        self.materials = materials;
        self.surface = top.clone();
        self.rebuild_lookup();

        debug!(removed, cells = self.cells.len(), "Cell set surface updated.");
        Ok(removed)
    }

    /// Writes every scalar array, filling fractions included, as one CSV column per label.
    pub fn write_cell_data<W: Write>(&self, writer: W) -> Result<(), CellSetError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.data.labels())?;
        for cell in 0..self.cells.len() {
            csv_writer.write_record(
                self.data
                    .iter()
                    .map(|(_, values)| values[cell].to_string()),
            )?;
        }
        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn write_cell_data_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), CellSetError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| io_error(path, e))?;
        self.write_cell_data(BufWriter::new(file))
    }

    /// Reads columns written by [`DenseCellSet::write_cell_data`]. Unknown labels become new
    /// scalar arrays; the row count must match the number of cells.
    pub fn read_cell_data<R: Read>(&mut self, reader: R) -> Result<(), CellSetError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let labels: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut columns = vec![Vec::with_capacity(self.cells.len()); labels.len()];

        for record in csv_reader.records() {
            let record = record?;
            for ((label, column), value) in labels.iter().zip(&mut columns).zip(record.iter()) {
                let parsed = value.trim().parse::<f64>().map_err(|_| CellSetError::InvalidValue {
                    label: label.clone(),
                    value: value.to_string(),
                })?;
                column.push(parsed);
            }
        }

        let found = columns.first().map_or(0, Vec::len);
        if found != self.cells.len() {
            return Err(CellSetError::IncompatibleData {
                expected: self.cells.len(),
                found,
            });
        }
        for (label, values) in labels.iter().zip(columns) {
            self.data.insert(label, values);
        }
        Ok(())
    }

    pub fn read_cell_data_from_path<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CellSetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| io_error(path, e))?;
        self.read_cell_data(file)
    }

    fn filling_fractions_mut(&mut self) -> &mut Vec<f64> {
        self.data.get_or_insert(FILLING_FRACTION, self.cells.len())
    }

    fn cell_range(&self, axis: usize) -> RangeInclusive<i64> {
        if axis >= self.grid.dim() {
            return 0..=0;
        }
        let min = self.grid.min_index()[axis];
        let max = self.grid.max_index()[axis];
        if self.wraps(axis) { min..=max } else { min..=max - 1 }
    }

    fn wraps(&self, axis: usize) -> bool {
        axis < self.grid.vertical_axis() && self.grid.boundary(axis) == BoundaryCondition::Periodic
    }

    fn candidate_cells(&self) -> Vec<GridIndex> {
        let mut candidates = Vec::new();
        for k in self.cell_range(2) {
            for j in self.cell_range(1) {
                for i in self.cell_range(0) {
                    candidates.push([i, j, k]);
                }
            }
        }
        candidates
    }

    fn center_of(&self, index: &GridIndex) -> Point3<f64> {
        let half = 0.5 * self.grid.delta();
        let mut center = self.grid.coordinate(index);
        for axis in 0..self.grid.dim() {
            center[axis] += half;
        }
        center
    }

    /// Mean of the level set over the corners of the cell.
    fn center_value(&self, level_set: &LevelSet, index: &GridIndex) -> f64 {
        let dim = self.grid.dim();
        let corners = 1usize << dim;
        let sum: f64 = (0..corners)
            .map(|corner| {
                let mut node = *index;
                for (axis, slot) in node.iter_mut().enumerate().take(dim) {
                    *slot += ((corner >> axis) & 1) as i64;
                }
                level_set.value(&self.grid.resolve_index(&node))
            })
            .sum();
        sum / corners as f64
    }

    fn plane_value(&self, index: &GridIndex) -> f64 {
        self.center_of(index)[self.grid.vertical_axis()] - self.depth
    }

    /// Material of the lowest layer of the ordered stack containing the cell centre, or `None`
    /// when the cell lies outside every layer.
    fn classify(&self, domain: &Domain, index: &GridIndex) -> Option<Material> {
        let inside_plane = self.plane_value(index) <= 0.0;
        if self.position == CellSetPosition::BelowSurface && inside_plane {
            return Some(self.cover_material);
        }
        let layer = domain
            .level_sets()
            .iter()
            .position(|level_set| self.center_value(level_set, index) <= 0.0);
        match layer {
            Some(layer) => Some(
                domain
                    .material_map()
                    .material_at(layer)
                    .unwrap_or(self.cover_material),
            ),
            None if inside_plane => Some(self.cover_material),
            None => None,
        }
    }

    fn rebuild_lookup(&mut self) {
        self.lookup = self
            .cells
            .iter()
            .enumerate()
            .map(|(cell, index)| (*index, cell))
            .collect();
        self.neighbors = self
            .cells
            .iter()
            .map(|index| self.neighbors_of(index))
            .collect();
    }

    fn neighbors_of(&self, index: &GridIndex) -> CellNeighbors {
        let mut neighbors = [None; 6];
        for axis in 0..self.grid.dim() {
            let range = self.cell_range(axis);
            let count = range.end() - range.start() + 1;
            for (slot, offset) in [(2 * axis, -1), (2 * axis + 1, 1)] {
                let mut neighbor = *index;
                neighbor[axis] += offset;
                if self.wraps(axis) {
                    neighbor[axis] = (neighbor[axis] - range.start()).rem_euclid(count) + range.start();
                }
                neighbors[slot] = self.lookup.get(&neighbor).copied();
            }
        }
        neighbors
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CellSetError {
    CellSetError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DELTA: f64 = 0.5;

    fn grid(boundary: BoundaryCondition) -> Grid {
        Grid::new(2, DELTA, [-4, -4, 0], [4, 4, 0], boundary).unwrap()
    }

    fn layered(boundary: BoundaryCondition, surfaces: &[(f64, Material)]) -> Domain {
        let grid = grid(boundary);
        let mut domain = Domain::new(grid.clone());
        for &(height, material) in surfaces {
            domain
                .insert_next_level_set(
                    LevelSet::from_fn(grid.clone(), move |p| p.y - height),
                    material,
                    false,
                )
                .unwrap();
        }
        domain
    }

    fn at(x: f64, y: f64) -> Point3<f64> {
        Point3::new(x, y, 0.0)
    }

    #[test]
    fn cells_fill_the_stack_between_depth_and_surface() {
        let domain = layered(BoundaryCondition::Reflective, &[(-0.1, Material::Si)]);
        let cells = DenseCellSet::from_domain(&domain, -1.0).unwrap();

        assert_eq!(cells.num_cells(), 4 * 8);
        let cover = cells.materials().iter().filter(|m| **m == Material::Undefined);
        assert_eq!(cover.count(), 16);
        assert_eq!(cells.filling_fraction(&at(0.1, -1.6)), Some(1.0));
        assert!((cells.filling_fraction(&at(0.1, -0.4)).unwrap() - 0.8).abs() < 1e-12);
        assert_eq!(cells.filling_fraction(&at(0.1, 0.1)), None);

        let (lo, hi) = cells.bounds().unwrap();
        assert_eq!((lo.x, lo.y), (-2.0, -2.0));
        assert_eq!((hi.x, hi.y), (2.0, 0.0));
    }

    #[test]
    fn cells_take_the_lowest_containing_layer() {
        let domain = layered(
            BoundaryCondition::Reflective,
            &[(-1.0, Material::Si), (0.0, Material::SiO2)],
        );
        let mut cells = DenseCellSet::new(
            &domain,
            -1.5,
            CellSetPosition::BelowSurface,
            Material::Mask,
        )
        .unwrap();

        let material_at = |cells: &DenseCellSet, y: f64| {
            cells.material(cells.find_index(&at(0.1, y)).unwrap())
        };
        assert_eq!(material_at(&cells, -1.9), Some(Material::Mask));
        assert_eq!(material_at(&cells, -1.1), Some(Material::Si));
        assert_eq!(material_at(&cells, -0.6), Some(Material::SiO2));

        cells.clear();
        assert!(!cells.add_filling_fraction_in_material(&at(0.1, -1.1), 0.5, Material::SiO2));
        assert!(cells.add_filling_fraction_in_material(&at(0.1, -0.6), 0.5, Material::SiO2));
        assert_eq!(cells.filling_fraction(&at(0.1, -0.6)), Some(0.5));
        assert_eq!(cells.filling_fraction(&at(0.1, -1.1)), Some(0.0));
    }

    #[test]
    fn cells_above_the_surface_are_cover() {
        let domain = layered(BoundaryCondition::Reflective, &[(0.0, Material::Si)]);
        let cells =
            DenseCellSet::new(&domain, 1.0, CellSetPosition::AboveSurface, Material::Gas).unwrap();

        assert_eq!(cells.num_cells(), 6 * 8);
        let gas = cells.materials().iter().filter(|m| **m == Material::Gas);
        assert_eq!(gas.count(), 16);
        assert_eq!(cells.material(cells.find_index(&at(0.1, 0.6)).unwrap()), Some(Material::Gas));
        assert_eq!(cells.find_index(&at(0.1, 1.2)), None);
    }

    #[test]
    fn neighbors_follow_the_grid_and_wrap_periodic_axes() {
        let domain = layered(BoundaryCondition::Reflective, &[(0.0, Material::Si)]);
        let cells = DenseCellSet::from_domain(&domain, -5.0).unwrap();
        let cell = cells.find_index(&at(0.1, -0.4)).unwrap();
        let neighbors = cells.neighbors(cell).unwrap();
        let index_of = |slot: usize| neighbors[slot].and_then(|n| cells.cell_index(n));
        assert_eq!(index_of(0), Some([-1, -1, 0]));
        assert_eq!(index_of(1), Some([1, -1, 0]));
        assert_eq!(index_of(2), Some([0, -2, 0]));
        assert_eq!(neighbors[3], None);
        assert_eq!((neighbors[4], neighbors[5]), (None, None));

        let edge = cells.find_index(&at(1.9, -0.4)).unwrap();
        assert_eq!(cells.neighbors(edge).unwrap()[1], None);

        let periodic = layered(BoundaryCondition::Periodic, &[(0.0, Material::Si)]);
        let cells = DenseCellSet::from_domain(&periodic, -5.0).unwrap();
        assert_eq!(cells.num_cells(), 4 * 9);
        let edge = cells.find_index(&at(2.1, -0.4)).unwrap();
        let wrapped = cells.neighbors(edge).unwrap()[1].and_then(|n| cells.cell_index(n));
        assert_eq!(wrapped, Some([-4, -1, 0]));
    }

    #[test]
    fn average_filling_fraction_uses_cells_within_radius() {
        let domain = layered(BoundaryCondition::Reflective, &[(-0.1, Material::Si)]);
        let cells = DenseCellSet::from_domain(&domain, -5.0).unwrap();
        let center = at(0.25, -0.25);

        assert!((cells.average_filling_fraction(&center, 0.3).unwrap() - 0.8).abs() < 1e-12);
        assert!((cells.average_filling_fraction(&center, 0.6).unwrap() - 0.85).abs() < 1e-12);
        assert_eq!(cells.average_filling_fraction(&at(0.25, 3.0), 0.3), None);
    }

    #[test]
    fn merged_paths_are_scaled_by_the_factor() {
        let domain = layered(BoundaryCondition::Reflective, &[(0.0, Material::Si)]);
        let mut cells = DenseCellSet::from_domain(&domain, -5.0).unwrap();
        cells.clear();

        let mut path = TracePath::new();
        path.add_point(0, 1.0);
        path.add_point(0, 1.0);
        path.add_point(cells.num_cells() + 10, 1.0);
        path.add_grid_data(1, 4.0);
        cells.merge_path(&path, 2.0);

        assert_eq!(cells.filling_fractions()[0], 1.0);
        assert_eq!(cells.filling_fractions()[1], 2.0);
        assert!(cells.filling_fractions()[2..].iter().all(|f| *f == 0.0));

        path.clear();
        assert!(path.is_empty());
        assert!(cells.set_filling_fraction(3, 0.25));
        assert!(!cells.set_filling_fraction(cells.num_cells(), 0.25));
    }

    #[test]
    fn receding_surface_removes_cells() {
        let domain = layered(BoundaryCondition::Reflective, &[(0.0, Material::Si)]);
        let mut cells = DenseCellSet::from_domain(&domain, -2.0).unwrap();
        cells.add_scalar_data("dose", 1.5);
        assert_eq!(cells.num_cells(), 32);

        let etched = layered(BoundaryCondition::Reflective, &[(-0.6, Material::Si)]);
        assert_eq!(cells.update_surface(&etched).unwrap(), 8);

        assert_eq!(cells.num_cells(), 24);
        assert_eq!(cells.scalar_data("dose").unwrap(), &[1.5; 24][..]);
        assert_eq!(cells.filling_fractions().len(), 24);
        assert_eq!(cells.find_index(&at(0.1, -0.4)), None);
        let below = cells.find_index(&at(0.1, -0.6)).unwrap();
        assert_eq!(cells.neighbors(below).unwrap()[3], None);
    }

    #[test]
    fn update_materials_follows_new_layers() {
        let domain = layered(BoundaryCondition::Reflective, &[(0.0, Material::Si)]);
        let mut cells = DenseCellSet::from_domain(&domain, -5.0).unwrap();
        let oxidized = layered(
            BoundaryCondition::Reflective,
            &[(-1.0, Material::Si), (0.0, Material::SiO2)],
        );
        cells.update_materials(&oxidized).unwrap();

        assert_eq!(cells.material(cells.find_index(&at(0.1, -0.4)).unwrap()), Some(Material::SiO2));
        assert_eq!(cells.material(cells.find_index(&at(0.1, -1.4)).unwrap()), Some(Material::Si));
    }

    #[test]
    fn cell_data_survives_a_file_round_trip() {
        let domain = layered(BoundaryCondition::Reflective, &[(-0.1, Material::Si)]);
        let mut cells = DenseCellSet::from_domain(&domain, -1.0).unwrap();
        cells.add_scalar_data("dose", 0.0)[5] = 2.5;
        cells.set_filling_fraction(0, 0.3);

        let dir = tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        cells.write_cell_data_to_path(&path).unwrap();

        let mut restored = DenseCellSet::from_domain(&domain, -1.0).unwrap();
        restored.read_cell_data_from_path(&path).unwrap();
        assert_eq!(restored.scalar_data_labels(), &[FILLING_FRACTION, "dose"]);
        assert_eq!(restored.scalar_data("dose"), cells.scalar_data("dose"));
        assert_eq!(restored.filling_fractions()[0], 0.3);
    }

    #[test]
    fn mismatched_cell_data_is_rejected() {
        let domain = layered(BoundaryCondition::Reflective, &[(0.0, Material::Si)]);
        let mut cells = DenseCellSet::from_domain(&domain, -1.0).unwrap();
        let err = cells
            .read_cell_data("fillingFraction\n0.5\n".as_bytes())
            .unwrap_err();
        assert!(matches!(
            err,
            CellSetError::IncompatibleData { found: 1, .. }
        ));
        assert!(matches!(
            cells.read_cell_data("fillingFraction\nhalf\n".as_bytes()),
            Err(CellSetError::InvalidValue { .. })
        ));
    }

    #[test]
    fn rejects_empty_domains_and_invalid_depth() {
        let empty = Domain::new(grid(BoundaryCondition::Reflective));
        assert!(matches!(
            DenseCellSet::from_domain(&empty, 0.0),
            Err(CellSetError::Domain(DomainError::Empty))
        ));
        let domain = layered(BoundaryCondition::Reflective, &[(0.0, Material::Si)]);
        assert!(matches!(
            DenseCellSet::from_domain(&domain, f64::NAN),
            Err(CellSetError::InvalidDepth(_))
        ));
    }
}
