use crate::core::material::Material;
use crate::core::surface::SurfacePointCloud;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceTableError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unknown material '{0}' in surface table")]
    UnknownMaterial(String),
}

/// One row of an exported surface: disk centre, outward normal and exposed material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRow {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub nx: f64,
    pub ny: f64,
    pub nz: f64,
    pub material: String,
    pub material_id: i32,
}

impl SurfaceRow {
    pub fn material(&self) -> Result<Material, SurfaceTableError> {
        self.material
            .parse()
            .map_err(|_| SurfaceTableError::UnknownMaterial(self.material.clone()))
    }
}

/// Writes the surface as a CSV point table with a header row.
///
/// # Errors
///
/// Returns an error if serialization or the underlying writer fails.
pub fn write_surface<W: Write>(
    surface: &SurfacePointCloud,
    writer: W,
) -> Result<(), SurfaceTableError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for point in surface.points() {
        csv_writer.serialize(SurfaceRow {
            x: point.position.x,
            y: point.position.y,
            z: point.position.z,
            nx: point.normal.x,
            ny: point.normal.y,
            nz: point.normal.z,
            material: point.material.to_string(),
            material_id: point.material.id(),
        })?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes the surface table to `path`, creating or truncating the file.
pub fn write_surface_to_path<P: AsRef<Path>>(
    surface: &SurfacePointCloud,
    path: P,
) -> Result<(), SurfaceTableError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| SurfaceTableError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    write_surface(surface, BufWriter::new(file))
}

pub fn read_surface<R: Read>(reader: R) -> Result<Vec<SurfaceRow>, SurfaceTableError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for record in csv_reader.deserialize::<SurfaceRow>() {
        rows.push(record?);
    }
    Ok(rows)
}

pub fn read_surface_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<SurfaceRow>, SurfaceTableError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| SurfaceTableError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    read_surface(file)
}
