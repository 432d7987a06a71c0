//! Export of surface states as CSV point tables.

pub mod surface_table;

pub use surface_table::{
    SurfaceRow, SurfaceTableError, read_surface, read_surface_from_path, write_surface,
    write_surface_to_path,
};
