pub mod cellset;
pub mod domain;
pub mod geometry;
pub mod grid;
pub mod io;
pub mod levelset;
pub mod material;
pub mod models;
pub mod raytrace;
pub mod surface;
