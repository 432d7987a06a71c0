//! # procsim Core Library
//!
//! A level-set process simulator for semiconductor topography. Surfaces are stored as signed
//! distance fields, particle fluxes are estimated with Monte-Carlo ray tracing and surface
//! velocities come from pluggable process models.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Grids, level sets, the multi-layer `Domain`, geometry
//!   builders, the ray tracing primitives (`DiskBvh`, `SourcePlane`, reflection laws), the
//!   particle and surface model traits with the TEOS, single particle and SF6/O2 models, the
//!   dense cell set voxelizing a domain, and CSV export of surfaces.
//!
//! - **[`engine`]: The Logic Core.** Configuration builders, the chunked parallel `Tracer`,
//!   upwind advection with layer nesting and grid extension, progress reporting and errors.
//!
//! - **[`workflows`]: The Public API.** The process driver that alternates tracing and
//!   advection until the process time is used up, and the TEOS trench deposition pipeline.

pub mod core;
pub mod engine;
pub mod workflows;
