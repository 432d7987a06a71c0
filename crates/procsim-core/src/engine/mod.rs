//! # Engine Module
//!
//! This module implements the time-stepping machinery of procsim: estimating particle fluxes on
//! the current surface and moving the surface with the resulting velocities.
//!
//! ## Overview
//!
//! A process step consists of two halves. The [`tracer`] launches rays from a source plane above
//! the surface, follows them through reflections and records what each particle type leaves on
//! the surface disks. The surface model of the running process turns these rates into a velocity
//! per surface point, and [`advection`] integrates the level-set equation for one stable time
//! step, restoring the signed distance property and the nesting of the material layers.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Process parameters and their builders
//! - **Ray Tracing** ([`tracer`]) - Chunked, reproducible Monte-Carlo flux estimation
//! - **Advection** ([`advection`]) - Upwind surface motion, nesting and grid extension
//! - **Progress Monitoring** ([`progress`]) - Callback based progress reporting
//! - **Error Handling** ([`error`]) - Engine-specific error types
//!
//! ## Key Capabilities
//!
//! - **Parallel ray tracing** behind the `parallel` feature, with results independent of the
//!   thread count
//! - **Russian roulette** termination of low-weight rays
//! - **Reflective and periodic** lateral boundaries

pub mod advection;
pub mod config;
pub mod error;
pub mod progress;
pub mod tracer;
