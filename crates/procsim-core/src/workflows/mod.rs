//! # Workflows Module
//!
//! High-level entry points that run complete simulations on top of the [`crate::engine`] and
//! [`crate::core`] layers.
//!
//! ## Overview
//!
//! A workflow owns the whole pipeline of a simulation: building or receiving the domain, running
//! process models on it, reporting progress and returning the resulting surfaces. Library users
//! and the command-line front end call into this layer only.
//!
//! ## Architecture
//!
//! - **Process Driver** ([`process`]) - Runs any [`crate::core::models::ProcessModel`] on a
//!   domain for a given process time
//! - **TEOS Trench** ([`teos_trench`]) - Trench geometry, oxide layer and TEOS deposition,
//!   returning the initial and final surfaces

pub mod process;
pub mod teos_trench;
