//! Compressor node firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod duration;
pub mod interlock;
pub mod machine;
pub mod monitor;
pub mod override_gate;
pub mod report;

pub mod error;

// ESPidf-only code is guarded by cfg attributes inside these modules.
pub mod adapters;
pub mod drivers;
pub mod sensors;
