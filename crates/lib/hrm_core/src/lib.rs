//! # hrm_core
//!
//! Core domain logic for the HRM mobile API.

pub mod migrate;
pub mod mobile;
pub mod models;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
