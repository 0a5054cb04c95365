//! Domain models.

pub mod mobile;
