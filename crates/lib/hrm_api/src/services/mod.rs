//! Shared services used by handlers.

pub mod cookies;
