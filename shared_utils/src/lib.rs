//! Small helpers shared across the dashboard crates.

pub mod env;
