//! Throw-away databases and seed data for tests. Panics on any error.
pub mod fixtures;
pub mod prepare_env;
