//! Shared building blocks for the sqlclient services.
//!
//! Configuration, error types, form models, response wrappers,
//! HTTP middleware and small helpers used across crates.

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
