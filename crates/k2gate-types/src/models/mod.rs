//! Serializable status models for the admin and health endpoints.

pub mod stats;

pub use stats::*;
