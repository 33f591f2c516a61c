//! Shared types for K2 Gateway.
//!
//! Contains the error taxonomy, the OpenAI-compatible protocol shapes,
//! and the serializable stats/status models exposed by the admin API.
//! This crate has no async or HTTP dependencies so it can be used from
//! any layer without pulling in the runtime.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::GatewayError;
