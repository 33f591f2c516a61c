//! Wire protocol types.

pub mod openai;

pub use openai::*;
