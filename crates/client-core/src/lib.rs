//! # client-core
//!
//! Value objects shared by the gateway and REST crates: platform
//! identifiers and gateway intents. This crate has zero dependencies on
//! transport or runtime infrastructure.

pub mod value_objects;

// Re-export commonly used types at crate root
pub use value_objects::{Intents, Snowflake, SnowflakeParseError};
