//! Convert Core - Foundation for checkpoint weight conversion
//!
//! Provides the tensor model, error handling, configuration and filesystem
//! helpers shared by the checkpoint converter and the distributed context.

pub mod config;
pub mod error;
pub mod fs;
pub mod types;

pub use config::{ConversionRules, ConverterConfig, DistributedConfig, NameMapping};
pub use error::{Error, Result};
pub use types::*;
