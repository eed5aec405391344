//! Converter configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{Error, Result};

/// Default source checkpoint path
pub const DEFAULT_SOURCE_PATH: &str = "./JSI-GAN_x4_exp1-native/JSI-GAN-1278420";

/// Default destination parameter file path
pub const DEFAULT_DESTINATION_PATH: &str = "./jsigan_x4.h5";

/// Paths for a single conversion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Foreign checkpoint to read
    pub source_path: PathBuf,

    /// Parameter file to write (overwritten if present)
    pub destination_path: PathBuf,
}

impl ConverterConfig {
    /// Create a config from explicit paths
    pub fn new(source_path: impl Into<PathBuf>, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            destination_path: destination_path.into(),
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_PATH, DEFAULT_DESTINATION_PATH)
    }
}

/// A single substring rewrite applied to parameter names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameMapping {
    /// Literal substring to look for
    pub pattern: String,

    /// Text that replaces every occurrence of `pattern`
    pub replacement: String,
}

impl NameMapping {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// Filtering and transformation rules applied to each checkpoint record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionRules {
    /// First name segment must start with this prefix
    pub scope_prefix: String,

    /// Records whose last segment starts with this prefix are skipped
    pub excluded_leaf_prefix: String,

    /// Ordered rename table
    pub name_map: Vec<NameMapping>,

    /// Rank of tensors treated as convolution kernels
    pub kernel_rank: usize,

    /// Axis permutation applied to convolution kernels
    pub kernel_axes: Vec<usize>,
}

impl Default for ConversionRules {
    fn default() -> Self {
        Self {
            scope_prefix: "Network".to_string(),
            excluded_leaf_prefix: "Adam".to_string(),
            name_map: vec![
                NameMapping::new("/w", "/conv/W"),
                NameMapping::new("/b", "/conv/b"),
            ],
            kernel_rank: 4,
            // [H, W, Cin, Cout] -> [Cout, H, W, Cin]
            kernel_axes: vec![3, 0, 1, 2],
        }
    }
}

impl ConversionRules {
    /// Reject rule sets that cannot be applied meaningfully
    ///
    /// An empty rename pattern matches between every character of every
    /// name, and kernel axes must be a permutation of `0..kernel_rank`.
    pub fn validate(&self) -> Result<()> {
        if let Some(index) = self.name_map.iter().position(|m| m.pattern.is_empty()) {
            return Err(Error::InvalidConfig {
                message: format!("name_map entry {} has an empty pattern", index),
            });
        }

        let mut axes = self.kernel_axes.clone();
        axes.sort_unstable();
        if !axes.iter().copied().eq(0..self.kernel_rank) {
            return Err(Error::InvalidConfig {
                message: format!(
                    "kernel_axes {:?} is not a permutation of {} axes",
                    self.kernel_axes, self.kernel_rank
                ),
            });
        }

        Ok(())
    }
}

/// Compute context settings for distributed runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributedConfig {
    /// Extension name (cpu, cuda, cudnn)
    pub extension: String,

    /// Device identifier
    pub device_id: String,

    /// Array type configuration (float, half)
    pub type_config: String,
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            extension: "cpu".to_string(),
            device_id: "0".to_string(),
            type_config: "float".to_string(),
        }
    }
}
