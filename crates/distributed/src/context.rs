//! Compute context describing where arrays live

use convert_core::{DistributedConfig, Error, Result};
use serde::{Deserialize, Serialize};

/// Backend chain, array type and device for a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeContext {
    /// Backends in priority order, e.g. `["cudnn:float", "cuda:float", "cpu:float"]`
    pub backends: Vec<String>,

    /// Array type configuration
    pub type_config: String,

    /// Device identifier
    pub device_id: String,
}

impl ComputeContext {
    /// Build the context for an extension (`cpu`, `cuda` or `cudnn`)
    pub fn extension(name: &str, device_id: impl Into<String>, type_config: &str) -> Result<Self> {
        if !matches!(type_config, "float" | "half") {
            return Err(Error::InvalidConfig {
                message: format!("unknown type config: {}", type_config),
            });
        }

        let chain: &[&str] = match name {
            "cpu" => &["cpu"],
            "cuda" => &["cuda", "cpu"],
            "cudnn" => &["cudnn", "cuda", "cpu"],
            other => {
                return Err(Error::InvalidConfig {
                    message: format!("unknown extension: {}", other),
                })
            }
        };

        Ok(Self {
            backends: chain
                .iter()
                .map(|b| format!("{}:{}", b, type_config))
                .collect(),
            type_config: type_config.to_string(),
            device_id: device_id.into(),
        })
    }

    pub fn from_config(config: &DistributedConfig) -> Result<Self> {
        Self::extension(&config.extension, config.device_id.clone(), &config.type_config)
    }

    /// Extension name of the highest priority backend
    pub fn extension_name(&self) -> &str {
        self.backends
            .first()
            .and_then(|b| b.split(':').next())
            .unwrap_or("cpu")
    }

    /// Same extension and device with float arrays
    pub fn float_context(&self) -> Result<Self> {
        Self::extension(self.extension_name(), self.device_id.clone(), "float")
    }
}

impl Default for ComputeContext {
    fn default() -> Self {
        Self {
            backends: vec!["cpu:float".to_string()],
            type_config: "float".to_string(),
            device_id: "0".to_string(),
        }
    }
}
