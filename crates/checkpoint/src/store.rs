//! Parameter store interface and the in-memory parameter set

use std::collections::HashMap;
use std::path::Path;

use convert_core::{fs::write_atomic, Error, Result, Shape, Tensor};
use tracing::{info, instrument};

use crate::format::encode_param_file;
use crate::safetensors_io::encode_safetensors;

/// Write-once store of named parameters
pub trait ParameterStore {
    /// Create an empty entry with a fixed shape
    fn declare(&mut self, name: &str, shape: &[usize]) -> Result<()>;

    /// Populate a declared entry
    fn set_data(&mut self, name: &str, tensor: Tensor) -> Result<()>;

    /// Persist every entry to a single file, returning the bytes written
    fn save(&self, path: &Path) -> Result<u64>;
}

/// On-disk representation, picked from the destination extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Native `PRMS` parameter file
    Params,

    /// Safetensors file
    Safetensors,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("safetensors") => OutputFormat::Safetensors,
            _ => OutputFormat::Params,
        }
    }
}

#[derive(Debug, Clone)]
struct ParamEntry {
    name: String,
    shape: Shape,
    tensor: Option<Tensor>,
}

/// Insertion-ordered parameter store
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    entries: Vec<ParamEntry>,
    index: HashMap<String, usize>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of declared entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Populated tensor for `name`, if any
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.index
            .get(name)
            .and_then(|&i| self.entries[i].tensor.as_ref())
    }

    /// Declared entry names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// All entries in insertion order, failing on any unpopulated one
    pub fn populated(&self) -> Result<Vec<(&str, &Tensor)>> {
        self.entries
            .iter()
            .map(|e| match &e.tensor {
                Some(t) => Ok((e.name.as_str(), t)),
                None => Err(Error::UnpopulatedParameter {
                    name: e.name.clone(),
                }),
            })
            .collect()
    }

    /// Encode the store in the given format
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>> {
        let params = self.populated()?;
        match format {
            OutputFormat::Params => encode_param_file(params),
            OutputFormat::Safetensors => encode_safetensors(params),
        }
    }
}

impl ParameterStore for ParameterSet {
    fn declare(&mut self, name: &str, shape: &[usize]) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(Error::DuplicateParameter {
                name: name.to_string(),
            });
        }
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(ParamEntry {
            name: name.to_string(),
            shape: shape.to_vec(),
            tensor: None,
        });
        Ok(())
    }

    fn set_data(&mut self, name: &str, tensor: Tensor) -> Result<()> {
        let &i = self.index.get(name).ok_or_else(|| Error::UnknownParameter {
            name: name.to_string(),
        })?;
        let entry = &mut self.entries[i];

        if entry.shape.as_slice() != tensor.shape() {
            return Err(Error::ShapeMismatch {
                name: name.to_string(),
                declared: entry.shape.clone(),
                actual: tensor.shape().to_vec(),
            });
        }
        if entry.tensor.is_some() {
            return Err(Error::DuplicateParameter {
                name: name.to_string(),
            });
        }

        entry.tensor = Some(tensor);
        Ok(())
    }

    #[instrument(skip_all, fields(path = %path.display(), entries = self.entries.len()))]
    fn save(&self, path: &Path) -> Result<u64> {
        let format = OutputFormat::from_path(path);
        let bytes = self.encode(format)?;
        let written = write_atomic(path, &bytes)?;

        info!(?format, size_bytes = written, "Parameter store saved");
        Ok(written)
    }
}
