//! Checkpoint reader interface and the in-memory implementation

use std::collections::BTreeMap;

use convert_core::{Error, Result, Shape, Tensor};

/// Read access to the named tensors of a checkpoint
pub trait CheckpointReader {
    /// Location of the checkpoint, used in logs and errors
    fn location(&self) -> &str;

    /// All tensor names with their shapes
    ///
    /// Implementations return names sorted; callers that depend on order
    /// still sort defensively.
    fn list_names(&self) -> Result<Vec<(String, Shape)>>;

    /// Materialize the tensor stored under `name`
    fn get_tensor(&self, name: &str) -> Result<Tensor>;
}

/// Checkpoint held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpoint {
    tensors: BTreeMap<String, Tensor>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tensor
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        self.tensors.insert(name.into(), tensor)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Tensor)> for MemoryCheckpoint {
    fn from_iter<I: IntoIterator<Item = (S, Tensor)>>(iter: I) -> Self {
        Self {
            tensors: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl CheckpointReader for MemoryCheckpoint {
    fn location(&self) -> &str {
        "<memory>"
    }

    fn list_names(&self) -> Result<Vec<(String, Shape)>> {
        Ok(self
            .tensors
            .iter()
            .map(|(name, t)| (name.clone(), t.shape().to_vec()))
            .collect())
    }

    fn get_tensor(&self, name: &str) -> Result<Tensor> {
        self.tensors
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TensorNotFound {
                name: name.to_string(),
            })
    }
}
