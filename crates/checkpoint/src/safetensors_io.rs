//! Safetensors checkpoint reader and writer

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::path::Path;

use bytes::Bytes;
use convert_core::{DType, Error, Result, Shape, Tensor};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use tracing::{debug, instrument};

use crate::reader::CheckpointReader;

fn from_safetensors_dtype(dtype: Dtype) -> Result<DType> {
    Ok(match dtype {
        Dtype::BOOL => DType::Bool,
        Dtype::U8 => DType::U8,
        Dtype::I8 => DType::I8,
        Dtype::I16 => DType::I16,
        Dtype::U16 => DType::U16,
        Dtype::F16 => DType::F16,
        Dtype::BF16 => DType::BF16,
        Dtype::I32 => DType::I32,
        Dtype::U32 => DType::U32,
        Dtype::F32 => DType::F32,
        Dtype::F64 => DType::F64,
        Dtype::I64 => DType::I64,
        Dtype::U64 => DType::U64,
        other => {
            return Err(Error::UnsupportedDtype {
                dtype: format!("{:?}", other),
            })
        }
    })
}

fn to_safetensors_dtype(dtype: DType) -> Dtype {
    match dtype {
        DType::Bool => Dtype::BOOL,
        DType::U8 => Dtype::U8,
        DType::I8 => Dtype::I8,
        DType::I16 => Dtype::I16,
        DType::U16 => Dtype::U16,
        DType::F16 => Dtype::F16,
        DType::BF16 => Dtype::BF16,
        DType::I32 => Dtype::I32,
        DType::U32 => Dtype::U32,
        DType::F32 => Dtype::F32,
        DType::F64 => Dtype::F64,
        DType::I64 => Dtype::I64,
        DType::U64 => Dtype::U64,
    }
}

/// Location of one tensor inside the file buffer
#[derive(Debug, Clone)]
struct TensorEntry {
    dtype: Dtype,
    shape: Shape,
    range: Range<usize>,
}

/// A `.safetensors` file loaded into memory
///
/// The header is parsed once at open time; tensor bytes are only sliced out
/// of the buffer when requested.
#[derive(Debug)]
pub struct SafetensorsCheckpoint {
    location: String,
    buffer: Bytes,
    index: BTreeMap<String, TensorEntry>,
}

impl SafetensorsCheckpoint {
    /// Open and index a safetensors file
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let location = path.display().to_string();
        let buffer = std::fs::read(path).map_err(|e| Error::SourceUnreadable {
            path: location.clone(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(location, Bytes::from(buffer))
    }

    /// Index an in-memory safetensors buffer
    pub fn from_bytes(location: impl Into<String>, buffer: Bytes) -> Result<Self> {
        let location = location.into();
        let unreadable = |reason: String| Error::SourceUnreadable {
            path: location.clone(),
            reason,
        };

        // full validation of header and offsets
        SafeTensors::deserialize(&buffer).map_err(|e| unreadable(e.to_string()))?;

        let (header_len, metadata) =
            SafeTensors::read_metadata(&buffer).map_err(|e| unreadable(e.to_string()))?;
        let data_start = 8 + header_len;

        let index: BTreeMap<String, TensorEntry> = metadata
            .tensors()
            .into_iter()
            .map(|(name, info)| {
                let (begin, end) = info.data_offsets;
                let entry = TensorEntry {
                    dtype: info.dtype,
                    shape: info.shape.clone(),
                    range: data_start + begin..data_start + end,
                };
                (name, entry)
            })
            .collect();

        debug!(location = %location, tensors = index.len(), "Indexed safetensors checkpoint");

        Ok(Self {
            location,
            buffer,
            index,
        })
    }
}

impl CheckpointReader for SafetensorsCheckpoint {
    fn location(&self) -> &str {
        &self.location
    }

    fn list_names(&self) -> Result<Vec<(String, Shape)>> {
        Ok(self
            .index
            .iter()
            .map(|(name, entry)| (name.clone(), entry.shape.clone()))
            .collect())
    }

    fn get_tensor(&self, name: &str) -> Result<Tensor> {
        let entry = self.index.get(name).ok_or_else(|| Error::TensorNotFound {
            name: name.to_string(),
        })?;
        let dtype = from_safetensors_dtype(entry.dtype)?;
        Tensor::new(dtype, entry.shape.clone(), self.buffer.slice(entry.range.clone()))
    }
}

/// Serialize named tensors as a safetensors file image
pub fn encode_safetensors<'a, I>(params: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a Tensor)>,
{
    let views = params
        .into_iter()
        .map(|(name, tensor)| {
            let view = TensorView::new(
                to_safetensors_dtype(tensor.dtype()),
                tensor.shape().to_vec(),
                tensor.data().as_ref(),
            )
            .map_err(|e| Error::Serialization(format!("tensor view {}: {}", name, e)))?;
            Ok((name.to_string(), view))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut meta = HashMap::new();
    meta.insert("format".to_string(), "pt".to_string());

    safetensors::serialize(views, Some(meta)).map_err(|e| Error::Serialization(e.to_string()))
}
