//! Native parameter file format
//!
//! Layout (all integers little-endian):
//!
//! | field          | size            |
//! |----------------|-----------------|
//! | magic `PRMS`   | 4               |
//! | version        | 4               |
//! | entry count    | 4               |
//! | metadata len   | 4               |
//! | metadata JSON  | metadata len    |
//! | body (bincode) | rest of file    |
//!
//! The body is a bincode-encoded list of parameters in insertion order. The
//! file carries no timestamps, so encoding the same parameters twice yields
//! identical bytes.

use std::collections::BTreeMap;
use std::path::Path;

use convert_core::{DType, Error, Result, Shape, Tensor};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Magic bytes for parameter files
pub const PARAMS_MAGIC: [u8; 4] = *b"PRMS";

/// Parameter file format version
pub const PARAMS_VERSION: u32 = 1;

const FIXED_HEADER_LEN: usize = 16;

#[derive(Serialize)]
struct StoredParamRef<'a> {
    name: &'a str,
    dtype: DType,
    shape: &'a [usize],
    data: &'a [u8],
}

#[derive(Deserialize)]
struct StoredParam {
    name: String,
    dtype: DType,
    shape: Shape,
    data: Vec<u8>,
}

/// Parsed parameter file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamFileHeader {
    pub version: u32,
    pub entry_count: u32,
    pub metadata: BTreeMap<String, String>,
}

fn file_metadata() -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("byte_order".to_string(), "little".to_string());
    metadata.insert("layout".to_string(), "row_major".to_string());
    metadata
}

/// Encode parameters into a parameter file image
pub fn encode_param_file<'a, I>(params: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a Tensor)>,
{
    let records: Vec<StoredParamRef<'_>> = params
        .into_iter()
        .map(|(name, tensor)| StoredParamRef {
            name,
            dtype: tensor.dtype(),
            shape: tensor.shape(),
            data: tensor.data().as_ref(),
        })
        .collect();

    let entry_count = u32::try_from(records.len()).map_err(|_| {
        Error::Serialization(format!("too many parameters: {}", records.len()))
    })?;
    let metadata_json = serde_json::to_string(&file_metadata())?;
    let body = bincode::serialize(&records)?;

    let mut buf = Vec::with_capacity(FIXED_HEADER_LEN + metadata_json.len() + body.len());

    // Write magic
    buf.extend_from_slice(&PARAMS_MAGIC);

    // Write version
    buf.extend_from_slice(&PARAMS_VERSION.to_le_bytes());

    // Write entry count
    buf.extend_from_slice(&entry_count.to_le_bytes());

    // Write metadata length and content
    let metadata_bytes = metadata_json.as_bytes();
    buf.extend_from_slice(&(metadata_bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(metadata_bytes);

    buf.extend_from_slice(&body);
    Ok(buf)
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Decode a parameter file image
///
/// `location` is only used in error messages.
pub fn decode_param_file(
    location: &str,
    bytes: &[u8],
) -> Result<(ParamFileHeader, Vec<(String, Tensor)>)> {
    let corrupt = |reason: String| Error::CorruptParameterFile {
        path: location.to_string(),
        reason,
    };

    if bytes.get(..4) != Some(&PARAMS_MAGIC[..]) {
        return Err(corrupt("invalid parameter file magic".to_string()));
    }

    let truncated = || corrupt("truncated header".to_string());
    let version = read_u32(bytes, 4).ok_or_else(truncated)?;
    if version != PARAMS_VERSION {
        warn!(
            "Parameter file version mismatch: expected {}, got {}",
            PARAMS_VERSION, version
        );
    }
    let entry_count = read_u32(bytes, 8).ok_or_else(truncated)?;
    let meta_len = read_u32(bytes, 12).ok_or_else(truncated)? as usize;

    let meta_end = FIXED_HEADER_LEN + meta_len;
    let meta_bytes = bytes.get(FIXED_HEADER_LEN..meta_end).ok_or_else(truncated)?;
    let metadata: BTreeMap<String, String> =
        serde_json::from_slice(meta_bytes).map_err(|e| corrupt(format!("metadata: {}", e)))?;

    let records: Vec<StoredParam> = bincode::deserialize(&bytes[meta_end..])
        .map_err(|e| corrupt(format!("body: {}", e)))?;
    if records.len() != entry_count as usize {
        return Err(corrupt(format!(
            "header declares {} entries, body has {}",
            entry_count,
            records.len()
        )));
    }

    let params = records
        .into_iter()
        .map(|r| {
            let tensor = Tensor::new(r.dtype, r.shape, r.data)
                .map_err(|e| corrupt(format!("{}: {}", r.name, e)))?;
            Ok((r.name, tensor))
        })
        .collect::<Result<Vec<_>>>()?;

    let header = ParamFileHeader {
        version,
        entry_count,
        metadata,
    };
    Ok((header, params))
}

/// Load all parameters from a parameter file, in stored order
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_param_file(path: impl AsRef<Path>) -> Result<Vec<(String, Tensor)>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let (header, params) = decode_param_file(&path.display().to_string(), &bytes)?;
    debug!(version = header.version, entries = params.len(), "Parameter file loaded");
    Ok(params)
}
