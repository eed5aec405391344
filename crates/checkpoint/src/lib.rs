//! Checkpoint conversion for pretrained model weights
//!
//! Reads named tensors from a foreign checkpoint, filters and transforms them
//! and writes them to a single parameter file.

pub mod converter;
pub mod format;
pub mod reader;
pub mod rules;
pub mod safetensors_io;
pub mod store;

pub use converter::{convert, ConversionReport, ConvertedParam, Converter};
pub use format::{read_param_file, PARAMS_MAGIC, PARAMS_VERSION};
pub use reader::{CheckpointReader, MemoryCheckpoint};
pub use safetensors_io::SafetensorsCheckpoint;
pub use store::{OutputFormat, ParameterSet, ParameterStore};
