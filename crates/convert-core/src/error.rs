//! Error types for checkpoint conversion

use thiserror::Error;

/// Result type alias using the conversion Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for checkpoint conversion and distributed helpers
#[derive(Error, Debug)]
pub enum Error {
    // Source checkpoint errors
    #[error("Source checkpoint unreadable: {path} - {reason}")]
    SourceUnreadable { path: String, reason: String },

    #[error("Tensor not found in checkpoint: {name}")]
    TensorNotFound { name: String },

    #[error("Unsupported tensor dtype: {dtype}")]
    UnsupportedDtype { dtype: String },

    #[error("Invalid tensor: {message}")]
    InvalidTensor { message: String },

    // Parameter store errors
    #[error("Shape mismatch for parameter {name}: declared {declared:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        declared: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Parameter already exists: {name}")]
    DuplicateParameter { name: String },

    #[error("Parameter was never declared: {name}")]
    UnknownParameter { name: String },

    #[error("Parameter declared but never populated: {name}")]
    UnpopulatedParameter { name: String },

    // Destination errors
    #[error("Failed to write destination {path}: {reason}")]
    DestinationWriteFailure { path: String, reason: String },

    #[error("Parameter file corrupted: {path} - {reason}")]
    CorruptParameterFile { path: String, reason: String },

    // Distributed errors
    #[error("Communicator error: {message}")]
    Communicator { message: String },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns true if the error was raised while reading the source checkpoint
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Error::SourceUnreadable { .. }
                | Error::TensorNotFound { .. }
                | Error::UnsupportedDtype { .. }
        )
    }

    /// Returns true if the error was raised while persisting the parameter store
    pub fn is_destination_error(&self) -> bool {
        matches!(
            self,
            Error::DestinationWriteFailure { .. } | Error::UnpopulatedParameter { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_source_classification() {
        let err = Error::SourceUnreadable {
            path: "model.safetensors".to_string(),
            reason: "truncated header".to_string(),
        };
        assert!(err.is_source_error());
        assert!(!err.is_destination_error());

        let err = Error::DestinationWriteFailure {
            path: "/readonly/out.h5".to_string(),
            reason: "permission denied".to_string(),
        };
        assert!(err.is_destination_error());
        assert!(!err.is_source_error());
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = Error::ShapeMismatch {
            name: "NetworkA/conv1/conv/W".to_string(),
            declared: vec![32, 3, 3, 16],
            actual: vec![3, 3, 16, 32],
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch for parameter NetworkA/conv1/conv/W: declared [32, 3, 3, 16], got [3, 3, 16, 32]"
        );
    }
}
