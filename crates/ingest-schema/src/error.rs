//! Error types for decoding canonical documents.

use thiserror::Error;

/// Structural decode failure.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Input is not valid UTF-8 text.
    #[error("canonical document is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Input does not match the canonical object model.
    #[error("canonical document does not match schema: {0}")]
    Decode(#[from] serde_json::Error),

    /// An array was given where the model expects an object.
    #[error("canonical document does not match schema: expected an object at {0}")]
    NotAnObject(String),
}
