//! Error types for the ADC codec.

use std::num::ParseIntError;
use std::string::FromUtf8Error;
use thiserror::Error;

/// Failure to convert a single value to or from its wire form.
#[derive(Debug, Error)]
pub enum FieldError {
    /// Malformed base-10 integer.
    #[error("invalid integer {value:?}: {source}")]
    InvalidInteger {
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// Unescaped payload is not valid UTF-8.
    #[error("invalid UTF-8 in string value: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    /// Value rejected by a custom codec.
    #[error("invalid value: {0}")]
    Invalid(String),
}

/// Failure to encode or decode a whole message.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A positional field had no token left to consume.
    #[error("missing positional field {field}")]
    MissingPositional { field: &'static str },

    /// A prefixed scalar field matched more than one token.
    #[error("error on field {field}: expected single value, got {count}")]
    MultipleValues { field: &'static str, count: usize },

    /// A field value failed to decode.
    #[error("error on field {field}: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: FieldError,
    },

    /// A field value failed to encode.
    #[error("cannot marshal field {field}: {source}")]
    Encode {
        field: &'static str,
        #[source]
        source: FieldError,
    },
}

impl CodecError {
    /// Name of the field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            CodecError::MissingPositional { field }
            | CodecError::MultipleValues { field, .. }
            | CodecError::Decode { field, .. }
            | CodecError::Encode { field, .. } => field,
        }
    }
}

/// Result type alias for message-level codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
