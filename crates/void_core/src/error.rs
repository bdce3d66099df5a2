//! Error types for the core library

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

/// Errors raised while decoding binary data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a value could be read
    UnexpectedEof { needed: usize, remaining: usize },
    /// A string field did not contain valid UTF-8
    InvalidUtf8,
    /// A length prefix does not fit the target type or the remaining input
    LengthOverflow(u64),
    /// Structurally invalid data
    Invalid(Box<str>),
}

impl CodecError {
    /// Build an `Invalid` error from any message
    pub fn invalid(msg: impl Into<String>) -> Self {
        CodecError::Invalid(msg.into().into_boxed_str())
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnexpectedEof { needed, remaining } => write!(
                f,
                "Unexpected end of input: needed {} bytes, {} remaining",
                needed, remaining
            ),
            CodecError::InvalidUtf8 => write!(f, "String is not valid UTF-8"),
            CodecError::LengthOverflow(len) => write!(f, "Length prefix out of range: {}", len),
            CodecError::Invalid(msg) => write!(f, "Invalid data: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

/// Result type alias for codec operations
pub type CodecResult<T> = core::result::Result<T, CodecError>;
