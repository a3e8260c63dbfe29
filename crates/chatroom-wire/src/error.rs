//! Wire-layer error types

use thiserror::Error;

/// Errors raised while decoding or encoding a frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Buffer shorter than a declared length field requires
    #[error("truncated frame: need {needed} bytes, got {actual}")]
    Truncated {
        /// Bytes the declared length field demands
        needed: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// A length field is out of its legal range
    #[error("invalid length field '{field}': {value}")]
    InvalidLength {
        /// Name of the offending field
        field: &'static str,
        /// The rejected value
        value: usize,
    },

    /// Bytes declared as UTF-8 were not valid UTF-8
    #[error("invalid utf-8 in field '{0}'")]
    InvalidUtf8(&'static str),

    /// An operation or state byte did not match a known code
    #[error("unrecognized code '{field}': {value}")]
    UnknownCode {
        /// Name of the offending field
        field: &'static str,
        /// The rejected byte value
        value: u8,
    },

    /// Credential payload did not parse as the expected JSON shape
    #[error("malformed credential payload: {0}")]
    MalformedCredentials(String),
}
