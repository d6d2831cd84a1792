//! Protocol error types.

use thiserror::Error;

/// Errors produced while parsing protocol bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The request packet does not start with the archive request code.
    #[error("unknown request code {code:#04x} (expected {expected:#04x})")]
    UnknownRequestCode {
        /// Code byte found on the wire.
        code: u8,
        /// The only code this protocol defines.
        expected: u8,
    },

    /// The buffer is the wrong length for a fixed-size layout.
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength {
        /// Required length of the layout.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },
}

/// Convenience alias for protocol parsing results.
pub type Result<T> = std::result::Result<T, ProtocolError>;
