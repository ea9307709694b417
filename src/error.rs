//! Error types for the crocus crate.

use thiserror::Error;

/// Error type covering every failure surfaced by this crate.
#[derive(Error, Debug)]
pub enum CrocusError {
    /// I/O error from the underlying stream, propagated unchanged.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The on-disk data is malformed: bad header/footer, checksum mismatch,
    /// violated field statistics invariants, or undecodable structures.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// The requested operation is not supported by this dictionary kind.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A programming-contract violation, distinct from corruption: the caller
    /// (or the crate itself) used an API outside its documented protocol.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Invalid argument supplied by the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CrocusError {
    /// Create a corruption error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        CrocusError::CorruptIndex(msg.into())
    }

    /// Create an unsupported-operation error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        CrocusError::Unsupported(msg.into())
    }

    /// Create an illegal-state error.
    pub fn illegal_state<S: Into<String>>(msg: S) -> Self {
        CrocusError::IllegalState(msg.into())
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        CrocusError::InvalidArgument(msg.into())
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, CrocusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CrocusError::corrupt("bad magic");
        assert_eq!(err.to_string(), "corrupt index: bad magic");

        let err = CrocusError::unsupported("ord()");
        assert_eq!(err.to_string(), "unsupported operation: ord()");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: CrocusError = io.into();
        assert!(matches!(err, CrocusError::Io(_)));
    }
}
