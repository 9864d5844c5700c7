//! Error types for client table decoding.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur when loading or decoding a client table.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] dbfiles_common::Error),

    /// A read needed bytes past the end of its buffer.
    #[error("read of {needed} bytes at byte {offset} exceeds a {available}-byte buffer")]
    Bounds {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The target type and the file layout disagree.
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    /// The file uses a construct this reader does not support.
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// A segment did not end where its header said it would.
    #[error("{segment} segment ended at {actual}, expected {expected}")]
    SegmentIntegrity {
        segment: &'static str,
        expected: usize,
        actual: usize,
    },

    /// File signature is not one of the known table formats.
    #[error("unknown file signature {0:?}")]
    UnknownSignature([u8; 4]),

    /// Compiling a decoding plan failed earlier for this file handle.
    #[error("no decoding plan for {type_name}: {source}")]
    PlanUnavailable {
        type_name: &'static str,
        source: Arc<Error>,
    },
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A read ran past the available bytes.
    Bounds,
    /// Schema and file disagree, or an unknown tag was found.
    StructuralMismatch,
    /// The layout is valid but not supported.
    UnsupportedLayout,
    /// A segment was truncated or misparsed.
    SegmentIntegrity,
    /// Underlying I/O failure.
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Common(e) if e.is_eof() => ErrorKind::Bounds,
            Self::Common(_) => ErrorKind::StructuralMismatch,
            Self::Bounds { .. } => ErrorKind::Bounds,
            Self::StructuralMismatch(_) | Self::UnknownSignature(_) => ErrorKind::StructuralMismatch,
            Self::UnsupportedLayout(_) => ErrorKind::UnsupportedLayout,
            Self::SegmentIntegrity { .. } => ErrorKind::SegmentIntegrity,
            Self::PlanUnavailable { source, .. } => source.kind(),
        }
    }

    pub(crate) fn structural(message: impl Into<String>) -> Self {
        Self::StructuralMismatch(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedLayout(message.into())
    }
}

/// Result type for client table operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_eof_is_bounds() {
        let err = Error::from(dbfiles_common::Error::UnexpectedEof {
            position: 0,
            needed: 4,
            available: 1,
        });
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_cached_plan_error_keeps_kind() {
        let err = Error::PlanUnavailable {
            type_name: "Row",
            source: Arc::new(Error::structural("field x")),
        };
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
        assert!(err.to_string().contains("field x"));
    }
}
