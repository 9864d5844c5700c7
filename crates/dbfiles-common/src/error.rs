//! Error types for dbfiles-common.

use thiserror::Error;

/// Common error type for byte-level reads.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer: needed {needed} bytes at {position} but only {available} available")]
    UnexpectedEof {
        position: usize,
        needed: usize,
        available: usize,
    },

    /// Seek target lies beyond the end of the buffer.
    #[error("seek to {target} is past the end of a {len}-byte buffer")]
    SeekOutOfRange { target: usize, len: usize },
}

impl Error {
    /// Whether this error means a read ran past the available bytes.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. } | Self::SeekOutOfRange { .. })
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
