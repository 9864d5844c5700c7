//! Common utilities for dbfiles.
//!
//! This crate provides the byte-level building blocks used by the format crates:
//!
//! - [`BinaryReader`] - Zero-copy little-endian reading over a segment's bytes
//! - [`Error`] - Failures shared by every segment reader (EOF, out-of-range seeks)

mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for header structs.
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
