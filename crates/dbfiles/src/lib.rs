//! dbfiles - client database table decoding library.
//!
//! This crate provides a unified interface to the dbfiles library ecosystem
//! for working with WDBC/WDB2/WDB5/WDB6 client tables.
//!
//! # Crates
//!
//! - [`dbfiles_common`] - Common utilities (binary reading, shared errors)
//! - [`dbfiles_wdb`] - Header parsing, segments and bit-packed record decoding
//!
//! # Example
//!
//! ```no_run
//! use dbfiles::prelude::*;
//! use dbfiles::table_record;
//!
//! table_record! {
//!     #[derive(Debug, Default)]
//!     pub struct Map {
//!         #[key]
//!         pub id: u32,
//!         pub directory: String,
//!         pub instance_type: u32,
//!     }
//! }
//!
//! let file = ClientFile::open("Map.db2")?;
//! println!("{} records ({})", file.record_count(), file.version());
//!
//! for map in file.records::<Map>() {
//!     let map = map?;
//!     println!("{:>6} {}", map.id, map.directory);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use dbfiles_common as common;
pub use dbfiles_wdb as wdb;

pub use dbfiles_wdb::table_record;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use dbfiles_common::BinaryReader;
    pub use dbfiles_wdb::{
        ClientFile, DecodesFromReader, Error, ErrorKind, FileLayout, FormatVersion, LoadOptions,
        RecordReader, TableRecord,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
