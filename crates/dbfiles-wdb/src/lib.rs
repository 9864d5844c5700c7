//! Decoding engine for WDBC/WDB2/WDB5/WDB6 client tables.
//!
//! Client tables are binary row stores: a header, a block of fixed-stride
//! (or offset-located) records whose columns may be bit-packed, and
//! auxiliary segments for strings, sparse columns and record keys. This crate
//! maps each row onto a caller-declared Rust type.
//!
//! # Quick Start
//!
//! ```no_run
//! use dbfiles_wdb::{table_record, ClientFile};
//!
//! table_record! {
//!     #[derive(Debug, Default)]
//!     pub struct Achievement {
//!         #[key]
//!         pub id: u32,
//!         pub faction: i32,
//!         pub map: i32,
//!         pub parent: u32,
//!         pub title: String,
//!     }
//! }
//!
//! let file = ClientFile::open("Achievement.dbc")?;
//! for achievement in file.records::<Achievement>() {
//!     let achievement = achievement?;
//!     println!("{}: {}", achievement.id, achievement.title);
//! }
//! # Ok::<(), dbfiles_wdb::Error>(())
//! ```
//!
//! # Architecture
//!
//! - **Header** ([`header`]): reduces each format's header to a [`FileLayout`]
//! - **Segments** ([`segments`]): string block, common table, offset map,
//!   index table, copy table and relationship map, built once per file
//! - **Record reader** ([`RecordReader`]): bit-precise reads over one record
//! - **Mapping** ([`FieldMapping`]): binds the target type's members to the
//!   file's columns and checks their shapes agree
//! - **Plan** ([`DecodingPlan`]): compiled once per target type, executed
//!   once per record
//! - **File** ([`ClientFile`]): owns the bytes, segments and plan cache
//!
//! # Features
//!
//! - `parallel`: [`ClientFile::par_decode`] with rayon
//! - `serde`: `Serialize` on layout metadata

mod error;
mod file;
pub mod header;
pub mod mapping;
pub mod plan;
mod record_reader;
pub mod schema;
pub mod segments;
mod types;

pub use error::{Error, ErrorKind, Result};
pub use file::{ClientFile, LoadOptions, Records};
pub use header::{read_layout, FileLayout};
pub use mapping::{FieldDescriptor, FieldMapping, MappingOptions};
pub use plan::{CompileOptions, DecodeContext, DecodingPlan, PlanStyle};
pub use record_reader::{sign_extend, RecordReader};
pub use schema::{DecodesFromReader, FieldSlot, Member, Scalar, TableRecord};
pub use segments::{CommonTable, OffsetIndexSegments, Segment, StringTable};
pub use types::{CompressionKind, FormatVersion, Primitive};
