//! Record codec and structural decoder for a multi-revision key-value file.
//!
//! A store file is an append-only sequence of self-describing records laid
//! over checksummed blocks. [`format::DropReader`] reconstructs typed records
//! from positions in such a file; [`format::codec`] holds the byte layouts;
//! [`compression`] provides the LZW value codec and its bounded dictionary.

#![warn(missing_docs)]

pub mod compression;
pub mod format;
pub mod options;
pub mod primitives;
pub mod types;

pub use format::{DropReader, FileHeader, FileTail, KeyNode, KeyRecord, ValueRecord, ValueRevNode};
pub use options::{ConfigError, FormatOptions};
pub use types::{RecordPtr, Result, Revision, RevkvError};
