#![forbid(unsafe_code)]
//! Shared identifiers, error type, and checksum helpers.

use std::fmt;

use serde::Serialize;

/// Checksum primitives used by the block layer.
pub mod checksum;

pub use checksum::{block_crc32, Checksum, Crc32Fast};

/// Byte offset of a record in the logical (payload) address space of a file.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct RecordPtr(pub u64);

impl RecordPtr {
    /// Pointer value meaning "no record". Offset 0 always holds the file header.
    pub const NULL: RecordPtr = RecordPtr(0);

    /// Returns true if this is the null pointer.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RecordPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<u64> for RecordPtr {
    fn from(value: u64) -> Self {
        RecordPtr(value)
    }
}

impl From<RecordPtr> for u64 {
    fn from(value: RecordPtr) -> Self {
        value.0
    }
}

/// Revision number of a key or value.
pub type Revision = u32;

/// Errors raised by the format layer.
#[derive(thiserror::Error, Debug)]
pub enum RevkvError {
    /// Underlying file I/O failed.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// A block failed checksum verification.
    #[error("checksum mismatch in block {block}")]
    Checksum {
        /// Physical block number whose stored CRC did not match.
        block: u64,
    },
    /// Persisted bytes do not describe a well-formed record.
    #[error("malformed record: {0}")]
    Malformed(&'static str),
    /// A caller supplied an unusable argument.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

impl RevkvError {
    /// Returns true for checksum failures.
    pub fn is_checksum(&self) -> bool {
        matches!(self, RevkvError::Checksum { .. })
    }

    /// Returns true for malformed record failures.
    pub fn is_malformed(&self) -> bool {
        matches!(self, RevkvError::Malformed(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RevkvError>;
