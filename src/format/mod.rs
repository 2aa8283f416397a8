//! On-disk record layouts and their decoder.
//!
//! [`records`] holds the typed records, [`codec`] the byte layouts and the
//! pure decode phases, and [`DropReader`] drives those phases against a
//! [`BlockRead`](crate::primitives::block::BlockRead) source.

pub mod codec;
mod reader;
pub mod records;

pub use reader::DropReader;
pub use records::{
    child_arity, flags, FileHeader, FileTail, KeyNode, KeyRecord, ValueRecord, ValueRevNode,
};
