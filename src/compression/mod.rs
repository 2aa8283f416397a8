#![forbid(unsafe_code)]
//! Value compression.
//!
//! The file header names the codec applied to every value record. LZW is the
//! only real codec; its symbol table is a [`LimitedDict`] so the dictionary
//! never outgrows the configured code width.

use core::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::types::{Result, RevkvError};

mod dict;
mod limited;
pub mod lzw;

pub use dict::{Dict, SymbolTable, SEED_SYMBOLS};
pub use limited::{DictState, LimitedDict};

/// Codec identifier stored in the file header.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    /// Values are stored verbatim.
    #[default]
    None = 0,
    /// Values are LZW streams (see [`lzw`]).
    Lzw = 1,
}

impl CompressionCodec {
    /// Header byte for this codec.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CompressionCodec {
    type Error = RevkvError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionCodec::None),
            1 => Ok(CompressionCodec::Lzw),
            _ => Err(RevkvError::Malformed("unknown compression codec")),
        }
    }
}

/// Encodes a value for storage. `code_bits` only matters for LZW.
pub fn compress(codec: CompressionCodec, value: &[u8], code_bits: u8) -> Result<Vec<u8>> {
    match codec {
        CompressionCodec::None => Ok(value.to_vec()),
        CompressionCodec::Lzw => lzw::compress(value, code_bits),
    }
}

/// Recovers a stored value's plain bytes.
pub fn decompress(codec: CompressionCodec, stored: &[u8]) -> Result<Vec<u8>> {
    match codec {
        CompressionCodec::None => Ok(stored.to_vec()),
        CompressionCodec::Lzw => lzw::decompress(stored),
    }
}
