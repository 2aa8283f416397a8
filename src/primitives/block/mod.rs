#![forbid(unsafe_code)]
//! Checksum-verified reads over a logical byte address space.
//!
//! Everything above this module addresses records by logical offset and never
//! sees block boundaries or CRC trailers. [`BlockRead`] is the only capability
//! the record decoder needs, so tests can substitute [`MemBlocks`] to inject
//! checksum failures and truncation deterministically.

use std::sync::Arc;

use crate::types::Result;

mod file;
mod mem;

pub use file::{BlockFile, BLOCK_CRC_LEN, MIN_BLOCK_SIZE};
pub use mem::MemBlocks;

/// Source of checksum-verified byte ranges.
pub trait BlockRead {
    /// Fills `dst` with the bytes at logical `offset`.
    ///
    /// With `verify_checksum` set, every underlying block touched by the read
    /// is verified first and a mismatch fails with
    /// [`RevkvError::Checksum`](crate::types::RevkvError::Checksum).
    fn read(&self, dst: &mut [u8], offset: u64, verify_checksum: bool) -> Result<()>;

    /// Logical length of the readable address space.
    fn len(&self) -> Result<u64>;

    /// Returns true when nothing has been written yet.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl<T: BlockRead + ?Sized> BlockRead for &T {
    fn read(&self, dst: &mut [u8], offset: u64, verify_checksum: bool) -> Result<()> {
        (**self).read(dst, offset, verify_checksum)
    }

    fn len(&self) -> Result<u64> {
        (**self).len()
    }
}

impl<T: BlockRead + ?Sized> BlockRead for Arc<T> {
    fn read(&self, dst: &mut [u8], offset: u64, verify_checksum: bool) -> Result<()> {
        (**self).read(dst, offset, verify_checksum)
    }

    fn len(&self) -> Result<u64> {
        (**self).len()
    }
}
