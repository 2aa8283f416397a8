use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::BlockRead;
use crate::types::{Result, RevkvError};

/// In-memory [`BlockRead`] with deterministic fault injection.
///
/// Failures are keyed by read ordinal (0-based, counting every call to
/// [`BlockRead::read`]). An injected checksum failure reports the read offset
/// as its block number.
#[derive(Debug)]
pub struct MemBlocks {
    data: Vec<u8>,
    available: u64,
    fail_read: Option<usize>,
    reads: AtomicUsize,
}

impl MemBlocks {
    /// Serves `data` with no faults.
    pub fn new(data: Vec<u8>) -> Self {
        let available = data.len() as u64;
        Self {
            data,
            available,
            fail_read: None,
            reads: AtomicUsize::new(0),
        }
    }

    /// Makes the `nth` verified read fail with a checksum error.
    pub fn fail_read(mut self, nth: usize) -> Self {
        self.fail_read = Some(nth);
        self
    }

    /// Pretends only the first `available` bytes exist.
    pub fn truncate(mut self, available: u64) -> Self {
        self.available = available.min(self.data.len() as u64);
        self
    }

    /// Number of reads issued so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl BlockRead for MemBlocks {
    fn read(&self, dst: &mut [u8], offset: u64, verify_checksum: bool) -> Result<()> {
        let ordinal = self.reads.fetch_add(1, Ordering::Relaxed);
        if verify_checksum && self.fail_read == Some(ordinal) {
            return Err(RevkvError::Checksum { block: offset });
        }
        let end = offset
            .checked_add(dst.len() as u64)
            .ok_or(RevkvError::Invalid("read range overflows"))?;
        if end > self.available {
            return Err(RevkvError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of in-memory blocks",
            )));
        }
        dst.copy_from_slice(&self.data[offset as usize..end as usize]);
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.available)
    }
}
