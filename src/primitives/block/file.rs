use std::cmp::min;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::BlockRead;
use crate::primitives::bytes::be;
use crate::primitives::io::{FileIo, StdFileIo};
use crate::types::{block_crc32, RecordPtr, Result, RevkvError};

/// Bytes of CRC32 trailer at the end of every block.
pub const BLOCK_CRC_LEN: usize = 4;

/// Smallest block size accepted by [`BlockFile`].
pub const MIN_BLOCK_SIZE: u32 = 64;

/// A file carved into fixed-size blocks, each ending in a CRC32 of its payload.
///
/// Logical offsets skip the trailers: logical byte `n` lives in block
/// `n / payload_len` at position `n % payload_len`. Records freely straddle
/// block boundaries.
pub struct BlockFile<F: FileIo = StdFileIo> {
    io: F,
    block_size: u32,
    logical_len: AtomicU64,
    write_lock: Mutex<()>,
}

impl BlockFile<StdFileIo> {
    /// Opens (or creates) the file at `path`.
    pub fn open_path(path: impl AsRef<Path>, block_size: u32) -> Result<Self> {
        Self::open(StdFileIo::open(path)?, block_size)
    }
}

impl<F: FileIo> BlockFile<F> {
    /// Wraps `io`, recovering the logical length from the file size.
    ///
    /// The recovered length is rounded up to whole blocks; zero padding at the
    /// end of the last block reads back as data.
    pub fn open(io: F, block_size: u32) -> Result<Self> {
        if block_size < MIN_BLOCK_SIZE {
            return Err(RevkvError::Invalid("block size below minimum"));
        }
        let physical = io.len()?;
        if physical % u64::from(block_size) != 0 {
            return Err(RevkvError::Malformed(
                "file length is not a whole number of blocks",
            ));
        }
        let blocks = physical / u64::from(block_size);
        let payload = u64::from(block_size) - BLOCK_CRC_LEN as u64;
        debug!(block_size, blocks, "revkv.block.open");
        Ok(Self {
            io,
            block_size,
            logical_len: AtomicU64::new(blocks * payload),
            write_lock: Mutex::new(()),
        })
    }

    /// Configured block size, trailer included.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Payload bytes carried by each block.
    pub fn payload_len(&self) -> usize {
        self.block_size as usize - BLOCK_CRC_LEN
    }

    /// Writes `src` at logical `offset`, resealing every touched block.
    pub fn write_at(&self, offset: u64, src: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.write_locked(offset, src)
    }

    /// Appends `src` at the logical end and returns where it landed.
    pub fn append(&self, src: &[u8]) -> Result<RecordPtr> {
        let _guard = self.write_lock.lock();
        let pos = self.logical_len.load(Ordering::Acquire);
        self.write_locked(pos, src)?;
        Ok(RecordPtr(pos))
    }

    /// Flushes file contents to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.io.sync_all()
    }

    fn write_locked(&self, offset: u64, src: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(src.len() as u64)
            .ok_or(RevkvError::Invalid("write range overflows"))?;
        let payload_len = self.payload_len();
        let existing_blocks = self.io.len()? / u64::from(self.block_size);
        let mut block = vec![0u8; self.block_size as usize];
        let mut written = 0usize;
        while written < src.len() {
            let logical = offset + written as u64;
            let block_no = logical / payload_len as u64;
            let within = (logical % payload_len as u64) as usize;
            let n = min(payload_len - within, src.len() - written);
            if n < payload_len && block_no < existing_blocks {
                // Partial overwrite: keep the rest of the block, but refuse to
                // reseal bytes that were already corrupt.
                self.read_block(block_no, &mut block, true)?;
            } else {
                block.fill(0);
            }
            block[within..within + n].copy_from_slice(&src[written..written + n]);
            let crc = block_crc32(block_no, &block[..payload_len]);
            block[payload_len..].copy_from_slice(&crc.to_be_bytes());
            self.io
                .write_at(block_no * u64::from(self.block_size), &block)?;
            written += n;
        }
        self.logical_len.fetch_max(end, Ordering::AcqRel);
        trace!(offset, len = src.len(), "revkv.block.write");
        Ok(())
    }

    fn read_block(&self, block_no: u64, block: &mut [u8], verify: bool) -> Result<()> {
        self.io
            .read_at(block_no * u64::from(self.block_size), block)?;
        if verify {
            let payload_len = self.payload_len();
            let stored = be::get_u32(&block[payload_len..]);
            let actual = block_crc32(block_no, &block[..payload_len]);
            if stored != actual {
                warn!(
                    block = block_no,
                    stored, actual, "revkv.block.checksum_mismatch"
                );
                return Err(RevkvError::Checksum { block: block_no });
            }
        }
        Ok(())
    }
}

impl<F: FileIo> BlockRead for BlockFile<F> {
    fn read(&self, dst: &mut [u8], offset: u64, verify_checksum: bool) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        let end = offset
            .checked_add(dst.len() as u64)
            .ok_or(RevkvError::Invalid("read range overflows"))?;
        if end > self.logical_len.load(Ordering::Acquire) {
            return Err(RevkvError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read past logical end of block file",
            )));
        }
        let payload_len = self.payload_len();
        let mut block = vec![0u8; self.block_size as usize];
        let mut copied = 0usize;
        while copied < dst.len() {
            let logical = offset + copied as u64;
            let block_no = logical / payload_len as u64;
            let within = (logical % payload_len as u64) as usize;
            self.read_block(block_no, &mut block, verify_checksum)?;
            let n = min(payload_len - within, dst.len() - copied);
            dst[copied..copied + n].copy_from_slice(&block[within..within + n]);
            copied += n;
        }
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.logical_len.load(Ordering::Acquire))
    }
}
