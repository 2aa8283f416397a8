use tracing::{debug, trace};

use crate::compression::CompressionCodec;
use crate::primitives::block::BlockRead;
use crate::primitives::bytes::be;
use crate::types::{RecordPtr, Result, RevkvError};

use super::codec::{self, Prefix, LEN_FIELD, PREFIX_LEN};
use super::records::{FileHeader, FileTail, KeyNode, KeyRecord, ValueRecord, ValueRevNode};

/// Keys reserved up front by a node decode; the rest grow on demand.
const KEY_PREALLOC: usize = 64;

/// Reconstructs typed records from file positions.
///
/// Records are self-describing, so most decodes take several dependent reads:
/// a fixed prefix first, then whatever lengths that prefix announces. Every
/// read is checksum-verified by the underlying [`BlockRead`]; a checksum
/// failure on any of them aborts the decode and is returned unchanged.
/// Before each dependent read the announced extent is checked against
/// [`BlockRead::len`], so a corrupt length surfaces as
/// [`RevkvError::Malformed`] rather than as an oversized allocation.
pub struct DropReader<R> {
    src: R,
}

impl<R: BlockRead> DropReader<R> {
    /// Reads records from `src`.
    pub fn new(src: R) -> Self {
        Self { src }
    }

    /// Underlying block source.
    pub fn get_ref(&self) -> &R {
        &self.src
    }

    /// Consumes the reader.
    pub fn into_inner(self) -> R {
        self.src
    }

    /// Reads the header at offset 0.
    pub fn read_header(&self) -> Result<FileHeader> {
        let buf = self.read_extent(0, FileHeader::LEN as u64, "header runs past end of file")?;
        codec::decode_header(&buf)
    }

    /// Reads the tail at `pos`.
    pub fn read_tail(&self, pos: RecordPtr) -> Result<FileTail> {
        let buf = self.read_extent(pos.0, FileTail::LEN as u64, "tail runs past end of file")?;
        codec::decode_tail(&buf)
    }

    /// Reads a key-tree node: prefix, then each key's length and bytes in
    /// turn, then the pointer array.
    pub fn read_key_node(&self, pos: RecordPtr) -> Result<KeyNode> {
        let prefix = self.read_prefix(pos.0)?;
        let leaf = prefix.leaf()?;
        let mut offset = pos.0 + PREFIX_LEN as u64;
        // Every key carries at least its length field.
        self.ensure_available(
            offset,
            u64::from(prefix.count) * LEN_FIELD as u64,
            "key count runs past end of file",
        )?;
        let mut keys = Vec::with_capacity(key_capacity(prefix.count));
        for _ in 0..prefix.count {
            let len_buf = self.read_extent(offset, LEN_FIELD as u64, "key length runs past end of file")?;
            offset += LEN_FIELD as u64;
            let key_len = u64::from(be::get_u32(&len_buf));
            let key = self.read_extent(offset, key_len, "key runs past end of file")?;
            offset += key_len;
            keys.push(key);
        }
        let ptr_bytes = self.read_extent(
            offset,
            codec::pointer_array_len(leaf, prefix.count),
            "key node pointers run past end of file",
        )?;
        let children = codec::decode_pointers(&ptr_bytes)?;
        trace!(pos = pos.0, leaf, keys = keys.len(), "revkv.reader.key_node");
        KeyNode::new(leaf, keys, children)
    }

    /// Reads a key record: prefix, then one read for key and trailer.
    pub fn read_key_record(&self, pos: RecordPtr) -> Result<KeyRecord> {
        let prefix = self.read_prefix(pos.0)?;
        let payload = self.read_extent(
            pos.0 + PREFIX_LEN as u64,
            codec::key_record_payload_len(&prefix),
            "key record runs past end of file",
        )?;
        trace!(pos = pos.0, key_len = prefix.count, "revkv.reader.key_record");
        codec::decode_key_record_payload(&prefix, &payload)
    }

    /// Reads a value-revision node: prefix, revision array, pointer array.
    pub fn read_value_rev_node(&self, pos: RecordPtr) -> Result<ValueRevNode> {
        let prefix = self.read_prefix(pos.0)?;
        let leaf = prefix.leaf()?;
        let mut offset = pos.0 + PREFIX_LEN as u64;
        let rev_len = codec::revision_array_len(prefix.count);
        let rev_bytes = self.read_extent(offset, rev_len, "revisions run past end of file")?;
        offset += rev_len;
        let ptr_bytes = self.read_extent(
            offset,
            codec::pointer_array_len(leaf, prefix.count),
            "revision node pointers run past end of file",
        )?;
        let revisions = codec::decode_revisions(&rev_bytes)?;
        let children = codec::decode_pointers(&ptr_bytes)?;
        trace!(
            pos = pos.0,
            leaf,
            revisions = revisions.len(),
            "revkv.reader.value_rev_node"
        );
        ValueRevNode::new(leaf, revisions, children)
    }

    /// Reads a value record: prefix, then one read for value and revision.
    pub fn read_value_record(&self, pos: RecordPtr) -> Result<ValueRecord> {
        let prefix = self.read_prefix(pos.0)?;
        let payload = self.read_extent(
            pos.0 + PREFIX_LEN as u64,
            codec::value_record_payload_len(&prefix),
            "value record runs past end of file",
        )?;
        trace!(pos = pos.0, value_len = prefix.count, "revkv.reader.value_record");
        codec::decode_value_record_payload(&prefix, &payload)
    }

    /// Reads a value record and returns its plain bytes under `codec`.
    pub fn read_value(&self, pos: RecordPtr, codec: CompressionCodec) -> Result<Vec<u8>> {
        self.read_value_record(pos)?.plain_value(codec)
    }

    /// Follows a key record to its newest value.
    pub fn read_latest_value(&self, record: &KeyRecord, codec: CompressionCodec) -> Result<Vec<u8>> {
        if record.latest_value.is_null() {
            return Err(RevkvError::Malformed("key record has no value"));
        }
        self.read_value(record.latest_value, codec)
    }

    fn read_prefix(&self, pos: u64) -> Result<Prefix> {
        let mut raw = [0u8; PREFIX_LEN];
        self.ensure_available(pos, PREFIX_LEN as u64, "record prefix runs past end of file")?;
        self.src.read(&mut raw, pos, true)?;
        Ok(Prefix::parse(&raw))
    }

    fn read_extent(&self, pos: u64, len: u64, what: &'static str) -> Result<Vec<u8>> {
        self.ensure_available(pos, len, what)?;
        let mut buf = vec![0u8; len as usize];
        if !buf.is_empty() {
            self.src.read(&mut buf, pos, true)?;
        }
        Ok(buf)
    }

    fn ensure_available(&self, pos: u64, len: u64, what: &'static str) -> Result<()> {
        let available = self.src.len()?;
        let fits = pos
            .checked_add(len)
            .map_or(false, |end| end <= available);
        if !fits {
            debug!(pos, len, available, reason = what, "revkv.reader.malformed");
            return Err(RevkvError::Malformed(what));
        }
        Ok(())
    }
}

fn key_capacity(count: u32) -> usize {
    (count as usize).min(KEY_PREALLOC)
}
