//! Byte layouts for every record type.
//!
//! ```text
//! FileHeader   tail:8 key_tree_min:4 value_rev_tree_min:4 compressed:1 codec:1 block_size:4
//! FileTail     revision:4 root:8 avg_key_len:4 avg_value_len:4 entry_count:8
//! KeyNode      leaf:1 count:4 {len:4 key}*count ptr:8*arity
//! KeyRecord    flag:1 len:4 key rev_root:8 revision:4 latest_value:8
//! ValueRevNode leaf:1 count:4 revision:4*count ptr:8*arity
//! ValueRecord  flag:1 len:4 value revision:4
//! ```
//!
//! All integers are big-endian. `arity` is `count` for leaves and `count + 1`
//! for internal nodes. Encoding is pure and infallible; decoding is split into
//! the same phases the block reader walks through, so each phase can be fed
//! bytes directly.

use crate::primitives::bytes::{be, buf::Cursor};
use crate::types::{RecordPtr, Result, Revision, RevkvError};

use super::records::{
    child_arity, FileHeader, FileTail, KeyNode, KeyRecord, ValueRecord, ValueRevNode,
    INTERNAL_BYTE, LEAF_BYTE,
};

/// Flag/leaf byte plus a `u32` count or length.
pub const PREFIX_LEN: usize = 5;
/// Size of a `u32` length field.
pub const LEN_FIELD: usize = 4;
/// Size of one encoded pointer.
pub const PTR_LEN: usize = 8;
/// Size of one encoded revision number.
pub const REVISION_LEN: usize = 4;
/// Fixed bytes following the key in a key record: rev_root, revision, latest_value.
pub const KEY_RECORD_TRAILER_LEN: usize = PTR_LEN + REVISION_LEN + PTR_LEN;
/// Fixed bytes following the value in a value record: revision.
pub const VALUE_RECORD_TRAILER_LEN: usize = REVISION_LEN;

/// The five bytes every node and variable-length record starts with.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Prefix {
    /// Leaf flag for nodes, status flag for records.
    pub flag: u8,
    /// Element count for nodes, byte length for records.
    pub count: u32,
}

impl Prefix {
    /// Splits the raw prefix bytes.
    pub fn parse(bytes: &[u8; PREFIX_LEN]) -> Self {
        Self {
            flag: bytes[0],
            count: be::get_u32(&bytes[1..]),
        }
    }

    /// Interprets `flag` as a node's leaf byte.
    pub fn leaf(&self) -> Result<bool> {
        match self.flag {
            LEAF_BYTE => Ok(true),
            INTERNAL_BYTE => Ok(false),
            _ => Err(RevkvError::Malformed("node leaf flag is neither 0 nor 1")),
        }
    }
}

/// Bytes following a key record's prefix.
pub fn key_record_payload_len(prefix: &Prefix) -> u64 {
    u64::from(prefix.count) + KEY_RECORD_TRAILER_LEN as u64
}

/// Bytes following a value record's prefix.
pub fn value_record_payload_len(prefix: &Prefix) -> u64 {
    u64::from(prefix.count) + VALUE_RECORD_TRAILER_LEN as u64
}

/// Bytes taken by a revision-node's revision array.
pub fn revision_array_len(count: u32) -> u64 {
    u64::from(count) * REVISION_LEN as u64
}

/// Bytes taken by a node's pointer array.
pub fn pointer_array_len(leaf: bool, count: u32) -> u64 {
    child_arity(leaf, count as usize) as u64 * PTR_LEN as u64
}

/// Decodes the bytes after a key record's prefix.
pub fn decode_key_record_payload(prefix: &Prefix, payload: &[u8]) -> Result<KeyRecord> {
    let mut cur = Cursor::new(payload);
    let key = cur.take(prefix.count as usize)?.to_vec();
    let rev_root = RecordPtr(cur.read_u64()?);
    let revision = cur.read_u32()?;
    let latest_value = RecordPtr(cur.read_u64()?);
    cur.ensure_consumed()?;
    Ok(KeyRecord {
        flag: prefix.flag,
        key,
        rev_root,
        revision,
        latest_value,
    })
}

/// Decodes the bytes after a value record's prefix.
pub fn decode_value_record_payload(prefix: &Prefix, payload: &[u8]) -> Result<ValueRecord> {
    let mut cur = Cursor::new(payload);
    let value = cur.take(prefix.count as usize)?.to_vec();
    let revision = cur.read_u32()?;
    cur.ensure_consumed()?;
    Ok(ValueRecord {
        flag: prefix.flag,
        value,
        revision,
    })
}

/// Decodes a packed revision array.
pub fn decode_revisions(bytes: &[u8]) -> Result<Vec<Revision>> {
    if bytes.len() % REVISION_LEN != 0 {
        return Err(RevkvError::Malformed("revision array has a partial entry"));
    }
    Ok(bytes.chunks_exact(REVISION_LEN).map(be::get_u32).collect())
}

/// Decodes a packed pointer array.
pub fn decode_pointers(bytes: &[u8]) -> Result<Vec<RecordPtr>> {
    if bytes.len() % PTR_LEN != 0 {
        return Err(RevkvError::Malformed("pointer array has a partial entry"));
    }
    Ok(bytes
        .chunks_exact(PTR_LEN)
        .map(|chunk| RecordPtr(be::get_u64(chunk)))
        .collect())
}

/// Encodes the file header.
pub fn encode_header(header: &FileHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(FileHeader::LEN);
    be::put_u64(&mut out, header.tail.0);
    be::put_u32(&mut out, header.key_tree_min);
    be::put_u32(&mut out, header.value_rev_tree_min);
    out.push(header.value_compressed);
    out.push(header.compression_codec);
    be::put_u32(&mut out, header.block_size);
    debug_assert_eq!(out.len(), FileHeader::LEN);
    out
}

/// Decodes exactly [`FileHeader::LEN`] bytes.
pub fn decode_header(bytes: &[u8]) -> Result<FileHeader> {
    let mut cur = Cursor::new(bytes);
    let header = FileHeader {
        tail: RecordPtr(cur.read_u64()?),
        key_tree_min: cur.read_u32()?,
        value_rev_tree_min: cur.read_u32()?,
        value_compressed: cur.read_u8()?,
        compression_codec: cur.read_u8()?,
        block_size: cur.read_u32()?,
    };
    cur.ensure_consumed()?;
    Ok(header)
}

/// Encodes a file tail.
pub fn encode_tail(tail: &FileTail) -> Vec<u8> {
    let mut out = Vec::with_capacity(FileTail::LEN);
    be::put_u32(&mut out, tail.revision);
    be::put_u64(&mut out, tail.root_node.0);
    be::put_u32(&mut out, tail.avg_key_len);
    be::put_u32(&mut out, tail.avg_value_len);
    be::put_u64(&mut out, tail.entry_count);
    debug_assert_eq!(out.len(), FileTail::LEN);
    out
}

/// Decodes exactly [`FileTail::LEN`] bytes.
pub fn decode_tail(bytes: &[u8]) -> Result<FileTail> {
    let mut cur = Cursor::new(bytes);
    let tail = FileTail {
        revision: cur.read_u32()?,
        root_node: RecordPtr(cur.read_u64()?),
        avg_key_len: cur.read_u32()?,
        avg_value_len: cur.read_u32()?,
        entry_count: cur.read_u64()?,
    };
    cur.ensure_consumed()?;
    Ok(tail)
}

fn put_prefix(out: &mut Vec<u8>, flag: u8, count: usize) {
    assert!(
        count <= u32::MAX as usize,
        "count {count} does not fit the u32 prefix"
    );
    out.push(flag);
    be::put_u32(out, count as u32);
}

fn leaf_byte(leaf: bool) -> u8 {
    if leaf {
        LEAF_BYTE
    } else {
        INTERNAL_BYTE
    }
}

fn put_pointers(out: &mut Vec<u8>, children: &[RecordPtr]) {
    for child in children {
        be::put_u64(out, child.0);
    }
}

/// Encodes a key-tree node.
pub fn encode_key_node(node: &KeyNode) -> Vec<u8> {
    let mut out = Vec::with_capacity(node.encoded_len());
    put_prefix(&mut out, leaf_byte(node.is_leaf()), node.keys().len());
    for key in node.keys() {
        be::put_len_prefixed(&mut out, key);
    }
    put_pointers(&mut out, node.children());
    out
}

/// Decodes a whole key-tree node from one buffer.
pub fn decode_key_node(bytes: &[u8]) -> Result<KeyNode> {
    let mut cur = Cursor::new(bytes);
    let prefix = read_prefix(&mut cur)?;
    let leaf = prefix.leaf()?;
    // Each key costs at least its length field.
    let mut keys = Vec::with_capacity((prefix.count as usize).min(cur.remaining() / LEN_FIELD));
    for _ in 0..prefix.count {
        keys.push(cur.read_len_prefixed()?.to_vec());
    }
    let children = take_pointers(&mut cur, leaf, prefix.count)?;
    cur.ensure_consumed()?;
    KeyNode::new(leaf, keys, children)
}

/// Encodes a key record.
pub fn encode_key_record(record: &KeyRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(record.encoded_len());
    put_prefix(&mut out, record.flag, record.key.len());
    out.extend_from_slice(&record.key);
    be::put_u64(&mut out, record.rev_root.0);
    be::put_u32(&mut out, record.revision);
    be::put_u64(&mut out, record.latest_value.0);
    out
}

/// Decodes a whole key record from one buffer.
pub fn decode_key_record(bytes: &[u8]) -> Result<KeyRecord> {
    let (prefix, payload) = split_prefix(bytes)?;
    decode_key_record_payload(&prefix, payload)
}

/// Encodes a value-revision node.
pub fn encode_value_rev_node(node: &ValueRevNode) -> Vec<u8> {
    let mut out = Vec::with_capacity(node.encoded_len());
    put_prefix(&mut out, leaf_byte(node.is_leaf()), node.revisions().len());
    for &revision in node.revisions() {
        be::put_u32(&mut out, revision);
    }
    put_pointers(&mut out, node.children());
    out
}

/// Decodes a whole value-revision node from one buffer.
pub fn decode_value_rev_node(bytes: &[u8]) -> Result<ValueRevNode> {
    let mut cur = Cursor::new(bytes);
    let prefix = read_prefix(&mut cur)?;
    let leaf = prefix.leaf()?;
    let revisions = decode_revisions(take_len(&mut cur, revision_array_len(prefix.count))?)?;
    let children = take_pointers(&mut cur, leaf, prefix.count)?;
    cur.ensure_consumed()?;
    ValueRevNode::new(leaf, revisions, children)
}

/// Encodes a value record.
pub fn encode_value_record(record: &ValueRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(record.encoded_len());
    put_prefix(&mut out, record.flag, record.value.len());
    out.extend_from_slice(&record.value);
    be::put_u32(&mut out, record.revision);
    out
}

/// Decodes a whole value record from one buffer.
pub fn decode_value_record(bytes: &[u8]) -> Result<ValueRecord> {
    let (prefix, payload) = split_prefix(bytes)?;
    decode_value_record_payload(&prefix, payload)
}

fn read_prefix(cur: &mut Cursor<'_>) -> Result<Prefix> {
    let raw: &[u8; PREFIX_LEN] = cur
        .take(PREFIX_LEN)?
        .try_into()
        .map_err(|_| RevkvError::Malformed("record prefix truncated"))?;
    Ok(Prefix::parse(raw))
}

fn split_prefix(bytes: &[u8]) -> Result<(Prefix, &[u8])> {
    let mut cur = Cursor::new(bytes);
    let prefix = read_prefix(&mut cur)?;
    Ok((prefix, &bytes[PREFIX_LEN..]))
}

fn take_len<'a>(cur: &mut Cursor<'a>, len: u64) -> Result<&'a [u8]> {
    let len = usize::try_from(len).map_err(|_| RevkvError::Malformed("array length overflows"))?;
    cur.take(len)
}

fn take_pointers(cur: &mut Cursor<'_>, leaf: bool, count: u32) -> Result<Vec<RecordPtr>> {
    decode_pointers(take_len(cur, pointer_array_len(leaf, count))?)
}
