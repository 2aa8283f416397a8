use core::convert::TryFrom;

use serde::Serialize;

use crate::compression::{self, CompressionCodec};
use crate::types::{RecordPtr, Result, Revision, RevkvError};

/// Leaf flag byte for leaf nodes.
pub const LEAF_BYTE: u8 = 1;
/// Leaf flag byte for internal nodes.
pub const INTERNAL_BYTE: u8 = 0;

/// Status flags carried by key and value records.
pub mod flags {
    /// The record holds a live key or value.
    pub const LIVE: u8 = 0x01;
    /// The record marks a deletion.
    pub const TOMBSTONE: u8 = 0x00;
}

/// Number of child pointers a node with `count` keys must carry.
///
/// Leaves point at one record per key; internal nodes carry one more child
/// than separators.
pub const fn child_arity(leaf: bool, count: usize) -> usize {
    if leaf {
        count
    } else {
        count + 1
    }
}

/// Fixed-position file metadata at offset 0.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FileHeader {
    /// Position of the current [`FileTail`].
    pub tail: RecordPtr,
    /// Minimum fan-out of the key tree.
    pub key_tree_min: u32,
    /// Minimum fan-out of every value-revision tree.
    pub value_rev_tree_min: u32,
    /// Non-zero when value records are compressed.
    pub value_compressed: u8,
    /// [`CompressionCodec`] byte.
    pub compression_codec: u8,
    /// Block size the file was created with.
    pub block_size: u32,
}

impl FileHeader {
    /// Encoded size: 8 + 4 + 4 + 1 + 1 + 4.
    pub const LEN: usize = 22;

    /// Codec that applies to value records in this file.
    pub fn codec(&self) -> Result<CompressionCodec> {
        if self.value_compressed == 0 {
            return Ok(CompressionCodec::None);
        }
        CompressionCodec::try_from(self.compression_codec)
    }

    /// Copy of this header pointing at a new tail.
    pub fn with_tail(&self, tail: RecordPtr) -> Self {
        Self {
            tail,
            ..self.clone()
        }
    }
}

/// Store statistics written once per commit.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct FileTail {
    /// Commit revision counter.
    pub revision: Revision,
    /// Root of the key tree at this revision.
    pub root_node: RecordPtr,
    /// Average key length in bytes.
    pub avg_key_len: u32,
    /// Average value length in bytes.
    pub avg_value_len: u32,
    /// Number of live keys.
    pub entry_count: u64,
}

impl FileTail {
    /// Encoded size: 4 + 8 + 4 + 4 + 8.
    pub const LEN: usize = 28;
}

/// Node of the primary key B+ tree.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct KeyNode {
    leaf: bool,
    #[serde(serialize_with = "hex_bytes::serialize_all")]
    keys: Vec<Vec<u8>>,
    children: Vec<RecordPtr>,
}

impl KeyNode {
    /// Builds a node, rejecting a pointer count that disagrees with `leaf`.
    pub fn new(leaf: bool, keys: Vec<Vec<u8>>, children: Vec<RecordPtr>) -> Result<Self> {
        if children.len() != child_arity(leaf, keys.len()) {
            return Err(RevkvError::Malformed(
                "key node pointer count does not match leaf flag",
            ));
        }
        Ok(Self {
            leaf,
            keys,
            children,
        })
    }

    /// Whether children are key records rather than nodes.
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// Keys in order.
    pub fn keys(&self) -> &[Vec<u8>] {
        &self.keys
    }

    /// Child-node or key-record pointers.
    pub fn children(&self) -> &[RecordPtr] {
        &self.children
    }

    /// Consumes the node.
    pub fn into_parts(self) -> (bool, Vec<Vec<u8>>, Vec<RecordPtr>) {
        (self.leaf, self.keys, self.children)
    }

    /// Bytes produced by encoding this node.
    pub fn encoded_len(&self) -> usize {
        let keys: usize = self.keys.iter().map(|k| 4 + k.len()).sum();
        5 + keys + self.children.len() * 8
    }
}

/// Leaf-level entry describing one key.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct KeyRecord {
    /// Status flag (see [`flags`]).
    pub flag: u8,
    /// Key bytes.
    #[serde(with = "hex_bytes")]
    pub key: Vec<u8>,
    /// Root of this key's value-revision tree.
    pub rev_root: RecordPtr,
    /// Current revision of the key.
    pub revision: Revision,
    /// Newest [`ValueRecord`].
    pub latest_value: RecordPtr,
}

impl KeyRecord {
    /// Bytes produced by encoding this record.
    pub fn encoded_len(&self) -> usize {
        5 + self.key.len() + 8 + 4 + 8
    }

    /// Successor record for the next revision of the same key.
    pub fn next_revision(&self, rev_root: RecordPtr, latest_value: RecordPtr) -> Result<Self> {
        let revision = self
            .revision
            .checked_add(1)
            .ok_or(RevkvError::Invalid("key revision counter exhausted"))?;
        Ok(Self {
            flag: self.flag,
            key: self.key.clone(),
            rev_root,
            revision,
            latest_value,
        })
    }

    /// Returns true when the flag marks a deletion.
    pub fn is_tombstone(&self) -> bool {
        self.flag == flags::TOMBSTONE
    }
}

/// Node of a per-key value-revision B+ tree.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ValueRevNode {
    leaf: bool,
    revisions: Vec<Revision>,
    children: Vec<RecordPtr>,
}

impl ValueRevNode {
    /// Builds a node, rejecting a pointer count that disagrees with `leaf`.
    pub fn new(leaf: bool, revisions: Vec<Revision>, children: Vec<RecordPtr>) -> Result<Self> {
        if children.len() != child_arity(leaf, revisions.len()) {
            return Err(RevkvError::Malformed(
                "revision node pointer count does not match leaf flag",
            ));
        }
        Ok(Self {
            leaf,
            revisions,
            children,
        })
    }

    /// Whether children are value records rather than nodes.
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// Revision numbers in order.
    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    /// Child-node or value-record pointers.
    pub fn children(&self) -> &[RecordPtr] {
        &self.children
    }

    /// Consumes the node.
    pub fn into_parts(self) -> (bool, Vec<Revision>, Vec<RecordPtr>) {
        (self.leaf, self.revisions, self.children)
    }

    /// Bytes produced by encoding this node.
    pub fn encoded_len(&self) -> usize {
        5 + self.revisions.len() * 4 + self.children.len() * 8
    }
}

/// One historical value at one revision.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ValueRecord {
    /// Status flag (see [`flags`]).
    pub flag: u8,
    /// Stored bytes, compressed when the file header says so.
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    /// Revision this value was written at.
    pub revision: Revision,
}

impl ValueRecord {
    /// Builds a record whose stored bytes are `plain` run through `codec`.
    pub fn compressed(
        flag: u8,
        plain: &[u8],
        revision: Revision,
        codec: CompressionCodec,
        code_bits: u8,
    ) -> Result<Self> {
        Ok(Self {
            flag,
            value: compression::compress(codec, plain, code_bits)?,
            revision,
        })
    }

    /// Plain value bytes under `codec`.
    pub fn plain_value(&self, codec: CompressionCodec) -> Result<Vec<u8>> {
        compression::decompress(codec, &self.value)
    }

    /// Bytes produced by encoding this record.
    pub fn encoded_len(&self) -> usize {
        5 + self.value.len() + 4
    }
}

mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn serialize_all<S: Serializer>(
        all: &[Vec<u8>],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(all.iter().map(hex::encode))
    }
}
