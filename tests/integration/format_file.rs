//! End-to-end tests over a real checksummed file.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Once;

use revkv::compression::CompressionCodec;
use revkv::format::codec::{
    encode_header, encode_key_node, encode_key_record, encode_tail, encode_value_record,
    encode_value_rev_node,
};
use revkv::format::{
    flags, DropReader, FileHeader, FileTail, KeyNode, KeyRecord, ValueRecord, ValueRevNode,
};
use revkv::options::FormatOptions;
use revkv::primitives::block::{BlockFile, BlockRead, BLOCK_CRC_LEN};
use revkv::{RecordPtr, Result};
use tempfile::tempdir;
use tracing_subscriber::EnvFilter;

const BLOCK: u32 = 128;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("revkv=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

struct Written {
    key_records: Vec<RecordPtr>,
    values: Vec<RecordPtr>,
    rev_node: RecordPtr,
    root: RecordPtr,
    tail: RecordPtr,
}

/// Lays out a two-key store: "alpha" with two revisions, "beta" with one.
fn write_store(file: &BlockFile, opts: &FormatOptions) -> Result<Written> {
    let placeholder = FileHeader::from_options(opts, RecordPtr::NULL);
    file.append(&encode_header(&placeholder))?;

    let value = |plain: &[u8], revision| {
        ValueRecord::compressed(
            flags::LIVE,
            plain,
            revision,
            opts.compression,
            opts.lzw_code_bits,
        )
    };
    let alpha_v1 = file.append(&encode_value_record(&value(b"first value of alpha", 1)?))?;
    let alpha_v2 = file.append(&encode_value_record(&value(
        b"second value of alpha, second value of alpha",
        2,
    )?))?;
    let beta_v1 = file.append(&encode_value_record(&value(b"beta", 1)?))?;

    let rev_node = ValueRevNode::new(true, vec![1, 2], vec![alpha_v1, alpha_v2])?;
    let rev_node = file.append(&encode_value_rev_node(&rev_node))?;

    let alpha = KeyRecord {
        flag: flags::LIVE,
        key: b"alpha".to_vec(),
        rev_root: rev_node,
        revision: 2,
        latest_value: alpha_v2,
    };
    let beta = KeyRecord {
        flag: flags::LIVE,
        key: b"beta".to_vec(),
        rev_root: RecordPtr::NULL,
        revision: 1,
        latest_value: beta_v1,
    };
    let alpha_ptr = file.append(&encode_key_record(&alpha))?;
    let beta_ptr = file.append(&encode_key_record(&beta))?;

    let root = KeyNode::new(
        true,
        vec![b"alpha".to_vec(), b"beta".to_vec()],
        vec![alpha_ptr, beta_ptr],
    )?;
    let root = file.append(&encode_key_node(&root))?;

    let tail = FileTail {
        revision: 2,
        root_node: root,
        avg_key_len: 4,
        avg_value_len: 22,
        entry_count: 2,
    };
    let tail_ptr = file.append(&encode_tail(&tail))?;
    file.write_at(0, &encode_header(&placeholder.with_tail(tail_ptr)))?;
    file.sync()?;

    Ok(Written {
        key_records: vec![alpha_ptr, beta_ptr],
        values: vec![alpha_v1, alpha_v2, beta_v1],
        rev_node,
        root,
        tail: tail_ptr,
    })
}

/// Physical offset of a logical payload offset.
fn physical(logical: u64) -> u64 {
    let payload = u64::from(BLOCK) - BLOCK_CRC_LEN as u64;
    (logical / payload) * u64::from(BLOCK) + logical % payload
}

fn flip_byte(path: &Path, offset: u64) {
    let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.read_exact(&mut byte).unwrap();
    byte[0] ^= 0x5A;
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&byte).unwrap();
}

#[test]
fn store_survives_reopen_and_walks_from_header() -> Result<()> {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("plain.revkv");
    let opts = FormatOptions::default().block_size(BLOCK).key_tree_min(4);
    let written = {
        let file = BlockFile::open_path(&path, BLOCK)?;
        write_store(&file, &opts)?
    };

    let reader = DropReader::new(BlockFile::open_path(&path, BLOCK)?);
    let header = reader.read_header()?;
    assert_eq!(header.tail, written.tail);
    assert_eq!(header.key_tree_min, 4);
    assert_eq!(header.block_size, BLOCK);
    assert_eq!(header.codec()?, CompressionCodec::None);

    let tail = reader.read_tail(header.tail)?;
    assert_eq!(tail.root_node, written.root);
    assert_eq!(tail.entry_count, 2);

    let root = reader.read_key_node(tail.root_node)?;
    assert!(root.is_leaf());
    assert_eq!(root.keys(), &[b"alpha".to_vec(), b"beta".to_vec()]);
    assert_eq!(root.children(), written.key_records.as_slice());

    let alpha = reader.read_key_record(root.children()[0])?;
    assert_eq!(alpha.key, b"alpha");
    assert_eq!(alpha.revision, 2);
    assert_eq!(alpha.rev_root, written.rev_node);

    let revisions = reader.read_value_rev_node(alpha.rev_root)?;
    assert_eq!(revisions.revisions(), &[1, 2]);
    assert_eq!(revisions.children(), &written.values[..2]);

    let first = reader.read_value(revisions.children()[0], header.codec()?)?;
    assert_eq!(first, b"first value of alpha");
    let latest = reader.read_latest_value(&alpha, header.codec()?)?;
    assert_eq!(latest, b"second value of alpha, second value of alpha");

    let beta = reader.read_key_record(root.children()[1])?;
    assert!(beta.rev_root.is_null());
    assert_eq!(reader.read_latest_value(&beta, header.codec()?)?, b"beta");
    Ok(())
}

#[test]
fn compressed_values_decode_through_header_codec() -> Result<()> {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("lzw.revkv");
    let opts = FormatOptions::default()
        .block_size(BLOCK)
        .compression(CompressionCodec::Lzw)
        .lzw_code_bits(9);
    let file = BlockFile::open_path(&path, BLOCK)?;
    let written = write_store(&file, &opts)?;
    let reader = DropReader::new(file);

    let header = reader.read_header()?;
    assert_eq!(header.value_compressed, 1);
    let codec = header.codec()?;
    assert_eq!(codec, CompressionCodec::Lzw);

    let stored = reader.read_value_record(written.values[1])?;
    assert_eq!(stored.value[0], 9, "stream starts with its code width");
    assert_eq!(
        reader.read_value(written.values[1], codec)?,
        b"second value of alpha, second value of alpha"
    );
    assert_eq!(reader.read_value(written.values[2], codec)?, b"beta");
    Ok(())
}

#[test]
fn on_disk_corruption_surfaces_as_checksum() -> Result<()> {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("corrupt.revkv");
    let written = {
        let file = BlockFile::open_path(&path, BLOCK)?;
        write_store(&file, &FormatOptions::default().block_size(BLOCK))?
    };
    // The root node sits past the first block, away from the header.
    assert!(physical(written.root.0) >= u64::from(BLOCK));
    flip_byte(&path, physical(written.root.0 + 6));

    let reader = DropReader::new(BlockFile::open_path(&path, BLOCK)?);
    let header = reader.read_header()?;
    assert_eq!(header.tail, written.tail);
    let err = reader.read_key_node(written.root).unwrap_err();
    assert!(err.is_checksum(), "got {err:?}");

    // Unverified reads skip the trailer check.
    let mut raw = [0u8; 1];
    reader.get_ref().read(&mut raw, written.root.0, false)?;
    assert_eq!(raw[0], 1);
    Ok(())
}

#[test]
fn position_past_end_is_malformed() -> Result<()> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.revkv");
    let file = BlockFile::open_path(&path, BLOCK)?;
    let written = write_store(&file, &FormatOptions::default().block_size(BLOCK))?;
    let reader = DropReader::new(file);
    let end = reader.get_ref().len()?;
    assert!(reader.read_tail(RecordPtr(end)).unwrap_err().is_malformed());
    assert!(reader
        .read_key_record(RecordPtr(end - 2))
        .unwrap_err()
        .is_malformed());
    assert!(reader.read_tail(written.tail).is_ok());
    Ok(())
}
