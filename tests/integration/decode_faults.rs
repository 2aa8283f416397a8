//! Fault injection against the structural decoder.

use proptest::prelude::*;
use revkv::format::codec::{
    encode_header, encode_key_node, encode_key_record, encode_tail, encode_value_record,
    encode_value_rev_node,
};
use revkv::format::{
    flags, DropReader, FileHeader, FileTail, KeyNode, KeyRecord, ValueRecord, ValueRevNode,
};
use revkv::options::FormatOptions;
use revkv::primitives::block::MemBlocks;
use revkv::{RecordPtr, Result};

type Decode = fn(&DropReader<MemBlocks>) -> Result<()>;

fn key_node() -> Vec<u8> {
    let node = KeyNode::new(
        false,
        vec![b"m".to_vec(), b"t".to_vec(), b"zz".to_vec()],
        vec![RecordPtr(10), RecordPtr(20), RecordPtr(30), RecordPtr(40)],
    )
    .unwrap();
    encode_key_node(&node)
}

fn rev_node() -> Vec<u8> {
    let node = ValueRevNode::new(true, vec![4, 9], vec![RecordPtr(70), RecordPtr(80)]).unwrap();
    encode_value_rev_node(&node)
}

fn key_record() -> Vec<u8> {
    encode_key_record(&KeyRecord {
        flag: flags::LIVE,
        key: b"user:42".to_vec(),
        rev_root: RecordPtr(512),
        revision: 3,
        latest_value: RecordPtr(640),
    })
}

fn value_record() -> Vec<u8> {
    encode_value_record(&ValueRecord {
        flag: flags::TOMBSTONE,
        value: b"gone".to_vec(),
        revision: 5,
    })
}

fn decode_key_node(reader: &DropReader<MemBlocks>) -> Result<()> {
    reader.read_key_node(RecordPtr(0)).map(drop)
}

fn decode_rev_node(reader: &DropReader<MemBlocks>) -> Result<()> {
    reader.read_value_rev_node(RecordPtr(0)).map(drop)
}

fn decode_key_record(reader: &DropReader<MemBlocks>) -> Result<()> {
    reader.read_key_record(RecordPtr(0)).map(drop)
}

fn decode_value_record(reader: &DropReader<MemBlocks>) -> Result<()> {
    reader.read_value_record(RecordPtr(0)).map(drop)
}

fn cases() -> Vec<(&'static str, Vec<u8>, Decode)> {
    vec![
        ("key node", key_node(), decode_key_node as Decode),
        ("revision node", rev_node(), decode_rev_node as Decode),
        ("key record", key_record(), decode_key_record as Decode),
        ("value record", value_record(), decode_value_record as Decode),
    ]
}

/// Number of reads a clean decode issues.
fn read_count(bytes: &[u8], decode: Decode) -> usize {
    let reader = DropReader::new(MemBlocks::new(bytes.to_vec()));
    decode(&reader).unwrap();
    reader.get_ref().reads()
}

#[test]
fn every_read_propagates_checksum_failure() {
    for (name, bytes, decode) in cases() {
        let total = read_count(&bytes, decode);
        for nth in 0..total {
            let reader = DropReader::new(MemBlocks::new(bytes.clone()).fail_read(nth));
            let err = decode(&reader).unwrap_err();
            assert!(err.is_checksum(), "{name}: read {nth} gave {err:?}");
            assert_eq!(reader.get_ref().reads(), nth + 1, "{name}: kept reading");
        }
    }
}

#[test]
fn fixed_records_propagate_checksum_failure() {
    let header = FileHeader::from_options(&FormatOptions::default(), RecordPtr(22));
    let tail = FileTail {
        revision: 9,
        root_node: RecordPtr(100),
        avg_key_len: 6,
        avg_value_len: 12,
        entry_count: 3,
    };
    let mut image = encode_header(&header);
    image.extend_from_slice(&encode_tail(&tail));

    let clean = DropReader::new(MemBlocks::new(image.clone()));
    assert_eq!(clean.read_header().unwrap(), header);
    assert_eq!(clean.read_tail(RecordPtr(22)).unwrap(), tail);
    assert_eq!(clean.get_ref().reads(), 2);

    let reader = DropReader::new(MemBlocks::new(image.clone()).fail_read(0));
    assert!(reader.read_header().unwrap_err().is_checksum());
    assert_eq!(reader.get_ref().reads(), 1);

    let reader = DropReader::new(MemBlocks::new(image).fail_read(0));
    assert!(reader.read_tail(RecordPtr(22)).unwrap_err().is_checksum());
    assert_eq!(reader.get_ref().reads(), 1);
}

#[test]
fn expected_read_counts() {
    // prefix, (length, key) per key, pointers
    assert_eq!(read_count(&key_node(), decode_key_node), 1 + 2 * 3 + 1);
    // prefix, revisions, pointers
    assert_eq!(read_count(&rev_node(), decode_rev_node), 3);
    // prefix, payload
    assert_eq!(read_count(&key_record(), decode_key_record), 2);
    assert_eq!(read_count(&value_record(), decode_value_record), 2);
}

#[test]
fn every_truncation_is_malformed() {
    for (name, bytes, decode) in cases() {
        for cut in 0..bytes.len() {
            let reader = DropReader::new(MemBlocks::new(bytes.clone()).truncate(cut as u64));
            let err = decode(&reader).unwrap_err();
            assert!(err.is_malformed(), "{name}: cut at {cut} gave {err:?}");
        }
    }
}

#[test]
fn undefined_leaf_byte_is_malformed() {
    let nodes: [(Vec<u8>, Decode); 2] = [
        (key_node(), decode_key_node as Decode),
        (rev_node(), decode_rev_node as Decode),
    ];
    for (bytes, decode) in nodes {
        for flag in [2u8, 0x7F, 0xFF] {
            let mut damaged = bytes.clone();
            damaged[0] = flag;
            let reader = DropReader::new(MemBlocks::new(damaged));
            assert!(decode(&reader).unwrap_err().is_malformed());
        }
    }
}

#[test]
fn leaf_relabelled_internal_runs_out_of_pointers() {
    let mut damaged = rev_node();
    damaged[0] = 0;
    let reader = DropReader::new(MemBlocks::new(damaged));
    assert!(decode_rev_node(&reader).unwrap_err().is_malformed());
}

#[test]
fn record_at_offset_inside_larger_image() {
    let mut image = vec![0xEE; 37];
    image.extend_from_slice(&key_record());
    image.extend_from_slice(&[0xEE; 11]);
    let reader = DropReader::new(MemBlocks::new(image));
    let record = reader.read_key_record(RecordPtr(37)).unwrap();
    assert_eq!(record.key, b"user:42");
    assert_eq!(record.latest_value, RecordPtr(640));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn garbage_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let reader = DropReader::new(MemBlocks::new(bytes));
        for result in [
            reader.read_key_node(RecordPtr(0)).map(drop),
            reader.read_value_rev_node(RecordPtr(0)).map(drop),
            reader.read_key_record(RecordPtr(0)).map(drop),
            reader.read_value_record(RecordPtr(0)).map(drop),
            reader.read_tail(RecordPtr(0)).map(drop),
        ] {
            if let Err(err) = result {
                prop_assert!(err.is_malformed(), "unexpected {:?}", err);
            }
        }
    }
}
