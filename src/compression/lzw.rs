//! Fixed-width LZW.
//!
//! Stream layout: `code_bits:u8`, `plain_len:u32` (big-endian), then codes
//! packed MSB-first at `code_bits` bits each, zero padded to a byte boundary.
//! Both sides grow a [`LimitedDict`] capped at `1 << code_bits` symbols, so no
//! code ever needs more than `code_bits` bits.

use tracing::trace;

use super::dict::SymbolTable;
use super::limited::LimitedDict;
use crate::primitives::bytes::{be, buf::Cursor};
use crate::types::{Result, RevkvError};

/// Narrowest supported code width.
pub const MIN_CODE_BITS: u8 = 9;
/// Widest supported code width.
pub const MAX_CODE_BITS: u8 = 16;
/// Code width used when none is configured.
pub const DEFAULT_CODE_BITS: u8 = 12;

const STREAM_HEADER_LEN: usize = 5;

/// Validates a code width.
pub fn check_code_bits(code_bits: u8) -> Result<()> {
    if !(MIN_CODE_BITS..=MAX_CODE_BITS).contains(&code_bits) {
        return Err(RevkvError::Invalid("lzw code width must be 9..=16 bits"));
    }
    Ok(())
}

/// Compresses `input` with `code_bits`-wide codes.
pub fn compress(input: &[u8], code_bits: u8) -> Result<Vec<u8>> {
    check_code_bits(code_bits)?;
    let plain_len = u32::try_from(input.len())
        .map_err(|_| RevkvError::Invalid("lzw input exceeds u32::MAX bytes"))?;
    let mut out = Vec::with_capacity(STREAM_HEADER_LEN + input.len() / 2);
    out.push(code_bits);
    be::put_u32(&mut out, plain_len);

    let mut dict = LimitedDict::new(1usize << code_bits);
    let mut writer = BitWriter::new(out, code_bits);
    let mut phrase: Vec<u8> = Vec::new();
    for &byte in input {
        phrase.push(byte);
        if dict.contains(&phrase) {
            continue;
        }
        let prefix = &phrase[..phrase.len() - 1];
        let code = dict
            .code_of(prefix)
            .ok_or(RevkvError::Malformed("lzw prefix missing from dictionary"))?;
        writer.push(code);
        dict.add(std::mem::replace(&mut phrase, vec![byte]));
    }
    if !phrase.is_empty() {
        let code = dict
            .code_of(&phrase)
            .ok_or(RevkvError::Malformed("lzw prefix missing from dictionary"))?;
        writer.push(code);
    }
    let out = writer.finish();
    trace!(
        plain = input.len(),
        packed = out.len(),
        symbols = dict.len(),
        "revkv.lzw.compress"
    );
    Ok(out)
}

/// Reverses [`compress`]. The code width is read from the stream.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(input);
    let code_bits = cursor.read_u8()?;
    if check_code_bits(code_bits).is_err() {
        return Err(RevkvError::Malformed("lzw stream has invalid code width"));
    }
    let plain_len = cursor.read_u32()? as usize;
    let packed = cursor.take(cursor.remaining())?;
    // plain_len is untrusted until the codes back it up.
    let hint = plain_len.min(packed.len().saturating_mul(16));

    let mut dict = LimitedDict::new(1usize << code_bits);
    let mut reader = BitReader::new(packed, code_bits);
    let mut out = Vec::with_capacity(hint);
    let mut prev: Option<Vec<u8>> = None;
    while out.len() < plain_len {
        let code = reader
            .next_code()
            .ok_or(RevkvError::Malformed("lzw stream ends early"))?;
        let entry = match (dict.entry(code), prev.as_ref()) {
            (Some(known), _) => known.to_vec(),
            // The one code a decoder can see before defining it: prev + prev[0].
            (None, Some(p)) if code as usize == dict.len() => {
                let mut entry = p.clone();
                entry.push(p[0]);
                entry
            }
            _ => return Err(RevkvError::Malformed("lzw code outside dictionary")),
        };
        if let Some(mut phrase) = prev.take() {
            phrase.push(entry[0]);
            dict.add(phrase);
        }
        out.extend_from_slice(&entry);
        prev = Some(entry);
    }
    if out.len() != plain_len {
        return Err(RevkvError::Malformed("lzw output overruns declared length"));
    }
    Ok(out)
}

struct BitWriter {
    out: Vec<u8>,
    width: u8,
    acc: u32,
    bits: u32,
}

impl BitWriter {
    fn new(out: Vec<u8>, width: u8) -> Self {
        Self {
            out,
            width,
            acc: 0,
            bits: 0,
        }
    }

    fn push(&mut self, code: u32) {
        self.acc = (self.acc << self.width) | code;
        self.bits += u32::from(self.width);
        while self.bits >= 8 {
            self.bits -= 8;
            self.out.push((self.acc >> self.bits) as u8);
        }
        self.acc &= (1 << self.bits) - 1;
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.out.push((self.acc << (8 - self.bits)) as u8);
        }
        self.out
    }
}

struct BitReader<'a> {
    src: &'a [u8],
    pos: usize,
    width: u8,
    acc: u32,
    bits: u32,
}

impl<'a> BitReader<'a> {
    fn new(src: &'a [u8], width: u8) -> Self {
        Self {
            src,
            pos: 0,
            width,
            acc: 0,
            bits: 0,
        }
    }

    fn next_code(&mut self) -> Option<u32> {
        while self.bits < u32::from(self.width) {
            let byte = *self.src.get(self.pos)?;
            self.pos += 1;
            self.acc = (self.acc << 8) | u32::from(byte);
            self.bits += 8;
        }
        self.bits -= u32::from(self.width);
        let code = self.acc >> self.bits;
        self.acc &= (1 << self.bits) - 1;
        Some(code)
    }
}
