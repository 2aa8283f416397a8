#![forbid(unsafe_code)]
//! Big-endian field encoders and a bounds-checked slice cursor.

pub mod be {
    //! Fixed-width big-endian writers. Every integer in a revkv file uses this
    //! byte order.

    use core::convert::TryInto;

    /// Size of a `u32` field.
    pub const U32_LEN: usize = core::mem::size_of::<u32>();
    /// Size of a `u64` field.
    pub const U64_LEN: usize = core::mem::size_of::<u64>();

    /// Appends a big-endian `u32`.
    #[inline]
    pub fn put_u32(dst: &mut Vec<u8>, v: u32) {
        dst.extend_from_slice(&v.to_be_bytes());
    }

    /// Appends a big-endian `u64`.
    #[inline]
    pub fn put_u64(dst: &mut Vec<u8>, v: u64) {
        dst.extend_from_slice(&v.to_be_bytes());
    }

    /// Appends a `u32` length prefix followed by `bytes`.
    pub fn put_len_prefixed(dst: &mut Vec<u8>, bytes: &[u8]) {
        assert!(
            bytes.len() <= u32::MAX as usize,
            "byte string too long (>{} bytes)",
            u32::MAX
        );
        put_u32(dst, bytes.len() as u32);
        dst.extend_from_slice(bytes);
    }

    /// Decodes a `u32` from the first four bytes of `src`.
    pub fn get_u32(src: &[u8]) -> u32 {
        let head = src
            .get(..U32_LEN)
            .unwrap_or_else(|| panic!("u32 source shorter than 4 bytes (have {})", src.len()));
        u32::from_be_bytes(head.try_into().unwrap())
    }

    /// Decodes a `u64` from the first eight bytes of `src`.
    pub fn get_u64(src: &[u8]) -> u64 {
        let head = src
            .get(..U64_LEN)
            .unwrap_or_else(|| panic!("u64 source shorter than 8 bytes (have {})", src.len()));
        u64::from_be_bytes(head.try_into().unwrap())
    }
}

pub mod buf {
    //! A slice-backed cursor whose reads fail with
    //! [`RevkvError::Malformed`](crate::types::RevkvError::Malformed) instead of
    //! panicking when the slice runs out.

    use core::fmt;

    use super::be;
    use crate::types::{Result, RevkvError};

    /// A cursor for reading bytes from a slice with offset tracking.
    pub struct Cursor<'a> {
        /// The underlying byte slice.
        pub buf: &'a [u8],
        /// Current read offset.
        pub off: usize,
    }

    impl<'a> Cursor<'a> {
        /// Creates a new cursor starting at offset 0.
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf, off: 0 }
        }

        /// Takes the next `n` bytes, advancing the offset.
        pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
            let end = self
                .off
                .checked_add(n)
                .ok_or(RevkvError::Malformed("field length overflows"))?;
            if end > self.buf.len() {
                return Err(RevkvError::Malformed("field runs past end of record"));
            }
            let slice = &self.buf[self.off..end];
            self.off = end;
            Ok(slice)
        }

        /// Reads a single byte.
        pub fn read_u8(&mut self) -> Result<u8> {
            Ok(self.take(1)?[0])
        }

        /// Reads a big-endian `u32`.
        pub fn read_u32(&mut self) -> Result<u32> {
            self.take(be::U32_LEN).map(be::get_u32)
        }

        /// Reads a big-endian `u64`.
        pub fn read_u64(&mut self) -> Result<u64> {
            self.take(be::U64_LEN).map(be::get_u64)
        }

        /// Reads a `u32` length prefix and the bytes it announces.
        pub fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
            let len = self.read_u32()? as usize;
            self.take(len)
        }

        /// Returns the number of bytes remaining in the buffer.
        pub fn remaining(&self) -> usize {
            self.buf.len().saturating_sub(self.off)
        }

        /// Fails unless every byte has been consumed.
        pub fn ensure_consumed(&self) -> Result<()> {
            if self.remaining() != 0 {
                return Err(RevkvError::Malformed("trailing bytes after record"));
            }
            Ok(())
        }
    }

    impl<'a> fmt::Debug for Cursor<'a> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Cursor")
                .field("off", &self.off)
                .field("remaining", &self.remaining())
                .finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{be, buf::Cursor};
    use proptest::prelude::*;

    #[test]
    fn big_endian_layout() {
        let mut out = Vec::new();
        be::put_u32(&mut out, 0x0102_0304);
        be::put_u64(&mut out, 7);
        assert_eq!(out, [1, 2, 3, 4, 0, 0, 0, 0, 0, 0, 0, 7]);
        assert_eq!(be::get_u32(&out), 0x0102_0304);
        assert_eq!(be::get_u64(&out[4..]), 7);
    }

    #[test]
    fn len_prefixed_roundtrip() {
        let mut out = Vec::new();
        be::put_len_prefixed(&mut out, b"bb");
        assert_eq!(out, [0, 0, 0, 2, b'b', b'b']);
        let mut cur = Cursor::new(&out);
        assert_eq!(cur.read_len_prefixed().unwrap(), b"bb");
        cur.ensure_consumed().unwrap();
    }

    #[test]
    fn cursor_take_rejects_overread() {
        let mut cur = Cursor::new(&[1, 2, 3]);
        assert!(cur.take(4).unwrap_err().is_malformed());
        // A failed take leaves the offset untouched.
        assert_eq!(cur.remaining(), 3);
    }

    #[test]
    fn cursor_rejects_oversized_prefix() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, b'x'];
        let mut cur = Cursor::new(&data);
        assert!(cur.read_len_prefixed().unwrap_err().is_malformed());
    }

    #[test]
    fn ensure_consumed_flags_trailing_bytes() {
        let mut cur = Cursor::new(&[9, 9]);
        cur.read_u8().unwrap();
        assert!(cur.ensure_consumed().is_err());
    }

    proptest! {
        #[test]
        fn u64_roundtrip_prop(v in any::<u64>()) {
            let mut out = Vec::new();
            be::put_u64(&mut out, v);
            let mut cur = Cursor::new(&out);
            prop_assert_eq!(cur.read_u64().unwrap(), v);
        }

        #[test]
        fn big_endian_preserves_order_prop(a in any::<u32>(), b in any::<u32>()) {
            let (mut ea, mut eb) = (Vec::new(), Vec::new());
            be::put_u32(&mut ea, a);
            be::put_u32(&mut eb, b);
            prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
        }
    }
}
