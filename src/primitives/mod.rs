//! Low-level primitives the record format is built on.
//!
//! Includes byte utilities, positioned file I/O, and the checksummed block
//! layer that every record read goes through.

/// Byte-level utilities and encoding/decoding.
///
/// Big-endian integer helpers and a bounds-checked cursor over record bytes.
pub mod bytes;

/// I/O abstractions and utilities.
///
/// Positioned reads and writes over a file handle.
pub mod io;

/// Checksummed block storage.
pub mod block;
