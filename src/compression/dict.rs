use rustc_hash::FxHashMap;

/// Number of single-byte symbols every LZW dictionary starts with.
pub const SEED_SYMBOLS: usize = 256;

/// Code-addressed table of byte-string symbols.
pub trait SymbolTable {
    /// Number of symbols currently held.
    fn len(&self) -> usize;

    /// Returns true when the table holds no symbols.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts `entry` under the next free code.
    fn add(&mut self, entry: Vec<u8>);

    /// Code assigned to `entry`, if present.
    fn code_of(&self, entry: &[u8]) -> Option<u32>;

    /// Symbol stored under `code`, if assigned.
    fn entry(&self, code: u32) -> Option<&[u8]>;

    /// Returns true if `entry` has a code.
    fn contains(&self, entry: &[u8]) -> bool {
        self.code_of(entry).is_some()
    }
}

/// Unbounded symbol table.
///
/// Codes are dense and assigned in insertion order. Adding a symbol that is
/// already present is a no-op, so a code always maps back to one symbol.
#[derive(Clone, Debug, Default)]
pub struct Dict {
    entries: Vec<Vec<u8>>,
    index: FxHashMap<Vec<u8>, u32>,
}

impl Dict {
    /// Creates a table seeded with the 256 single-byte symbols (code == byte).
    pub fn new() -> Self {
        let mut dict = Self::empty();
        for byte in 0..=u8::MAX {
            dict.add(vec![byte]);
        }
        dict
    }

    /// Creates a table with no symbols at all.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl SymbolTable for Dict {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn add(&mut self, entry: Vec<u8>) {
        if self.index.contains_key(entry.as_slice()) {
            return;
        }
        let code = self.entries.len() as u32;
        self.index.insert(entry.clone(), code);
        self.entries.push(entry);
    }

    fn code_of(&self, entry: &[u8]) -> Option<u32> {
        self.index.get(entry).copied()
    }

    fn entry(&self, code: u32) -> Option<&[u8]> {
        self.entries.get(code as usize).map(Vec::as_slice)
    }
}
