use tracing::trace;

use super::dict::{Dict, SymbolTable};

/// Growth state of a [`LimitedDict`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DictState {
    /// Below capacity; `add` still inserts.
    Growing,
    /// At capacity; `add` is a no-op for the rest of this instance's life.
    Full,
}

/// Caps the number of symbols a [`SymbolTable`] may hold.
///
/// Only insertion is intercepted. Once the wrapped table reaches `max`
/// symbols, further adds are dropped silently; nothing is evicted. Lookups
/// pass straight through.
#[derive(Clone, Debug)]
pub struct LimitedDict<D: SymbolTable = Dict> {
    inner: D,
    max: usize,
}

impl LimitedDict<Dict> {
    /// A seeded [`Dict`] capped at `max` symbols.
    ///
    /// The cap never drops below [`SEED_SYMBOLS`](crate::compression::SEED_SYMBOLS).
    pub fn new(max: usize) -> Self {
        Self::wrap(Dict::new(), max)
    }
}

impl<D: SymbolTable> LimitedDict<D> {
    /// Caps an existing table. A `max` below the table's current size is
    /// raised to that size.
    pub fn wrap(inner: D, max: usize) -> Self {
        let max = max.max(inner.len());
        Self { inner, max }
    }

    /// Configured capacity.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Current growth state.
    pub fn state(&self) -> DictState {
        if self.inner.len() < self.max {
            DictState::Growing
        } else {
            DictState::Full
        }
    }

    /// Returns true once the cap has been reached.
    pub fn is_full(&self) -> bool {
        self.state() == DictState::Full
    }

    /// Unwraps the underlying table.
    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: SymbolTable> SymbolTable for LimitedDict<D> {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn add(&mut self, entry: Vec<u8>) {
        if self.inner.len() < self.max {
            self.inner.add(entry);
            if self.inner.len() == self.max {
                trace!(max = self.max, "revkv.lzw.dict_full");
            }
        }
    }

    fn code_of(&self, entry: &[u8]) -> Option<u32> {
        self.inner.code_of(entry)
    }

    fn entry(&self, code: u32) -> Option<&[u8]> {
        self.inner.entry(code)
    }
}
