//! Symbol lookup supplied by the binary loader.

use indexmap::IndexMap;

/// Name-to-address mapping for resolved symbols and PLT stubs.
///
/// Keeps a reverse index holding the lexicographically smallest name at
/// each address.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(from = "IndexMap<String, u64>", into = "IndexMap<String, u64>")
)]
pub struct SymbolMap {
    symbols: IndexMap<String, u64>,
    names: IndexMap<u64, String>,
}

impl SymbolMap {
    /// Creates an empty symbol map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a symbol.
    pub fn insert(&mut self, name: impl Into<String>, address: u64) {
        let name = name.into();
        match self.symbols.insert(name.clone(), address) {
            Some(old) if old == address => return,
            Some(old) if self.names.get(&old) == Some(&name) => self.reindex(old),
            _ => {}
        }

        match self.names.get_mut(&address) {
            Some(current) if *current <= name => {}
            Some(current) => *current = name,
            None => {
                self.names.insert(address, name);
            }
        }
    }

    /// Recomputes the reverse entry for an address after a name moved away.
    fn reindex(&mut self, address: u64) {
        let smallest = self
            .symbols
            .iter()
            .filter(|(_, addr)| **addr == address)
            .map(|(name, _)| name)
            .min()
            .cloned();
        match smallest {
            Some(name) => {
                self.names.insert(address, name);
            }
            None => {
                self.names.shift_remove(&address);
            }
        }
    }

    /// Looks up a symbol by exact name.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    /// Returns true if the symbol is known.
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Returns the name of a symbol at an address, if any.
    ///
    /// With several names at one address the smallest wins.
    pub fn name_at(&self, address: u64) -> Option<&str> {
        self.names.get(&address).map(String::as_str)
    }

    /// Returns the number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for SymbolMap {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, address) in iter {
            map.insert(name, address);
        }
        map
    }
}

impl From<IndexMap<String, u64>> for SymbolMap {
    fn from(symbols: IndexMap<String, u64>) -> Self {
        symbols.into_iter().collect()
    }
}

impl From<SymbolMap> for IndexMap<String, u64> {
    fn from(map: SymbolMap) -> Self {
        map.symbols
    }
}
