//! Instruction-level control-flow edges.

use indexmap::IndexMap;

/// Index of the "next" successor: the taken target of a jump.
pub const BRANCH_NEXT: usize = 0;

/// Successor edges keyed by the address of the branching instruction.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EdgeTable {
    successors: IndexMap<u64, Vec<u64>>,
}

impl EdgeTable {
    /// Creates an empty edge table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a successor for an address.
    pub fn add_edge(&mut self, from: u64, to: u64) {
        self.successors.entry(from).or_default().push(to);
    }

    /// Returns the successors of an address in insertion order.
    pub fn successors(&self, from: u64) -> &[u64] {
        self.successors.get(&from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the "next" successor of an address.
    pub fn next(&self, from: u64) -> Option<u64> {
        self.successors(from).get(BRANCH_NEXT).copied()
    }

    /// Returns the number of addresses with outgoing edges.
    pub fn len(&self) -> usize {
        self.successors.len()
    }

    /// Returns true if no edges were recorded.
    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }
}
