//! Per-function decompilation state.

use std::collections::HashSet;

use unravel_core::{InstructionClassifier, InstructionStream};

use super::stack_slots::StackSlotTable;

/// Addresses of instructions consumed as the test of a conditional.
///
/// Renderers must not print a marked instruction as a standalone statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FusionMarks {
    addresses: HashSet<u64>,
}

impl FusionMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an address. Returns false if it was already marked.
    pub fn mark(&mut self, address: u64) -> bool {
        self.addresses.insert(address)
    }

    pub fn contains(&self, address: u64) -> bool {
        self.addresses.contains(&address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Returns the marked addresses in ascending order.
    pub fn sorted(&self) -> Vec<u64> {
        let mut addresses: Vec<u64> = self.addresses.iter().copied().collect();
        addresses.sort_unstable();
        addresses
    }
}

/// Everything the recovery passes read and write for one function.
///
/// A context is created per function and dropped once the function has been
/// rendered; slot ids and fusion marks never leak between functions.
pub struct FunctionContext<'a> {
    /// The function's instructions.
    pub stream: &'a InstructionStream,
    /// Architecture oracle.
    pub classifier: &'a dyn InstructionClassifier,
    /// Instructions fused into conditionals.
    pub fused: FusionMarks,
    /// Discovered stack slots.
    pub slots: StackSlotTable,
}

impl<'a> FunctionContext<'a> {
    /// Creates a fresh context with default slot naming.
    pub fn new(stream: &'a InstructionStream, classifier: &'a dyn InstructionClassifier) -> Self {
        Self::with_slot_table(stream, classifier, StackSlotTable::new())
    }

    /// Creates a fresh context around a pre-configured (empty) slot table.
    pub fn with_slot_table(
        stream: &'a InstructionStream,
        classifier: &'a dyn InstructionClassifier,
        slots: StackSlotTable,
    ) -> Self {
        Self {
            stream,
            classifier,
            fused: FusionMarks::new(),
            slots,
        }
    }
}

impl std::fmt::Debug for FunctionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionContext")
            .field("instructions", &self.stream.len())
            .field("arch", &self.classifier.architecture())
            .field("fused", &self.fused)
            .field("slots", &self.slots)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_are_set_like() {
        let mut marks = FusionMarks::new();
        assert!(marks.mark(0x1010));
        assert!(!marks.mark(0x1010));
        assert!(marks.mark(0x1004));
        assert_eq!(marks.len(), 2);
        assert!(marks.contains(0x1004));
        assert_eq!(marks.sorted(), vec![0x1004, 0x1010]);
    }
}
