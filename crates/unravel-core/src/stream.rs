//! Per-function instruction stream.

use std::ops::Range;

use indexmap::map::Slice;
use indexmap::IndexMap;

use crate::{Error, Instruction};

/// Handle to an instruction inside an [`InstructionStream`].
///
/// AST leaves and comparison back-references store handles instead of
/// instruction copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct InstrId(pub usize);

impl InstrId {
    /// Returns the position of this instruction in the stream.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for InstrId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// The instructions of one function in program order.
///
/// Keyed by address; an [`InstrId`] is the position in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InstructionStream {
    instructions: IndexMap<u64, Instruction>,
}

impl InstructionStream {
    /// Builds a stream from instructions in strictly increasing address
    /// order.
    ///
    /// Input is never reordered, so handles computed by the caller against
    /// the same list stay valid.
    pub fn new(instructions: Vec<Instruction>) -> Result<Self, Error> {
        let mut map: IndexMap<u64, Instruction> = IndexMap::with_capacity(instructions.len());
        for instr in instructions {
            if let Some((&previous, _)) = map.last() {
                if instr.address == previous {
                    return Err(Error::DuplicateAddress(instr.address));
                }
                if instr.address < previous {
                    return Err(Error::UnorderedAddress {
                        previous,
                        address: instr.address,
                    });
                }
            }
            map.insert(instr.address, instr);
        }

        Ok(Self { instructions: map })
    }

    /// Returns the number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the stream has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction behind a handle.
    pub fn get(&self, id: InstrId) -> Option<&Instruction> {
        self.instructions.get_index(id.0).map(|(_, instr)| instr)
    }

    /// Returns the instructions covered by a block range, keyed by address.
    pub fn slice(&self, range: Range<usize>) -> Option<&Slice<u64, Instruction>> {
        self.instructions.get_range(range)
    }

    /// Returns the handle of the instruction at an address.
    pub fn position_of(&self, address: u64) -> Option<InstrId> {
        self.instructions.get_index_of(&address).map(InstrId)
    }

    /// Returns the instruction at an address.
    pub fn at_address(&self, address: u64) -> Option<&Instruction> {
        self.instructions.get(&address)
    }

    /// Iterates over instruction handles in program order.
    pub fn code_idx(&self) -> impl Iterator<Item = InstrId> + '_ {
        (0..self.instructions.len()).map(InstrId)
    }

    /// Iterates over instructions in program order.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.values()
    }
}

impl std::ops::Index<InstrId> for InstructionStream {
    type Output = Instruction;

    fn index(&self, id: InstrId) -> &Instruction {
        &self.instructions[id.0]
    }
}
