//! Error types for unravel-core.

use thiserror::Error;

/// Core error type.
///
/// These cover malformed collaborator input. The recovery passes themselves
/// treat missing information as a no-op and never return errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Two instructions in one function share an address.
    #[error("duplicate instruction address {0:#x}")]
    DuplicateAddress(u64),

    /// Instructions are not listed in increasing address order.
    #[error("instruction at {address:#x} listed after {previous:#x}")]
    UnorderedAddress { previous: u64, address: u64 },

    /// A handle or block range points past the end of the stream.
    #[error("instruction range {start}..{end} out of bounds for stream of {len}")]
    InstructionOutOfRange {
        start: usize,
        end: usize,
        len: usize,
    },

    /// A raw instruction block covers no instructions.
    #[error("empty instruction block at position {0}")]
    EmptyBlock(usize),
}
