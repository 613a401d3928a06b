//! # unravel-core
//!
//! Core abstractions shared by the unravel structuring passes. This crate
//! defines the instruction model handed over by the disassembler (registers,
//! operands, instructions), the per-function instruction stream, the
//! control-flow edge table, the symbol map, and the architecture oracle the
//! passes consult instead of hardcoding register encodings.

pub mod arch;
pub mod classifier;
pub mod edges;
pub mod error;
pub mod instruction;
pub mod operand;
pub mod register;
pub mod stream;
pub mod symbol;

pub use arch::Architecture;
pub use classifier::{InstructionClassifier, X86Classifier};
pub use edges::{EdgeTable, BRANCH_NEXT};
pub use error::Error;
pub use instruction::{Condition, ControlFlow, Instruction, Operation};
pub use operand::{Immediate, MemoryRef, Operand};
pub use register::{Register, RegisterClass};
pub use stream::{InstrId, InstructionStream};
pub use symbol::SymbolMap;
