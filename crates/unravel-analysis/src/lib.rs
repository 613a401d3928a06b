//! # unravel-analysis
//!
//! Recovery passes for structured pseudo-code.
//!
//! This crate provides:
//! - The structured tree model (sequences, conditionals, loops)
//! - Condition fusion of compares into conditionals
//! - Stack slot recovery from frame-relative accesses
//! - Stack canary slot labeling
//! - Jump target coloring and pseudo-code emission
//! - Parallel decompilation of independent functions

pub mod decompiler;
pub mod parallel;
pub mod stack_canary;

pub use decompiler::{
    AstNode, CanaryConfig, DecompiledFunction, Decompiler, DecompilerConfig, FunctionContext,
    FusionMarks, JumpColors, OptimizationLevel, PseudoCodeEmitter, RecoveryPass, Sequence,
    StackSlot, StackSlotTable,
};
pub use parallel::{decompile_functions_parallel, FunctionInput};
pub use stack_canary::{CanaryGuardDetector, CanaryMatch};
