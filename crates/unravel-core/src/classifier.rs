//! Architecture oracles consulted by the structuring passes.

use crate::register::x86;
use crate::{Architecture, Condition, ControlFlow, Instruction, Operation, Register, RegisterClass};

/// Per-architecture instruction classification.
///
/// The passes never match on register encodings or mnemonics directly; they
/// ask the classifier. This keeps them generic over pointer width and lets a
/// new architecture plug in by implementing this trait.
pub trait InstructionClassifier {
    /// Returns the target architecture.
    fn architecture(&self) -> Architecture;

    /// Returns true if the instruction is an unconditional jump.
    fn is_unconditional_jump(&self, instr: &Instruction) -> bool;

    /// Returns true if the instruction is a call.
    fn is_call(&self, instr: &Instruction) -> bool;

    /// Returns the logical inverse of a branch condition.
    fn invert_condition(&self, condition: Condition) -> Condition {
        condition.inverse()
    }

    /// Returns true if the register is the frame pointer.
    fn is_frame_pointer(&self, reg: &Register) -> bool;

    /// Returns true if the operation produces a value the renderer treats
    /// as an assignment.
    fn is_assignment(&self, operation: Operation) -> bool;
}

/// Classifier for x86 and x86-64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X86Classifier {
    arch: Architecture,
}

impl X86Classifier {
    /// Creates a classifier for the given x86 flavour.
    pub fn new(arch: Architecture) -> Self {
        Self { arch }
    }
}

impl Default for X86Classifier {
    fn default() -> Self {
        Self::new(Architecture::X86_64)
    }
}

impl InstructionClassifier for X86Classifier {
    fn architecture(&self) -> Architecture {
        self.arch
    }

    fn is_unconditional_jump(&self, instr: &Instruction) -> bool {
        matches!(instr.operation, Operation::Jump)
            || matches!(
                instr.control_flow,
                ControlFlow::UnconditionalBranch { .. } | ControlFlow::IndirectBranch
            )
    }

    fn is_call(&self, instr: &Instruction) -> bool {
        matches!(instr.operation, Operation::Call) || instr.is_call()
    }

    fn is_frame_pointer(&self, reg: &Register) -> bool {
        // rbp and ebp both count so 32-bit code shares the 64-bit path.
        reg.class == RegisterClass::General && reg.id == x86::RBP && matches!(reg.size, 32 | 64)
    }

    fn is_assignment(&self, operation: Operation) -> bool {
        matches!(
            operation,
            Operation::Move
                | Operation::Load
                | Operation::Store
                | Operation::LoadEffectiveAddress
                | Operation::Add
                | Operation::Sub
                | Operation::Mul
                | Operation::Div
                | Operation::Neg
                | Operation::Inc
                | Operation::Dec
                | Operation::And
                | Operation::Or
                | Operation::Xor
                | Operation::Not
                | Operation::Shl
                | Operation::Shr
                | Operation::Sar
                | Operation::Rol
                | Operation::Ror
        )
    }
}
