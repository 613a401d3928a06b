//! Architecture-agnostic instruction representation.

use crate::Operand;

/// A decoded machine instruction.
///
/// Instructions are produced by the disassembler and never mutated by the
/// structuring passes.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Virtual address of this instruction.
    pub address: u64,
    /// Size in bytes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub size: usize,
    /// Raw bytes of the instruction.
    #[cfg_attr(feature = "serde", serde(default))]
    pub bytes: Vec<u8>,
    /// High-level operation category.
    pub operation: Operation,
    /// Mnemonic string (e.g., "mov", "cmp", "jg").
    pub mnemonic: String,
    /// Operands (destination first, then sources).
    #[cfg_attr(feature = "serde", serde(default))]
    pub operands: Vec<Operand>,
    /// Control flow information.
    #[cfg_attr(feature = "serde", serde(default))]
    pub control_flow: ControlFlow,
}

impl Instruction {
    /// Creates a new instruction with minimal fields.
    pub fn new(address: u64, size: usize, bytes: Vec<u8>, mnemonic: impl Into<String>) -> Self {
        Self {
            address,
            size,
            bytes,
            operation: Operation::Other(0),
            mnemonic: mnemonic.into(),
            operands: Vec::new(),
            control_flow: ControlFlow::Sequential,
        }
    }

    /// Sets the operation.
    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operation = op;
        self
    }

    /// Adds an operand.
    pub fn with_operand(mut self, op: Operand) -> Self {
        self.operands.push(op);
        self
    }

    /// Sets operands.
    pub fn with_operands(mut self, ops: Vec<Operand>) -> Self {
        self.operands = ops;
        self
    }

    /// Sets the control flow.
    pub fn with_control_flow(mut self, cf: ControlFlow) -> Self {
        self.control_flow = cf;
        self
    }

    /// Returns the end address (address + size).
    pub fn end_address(&self) -> u64 {
        self.address + self.size as u64
    }

    /// Returns true if this instruction is a branch (jump/call).
    pub fn is_branch(&self) -> bool {
        !matches!(self.control_flow, ControlFlow::Sequential)
    }

    /// Returns true if this instruction is a call.
    pub fn is_call(&self) -> bool {
        matches!(
            self.control_flow,
            ControlFlow::Call { .. } | ControlFlow::IndirectCall { .. }
        )
    }

    /// Returns the branch condition if this is a conditional jump.
    pub fn condition(&self) -> Option<Condition> {
        match self.control_flow {
            ControlFlow::ConditionalBranch { condition, .. } => Some(condition),
            _ => None,
        }
    }

    /// Returns the instruction as assembly text, without address or bytes.
    pub fn asm(&self) -> String {
        let operands: Vec<String> = self.operands.iter().map(|op| op.to_string()).collect();
        if operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, operands.join(", "))
        }
    }
}

/// High-level operation categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operation {
    // Data movement
    Move,
    Load,
    Store,
    Push,
    Pop,
    Exchange,
    LoadEffectiveAddress,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Inc,
    Dec,

    // Logical
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Sar,
    Rol,
    Ror,

    // Comparison
    Compare,
    Test,

    // Control flow
    Jump,
    ConditionalJump,
    Call,
    Return,

    // System
    Nop,
    Halt,

    // Other
    Other(u16),
}

impl Operation {
    /// Returns the name of this operation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Load => "load",
            Self::Store => "store",
            Self::Push => "push",
            Self::Pop => "pop",
            Self::Exchange => "exchange",
            Self::LoadEffectiveAddress => "lea",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Neg => "neg",
            Self::Inc => "inc",
            Self::Dec => "dec",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Not => "not",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::Sar => "sar",
            Self::Rol => "rol",
            Self::Ror => "ror",
            Self::Compare => "compare",
            Self::Test => "test",
            Self::Jump => "jump",
            Self::ConditionalJump => "cond_jump",
            Self::Call => "call",
            Self::Return => "return",
            Self::Nop => "nop",
            Self::Halt => "halt",
            Self::Other(_) => "other",
        }
    }

    /// Returns the compound-assignment operator for arithmetic and logical
    /// operations (`+=`, `^=`, ...), or `=` for plain data movement.
    pub fn assign_operator(&self) -> Option<&'static str> {
        match self {
            Self::Move | Self::Load | Self::Store | Self::LoadEffectiveAddress => Some("="),
            Self::Add => Some("+="),
            Self::Sub => Some("-="),
            Self::Mul => Some("*="),
            Self::Div => Some("/="),
            Self::And => Some("&="),
            Self::Or => Some("|="),
            Self::Xor => Some("^="),
            Self::Shl => Some("<<="),
            Self::Shr | Self::Sar => Some(">>="),
            Self::Rol => Some("rol="),
            Self::Ror => Some("ror="),
            _ => None,
        }
    }
}

/// Branch condition for conditional jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Condition {
    // Unsigned comparisons
    Equal,
    NotEqual,
    Above,        // CF=0 and ZF=0
    AboveOrEqual, // CF=0
    Below,        // CF=1
    BelowOrEqual, // CF=1 or ZF=1

    // Signed comparisons
    Greater,        // ZF=0 and SF=OF
    GreaterOrEqual, // SF=OF
    Less,           // SF!=OF
    LessOrEqual,    // ZF=1 or SF!=OF

    // Flag-based
    Sign,
    NotSign,
    Overflow,
    NotOverflow,
    Parity,
    NotParity,
}

impl Condition {
    /// Returns the inverse condition.
    pub fn inverse(&self) -> Self {
        match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::Above => Self::BelowOrEqual,
            Self::AboveOrEqual => Self::Below,
            Self::Below => Self::AboveOrEqual,
            Self::BelowOrEqual => Self::Above,
            Self::Greater => Self::LessOrEqual,
            Self::GreaterOrEqual => Self::Less,
            Self::Less => Self::GreaterOrEqual,
            Self::LessOrEqual => Self::Greater,
            Self::Sign => Self::NotSign,
            Self::NotSign => Self::Sign,
            Self::Overflow => Self::NotOverflow,
            Self::NotOverflow => Self::Overflow,
            Self::Parity => Self::NotParity,
            Self::NotParity => Self::Parity,
        }
    }

    /// Returns the operator used when rendering this condition.
    ///
    /// Unsigned and signed variants share an operator; flag-only conditions
    /// render as a named predicate.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Above | Self::Greater => ">",
            Self::AboveOrEqual | Self::GreaterOrEqual => ">=",
            Self::Below | Self::Less => "<",
            Self::BelowOrEqual | Self::LessOrEqual => "<=",
            Self::Sign => "sign",
            Self::NotSign => "!sign",
            Self::Overflow => "overflow",
            Self::NotOverflow => "!overflow",
            Self::Parity => "parity",
            Self::NotParity => "!parity",
        }
    }

    /// Returns true if the condition compares two values rather than
    /// testing a single flag.
    pub fn is_relational(&self) -> bool {
        !matches!(
            self,
            Self::Sign
                | Self::NotSign
                | Self::Overflow
                | Self::NotOverflow
                | Self::Parity
                | Self::NotParity
        )
    }

    /// Returns the x86 mnemonic suffix for this condition.
    pub fn x86_suffix(&self) -> &'static str {
        match self {
            Self::Equal => "e",
            Self::NotEqual => "ne",
            Self::Above => "a",
            Self::AboveOrEqual => "ae",
            Self::Below => "b",
            Self::BelowOrEqual => "be",
            Self::Greater => "g",
            Self::GreaterOrEqual => "ge",
            Self::Less => "l",
            Self::LessOrEqual => "le",
            Self::Sign => "s",
            Self::NotSign => "ns",
            Self::Overflow => "o",
            Self::NotOverflow => "no",
            Self::Parity => "p",
            Self::NotParity => "np",
        }
    }
}

/// Control flow classification.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlFlow {
    /// Sequential - falls through to next instruction.
    #[default]
    Sequential,

    /// Unconditional branch to a known address.
    UnconditionalBranch { target: u64 },

    /// Conditional branch - may fall through or jump.
    ConditionalBranch {
        target: u64,
        condition: Condition,
        fallthrough: u64,
    },

    /// Indirect jump (target in register or memory).
    IndirectBranch,

    /// Function call to known address.
    Call { target: u64, return_addr: u64 },

    /// Indirect call.
    IndirectCall { return_addr: u64 },

    /// Return from function.
    Return,

    /// Halts execution (trap, undefined, etc.).
    Halt,
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}:  ", self.address)?;

        for byte in &self.bytes {
            write!(f, "{:02x} ", byte)?;
        }

        // Pad to align mnemonic
        for _ in self.bytes.len()..8 {
            write!(f, "   ")?;
        }

        write!(f, " {}", self.asm())
    }
}
