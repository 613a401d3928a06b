//! Instruction operand types.

use crate::{InstructionClassifier, Register};

/// An instruction operand.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Register operand.
    Register(Register),
    /// Immediate value.
    Immediate(Immediate),
    /// Memory reference.
    Memory(MemoryRef),
    /// PC-relative address (used in branches/calls).
    PcRelative {
        /// Offset from PC.
        offset: i64,
        /// Resolved target address.
        target: u64,
    },
}

impl Operand {
    /// Creates a register operand.
    pub fn reg(reg: Register) -> Self {
        Self::Register(reg)
    }

    /// Creates an immediate operand.
    pub fn imm(value: i128, size: u8) -> Self {
        Self::Immediate(Immediate {
            value,
            size,
            signed: true,
        })
    }

    /// Creates an unsigned immediate operand.
    pub fn imm_unsigned(value: u64, size: u8) -> Self {
        Self::Immediate(Immediate {
            value: value as i128,
            size,
            signed: false,
        })
    }

    /// Creates a memory operand.
    pub fn mem(mem: MemoryRef) -> Self {
        Self::Memory(mem)
    }

    /// Creates a PC-relative operand.
    pub fn pc_rel(offset: i64, target: u64) -> Self {
        Self::PcRelative { offset, target }
    }

    /// Returns true if this is a register operand.
    pub fn is_register(&self) -> bool {
        matches!(self, Self::Register(_))
    }

    /// Returns true if this is an immediate operand.
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate(_))
    }

    /// Returns true if this is a memory operand.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory(_))
    }

    /// Returns the register if this is a register operand.
    pub fn as_register(&self) -> Option<&Register> {
        match self {
            Self::Register(reg) => Some(reg),
            _ => None,
        }
    }

    /// Returns the memory reference if this is a memory operand.
    pub fn as_memory(&self) -> Option<&MemoryRef> {
        match self {
            Self::Memory(mem) => Some(mem),
            _ => None,
        }
    }

    /// Returns the target address of a direct branch or call operand.
    ///
    /// Decoders report direct targets either as an immediate or as a resolved
    /// PC-relative operand; both count.
    pub fn direct_target(&self) -> Option<u64> {
        match self {
            Self::Immediate(imm) => Some(imm.as_u64()),
            Self::PcRelative { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Returns the frame memory reference if this operand is frame-relative.
    pub fn frame_relative(&self, classifier: &dyn InstructionClassifier) -> Option<&MemoryRef> {
        self.as_memory()
            .filter(|mem| mem.is_frame_relative(classifier))
    }
}

/// Immediate value operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Immediate {
    /// The value (sign-extended to i128 for uniformity).
    pub value: i128,
    /// Original size in bits.
    pub size: u8,
    /// Whether this is a signed immediate.
    pub signed: bool,
}

impl Immediate {
    /// Returns the value as an unsigned u64.
    pub fn as_u64(&self) -> u64 {
        self.value as u64
    }

    /// Returns the value as a signed i64.
    pub fn as_i64(&self) -> i64 {
        self.value as i64
    }
}

/// Memory reference operand.
///
/// Represents addressing like `seg:[base + index*scale + disp]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryRef {
    /// Base register (if any).
    #[cfg_attr(feature = "serde", serde(default))]
    pub base: Option<Register>,
    /// Index register (if any).
    #[cfg_attr(feature = "serde", serde(default))]
    pub index: Option<Register>,
    /// Scale factor for index (1, 2, 4, or 8).
    #[cfg_attr(feature = "serde", serde(default = "default_scale"))]
    pub scale: u8,
    /// Displacement/offset.
    #[cfg_attr(feature = "serde", serde(default))]
    pub displacement: i64,
    /// Access size in bytes.
    pub size: u8,
    /// Segment override.
    #[cfg_attr(feature = "serde", serde(default))]
    pub segment: Option<Register>,
}

#[cfg(feature = "serde")]
fn default_scale() -> u8 {
    1
}

impl MemoryRef {
    /// Creates a simple memory reference with just a base register.
    pub fn base(reg: Register, size: u8) -> Self {
        Self::base_disp(reg, 0, size)
    }

    /// Creates a memory reference with base and displacement.
    pub fn base_disp(base: Register, displacement: i64, size: u8) -> Self {
        Self {
            base: Some(base),
            index: None,
            scale: 1,
            displacement,
            size,
            segment: None,
        }
    }

    /// Creates a memory reference with just a displacement (absolute address).
    pub fn absolute(address: i64, size: u8) -> Self {
        Self {
            base: None,
            index: None,
            scale: 1,
            displacement: address,
            size,
            segment: None,
        }
    }

    /// Creates a full SIB-style memory reference.
    pub fn sib(
        base: Option<Register>,
        index: Option<Register>,
        scale: u8,
        displacement: i64,
        size: u8,
    ) -> Self {
        Self {
            base,
            index,
            scale,
            displacement,
            size,
            segment: None,
        }
    }

    /// Sets the segment override.
    pub fn with_segment(mut self, segment: Register) -> Self {
        self.segment = Some(segment);
        self
    }

    /// Returns true if this is a frame-relative stack access.
    ///
    /// The base must be the frame pointer, with no index and no segment
    /// override. A zero displacement addresses the saved frame pointer itself
    /// and is not a local.
    pub fn is_frame_relative(&self, classifier: &dyn InstructionClassifier) -> bool {
        self.index.is_none()
            && self.segment.is_none()
            && self.displacement != 0
            && self
                .base
                .as_ref()
                .is_some_and(|base| classifier.is_frame_pointer(base))
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register(reg) => write!(f, "{}", reg.name()),
            Self::Immediate(imm) => {
                if imm.signed && imm.value < 0 {
                    write!(f, "-{:#x}", imm.value.unsigned_abs())
                } else {
                    write!(f, "{:#x}", imm.value)
                }
            }
            Self::Memory(mem) => write!(f, "{}", mem),
            Self::PcRelative { target, .. } => write!(f, "{:#x}", target),
        }
    }
}

impl std::fmt::Display for MemoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref segment) = self.segment {
            write!(f, "{}:", segment.name())?;
        }
        write!(f, "[")?;
        let mut has_content = false;

        if let Some(ref base) = self.base {
            write!(f, "{}", base.name())?;
            has_content = true;
        }

        if let Some(ref index) = self.index {
            if has_content {
                write!(f, " + ")?;
            }
            write!(f, "{}", index.name())?;
            if self.scale > 1 {
                write!(f, "*{}", self.scale)?;
            }
            has_content = true;
        }

        if self.displacement != 0 || !has_content {
            if has_content {
                if self.displacement > 0 {
                    write!(f, " + {:#x}", self.displacement)?;
                } else {
                    write!(f, " - {:#x}", self.displacement.unsigned_abs())?;
                }
            } else {
                write!(f, "{:#x}", self.displacement)?;
            }
        }

        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::x86;
    use crate::{Architecture, X86Classifier};

    fn rbp() -> Register {
        Register::gpr(Architecture::X86_64, x86::RBP, 64)
    }

    #[test]
    fn test_frame_relative_requires_nonzero_displacement() {
        let classifier = X86Classifier::new(Architecture::X86_64);
        assert!(MemoryRef::base_disp(rbp(), -8, 4).is_frame_relative(&classifier));
        assert!(MemoryRef::base_disp(rbp(), 0x10, 8).is_frame_relative(&classifier));
        assert!(!MemoryRef::base(rbp(), 8).is_frame_relative(&classifier));
    }

    #[test]
    fn test_frame_relative_rejects_index_and_segment() {
        let classifier = X86Classifier::new(Architecture::X86_64);
        let rax = Register::gpr(Architecture::X86_64, x86::RAX, 64);
        let fs = Register::segment(Architecture::X86_64, x86::FS);

        let indexed = MemoryRef::sib(Some(rbp()), Some(rax), 4, -0x20, 4);
        assert!(!indexed.is_frame_relative(&classifier));

        let segmented = MemoryRef::base_disp(rbp(), -8, 8).with_segment(fs);
        assert!(!segmented.is_frame_relative(&classifier));
    }

    #[test]
    fn test_frame_relative_rejects_other_bases() {
        let classifier = X86Classifier::new(Architecture::X86_64);
        let rsp = Register::gpr(Architecture::X86_64, x86::RSP, 64);
        assert!(!MemoryRef::base_disp(rsp, 8, 8).is_frame_relative(&classifier));
        assert!(!MemoryRef::absolute(0x601040, 4).is_frame_relative(&classifier));
    }

    #[test]
    fn test_direct_target() {
        assert_eq!(Operand::imm_unsigned(0x400500, 64).direct_target(), Some(0x400500));
        assert_eq!(Operand::pc_rel(0x20, 0x401020).direct_target(), Some(0x401020));
        assert_eq!(Operand::reg(rbp()).direct_target(), None);
    }

    #[test]
    fn test_memory_display() {
        assert_eq!(format!("{}", Operand::mem(MemoryRef::base_disp(rbp(), -8, 4))), "[rbp - 0x8]");
        assert_eq!(format!("{}", Operand::mem(MemoryRef::base(rbp(), 8))), "[rbp]");

        let fs = Register::segment(Architecture::X86_64, x86::FS);
        assert_eq!(
            format!("{}", MemoryRef::absolute(0x28, 8).with_segment(fs)),
            "fs:[0x28]"
        );
    }

    #[test]
    fn test_display_extreme_values() {
        let rsp = Register::gpr(Architecture::X86_64, x86::RSP, 64);
        assert_eq!(
            format!("{}", Operand::mem(MemoryRef::base_disp(rsp, i64::MIN, 8))),
            "[rsp - 0x8000000000000000]"
        );
        assert_eq!(
            format!("{}", Operand::mem(MemoryRef::base_disp(rsp, i64::MAX, 8))),
            "[rsp + 0x7fffffffffffffff]"
        );
        assert_eq!(
            format!("{}", MemoryRef::absolute(-8, 8)),
            "[0xfffffffffffffff8]"
        );
        assert_eq!(
            format!("{}", Operand::imm(i128::MIN, 64)),
            "-0x80000000000000000000000000000000"
        );
    }
}
