//! Register representation.

use crate::Architecture;

/// Register class (general purpose, segment, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterClass {
    /// General purpose register (rax, ebp, etc.)
    General,
    /// Segment register (fs, gs, etc.)
    Segment,
    /// Instruction pointer (rip, eip)
    ProgramCounter,
    /// Flags register
    Flags,
    /// Anything else
    Other,
}

/// A machine register.
///
/// Each register is identified by its architecture, class, and a numeric ID.
/// Sub-registers share the ID of their full-width register and differ in
/// `size`, so `eax` and `rax` are distinct values with the same `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Register {
    /// The architecture this register belongs to.
    pub arch: Architecture,
    /// The class of register.
    pub class: RegisterClass,
    /// Architecture-specific register ID.
    pub id: u16,
    /// Size of the register in bits.
    pub size: u16,
}

impl Register {
    /// Creates a new register.
    pub fn new(arch: Architecture, class: RegisterClass, id: u16, size: u16) -> Self {
        Self {
            arch,
            class,
            id,
            size,
        }
    }

    /// Creates an x86 general purpose register of the given width.
    pub fn gpr(arch: Architecture, id: u16, size: u16) -> Self {
        Self::new(arch, RegisterClass::General, id, size)
    }

    /// Creates an x86 segment register.
    pub fn segment(arch: Architecture, id: u16) -> Self {
        Self::new(arch, RegisterClass::Segment, id, 16)
    }

    /// Returns the canonical name for this register.
    pub fn name(&self) -> &'static str {
        x86_reg_name(self.id, self.size)
    }
}

// x86/x86_64 register IDs
pub mod x86 {
    pub const RAX: u16 = 0;
    pub const RCX: u16 = 1;
    pub const RDX: u16 = 2;
    pub const RBX: u16 = 3;
    pub const RSP: u16 = 4;
    pub const RBP: u16 = 5;
    pub const RSI: u16 = 6;
    pub const RDI: u16 = 7;
    pub const R8: u16 = 8;
    pub const R9: u16 = 9;
    pub const R10: u16 = 10;
    pub const R11: u16 = 11;
    pub const R12: u16 = 12;
    pub const R13: u16 = 13;
    pub const R14: u16 = 14;
    pub const R15: u16 = 15;

    pub const RIP: u16 = 16;
    pub const RFLAGS: u16 = 17;

    // Segment registers
    pub const CS: u16 = 32;
    pub const DS: u16 = 33;
    pub const ES: u16 = 34;
    pub const FS: u16 = 35;
    pub const GS: u16 = 36;
    pub const SS: u16 = 37;
}

fn x86_reg_name(id: u16, size: u16) -> &'static str {
    match (id, size) {
        // 64-bit
        (x86::RAX, 64) => "rax",
        (x86::RCX, 64) => "rcx",
        (x86::RDX, 64) => "rdx",
        (x86::RBX, 64) => "rbx",
        (x86::RSP, 64) => "rsp",
        (x86::RBP, 64) => "rbp",
        (x86::RSI, 64) => "rsi",
        (x86::RDI, 64) => "rdi",
        (x86::R8, 64) => "r8",
        (x86::R9, 64) => "r9",
        (x86::R10, 64) => "r10",
        (x86::R11, 64) => "r11",
        (x86::R12, 64) => "r12",
        (x86::R13, 64) => "r13",
        (x86::R14, 64) => "r14",
        (x86::R15, 64) => "r15",
        (x86::RIP, 64) => "rip",
        (x86::RFLAGS, 64) => "rflags",

        // 32-bit
        (x86::RAX, 32) => "eax",
        (x86::RCX, 32) => "ecx",
        (x86::RDX, 32) => "edx",
        (x86::RBX, 32) => "ebx",
        (x86::RSP, 32) => "esp",
        (x86::RBP, 32) => "ebp",
        (x86::RSI, 32) => "esi",
        (x86::RDI, 32) => "edi",
        (x86::R8, 32) => "r8d",
        (x86::R9, 32) => "r9d",
        (x86::R10, 32) => "r10d",
        (x86::R11, 32) => "r11d",
        (x86::R12, 32) => "r12d",
        (x86::R13, 32) => "r13d",
        (x86::R14, 32) => "r14d",
        (x86::R15, 32) => "r15d",
        (x86::RIP, 32) => "eip",

        // 16-bit
        (x86::RAX, 16) => "ax",
        (x86::RCX, 16) => "cx",
        (x86::RDX, 16) => "dx",
        (x86::RBX, 16) => "bx",
        (x86::RSP, 16) => "sp",
        (x86::RBP, 16) => "bp",
        (x86::RSI, 16) => "si",
        (x86::RDI, 16) => "di",

        // 8-bit low
        (x86::RAX, 8) => "al",
        (x86::RCX, 8) => "cl",
        (x86::RDX, 8) => "dl",
        (x86::RBX, 8) => "bl",
        (x86::RSP, 8) => "spl",
        (x86::RBP, 8) => "bpl",
        (x86::RSI, 8) => "sil",
        (x86::RDI, 8) => "dil",

        // Segment registers
        (x86::CS, _) => "cs",
        (x86::DS, _) => "ds",
        (x86::ES, _) => "es",
        (x86::FS, _) => "fs",
        (x86::GS, _) => "gs",
        (x86::SS, _) => "ss",

        _ => "unknown",
    }
}
