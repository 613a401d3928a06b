//! Stack canary (stack protector) slot labeling.
//!
//! Stack canaries are security features that detect buffer overflows:
//! - A random value is placed between local variables and the return address
//! - The value is checked before function return
//! - If modified (indicating stack corruption), `__stack_chk_fail` is called
//!
//! By the time this pass runs, stack slot recovery has already named every
//! frame-relative local. The pass finds the slot holding the canary and
//! renames it, e.g. `var3` becomes `var3_canary`.
//!
//! # Pattern
//!
//! ```text
//! mov rax, fs:0x28           ; Load canary from TLS
//! mov [rbp-8], rax           ; Store on stack
//! ...
//! mov [rbp-8], rax           ; Store near the check
//! ...
//! call __stack_chk_fail@plt
//! ```
//!
//! The scan is linear over the instruction stream in address order. Only the
//! first call to the guard routine is examined; the instructions just before
//! it are searched for a move into a known slot.

use tracing::debug;
use unravel_core::{ControlFlow, Instruction, Operation, SymbolMap};

use crate::decompiler::{CanaryConfig, FunctionContext};

/// A relabeled canary slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanaryMatch {
    /// Address of the call to the guard routine.
    pub call_addr: u64,
    /// Address of the move that touched the slot.
    pub store_addr: u64,
    /// Frame displacement of the slot.
    pub displacement: i64,
    /// The slot's name after relabeling.
    pub slot_name: String,
}

/// Finds and relabels the canary slot of a function.
#[derive(Debug, Clone)]
pub struct CanaryGuardDetector {
    guard_addr: Option<u64>,
    config: CanaryConfig,
}

impl CanaryGuardDetector {
    /// Creates a detector resolving the guard routine through `symbols`.
    pub fn new(symbols: &SymbolMap, config: CanaryConfig) -> Self {
        Self {
            guard_addr: symbols.get(&config.guard_symbol),
            config,
        }
    }

    /// Returns the resolved guard routine address.
    pub fn guard_addr(&self) -> Option<u64> {
        self.guard_addr
    }

    /// Runs the pass, renaming at most one slot in `ctx.slots`.
    pub fn recover(&self, ctx: &mut FunctionContext<'_>) -> Option<CanaryMatch> {
        let Some(guard_addr) = self.guard_addr else {
            debug!(
                "{} not in symbol table, skipping canary recovery",
                self.config.guard_symbol
            );
            return None;
        };

        let stream = ctx.stream;
        let (call_pos, call) = stream
            .iter()
            .enumerate()
            .find(|(_, instr)| {
                ctx.classifier.is_call(instr) && call_target(instr) == Some(guard_addr)
            })?;

        let window_start = call_pos.saturating_sub(self.config.scan_window);
        let window = stream.slice(window_start..call_pos).unwrap_or_default();
        for candidate in window.values().rev() {
            let Some(displacement) = self.canary_displacement(candidate, ctx) else {
                continue;
            };

            ctx.slots.append_suffix(displacement, &self.config.suffix);
            let slot_name = ctx.slots.name_of(displacement)?.to_string();
            debug!(
                "canary slot {} at frame offset {} (store {:#x}, check {:#x})",
                slot_name, displacement, candidate.address, call.address
            );
            return Some(CanaryMatch {
                call_addr: call.address,
                store_addr: candidate.address,
                displacement,
                slot_name,
            });
        }

        debug!(
            "no canary slot within {} instructions of {:#x}",
            self.config.scan_window, call.address
        );
        None
    }

    fn canary_displacement(&self, instr: &Instruction, ctx: &FunctionContext<'_>) -> Option<i64> {
        if instr.operation != Operation::Move {
            return None;
        }

        let positions: &[usize] = if self.config.match_loads { &[0, 1] } else { &[0] };
        positions.iter().find_map(|&pos| {
            let mem = instr.operands.get(pos)?.frame_relative(ctx.classifier)?;
            ctx.slots.contains(mem.displacement).then_some(mem.displacement)
        })
    }
}

fn call_target(instr: &Instruction) -> Option<u64> {
    instr
        .operands
        .first()
        .and_then(|op| op.direct_target())
        .or(match instr.control_flow {
            ControlFlow::Call { target, .. } => Some(target),
            _ => None,
        })
}
