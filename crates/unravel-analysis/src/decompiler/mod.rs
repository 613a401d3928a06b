//! Pseudo-code generator / decompiler.
//!
//! This module decorates an already structured tree and renders it as
//! pseudo-code.
//!
//! The decompilation pipeline, run per function in this fixed order:
//! 1. **Condition Fusion** - Attach compares to the conditionals that consume them
//! 2. **Stack Slot Recovery** - Name frame-relative locals
//! 3. **Canary Guard Recovery** - Label the stack protector slot
//! 4. **Pseudo-code Emission** - Generate readable pseudo-code output
//!
//! Each function gets its own [`FunctionContext`]; fusion marks and slot ids
//! never carry over from one function to the next.

pub mod ast;
pub mod colors;
pub mod config;
mod context;
mod emitter;
pub mod fusion;
mod normalize;
pub mod stack_slots;

pub use ast::{
    AstNode, ChainedAndIf, ConditionalGoto, IfElse, InstructionBlock, Loop, Sequence,
    SequenceItem,
};
pub use colors::{assign_colors, JumpColors};
pub use config::{
    CanaryConfig, DecompilerConfig, OptimizationLevel, RecoveryPass, CANARY_SCAN_WINDOW,
    CANARY_SUFFIX, STACK_CHK_FAIL_PLT,
};
pub use context::{FunctionContext, FusionMarks};
pub use emitter::PseudoCodeEmitter;
pub use fusion::{fuse_conditions, is_fusable, is_self_test};
pub use normalize::{ElseArm, NormalizedIf};
pub use stack_slots::{recover_stack_slots, StackSlot, StackSlotTable};

use tracing::debug;
use unravel_core::{EdgeTable, InstructionClassifier, InstructionStream, SymbolMap};

use crate::parallel::{decompile_functions_parallel, FunctionInput};
use crate::stack_canary::{CanaryGuardDetector, CanaryMatch};

/// Everything the passes produced for one function.
#[derive(Debug, Clone, PartialEq)]
pub struct DecompiledFunction {
    /// The tree with comparisons attached.
    pub ast: Sequence,
    /// Instructions folded into conditions.
    pub fused: FusionMarks,
    /// Recovered stack slots.
    pub slots: StackSlotTable,
    /// The relabeled canary slot, if one was found.
    pub canary: Option<CanaryMatch>,
}

/// The decompiler.
pub struct Decompiler {
    /// Pass selection and output settings.
    pub config: DecompilerConfig,
    classifier: Box<dyn InstructionClassifier + Send + Sync>,
}

impl Decompiler {
    /// Creates a decompiler for the architecture `classifier` describes.
    pub fn new(
        config: DecompilerConfig,
        classifier: impl InstructionClassifier + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            classifier: Box::new(classifier),
        }
    }

    /// Returns the architecture oracle.
    pub fn classifier(&self) -> &dyn InstructionClassifier {
        &*self.classifier
    }

    /// Runs the enabled recovery passes over one function.
    pub fn decompile(
        &self,
        stream: &InstructionStream,
        mut ast: Sequence,
        symbols: &SymbolMap,
    ) -> DecompiledFunction {
        let slots = StackSlotTable::with_prefix(self.config.slot_prefix.as_str());
        let mut ctx = FunctionContext::with_slot_table(stream, self.classifier(), slots);

        if self.config.is_pass_enabled(RecoveryPass::ConditionFusion) {
            let fused = fuse_conditions(&mut ast, &mut ctx);
            debug!("condition fusion attached {} comparisons", fused);
        } else {
            debug!("skipping {}", RecoveryPass::ConditionFusion.name());
        }

        if self.config.is_pass_enabled(RecoveryPass::StackSlots) {
            let found = recover_stack_slots(&ast, &mut ctx);
            debug!("stack slot recovery found {} slots", found);
        } else {
            debug!("skipping {}", RecoveryPass::StackSlots.name());
        }

        let canary = if self.config.is_pass_enabled(RecoveryPass::CanaryGuard) {
            CanaryGuardDetector::new(symbols, self.config.canary.clone()).recover(&mut ctx)
        } else {
            debug!("skipping {}", RecoveryPass::CanaryGuard.name());
            None
        };

        DecompiledFunction {
            ast,
            fused: ctx.fused,
            slots: ctx.slots,
            canary,
        }
    }

    /// Decompiles independent functions in parallel, preserving input order.
    pub fn decompile_many(
        &self,
        functions: &[FunctionInput],
        symbols: &SymbolMap,
    ) -> Vec<DecompiledFunction> {
        decompile_functions_parallel(self, functions, symbols)
    }

    /// Renders a decompiled function as pseudo-code.
    ///
    /// `edges` is only consulted when colors are enabled.
    pub fn render(
        &self,
        name: &str,
        function: &DecompiledFunction,
        stream: &InstructionStream,
        symbols: &SymbolMap,
        edges: &EdgeTable,
    ) -> String {
        let colors = self
            .config
            .colors
            .then(|| assign_colors(&function.ast, stream, edges, self.classifier()));

        let mut emitter =
            PseudoCodeEmitter::new(stream, self.classifier(), &function.fused, &function.slots)
                .with_indent(&self.config.indent)
                .with_comments(self.config.comments)
                .with_symbols(symbols);
        if let Some(colors) = colors.as_ref() {
            emitter = emitter.with_colors(colors);
        }
        emitter.emit_function(name, &function.ast)
    }
}

impl Default for Decompiler {
    fn default() -> Self {
        Self::new(DecompilerConfig::default(), unravel_core::X86Classifier::default())
    }
}

impl std::fmt::Debug for Decompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decompiler")
            .field("config", &self.config)
            .field("arch", &self.classifier.architecture())
            .finish()
    }
}
