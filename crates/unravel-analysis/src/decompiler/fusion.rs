//! Condition fusion.
//!
//! Attaches the instruction that computes a condition to the conditional
//! node that branches on it, so the condition renders as `if (a - b) > 0`
//! instead of a standalone `cmp` followed by a bare `if >`.

use tracing::trace;
use unravel_core::{Instruction, InstructionClassifier, Operand, Operation};

use super::ast::{AstNode, Sequence, SequenceItem};
use super::context::FunctionContext;

/// Returns true if `instr` can serve as the test of the conditional that
/// follows it.
///
/// Assignment-class operations and compares qualify, as does the
/// `test reg, reg` zero-check idiom. The self-test must name the exact same
/// register twice; differently sized aliases of one register do not count.
pub fn is_fusable(instr: &Instruction, classifier: &dyn InstructionClassifier) -> bool {
    instr.operation == Operation::Compare
        || classifier.is_assignment(instr.operation)
        || is_self_test(instr)
}

/// Returns true for `test r, r`.
pub fn is_self_test(instr: &Instruction) -> bool {
    instr.operation == Operation::Test
        && matches!(
            instr.operands.as_slice(),
            [Operand::Register(a), Operand::Register(b)] if a == b
        )
}

/// Runs condition fusion over `ast`.
///
/// Returns the number of instructions newly added to the fusion marks.
/// Running the pass again on the same tree attaches the same comparisons and
/// marks nothing new.
pub fn fuse_conditions(ast: &mut Sequence, ctx: &mut FunctionContext<'_>) -> usize {
    let before = ctx.fused.len();
    fuse_sequence(ast, ctx);
    ctx.fused.len() - before
}

fn fuse_sequence(seq: &mut Sequence, ctx: &mut FunctionContext<'_>) {
    for i in 0..seq.items.len() {
        let candidate = match &seq.items[i] {
            SequenceItem::Block(block) => block.last().filter(|&id| {
                ctx.stream
                    .get(id)
                    .is_some_and(|instr| is_fusable(instr, ctx.classifier))
            }),
            SequenceItem::Node(_) => None,
        };

        if let SequenceItem::Node(node) = &mut seq.items[i] {
            fuse_node(node, ctx);
            continue;
        }

        let Some(cmp) = candidate else {
            continue;
        };
        let Some(SequenceItem::Node(next)) = seq.items.get_mut(i + 1) else {
            continue;
        };
        let Some(slot) = next.comparison_mut() else {
            continue;
        };
        *slot = Some(cmp);

        let address = ctx.stream[cmp].address;
        if ctx.fused.mark(address) {
            trace!("fused comparison at {:#x}", address);
        }
    }
}

fn fuse_node(node: &mut AstNode, ctx: &mut FunctionContext<'_>) {
    match node {
        AstNode::Sequence(seq) => fuse_sequence(seq, ctx),
        AstNode::IfElse(if_else) => {
            fuse_sequence(&mut if_else.then_branch, ctx);
            fuse_sequence(&mut if_else.else_branch, ctx);
        }
        AstNode::Loop(lp) => {
            fuse_sequence(&mut lp.body, ctx);
            if let Some(epilog) = lp.epilog.as_deref_mut() {
                fuse_node(epilog, ctx);
            }
        }
        AstNode::IfGoto(_) | AstNode::AndIf(_) | AstNode::Jump(_) | AstNode::Comment(_) => {}
    }
}
