//! Consumption-time normalization of two-way conditionals.
//!
//! ```text
//! if cond {            if !cond {
//! } else {      =>         ...
//!     ...              }
//! }
//!
//! if a {               if a {
//!     ...                  ...
//! } else {      =>     }
//!     if b {           else if b {
//!         ...              ...
//!     }                }
//! }
//! ```
//!
//! The tree itself is never rewritten; renderers ask for a [`NormalizedIf`]
//! view each time they visit an [`IfElse`].

use unravel_core::{Condition, InstrId, InstructionClassifier, InstructionStream, Operation};

use super::ast::{AstNode, IfElse, Sequence, SequenceItem};

/// How an [`IfElse`] should be presented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedIf<'a> {
    /// Condition under which `primary` runs.
    pub condition: Condition,
    /// True if the branches were swapped because the then-branch was empty.
    pub swapped: bool,
    /// Branch rendered directly under the `if`.
    pub primary: &'a Sequence,
    /// What follows the primary branch.
    pub else_arm: ElseArm<'a>,
}

/// The alternative of a normalized conditional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElseArm<'a> {
    /// Nothing to render.
    None,
    /// A plain `else { ... }` block.
    Block(&'a Sequence),
    /// The alternative is a single nested conditional, rendered as
    /// `else if`. `leading_comparison` is set when a lone compare
    /// instruction preceded the nested node.
    ElseIf {
        leading_comparison: Option<InstrId>,
        node: &'a IfElse,
    },
}

impl IfElse {
    /// Computes the presentation of this conditional.
    pub fn normalize<'a>(
        &'a self,
        stream: &InstructionStream,
        classifier: &dyn InstructionClassifier,
    ) -> NormalizedIf<'a> {
        let swapped = self.then_branch.is_empty();
        let (primary, alternate) = if swapped {
            (&self.else_branch, &self.then_branch)
        } else {
            (&self.then_branch, &self.else_branch)
        };

        // `condition` is when the jump to the else side is taken, so the
        // primary branch runs on its inverse unless the branches were swapped.
        let condition = if swapped {
            self.condition
        } else {
            classifier.invert_condition(self.condition)
        };

        let else_arm = if alternate.is_empty() {
            ElseArm::None
        } else {
            collapse_else(alternate, stream).unwrap_or(ElseArm::Block(alternate))
        };

        NormalizedIf {
            condition,
            swapped,
            primary,
            else_arm,
        }
    }
}

fn collapse_else<'a>(branch: &'a Sequence, stream: &InstructionStream) -> Option<ElseArm<'a>> {
    match branch.items.as_slice() {
        [SequenceItem::Node(AstNode::IfElse(node))] => Some(ElseArm::ElseIf {
            leading_comparison: None,
            node,
        }),
        [SequenceItem::Block(block), SequenceItem::Node(AstNode::IfElse(node))]
            if block.len() == 1 =>
        {
            let cmp = block.first()?;
            let is_compare = stream
                .get(cmp)
                .is_some_and(|instr| instr.operation == Operation::Compare);
            is_compare.then_some(ElseArm::ElseIf {
                leading_comparison: Some(cmp),
                node,
            })
        }
        _ => None,
    }
}
