//! Jump target coloring.
//!
//! Every address some jump in the tree lands on gets a color, so a reader can
//! match `goto 0x401020` with the block starting at `0x401020`.

use std::collections::HashMap;

use unravel_core::{EdgeTable, InstructionClassifier, InstructionStream};

use super::ast::{AstNode, Sequence, SequenceItem};

/// ANSI foreground colors handed out in order.
pub const PALETTE: [u8; 12] = [31, 32, 33, 34, 35, 36, 91, 92, 93, 94, 95, 96];

const RESET: &str = "\x1b[0m";

/// Address to color assignment for one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JumpColors {
    colors: HashMap<u64, u8>,
    next: usize,
}

impl JumpColors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next palette color to `address` unless it has one.
    pub fn pick(&mut self, address: u64) -> u8 {
        if let Some(&color) = self.colors.get(&address) {
            return color;
        }
        let color = PALETTE[self.next % PALETTE.len()];
        self.next += 1;
        self.colors.insert(address, color);
        color
    }

    /// Returns the color of `address`.
    pub fn get(&self, address: u64) -> Option<u8> {
        self.colors.get(&address).copied()
    }

    /// Wraps `text` in the color of `address`, or returns it unchanged.
    pub fn paint(&self, address: u64, text: &str) -> String {
        match self.get(address) {
            Some(color) => format!("\x1b[{}m{}{}", color, text, RESET),
            None => text.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Picks a color for every jump target reachable in `ast`.
pub fn assign_colors(
    ast: &Sequence,
    stream: &InstructionStream,
    edges: &EdgeTable,
    classifier: &dyn InstructionClassifier,
) -> JumpColors {
    let mut colors = JumpColors::new();
    let mut walker = ColorWalker {
        stream,
        edges,
        classifier,
        colors: &mut colors,
    };
    walker.sequence(ast);
    colors
}

struct ColorWalker<'a> {
    stream: &'a InstructionStream,
    edges: &'a EdgeTable,
    classifier: &'a dyn InstructionClassifier,
    colors: &'a mut JumpColors,
}

impl ColorWalker<'_> {
    fn sequence(&mut self, seq: &Sequence) {
        for item in &seq.items {
            match item {
                SequenceItem::Block(block) => {
                    let Some(first) = block.first().and_then(|id| self.stream.get(id)) else {
                        continue;
                    };
                    let direct = first
                        .operands
                        .first()
                        .is_some_and(|op| op.direct_target().is_some());
                    if self.classifier.is_unconditional_jump(first) && direct {
                        if let Some(next) = self.edges.next(first.address) {
                            self.colors.pick(next);
                        }
                    }
                }
                SequenceItem::Node(node) => self.node(node),
            }
        }
    }

    fn node(&mut self, node: &AstNode) {
        match node {
            AstNode::Sequence(seq) => self.sequence(seq),
            AstNode::IfGoto(goto) => {
                self.colors.pick(goto.target);
            }
            AstNode::Jump(target) => {
                self.colors.pick(*target);
            }
            AstNode::IfElse(if_else) => {
                self.sequence(&if_else.else_branch);
                self.sequence(&if_else.then_branch);
            }
            AstNode::Loop(lp) => {
                self.sequence(&lp.body);
                if let Some(epilog) = lp.epilog.as_deref() {
                    self.node(epilog);
                }
            }
            AstNode::AndIf(_) | AstNode::Comment(_) => {}
        }
    }
}
