//! Structured pseudo-code tree.
//!
//! The structuring stage turns a control flow graph into a tree of
//! [`AstNode`]s. Leaves are ranges over the function's
//! [`InstructionStream`]; conditional nodes refer back to the jump that
//! created them and, once fused, to the instruction that computes their
//! condition. Nothing in the tree copies an instruction.

use std::ops::Range;

use unravel_core::{Condition, Error, InstrId, InstructionStream};

/// A contiguous run of instructions rendered verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstructionBlock {
    /// Position of the first instruction.
    pub start: usize,
    /// Position one past the last instruction.
    pub end: usize,
}

impl InstructionBlock {
    /// Creates a block over `range` of the instruction stream.
    pub fn new(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }

    /// Creates a block holding a single instruction.
    pub fn single(id: InstrId) -> Self {
        Self::new(id.0..id.0 + 1)
    }

    /// Returns the stream range covered by this block.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Returns the number of instructions.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the block covers no instructions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the handle of the first instruction.
    pub fn first(&self) -> Option<InstrId> {
        (!self.is_empty()).then_some(InstrId(self.start))
    }

    /// Returns the handle of the last instruction.
    pub fn last(&self) -> Option<InstrId> {
        (!self.is_empty()).then(|| InstrId(self.end - 1))
    }

    /// Iterates over the handles in this block.
    pub fn ids(&self) -> impl Iterator<Item = InstrId> {
        self.range().map(InstrId)
    }
}

/// One child of a [`Sequence`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SequenceItem {
    /// Raw instructions.
    Block(InstructionBlock),
    /// A structured node.
    Node(AstNode),
}

impl SequenceItem {
    /// Returns the block if this item is raw instructions.
    pub fn as_block(&self) -> Option<&InstructionBlock> {
        match self {
            Self::Block(block) => Some(block),
            Self::Node(_) => None,
        }
    }

    /// Returns the node if this item is structured.
    pub fn as_node(&self) -> Option<&AstNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Block(_) => None,
        }
    }
}

/// An ordered list of blocks and nodes.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Sequence {
    pub items: Vec<SequenceItem>,
}

impl Sequence {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw instructions.
    pub fn add_block(&mut self, block: InstructionBlock) {
        self.items.push(SequenceItem::Block(block));
    }

    /// Appends a node. Appending a sequence splices its children in place
    /// instead of nesting it.
    pub fn add(&mut self, node: AstNode) {
        match node {
            AstNode::Sequence(seq) => self.items.extend(seq.items),
            other => self.items.push(SequenceItem::Node(other)),
        }
    }

    /// Builder form of [`Sequence::add_block`].
    pub fn with_block(mut self, range: Range<usize>) -> Self {
        self.add_block(InstructionBlock::new(range));
        self
    }

    /// Builder form of [`Sequence::add`].
    pub fn with_node(mut self, node: impl Into<AstNode>) -> Self {
        self.add(node.into());
        self
    }

    /// Returns the number of direct children.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no children.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Checks that every instruction handle in the tree lies inside
    /// `stream` and that no raw block is empty.
    pub fn validate(&self, stream: &InstructionStream) -> Result<(), Error> {
        for item in &self.items {
            match item {
                SequenceItem::Block(block) => {
                    if block.is_empty() {
                        return Err(Error::EmptyBlock(block.start));
                    }
                    check_range(block.range(), stream)?;
                }
                SequenceItem::Node(node) => node.validate(stream)?,
            }
        }
        Ok(())
    }
}

fn check_range(range: Range<usize>, stream: &InstructionStream) -> Result<(), Error> {
    if range.end > stream.len() {
        return Err(Error::InstructionOutOfRange {
            start: range.start,
            end: range.end,
            len: stream.len(),
        });
    }
    Ok(())
}

fn check_id(id: Option<InstrId>, stream: &InstructionStream) -> Result<(), Error> {
    match id {
        Some(id) => check_range(id.0..id.0 + 1, stream),
        None => Ok(()),
    }
}

/// `if <cond> goto <target>`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionalGoto {
    /// The conditional jump this node was built from.
    pub jump: InstrId,
    pub condition: Condition,
    /// Jump target address.
    pub target: u64,
    /// Instruction computing the condition, set by condition fusion.
    #[cfg_attr(feature = "serde", serde(default))]
    pub comparison: Option<InstrId>,
}

impl ConditionalGoto {
    pub fn new(jump: InstrId, condition: Condition, target: u64) -> Self {
        Self {
            jump,
            condition,
            target,
            comparison: None,
        }
    }
}

/// `and if <cond>`: continuation of a preceding conditional that guards
/// the same target.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainedAndIf {
    pub jump: InstrId,
    pub condition: Condition,
    #[cfg_attr(feature = "serde", serde(default))]
    pub comparison: Option<InstrId>,
}

impl ChainedAndIf {
    pub fn new(jump: InstrId, condition: Condition) -> Self {
        Self {
            jump,
            condition,
            comparison: None,
        }
    }
}

/// Two-way conditional.
///
/// `jump` guards entry to the else side: `then_branch` runs when the jump
/// is not taken, `else_branch` when it is. See [`IfElse::normalize`] for
/// how the pair is presented.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IfElse {
    pub jump: InstrId,
    /// Condition under which `jump` is taken.
    pub condition: Condition,
    #[cfg_attr(feature = "serde", serde(default))]
    pub then_branch: Sequence,
    #[cfg_attr(feature = "serde", serde(default))]
    pub else_branch: Sequence,
    #[cfg_attr(feature = "serde", serde(default))]
    pub comparison: Option<InstrId>,
}

impl IfElse {
    pub fn new(
        jump: InstrId,
        condition: Condition,
        then_branch: Sequence,
        else_branch: Sequence,
    ) -> Self {
        Self {
            jump,
            condition,
            then_branch,
            else_branch,
            comparison: None,
        }
    }
}

/// Loop with an optional epilog rendered right after the body.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Loop {
    pub body: Sequence,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_infinite: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub epilog: Option<Box<AstNode>>,
}

impl Loop {
    pub fn new(body: Sequence) -> Self {
        Self {
            body,
            is_infinite: false,
            epilog: None,
        }
    }

    pub fn infinite(mut self) -> Self {
        self.is_infinite = true;
        self
    }

    pub fn with_epilog(mut self, epilog: impl Into<AstNode>) -> Self {
        self.epilog = Some(Box::new(epilog.into()));
        self
    }
}

/// A structured pseudo-code node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AstNode {
    Sequence(Sequence),
    IfGoto(ConditionalGoto),
    AndIf(ChainedAndIf),
    IfElse(IfElse),
    /// Unconditional jump to an address.
    Jump(u64),
    Loop(Loop),
    Comment(String),
}

impl AstNode {
    /// Returns the attached comparison slot of a conditional node.
    pub fn comparison_mut(&mut self) -> Option<&mut Option<InstrId>> {
        match self {
            Self::IfGoto(node) => Some(&mut node.comparison),
            Self::AndIf(node) => Some(&mut node.comparison),
            Self::IfElse(node) => Some(&mut node.comparison),
            Self::Sequence(_) | Self::Jump(_) | Self::Loop(_) | Self::Comment(_) => None,
        }
    }

    /// Returns the attached comparison of a conditional node.
    pub fn comparison(&self) -> Option<InstrId> {
        match self {
            Self::IfGoto(node) => node.comparison,
            Self::AndIf(node) => node.comparison,
            Self::IfElse(node) => node.comparison,
            Self::Sequence(_) | Self::Jump(_) | Self::Loop(_) | Self::Comment(_) => None,
        }
    }

    /// Returns true for nodes that branch on a condition.
    pub fn is_conditional(&self) -> bool {
        matches!(self, Self::IfGoto(_) | Self::AndIf(_) | Self::IfElse(_))
    }

    fn validate(&self, stream: &InstructionStream) -> Result<(), Error> {
        match self {
            Self::Sequence(seq) => seq.validate(stream),
            Self::IfGoto(node) => {
                check_id(Some(node.jump), stream)?;
                check_id(node.comparison, stream)
            }
            Self::AndIf(node) => {
                check_id(Some(node.jump), stream)?;
                check_id(node.comparison, stream)
            }
            Self::IfElse(node) => {
                check_id(Some(node.jump), stream)?;
                check_id(node.comparison, stream)?;
                node.then_branch.validate(stream)?;
                node.else_branch.validate(stream)
            }
            Self::Loop(node) => {
                node.body.validate(stream)?;
                match &node.epilog {
                    Some(epilog) => epilog.validate(stream),
                    None => Ok(()),
                }
            }
            Self::Jump(_) | Self::Comment(_) => Ok(()),
        }
    }
}

impl From<Sequence> for AstNode {
    fn from(seq: Sequence) -> Self {
        Self::Sequence(seq)
    }
}

impl From<ConditionalGoto> for AstNode {
    fn from(node: ConditionalGoto) -> Self {
        Self::IfGoto(node)
    }
}

impl From<ChainedAndIf> for AstNode {
    fn from(node: ChainedAndIf) -> Self {
        Self::AndIf(node)
    }
}

impl From<IfElse> for AstNode {
    fn from(node: IfElse) -> Self {
        Self::IfElse(node)
    }
}

impl From<Loop> for AstNode {
    fn from(node: Loop) -> Self {
        Self::Loop(node)
    }
}
