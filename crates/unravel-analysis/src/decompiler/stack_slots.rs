//! Stack slot recovery.
//!
//! Names stack-resident locals purely from frame-relative accesses: every
//! distinct `[fp +/- disp]` becomes a slot, numbered in the order the tree
//! walk first meets it. There is no type or liveness analysis here; the slot
//! size is whatever the first access used.

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::debug;
use unravel_core::{InstrId, Instruction, InstructionClassifier};

use super::ast::{AstNode, Sequence, SequenceItem};
use super::context::FunctionContext;

/// Default prefix of synthetic slot names.
pub const DEFAULT_SLOT_PREFIX: &str = "var";

/// A recovered stack-resident local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSlot {
    /// 1-based id in order of first discovery.
    pub id: usize,
    /// Displacement from the frame pointer.
    pub displacement: i64,
    /// Synthetic name, possibly with a suffix such as `_canary`.
    pub name: String,
    /// Access size in bytes of the first access.
    pub size: u8,
}

/// Displacement-keyed slot table for one function.
///
/// Insertion order is discovery order, so iteration yields slots by id.
/// Equality compares the slot set, not the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSlotTable {
    slots: IndexMap<i64, StackSlot>,
    prefix: String,
}

impl Default for StackSlotTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StackSlotTable {
    /// Creates an empty table naming slots `var1`, `var2`, ...
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_SLOT_PREFIX)
    }

    /// Creates an empty table with a custom name prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            slots: IndexMap::new(),
            prefix: prefix.into(),
        }
    }

    /// Returns the prefix of synthetic slot names.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Records an access at `displacement`.
    ///
    /// The first access wins: later accesses at the same displacement never
    /// create a new slot or change its size. Returns the id of a newly
    /// created slot.
    pub fn discover(&mut self, displacement: i64, size: u8) -> Option<usize> {
        let id = self.slots.len() + 1;
        match self.slots.entry(displacement) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                entry.insert(StackSlot {
                    id,
                    displacement,
                    name: format!("{}{}", self.prefix, id),
                    size,
                });
                Some(id)
            }
        }
    }

    /// Returns the slot at `displacement`.
    pub fn get(&self, displacement: i64) -> Option<&StackSlot> {
        self.slots.get(&displacement)
    }

    /// Returns the name of the slot at `displacement`.
    pub fn name_of(&self, displacement: i64) -> Option<&str> {
        self.get(displacement).map(|slot| slot.name.as_str())
    }

    pub fn contains(&self, displacement: i64) -> bool {
        self.slots.contains_key(&displacement)
    }

    /// Appends `suffix` to the name of the slot at `displacement`.
    ///
    /// Returns false if there is no such slot or it already carries the
    /// suffix.
    pub fn append_suffix(&mut self, displacement: i64, suffix: &str) -> bool {
        let Some(slot) = self.slots.get_mut(&displacement) else {
            return false;
        };
        if slot.name.ends_with(suffix) {
            return false;
        }
        slot.name.push_str(suffix);
        true
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates over slots in id order.
    pub fn iter(&self) -> impl Iterator<Item = &StackSlot> {
        self.slots.values()
    }
}

/// Runs stack slot recovery over `ast`, adding to `ctx.slots`.
///
/// Walk order: sequence children in order; for a two-way conditional its
/// attached comparison, then the then-branch, then the else-branch; for a
/// loop its body, then its epilog. Returns the number of new slots.
pub fn recover_stack_slots(ast: &Sequence, ctx: &mut FunctionContext<'_>) -> usize {
    let before = ctx.slots.len();
    visit_sequence(ast, ctx);
    ctx.slots.len() - before
}

fn visit_sequence(seq: &Sequence, ctx: &mut FunctionContext<'_>) {
    for item in &seq.items {
        match item {
            SequenceItem::Block(block) => {
                for id in block.ids() {
                    visit_instruction(id, ctx);
                }
            }
            SequenceItem::Node(node) => visit_node(node, ctx),
        }
    }
}

fn visit_node(node: &AstNode, ctx: &mut FunctionContext<'_>) {
    match node {
        AstNode::Sequence(seq) => visit_sequence(seq, ctx),
        AstNode::IfElse(if_else) => {
            if let Some(cmp) = if_else.comparison {
                visit_instruction(cmp, ctx);
            }
            visit_sequence(&if_else.then_branch, ctx);
            visit_sequence(&if_else.else_branch, ctx);
        }
        AstNode::IfGoto(goto) => {
            if let Some(cmp) = goto.comparison {
                visit_instruction(cmp, ctx);
            }
        }
        AstNode::AndIf(and_if) => {
            if let Some(cmp) = and_if.comparison {
                visit_instruction(cmp, ctx);
            }
        }
        AstNode::Loop(lp) => {
            visit_sequence(&lp.body, ctx);
            if let Some(epilog) = lp.epilog.as_deref() {
                visit_node(epilog, ctx);
            }
        }
        AstNode::Jump(_) | AstNode::Comment(_) => {}
    }
}

fn visit_instruction(id: InstrId, ctx: &mut FunctionContext<'_>) {
    let Some(instr) = ctx.stream.get(id) else {
        return;
    };
    record_frame_accesses(instr, ctx.classifier, &mut ctx.slots);
}

fn record_frame_accesses(
    instr: &Instruction,
    classifier: &dyn InstructionClassifier,
    slots: &mut StackSlotTable,
) {
    for operand in &instr.operands {
        let Some(mem) = operand.frame_relative(classifier) else {
            continue;
        };
        if let Some(id) = slots.discover(mem.displacement, mem.size) {
            debug!(
                "slot {}{} at frame offset {} ({} bytes) from {:#x}",
                slots.prefix(), id, mem.displacement, mem.size, instr.address
            );
        }
    }
}
