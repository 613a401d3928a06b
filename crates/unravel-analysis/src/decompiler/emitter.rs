//! Pseudo-code emitter.
//!
//! Emits readable pseudo-code from a decorated tree. Fused comparisons are
//! folded into the conditions that consume them and frame accesses print as
//! their recovered slot names.

use std::fmt::Write;

use unravel_core::{
    Condition, InstrId, Instruction, InstructionClassifier, InstructionStream, Operand, Operation,
    SymbolMap,
};

use super::ast::{AstNode, ChainedAndIf, ConditionalGoto, IfElse, Loop, Sequence, SequenceItem};
use super::colors::JumpColors;
use super::context::{FunctionContext, FusionMarks};
use super::fusion::is_self_test;
use super::normalize::ElseArm;
use super::stack_slots::{StackSlot, StackSlotTable};

/// What a fused comparison tests.
enum Tested {
    /// `a` against `b`.
    Pair(String, String),
    /// A single value against zero. `compound` values need parentheses.
    Value { expr: String, compound: bool },
}

/// Renders a decorated tree as indented pseudo-code.
pub struct PseudoCodeEmitter<'a> {
    stream: &'a InstructionStream,
    classifier: &'a dyn InstructionClassifier,
    fused: &'a FusionMarks,
    slots: &'a StackSlotTable,
    colors: Option<&'a JumpColors>,
    symbols: Option<&'a SymbolMap>,
    indent: String,
    comments: bool,
}

impl<'a> PseudoCodeEmitter<'a> {
    /// Creates an emitter over the results of the recovery passes.
    pub fn new(
        stream: &'a InstructionStream,
        classifier: &'a dyn InstructionClassifier,
        fused: &'a FusionMarks,
        slots: &'a StackSlotTable,
    ) -> Self {
        Self {
            stream,
            classifier,
            fused,
            slots,
            colors: None,
            symbols: None,
            indent: "    ".to_string(),
            comments: true,
        }
    }

    /// Creates an emitter reading everything from a function context.
    pub fn for_context(ctx: &'a FunctionContext<'a>) -> Self {
        Self::new(ctx.stream, ctx.classifier, &ctx.fused, &ctx.slots)
    }

    pub fn with_indent(mut self, indent: &str) -> Self {
        self.indent = indent.to_string();
        self
    }

    /// Enables or disables comment nodes and instruction echo comments.
    pub fn with_comments(mut self, comments: bool) -> Self {
        self.comments = comments;
        self
    }

    /// Colors jump targets and the addresses they land on.
    pub fn with_colors(mut self, colors: &'a JumpColors) -> Self {
        self.colors = Some(colors);
        self
    }

    /// Annotates call targets with symbol names.
    pub fn with_symbols(mut self, symbols: &'a SymbolMap) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// Emits the body of a function without any header.
    pub fn emit(&self, ast: &Sequence) -> String {
        let mut output = String::new();
        self.emit_sequence(&mut output, ast, 0);
        output
    }

    /// Emits a function with one declaration line per stack slot.
    pub fn emit_function(&self, name: &str, ast: &Sequence) -> String {
        let mut output = String::new();
        writeln!(output, "function {} {{", name).unwrap();

        if !self.slots.is_empty() {
            for slot in self.slots.iter() {
                writeln!(output, "{}{}", self.indent, self.declaration(slot)).unwrap();
            }
            writeln!(output).unwrap();
        }

        self.emit_sequence(&mut output, ast, 1);
        writeln!(output, "}}").unwrap();
        output
    }

    fn declaration(&self, slot: &StackSlot) -> String {
        let ty = match slot.size {
            1 => "int8_t".to_string(),
            2 => "int16_t".to_string(),
            4 => "int32_t".to_string(),
            8 => "int64_t".to_string(),
            n => format!("uint8_t[{}]", n),
        };
        let fp = if self.classifier.architecture().is_64bit() {
            "rbp"
        } else {
            "ebp"
        };
        let sign = if slot.displacement < 0 { '-' } else { '+' };
        format!(
            "{} {};  // [{} {} {:#x}]",
            ty,
            slot.name,
            fp,
            sign,
            slot.displacement.unsigned_abs()
        )
    }

    fn emit_sequence(&self, output: &mut String, seq: &Sequence, depth: usize) {
        for item in &seq.items {
            match item {
                SequenceItem::Block(block) => {
                    for id in block.ids() {
                        let Some(instr) = self.stream.get(id) else {
                            continue;
                        };
                        if self.fused.contains(instr.address) {
                            continue;
                        }
                        self.line(
                            output,
                            depth,
                            format_args!(
                                "{}: {}",
                                self.address(instr.address),
                                self.statement(instr)
                            ),
                        );
                    }
                }
                SequenceItem::Node(node) => self.emit_node(output, node, depth),
            }
        }
    }

    fn emit_node(&self, output: &mut String, node: &AstNode, depth: usize) {
        match node {
            AstNode::Sequence(seq) => self.emit_sequence(output, seq, depth),
            AstNode::IfGoto(goto) => self.emit_goto(output, goto, depth),
            AstNode::AndIf(and_if) => self.emit_and_if(output, and_if, depth),
            AstNode::IfElse(if_else) => {
                self.emit_if_else(output, if_else, if_else.comparison, depth, false)
            }
            AstNode::Jump(target) => {
                self.line(output, depth, format_args!("jmp {}", self.address(*target)))
            }
            AstNode::Loop(lp) => self.emit_loop(output, lp, depth),
            AstNode::Comment(text) => {
                if self.comments {
                    self.line(output, depth, format_args!("# {}", text));
                }
            }
        }
    }

    fn emit_goto(&self, output: &mut String, goto: &ConditionalGoto, depth: usize) {
        self.echo(output, goto.comparison, goto.jump, depth);
        self.line(
            output,
            depth,
            format_args!(
                "if {}  goto {}",
                self.condition(goto.comparison, goto.condition),
                self.address(goto.target)
            ),
        );
    }

    fn emit_and_if(&self, output: &mut String, and_if: &ChainedAndIf, depth: usize) {
        self.echo(output, and_if.comparison, and_if.jump, depth);
        self.line(
            output,
            depth,
            format_args!(
                "and if {}",
                self.condition(and_if.comparison, and_if.condition)
            ),
        );
    }

    fn emit_if_else(
        &self,
        output: &mut String,
        node: &IfElse,
        comparison: Option<InstrId>,
        depth: usize,
        chained: bool,
    ) {
        let view = node.normalize(self.stream, self.classifier);

        self.echo(output, comparison, node.jump, depth);
        let keyword = if chained { "else if" } else { "if" };
        self.line(
            output,
            depth,
            format_args!("{} {} {{", keyword, self.condition(comparison, view.condition)),
        );
        self.emit_sequence(output, view.primary, depth + 1);

        match view.else_arm {
            ElseArm::None => self.line(output, depth, "}"),
            ElseArm::Block(branch) => {
                self.line(output, depth, "} else {");
                self.emit_sequence(output, branch, depth + 1);
                self.line(output, depth, "}");
            }
            ElseArm::ElseIf {
                leading_comparison,
                node: nested,
            } => {
                self.line(output, depth, "}");
                let comparison = nested.comparison.or(leading_comparison);
                self.emit_if_else(output, nested, comparison, depth, true);
            }
        }
    }

    fn emit_loop(&self, output: &mut String, lp: &Loop, depth: usize) {
        let keyword = if lp.is_infinite { "infiniteloop" } else { "loop" };
        self.line(output, depth, format_args!("{} {{", keyword));
        self.emit_sequence(output, &lp.body, depth + 1);
        self.line(output, depth, "}");
        if let Some(epilog) = lp.epilog.as_deref() {
            self.emit_node(output, epilog, depth);
        }
    }

    /// Echoes the comparison and the jump as assembly comments.
    fn echo(&self, output: &mut String, comparison: Option<InstrId>, jump: InstrId, depth: usize) {
        if !self.comments {
            return;
        }
        for id in comparison.into_iter().chain(Some(jump)) {
            if let Some(instr) = self.stream.get(id) {
                self.line(
                    output,
                    depth,
                    format_args!("# {:#x}: {}", instr.address, instr.asm()),
                );
            }
        }
    }

    fn line(&self, output: &mut String, depth: usize, text: impl std::fmt::Display) {
        writeln!(output, "{}{}", self.indent.repeat(depth), text).unwrap();
    }

    fn address(&self, address: u64) -> String {
        let text = format!("{:#x}", address);
        match self.colors {
            Some(colors) => colors.paint(address, &text),
            None => text,
        }
    }

    fn operand(&self, op: &Operand) -> String {
        if let Some(name) = op
            .frame_relative(self.classifier)
            .and_then(|mem| self.slots.name_of(mem.displacement))
        {
            return name.to_string();
        }
        op.to_string()
    }

    fn target(&self, op: &Operand) -> String {
        let Some(target) = op.direct_target() else {
            return self.operand(op);
        };
        let address = self.address(target);
        match self.symbols.and_then(|symbols| symbols.name_at(target)) {
            Some(name) => format!("{} <{}>", address, name),
            None => address,
        }
    }

    /// Renders one instruction as a statement.
    fn statement(&self, instr: &Instruction) -> String {
        if self.classifier.is_call(instr) {
            return match instr.operands.first() {
                Some(op) => format!("call {}", self.target(op)),
                None => "call".to_string(),
            };
        }
        if instr.operation == Operation::Jump {
            if let Some(op) = instr.operands.first() {
                return format!("jmp {}", self.target(op));
            }
        }

        let ops: Vec<String> = instr.operands.iter().map(|op| self.operand(op)).collect();
        match (instr.operation, ops.as_slice()) {
            (Operation::Inc, [dst]) => format!("{}++", dst),
            (Operation::Dec, [dst]) => format!("{}--", dst),
            (Operation::Neg, [dst]) => format!("{} = -{}", dst, dst),
            (Operation::Not, [dst]) => format!("{} = ~{}", dst, dst),
            (Operation::Xor, [dst, src]) if dst == src => format!("{} = 0", dst),
            (Operation::LoadEffectiveAddress, [dst, src]) => format!("{} = &{}", dst, src),
            (Operation::Return, _) => "ret".to_string(),
            (op, [dst, src]) if self.classifier.is_assignment(op) => match op.assign_operator() {
                Some(sym) => format!("{} {} {}", dst, sym, src),
                None => self.asm(instr, &ops),
            },
            _ => self.asm(instr, &ops),
        }
    }

    fn asm(&self, instr: &Instruction, ops: &[String]) -> String {
        if ops.is_empty() {
            instr.mnemonic.clone()
        } else {
            format!("{} {}", instr.mnemonic, ops.join(", "))
        }
    }

    /// Renders the condition of a conditional node.
    fn condition(&self, comparison: Option<InstrId>, condition: Condition) -> String {
        let Some(instr) = comparison.and_then(|id| self.stream.get(id)) else {
            return condition.symbol().to_string();
        };

        let ops: Vec<String> = instr.operands.iter().map(|op| self.operand(op)).collect();
        let tested = match (instr.operation, ops.as_slice()) {
            (Operation::Compare, [a, b]) => Tested::Pair(a.clone(), b.clone()),
            (Operation::Test, [a, _]) if is_self_test(instr) => Tested::Value {
                expr: a.clone(),
                compound: false,
            },
            (Operation::Test, [a, b]) => Tested::Value {
                expr: format!("{} & {}", a, b),
                compound: true,
            },
            _ => Tested::Value {
                expr: self.statement(instr),
                compound: true,
            },
        };

        let symbol = condition.symbol();
        match (condition.is_relational(), tested) {
            (true, Tested::Pair(a, b)) => format!("{} {} {}", a, symbol, b),
            (true, Tested::Value { expr, compound: true }) => format!("({}) {} 0", expr, symbol),
            (true, Tested::Value { expr, .. }) => format!("{} {} 0", expr, symbol),
            (false, Tested::Pair(a, b)) => format!("{}({} - {})", symbol, a, b),
            (false, Tested::Value { expr, .. }) => format!("{}({})", symbol, expr),
        }
    }
}
