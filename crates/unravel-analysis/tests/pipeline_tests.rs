//! End-to-end tests of the recovery pipeline and pseudo-code rendering.
//!
//! To update snapshots when making intentional changes, run:
//! ```bash
//! cargo insta review
//! ```

use unravel_analysis::decompiler::{ConditionalGoto, ElseArm, IfElse, InstructionBlock};
use unravel_analysis::{
    AstNode, CanaryConfig, Decompiler, DecompilerConfig, FunctionInput, RecoveryPass, Sequence,
};
use unravel_core::register::x86;
use unravel_core::{
    Architecture, Condition, EdgeTable, InstrId, Instruction, InstructionStream, MemoryRef,
    Operand, Operation, Register, SymbolMap, X86Classifier,
};

const STACK_CHK_FAIL: u64 = 0x401030;

fn r64(id: u16) -> Operand {
    Operand::reg(Register::gpr(Architecture::X86_64, id, 64))
}

fn r32(id: u16) -> Operand {
    Operand::reg(Register::gpr(Architecture::X86_64, id, 32))
}

fn frame(disp: i64, size: u8) -> Operand {
    let rbp = Register::gpr(Architecture::X86_64, x86::RBP, 64);
    Operand::mem(MemoryRef::base_disp(rbp, disp, size))
}

fn fs_canary() -> Operand {
    let fs = Register::segment(Architecture::X86_64, x86::FS);
    Operand::mem(MemoryRef::absolute(0x28, 8).with_segment(fs))
}

/// Assigns addresses `0x1000, 0x1004, ...` in order.
fn stream_of(parts: Vec<(&str, Operation, Vec<Operand>)>) -> InstructionStream {
    let instrs = parts
        .into_iter()
        .enumerate()
        .map(|(i, (mnemonic, operation, operands))| {
            Instruction::new(0x1000 + 4 * i as u64, 4, vec![], mnemonic)
                .with_operation(operation)
                .with_operands(operands)
        })
        .collect();
    InstructionStream::new(instrs).unwrap()
}

fn block(range: std::ops::Range<usize>) -> Sequence {
    let mut seq = Sequence::new();
    seq.add_block(InstructionBlock::new(range));
    seq
}

fn symbols() -> SymbolMap {
    [("__stack_chk_fail@plt", STACK_CHK_FAIL)].into_iter().collect()
}

/// A stack-protected function classifying the sign of its argument.
fn classify() -> (InstructionStream, Sequence) {
    let stream = stream_of(vec![
        ("push", Operation::Push, vec![r64(x86::RBP)]),
        ("mov", Operation::Move, vec![r64(x86::RBP), r64(x86::RSP)]),
        ("mov", Operation::Move, vec![r64(x86::RAX), fs_canary()]),
        ("mov", Operation::Move, vec![frame(-0x8, 8), r64(x86::RAX)]),
        ("mov", Operation::Move, vec![frame(-0x14, 4), r32(x86::RDI)]),
        ("cmp", Operation::Compare, vec![frame(-0x14, 4), Operand::imm(0, 32)]),
        ("jge", Operation::ConditionalJump, vec![Operand::pc_rel(0x8, 0x1020)]),
        ("mov", Operation::Move, vec![frame(-0xc, 4), Operand::imm(-1, 32)]),
        ("cmp", Operation::Compare, vec![frame(-0x14, 4), Operand::imm(0, 32)]),
        ("jne", Operation::ConditionalJump, vec![Operand::pc_rel(0x8, 0x102c)]),
        ("mov", Operation::Move, vec![frame(-0xc, 4), Operand::imm(0, 32)]),
        ("mov", Operation::Move, vec![frame(-0xc, 4), Operand::imm(1, 32)]),
        ("mov", Operation::Move, vec![r64(x86::RAX), frame(-0x8, 8)]),
        ("xor", Operation::Xor, vec![r64(x86::RAX), fs_canary()]),
        ("je", Operation::ConditionalJump, vec![Operand::pc_rel(0x8, 0x1040)]),
        ("call", Operation::Call, vec![Operand::pc_rel(0x3fffb0, STACK_CHK_FAIL)]),
        ("mov", Operation::Move, vec![r32(x86::RAX), frame(-0xc, 4)]),
        ("leave", Operation::Other(0), vec![]),
        ("ret", Operation::Return, vec![]),
    ]);

    let mut else_branch = block(8..9);
    else_branch.add(IfElse::new(InstrId(9), Condition::NotEqual, block(10..11), block(11..12)).into());

    let mut ast = block(0..6);
    ast.add(IfElse::new(InstrId(6), Condition::GreaterOrEqual, block(7..8), else_branch).into());
    ast.add_block(InstructionBlock::new(12..14));
    ast.add(IfElse::new(InstrId(14), Condition::Equal, block(15..16), Sequence::new()).into());
    ast.add_block(InstructionBlock::new(16..19));

    (stream, ast)
}

fn load_matching() -> DecompilerConfig {
    DecompilerConfig::default().with_canary(CanaryConfig {
        match_loads: true,
        ..CanaryConfig::default()
    })
}

#[test]
fn test_classify_function_snapshot() {
    let (stream, ast) = classify();
    let decompiler = Decompiler::new(load_matching(), X86Classifier::default());
    let result = decompiler.decompile(&stream, ast, &symbols());

    let text = decompiler.render("classify", &result, &stream, &symbols(), &EdgeTable::new());
    insta::assert_snapshot!("classify_function", text);
}

#[test]
fn test_classify_function_state() {
    let (stream, ast) = classify();
    let decompiler = Decompiler::new(load_matching(), X86Classifier::default());
    let result = decompiler.decompile(&stream, ast, &symbols());

    assert_eq!(result.fused.sorted(), vec![0x1014, 0x1020, 0x1034]);

    let slots: Vec<(i64, &str, u8)> = result
        .slots
        .iter()
        .map(|s| (s.displacement, s.name.as_str(), s.size))
        .collect();
    assert_eq!(
        slots,
        vec![(-0x8, "var1_canary", 8), (-0x14, "var2", 4), (-0xc, "var3", 4)]
    );

    let canary = result.canary.unwrap();
    assert_eq!(canary.call_addr, 0x103c);
    assert_eq!(canary.store_addr, 0x1030);
}

#[test]
fn test_canary_reload_needs_load_matching() {
    let (stream, ast) = classify();
    let result = Decompiler::default().decompile(&stream, ast, &symbols());

    // The instruction before the check is a reload, not a store.
    assert!(result.canary.is_none());
    assert_eq!(result.slots.name_of(-0x8), Some("var1"));
}

#[test]
fn test_else_if_collapse_structure() {
    let (stream, ast) = classify();
    let decompiler = Decompiler::default();
    let result = decompiler.decompile(&stream, ast, &SymbolMap::new());

    let Some(AstNode::IfElse(outer)) = result.ast.items[1].as_node() else {
        panic!("expected if-else at position 1");
    };
    let view = outer.normalize(&stream, decompiler.classifier());
    assert!(!view.swapped);
    assert_eq!(view.condition, Condition::Less);

    match view.else_arm {
        ElseArm::ElseIf {
            leading_comparison,
            node,
        } => {
            assert_eq!(leading_comparison, Some(InstrId(8)));
            assert_eq!(node.comparison, Some(InstrId(8)));
            assert_eq!(node.jump, InstrId(9));
        }
        other => panic!("expected else-if, got {:?}", other),
    }
}

#[test]
fn test_empty_then_branch_keeps_jump_condition() {
    let stream = stream_of(vec![
        ("test", Operation::Test, vec![r32(x86::RAX), r32(x86::RAX)]),
        ("je", Operation::ConditionalJump, vec![Operand::pc_rel(0x4, 0x100c)]),
        ("inc", Operation::Inc, vec![r32(x86::RBX)]),
    ]);
    let mut ast = block(0..1);
    ast.add(IfElse::new(InstrId(1), Condition::Equal, Sequence::new(), block(2..3)).into());

    let decompiler = Decompiler::new(
        DecompilerConfig::default().with_comments(false),
        X86Classifier::default(),
    );
    let result = decompiler.decompile(&stream, ast, &SymbolMap::new());
    let text = decompiler.render("f", &result, &stream, &SymbolMap::new(), &EdgeTable::new());

    assert_eq!(
        text,
        "function f {\n    if eax == 0 {\n        0x1008: ebx++\n    }\n}\n"
    );
}

#[test]
fn test_fusion_disabled_renders_bare_condition() {
    let stream = stream_of(vec![
        ("cmp", Operation::Compare, vec![r32(x86::RAX), Operand::imm(3, 32)]),
        ("jl", Operation::ConditionalJump, vec![Operand::pc_rel(0x10, 0x1014)]),
    ]);
    let mut ast = block(0..1);
    ast.add(ConditionalGoto::new(InstrId(1), Condition::Less, 0x1014).into());

    let config = DecompilerConfig::default()
        .with_comments(false)
        .disable_pass(RecoveryPass::ConditionFusion);
    let decompiler = Decompiler::new(config, X86Classifier::default());
    let result = decompiler.decompile(&stream, ast, &SymbolMap::new());
    let text = decompiler.render("f", &result, &stream, &SymbolMap::new(), &EdgeTable::new());

    assert!(result.fused.is_empty());
    assert!(text.contains("0x1000: cmp eax, 0x3\n"));
    assert!(text.contains("if <  goto 0x1014\n"));
}

#[test]
fn test_colors_follow_config() {
    let stream = stream_of(vec![
        ("nop", Operation::Nop, vec![]),
        ("jmp", Operation::Jump, vec![Operand::pc_rel(-0x8, 0x1000)]),
    ]);
    let mut ast = block(0..1);
    ast.add(AstNode::Jump(0x1000));

    let plain = Decompiler::default();
    let result = plain.decompile(&stream, ast.clone(), &SymbolMap::new());
    let text = plain.render("f", &result, &stream, &SymbolMap::new(), &EdgeTable::new());
    assert!(!text.contains('\x1b'));

    let colored = Decompiler::new(DecompilerConfig::default().with_colors(true), X86Classifier::default());
    let result = colored.decompile(&stream, ast, &SymbolMap::new());
    let text = colored.render("f", &result, &stream, &SymbolMap::new(), &EdgeTable::new());
    assert!(text.contains("jmp \x1b[31m0x1000\x1b[0m"));
    assert!(text.contains("\x1b[31m0x1000\x1b[0m: nop"));
}

#[test]
fn test_decompile_many_preserves_order() {
    let functions: Vec<FunctionInput> = (0..4)
        .map(|i| {
            let (stream, ast) = classify();
            FunctionInput {
                name: format!("classify_{}", i),
                stream,
                ast,
            }
        })
        .collect();

    let decompiler = Decompiler::new(load_matching(), X86Classifier::default());
    let results = decompiler.decompile_many(&functions, &symbols());
    assert_eq!(results.len(), 4);
    for result in &results {
        assert_eq!(result.slots.name_of(-0x8), Some("var1_canary"));
        assert_eq!(result.slots.len(), 3);
    }
}
