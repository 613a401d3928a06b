//! Parallel processing utilities for decompilation.
//!
//! This module provides utilities for running the recovery passes over
//! multiple functions using rayon. Every function gets its own context, so
//! the only shared inputs are read-only.

use rayon::prelude::*;

use unravel_core::{InstructionStream, SymbolMap};

use crate::decompiler::{DecompiledFunction, Decompiler, Sequence};

/// A structured function awaiting decompilation.
#[derive(Debug, Clone)]
pub struct FunctionInput {
    /// Function name, used for rendering only.
    pub name: String,
    /// The function's instructions.
    pub stream: InstructionStream,
    /// The structured tree over `stream`.
    pub ast: Sequence,
}

/// Decompile multiple functions in parallel.
///
/// Results are returned in input order.
///
/// # Example
/// ```ignore
/// use unravel_analysis::parallel::{decompile_functions_parallel, FunctionInput};
/// use unravel_analysis::Decompiler;
///
/// let decompiler = Decompiler::default();
/// let results = decompile_functions_parallel(&decompiler, &functions, &symbols);
/// ```
pub fn decompile_functions_parallel(
    decompiler: &Decompiler,
    functions: &[FunctionInput],
    symbols: &SymbolMap,
) -> Vec<DecompiledFunction> {
    functions
        .par_iter()
        .map(|func| decompiler.decompile(&func.stream, func.ast.clone(), symbols))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompiler::ConditionalGoto;
    use unravel_core::register::x86;
    use unravel_core::{
        Architecture, Condition, InstrId, Instruction, MemoryRef, Operand, Operation, Register,
    };

    fn function(index: u64) -> FunctionInput {
        let rbp = Register::gpr(Architecture::X86_64, x86::RBP, 64);
        let base = 0x1000 * (index + 1);
        let disp = -8 * (index as i64 + 1);
        let stream = InstructionStream::new(vec![
            Instruction::new(base, 4, vec![], "cmp")
                .with_operation(Operation::Compare)
                .with_operands(vec![
                    Operand::mem(MemoryRef::base_disp(rbp, disp, 4)),
                    Operand::imm(0, 32),
                ]),
            Instruction::new(base + 4, 2, vec![], "je").with_operation(Operation::ConditionalJump),
        ])
        .unwrap();
        let ast = Sequence::new()
            .with_block(0..1)
            .with_node(ConditionalGoto::new(InstrId(1), Condition::Equal, base));

        FunctionInput {
            name: format!("fn_{}", index),
            stream,
            ast,
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let functions: Vec<FunctionInput> = (0..16).map(function).collect();
        let decompiler = Decompiler::default();
        let symbols = SymbolMap::new();

        let parallel = decompile_functions_parallel(&decompiler, &functions, &symbols);
        assert_eq!(parallel.len(), functions.len());

        for (i, (func, result)) in functions.iter().zip(&parallel).enumerate() {
            let sequential = decompiler.decompile(&func.stream, func.ast.clone(), &symbols);
            assert_eq!(result, &sequential);
            // Each function numbers its slots from 1.
            let slot = result.slots.iter().next().unwrap();
            assert_eq!(slot.id, 1);
            assert_eq!(slot.displacement, -8 * (i as i64 + 1));
            assert_eq!(result.fused.sorted(), vec![0x1000 * (i as u64 + 1)]);
        }
    }
}
