//! The pluggable back end (§4.7): two independent ways to run a
//! [`crate::mir::MirProgram`] that share everything except how they turn
//! instructions into motion. `value` and `ops` are the shared runtime
//! model and operator semantics both variants dispatch through;
//! `intrinsics` is the small built-in surface neither variant implements
//! twice. `evaluator` walks MIR directly; `emitter` turns it into a
//! portable [`emitter::CodeObject`] artifact (§6.2) and, for testing,
//! runs that artifact back through the same evaluator semantics it was
//! derived from.
//!
//! Grounded on the teacher's dual back end: `vm::interp` (tree-walking)
//! alongside `bytecode.rs` + an AoT path, both ultimately agreeing on the
//! same `ir::core` values.

pub mod emitter;
pub mod evaluator;
pub mod intrinsics;
pub mod ops;
pub mod value;

use novalang_runtime::{RegistrationCatalog, RuntimeError};

use crate::mir::MirProgram;

pub use evaluator::Evaluator;
pub use ops::OperatorHost;
pub use value::{ClosureValue, ObjectValue, Value};

/// The contract both back ends satisfy (§4.7 "Two variants share a
/// `MirBackend` contract"): given a program, a stdlib registration
/// catalog, and an entry point, produce the same observable result.
pub trait MirBackend {
    fn run(&mut self, program: &MirProgram, catalog: &RegistrationCatalog, entry: &str, args: Vec<Value>) -> Result<Value, RuntimeError>;
}

/// The tree-walking variant (§4.7 `Evaluator`), wrapped to satisfy
/// [`MirBackend`] so callers can hold either back end behind one trait
/// object.
#[derive(Debug, Default)]
pub struct EvaluatorBackend;

impl MirBackend for EvaluatorBackend {
    fn run(&mut self, program: &MirProgram, catalog: &RegistrationCatalog, entry: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut eval = Evaluator::new(program, catalog);
        eval.run_initializers()?;
        eval.call_by_name(entry, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::lower_hir;
    use crate::lower_mir;
    use novalang_parser::parse;

    fn sample_program() -> MirProgram {
        let (program, _) = parse("fun main(): Int { return 41 + 1 }");
        let result = Analyzer::new("test.nova", false).analyze(&program);
        let hir = lower_hir::lower_program(&program, &result.types, "test.nova").unwrap();
        lower_mir::lower_program(&hir).unwrap()
    }

    #[test]
    fn evaluator_backend_runs_via_mir_backend_trait() {
        let program = sample_program();
        let catalog = RegistrationCatalog::new();
        let mut backend: Box<dyn MirBackend> = Box::new(EvaluatorBackend);
        let result = backend.run(&program, &catalog, "main", Vec::new()).unwrap();
        assert!(matches!(result, Value::Int(42)));
    }
}
