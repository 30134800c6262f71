//! novalang_core
//!
//! Compiler core for NovaLang: takes a parsed [`novalang_parser::Program`]
//! through semantic analysis, AST→HIR desugaring, HIR→MIR lowering with a
//! pass framework in between each stage, and a pluggable back end that can
//! either tree-walk the result directly or emit it to a portable code
//! object. `pipeline` is the published surface a CLI or other host drives
//! all of this through; every other module is an implementation detail of
//! one pipeline stage.
//!
//! # Example
//!
//! ```
//! use novalang_core::pipeline;
//!
//! let outcome = pipeline::compile_file("fun main(): Int { return 1 + 2 }", "main.nova").unwrap();
//! assert!(outcome.code_objects.contains_key("main"));
//! ```

pub mod analyzer;
pub mod backend;
pub mod diagnostics;
pub mod error;
pub mod hir;
pub mod lower_hir;
pub mod lower_mir;
pub mod mir;
pub mod passes;
pub mod pipeline;
pub mod symbol;
pub mod types;

pub use diagnostics::{Diagnostic, Severity};
pub use error::{BackendError, CoreError, CoreResult, LoweringError, SemanticError};
pub use types::{NovaType, PrimitiveType};

/// Get version information.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!version().is_empty());
    }

    #[test]
    fn end_to_end_compile_runs_through_both_back_ends() {
        use backend::{EmitterBackend, EvaluatorBackend, MirBackend, Value};
        use novalang_runtime::RegistrationCatalog;

        let source = "fun square(n: Int): Int { return n * n }\nfun main(): Int { return square(6) }";
        let outcome = pipeline::compile_file(source, "main.nova").unwrap();
        assert!(outcome.code_objects.contains_key("square"));
        assert!(outcome.code_objects.contains_key("main"));

        let mir = backend::emitter::load_program(&outcome.code_objects);
        let catalog = RegistrationCatalog::new();

        let mut evaluator = EvaluatorBackend;
        let eval_result = evaluator.run(&mir, &catalog, "main", Vec::new()).unwrap();
        assert!(matches!(eval_result, Value::Int(36)));

        let mut emitter = EmitterBackend;
        let emit_result = emitter.run(&mir, &catalog, "main", Vec::new()).unwrap();
        assert!(eval_result.structural_eq(&emit_result));
    }
}
