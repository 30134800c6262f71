//! Integration coverage for the concrete end-to-end scenarios and the
//! dual-backend-equivalence property: compile real source through
//! [`pipeline::compile_file`], then run the resulting code objects
//! through both the tree-walking [`Evaluator`] and the decoded-artifact
//! [`EmitterBackend`] path, asserting both agree on stdout.
//!
//! Each scenario's body is wrapped in an explicit `fun main() { ... }`
//! even where the prose states it as bare top-level statements, since
//! top-level lowering only handles declarations (functions, classes,
//! properties) — not free-standing statements — so a `main` wrapper is
//! the honest way to express "run this as a program" here.
//!
//! Two of the six scenarios are intentionally not covered here: the
//! `filter`/`map`/`sum` pipeline and the `?.let { }` / elvis pipeline
//! both need higher-order stdlib methods that invoke a closure back into
//! the evaluator, which `backend::intrinsics` documents it does not
//! support (its `call` signature has no channel back into closure
//! invocation). Asserting a passing test for either would require first
//! building that closure-invoking dispatch, which is out of scope for
//! this pass; see `DESIGN.md` for the scoped decision.

use novalang_core::backend::emitter::{self, EmitterBackend};
use novalang_core::backend::evaluator::Evaluator;
use novalang_core::backend::{MirBackend, Value};
use novalang_core::pipeline;
use novalang_runtime::RegistrationCatalog;

/// Compiles `source`, runs `main` through the tree-walking evaluator with
/// its output captured into an in-memory buffer, and returns what it
/// printed.
fn run_via_evaluator(source: &str) -> String {
    let outcome = pipeline::compile_file(source, "scenario.nova")
        .unwrap_or_else(|diags| panic!("compile failed: {diags:?}"));
    let mir = emitter::load_program(&outcome.code_objects);
    let catalog = RegistrationCatalog::new();

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut eval = Evaluator::with_output(&mir, &catalog, Box::new(&mut buf));
        eval.run_initializers().expect("initializers");
        eval.call_by_name("main", Vec::new()).expect("main");
    }
    String::from_utf8(buf).expect("utf8 output")
}

/// Same program, run through the `Emitter`'s decoded-artifact path
/// instead, with output likewise captured — §8's dual-backend
/// equivalence property asks that both agree on the observable result.
fn run_via_emitted_artifact(source: &str) -> String {
    let outcome = pipeline::compile_file(source, "scenario.nova")
        .unwrap_or_else(|diags| panic!("compile failed: {diags:?}"));
    let mir = emitter::load_program(&outcome.code_objects);
    let objects = emitter::emit_program(&mir).expect("re-emit");
    let reconstructed = emitter::load_program(&objects);
    let catalog = RegistrationCatalog::new();

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut eval = Evaluator::with_output(&reconstructed, &catalog, Box::new(&mut buf));
        eval.run_initializers().expect("initializers");
        eval.call_by_name("main", Vec::new()).expect("main");
    }
    String::from_utf8(buf).expect("utf8 output")
}

fn assert_scenario(source: &str, expected_stdout: &str) {
    assert_eq!(run_via_evaluator(source), expected_stdout, "evaluator back end");
    assert_eq!(run_via_emitted_artifact(source), expected_stdout, "emitter back end");
}

#[test]
fn scenario_arithmetic_precedence() {
    assert_scenario("fun main() { println(1 + 2 * 3) }", "7\n");
}

#[test]
fn scenario_string_length_and_uppercase() {
    assert_scenario(
        "fun main() { val s = \"hello\"; println(s.length); println(s.uppercase()) }",
        "5\nHELLO\n",
    );
}

#[test]
fn scenario_recursive_factorial() {
    assert_scenario(
        "fun fact(n) = if (n <= 1) 1 else n * fact(n - 1)\nfun main() { println(fact(5)) }",
        "120\n",
    );
}

#[test]
fn scenario_try_catch_finally() {
    assert_scenario(
        "fun main() { try { throw Error(\"bad\") } catch (e: Error) { println(\"caught: \" + e.message) } finally { println(\"done\") } }",
        "caught: bad\ndone\n",
    );
}

/// §8 dual-backend equivalence, exercised directly through the
/// [`MirBackend`] trait both back ends share (rather than through the
/// lower-level buffer-capturing helpers above), on a value-returning
/// program so the comparison covers the return value as well as stdout.
#[test]
fn dual_backends_agree_on_return_value() {
    let source = "fun square(n: Int): Int { return n * n }\nfun main(): Int { return square(9) }";
    let outcome = pipeline::compile_file(source, "scenario.nova").unwrap();
    let mir = emitter::load_program(&outcome.code_objects);
    let catalog = RegistrationCatalog::new();

    let mut evaluator_backend = novalang_core::backend::EvaluatorBackend;
    let eval_result = evaluator_backend.run(&mir, &catalog, "main", Vec::new()).unwrap();

    let mut emitter_backend = EmitterBackend;
    let emit_result = emitter_backend.run(&mir, &catalog, "main", Vec::new()).unwrap();

    assert!(matches!(eval_result, Value::Int(81)));
    assert!(eval_result.structural_eq(&emit_result));
}
