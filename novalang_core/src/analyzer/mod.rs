//! The semantic analyzer (§4.3): AST → AST + diagnostics. Resolves names,
//! infers types, validates modifiers, and annotates nodes with resolved
//! types.
//!
//! `novalang_parser::ast::Program` is immutable, arena-shaped, owned
//! data — there is no slot on an `Expression` to write a resolved type
//! into. Per §3.3 ("parent/scope relationships live in side tables built
//! by the analyzer"), the analyzer instead produces a [`TypeTable`] side
//! table keyed by span, which [`crate::lower_hir`] queries by expression
//! span when it needs the type the analyzer assigned.

mod checks;
mod infer;

use std::collections::HashMap;

use novalang_parser::ast::{Declaration, FunctionDecl, Program};
use novalang_parser::span::Span;

use crate::diagnostics::{Diagnostic, DiagnosticReporter};
use crate::symbol::{Mutability, NodeIdGen, Scope, ScopeKind, Symbol, SymbolTable};
use crate::types::NovaType;

/// A span-keyed lookup table mapping every analyzed expression to the
/// [`NovaType`] the analyzer resolved for it (§4.3).
#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    entries: HashMap<SpanKey, NovaType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SpanKey {
    file_id: u32,
    start: usize,
    end: usize,
}

impl From<Span> for SpanKey {
    fn from(span: Span) -> Self {
        SpanKey {
            file_id: span.file_id,
            start: span.start,
            end: span.end,
        }
    }
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, span: Span, ty: NovaType) {
        self.entries.insert(span.into(), ty);
    }

    /// The type resolved for `span`, or `NovaType::any()` if the analyzer
    /// never visited it (e.g. a sub-expression inside a branch unreached
    /// by inference, which should not happen for a well-formed program
    /// but keeps lowering total over partially erroneous input).
    pub fn get(&self, span: Span) -> NovaType {
        self.entries
            .get(&SpanKey::from(span))
            .cloned()
            .unwrap_or_else(NovaType::any)
    }
}

/// The result of analyzing one compilation unit: the type table lowering
/// will consult, plus every diagnostic collected along the way.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub types: TypeTable,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == crate::diagnostics::Severity::Error)
    }
}

/// Per-unit analyzer state threaded through the two-pass walk: a
/// first pass registers every top-level/class-member signature so
/// forward references resolve, then a second pass type-checks bodies.
pub struct Analyzer<'a> {
    file_name: &'a str,
    symbols: SymbolTable,
    types: TypeTable,
    reporter: DiagnosticReporter,
    node_ids: NodeIdGen,
}

impl<'a> Analyzer<'a> {
    pub fn new(file_name: &'a str, strict: bool) -> Self {
        Self {
            file_name,
            symbols: SymbolTable::new(),
            types: TypeTable::new(),
            reporter: DiagnosticReporter::new(strict),
            node_ids: NodeIdGen::new(),
        }
    }

    pub fn analyze(mut self, program: &Program) -> AnalysisResult {
        self.register_top_level(program);
        for decl in &program.declarations {
            self.analyze_declaration(decl);
        }
        AnalysisResult {
            types: self.types,
            diagnostics: self.reporter.into_diagnostics(),
        }
    }

    /// First pass (§4.3 "walking declarations in source order"): register
    /// every function/property/class name at file scope before checking
    /// any body, so mutually recursive and forward-referenced
    /// declarations resolve.
    fn register_top_level(&mut self, program: &Program) {
        for decl in &program.declarations {
            self.register_declaration(decl);
        }
    }

    fn register_declaration(&mut self, decl: &Declaration) {
        let (name, ty, span) = match decl {
            Declaration::Function(f) => (f.name.clone(), function_type(f), f.span),
            Declaration::Property(p) => {
                let ty = infer::resolve_type_ref(p.type_annotation.as_ref());
                (p.name.clone(), ty, p.span)
            }
            Declaration::Class(c) => (
                c.name.clone(),
                NovaType::Class {
                    qualified_name: c.name.clone(),
                    type_args: vec![],
                },
                c.span,
            ),
            _ => return,
        };
        let symbol = Symbol {
            name: name.clone(),
            ty,
            mutability: Mutability::Val,
            declared_at: span,
            node_id: self.node_ids.next(),
        };
        if let Err(prior) = self.symbols.declare(symbol) {
            self.reporter.report(Diagnostic::error(
                format!("duplicate declaration of '{name}' (first declared at {prior:?})"),
                span,
                self.file_name,
            ));
        }
    }

    fn analyze_declaration(&mut self, decl: &Declaration) {
        match decl {
            Declaration::Function(f) => self.analyze_function(f),
            Declaration::Property(p) => {
                if let Some(init) = &p.initializer {
                    let ty = infer::infer_expr(init, &self.symbols, &mut self.types);
                    checks::check_property(p, &ty, &mut self.reporter, self.file_name);
                }
            }
            Declaration::Class(c) => {
                self.symbols.push_scope(Scope::new(ScopeKind::Class));
                for member in &c.members {
                    self.register_declaration(member);
                }
                for member in &c.members {
                    self.analyze_declaration(member);
                }
                self.symbols.pop_scope();
            }
            _ => {}
        }
    }

    fn analyze_function(&mut self, f: &FunctionDecl) {
        self.symbols.push_scope(Scope::new(ScopeKind::Function));
        for param in &f.params {
            let ty = infer::resolve_type_ref(param.type_annotation.as_ref());
            let _ = self.symbols.declare(Symbol {
                name: param.name.clone(),
                ty,
                mutability: Mutability::Val,
                declared_at: param.span,
                node_id: self.node_ids.next(),
            });
        }
        match &f.body {
            novalang_parser::ast::FunctionBody::Expression(expr) => {
                infer::infer_expr(expr, &self.symbols, &mut self.types);
            }
            novalang_parser::ast::FunctionBody::Block(stmts) => {
                checks::analyze_block(
                    stmts,
                    &mut self.symbols,
                    &mut self.types,
                    &mut self.reporter,
                    self.file_name,
                    &mut self.node_ids,
                );
            }
            novalang_parser::ast::FunctionBody::Abstract => {}
        }
        self.symbols.pop_scope();
    }
}

fn function_type(f: &FunctionDecl) -> NovaType {
    NovaType::Function {
        params: f
            .params
            .iter()
            .map(|p| infer::resolve_type_ref(p.type_annotation.as_ref()))
            .collect(),
        return_type: Box::new(infer::resolve_type_ref(f.return_type.as_ref())),
        receiver: f
            .receiver
            .as_ref()
            .map(|r| Box::new(infer::resolve_type_ref(Some(r)))),
    }
}

pub use infer::resolve_type_ref;

#[cfg(test)]
mod tests {
    use super::*;
    use novalang_parser::parse;

    fn analyze(source: &str) -> AnalysisResult {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors.errors());
        Analyzer::new("test.nova", false).analyze(&program)
    }

    #[test]
    fn infers_int_literal_type() {
        let result = analyze("fun main() { val x = 1 }");
        assert!(!result.has_errors());
    }

    #[test]
    fn reports_duplicate_top_level_declaration() {
        let result = analyze("fun f() {}\nfun f() {}");
        assert!(result.has_errors());
    }

    #[test]
    fn allows_forward_reference_between_functions() {
        let result = analyze("fun a() { b() }\nfun b() {}");
        assert!(!result.has_errors());
    }

    #[test]
    fn reassigning_val_is_an_error() {
        let result = analyze("fun main() { val x = 1; x = 2 }");
        assert!(result.has_errors());
    }

    #[test]
    fn reassigning_var_is_allowed() {
        let result = analyze("fun main() { var x = 1; x = 2 }");
        assert!(!result.has_errors());
    }
}
