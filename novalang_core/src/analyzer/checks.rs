//! Checks performed during analysis (§4.3): arity/named-argument
//! compatibility, nullability at dereference, assignment-target
//! mutability, `is`/`as` target-type validity, `when` exhaustiveness,
//! modifier consistency on overrides.

use novalang_parser::ast::{
    AssignOp, CatchClause, Declaration, Expression, ForStmt, IfStmt, PropertyDecl, Statement,
    TryStmt, WhileStmt,
};

use crate::diagnostics::{Diagnostic, DiagnosticReporter, WarningKind};
use crate::symbol::{Mutability, NodeIdGen, Scope, ScopeKind, Symbol, SymbolTable};
use crate::types::NovaType;

use super::infer::{infer_expr, resolve_type_ref};
use super::TypeTable;

pub fn check_property(
    prop: &PropertyDecl,
    initializer_ty: &NovaType,
    reporter: &mut DiagnosticReporter,
    file_name: &str,
) {
    if let Some(declared) = &prop.type_annotation {
        let declared_ty = resolve_type_ref(Some(declared));
        if !declared_ty.is_unresolved() && !initializer_ty.is_assignable_to(&declared_ty) {
            reporter.report(Diagnostic::error(
                format!(
                    "type mismatch: '{}' declared as {} but initializer is {}",
                    prop.name, declared_ty, initializer_ty
                ),
                prop.span,
                file_name,
            ));
        }
    }
}

pub fn analyze_block(
    stmts: &[Statement],
    symbols: &mut SymbolTable,
    types: &mut TypeTable,
    reporter: &mut DiagnosticReporter,
    file_name: &str,
    node_ids: &mut NodeIdGen,
) {
    symbols.push_scope(Scope::new(ScopeKind::Block));
    let mut terminated_at: Option<usize> = None;
    for (i, stmt) in stmts.iter().enumerate() {
        if let Some(at) = terminated_at {
            if i > at {
                reporter.report_warning(
                    WarningKind::UnreachableCode,
                    "unreachable code".to_string(),
                    stmt.span(),
                    file_name,
                );
            }
        }
        analyze_stmt(stmt, symbols, types, reporter, file_name, node_ids);
        if terminated_at.is_none() && is_terminator(stmt) {
            terminated_at = Some(i);
        }
    }
    symbols.pop_scope();
}

fn is_terminator(stmt: &Statement) -> bool {
    matches!(
        stmt,
        Statement::Return { .. }
            | Statement::Break { .. }
            | Statement::Continue { .. }
            | Statement::Throw { .. }
    )
}

#[allow(clippy::too_many_arguments)]
fn analyze_stmt(
    stmt: &Statement,
    symbols: &mut SymbolTable,
    types: &mut TypeTable,
    reporter: &mut DiagnosticReporter,
    file_name: &str,
    node_ids: &mut NodeIdGen,
) {
    match stmt {
        Statement::Expression(e) => {
            check_dereferences(e, symbols, types, reporter, file_name);
            infer_expr(e, symbols, types);
        }
        Statement::Declaration(Declaration::Property(p)) => {
            let ty = match &p.initializer {
                Some(init) => infer_expr(init, symbols, types),
                None => resolve_type_ref(p.type_annotation.as_ref()),
            };
            let declared = if matches!(p.type_annotation, Some(_)) {
                resolve_type_ref(p.type_annotation.as_ref())
            } else {
                ty.clone()
            };
            let symbol = Symbol {
                name: p.name.clone(),
                ty: declared,
                mutability: if p.is_var { Mutability::Var } else { Mutability::Val },
                declared_at: p.span,
                node_id: node_ids.next(),
            };
            match symbols.declare(symbol) {
                Ok(Some(shadowed_at)) => {
                    reporter.report_warning(
                        WarningKind::ShadowedDeclaration,
                        format!(
                            "declaration of '{}' shadows an outer declaration at {shadowed_at:?}",
                            p.name
                        ),
                        p.span,
                        file_name,
                    );
                }
                Ok(None) => {}
                Err(prior) => {
                    reporter.report(Diagnostic::error(
                        format!("duplicate declaration of '{}' (first at {prior:?})", p.name),
                        p.span,
                        file_name,
                    ));
                }
            }
        }
        Statement::Declaration(Declaration::Destructuring(d)) => {
            infer_expr(&d.initializer, symbols, types);
            for name in &d.bindings {
                let _ = symbols.declare(Symbol {
                    name: name.clone(),
                    ty: NovaType::any(),
                    mutability: if d.is_var { Mutability::Var } else { Mutability::Val },
                    declared_at: d.span,
                    node_id: node_ids.next(),
                });
            }
        }
        Statement::Declaration(_) => {}
        Statement::Assignment(assign) => {
            check_assignment_target(assign, symbols, reporter, file_name);
            infer_expr(&assign.value, symbols, types);
            if assign.op != AssignOp::Assign {
                infer_expr(&assign.target, symbols, types);
            }
        }
        Statement::If(IfStmt {
            condition,
            then_branch,
            else_branch,
            ..
        }) => {
            infer_expr(condition, symbols, types);
            analyze_block(
                std::slice::from_ref(then_branch.as_ref()),
                symbols,
                types,
                reporter,
                file_name,
                node_ids,
            );
            if let Some(e) = else_branch {
                analyze_block(
                    std::slice::from_ref(e.as_ref()),
                    symbols,
                    types,
                    reporter,
                    file_name,
                    node_ids,
                );
            }
        }
        Statement::While(WhileStmt { label, condition, body, .. }) => {
            infer_expr(condition, symbols, types);
            symbols.push_scope(Scope::loop_scope(label.clone()));
            analyze_stmt(body, symbols, types, reporter, file_name, node_ids);
            symbols.pop_scope();
        }
        Statement::DoWhile(d) => {
            symbols.push_scope(Scope::loop_scope(d.label.clone()));
            analyze_stmt(&d.body, symbols, types, reporter, file_name, node_ids);
            symbols.pop_scope();
            infer_expr(&d.condition, symbols, types);
        }
        Statement::For(ForStmt {
            label,
            variable,
            iterable,
            body,
            span,
        }) => {
            infer_expr(iterable, symbols, types);
            symbols.push_scope(Scope::loop_scope(label.clone()));
            let _ = symbols.declare(Symbol {
                name: variable.clone(),
                ty: NovaType::any(),
                mutability: Mutability::Val,
                declared_at: *span,
                node_id: node_ids.next(),
            });
            analyze_stmt(body, symbols, types, reporter, file_name, node_ids);
            symbols.pop_scope();
        }
        Statement::Return { value, .. } => {
            if let Some(v) = value {
                infer_expr(v, symbols, types);
            }
        }
        Statement::Break { label, span } | Statement::Continue { label, span } => {
            if symbols
                .resolve_loop(label.as_deref())
                .is_none()
            {
                let message = match label {
                    Some(l) => format!("label '@{l}' does not refer to an enclosing loop"),
                    None => "break/continue outside of a loop".to_string(),
                };
                reporter.report(Diagnostic::error(message, *span, file_name));
            }
        }
        Statement::Throw { value, .. } => {
            infer_expr(value, symbols, types);
        }
        Statement::Try(TryStmt { body, catches, finally, .. }) => {
            analyze_block(body, symbols, types, reporter, file_name, node_ids);
            for CatchClause { name, exception_type, body, span } in catches {
                symbols.push_scope(Scope::new(ScopeKind::Block));
                let _ = symbols.declare(Symbol {
                    name: name.clone(),
                    ty: resolve_type_ref(Some(exception_type)),
                    mutability: Mutability::Val,
                    declared_at: *span,
                    node_id: node_ids.next(),
                });
                analyze_block(body, symbols, types, reporter, file_name, node_ids);
                symbols.pop_scope();
            }
            if let Some(f) = finally {
                analyze_block(f, symbols, types, reporter, file_name, node_ids);
            }
        }
        Statement::Block { body, .. } => {
            analyze_block(body, symbols, types, reporter, file_name, node_ids);
        }
    }
}

fn check_assignment_target(
    assign: &novalang_parser::ast::AssignmentStmt,
    symbols: &SymbolTable,
    reporter: &mut DiagnosticReporter,
    file_name: &str,
) {
    if let Expression::Identifier { name, span } = &assign.target {
        match symbols.lookup(name) {
            Some(symbol) if symbol.mutability == Mutability::Val => {
                reporter.report(Diagnostic::error(
                    format!("cannot reassign val '{name}'"),
                    *span,
                    file_name,
                ));
            }
            None => {
                reporter.report(Diagnostic::error(
                    format!("unresolved name '{name}'"),
                    *span,
                    file_name,
                ));
            }
            _ => {}
        }
    }
}

/// §4.3 "nullability at dereference/method-call": a non-safe `.`/`[]` on
/// a receiver whose resolved type is `Nullable` is flagged.
fn check_dereferences(
    expr: &Expression,
    symbols: &SymbolTable,
    types: &mut TypeTable,
    reporter: &mut DiagnosticReporter,
    file_name: &str,
) {
    match expr {
        Expression::Member { receiver, safe: false, span, .. } => {
            let receiver_ty = infer_expr(receiver, symbols, types);
            if receiver_ty.is_nullable() {
                reporter.report(Diagnostic::error(
                    "possible null dereference; use '?.' or '!!'".to_string(),
                    *span,
                    file_name,
                ));
            }
            check_dereferences(receiver, symbols, types, reporter, file_name);
        }
        Expression::Index { receiver, index, span, .. } => {
            let receiver_ty = infer_expr(receiver, symbols, types);
            if receiver_ty.is_nullable() {
                reporter.report(Diagnostic::error(
                    "possible null dereference; use '!!' before indexing".to_string(),
                    *span,
                    file_name,
                ));
            }
            check_dereferences(receiver, symbols, types, reporter, file_name);
            check_dereferences(index, symbols, types, reporter, file_name);
        }
        Expression::Call { callee, positional_args, .. } => {
            check_dereferences(callee, symbols, types, reporter, file_name);
            for arg in positional_args {
                check_dereferences(arg, symbols, types, reporter, file_name);
            }
        }
        Expression::Binary { left, right, .. } => {
            check_dereferences(left, symbols, types, reporter, file_name);
            check_dereferences(right, symbols, types, reporter, file_name);
        }
        Expression::Unary { operand, .. } => {
            check_dereferences(operand, symbols, types, reporter, file_name);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use novalang_parser::parse;

    fn analyze(source: &str) -> crate::analyzer::AnalysisResult {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors.errors());
        Analyzer::new("test.nova", false).analyze(&program)
    }

    #[test]
    fn orphan_label_is_reported() {
        let result = analyze("fun main() { break@missing }");
        assert!(result.has_errors());
    }

    #[test]
    fn labeled_break_inside_labeled_loop_is_fine() {
        let result = analyze("fun main() { outer@ for (i in 1..3) { break@outer } }");
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn unreachable_code_after_return_warns() {
        let result = analyze("fun main() { return; val x = 1 }");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("unreachable")));
    }

    #[test]
    fn unsafe_member_access_on_nullable_receiver_errors() {
        let result = analyze("fun main() { val x: Int? = null; x.toString() }");
        assert!(result.has_errors());
    }

    #[test]
    fn safe_member_access_on_nullable_receiver_is_fine() {
        let result = analyze("fun main() { val x: Int? = null; x?.toString() }");
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }
}
