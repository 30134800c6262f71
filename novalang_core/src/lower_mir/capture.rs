//! Closure capture analysis (§4.5 "Closure capture"): for each lambda,
//! the set of outer names it reads that aren't its own parameters or
//! locals, and which of those names need boxing because some enclosing
//! `var` they alias is mutated after the box is shared.

use std::collections::{HashMap, HashSet};

use crate::hir::{HirBlock, HirCollectionElement, HirExpr, HirParam, HirStmt};

/// Names a lambda body reads that are not bound inside it (its own
/// parameters, `let`s, the loop variable of a `for`, a `catch` binding, or
/// a nested lambda's own parameters). `this`/`super` are never captured by
/// name (they are threaded structurally) and are excluded.
pub fn free_variables(params: &[HirParam], body: &HirBlock) -> HashSet<String> {
    let mut bound: HashSet<String> = params.iter().map(|p| p.name.clone()).collect();
    let mut free = HashSet::new();
    walk_block(body, &mut bound, &mut free);
    free
}

/// Every name referenced by some lambda nested (at any depth) inside
/// `body`, other than that lambda's own parameters — the candidate set
/// for capture. Used against the enclosing function's locally-declared
/// `var`s to decide which locals need boxing (§4.5).
pub fn names_captured_by_nested_lambdas(body: &HirBlock) -> HashSet<String> {
    let mut out = HashSet::new();
    collect_lambda_frees_in_block(body, &mut out);
    out
}

/// The subset of [`names_captured_by_nested_lambdas`] that actually needs
/// heap boxing (§4.5: "`val` = copy, `var` = heap box"). A captured name
/// always resolves to a binding declared somewhere in this same `body`
/// (a lambda's own free variables are never its own locals), so walking
/// `body`'s own `let` statements — without descending into a nested
/// lambda's body, which is lowered as its own function and makes its own
/// boxing decisions — is enough to recover each captured name's declared
/// mutability. A captured function parameter has no `var` form at all,
/// so it is never boxed either: it simply won't appear in `mutable`.
pub fn names_requiring_boxing(body: &HirBlock) -> HashSet<String> {
    let captured = names_captured_by_nested_lambdas(body);
    let mut mutable = HashMap::new();
    collect_declared_mutability_in_block(body, &mut mutable);
    captured.into_iter().filter(|name| mutable.get(name).copied().unwrap_or(false)).collect()
}

fn collect_declared_mutability_in_block(block: &HirBlock, out: &mut HashMap<String, bool>) {
    for stmt in block {
        collect_declared_mutability_in_stmt(stmt, out);
    }
}

fn collect_declared_mutability_in_stmt(stmt: &HirStmt, out: &mut HashMap<String, bool>) {
    match stmt {
        HirStmt::Let { name, is_mutable, value, .. } => {
            out.insert(name.clone(), *is_mutable);
            collect_declared_mutability_in_expr(value, out);
        }
        HirStmt::Expr(e) => collect_declared_mutability_in_expr(e, out),
        HirStmt::Assign { target, value, .. } => {
            collect_declared_mutability_in_expr(target, out);
            collect_declared_mutability_in_expr(value, out);
        }
        HirStmt::If { condition, then_branch, else_branch, .. } => {
            collect_declared_mutability_in_expr(condition, out);
            collect_declared_mutability_in_block(then_branch, out);
            if let Some(e) = else_branch {
                collect_declared_mutability_in_block(e, out);
            }
        }
        HirStmt::While { condition, body, .. } => {
            collect_declared_mutability_in_expr(condition, out);
            collect_declared_mutability_in_block(body, out);
        }
        HirStmt::DoWhile { body, condition, .. } => {
            collect_declared_mutability_in_block(body, out);
            collect_declared_mutability_in_expr(condition, out);
        }
        HirStmt::For { iterable, body, .. } => {
            collect_declared_mutability_in_expr(iterable, out);
            collect_declared_mutability_in_block(body, out);
        }
        HirStmt::Return { value, .. } => {
            if let Some(v) = value {
                collect_declared_mutability_in_expr(v, out);
            }
        }
        HirStmt::Break { .. } | HirStmt::Continue { .. } => {}
        HirStmt::Throw { value, .. } => collect_declared_mutability_in_expr(value, out),
        HirStmt::Try { body, catches, finally, .. } => {
            collect_declared_mutability_in_block(body, out);
            for c in catches {
                collect_declared_mutability_in_block(&c.body, out);
            }
            if let Some(f) = finally {
                collect_declared_mutability_in_block(f, out);
            }
        }
        HirStmt::Block { body, .. } => collect_declared_mutability_in_block(body, out),
    }
}

fn collect_declared_mutability_in_expr(expr: &HirExpr, out: &mut HashMap<String, bool>) {
    match expr {
        // A lambda's own bindings belong to its own function; its boxing
        // decisions are made independently when it is lowered.
        HirExpr::Lambda { .. } => {}
        HirExpr::Binary { left, right, .. } => {
            collect_declared_mutability_in_expr(left, out);
            collect_declared_mutability_in_expr(right, out);
        }
        HirExpr::Unary { operand, .. } => collect_declared_mutability_in_expr(operand, out),
        HirExpr::Call { callee, args, .. } => {
            collect_declared_mutability_in_expr(callee, out);
            for a in args {
                match a {
                    crate::hir::HirArg::Positional(e) | crate::hir::HirArg::Spread(e) => {
                        collect_declared_mutability_in_expr(e, out)
                    }
                }
            }
        }
        HirExpr::Member { receiver, .. } => collect_declared_mutability_in_expr(receiver, out),
        HirExpr::Index { receiver, index, .. } => {
            collect_declared_mutability_in_expr(receiver, out);
            collect_declared_mutability_in_expr(index, out);
        }
        HirExpr::If { condition, then_branch, else_branch, .. } => {
            collect_declared_mutability_in_expr(condition, out);
            collect_declared_mutability_in_expr(then_branch, out);
            if let Some(e) = else_branch {
                collect_declared_mutability_in_expr(e, out);
            }
        }
        HirExpr::When { subject, arms, .. } => {
            if let Some(s) = subject {
                collect_declared_mutability_in_expr(s, out);
            }
            for arm in arms {
                for c in &arm.conditions {
                    collect_declared_mutability_in_expr(c, out);
                }
                collect_declared_mutability_in_expr(&arm.body, out);
            }
        }
        HirExpr::Is { value, .. } | HirExpr::As { value, .. } => {
            collect_declared_mutability_in_expr(value, out)
        }
        HirExpr::CollectionLiteral { elements, .. } => {
            for el in elements {
                match el {
                    HirCollectionElement::Item(e) => collect_declared_mutability_in_expr(e, out),
                    HirCollectionElement::Entry { key, value } => {
                        collect_declared_mutability_in_expr(key, out);
                        collect_declared_mutability_in_expr(value, out);
                    }
                }
            }
        }
        HirExpr::StmtBlock { stmts, tail, .. } => {
            collect_declared_mutability_in_block(stmts, out);
            collect_declared_mutability_in_expr(tail, out);
        }
        HirExpr::Try { body, finally, .. } => {
            collect_declared_mutability_in_expr(body, out);
            collect_declared_mutability_in_block(finally, out);
        }
        HirExpr::IntLiteral { .. }
        | HirExpr::LongLiteral { .. }
        | HirExpr::DoubleLiteral { .. }
        | HirExpr::FloatLiteral { .. }
        | HirExpr::BoolLiteral { .. }
        | HirExpr::CharLiteral { .. }
        | HirExpr::NullLiteral { .. }
        | HirExpr::StringLiteral { .. }
        | HirExpr::Identifier { .. }
        | HirExpr::This { .. } => {}
    }
}

fn collect_lambda_frees_in_block(block: &HirBlock, out: &mut HashSet<String>) {
    for stmt in block {
        collect_lambda_frees_in_stmt(stmt, out);
    }
}

fn collect_lambda_frees_in_stmt(stmt: &HirStmt, out: &mut HashSet<String>) {
    match stmt {
        HirStmt::Expr(e) => collect_lambda_frees_in_expr(e, out),
        HirStmt::Let { value, .. } => collect_lambda_frees_in_expr(value, out),
        HirStmt::Assign { target, value, .. } => {
            collect_lambda_frees_in_expr(target, out);
            collect_lambda_frees_in_expr(value, out);
        }
        HirStmt::If { condition, then_branch, else_branch, .. } => {
            collect_lambda_frees_in_expr(condition, out);
            collect_lambda_frees_in_block(then_branch, out);
            if let Some(e) = else_branch {
                collect_lambda_frees_in_block(e, out);
            }
        }
        HirStmt::While { condition, body, .. } => {
            collect_lambda_frees_in_expr(condition, out);
            collect_lambda_frees_in_block(body, out);
        }
        HirStmt::DoWhile { body, condition, .. } => {
            collect_lambda_frees_in_block(body, out);
            collect_lambda_frees_in_expr(condition, out);
        }
        HirStmt::For { iterable, body, .. } => {
            collect_lambda_frees_in_expr(iterable, out);
            collect_lambda_frees_in_block(body, out);
        }
        HirStmt::Return { value, .. } => {
            if let Some(v) = value {
                collect_lambda_frees_in_expr(v, out);
            }
        }
        HirStmt::Break { .. } | HirStmt::Continue { .. } => {}
        HirStmt::Throw { value, .. } => collect_lambda_frees_in_expr(value, out),
        HirStmt::Try { body, catches, finally, .. } => {
            collect_lambda_frees_in_block(body, out);
            for c in catches {
                collect_lambda_frees_in_block(&c.body, out);
            }
            if let Some(f) = finally {
                collect_lambda_frees_in_block(f, out);
            }
        }
        HirStmt::Block { body, .. } => collect_lambda_frees_in_block(body, out),
    }
}

fn collect_lambda_frees_in_expr(expr: &HirExpr, out: &mut HashSet<String>) {
    match expr {
        HirExpr::Lambda { params, body, .. } => {
            out.extend(free_variables(params, body));
            // A lambda's own body may itself nest further lambdas; their
            // free variables matter too (a name captured two levels deep
            // still needs to survive as a box at the outermost `var`).
            collect_lambda_frees_in_block(body, out);
        }
        HirExpr::Binary { left, right, .. } => {
            collect_lambda_frees_in_expr(left, out);
            collect_lambda_frees_in_expr(right, out);
        }
        HirExpr::Unary { operand, .. } => collect_lambda_frees_in_expr(operand, out),
        HirExpr::Call { callee, args, .. } => {
            collect_lambda_frees_in_expr(callee, out);
            for a in args {
                match a {
                    crate::hir::HirArg::Positional(e) | crate::hir::HirArg::Spread(e) => {
                        collect_lambda_frees_in_expr(e, out)
                    }
                }
            }
        }
        HirExpr::Member { receiver, .. } => collect_lambda_frees_in_expr(receiver, out),
        HirExpr::Index { receiver, index, .. } => {
            collect_lambda_frees_in_expr(receiver, out);
            collect_lambda_frees_in_expr(index, out);
        }
        HirExpr::If { condition, then_branch, else_branch, .. } => {
            collect_lambda_frees_in_expr(condition, out);
            collect_lambda_frees_in_expr(then_branch, out);
            if let Some(e) = else_branch {
                collect_lambda_frees_in_expr(e, out);
            }
        }
        HirExpr::When { subject, arms, .. } => {
            if let Some(s) = subject {
                collect_lambda_frees_in_expr(s, out);
            }
            for arm in arms {
                for c in &arm.conditions {
                    collect_lambda_frees_in_expr(c, out);
                }
                collect_lambda_frees_in_expr(&arm.body, out);
            }
        }
        HirExpr::Is { value, .. } | HirExpr::As { value, .. } => {
            collect_lambda_frees_in_expr(value, out)
        }
        HirExpr::CollectionLiteral { elements, .. } => {
            for el in elements {
                match el {
                    HirCollectionElement::Item(e) => collect_lambda_frees_in_expr(e, out),
                    HirCollectionElement::Entry { key, value } => {
                        collect_lambda_frees_in_expr(key, out);
                        collect_lambda_frees_in_expr(value, out);
                    }
                }
            }
        }
        HirExpr::StmtBlock { stmts, tail, .. } => {
            collect_lambda_frees_in_block(stmts, out);
            collect_lambda_frees_in_expr(tail, out);
        }
        HirExpr::Try { body, finally, .. } => {
            collect_lambda_frees_in_expr(body, out);
            collect_lambda_frees_in_block(finally, out);
        }
        HirExpr::IntLiteral { .. }
        | HirExpr::LongLiteral { .. }
        | HirExpr::DoubleLiteral { .. }
        | HirExpr::FloatLiteral { .. }
        | HirExpr::BoolLiteral { .. }
        | HirExpr::CharLiteral { .. }
        | HirExpr::NullLiteral { .. }
        | HirExpr::StringLiteral { .. }
        | HirExpr::Identifier { .. }
        | HirExpr::This { .. } => {}
    }
}

fn walk_block(block: &HirBlock, bound: &mut HashSet<String>, free: &mut HashSet<String>) {
    // A fresh nested scope: names declared inside `block` must not leak
    // past it, but shadowing an outer name for the rest of this block is
    // fine, so restore exactly what was added once the block is done.
    let before: HashSet<String> = bound.clone();
    for stmt in block {
        walk_stmt(stmt, bound, free);
    }
    *bound = before;
}

fn walk_stmt(stmt: &HirStmt, bound: &mut HashSet<String>, free: &mut HashSet<String>) {
    match stmt {
        HirStmt::Expr(e) => walk_expr(e, bound, free),
        HirStmt::Let { name, value, .. } => {
            walk_expr(value, bound, free);
            bound.insert(name.clone());
        }
        HirStmt::Assign { target, value, .. } => {
            walk_expr(target, bound, free);
            walk_expr(value, bound, free);
        }
        HirStmt::If { condition, then_branch, else_branch, .. } => {
            walk_expr(condition, bound, free);
            walk_block(then_branch, bound, free);
            if let Some(e) = else_branch {
                walk_block(e, bound, free);
            }
        }
        HirStmt::While { condition, body, .. } => {
            walk_expr(condition, bound, free);
            walk_block(body, bound, free);
        }
        HirStmt::DoWhile { body, condition, .. } => {
            walk_block(body, bound, free);
            walk_expr(condition, bound, free);
        }
        HirStmt::For { variable, iterable, body, .. } => {
            walk_expr(iterable, bound, free);
            let before = bound.clone();
            bound.insert(variable.clone());
            walk_block(body, bound, free);
            *bound = before;
        }
        HirStmt::Return { value, .. } => {
            if let Some(v) = value {
                walk_expr(v, bound, free);
            }
        }
        HirStmt::Break { .. } | HirStmt::Continue { .. } => {}
        HirStmt::Throw { value, .. } => walk_expr(value, bound, free),
        HirStmt::Try { body, catches, finally, .. } => {
            walk_block(body, bound, free);
            for c in catches {
                let before = bound.clone();
                bound.insert(c.name.clone());
                walk_block(&c.body, bound, free);
                *bound = before;
            }
            if let Some(f) = finally {
                walk_block(f, bound, free);
            }
        }
        HirStmt::Block { body, .. } => walk_block(body, bound, free),
    }
}

fn walk_expr(expr: &HirExpr, bound: &mut HashSet<String>, free: &mut HashSet<String>) {
    match expr {
        HirExpr::Identifier { name, .. } => {
            if !bound.contains(name) {
                free.insert(name.clone());
            }
        }
        HirExpr::This { .. } => {}
        HirExpr::Lambda { params, body, .. } => {
            let before = bound.clone();
            for p in params {
                bound.insert(p.name.clone());
            }
            walk_block(body, bound, free);
            *bound = before;
        }
        HirExpr::Binary { left, right, .. } => {
            walk_expr(left, bound, free);
            walk_expr(right, bound, free);
        }
        HirExpr::Unary { operand, .. } => walk_expr(operand, bound, free),
        HirExpr::Call { callee, args, .. } => {
            walk_expr(callee, bound, free);
            for a in args {
                match a {
                    crate::hir::HirArg::Positional(e) | crate::hir::HirArg::Spread(e) => {
                        walk_expr(e, bound, free)
                    }
                }
            }
        }
        HirExpr::Member { receiver, .. } => walk_expr(receiver, bound, free),
        HirExpr::Index { receiver, index, .. } => {
            walk_expr(receiver, bound, free);
            walk_expr(index, bound, free);
        }
        HirExpr::If { condition, then_branch, else_branch, .. } => {
            walk_expr(condition, bound, free);
            walk_expr(then_branch, bound, free);
            if let Some(e) = else_branch {
                walk_expr(e, bound, free);
            }
        }
        HirExpr::When { subject, arms, .. } => {
            if let Some(s) = subject {
                walk_expr(s, bound, free);
            }
            for arm in arms {
                for c in &arm.conditions {
                    walk_expr(c, bound, free);
                }
                walk_expr(&arm.body, bound, free);
            }
        }
        HirExpr::Is { value, .. } | HirExpr::As { value, .. } => walk_expr(value, bound, free),
        HirExpr::CollectionLiteral { elements, .. } => {
            for el in elements {
                match el {
                    HirCollectionElement::Item(e) => walk_expr(e, bound, free),
                    HirCollectionElement::Entry { key, value } => {
                        walk_expr(key, bound, free);
                        walk_expr(value, bound, free);
                    }
                }
            }
        }
        HirExpr::StmtBlock { stmts, tail, .. } => {
            let before = bound.clone();
            walk_block(stmts, bound, free);
            walk_expr(tail, bound, free);
            *bound = before;
        }
        HirExpr::Try { body, finally, .. } => {
            walk_expr(body, bound, free);
            walk_block(finally, bound, free);
        }
        HirExpr::IntLiteral { .. }
        | HirExpr::LongLiteral { .. }
        | HirExpr::DoubleLiteral { .. }
        | HirExpr::FloatLiteral { .. }
        | HirExpr::BoolLiteral { .. }
        | HirExpr::CharLiteral { .. }
        | HirExpr::NullLiteral { .. }
        | HirExpr::StringLiteral { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use novalang_parser::parse;

    fn lower(source: &str) -> crate::hir::HirProgram {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors.errors());
        let result = Analyzer::new("test.nova", false).analyze(&program);
        crate::lower_hir::lower_program(&program, &result.types, "test.nova").unwrap()
    }

    #[test]
    fn lambda_capturing_outer_val_is_free() {
        let hir = lower("fun main() { val n = 1; val f = { x: Int -> x + n } }");
        let body = &hir.functions[0].body;
        let captured = names_captured_by_nested_lambdas(body);
        assert!(captured.contains("n"), "{captured:?}");
    }

    #[test]
    fn capturing_a_val_does_not_require_boxing() {
        let hir = lower("fun main() { val n = 1; val f = { x: Int -> x + n } }");
        let body = &hir.functions[0].body;
        let boxed = names_requiring_boxing(body);
        assert!(!boxed.contains("n"), "{boxed:?}");
    }

    #[test]
    fn capturing_a_var_requires_boxing() {
        let hir = lower("fun main() { var n = 1; val f = { x: Int -> x + n } }");
        let body = &hir.functions[0].body;
        let boxed = names_requiring_boxing(body);
        assert!(boxed.contains("n"), "{boxed:?}");
    }
}
