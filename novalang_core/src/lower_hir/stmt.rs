//! Statement lowering (§4.4): mostly a structural walk, with the
//! destructuring-declaration and indexed-assignment desugaring rules
//! folded in (`val (a, b) = p` → `component1()`/`component2()`, `a[i] = v`
//! → `a.set(i, v)`).

use novalang_parser::ast::{
    AssignOp, AssignmentStmt, Declaration, DoWhileStmt, Expression, ForStmt, IfStmt, Statement,
    TryStmt, WhileStmt,
};

use crate::analyzer::resolve_type_ref;
use crate::error::LoweringError;
use crate::hir::{HirBinaryOp, HirBlock, HirCatch, HirExpr, HirStmt};
use crate::types::NovaType;

use super::expr::lower_expr;
use super::LowerCtx;

pub fn lower_block(stmts: &[Statement], ctx: &mut LowerCtx) -> Result<HirBlock, LoweringError> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        out.extend(lower_stmt(stmt, ctx)?);
    }
    Ok(out)
}

/// Lower a single `Statement`, used where the AST only allows one
/// statement (e.g. an unbraced `if`/`while` body) without wrapping it in
/// an extra `HirStmt::Block` when it is already a block.
fn lower_as_block(stmt: &Statement, ctx: &mut LowerCtx) -> Result<HirBlock, LoweringError> {
    match stmt {
        Statement::Block { body, .. } => lower_block(body, ctx),
        other => lower_stmt(other, ctx),
    }
}

pub(crate) fn lower_stmt(stmt: &Statement, ctx: &mut LowerCtx) -> Result<Vec<HirStmt>, LoweringError> {
    match stmt {
        Statement::Expression(e) => Ok(vec![HirStmt::Expr(lower_expr(e, ctx)?)]),

        Statement::Declaration(Declaration::Property(p)) => {
            let ty = if p.type_annotation.is_some() {
                resolve_type_ref(p.type_annotation.as_ref())
            } else {
                p.initializer
                    .as_ref()
                    .map(|init| ctx.expr_type(init.span()))
                    .unwrap_or_else(NovaType::any)
            };
            let value = match &p.initializer {
                Some(init) => lower_expr(init, ctx)?,
                None => HirExpr::NullLiteral { span: p.span },
            };
            Ok(vec![HirStmt::Let {
                name: p.name.clone(),
                ty,
                is_mutable: p.is_var,
                value,
                span: p.span,
            }])
        }

        Statement::Declaration(Declaration::Destructuring(d)) => lower_destructuring(d, ctx),

        // Local class/function/interface/object/enum declarations and
        // nested import/init-block statements carry no HIR lowering of
        // their own in this core.
        Statement::Declaration(_) => Ok(vec![]),

        Statement::Assignment(assign) => lower_assignment(assign, ctx),

        Statement::If(IfStmt { condition, then_branch, else_branch, span }) => {
            let condition_hir = lower_expr(condition, ctx)?;
            let then_hir = lower_as_block(then_branch, ctx)?;
            let else_hir = match else_branch {
                Some(e) => Some(lower_as_block(e, ctx)?),
                None => None,
            };
            Ok(vec![HirStmt::If { condition: condition_hir, then_branch: then_hir, else_branch: else_hir, span: *span }])
        }

        Statement::While(WhileStmt { label, condition, body, span }) => {
            let condition_hir = lower_expr(condition, ctx)?;
            let body_hir = lower_as_block(body, ctx)?;
            Ok(vec![HirStmt::While { label: label.clone(), condition: condition_hir, body: body_hir, span: *span }])
        }

        Statement::DoWhile(DoWhileStmt { label, body, condition, span }) => {
            let body_hir = lower_as_block(body, ctx)?;
            let condition_hir = lower_expr(condition, ctx)?;
            Ok(vec![HirStmt::DoWhile { label: label.clone(), body: body_hir, condition: condition_hir, span: *span }])
        }

        Statement::For(ForStmt { label, variable, iterable, body, span }) => {
            let iterable_hir = lower_expr(iterable, ctx)?;
            let body_hir = lower_as_block(body, ctx)?;
            Ok(vec![HirStmt::For {
                label: label.clone(),
                variable: variable.clone(),
                iterable: iterable_hir,
                body: body_hir,
                span: *span,
            }])
        }

        Statement::Return { value, span } => {
            let value_hir = value.as_ref().map(|v| lower_expr(v, ctx)).transpose()?;
            Ok(vec![HirStmt::Return { value: value_hir, span: *span }])
        }
        Statement::Break { label, span } => Ok(vec![HirStmt::Break { label: label.clone(), span: *span }]),
        Statement::Continue { label, span } => Ok(vec![HirStmt::Continue { label: label.clone(), span: *span }]),
        Statement::Throw { value, span } => {
            let value_hir = lower_expr(value, ctx)?;
            Ok(vec![HirStmt::Throw { value: value_hir, span: *span }])
        }

        Statement::Try(TryStmt { body, catches, finally, span }) => {
            let body_hir = lower_block(body, ctx)?;
            let mut hir_catches = Vec::with_capacity(catches.len());
            for c in catches {
                hir_catches.push(HirCatch {
                    name: c.name.clone(),
                    exception_type: resolve_type_ref(Some(&c.exception_type)),
                    body: lower_block(&c.body, ctx)?,
                    span: c.span,
                });
            }
            let finally_hir = match finally {
                Some(f) => Some(lower_block(f, ctx)?),
                None => None,
            };
            Ok(vec![HirStmt::Try { body: body_hir, catches: hir_catches, finally: finally_hir, span: *span }])
        }

        Statement::Block { body, span } => Ok(vec![HirStmt::Block { body: lower_block(body, ctx)?, span: *span }]),
    }
}

/// `val (a, b) = p` (§4.4): bind the initializer once, then one `let` per
/// binding via `componentN()`, except when the initializer's type is a map
/// entry, which instead destructures via `.key`/`.value`.
fn lower_destructuring(d: &novalang_parser::ast::DestructuringDecl, ctx: &mut LowerCtx) -> Result<Vec<HirStmt>, LoweringError> {
    let init_hir = lower_expr(&d.initializer, ctx)?;
    let init_ty = init_hir.ty().clone();
    let temp = ctx.fresh_temp();
    let mut out = vec![HirStmt::Let {
        name: temp.clone(),
        ty: init_ty.clone(),
        is_mutable: false,
        value: init_hir,
        span: d.span,
    }];

    let is_map_entry = matches!(
        init_ty.strip_nullable(),
        NovaType::Class { qualified_name, .. } if qualified_name == "MapEntry" || qualified_name == "Entry"
    );

    for (i, name) in d.bindings.iter().enumerate() {
        let accessor = if is_map_entry {
            match i {
                0 => "key".to_string(),
                1 => "value".to_string(),
                n => format!("component{}", n + 1),
            }
        } else {
            format!("component{}", i + 1)
        };
        let receiver = HirExpr::Identifier { name: temp.clone(), ty: init_ty.strip_nullable().clone(), span: d.span };
        let value = HirExpr::Call {
            callee: Box::new(HirExpr::Member {
                receiver: Box::new(receiver),
                name: accessor,
                ty: NovaType::any(),
                span: d.span,
            }),
            args: vec![],
            ty: NovaType::any(),
            span: d.span,
        };
        out.push(HirStmt::Let {
            name: name.clone(),
            ty: NovaType::any(),
            is_mutable: d.is_var,
            value,
            span: d.span,
        });
    }
    Ok(out)
}

/// `a[i] = v` (§4.4) rewrites to `a.set(i, v)`; compound assignment
/// (`+=` etc.) first reads the current value (via the target expression,
/// or `a.get(i)` for an indexed target) before applying the operator.
fn lower_assignment(assign: &AssignmentStmt, ctx: &mut LowerCtx) -> Result<Vec<HirStmt>, LoweringError> {
    if let Expression::Index { receiver, index, span } = &assign.target {
        let receiver_hir = lower_expr(receiver, ctx)?;
        let index_hir = lower_expr(index, ctx)?;
        let value_hir = lower_expr(&assign.value, ctx)?;
        let element_ty = ctx.expr_type(*span);
        let final_value = if assign.op == AssignOp::Assign {
            value_hir
        } else {
            let current = HirExpr::Call {
                callee: Box::new(HirExpr::Member {
                    receiver: Box::new(clone_expr(&receiver_hir)),
                    name: "get".to_string(),
                    ty: NovaType::any(),
                    span: *span,
                }),
                args: vec![crate::hir::HirArg::Positional(clone_expr(&index_hir))],
                ty: element_ty.clone(),
                span: *span,
            };
            HirExpr::Binary {
                op: map_compound_op(assign.op),
                left: Box::new(current),
                right: Box::new(value_hir),
                ty: element_ty,
                span: *span,
            }
        };
        let set_call = HirExpr::Call {
            callee: Box::new(HirExpr::Member {
                receiver: Box::new(receiver_hir),
                name: "set".to_string(),
                ty: NovaType::any(),
                span: *span,
            }),
            args: vec![
                crate::hir::HirArg::Positional(index_hir),
                crate::hir::HirArg::Positional(final_value),
            ],
            ty: NovaType::unit(),
            span: *span,
        };
        return Ok(vec![HirStmt::Expr(set_call)]);
    }

    let target_hir = lower_expr(&assign.target, ctx)?;
    let value_hir = lower_expr(&assign.value, ctx)?;
    let final_value = if assign.op == AssignOp::Assign {
        value_hir
    } else {
        let ty = target_hir.ty().clone();
        HirExpr::Binary {
            op: map_compound_op(assign.op),
            left: Box::new(clone_expr(&target_hir)),
            right: Box::new(value_hir),
            ty,
            span: assign.span,
        }
    };
    Ok(vec![HirStmt::Assign { target: target_hir, value: final_value, span: assign.span }])
}

fn map_compound_op(op: AssignOp) -> HirBinaryOp {
    match op {
        AssignOp::Assign => unreachable!("Assign has no binary equivalent"),
        AssignOp::AddAssign => HirBinaryOp::Add,
        AssignOp::SubAssign => HirBinaryOp::Sub,
        AssignOp::MulAssign => HirBinaryOp::Mul,
        AssignOp::DivAssign => HirBinaryOp::Div,
        AssignOp::RemAssign => HirBinaryOp::Rem,
    }
}

/// `HirExpr` is used by value everywhere else; compound assignment is the
/// one place the same sub-expression (the target) is needed twice (to read
/// the current value, then to receive the written one), so it is cloned
/// structurally rather than re-lowered.
fn clone_expr(expr: &HirExpr) -> HirExpr {
    expr.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use novalang_parser::parse;

    fn lower_fn_body(source: &str) -> HirBlock {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors.errors());
        let result = Analyzer::new("test.nova", false).analyze(&program);
        let hir = super::super::lower_program(&program, &result.types, "test.nova").unwrap();
        hir.functions[0].body.clone()
    }

    #[test]
    fn destructuring_declaration_produces_component_calls() {
        let body = lower_fn_body("fun main() { val (a, b) = pair() }");
        assert!(body.len() >= 3, "{body:?}");
        assert!(matches!(body[0], HirStmt::Let { .. }));
        assert!(matches!(body[1], HirStmt::Let { .. }));
        assert!(matches!(body[2], HirStmt::Let { .. }));
    }

    #[test]
    fn indexed_assignment_desugars_to_set_call() {
        let body = lower_fn_body("fun main() { val a = list(); a[0] = 1 }");
        assert!(matches!(body.last().unwrap(), HirStmt::Expr(HirExpr::Call { .. })));
    }

    #[test]
    fn compound_assignment_reads_then_writes() {
        let body = lower_fn_body("fun main() { var x = 1; x += 2 }");
        assert!(matches!(body[1], HirStmt::Assign { .. }));
    }
}
