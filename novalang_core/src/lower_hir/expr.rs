//! Expression desugaring (§4.4): the thirteen-entry rewrite table, each
//! producing a `HirExpr::StmtBlock`/`HirExpr::If`/`HirExpr::Call`
//! equivalent of a construct that has no direct HIR node of its own.

use novalang_parser::ast::{
    BinaryOp, CollectionElement, CollectionKind, Expression, LambdaExpr, StringPart, UnaryOp,
};
use novalang_parser::span::Span;

use crate::analyzer::resolve_type_ref;
use crate::error::LoweringError;
use crate::hir::{
    HirArg, HirBinaryOp, HirCollectionElement, HirCollectionKind, HirExpr, HirParam, HirStmt,
    HirUnaryOp, HirWhenArm,
};
use crate::types::NovaType;

use super::stmt;
use super::LowerCtx;

pub fn lower_expr(expr: &Expression, ctx: &mut LowerCtx) -> Result<HirExpr, LoweringError> {
    match expr {
        Expression::IntLiteral { value, span } => Ok(HirExpr::IntLiteral { value: *value, span: *span }),
        Expression::LongLiteral { value, span } => Ok(HirExpr::LongLiteral { value: *value, span: *span }),
        Expression::DoubleLiteral { value, span } => Ok(HirExpr::DoubleLiteral { value: *value, span: *span }),
        Expression::FloatLiteral { value, span } => Ok(HirExpr::FloatLiteral { value: *value, span: *span }),
        Expression::BoolLiteral { value, span } => Ok(HirExpr::BoolLiteral { value: *value, span: *span }),
        Expression::CharLiteral { value, span } => Ok(HirExpr::CharLiteral { value: *value, span: *span }),
        Expression::NullLiteral { span } => Ok(HirExpr::NullLiteral { span: *span }),

        Expression::StringLiteral { parts, span } => lower_string_literal(parts, *span, ctx),

        Expression::Identifier { name, span } => Ok(HirExpr::Identifier {
            name: name.clone(),
            ty: ctx.expr_type(*span),
            span: *span,
        }),
        // `super` has no dedicated HIR node; it behaves like a name lookup
        // that method dispatch recognizes to skip virtual resolution.
        Expression::This { span } => Ok(HirExpr::This { ty: ctx.expr_type(*span), span: *span }),
        Expression::Super { span } => Ok(HirExpr::Identifier {
            name: "super".to_string(),
            ty: ctx.expr_type(*span),
            span: *span,
        }),

        Expression::Binary { op, left, right, span } => lower_binary(*op, left, right, *span, ctx),
        Expression::Unary { op, operand, span } => lower_unary(*op, operand, *span, ctx),

        Expression::Call {
            callee,
            positional_args,
            named_args,
            spread_positions,
            trailing_lambda,
            span,
            ..
        } => {
            if let Expression::Member { receiver, name, safe: true, .. } = callee.as_ref() {
                return lower_safe_call(
                    receiver,
                    name,
                    positional_args,
                    named_args,
                    spread_positions,
                    trailing_lambda,
                    *span,
                    ctx,
                );
            }
            let call_name = match callee.as_ref() {
                Expression::Identifier { name, .. } => Some(name.as_str()),
                Expression::Member { name, safe: false, .. } => Some(name.as_str()),
                _ => None,
            };
            let args = build_args(
                call_name,
                positional_args,
                named_args,
                spread_positions,
                trailing_lambda,
                ctx,
            )?;
            let callee_hir = lower_expr(callee, ctx)?;
            Ok(HirExpr::Call {
                callee: Box::new(callee_hir),
                args,
                ty: ctx.expr_type(*span),
                span: *span,
            })
        }

        Expression::Lambda(lambda) => lower_lambda_expr(lambda, ctx),

        Expression::Member { receiver, name, safe, span } => {
            if *safe {
                lower_safe_member(receiver, name, *span, ctx)
            } else {
                let receiver_hir = lower_expr(receiver, ctx)?;
                Ok(HirExpr::Member {
                    receiver: Box::new(receiver_hir),
                    name: name.clone(),
                    ty: ctx.expr_type(*span),
                    span: *span,
                })
            }
        }
        // `a[i]` always desugars to `a.get(i)` (§4.4): there is no dedicated
        // index instruction downstream, only method dispatch.
        Expression::Index { receiver, index, span } => {
            let receiver_hir = lower_expr(receiver, ctx)?;
            let index_hir = lower_expr(index, ctx)?;
            Ok(make_call(receiver_hir, "get", vec![index_hir], ctx.expr_type(*span), *span))
        }

        Expression::If { condition, then_branch, else_branch, span } => {
            let condition_hir = Box::new(lower_expr(condition, ctx)?);
            let then_hir = Box::new(lower_expr(then_branch, ctx)?);
            let else_hir = else_branch.as_ref().map(|e| lower_expr(e, ctx)).transpose()?.map(Box::new);
            Ok(HirExpr::If {
                condition: condition_hir,
                then_branch: then_hir,
                else_branch: else_hir,
                used_as_expression: true,
                ty: ctx.expr_type(*span),
                span: *span,
            })
        }
        Expression::When { subject, arms, span } => {
            let subject_hir = subject.as_ref().map(|s| lower_expr(s, ctx)).transpose()?.map(Box::new);
            let mut hir_arms = Vec::with_capacity(arms.len());
            for arm in arms {
                let conditions = arm
                    .conditions
                    .iter()
                    .map(|c| lower_expr(c, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                let body = lower_expr(&arm.body, ctx)?;
                hir_arms.push(HirWhenArm { conditions, body, span: arm.span });
            }
            Ok(HirExpr::When {
                subject: subject_hir,
                arms: hir_arms,
                ty: ctx.expr_type(*span),
                span: *span,
            })
        }

        Expression::Range { start, end, inclusive, span } => {
            let start_hir = lower_expr(start, ctx)?;
            let end_hir = lower_expr(end, ctx)?;
            Ok(HirExpr::Call {
                callee: Box::new(HirExpr::Identifier {
                    name: "Range".to_string(),
                    ty: NovaType::any(),
                    span: *span,
                }),
                args: vec![
                    HirArg::Positional(start_hir),
                    HirArg::Positional(end_hir),
                    HirArg::Positional(HirExpr::BoolLiteral { value: *inclusive, span: *span }),
                ],
                ty: ctx.expr_type(*span),
                span: *span,
            })
        }

        Expression::Elvis { left, right, span } => lower_elvis(left, right, *span, ctx),
        Expression::ErrorPropagation { inner, span } => lower_error_propagation(inner, *span, ctx),
        Expression::NotNullAssert { inner, span } => {
            let inner_hir = lower_expr(inner, ctx)?;
            Ok(HirExpr::Call {
                callee: Box::new(HirExpr::Identifier {
                    name: "requireNotNull".to_string(),
                    ty: NovaType::any(),
                    span: *span,
                }),
                args: vec![HirArg::Positional(inner_hir)],
                ty: ctx.expr_type(*span),
                span: *span,
            })
        }

        Expression::Is { value, type_ref, negated, span } => {
            let value_hir = lower_expr(value, ctx)?;
            Ok(HirExpr::Is {
                value: Box::new(value_hir),
                type_ref: resolve_type_ref(Some(type_ref)),
                negated: *negated,
                span: *span,
            })
        }
        Expression::As { value, type_ref, nullable, span } => {
            let value_hir = lower_expr(value, ctx)?;
            Ok(HirExpr::As {
                value: Box::new(value_hir),
                target_type: resolve_type_ref(Some(type_ref)),
                nullable: *nullable,
                span: *span,
            })
        }
        Expression::In { value, range, negated, span } => {
            let value_hir = lower_expr(value, ctx)?;
            let range_hir = lower_expr(range, ctx)?;
            let call = make_call(range_hir, "contains", vec![value_hir], NovaType::boolean(), *span);
            if *negated {
                Ok(HirExpr::Unary {
                    op: HirUnaryOp::Not,
                    operand: Box::new(call),
                    ty: NovaType::boolean(),
                    span: *span,
                })
            } else {
                Ok(call)
            }
        }

        Expression::CollectionLiteral { kind, elements, span } => {
            let hir_kind = match kind {
                CollectionKind::List => HirCollectionKind::List,
                CollectionKind::Set => HirCollectionKind::Set,
                CollectionKind::Map => HirCollectionKind::Map,
            };
            let mut hir_elements = Vec::with_capacity(elements.len());
            for el in elements {
                match el {
                    CollectionElement::Item(e) => {
                        hir_elements.push(HirCollectionElement::Item(lower_expr(e, ctx)?));
                    }
                    // Spread-into-literal has no dedicated HIR representation;
                    // the spread expression is carried through as a single
                    // element so a later pass can flatten it.
                    CollectionElement::Spread(e) => {
                        hir_elements.push(HirCollectionElement::Item(lower_expr(e, ctx)?));
                    }
                    CollectionElement::Entry { key, value } => {
                        hir_elements.push(HirCollectionElement::Entry {
                            key: lower_expr(key, ctx)?,
                            value: lower_expr(value, ctx)?,
                        });
                    }
                }
            }
            Ok(HirExpr::CollectionLiteral {
                kind: hir_kind,
                elements: hir_elements,
                ty: ctx.expr_type(*span),
                span: *span,
            })
        }

        Expression::Use { resource, body, span } => lower_use(resource, body, *span, ctx),

        // Annotations carry no codegen obligation of their own; only the
        // wrapped expression survives into HIR.
        Expression::Annotated { inner, .. } => lower_expr(inner, ctx),
    }
}

fn lower_string_literal(parts: &[StringPart], span: Span, ctx: &mut LowerCtx) -> Result<HirExpr, LoweringError> {
    if let [StringPart::Text(text)] = parts {
        return Ok(HirExpr::StringLiteral { value: text.clone(), span });
    }
    if parts.is_empty() {
        return Ok(HirExpr::StringLiteral { value: String::new(), span });
    }
    let mut pieces = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            StringPart::Text(text) => pieces.push(HirExpr::StringLiteral { value: text.clone(), span }),
            StringPart::Interpolated(inner) => {
                let inner_hir = lower_expr(inner, ctx)?;
                let inner_ty = inner_hir.ty().clone();
                if inner_ty == NovaType::string() {
                    pieces.push(inner_hir);
                } else {
                    pieces.push(make_call(inner_hir, "toString", vec![], NovaType::string(), span));
                }
            }
        }
    }
    let mut iter = pieces.into_iter();
    let mut acc = iter.next().expect("at least one piece");
    for piece in iter {
        acc = HirExpr::Binary {
            op: HirBinaryOp::Add,
            left: Box::new(acc),
            right: Box::new(piece),
            ty: NovaType::string(),
            span,
        };
    }
    Ok(acc)
}

fn lower_binary(
    op: BinaryOp,
    left: &Expression,
    right: &Expression,
    span: Span,
    ctx: &mut LowerCtx,
) -> Result<HirExpr, LoweringError> {
    let lhs = lower_expr(left, ctx)?;
    let rhs = lower_expr(right, ctx)?;
    let ty = ctx.expr_type(span);

    if matches!(op, BinaryOp::RefEq | BinaryOp::NotRefEq) {
        let call = make_call(lhs, "refEquals", vec![rhs], NovaType::boolean(), span);
        return if op == BinaryOp::NotRefEq {
            Ok(HirExpr::Unary { op: HirUnaryOp::Not, operand: Box::new(call), ty: NovaType::boolean(), span })
        } else {
            Ok(call)
        };
    }

    let lhs_is_class = matches!(lhs.ty(), NovaType::Class { .. });
    if lhs_is_class {
        if let Some(method) = arithmetic_overload_name(op) {
            return Ok(make_call(lhs, method, vec![rhs], ty, span));
        }
    }

    Ok(HirExpr::Binary {
        op: map_binary_op(op),
        left: Box::new(lhs),
        right: Box::new(rhs),
        ty,
        span,
    })
}

fn lower_unary(op: UnaryOp, operand: &Expression, span: Span, ctx: &mut LowerCtx) -> Result<HirExpr, LoweringError> {
    let operand_hir = lower_expr(operand, ctx)?;
    let ty = ctx.expr_type(span);
    if op == UnaryOp::Neg && matches!(operand_hir.ty(), NovaType::Class { .. }) {
        return Ok(make_call(operand_hir, "unaryMinus", vec![], ty, span));
    }
    Ok(HirExpr::Unary { op: map_unary_op(op), operand: Box::new(operand_hir), ty, span })
}

fn lower_elvis(left: &Expression, right: &Expression, span: Span, ctx: &mut LowerCtx) -> Result<HirExpr, LoweringError> {
    let left_hir = lower_expr(left, ctx)?;
    let left_ty = left_hir.ty().clone();
    let temp = ctx.fresh_temp();
    let let_stmt = HirStmt::Let {
        name: temp.clone(),
        ty: left_ty.clone(),
        is_mutable: false,
        value: left_hir,
        span: left.span(),
    };
    let right_hir = lower_expr(right, ctx)?;
    let ty = ctx.expr_type(span);
    let if_expr = HirExpr::If {
        condition: Box::new(HirExpr::Binary {
            op: HirBinaryOp::NotEq,
            left: Box::new(HirExpr::Identifier { name: temp.clone(), ty: left_ty.clone(), span }),
            right: Box::new(HirExpr::NullLiteral { span }),
            ty: NovaType::boolean(),
            span,
        }),
        then_branch: Box::new(HirExpr::Identifier { name: temp, ty: left_ty.strip_nullable().clone(), span }),
        else_branch: Some(Box::new(right_hir)),
        used_as_expression: true,
        ty: ty.clone(),
        span,
    };
    Ok(HirExpr::StmtBlock { stmts: vec![let_stmt], tail: Box::new(if_expr), ty, span })
}

/// `expr?` (§4.4): bind to a temp, re-throw (as a `return`) when it is not
/// an `Ok`, otherwise unwrap `.value`.
fn lower_error_propagation(inner: &Expression, span: Span, ctx: &mut LowerCtx) -> Result<HirExpr, LoweringError> {
    let inner_hir = lower_expr(inner, ctx)?;
    let inner_ty = inner_hir.ty().clone();
    let temp = ctx.fresh_temp();
    let let_stmt = HirStmt::Let {
        name: temp.clone(),
        ty: inner_ty.clone(),
        is_mutable: false,
        value: inner_hir,
        span: inner.span(),
    };
    let guard = HirStmt::If {
        condition: HirExpr::Is {
            value: Box::new(HirExpr::Identifier { name: temp.clone(), ty: inner_ty.clone(), span }),
            type_ref: NovaType::Class { qualified_name: "Ok".to_string(), type_args: vec![] },
            negated: true,
            span,
        },
        then_branch: vec![HirStmt::Return {
            value: Some(HirExpr::Identifier { name: temp.clone(), ty: inner_ty.clone(), span }),
            span,
        }],
        else_branch: None,
        span,
    };
    let ty = ctx.expr_type(span);
    let tail = HirExpr::Member {
        receiver: Box::new(HirExpr::Identifier { name: temp, ty: inner_ty, span }),
        name: "value".to_string(),
        ty: ty.clone(),
        span,
    };
    Ok(HirExpr::StmtBlock { stmts: vec![let_stmt, guard], tail: Box::new(tail), ty, span })
}

/// `a?.m(x)` (§4.4): `if (a == null) null else a.m(x)`, with `a` bound once
/// so the receiver is evaluated exactly one time.
#[allow(clippy::too_many_arguments)]
fn lower_safe_call(
    receiver: &Expression,
    name: &str,
    positional_args: &[Expression],
    named_args: &[(String, Expression)],
    spread_positions: &[usize],
    trailing_lambda: &Option<Box<LambdaExpr>>,
    span: Span,
    ctx: &mut LowerCtx,
) -> Result<HirExpr, LoweringError> {
    let receiver_hir = lower_expr(receiver, ctx)?;
    let receiver_ty = receiver_hir.ty().clone();
    let temp = ctx.fresh_temp();
    let let_stmt = HirStmt::Let {
        name: temp.clone(),
        ty: receiver_ty.clone(),
        is_mutable: false,
        value: receiver_hir,
        span: receiver.span(),
    };
    let args = build_args(Some(name), positional_args, named_args, spread_positions, trailing_lambda, ctx)?;
    let call_ty = ctx.expr_type(span);
    let call_expr = HirExpr::Call {
        callee: Box::new(HirExpr::Member {
            receiver: Box::new(HirExpr::Identifier {
                name: temp.clone(),
                ty: receiver_ty.strip_nullable().clone(),
                span,
            }),
            name: name.to_string(),
            ty: NovaType::any(),
            span,
        }),
        args,
        ty: call_ty.clone(),
        span,
    };
    let result_ty = NovaType::nullable(call_ty);
    let if_expr = HirExpr::If {
        condition: Box::new(HirExpr::Binary {
            op: HirBinaryOp::NotEq,
            left: Box::new(HirExpr::Identifier { name: temp, ty: receiver_ty, span }),
            right: Box::new(HirExpr::NullLiteral { span }),
            ty: NovaType::boolean(),
            span,
        }),
        then_branch: Box::new(call_expr),
        else_branch: Some(Box::new(HirExpr::NullLiteral { span })),
        used_as_expression: true,
        ty: result_ty.clone(),
        span,
    };
    Ok(HirExpr::StmtBlock { stmts: vec![let_stmt], tail: Box::new(if_expr), ty: result_ty, span })
}

fn lower_safe_member(receiver: &Expression, name: &str, span: Span, ctx: &mut LowerCtx) -> Result<HirExpr, LoweringError> {
    let receiver_hir = lower_expr(receiver, ctx)?;
    let receiver_ty = receiver_hir.ty().clone();
    let temp = ctx.fresh_temp();
    let let_stmt = HirStmt::Let {
        name: temp.clone(),
        ty: receiver_ty.clone(),
        is_mutable: false,
        value: receiver_hir,
        span: receiver.span(),
    };
    let member_ty = ctx.expr_type(span);
    let result_ty = NovaType::nullable(member_ty.clone());
    let if_expr = HirExpr::If {
        condition: Box::new(HirExpr::Binary {
            op: HirBinaryOp::NotEq,
            left: Box::new(HirExpr::Identifier { name: temp.clone(), ty: receiver_ty.clone(), span }),
            right: Box::new(HirExpr::NullLiteral { span }),
            ty: NovaType::boolean(),
            span,
        }),
        then_branch: Box::new(HirExpr::Member {
            receiver: Box::new(HirExpr::Identifier { name: temp, ty: receiver_ty.strip_nullable().clone(), span }),
            name: name.to_string(),
            ty: member_ty,
            span,
        }),
        else_branch: Some(Box::new(HirExpr::NullLiteral { span })),
        used_as_expression: true,
        ty: result_ty.clone(),
        span,
    };
    Ok(HirExpr::StmtBlock { stmts: vec![let_stmt], tail: Box::new(if_expr), ty: result_ty, span })
}

/// `use (resource) { body }` (§4.4): the resource is bound once so its
/// `.close()` runs in a `finally` regardless of how `body` exits.
fn lower_use(resource: &Expression, body: &[novalang_parser::ast::Statement], span: Span, ctx: &mut LowerCtx) -> Result<HirExpr, LoweringError> {
    let resource_hir = lower_expr(resource, ctx)?;
    let resource_ty = resource_hir.ty().clone();
    let temp = ctx.fresh_temp();
    let let_stmt = HirStmt::Let {
        name: temp.clone(),
        ty: resource_ty.clone(),
        is_mutable: false,
        value: resource_hir,
        span: resource.span(),
    };
    let body_expr = super::lower_block_as_expr(body, span, ctx)?;
    let ty = body_expr.ty().clone();
    let close_call = make_call(
        HirExpr::Identifier { name: temp, ty: resource_ty, span },
        "close",
        vec![],
        NovaType::unit(),
        span,
    );
    let try_expr = HirExpr::Try {
        body: Box::new(body_expr),
        finally: vec![HirStmt::Expr(close_call)],
        ty: ty.clone(),
        span,
    };
    Ok(HirExpr::StmtBlock { stmts: vec![let_stmt], tail: Box::new(try_expr), ty, span })
}

fn lower_lambda_expr(lambda: &LambdaExpr, ctx: &mut LowerCtx) -> Result<HirExpr, LoweringError> {
    let params = lambda
        .params
        .iter()
        .map(|p| HirParam {
            name: p.name.clone(),
            ty: resolve_type_ref(p.type_annotation.as_ref()),
            default_value: None,
            is_vararg: false,
            span: p.span,
        })
        .collect();
    let body = stmt::lower_block(&lambda.body, ctx)?;
    Ok(HirExpr::Lambda { params, body, ty: ctx.expr_type(lambda.span), span: lambda.span })
}

/// Resolve named/default/spread/trailing-lambda arguments down to a single
/// positional `HirArg` list (§4.4 "Named-argument call" / "Lambda with
/// default-arg"). `call_name` is consulted against every known function and
/// method signature collected up front; when it is absent, unknown, or the
/// call uses a spread, arguments are passed through positionally without
/// reordering.
fn build_args(
    call_name: Option<&str>,
    positional_args: &[Expression],
    named_args: &[(String, Expression)],
    spread_positions: &[usize],
    trailing_lambda: &Option<Box<LambdaExpr>>,
    ctx: &mut LowerCtx,
) -> Result<Vec<HirArg>, LoweringError> {
    let lowered_positional = positional_args
        .iter()
        .map(|a| lower_expr(a, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    let mut lowered_named = Vec::with_capacity(named_args.len());
    for (name, value) in named_args {
        lowered_named.push((name.clone(), lower_expr(value, ctx)?));
    }
    let lowered_lambda = match trailing_lambda {
        Some(l) => Some(lower_lambda_expr(l, ctx)?),
        None => None,
    };

    if spread_positions.is_empty() {
        if let Some(sig) = call_name.and_then(|n| ctx.signatures.get(n)).cloned() {
            let params: Vec<&HirParam> = sig.params.iter().filter(|p| p.name != "this").collect();
            if !params.is_empty() || (lowered_positional.is_empty() && lowered_named.is_empty()) {
                let mut slots: Vec<Option<HirExpr>> = vec![None; params.len()];
                for (i, value) in lowered_positional.into_iter().enumerate() {
                    if i < slots.len() {
                        slots[i] = Some(value);
                    }
                }
                for (name, value) in lowered_named {
                    if let Some(idx) = params.iter().position(|p| p.name == name) {
                        slots[idx] = Some(value);
                    }
                }
                if let Some(lambda) = lowered_lambda {
                    if let Some(last) = slots.last_mut() {
                        *last = Some(lambda);
                    }
                } else {
                    for (idx, slot) in slots.iter_mut().enumerate() {
                        if slot.is_none() {
                            *slot = params[idx].default_value.clone();
                        }
                    }
                }
                return Ok(slots
                    .into_iter()
                    .map(|s| HirArg::Positional(s.unwrap_or(HirExpr::NullLiteral { span: Span::empty() })))
                    .collect());
            }
        }
    }

    let mut args: Vec<HirArg> = lowered_positional
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            if spread_positions.contains(&i) {
                HirArg::Spread(e)
            } else {
                HirArg::Positional(e)
            }
        })
        .collect();
    args.extend(lowered_named.into_iter().map(|(_, e)| HirArg::Positional(e)));
    if let Some(lambda) = lowered_lambda {
        args.push(HirArg::Positional(lambda));
    }
    Ok(args)
}

fn make_call(receiver: HirExpr, method: &str, args: Vec<HirExpr>, ty: NovaType, span: Span) -> HirExpr {
    HirExpr::Call {
        callee: Box::new(HirExpr::Member {
            receiver: Box::new(receiver),
            name: method.to_string(),
            ty: NovaType::any(),
            span,
        }),
        args: args.into_iter().map(HirArg::Positional).collect(),
        ty,
        span,
    }
}

fn arithmetic_overload_name(op: BinaryOp) -> Option<&'static str> {
    match op {
        BinaryOp::Add => Some("plus"),
        BinaryOp::Sub => Some("minus"),
        BinaryOp::Mul => Some("times"),
        BinaryOp::Div => Some("div"),
        BinaryOp::Rem => Some("rem"),
        _ => None,
    }
}

fn map_binary_op(op: BinaryOp) -> HirBinaryOp {
    match op {
        BinaryOp::Add => HirBinaryOp::Add,
        BinaryOp::Sub => HirBinaryOp::Sub,
        BinaryOp::Mul => HirBinaryOp::Mul,
        BinaryOp::Div => HirBinaryOp::Div,
        BinaryOp::Rem => HirBinaryOp::Rem,
        BinaryOp::Eq => HirBinaryOp::Eq,
        BinaryOp::NotEq => HirBinaryOp::NotEq,
        BinaryOp::RefEq => HirBinaryOp::RefEq,
        BinaryOp::NotRefEq => HirBinaryOp::NotRefEq,
        BinaryOp::Lt => HirBinaryOp::Lt,
        BinaryOp::LtEq => HirBinaryOp::LtEq,
        BinaryOp::Gt => HirBinaryOp::Gt,
        BinaryOp::GtEq => HirBinaryOp::GtEq,
        BinaryOp::And => HirBinaryOp::And,
        BinaryOp::Or => HirBinaryOp::Or,
        BinaryOp::BitAnd => HirBinaryOp::BitAnd,
        BinaryOp::BitOr => HirBinaryOp::BitOr,
        BinaryOp::BitXor => HirBinaryOp::BitXor,
        BinaryOp::Shl => HirBinaryOp::Shl,
        BinaryOp::Shr => HirBinaryOp::Shr,
    }
}

fn map_unary_op(op: UnaryOp) -> HirUnaryOp {
    match op {
        UnaryOp::Plus => HirUnaryOp::Plus,
        UnaryOp::Neg => HirUnaryOp::Neg,
        UnaryOp::Not => HirUnaryOp::Not,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use novalang_parser::parse;

    fn lower_fn_body(source: &str) -> Vec<HirStmt> {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors.errors());
        let result = Analyzer::new("test.nova", false).analyze(&program);
        let hir = super::super::lower_program(&program, &result.types, "test.nova").unwrap();
        hir.functions[0].body.clone()
    }

    #[test]
    fn ref_eq_desugars_to_ref_equals_call() {
        let body = lower_fn_body("fun main() { val a = 1; val b = 1; a === b }");
        assert!(matches!(body[2], HirStmt::Expr(HirExpr::Call { .. })));
    }

    #[test]
    fn error_propagation_produces_stmt_block() {
        let body = lower_fn_body("fun f(): Int { return ok()? }");
        // `return <stmt-block>` — just assert it lowers without panicking
        // and produces a Return statement.
        assert!(matches!(body[0], HirStmt::Return { .. }));
    }

    #[test]
    fn string_interpolation_single_text_part_stays_literal() {
        let body = lower_fn_body(r#"fun main() { "hello" }"#);
        assert!(matches!(body[0], HirStmt::Expr(HirExpr::StringLiteral { .. })));
    }
}
