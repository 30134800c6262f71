//! The default HIR-level passes (§4.6): inline-expansion, constant-
//! folding, dead-code-elimination, each a plain function over the tree
//! rather than a visitor-pattern object (§9 "Visitor hierarchies").

use std::collections::HashMap;

use crate::hir::{
    HirArg, HirBinaryOp, HirBlock, HirClass, HirCollectionElement, HirExpr, HirFunction,
    HirProgram, HirStmt, HirUnaryOp,
};

use super::{Analysis, HirPass};

/// Bottom-up rewrite of every `HirExpr` in `expr`: children are
/// transformed first, then `f` is applied to the reconstructed node.
/// Stops descending into a lambda's body only at the call sites that
/// need that (inline-expansion's parameter substitution); every other
/// pass recurses through lambdas uniformly.
fn map_expr(expr: HirExpr, f: &impl Fn(HirExpr) -> HirExpr) -> HirExpr {
    let rebuilt = match expr {
        HirExpr::Binary { op, left, right, ty, span } => HirExpr::Binary {
            op,
            left: Box::new(map_expr(*left, f)),
            right: Box::new(map_expr(*right, f)),
            ty,
            span,
        },
        HirExpr::Unary { op, operand, ty, span } => HirExpr::Unary {
            op,
            operand: Box::new(map_expr(*operand, f)),
            ty,
            span,
        },
        HirExpr::Call { callee, args, ty, span } => HirExpr::Call {
            callee: Box::new(map_expr(*callee, f)),
            args: args.into_iter().map(|a| map_arg(a, f)).collect(),
            ty,
            span,
        },
        HirExpr::Lambda { params, body, ty, span } => HirExpr::Lambda {
            params,
            body: map_block(body, f),
            ty,
            span,
        },
        HirExpr::Member { receiver, name, ty, span } => HirExpr::Member {
            receiver: Box::new(map_expr(*receiver, f)),
            name,
            ty,
            span,
        },
        HirExpr::Index { receiver, index, ty, span } => HirExpr::Index {
            receiver: Box::new(map_expr(*receiver, f)),
            index: Box::new(map_expr(*index, f)),
            ty,
            span,
        },
        HirExpr::If { condition, then_branch, else_branch, used_as_expression, ty, span } => HirExpr::If {
            condition: Box::new(map_expr(*condition, f)),
            then_branch: Box::new(map_expr(*then_branch, f)),
            else_branch: else_branch.map(|e| Box::new(map_expr(*e, f))),
            used_as_expression,
            ty,
            span,
        },
        HirExpr::When { subject, arms, ty, span } => HirExpr::When {
            subject: subject.map(|s| Box::new(map_expr(*s, f))),
            arms: arms
                .into_iter()
                .map(|arm| crate::hir::HirWhenArm {
                    conditions: arm.conditions.into_iter().map(|c| map_expr(c, f)).collect(),
                    body: map_expr(arm.body, f),
                    span: arm.span,
                })
                .collect(),
            ty,
            span,
        },
        HirExpr::Is { value, type_ref, negated, span } => HirExpr::Is {
            value: Box::new(map_expr(*value, f)),
            type_ref,
            negated,
            span,
        },
        HirExpr::As { value, target_type, nullable, span } => HirExpr::As {
            value: Box::new(map_expr(*value, f)),
            target_type,
            nullable,
            span,
        },
        HirExpr::CollectionLiteral { kind, elements, ty, span } => HirExpr::CollectionLiteral {
            kind,
            elements: elements
                .into_iter()
                .map(|e| match e {
                    HirCollectionElement::Item(i) => HirCollectionElement::Item(map_expr(i, f)),
                    HirCollectionElement::Entry { key, value } => HirCollectionElement::Entry {
                        key: map_expr(key, f),
                        value: map_expr(value, f),
                    },
                })
                .collect(),
            ty,
            span,
        },
        HirExpr::StmtBlock { stmts, tail, ty, span } => HirExpr::StmtBlock {
            stmts: map_block(stmts, f),
            tail: Box::new(map_expr(*tail, f)),
            ty,
            span,
        },
        HirExpr::Try { body, finally, ty, span } => HirExpr::Try {
            body: Box::new(map_expr(*body, f)),
            finally: map_block(finally, f),
            ty,
            span,
        },
        leaf @ (HirExpr::IntLiteral { .. }
        | HirExpr::LongLiteral { .. }
        | HirExpr::DoubleLiteral { .. }
        | HirExpr::FloatLiteral { .. }
        | HirExpr::BoolLiteral { .. }
        | HirExpr::CharLiteral { .. }
        | HirExpr::NullLiteral { .. }
        | HirExpr::StringLiteral { .. }
        | HirExpr::Identifier { .. }
        | HirExpr::This { .. }) => leaf,
    };
    f(rebuilt)
}

fn map_arg(arg: HirArg, f: &impl Fn(HirExpr) -> HirExpr) -> HirArg {
    match arg {
        HirArg::Positional(e) => HirArg::Positional(map_expr(e, f)),
        HirArg::Spread(e) => HirArg::Spread(map_expr(e, f)),
    }
}

fn map_block(block: HirBlock, f: &impl Fn(HirExpr) -> HirExpr) -> HirBlock {
    block.into_iter().map(|s| map_stmt(s, f)).collect()
}

fn map_stmt(stmt: HirStmt, f: &impl Fn(HirExpr) -> HirExpr) -> HirStmt {
    match stmt {
        HirStmt::Expr(e) => HirStmt::Expr(map_expr(e, f)),
        HirStmt::Let { name, ty, is_mutable, value, span } => HirStmt::Let {
            name,
            ty,
            is_mutable,
            value: map_expr(value, f),
            span,
        },
        HirStmt::Assign { target, value, span } => HirStmt::Assign {
            target: map_expr(target, f),
            value: map_expr(value, f),
            span,
        },
        HirStmt::If { condition, then_branch, else_branch, span } => HirStmt::If {
            condition: map_expr(condition, f),
            then_branch: map_block(then_branch, f),
            else_branch: else_branch.map(|b| map_block(b, f)),
            span,
        },
        HirStmt::While { label, condition, body, span } => HirStmt::While {
            label,
            condition: map_expr(condition, f),
            body: map_block(body, f),
            span,
        },
        HirStmt::DoWhile { label, body, condition, span } => HirStmt::DoWhile {
            label,
            body: map_block(body, f),
            condition: map_expr(condition, f),
            span,
        },
        HirStmt::For { label, variable, iterable, body, span } => HirStmt::For {
            label,
            variable,
            iterable: map_expr(iterable, f),
            body: map_block(body, f),
            span,
        },
        HirStmt::Return { value, span } => HirStmt::Return {
            value: value.map(|v| map_expr(v, f)),
            span,
        },
        HirStmt::Break { label, span } => HirStmt::Break { label, span },
        HirStmt::Continue { label, span } => HirStmt::Continue { label, span },
        HirStmt::Throw { value, span } => HirStmt::Throw { value: map_expr(value, f), span },
        HirStmt::Try { body, catches, finally, span } => HirStmt::Try {
            body: map_block(body, f),
            catches: catches
                .into_iter()
                .map(|c| crate::hir::HirCatch {
                    name: c.name,
                    exception_type: c.exception_type,
                    body: map_block(c.body, f),
                    span: c.span,
                })
                .collect(),
            finally: finally.map(|b| map_block(b, f)),
            span,
        },
        HirStmt::Block { body, span } => HirStmt::Block { body: map_block(body, f), span },
    }
}

fn map_program(program: HirProgram, f: &impl Fn(HirExpr) -> HirExpr) -> HirProgram {
    HirProgram {
        functions: program
            .functions
            .into_iter()
            .map(|func| map_function(func, f))
            .collect(),
        classes: program
            .classes
            .into_iter()
            .map(|c| HirClass {
                name: c.name,
                fields: c.fields,
                methods: c.methods.into_iter().map(|m| map_function(m, f)).collect(),
                superclass: c.superclass,
                span: c.span,
            })
            .collect(),
        top_level_properties: program
            .top_level_properties
            .into_iter()
            .map(|p| crate::hir::HirProperty {
                name: p.name,
                ty: p.ty,
                is_mutable: p.is_mutable,
                initializer: p.initializer.map(|i| map_expr(i, f)),
                span: p.span,
            })
            .collect(),
    }
}

fn map_function(func: HirFunction, f: &impl Fn(HirExpr) -> HirExpr) -> HirFunction {
    HirFunction {
        name: func.name,
        params: func.params,
        return_type: func.return_type,
        body: map_block(func.body, f),
        is_extension: func.is_extension,
        span: func.span,
    }
}

/// Inlines a call to a top-level function whose body is exactly one
/// `return <expr>` statement, substituting each parameter by name.
/// Recursive candidates (a function whose own body calls itself by name)
/// are excluded so a single pass always terminates; a call site with a
/// spread argument or a mismatched arity is left untouched.
pub struct InlineExpansion;

impl HirPass for InlineExpansion {
    fn name(&self) -> &'static str {
        "inline-expansion"
    }

    fn mutates_in_place(&self) -> bool {
        false
    }

    fn invalidates(&self) -> &'static [Analysis] {
        &[Analysis::FreeVariableSets]
    }

    fn run(&self, program: HirProgram) -> HirProgram {
        let candidates = collect_inline_candidates(&program);
        if candidates.is_empty() {
            return program;
        }
        map_program(program, &|expr| try_inline_call(expr, &candidates))
    }
}

struct InlineCandidate {
    params: Vec<String>,
    body: HirExpr,
}

fn collect_inline_candidates(program: &HirProgram) -> HashMap<String, InlineCandidate> {
    let mut candidates = HashMap::new();
    for f in &program.functions {
        if f.is_extension {
            continue;
        }
        if let [HirStmt::Return { value: Some(body), .. }] = f.body.as_slice() {
            if f.params.iter().any(|p| p.is_vararg || p.default_value.is_some()) {
                continue;
            }
            if calls_itself(body, &f.name) {
                continue;
            }
            candidates.insert(
                f.name.clone(),
                InlineCandidate {
                    params: f.params.iter().map(|p| p.name.clone()).collect(),
                    body: body.clone(),
                },
            );
        }
    }
    candidates
}

fn calls_itself(expr: &HirExpr, name: &str) -> bool {
    let mut found = false;
    fn walk(expr: &HirExpr, name: &str, found: &mut bool) {
        if let HirExpr::Call { callee, args, .. } = expr {
            if let HirExpr::Identifier { name: callee_name, .. } = callee.as_ref() {
                if callee_name == name {
                    *found = true;
                }
            }
            walk(callee, name, found);
            for a in args {
                match a {
                    HirArg::Positional(e) | HirArg::Spread(e) => walk(e, name, found),
                }
            }
        }
    }
    walk(expr, name, &mut found);
    found
}

fn try_inline_call(expr: HirExpr, candidates: &HashMap<String, InlineCandidate>) -> HirExpr {
    let HirExpr::Call { callee, args, .. } = &expr else {
        return expr;
    };
    let HirExpr::Identifier { name, .. } = callee.as_ref() else {
        return expr;
    };
    let Some(candidate) = candidates.get(name) else {
        return expr;
    };
    if args.len() != candidate.params.len() {
        return expr;
    }
    if args.iter().any(|a| matches!(a, HirArg::Spread(_))) {
        return expr;
    }
    let mut substituted = candidate.body.clone();
    for (param, arg) in candidate.params.iter().zip(args.iter()) {
        let HirArg::Positional(value) = arg else {
            unreachable!("spread args rejected above");
        };
        substituted = substitute_identifier(substituted, param, value);
    }
    substituted
}

/// Replaces every free `Identifier { name }` reference in `expr` with
/// `replacement`, stopping at a nested `Lambda` whose own parameter list
/// shadows `name` (so the substitution never crosses a binder that
/// re-introduces the same name). Recurses on its own rather than through
/// [`map_expr`], since `map_expr` has no notion of a name going out of
/// scope at a binder.
fn substitute_identifier(expr: HirExpr, name: &str, replacement: &HirExpr) -> HirExpr {
    match expr {
        HirExpr::Identifier { name: ref id_name, .. } if id_name == name => replacement.clone(),
        HirExpr::Lambda { params, body, ty, span } => {
            if params.iter().any(|p| p.name == name) {
                HirExpr::Lambda { params, body, ty, span }
            } else {
                HirExpr::Lambda {
                    params,
                    body: substitute_in_block(body, name, replacement),
                    ty,
                    span,
                }
            }
        }
        HirExpr::Binary { op, left, right, ty, span } => HirExpr::Binary {
            op,
            left: Box::new(substitute_identifier(*left, name, replacement)),
            right: Box::new(substitute_identifier(*right, name, replacement)),
            ty,
            span,
        },
        HirExpr::Unary { op, operand, ty, span } => HirExpr::Unary {
            op,
            operand: Box::new(substitute_identifier(*operand, name, replacement)),
            ty,
            span,
        },
        HirExpr::Call { callee, args, ty, span } => HirExpr::Call {
            callee: Box::new(substitute_identifier(*callee, name, replacement)),
            args: args
                .into_iter()
                .map(|a| match a {
                    HirArg::Positional(e) => HirArg::Positional(substitute_identifier(e, name, replacement)),
                    HirArg::Spread(e) => HirArg::Spread(substitute_identifier(e, name, replacement)),
                })
                .collect(),
            ty,
            span,
        },
        HirExpr::Member { receiver, name: field, ty, span } => HirExpr::Member {
            receiver: Box::new(substitute_identifier(*receiver, name, replacement)),
            name: field,
            ty,
            span,
        },
        HirExpr::Index { receiver, index, ty, span } => HirExpr::Index {
            receiver: Box::new(substitute_identifier(*receiver, name, replacement)),
            index: Box::new(substitute_identifier(*index, name, replacement)),
            ty,
            span,
        },
        HirExpr::If { condition, then_branch, else_branch, used_as_expression, ty, span } => HirExpr::If {
            condition: Box::new(substitute_identifier(*condition, name, replacement)),
            then_branch: Box::new(substitute_identifier(*then_branch, name, replacement)),
            else_branch: else_branch.map(|e| Box::new(substitute_identifier(*e, name, replacement))),
            used_as_expression,
            ty,
            span,
        },
        HirExpr::When { subject, arms, ty, span } => HirExpr::When {
            subject: subject.map(|s| Box::new(substitute_identifier(*s, name, replacement))),
            arms: arms
                .into_iter()
                .map(|arm| crate::hir::HirWhenArm {
                    conditions: arm
                        .conditions
                        .into_iter()
                        .map(|c| substitute_identifier(c, name, replacement))
                        .collect(),
                    body: substitute_identifier(arm.body, name, replacement),
                    span: arm.span,
                })
                .collect(),
            ty,
            span,
        },
        HirExpr::Is { value, type_ref, negated, span } => HirExpr::Is {
            value: Box::new(substitute_identifier(*value, name, replacement)),
            type_ref,
            negated,
            span,
        },
        HirExpr::As { value, target_type, nullable, span } => HirExpr::As {
            value: Box::new(substitute_identifier(*value, name, replacement)),
            target_type,
            nullable,
            span,
        },
        HirExpr::CollectionLiteral { kind, elements, ty, span } => HirExpr::CollectionLiteral {
            kind,
            elements: elements
                .into_iter()
                .map(|e| match e {
                    HirCollectionElement::Item(i) => {
                        HirCollectionElement::Item(substitute_identifier(i, name, replacement))
                    }
                    HirCollectionElement::Entry { key, value } => HirCollectionElement::Entry {
                        key: substitute_identifier(key, name, replacement),
                        value: substitute_identifier(value, name, replacement),
                    },
                })
                .collect(),
            ty,
            span,
        },
        HirExpr::StmtBlock { stmts, tail, ty, span } => HirExpr::StmtBlock {
            stmts: substitute_in_block(stmts, name, replacement),
            tail: Box::new(substitute_identifier(*tail, name, replacement)),
            ty,
            span,
        },
        HirExpr::Try { body, finally, ty, span } => HirExpr::Try {
            body: Box::new(substitute_identifier(*body, name, replacement)),
            finally: substitute_in_block(finally, name, replacement),
            ty,
            span,
        },
        leaf => leaf,
    }
}

/// Substitutes through a flat statement list, stopping as soon as a `let`
/// re-declares `name` — everything from that statement on refers to the
/// new binding, not the one being substituted in.
fn substitute_in_block(block: HirBlock, name: &str, replacement: &HirExpr) -> HirBlock {
    let mut out = Vec::with_capacity(block.len());
    let mut shadowed = false;
    for stmt in block {
        if shadowed {
            out.push(stmt);
            continue;
        }
        let shadows_from_here = matches!(&stmt, HirStmt::Let { name: n, .. } if n == name);
        out.push(substitute_in_stmt(stmt, name, replacement));
        if shadows_from_here {
            shadowed = true;
        }
    }
    out
}

fn substitute_in_stmt(stmt: HirStmt, name: &str, replacement: &HirExpr) -> HirStmt {
    match stmt {
        HirStmt::Expr(e) => HirStmt::Expr(substitute_identifier(e, name, replacement)),
        HirStmt::Let { name: var, ty, is_mutable, value, span } => HirStmt::Let {
            name: var,
            ty,
            is_mutable,
            value: substitute_identifier(value, name, replacement),
            span,
        },
        HirStmt::Assign { target, value, span } => HirStmt::Assign {
            target: substitute_identifier(target, name, replacement),
            value: substitute_identifier(value, name, replacement),
            span,
        },
        HirStmt::If { condition, then_branch, else_branch, span } => HirStmt::If {
            condition: substitute_identifier(condition, name, replacement),
            then_branch: substitute_in_block(then_branch, name, replacement),
            else_branch: else_branch.map(|b| substitute_in_block(b, name, replacement)),
            span,
        },
        HirStmt::While { label, condition, body, span } => HirStmt::While {
            label,
            condition: substitute_identifier(condition, name, replacement),
            body: substitute_in_block(body, name, replacement),
            span,
        },
        HirStmt::DoWhile { label, body, condition, span } => HirStmt::DoWhile {
            label,
            body: substitute_in_block(body, name, replacement),
            condition: substitute_identifier(condition, name, replacement),
            span,
        },
        HirStmt::For { label, variable, iterable, body, span } => HirStmt::For {
            label,
            iterable: substitute_identifier(iterable, name, replacement),
            body: if variable == name {
                body
            } else {
                substitute_in_block(body, name, replacement)
            },
            variable,
            span,
        },
        HirStmt::Return { value, span } => HirStmt::Return {
            value: value.map(|v| substitute_identifier(v, name, replacement)),
            span,
        },
        HirStmt::Break { label, span } => HirStmt::Break { label, span },
        HirStmt::Continue { label, span } => HirStmt::Continue { label, span },
        HirStmt::Throw { value, span } => HirStmt::Throw {
            value: substitute_identifier(value, name, replacement),
            span,
        },
        HirStmt::Try { body, catches, finally, span } => HirStmt::Try {
            body: substitute_in_block(body, name, replacement),
            catches: catches
                .into_iter()
                .map(|c| crate::hir::HirCatch {
                    body: if c.name == name {
                        c.body
                    } else {
                        substitute_in_block(c.body, name, replacement)
                    },
                    name: c.name,
                    exception_type: c.exception_type,
                    span: c.span,
                })
                .collect(),
            finally: finally.map(|b| substitute_in_block(b, name, replacement)),
            span,
        },
        HirStmt::Block { body, span } => HirStmt::Block {
            body: substitute_in_block(body, name, replacement),
            span,
        },
    }
}

/// Folds a binary or unary operation over two (or one) literal operands
/// of matching kind into a single literal, the way a constant-folding
/// pass always has (§4.6).
pub struct ConstantFolding;

impl HirPass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn mutates_in_place(&self) -> bool {
        false
    }

    fn invalidates(&self) -> &'static [Analysis] {
        &[Analysis::FreeVariableSets]
    }

    fn run(&self, program: HirProgram) -> HirProgram {
        map_program(program, &fold_expr)
    }
}

fn fold_expr(expr: HirExpr) -> HirExpr {
    match &expr {
        HirExpr::Unary { op, operand, span, .. } => {
            if let Some(folded) = fold_unary(*op, operand, *span) {
                return folded;
            }
        }
        HirExpr::Binary { op, left, right, span, .. } => {
            if let Some(folded) = fold_binary(*op, left, right, *span) {
                return folded;
            }
        }
        _ => {}
    }
    expr
}

fn fold_unary(op: HirUnaryOp, operand: &HirExpr, span: novalang_parser::span::Span) -> Option<HirExpr> {
    match (op, operand) {
        (HirUnaryOp::Neg, HirExpr::IntLiteral { value, .. }) => {
            Some(HirExpr::IntLiteral { value: -value, span })
        }
        (HirUnaryOp::Neg, HirExpr::LongLiteral { value, .. }) => {
            Some(HirExpr::LongLiteral { value: -value, span })
        }
        (HirUnaryOp::Neg, HirExpr::DoubleLiteral { value, .. }) => {
            Some(HirExpr::DoubleLiteral { value: -value, span })
        }
        (HirUnaryOp::Plus, HirExpr::IntLiteral { value, .. }) => {
            Some(HirExpr::IntLiteral { value: *value, span })
        }
        (HirUnaryOp::Not, HirExpr::BoolLiteral { value, .. }) => {
            Some(HirExpr::BoolLiteral { value: !value, span })
        }
        _ => None,
    }
}

fn fold_binary(
    op: HirBinaryOp,
    left: &HirExpr,
    right: &HirExpr,
    span: novalang_parser::span::Span,
) -> Option<HirExpr> {
    use HirBinaryOp::*;
    match (left, right) {
        (HirExpr::IntLiteral { value: l, .. }, HirExpr::IntLiteral { value: r, .. }) => {
            fold_int(op, *l, *r, span)
        }
        (HirExpr::DoubleLiteral { value: l, .. }, HirExpr::DoubleLiteral { value: r, .. }) => {
            fold_double(op, *l, *r, span)
        }
        (HirExpr::BoolLiteral { value: l, .. }, HirExpr::BoolLiteral { value: r, .. }) => {
            match op {
                And => Some(HirExpr::BoolLiteral { value: *l && *r, span }),
                Or => Some(HirExpr::BoolLiteral { value: *l || *r, span }),
                Eq => Some(HirExpr::BoolLiteral { value: l == r, span }),
                NotEq => Some(HirExpr::BoolLiteral { value: l != r, span }),
                _ => None,
            }
        }
        (HirExpr::StringLiteral { value: l, .. }, HirExpr::StringLiteral { value: r, .. })
            if op == Add =>
        {
            Some(HirExpr::StringLiteral { value: format!("{l}{r}"), span })
        }
        _ => None,
    }
}

fn fold_int(op: HirBinaryOp, l: i64, r: i64, span: novalang_parser::span::Span) -> Option<HirExpr> {
    use HirBinaryOp::*;
    let lit = |value| HirExpr::IntLiteral { value, span };
    let bool_lit = |value| HirExpr::BoolLiteral { value, span };
    match op {
        Add => l.checked_add(r).map(lit),
        Sub => l.checked_sub(r).map(lit),
        Mul => l.checked_mul(r).map(lit),
        Div if r != 0 => l.checked_div(r).map(lit),
        Rem if r != 0 => l.checked_rem(r).map(lit),
        Eq => Some(bool_lit(l == r)),
        NotEq => Some(bool_lit(l != r)),
        Lt => Some(bool_lit(l < r)),
        LtEq => Some(bool_lit(l <= r)),
        Gt => Some(bool_lit(l > r)),
        GtEq => Some(bool_lit(l >= r)),
        BitAnd => Some(lit(l & r)),
        BitOr => Some(lit(l | r)),
        BitXor => Some(lit(l ^ r)),
        Shl => Some(lit(l << (r & 63))),
        Shr => Some(lit(l >> (r & 63))),
        _ => None,
    }
}

fn fold_double(op: HirBinaryOp, l: f64, r: f64, span: novalang_parser::span::Span) -> Option<HirExpr> {
    use HirBinaryOp::*;
    let lit = |value| HirExpr::DoubleLiteral { value, span };
    let bool_lit = |value| HirExpr::BoolLiteral { value, span };
    match op {
        Add => Some(lit(l + r)),
        Sub => Some(lit(l - r)),
        Mul => Some(lit(l * r)),
        Div if r != 0.0 => Some(lit(l / r)),
        Eq => Some(bool_lit(l == r)),
        NotEq => Some(bool_lit(l != r)),
        Lt => Some(bool_lit(l < r)),
        LtEq => Some(bool_lit(l <= r)),
        Gt => Some(bool_lit(l > r)),
        GtEq => Some(bool_lit(l >= r)),
        _ => None,
    }
}

/// Drops every statement after the first unconditional exit
/// (`return`/`throw`/`break`/`continue`) in a block — the analyzer
/// already warns about this code (§4.3 `UnreachableCode`); this pass
/// actually removes it from what reaches MIR.
pub struct DeadCodeElimination;

impl HirPass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn mutates_in_place(&self) -> bool {
        false
    }

    fn invalidates(&self) -> &'static [Analysis] {
        &[Analysis::FreeVariableSets, Analysis::ControlFlowGraph, Analysis::DominatorTree]
    }

    fn run(&self, program: HirProgram) -> HirProgram {
        HirProgram {
            functions: program.functions.into_iter().map(trim_function).collect(),
            classes: program
                .classes
                .into_iter()
                .map(|c| HirClass {
                    name: c.name,
                    fields: c.fields,
                    methods: c.methods.into_iter().map(trim_function).collect(),
                    superclass: c.superclass,
                    span: c.span,
                })
                .collect(),
            top_level_properties: program.top_level_properties,
        }
    }
}

fn trim_function(func: HirFunction) -> HirFunction {
    HirFunction {
        name: func.name,
        params: func.params,
        return_type: func.return_type,
        body: trim_block(func.body),
        is_extension: func.is_extension,
        span: func.span,
    }
}

fn trim_block(block: HirBlock) -> HirBlock {
    let mut out = Vec::with_capacity(block.len());
    for stmt in block {
        let exits = is_unconditional_exit(&stmt);
        out.push(trim_nested(stmt));
        if exits {
            break;
        }
    }
    out
}

fn is_unconditional_exit(stmt: &HirStmt) -> bool {
    matches!(
        stmt,
        HirStmt::Return { .. } | HirStmt::Throw { .. } | HirStmt::Break { .. } | HirStmt::Continue { .. }
    )
}

fn trim_nested(stmt: HirStmt) -> HirStmt {
    match stmt {
        HirStmt::If { condition, then_branch, else_branch, span } => HirStmt::If {
            condition,
            then_branch: trim_block(then_branch),
            else_branch: else_branch.map(trim_block),
            span,
        },
        HirStmt::While { label, condition, body, span } => HirStmt::While {
            label,
            condition,
            body: trim_block(body),
            span,
        },
        HirStmt::DoWhile { label, body, condition, span } => HirStmt::DoWhile {
            label,
            body: trim_block(body),
            condition,
            span,
        },
        HirStmt::For { label, variable, iterable, body, span } => HirStmt::For {
            label,
            variable,
            iterable,
            body: trim_block(body),
            span,
        },
        HirStmt::Try { body, catches, finally, span } => HirStmt::Try {
            body: trim_block(body),
            catches: catches
                .into_iter()
                .map(|c| crate::hir::HirCatch {
                    name: c.name,
                    exception_type: c.exception_type,
                    body: trim_block(c.body),
                    span: c.span,
                })
                .collect(),
            finally: finally.map(trim_block),
            span,
        },
        HirStmt::Block { body, span } => HirStmt::Block { body: trim_block(body), span },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::lower_hir;
    use novalang_parser::parse;

    fn lower(source: &str) -> HirProgram {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors.errors());
        let result = Analyzer::new("test.nova", false).analyze(&program);
        lower_hir::lower_program(&program, &result.types, "test.nova").unwrap()
    }

    #[test]
    fn folds_int_arithmetic_at_compile_time() {
        let hir = lower("fun main() { val x = 1 + 2 * 3 }");
        let folded = ConstantFolding.run(hir);
        let HirStmt::Let { value, .. } = &folded.functions[0].body[0] else {
            panic!("expected let");
        };
        assert!(matches!(value, HirExpr::IntLiteral { value: 7, .. }));
    }

    #[test]
    fn leaves_non_constant_binary_expressions_untouched() {
        let hir = lower("fun main(n: Int) { val x = n + 1 }");
        let folded = ConstantFolding.run(hir);
        let HirStmt::Let { value, .. } = &folded.functions[0].body[0] else {
            panic!("expected let");
        };
        assert!(matches!(value, HirExpr::Binary { .. }));
    }

    #[test]
    fn division_by_zero_literal_is_left_for_the_runtime_to_trap() {
        let hir = lower("fun main() { val x = 1 / 0 }");
        let folded = ConstantFolding.run(hir);
        let HirStmt::Let { value, .. } = &folded.functions[0].body[0] else {
            panic!("expected let");
        };
        assert!(matches!(value, HirExpr::Binary { .. }));
    }

    #[test]
    fn drops_statements_after_return() {
        let hir = lower("fun f(): Int { return 1; val unused = 2 }");
        let trimmed = DeadCodeElimination.run(hir);
        assert_eq!(trimmed.functions[0].body.len(), 1);
    }

    #[test]
    fn inlines_single_expression_body_call() {
        let hir = lower("fun square(n: Int) = n * n\nfun main() { val x = square(4) }");
        let inlined = InlineExpansion.run(hir);
        let HirStmt::Let { value, .. } = &inlined.functions[1].body[0] else {
            panic!("expected let");
        };
        assert!(!matches!(value, HirExpr::Call { .. }), "call should have been inlined");
    }

    #[test]
    fn does_not_inline_a_self_recursive_function() {
        let hir = lower("fun fact(n: Int): Int = if (n <= 1) 1 else n * fact(n - 1)\nfun main() { val x = fact(5) }");
        let inlined = InlineExpansion.run(hir);
        let HirStmt::Let { value, .. } = &inlined.functions[1].body[0] else {
            panic!("expected let");
        };
        assert!(matches!(value, HirExpr::Call { .. }), "recursive call should not be inlined");
    }
}
