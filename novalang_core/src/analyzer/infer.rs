//! Type inference (§4.3): resolves a `TypeRef` written in source to a
//! `NovaType`, and infers the type of every expression, recording each
//! result into the shared [`super::TypeTable`].

use novalang_parser::ast::{BinaryOp, CollectionElement, CollectionKind, Expression, TypeRef, UnaryOp, WhenArm};

use crate::symbol::SymbolTable;
use crate::types::{NovaType, PrimitiveType};

use super::TypeTable;

/// Resolve a parser-level `TypeRef` (§3.3) to a `NovaType` (§3.4). This is
/// the one place `TypeRef` is consulted — everywhere downstream of the
/// analyzer sees only `NovaType` (§9 "Unifying the type system").
pub fn resolve_type_ref(type_ref: Option<&TypeRef>) -> NovaType {
    match type_ref {
        None => NovaType::Unresolved("<inferred>".to_string()),
        Some(TypeRef::Inferred { .. }) => NovaType::Unresolved("<inferred>".to_string()),
        Some(TypeRef::Simple { name, type_args, .. }) => resolve_simple(name, type_args),
        Some(TypeRef::Nullable { inner, .. }) => {
            NovaType::nullable(resolve_type_ref(Some(inner)))
        }
        Some(TypeRef::Function {
            receiver,
            params,
            return_type,
            ..
        }) => NovaType::Function {
            params: params.iter().map(|p| resolve_type_ref(Some(p))).collect(),
            return_type: Box::new(resolve_type_ref(Some(return_type))),
            receiver: receiver
                .as_ref()
                .map(|r| Box::new(resolve_type_ref(Some(r)))),
        },
    }
}

fn resolve_simple(name: &str, type_args: &[TypeRef]) -> NovaType {
    let primitive = match name {
        "Int" => Some(PrimitiveType::Int),
        "Long" => Some(PrimitiveType::Long),
        "Double" => Some(PrimitiveType::Double),
        "Float" => Some(PrimitiveType::Float),
        "Boolean" => Some(PrimitiveType::Boolean),
        "Char" => Some(PrimitiveType::Char),
        "String" => Some(PrimitiveType::String),
        "Unit" => Some(PrimitiveType::Unit),
        "Nothing" => Some(PrimitiveType::Nothing),
        "Any" => Some(PrimitiveType::Any),
        _ => None,
    };
    if let Some(p) = primitive {
        return NovaType::Primitive(p);
    }
    NovaType::Class {
        qualified_name: name.to_string(),
        type_args: type_args.iter().map(|t| resolve_type_ref(Some(t))).collect(),
    }
}

/// Infer the type of `expr`, recording every sub-expression's type into
/// `types` as it goes (so lowering can later query any span, not just the
/// top-level one).
pub fn infer_expr(expr: &Expression, symbols: &SymbolTable, types: &mut TypeTable) -> NovaType {
    let ty = infer_expr_inner(expr, symbols, types);
    types.record(expr.span(), ty.clone());
    ty
}

fn infer_expr_inner(expr: &Expression, symbols: &SymbolTable, types: &mut TypeTable) -> NovaType {
    match expr {
        Expression::IntLiteral { .. } => NovaType::int(),
        Expression::LongLiteral { .. } => NovaType::Primitive(PrimitiveType::Long),
        Expression::DoubleLiteral { .. } => NovaType::Primitive(PrimitiveType::Double),
        Expression::FloatLiteral { .. } => NovaType::Primitive(PrimitiveType::Float),
        Expression::BoolLiteral { .. } => NovaType::boolean(),
        Expression::CharLiteral { .. } => NovaType::Primitive(PrimitiveType::Char),
        Expression::NullLiteral { .. } => NovaType::nullable(NovaType::nothing()),
        Expression::StringLiteral { parts, .. } => {
            for part in parts {
                if let novalang_parser::ast::StringPart::Interpolated(inner) = part {
                    infer_expr(inner, symbols, types);
                }
            }
            NovaType::string()
        }
        Expression::Identifier { name, .. } => symbols
            .lookup(name)
            .map(|s| s.ty.clone())
            .unwrap_or_else(|| NovaType::Unresolved(name.clone())),
        Expression::This { .. } => NovaType::any(),
        Expression::Super { .. } => NovaType::any(),
        Expression::Binary { op, left, right, .. } => {
            let lt = infer_expr(left, symbols, types);
            let rt = infer_expr(right, symbols, types);
            binary_result_type(*op, &lt, &rt)
        }
        Expression::Unary { op, operand, .. } => {
            let t = infer_expr(operand, symbols, types);
            match op {
                UnaryOp::Not => NovaType::boolean(),
                UnaryOp::Plus | UnaryOp::Neg => t,
            }
        }
        Expression::Call { callee, positional_args, named_args, trailing_lambda, .. } => {
            let callee_ty = infer_expr(callee, symbols, types);
            for arg in positional_args {
                infer_expr(arg, symbols, types);
            }
            for (_, arg) in named_args {
                infer_expr(arg, symbols, types);
            }
            if let Some(lambda) = trailing_lambda {
                infer_lambda(lambda, symbols, types);
            }
            match callee_ty {
                NovaType::Function { return_type, .. } => *return_type,
                _ => NovaType::any(),
            }
        }
        Expression::Lambda(lambda) => infer_lambda(lambda, symbols, types),
        Expression::Member { receiver, .. } => {
            infer_expr(receiver, symbols, types);
            NovaType::any()
        }
        Expression::Index { receiver, index, .. } => {
            infer_expr(receiver, symbols, types);
            infer_expr(index, symbols, types);
            NovaType::any()
        }
        Expression::If { condition, then_branch, else_branch, .. } => {
            infer_expr(condition, symbols, types);
            let then_ty = infer_expr(then_branch, symbols, types);
            match else_branch {
                Some(e) => {
                    let else_ty = infer_expr(e, symbols, types);
                    then_ty.least_upper_bound(&else_ty)
                }
                None => NovaType::unit(),
            }
        }
        Expression::When { subject, arms, .. } => {
            if let Some(s) = subject {
                infer_expr(s, symbols, types);
            }
            infer_when_arms(arms, symbols, types)
        }
        Expression::Range { start, end, .. } => {
            infer_expr(start, symbols, types);
            infer_expr(end, symbols, types);
            NovaType::Class {
                qualified_name: "Range".to_string(),
                type_args: vec![],
            }
        }
        Expression::Elvis { left, right, .. } => {
            let lt = infer_expr(left, symbols, types);
            let rt = infer_expr(right, symbols, types);
            lt.strip_nullable().clone().least_upper_bound(&rt)
        }
        Expression::ErrorPropagation { inner, .. } => infer_expr(inner, symbols, types),
        Expression::NotNullAssert { inner, .. } => {
            infer_expr(inner, symbols, types).strip_nullable().clone()
        }
        Expression::Is { value, .. } => {
            infer_expr(value, symbols, types);
            NovaType::boolean()
        }
        Expression::As { value, type_ref, nullable, .. } => {
            infer_expr(value, symbols, types);
            let t = resolve_type_ref(Some(type_ref));
            if *nullable {
                NovaType::nullable(t)
            } else {
                t
            }
        }
        Expression::In { value, range, .. } => {
            infer_expr(value, symbols, types);
            infer_expr(range, symbols, types);
            NovaType::boolean()
        }
        Expression::CollectionLiteral { kind, elements, .. } => {
            for el in elements {
                match el {
                    CollectionElement::Item(e) | CollectionElement::Spread(e) => {
                        infer_expr(e, symbols, types);
                    }
                    CollectionElement::Entry { key, value } => {
                        infer_expr(key, symbols, types);
                        infer_expr(value, symbols, types);
                    }
                }
            }
            let name = match kind {
                CollectionKind::List => "List",
                CollectionKind::Set => "Set",
                CollectionKind::Map => "Map",
            };
            NovaType::Class {
                qualified_name: name.to_string(),
                type_args: vec![],
            }
        }
        Expression::Use { resource, body, .. } => {
            infer_expr(resource, symbols, types);
            let mut last = NovaType::unit();
            for stmt in body {
                if let novalang_parser::ast::Statement::Expression(e) = stmt {
                    last = infer_expr(e, symbols, types);
                }
            }
            last
        }
        Expression::Annotated { inner, args, .. } => {
            for a in args {
                infer_expr(a, symbols, types);
            }
            infer_expr(inner, symbols, types)
        }
    }
}

fn infer_lambda(
    lambda: &novalang_parser::ast::LambdaExpr,
    symbols: &SymbolTable,
    types: &mut TypeTable,
) -> NovaType {
    let mut params = vec![];
    for p in &lambda.params {
        params.push(resolve_type_ref(p.type_annotation.as_ref()));
    }
    let mut last = NovaType::unit();
    for stmt in &lambda.body {
        if let novalang_parser::ast::Statement::Expression(e) = stmt {
            last = infer_expr(e, symbols, types);
        }
    }
    NovaType::Function {
        params,
        return_type: Box::new(last),
        receiver: None,
    }
}

fn infer_when_arms(arms: &[WhenArm], symbols: &SymbolTable, types: &mut TypeTable) -> NovaType {
    let mut result: Option<NovaType> = None;
    for arm in arms {
        for cond in &arm.conditions {
            infer_expr(cond, symbols, types);
        }
        let body_ty = infer_expr(&arm.body, symbols, types);
        result = Some(match result {
            Some(acc) => acc.least_upper_bound(&body_ty),
            None => body_ty,
        });
    }
    result.unwrap_or_else(NovaType::unit)
}

/// Result type of a binary operator application (§4.7's "implicit
/// promotion Int → Long → Double" applies identically here so the
/// analyzer and the back end agree).
pub fn binary_result_type(op: BinaryOp, left: &NovaType, right: &NovaType) -> NovaType {
    use BinaryOp::*;
    match op {
        Eq | NotEq | RefEq | NotRefEq | Lt | LtEq | Gt | GtEq | And | Or => NovaType::boolean(),
        Add if *left == NovaType::string() || *right == NovaType::string() => NovaType::string(),
        Add | Sub | Mul | Div | Rem => promote_numeric(left, right),
        BitAnd | BitOr | BitXor | Shl | Shr => left.clone(),
    }
}

fn promote_numeric(left: &NovaType, right: &NovaType) -> NovaType {
    use PrimitiveType::*;
    match (left, right) {
        (NovaType::Primitive(a), NovaType::Primitive(b)) => {
            let rank = |p: PrimitiveType| match p {
                Int => 0,
                Long => 1,
                Float => 2,
                Double => 3,
                _ => -1,
            };
            if rank(*a) >= rank(*b) {
                NovaType::Primitive(*a)
            } else {
                NovaType::Primitive(*b)
            }
        }
        _ => left.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novalang_parser::ast::BinaryOp;

    #[test]
    fn int_plus_int_is_int() {
        assert_eq!(
            binary_result_type(BinaryOp::Add, &NovaType::int(), &NovaType::int()),
            NovaType::int()
        );
    }

    #[test]
    fn int_plus_double_promotes_to_double() {
        assert_eq!(
            binary_result_type(
                BinaryOp::Add,
                &NovaType::int(),
                &NovaType::Primitive(PrimitiveType::Double)
            ),
            NovaType::Primitive(PrimitiveType::Double)
        );
    }

    #[test]
    fn string_concatenation_stays_string() {
        assert_eq!(
            binary_result_type(BinaryOp::Add, &NovaType::string(), &NovaType::int()),
            NovaType::string()
        );
    }

    #[test]
    fn comparison_is_always_boolean() {
        assert_eq!(
            binary_result_type(BinaryOp::Lt, &NovaType::int(), &NovaType::int()),
            NovaType::boolean()
        );
    }

    #[test]
    fn resolve_simple_primitive_names() {
        let type_ref = TypeRef::Simple {
            name: "Int".to_string(),
            type_args: vec![],
            span: novalang_parser::span::Span::empty(),
        };
        assert_eq!(resolve_type_ref(Some(&type_ref)), NovaType::int());
    }

    #[test]
    fn resolve_unknown_name_as_class() {
        let type_ref = TypeRef::Simple {
            name: "Widget".to_string(),
            type_args: vec![],
            span: novalang_parser::span::Span::empty(),
        };
        assert_eq!(
            resolve_type_ref(Some(&type_ref)),
            NovaType::Class {
                qualified_name: "Widget".to_string(),
                type_args: vec![]
            }
        );
    }
}
