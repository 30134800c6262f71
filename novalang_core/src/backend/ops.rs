//! The single operations module both back ends dispatch arithmetic and
//! comparison through (§4.7 "eliminating the historical triplication of
//! binary-operator code"). Grounded on the teacher's `vm::exec::*` split
//! by operator kind and `vm::type_ops::*` for the shared promotion/
//! subtype rules, collapsed here into one module since `NovaType` already
//! unifies what the teacher's `JuliaType`/exec split kept separate.

use novalang_runtime::RuntimeError;

use crate::mir::{MirBinaryOp, MirUnaryOp};

use super::value::Value;

/// Lets `ops::dispatch_binary`/`dispatch_unary` call back into whichever
/// back end is driving execution to invoke a user-defined operator
/// overload method, without `ops` itself depending on `Evaluator` or
/// `Emitter`.
pub trait OperatorHost {
    fn call_method(&mut self, qualified_name: &str, args: Vec<Value>) -> Result<Value, RuntimeError>;
}

/// Kotlin-style operator-overload method name for a binary op, or `None`
/// for operators that have no user-overloadable counterpart (logical
/// `&&`/`||`, bitwise ops, reference equality — `lower_hir` already
/// rewrites `===`/`!==` to a `refEquals` call before this is ever
/// consulted).
fn overload_method_name(op: MirBinaryOp) -> Option<&'static str> {
    use MirBinaryOp::*;
    match op {
        Add => Some("plus"),
        Sub => Some("minus"),
        Mul => Some("times"),
        Div => Some("div"),
        Rem => Some("rem"),
        Eq => Some("equals"),
        Lt | LtEq | Gt | GtEq => Some("compareTo"),
        _ => None,
    }
}

/// §9 Open Question 3, resolved: when the left operand is, at runtime, a
/// `Class` instance — even if static analysis could not prove it (an
/// `Any`-typed or generic-typed expression) — its user-defined overload
/// is tried first; only a left operand that is itself a builtin
/// primitive takes the fast path directly.
pub fn dispatch_binary(
    op: MirBinaryOp,
    left: Value,
    right: Value,
    host: &mut impl OperatorHost,
) -> Result<Value, RuntimeError> {
    if let Value::Object(obj) = &left {
        if let Some(method) = overload_method_name(op) {
            let class_name = obj.borrow().class_name.clone();
            let qualified = format!("{class_name}.{method}");
            let result = host.call_method(&qualified, vec![left.clone(), right.clone()]);
            return match (op, result) {
                (MirBinaryOp::Lt, Ok(Value::Int(n))) => Ok(Value::Bool(n < 0)),
                (MirBinaryOp::LtEq, Ok(Value::Int(n))) => Ok(Value::Bool(n <= 0)),
                (MirBinaryOp::Gt, Ok(Value::Int(n))) => Ok(Value::Bool(n > 0)),
                (MirBinaryOp::GtEq, Ok(Value::Int(n))) => Ok(Value::Bool(n >= 0)),
                (_, other) => other,
            };
        }
    }
    builtin_binary(op, left, right)
}

fn builtin_binary(op: MirBinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    use MirBinaryOp::*;
    match op {
        And => Ok(Value::Bool(left.truthy() && right.truthy())),
        Or => Ok(Value::Bool(left.truthy() || right.truthy())),
        Eq => Ok(Value::Bool(left.structural_eq(&right))),
        NotEq => Ok(Value::Bool(!left.structural_eq(&right))),
        RefEq => Ok(Value::Bool(ref_eq(&left, &right))),
        NotRefEq => Ok(Value::Bool(!ref_eq(&left, &right))),
        Add if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) => {
            Ok(Value::Str(format!("{left}{right}").into()))
        }
        Add | Sub | Mul | Div | Rem => arithmetic(op, left, right),
        Lt | LtEq | Gt | GtEq => comparison(op, left, right),
        BitAnd | BitOr | BitXor | Shl | Shr => bitwise(op, left, right),
    }
}

pub(crate) fn ref_eq(left: &Value, right: &Value) -> bool {
    use std::rc::Rc;
    match (left, right) {
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
        _ => left.structural_eq(right),
    }
}

/// Promotion order `Int -> Long -> Double` (§4.7); `Float` promotes into
/// the same ladder between `Long` and `Double` when paired with either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum NumericRank {
    Int,
    Long,
    Float,
    Double,
}

fn numeric_rank(v: &Value) -> Option<NumericRank> {
    match v {
        Value::Int(_) => Some(NumericRank::Int),
        Value::Long(_) => Some(NumericRank::Long),
        Value::Float(_) => Some(NumericRank::Float),
        Value::Double(_) => Some(NumericRank::Double),
        _ => None,
    }
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(n) => *n as f64,
        Value::Long(n) => *n as f64,
        Value::Float(n) => *n as f64,
        Value::Double(n) => *n,
        _ => unreachable!("as_f64 called on a non-numeric value"),
    }
}

fn as_i64(v: &Value) -> i64 {
    match v {
        Value::Int(n) => *n as i64,
        Value::Long(n) => *n,
        _ => unreachable!("as_i64 called on a non-integral value"),
    }
}

fn arithmetic(op: MirBinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    let (lr, rr) = (
        numeric_rank(&left).ok_or_else(|| RuntimeError::type_error(format!("{} is not numeric", left.type_name()))),
        numeric_rank(&right).ok_or_else(|| RuntimeError::type_error(format!("{} is not numeric", right.type_name()))),
    );
    let (lr, rr) = (lr?, rr?);
    let rank = lr.max(rr);
    match rank {
        NumericRank::Int => {
            let (l, r) = (as_i64(&left) as i32, as_i64(&right) as i32);
            int_arith(op, l, r)
        }
        NumericRank::Long => {
            let (l, r) = (as_i64(&left), as_i64(&right));
            long_arith(op, l, r)
        }
        NumericRank::Float => {
            let (l, r) = (as_f64(&left) as f32, as_f64(&right) as f32);
            float_arith(op, l, r)
        }
        NumericRank::Double => {
            let (l, r) = (as_f64(&left), as_f64(&right));
            double_arith(op, l, r)
        }
    }
}

fn int_arith(op: MirBinaryOp, l: i32, r: i32) -> Result<Value, RuntimeError> {
    use MirBinaryOp::*;
    match op {
        Add => Ok(Value::Int(l.wrapping_add(r))),
        Sub => Ok(Value::Int(l.wrapping_sub(r))),
        Mul => Ok(Value::Int(l.wrapping_mul(r))),
        Div if r == 0 => Err(RuntimeError::DivisionByZero),
        Div => Ok(Value::Int(l.wrapping_div(r))),
        Rem if r == 0 => Err(RuntimeError::DivisionByZero),
        Rem => Ok(Value::Int(l.wrapping_rem(r))),
        _ => unreachable!("int_arith called with non-arithmetic op"),
    }
}

fn long_arith(op: MirBinaryOp, l: i64, r: i64) -> Result<Value, RuntimeError> {
    use MirBinaryOp::*;
    match op {
        Add => Ok(Value::Long(l.wrapping_add(r))),
        Sub => Ok(Value::Long(l.wrapping_sub(r))),
        Mul => Ok(Value::Long(l.wrapping_mul(r))),
        Div if r == 0 => Err(RuntimeError::DivisionByZero),
        Div => Ok(Value::Long(l.wrapping_div(r))),
        Rem if r == 0 => Err(RuntimeError::DivisionByZero),
        Rem => Ok(Value::Long(l.wrapping_rem(r))),
        _ => unreachable!("long_arith called with non-arithmetic op"),
    }
}

fn float_arith(op: MirBinaryOp, l: f32, r: f32) -> Result<Value, RuntimeError> {
    use MirBinaryOp::*;
    match op {
        Add => Ok(Value::Float(l + r)),
        Sub => Ok(Value::Float(l - r)),
        Mul => Ok(Value::Float(l * r)),
        Div => Ok(Value::Float(l / r)),
        Rem => Ok(Value::Float(l % r)),
        _ => unreachable!("float_arith called with non-arithmetic op"),
    }
}

fn double_arith(op: MirBinaryOp, l: f64, r: f64) -> Result<Value, RuntimeError> {
    use MirBinaryOp::*;
    match op {
        Add => Ok(Value::Double(l + r)),
        Sub => Ok(Value::Double(l - r)),
        Mul => Ok(Value::Double(l * r)),
        Div => Ok(Value::Double(l / r)),
        Rem => Ok(Value::Double(l % r)),
        _ => unreachable!("double_arith called with non-arithmetic op"),
    }
}

fn comparison(op: MirBinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    use MirBinaryOp::*;
    if let (Value::Str(l), Value::Str(r)) = (&left, &right) {
        let ord = l.as_ref().cmp(r.as_ref());
        return Ok(Value::Bool(match op {
            Lt => ord.is_lt(),
            LtEq => ord.is_le(),
            Gt => ord.is_gt(),
            GtEq => ord.is_ge(),
            _ => unreachable!(),
        }));
    }
    let (l, r) = (as_f64(&left), as_f64(&right));
    Ok(Value::Bool(match op {
        Lt => l < r,
        LtEq => l <= r,
        Gt => l > r,
        GtEq => l >= r,
        _ => unreachable!("comparison called with non-comparison op"),
    }))
}

fn bitwise(op: MirBinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    use MirBinaryOp::*;
    let (l, r) = (as_i64(&left), as_i64(&right));
    let result = match op {
        BitAnd => l & r,
        BitOr => l | r,
        BitXor => l ^ r,
        Shl => l << (r & 63),
        Shr => l >> (r & 63),
        _ => unreachable!("bitwise called with non-bitwise op"),
    };
    Ok(if matches!(left, Value::Long(_)) || matches!(right, Value::Long(_)) {
        Value::Long(result)
    } else {
        Value::Int(result as i32)
    })
}

pub fn dispatch_unary(op: MirUnaryOp, operand: Value, host: &mut impl OperatorHost) -> Result<Value, RuntimeError> {
    if let Value::Object(obj) = &operand {
        if op == MirUnaryOp::Neg {
            let class_name = obj.borrow().class_name.clone();
            return host.call_method(&format!("{class_name}.unaryMinus"), vec![operand.clone()]);
        }
    }
    builtin_unary(op, operand)
}

fn builtin_unary(op: MirUnaryOp, operand: Value) -> Result<Value, RuntimeError> {
    match (op, operand) {
        (MirUnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (MirUnaryOp::Plus, v @ (Value::Int(_) | Value::Long(_) | Value::Double(_) | Value::Float(_))) => Ok(v),
        (MirUnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(-n)),
        (MirUnaryOp::Neg, Value::Long(n)) => Ok(Value::Long(-n)),
        (MirUnaryOp::Neg, Value::Double(n)) => Ok(Value::Double(-n)),
        (MirUnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
        (op, v) => Err(RuntimeError::type_error(format!("cannot apply unary op {op:?} to {}", v.type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoHost;
    impl OperatorHost for NoHost {
        fn call_method(&mut self, name: &str, _args: Vec<Value>) -> Result<Value, RuntimeError> {
            Err(RuntimeError::method_error(name))
        }
    }

    #[test]
    fn int_plus_int_stays_int() {
        let v = dispatch_binary(MirBinaryOp::Add, Value::Int(2), Value::Int(3), &mut NoHost).unwrap();
        assert!(matches!(v, Value::Int(5)));
    }

    #[test]
    fn int_plus_double_promotes() {
        let v = dispatch_binary(MirBinaryOp::Add, Value::Int(2), Value::Double(0.5), &mut NoHost).unwrap();
        assert!(matches!(v, Value::Double(d) if d == 2.5));
    }

    #[test]
    fn string_concat_with_non_string_operand() {
        let v = dispatch_binary(MirBinaryOp::Add, Value::Str("x=".into()), Value::Int(4), &mut NoHost).unwrap();
        assert!(matches!(v, Value::Str(s) if &*s == "x=4"));
    }

    #[test]
    fn division_by_zero_traps() {
        let err = dispatch_binary(MirBinaryOp::Div, Value::Int(1), Value::Int(0), &mut NoHost).unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero));
    }

    #[test]
    fn object_left_operand_tries_overload_before_builtin_path() {
        struct RecordingHost(bool);
        impl OperatorHost for RecordingHost {
            fn call_method(&mut self, name: &str, _args: Vec<Value>) -> Result<Value, RuntimeError> {
                assert_eq!(name, "Vec2.plus");
                self.0 = true;
                Ok(Value::new_object("Vec2"))
            }
        }
        let mut host = RecordingHost(false);
        let left = Value::new_object("Vec2");
        let right = Value::new_object("Vec2");
        let _ = dispatch_binary(MirBinaryOp::Add, left, right, &mut host).unwrap();
        assert!(host.0);
    }
}
