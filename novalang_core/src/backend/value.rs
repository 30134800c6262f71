//! Runtime values shared by both back ends (§4.7). Grounded on the
//! teacher's `vm::value::Value` enum — a flat tagged union rather than a
//! trait-object hierarchy, so `ops::dispatch_binary` can match on a pair
//! of tags directly instead of going through dynamic dispatch twice.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Long(i64),
    Double(f64),
    Float(f32),
    Bool(bool),
    Char(char),
    Str(Rc<str>),
    Null,
    Unit,
    Object(Rc<RefCell<ObjectValue>>),
    Closure(Rc<ClosureValue>),
    /// A heap cell backing a captured `var` (§4.5 closure capture).
    /// `BoxRef`/`UnboxRef` are the only instructions that produce or
    /// consume this variant.
    Boxed(Rc<RefCell<Value>>),
}

#[derive(Debug)]
pub struct ObjectValue {
    pub class_name: String,
    pub fields: HashMap<String, Value>,
}

#[derive(Debug)]
pub struct ClosureValue {
    pub function: String,
    pub captures: Vec<Value>,
}

impl Value {
    pub fn new_object(class_name: impl Into<String>) -> Self {
        Value::Object(Rc::new(RefCell::new(ObjectValue {
            class_name: class_name.into(),
            fields: HashMap::new(),
        })))
    }

    /// `Nothing`/`null` and `false` are the only falsy values (§3.4: no
    /// implicit numeric-to-bool coercion in Nova).
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Boolean",
            Value::Char(_) => "Char",
            Value::Str(_) => "String",
            Value::Null => "Null",
            Value::Unit => "Unit",
            Value::Object(_) => "Object",
            Value::Closure(_) => "Function",
            Value::Boxed(_) => "Boxed",
        }
    }

    /// Structural equality as `==` sees it (§6.1 distinguishes `==` from
    /// `===`; reference equality is handled separately by the
    /// `refEquals` call `lower_hir` rewrites `===`/`!==` into, not here).
    pub fn structural_eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Long(b)) | (Long(b), Int(a)) => *a as i64 == *b,
            (Int(a), Double(b)) | (Double(b), Int(a)) => *a as f64 == *b,
            (Long(a), Double(b)) | (Double(b), Long(a)) => *a as f64 == *b,
            (Bool(a), Bool(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Null, Null) => true,
            (Unit, Unit) => true,
            (Object(a), Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Null => write!(f, "null"),
            Value::Unit => write!(f, "Unit"),
            Value::Object(obj) => write!(f, "{}@{:p}", obj.borrow().class_name, Rc::as_ptr(obj)),
            Value::Closure(c) => write!(f, "<function {}>", c.function),
            Value::Boxed(b) => write!(f, "{}", b.borrow()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_false_and_null_are_falsy() {
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::Null.truthy());
        assert!(Value::Int(0).truthy());
        assert!(Value::Unit.truthy());
    }

    #[test]
    fn structural_eq_widens_mixed_numeric_pairs() {
        assert!(Value::Int(1).structural_eq(&Value::Long(1)));
        assert!(Value::Int(2).structural_eq(&Value::Double(2.0)));
        assert!(!Value::Int(1).structural_eq(&Value::Int(2)));
    }

    #[test]
    fn two_distinct_objects_are_not_structurally_equal_by_identity_alone() {
        let a = Value::new_object("Point");
        let b = Value::new_object("Point");
        assert!(!a.structural_eq(&b));
    }
}
