//! Built-in operations the evaluator falls back to once a call's target
//! name resolves to neither a user-defined `MirFunction` nor a method on
//! the receiver's own class (§6.4: the registration catalog only carries
//! metadata — arity, owner, descriptor — not an implementation; something
//! still has to decide what `println` or `List.add` actually does at
//! run time). Grounded on the teacher's `vm::builtins_io` /
//! `intrinsics_exec` split: a small name-keyed dispatch table kept
//! separate from the evaluator's own instruction loop. `println`/`print`
//! write through the caller-supplied `output` sink rather than straight
//! to stdout, mirroring the teacher's `Vm::emit_output` buffering so a
//! test can assert on a program's output instead of capturing the real
//! process stdout.
//!
//! Collection values (`List`/`Set`/`Map`) have no dedicated [`Value`]
//! variant; `lower_mir::lower_collection_literal` allocates a plain
//! `Object` whose fields this module reads and writes directly — `"$len"`
//! for element count, `"0"`, `"1"`, ... for list/set elements, and a
//! `"#"`-prefixed rendering of the key for map entries. This is
//! deliberately the minimum needed to make the few collection methods the
//! scenario corpus actually calls observable through the evaluator; a
//! real collections library is out of scope for the compiler core and
//! would replace this module's handful of cases with genuine
//! `StaticCall` targets resolved against a real runtime.

use std::fmt::Write as _;
use std::io::Write as IoWrite;

use novalang_runtime::{RegistrationCatalog, RuntimeError};

use super::value::Value;

const LEN_FIELD: &str = "$len";

/// Dispatches a call whose target [`crate::mir::CallTarget`] did not match
/// any known [`crate::mir::MirFunction`] (§4.7 `Evaluator::call`). `output`
/// is where `println`/`print` write — the caller decides whether that's
/// real stdout or an in-memory buffer (see [`super::evaluator::Evaluator::with_output`]).
pub fn call(catalog: &RegistrationCatalog, name: &str, args: &[Value], output: &mut dyn IoWrite) -> Result<Value, RuntimeError> {
    match name {
        "println" => {
            emit_line(output, &render_args(args))?;
            Ok(Value::Unit)
        }
        "print" => {
            emit(output, &render_args(args))?;
            Ok(Value::Unit)
        }
        "String.length" => Ok(Value::Int(string_arg(args, 0)?.chars().count() as i32)),
        "String.uppercase" => Ok(Value::Str(string_arg(args, 0)?.to_uppercase().into())),
        "String.lowercase" => Ok(Value::Str(string_arg(args, 0)?.to_lowercase().into())),
        "String.trim" => Ok(Value::Str(string_arg(args, 0)?.trim().into())),
        "List.add" | "Set.add" => collection_push(args),
        "List.get" => collection_get(args),
        "Map.put" => map_put(args),
        "Map.get" => map_get(args),
        "size" | "List.size" | "Set.size" | "Map.size" => collection_size(args),
        "Error" => Ok(error_object(args)),
        other => match catalog.lookup(other) {
            Some(reg) if reg.accepts_arity(args.len()) => Err(RuntimeError::unimplemented(format!(
                "'{other}' is registered ({}) but has no built-in evaluator implementation",
                reg.nova_signature
            ))),
            _ => Err(RuntimeError::method_error(other)),
        },
    }
}

/// Nova-level `Error(message)` constructor (`throw Error("bad")`): the
/// only builtin exception type this module models, built the same way
/// [`error_to_value`] builds a catchable value from a trapped
/// [`RuntimeError`] — a plain `Object` tagged `"Error"` carrying whatever
/// was passed as `message`.
fn error_object(args: &[Value]) -> Value {
    let message = match args.first() {
        Some(Value::Str(s)) => s.clone(),
        Some(other) => other.to_string().into(),
        None => "".into(),
    };
    let obj = Value::new_object("Error");
    if let Value::Object(cell) = &obj {
        cell.borrow_mut().fields.insert("message".to_string(), Value::Str(message));
    }
    obj
}

/// Converts a trapped [`RuntimeError`] into a catchable [`Value`]
/// (§4.7 `Evaluator::exec_block`'s landing-pad handling), so a Nova-level
/// `catch` block can inspect `.message` the same way it would a
/// user-thrown object. Exposed as a plain `Object` tagged `"RuntimeError"`
/// rather than a builtin exception hierarchy — there is no such hierarchy
/// to model here, only the one field a `catch (e: Exception)` clause's
/// body can reasonably read.
pub fn error_to_value(err: &RuntimeError) -> Value {
    let obj = Value::new_object("RuntimeError");
    if let Value::Object(cell) = &obj {
        cell.borrow_mut().fields.insert("message".to_string(), Value::Str(err.to_string().into()));
    }
    obj
}

fn render_args(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{a}");
    }
    out
}

fn emit(output: &mut dyn IoWrite, s: &str) -> Result<(), RuntimeError> {
    output.write_all(s.as_bytes()).map_err(|e| RuntimeError::custom(format!("write failed: {e}")))
}

fn emit_line(output: &mut dyn IoWrite, s: &str) -> Result<(), RuntimeError> {
    emit(output, s)?;
    output.write_all(b"\n").map_err(|e| RuntimeError::custom(format!("write failed: {e}")))
}

fn string_arg(args: &[Value], index: usize) -> Result<std::rc::Rc<str>, RuntimeError> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(RuntimeError::type_error(format!("expected String, found {}", other.type_name()))),
        None => Err(RuntimeError::argument_error("missing receiver argument")),
    }
}

fn receiver_object(args: &[Value]) -> Result<&std::rc::Rc<std::cell::RefCell<super::value::ObjectValue>>, RuntimeError> {
    match args.first() {
        Some(Value::Object(obj)) => Ok(obj),
        Some(other) => Err(RuntimeError::type_error(format!("expected collection receiver, found {}", other.type_name()))),
        None => Err(RuntimeError::argument_error("missing receiver argument")),
    }
}

fn collection_len(obj: &super::value::ObjectValue) -> i32 {
    match obj.fields.get(LEN_FIELD) {
        Some(Value::Int(n)) => *n,
        _ => 0,
    }
}

fn collection_push(args: &[Value]) -> Result<Value, RuntimeError> {
    let obj = receiver_object(args)?;
    let value = args.get(1).cloned().unwrap_or(Value::Unit);
    let mut obj = obj.borrow_mut();
    let len = collection_len(&obj);
    obj.fields.insert(len.to_string(), value);
    obj.fields.insert(LEN_FIELD.to_string(), Value::Int(len + 1));
    Ok(Value::Bool(true))
}

fn collection_get(args: &[Value]) -> Result<Value, RuntimeError> {
    let obj = receiver_object(args)?;
    let index = match args.get(1) {
        Some(Value::Int(n)) => *n,
        _ => return Err(RuntimeError::argument_error("List.get expects an Int index")),
    };
    let obj = obj.borrow();
    let len = collection_len(&obj);
    if index < 0 || index >= len {
        return Err(RuntimeError::bounds_error(index.max(0) as usize, len as usize));
    }
    Ok(obj.fields.get(&index.to_string()).cloned().unwrap_or(Value::Null))
}

fn collection_size(args: &[Value]) -> Result<Value, RuntimeError> {
    let obj = receiver_object(args)?;
    Ok(Value::Int(collection_len(&obj.borrow())))
}

fn map_key(value: &Value) -> String {
    format!("#{value}")
}

fn map_put(args: &[Value]) -> Result<Value, RuntimeError> {
    let obj = receiver_object(args)?;
    let key = args.get(1).ok_or_else(|| RuntimeError::argument_error("Map.put expects a key"))?;
    let value = args.get(2).cloned().unwrap_or(Value::Unit);
    let mut obj = obj.borrow_mut();
    let previous = obj.fields.insert(map_key(key), value);
    Ok(previous.unwrap_or(Value::Null))
}

fn map_get(args: &[Value]) -> Result<Value, RuntimeError> {
    let obj = receiver_object(args)?;
    let key = args.get(1).ok_or_else(|| RuntimeError::argument_error("Map.get expects a key"))?;
    Ok(obj.borrow().fields.get(&map_key(key)).cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> Vec<u8> {
        Vec::new()
    }

    #[test]
    fn list_add_then_get_round_trips() {
        let mut out = sink();
        let list = Value::new_object("List");
        call(&RegistrationCatalog::new(), "List.add", &[list.clone(), Value::Int(7)], &mut out).unwrap();
        let got = call(&RegistrationCatalog::new(), "List.get", &[list.clone(), Value::Int(0)], &mut out).unwrap();
        assert!(matches!(got, Value::Int(7)));
        let size = call(&RegistrationCatalog::new(), "List.size", &[list], &mut out).unwrap();
        assert!(matches!(size, Value::Int(1)));
    }

    #[test]
    fn list_get_out_of_bounds_traps() {
        let mut out = sink();
        let list = Value::new_object("List");
        let err = call(&RegistrationCatalog::new(), "List.get", &[list, Value::Int(0)], &mut out).unwrap_err();
        assert!(matches!(err, RuntimeError::BoundsError { .. }));
    }

    #[test]
    fn map_put_then_get_round_trips() {
        let mut out = sink();
        let map = Value::new_object("Map");
        call(&RegistrationCatalog::new(), "Map.put", &[map.clone(), Value::Str("c".into()), Value::Int(3)], &mut out).unwrap();
        let got = call(&RegistrationCatalog::new(), "Map.get", &[map.clone(), Value::Str("c".into())], &mut out).unwrap();
        assert!(matches!(got, Value::Int(3)));
        let miss = call(&RegistrationCatalog::new(), "Map.get", &[map, Value::Str("z".into())], &mut out).unwrap();
        assert!(matches!(miss, Value::Null));
    }

    #[test]
    fn string_length_counts_chars_not_bytes() {
        let mut out = sink();
        let v = call(&RegistrationCatalog::new(), "String.length", &[Value::Str("café".into())], &mut out).unwrap();
        assert!(matches!(v, Value::Int(4)));
    }

    #[test]
    fn unregistered_name_traps_as_method_error() {
        let mut out = sink();
        let err = call(&RegistrationCatalog::new(), "nope", &[], &mut out).unwrap_err();
        assert!(matches!(err, RuntimeError::MethodError(_)));
    }

    #[test]
    fn error_to_value_exposes_message_field() {
        let v = error_to_value(&RuntimeError::DivisionByZero);
        if let Value::Object(obj) = v {
            assert!(matches!(obj.borrow().fields.get("message"), Some(Value::Str(_))));
        } else {
            panic!("expected Object value");
        }
    }

    #[test]
    fn error_constructor_carries_its_message() {
        let mut out = sink();
        let v = call(&RegistrationCatalog::new(), "Error", &[Value::Str("bad".into())], &mut out).unwrap();
        if let Value::Object(obj) = v {
            assert_eq!(obj.borrow().class_name, "Error");
            assert!(matches!(obj.borrow().fields.get("message"), Some(Value::Str(s)) if &**s == "bad"));
        } else {
            panic!("expected Object value");
        }
    }

    #[test]
    fn println_writes_to_the_injected_sink_not_stdout() {
        let mut out = sink();
        call(&RegistrationCatalog::new(), "println", &[Value::Str("hi".into())], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hi\n");
    }
}
