//! The tree-walking back end (§4.7 `Evaluator`): executes a [`MirProgram`]
//! directly, one basic block at a time, with no intermediate bytecode.
//! Grounded on the teacher's `vm::interp::Interpreter` — a `locals: Vec<Value>`
//! frame per call plus a block cursor, rather than an operand-stack machine.
//!
//! Exception routing uses two distinct mechanisms that both funnel through
//! the same per-block `landing_pad` (§3.6): an explicit `raise()` already
//! moves the thrown value into the handler's `exception_local` and emits
//! `Terminator::Unwind`, which this evaluator treats as a plain same-frame
//! jump (the value is already sitting where the landing pad expects it).
//! An instruction that fails with a host [`RuntimeError`] (division by
//! zero, a missing method, a failed cast) has no such local prepared for
//! it ahead of time, so the evaluator does that part itself: on failure it
//! converts the error to a [`Value`], and if the current block names a
//! `landing_pad`, stores it into that local and jumps there, exactly as if
//! lowering had emitted an explicit `throw`.

use std::collections::HashMap;
use std::io::Write;

use novalang_runtime::{RegistrationCatalog, RuntimeError};

use crate::mir::{BasicBlock, BlockId, CallTarget, ConstValue, Instr, LocalId, MirFunction, MirProgram, Terminator};

use super::intrinsics;
use super::ops::{self, OperatorHost};
use super::value::Value;

/// Call-depth ceiling before the evaluator traps with
/// [`RuntimeError::StackOverflow`] rather than overflowing its own native
/// stack (§7 "StackOverflowError").
const MAX_CALL_DEPTH: usize = 4096;

/// A value that escaped a function call without being caught by any of
/// its own `try` blocks: either a user `throw`, or a host [`RuntimeError`]
/// converted to a value at the point it crossed a function boundary.
/// Propagates up through [`Evaluator::call`] until either a caller's
/// block has a `landing_pad` to catch it, or it reaches the program entry
/// point and becomes an [`RuntimeError::Uncaught`].
struct Thrown(Value);

enum Outcome {
    Value(Value),
    Thrown(Thrown),
}

/// Walks a [`MirProgram`] directly; implements [`OperatorHost`] so
/// `ops::dispatch_binary`/`dispatch_unary` can call back into user-defined
/// operator overloads through the same `Call` machinery as any other
/// method invocation.
pub struct Evaluator<'p> {
    program: &'p MirProgram,
    functions: HashMap<&'p str, &'p MirFunction>,
    catalog: &'p RegistrationCatalog,
    depth: usize,
    /// Where `println`/`print` write (§6.4): real stdout by default, but
    /// swappable for an in-memory buffer so a test can assert on program
    /// output without capturing the process's actual stdout. Grounded on
    /// the teacher's `Vm::emit_output`, which buffers into a `String`
    /// field rather than writing straight to stdout.
    output: Box<dyn Write + 'p>,
}

impl<'p> Evaluator<'p> {
    pub fn new(program: &'p MirProgram, catalog: &'p RegistrationCatalog) -> Self {
        Self::with_output(program, catalog, Box::new(std::io::stdout()))
    }

    /// Builds an evaluator that writes `println`/`print` output to `output`
    /// instead of stdout.
    pub fn with_output(program: &'p MirProgram, catalog: &'p RegistrationCatalog, output: Box<dyn Write + 'p>) -> Self {
        let functions = program.functions.iter().map(|f| (f.signature.name.as_str(), f)).collect();
        Self { program, functions, catalog, depth: 0, output }
    }

    /// Runs every top-level property initializer once, in declaration
    /// order, the way a program's module-state setup runs before `main`.
    pub fn run_initializers(&mut self) -> Result<(), RuntimeError> {
        let mut names: Vec<&str> = self
            .functions
            .keys()
            .copied()
            .filter(|n| n.starts_with("$init$"))
            .collect();
        names.sort_unstable();
        for name in names {
            self.call_by_name(name, Vec::new())?;
        }
        Ok(())
    }

    /// Calls a top-level function (or `Class.method`) by its MIR name,
    /// converting an uncaught thrown value into [`RuntimeError::Uncaught`]
    /// at this, the outermost, boundary.
    pub fn call_by_name(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match self.call(name, args)? {
            Outcome::Value(v) => Ok(v),
            Outcome::Thrown(Thrown(v)) => Err(RuntimeError::uncaught(v.to_string())),
        }
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Outcome, RuntimeError> {
        self.depth += 1;
        if self.depth > MAX_CALL_DEPTH {
            self.depth -= 1;
            return Err(RuntimeError::StackOverflow);
        }
        let result = match self.functions.get(name) {
            Some(function) => self.exec_function(function, args),
            None => intrinsics::call(self.catalog, name, &args, self.output.as_mut()).map(Outcome::Value),
        };
        self.depth -= 1;
        result
    }

    fn exec_function(&mut self, function: &'p MirFunction, args: Vec<Value>) -> Result<Outcome, RuntimeError> {
        let mut locals: Vec<Option<Value>> = vec![None; function.locals.len()];
        for (slot, arg) in locals.iter_mut().zip(args) {
            *slot = Some(arg);
        }

        let mut current = function.entry;
        loop {
            let block = function
                .block(current)
                .unwrap_or_else(|| panic!("MIR invariant: block {current} missing from {}", function.signature.name));

            match self.exec_block(function, block, &mut locals) {
                Ok(BlockOutcome::Jump(next)) => current = next,
                Ok(BlockOutcome::Return(v)) => return Ok(Outcome::Value(v.unwrap_or(Value::Unit))),
                Ok(BlockOutcome::Throw(v)) => return Ok(Outcome::Thrown(Thrown(v))),
                Err(thrown) => return Ok(Outcome::Thrown(thrown)),
            }
        }
    }

    /// Runs every instruction in `block`, then its terminator. Returns the
    /// next block to jump to, a function-level result, or (via `Err`) a
    /// value that escaped the whole function uncaught.
    fn exec_block(
        &mut self,
        function: &'p MirFunction,
        block: &'p BasicBlock,
        locals: &mut [Option<Value>],
    ) -> Result<BlockOutcome, Thrown> {
        for instr in &block.instructions {
            if let Err(err) = self.exec_instr(instr, locals) {
                match block.landing_pad {
                    Some((pad, exception_local)) => {
                        locals[exception_local.0 as usize] = Some(intrinsics::error_to_value(&err));
                        return Ok(BlockOutcome::Jump(pad));
                    }
                    None => return Err(Thrown(intrinsics::error_to_value(&err))),
                }
            }
        }

        match &block.terminator {
            Terminator::Return(local) => Ok(BlockOutcome::Return(local.map(|l| take_local(locals, l)))),
            Terminator::Jump(target) => Ok(BlockOutcome::Jump(*target)),
            Terminator::Branch { cond, then_block, else_block } => {
                let cond = take_local(locals, *cond);
                Ok(BlockOutcome::Jump(if cond.truthy() { *then_block } else { *else_block }))
            }
            Terminator::Switch { value, cases, default } => {
                let value = take_local(locals, *value);
                let target = cases
                    .iter()
                    .find(|(c, _)| const_matches(c, &value))
                    .map(|(_, b)| *b)
                    .unwrap_or(*default);
                Ok(BlockOutcome::Jump(target))
            }
            Terminator::Throw(local) => Ok(BlockOutcome::Throw(take_local(locals, *local))),
            // The value to catch was already moved into the handler's
            // exception_local by a preceding `Move` in this same block
            // (§ `raise`); the jump alone is all this terminator does.
            Terminator::Unwind { landing_pad } => Ok(BlockOutcome::Jump(*landing_pad)),
        }
    }

    fn exec_instr(&mut self, instr: &Instr, locals: &mut [Option<Value>]) -> Result<(), RuntimeError> {
        match instr {
            Instr::Const { dest, value, .. } => {
                set_local(locals, *dest, const_to_value(value));
            }
            Instr::Move { dest, src, .. } => {
                let v = read_local(locals, *src)?;
                set_local(locals, *dest, v);
            }
            Instr::UnaryOp { dest, op, operand, .. } => {
                let operand = read_local(locals, *operand)?;
                let result = ops::dispatch_unary(*op, operand, self)?;
                set_local(locals, *dest, result);
            }
            Instr::BinaryOp { dest, op, left, right, .. } => {
                let left = read_local(locals, *left)?;
                let right = read_local(locals, *right)?;
                let result = ops::dispatch_binary(*op, left, right, self)?;
                set_local(locals, *dest, result);
            }
            Instr::Call { dest, target, args, .. } => {
                let arg_values = args.iter().map(|a| read_local(locals, *a)).collect::<Result<Vec<_>, _>>()?;
                let result = self.dispatch_call(target, arg_values, locals)?;
                if let Some(dest) = dest {
                    set_local(locals, *dest, result);
                }
            }
            Instr::Alloc { dest, class_name, .. } => {
                set_local(locals, *dest, Value::new_object(class_name.clone()));
            }
            Instr::Load { dest, object, field, .. } => {
                let object = read_local(locals, *object)?;
                let value = self.load_field(&object, field)?;
                set_local(locals, *dest, value);
            }
            Instr::Store { object, field, value, .. } => {
                let object = read_local(locals, *object)?;
                let value = read_local(locals, *value)?;
                self.store_field(&object, field, value)?;
            }
            Instr::TypeCheck { dest, value, ty, .. } => {
                let value = read_local(locals, *value)?;
                set_local(locals, *dest, Value::Bool(value_matches_type(&value, ty)));
            }
            Instr::TypeCast { dest, value, ty, fallible, .. } => {
                let value = read_local(locals, *value)?;
                if value_matches_type(&value, ty) {
                    set_local(locals, *dest, value);
                } else if *fallible {
                    set_local(locals, *dest, Value::Null);
                } else {
                    return Err(RuntimeError::type_error(format!(
                        "cast failed: value of type {} is not {}",
                        value.type_name(),
                        ty
                    )));
                }
            }
            Instr::BoxRef { dest, value, .. } => {
                let value = read_local(locals, *value)?;
                set_local(locals, *dest, Value::Boxed(std::rc::Rc::new(std::cell::RefCell::new(value))));
            }
            Instr::UnboxRef { dest, boxed, .. } => {
                let boxed = read_local(locals, *boxed)?;
                let value = match boxed {
                    Value::Boxed(cell) => cell.borrow().clone(),
                    other => other,
                };
                set_local(locals, *dest, value);
            }
            Instr::MakeClosure { dest, function, captures, .. } => {
                let captures = captures.iter().map(|c| read_local(locals, *c)).collect::<Result<Vec<_>, _>>()?;
                set_local(
                    locals,
                    *dest,
                    Value::Closure(std::rc::Rc::new(super::value::ClosureValue { function: function.clone(), captures })),
                );
            }
        }
        Ok(())
    }

    fn dispatch_call(&mut self, target: &CallTarget, mut args: Vec<Value>, locals: &[Option<Value>]) -> Result<Value, RuntimeError> {
        let outcome = match target {
            CallTarget::Direct(name) => self.call(name, args)?,
            CallTarget::Dynamic { name, arity } => {
                let _ = arity;
                // A receiver-qualified dynamic call: try `ClassName.method`
                // (user-defined method, then `ClassName`/primitive-type-
                // qualified intrinsic, e.g. `String.uppercase`) against the
                // receiver's runtime tag before falling back to a bare-name
                // intrinsic/stdlib lookup.
                match args.first() {
                    Some(receiver) => {
                        let tag = match receiver {
                            Value::Object(obj) => obj.borrow().class_name.clone(),
                            other => other.type_name().to_string(),
                        };
                        let qualified = format!("{tag}.{name}");
                        if self.functions.contains_key(qualified.as_str()) {
                            return match self.call(&qualified, args)? {
                                Outcome::Value(v) => Ok(v),
                                Outcome::Thrown(t) => Err(self.escape(t, locals)),
                            };
                        }
                        match self.call(&qualified, args.clone()) {
                            Ok(outcome) => outcome,
                            Err(RuntimeError::MethodError(_)) => self.call(name, args)?,
                            Err(other) => return Err(other),
                        }
                    }
                    None => self.call(name, args)?,
                }
            }
            CallTarget::Value(local) => {
                let callee = read_local(locals, *local)?;
                match callee {
                    Value::Closure(closure) => {
                        let mut full_args = closure.captures.clone();
                        full_args.append(&mut args);
                        self.call(&closure.function, full_args)?
                    }
                    other => return Err(RuntimeError::type_error(format!("{} is not callable", other.type_name()))),
                }
            }
        };
        match outcome {
            Outcome::Value(v) => Ok(v),
            Outcome::Thrown(t) => Err(self.escape(t, locals)),
        }
    }

    /// A thrown value escaping a callee with no catcher anywhere becomes a
    /// host-level error the caller's own instruction-level `landing_pad`
    /// handling (in `exec_block`) can catch just like any other
    /// [`RuntimeError`] — `RuntimeError::Uncaught` round-trips back into a
    /// `Value` via [`intrinsics::error_to_value`] without losing the
    /// original message.
    fn escape(&self, thrown: Thrown, _locals: &[Option<Value>]) -> RuntimeError {
        RuntimeError::uncaught(thrown.0.to_string())
    }

    fn load_field(&mut self, object: &Value, field: &str) -> Result<Value, RuntimeError> {
        match object {
            Value::Object(obj) => obj
                .borrow()
                .fields
                .get(field)
                .cloned()
                .ok_or_else(|| RuntimeError::field_error(field, obj.borrow().class_name.clone())),
            Value::Null => Err(RuntimeError::null_pointer(format!("cannot read field '{field}' of null"))),
            // A property-style read on a non-Object receiver (`s.length`,
            // no call parens): the same qualified name a parenthesized
            // `s.length()` would dispatch to in `dispatch_call`'s
            // `CallTarget::Dynamic` arm, so `String.length` etc. serve both
            // syntaxes from one intrinsic entry.
            other => {
                let qualified = format!("{}.{field}", other.type_name());
                intrinsics::call(self.catalog, &qualified, std::slice::from_ref(other), self.output.as_mut())
                    .map_err(|_| RuntimeError::field_error(field, other.type_name()))
            }
        }
    }

    fn store_field(&self, object: &Value, field: &str, value: Value) -> Result<(), RuntimeError> {
        match object {
            Value::Object(obj) => {
                obj.borrow_mut().fields.insert(field.to_string(), value);
                Ok(())
            }
            Value::Null => Err(RuntimeError::null_pointer(format!("cannot write field '{field}' of null"))),
            other => Err(RuntimeError::field_error(field, other.type_name())),
        }
    }
}

impl<'p> OperatorHost for Evaluator<'p> {
    fn call_method(&mut self, qualified_name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match self.call(qualified_name, args)? {
            Outcome::Value(v) => Ok(v),
            Outcome::Thrown(t) => Err(RuntimeError::uncaught(t.0.to_string())),
        }
    }
}

enum BlockOutcome {
    Jump(BlockId),
    Return(Option<Value>),
    Throw(Value),
}

fn const_to_value(value: &ConstValue) -> Value {
    match value {
        ConstValue::Int(v) => Value::Int(*v),
        ConstValue::Long(v) => Value::Long(*v),
        ConstValue::Double(v) => Value::Double(*v),
        ConstValue::Float(v) => Value::Float(*v),
        ConstValue::Bool(v) => Value::Bool(*v),
        ConstValue::Char(v) => Value::Char(*v),
        ConstValue::Str(v) => Value::Str(v.as_str().into()),
        ConstValue::Null => Value::Null,
    }
}

fn const_matches(c: &ConstValue, v: &Value) -> bool {
    c == &match v {
        Value::Int(n) => ConstValue::Int(*n),
        Value::Long(n) => ConstValue::Long(*n),
        Value::Double(n) => ConstValue::Double(*n),
        Value::Float(n) => ConstValue::Float(*n),
        Value::Bool(b) => ConstValue::Bool(*b),
        Value::Char(c) => ConstValue::Char(*c),
        Value::Str(s) => ConstValue::Str(s.to_string()),
        Value::Null => ConstValue::Null,
        _ => return false,
    }
}

fn value_matches_type(value: &Value, ty: &crate::types::NovaType) -> bool {
    use crate::types::{NovaType, PrimitiveType};
    match (value, ty) {
        (_, NovaType::Primitive(PrimitiveType::Any)) => true,
        (Value::Null, NovaType::Nullable(_)) => true,
        (v, NovaType::Nullable(inner)) => value_matches_type(v, inner),
        (Value::Int(_), NovaType::Primitive(PrimitiveType::Int)) => true,
        (Value::Long(_), NovaType::Primitive(PrimitiveType::Long)) => true,
        (Value::Double(_), NovaType::Primitive(PrimitiveType::Double)) => true,
        (Value::Float(_), NovaType::Primitive(PrimitiveType::Float)) => true,
        (Value::Bool(_), NovaType::Primitive(PrimitiveType::Boolean)) => true,
        (Value::Char(_), NovaType::Primitive(PrimitiveType::Char)) => true,
        (Value::Str(_), NovaType::Primitive(PrimitiveType::String)) => true,
        (Value::Unit, NovaType::Primitive(PrimitiveType::Unit)) => true,
        (Value::Object(obj), NovaType::Class { qualified_name, .. }) => &obj.borrow().class_name == qualified_name,
        _ => false,
    }
}

fn take_local(locals: &mut [Option<Value>], id: LocalId) -> Value {
    locals[id.0 as usize].take().unwrap_or(Value::Unit)
}

fn read_local(locals: &[Option<Value>], id: LocalId) -> Result<Value, RuntimeError> {
    locals[id.0 as usize]
        .clone()
        .ok_or_else(|| RuntimeError::custom(format!("local {id} read before initialization")))
}

fn set_local(locals: &mut [Option<Value>], id: LocalId, value: Value) {
    locals[id.0 as usize] = Some(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::lower_hir;
    use crate::lower_mir;
    use crate::mir::MirProgram;
    use novalang_parser::parse;

    fn mir_for(source: &str) -> MirProgram {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors.errors());
        let result = Analyzer::new("test.nova", false).analyze(&program);
        let hir = lower_hir::lower_program(&program, &result.types, "test.nova").unwrap();
        lower_mir::lower_program(&hir).unwrap()
    }

    fn run(mir: &MirProgram) -> (Value, String) {
        let catalog = RegistrationCatalog::new();
        let mut buf = Vec::new();
        let result = {
            let mut eval = Evaluator::with_output(mir, &catalog, Box::new(&mut buf));
            eval.run_initializers().unwrap();
            eval.call_by_name("main", Vec::new()).unwrap()
        };
        (result, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn any_type_check_matches_the_primitive_variant_not_a_bare_any() {
        assert!(value_matches_type(&Value::Int(1), &NovaType::any()));
        assert!(!value_matches_type(&Value::Int(1), &NovaType::Class { qualified_name: "Foo".to_string(), type_args: vec![] }));
    }

    #[test]
    fn bare_builtin_call_dispatches_through_dynamic_not_as_a_value_read() {
        let mir = mir_for("fun main() { println(1 + 2 * 3) }");
        let (_, out) = run(&mir);
        assert_eq!(out, "7\n");
    }

    #[test]
    fn property_style_access_on_a_primitive_reaches_the_qualified_intrinsic() {
        let mir = mir_for("fun main() { val s = \"hello\"; println(s.length); println(s.uppercase()) }");
        let (_, out) = run(&mir);
        assert_eq!(out, "5\nHELLO\n");
    }

    #[test]
    fn output_is_captured_in_the_injected_sink_not_real_stdout() {
        let mir = mir_for("fun main() { println(\"hi\") }");
        let (_, out) = run(&mir);
        assert_eq!(out, "hi\n");
    }
}
