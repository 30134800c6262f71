//! HIR → MIR lowering (§4.5): structured control flow becomes an explicit
//! control-flow graph, `when`/`if` expressions become branches joined back
//! through a shared result local, lambdas are split off into their own
//! functions with captures threaded as leading parameters, and `try`
//! regions get a landing pad built from plain `TypeCheck`/`Branch`
//! primitives rather than a separate exception-table structure.

mod capture;

use std::collections::{HashMap, HashSet};

use novalang_parser::span::Span;

use crate::error::LoweringError;
use crate::hir::{
    HirArg, HirBinaryOp, HirBlock, HirClass, HirCollectionElement, HirCollectionKind, HirExpr,
    HirFunction, HirParam, HirProgram, HirStmt, HirUnaryOp,
};
use crate::mir::{
    BasicBlock, BlockId, CallTarget, ConstValue, Instr, LocalId, LocalSlot, MirBinaryOp,
    MirClass, MirFunction, MirProgram, MirSignature, MirUnaryOp, Terminator,
};
use crate::types::NovaType;

/// Read-only program-wide facts every function builder consults: which
/// plain names are known top-level (or extension) functions, so a call's
/// target can be resolved to `Direct` instead of falling back to
/// `Dynamic` dispatch.
struct ProgramCtx {
    known_functions: HashSet<String>,
}

pub fn lower_program(hir: &HirProgram) -> Result<MirProgram, LoweringError> {
    let prog_ctx = ProgramCtx {
        known_functions: hir.functions.iter().map(|f| f.name.clone()).collect(),
    };
    let mut lambda_seq: u32 = 0;
    let mut functions = Vec::new();
    let mut extra = Vec::new();

    for f in &hir.functions {
        functions.push(lower_free_function(f, &prog_ctx, &mut lambda_seq, &mut extra)?);
    }

    let mut classes = Vec::with_capacity(hir.classes.len());
    for c in &hir.classes {
        classes.push(MirClass {
            name: c.name.clone(),
            fields: c.fields.iter().map(|f| f.name.clone()).collect(),
            superclass: c.superclass.clone(),
        });
        for m in &c.methods {
            functions.push(lower_method(m, c, &prog_ctx, &mut lambda_seq, &mut extra)?);
        }
    }

    // A top-level `val`/`var`'s initializer becomes a zero-arg function
    // the back end calls once at program start to populate a global
    // table keyed by name; there is no dedicated "global" MIR instruction,
    // so this is the simplest structural fit for module-level state.
    for p in &hir.top_level_properties {
        let name = format!("$init${}", p.name);
        let body: HirBlock = match &p.initializer {
            Some(init) => vec![HirStmt::Return { value: Some(init.clone()), span: p.span }],
            None => vec![HirStmt::Return { value: None, span: p.span }],
        };
        functions.push(lower_function_body(
            name,
            &[],
            &body,
            p.ty.clone(),
            &prog_ctx,
            &mut lambda_seq,
            &mut extra,
        )?);
    }

    functions.extend(extra);

    Ok(MirProgram { functions, classes })
}

fn lower_free_function(
    f: &HirFunction,
    prog_ctx: &ProgramCtx,
    lambda_seq: &mut u32,
    extra: &mut Vec<MirFunction>,
) -> Result<MirFunction, LoweringError> {
    lower_function_body(f.name.clone(), &f.params, &f.body, f.return_type.clone(), prog_ctx, lambda_seq, extra)
}

fn lower_method(
    m: &HirFunction,
    owner: &HirClass,
    prog_ctx: &ProgramCtx,
    lambda_seq: &mut u32,
    extra: &mut Vec<MirFunction>,
) -> Result<MirFunction, LoweringError> {
    let this_param = HirParam {
        name: "this".to_string(),
        ty: NovaType::Class { qualified_name: owner.name.clone(), type_args: Vec::new() },
        default_value: None,
        is_vararg: false,
        span: owner.span,
    };
    let mut params = Vec::with_capacity(m.params.len() + 1);
    params.push(this_param);
    params.extend(m.params.iter().cloned());
    lower_function_body(
        format!("{}.{}", owner.name, m.name),
        &params,
        &m.body,
        m.return_type.clone(),
        prog_ctx,
        lambda_seq,
        extra,
    )
}

/// Shared entry point for a free function, a class method (receiver
/// already threaded into `params` by the caller), a lambda, or a
/// synthetic top-level-property initializer.
fn lower_function_body(
    name: String,
    params: &[HirParam],
    body: &HirBlock,
    return_type: NovaType,
    prog_ctx: &ProgramCtx,
    lambda_seq: &mut u32,
    extra: &mut Vec<MirFunction>,
) -> Result<MirFunction, LoweringError> {
    let captured_names = capture::names_requiring_boxing(body);
    let mut builder = FunctionBuilder::new(&name, prog_ctx, lambda_seq, extra, captured_names);

    for p in params {
        builder.declare_param(&p.name, p.ty.clone());
    }

    builder.lower_block(body)?;
    builder.finish_with_implicit_return();

    Ok(MirFunction {
        signature: MirSignature {
            name,
            param_types: params.iter().map(|p| p.ty.clone()).collect(),
            return_type,
        },
        locals: builder.locals,
        blocks: builder.finish_blocks(),
        entry: BlockId(0),
    })
}

struct Handler {
    landing_pad: BlockId,
    exception_local: LocalId,
    finally: Option<HirBlock>,
}

struct LoopCx {
    label: Option<String>,
    latch: BlockId,
    exit: BlockId,
    handlers_len_at_entry: usize,
}

struct BlockBuf {
    id: BlockId,
    instructions: Vec<Instr>,
    terminator: Option<Terminator>,
    landing_pad: Option<(BlockId, LocalId)>,
}

struct FunctionBuilder<'a> {
    owner_name: &'a str,
    prog_ctx: &'a ProgramCtx,
    lambda_seq: &'a mut u32,
    extra: &'a mut Vec<MirFunction>,
    captured_names: HashSet<String>,
    locals: Vec<LocalSlot>,
    boxed_locals: HashSet<u32>,
    scopes: Vec<HashMap<String, LocalId>>,
    blocks: Vec<BlockBuf>,
    current: BlockId,
    loops: Vec<LoopCx>,
    handlers: Vec<Handler>,
}

impl<'a> FunctionBuilder<'a> {
    fn new(
        owner_name: &'a str,
        prog_ctx: &'a ProgramCtx,
        lambda_seq: &'a mut u32,
        extra: &'a mut Vec<MirFunction>,
        captured_names: HashSet<String>,
    ) -> Self {
        let entry = BlockBuf { id: BlockId(0), instructions: Vec::new(), terminator: None, landing_pad: None };
        FunctionBuilder {
            owner_name,
            prog_ctx,
            lambda_seq,
            extra,
            captured_names,
            locals: Vec::new(),
            boxed_locals: HashSet::new(),
            scopes: vec![HashMap::new()],
            blocks: vec![entry],
            current: BlockId(0),
            loops: Vec::new(),
            handlers: Vec::new(),
        }
    }

    fn fresh_local(&mut self, ty: NovaType) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(LocalSlot { name: format!("%{}", id.0), ty, boxed: false });
        id
    }

    fn fresh_named_local(&mut self, name: &str, ty: NovaType) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(LocalSlot { name: name.to_string(), ty, boxed: false });
        id
    }

    fn fresh_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BlockBuf { id, instructions: Vec::new(), terminator: None, landing_pad: None });
        id
    }

    fn declare_param(&mut self, name: &str, ty: NovaType) {
        let boxed = self.captured_names.contains(name);
        if boxed {
            let value_param = self.fresh_named_local(&format!("{name}$param"), ty.clone());
            self.scopes.last_mut().unwrap().insert(format!("{name}$param"), value_param);
            let box_local = self.fresh_named_local(name, ty);
            self.locals[box_local.0 as usize].boxed = true;
            self.boxed_locals.insert(box_local.0);
            self.emit(Instr::BoxRef { dest: box_local, value: value_param, span: Span::empty() });
            self.scopes.last_mut().unwrap().insert(name.to_string(), box_local);
        } else {
            let local = self.fresh_named_local(name, ty);
            self.scopes.last_mut().unwrap().insert(name.to_string(), local);
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, local: LocalId) {
        self.scopes.last_mut().unwrap().insert(name.to_string(), local);
    }

    fn lookup(&self, name: &str) -> Option<LocalId> {
        for scope in self.scopes.iter().rev() {
            if let Some(id) = scope.get(name) {
                return Some(*id);
            }
        }
        None
    }

    fn emit(&mut self, instr: Instr) {
        let idx = self.current.0 as usize;
        if self.blocks[idx].landing_pad.is_none() {
            if let Some(h) = self.handlers.last() {
                self.blocks[idx].landing_pad = Some((h.landing_pad, h.exception_local));
            }
        }
        self.blocks[idx].instructions.push(instr);
    }

    fn terminate(&mut self, term: Terminator) {
        let idx = self.current.0 as usize;
        self.blocks[idx].terminator = Some(term);
    }

    fn is_terminated(&self) -> bool {
        self.blocks[self.current.0 as usize].terminator.is_some()
    }

    /// Starts a fresh open block after `terminate` has closed the current
    /// one, so statements following a `return`/`break`/`continue`/`throw`
    /// (unreachable per the analyzer, but still present in the tree) have
    /// somewhere harmless to land.
    fn start_new_block(&mut self) {
        self.current = self.fresh_block();
    }

    fn finish_with_implicit_return(&mut self) {
        if !self.is_terminated() {
            self.terminate(Terminator::Return(None));
        }
    }

    fn finish_blocks(self) -> Vec<BasicBlock> {
        self.blocks
            .into_iter()
            .map(|b| BasicBlock {
                id: b.id,
                instructions: b.instructions,
                terminator: b.terminator.unwrap_or(Terminator::Return(None)),
                landing_pad: b.landing_pad,
            })
            .collect()
    }

    fn lower_block(&mut self, block: &HirBlock) -> Result<(), LoweringError> {
        for stmt in block {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    /// Emits the instructions of `finally` into the current block without
    /// consuming it from the active handler (every exit from a protected
    /// region gets its own copy, §4.5).
    fn emit_finally(&mut self, finally: &Option<HirBlock>) -> Result<(), LoweringError> {
        if let Some(f) = finally {
            self.push_scope();
            self.lower_block(f)?;
            self.pop_scope();
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &HirStmt) -> Result<(), LoweringError> {
        match stmt {
            HirStmt::Expr(e) => {
                self.lower_expr(e)?;
                Ok(())
            }
            HirStmt::Let { name, ty, is_mutable: _, value, span: _ } => {
                let value_local = self.lower_expr(value)?;
                if self.captured_names.contains(name) {
                    let box_local = self.fresh_named_local(name, ty.clone());
                    self.locals[box_local.0 as usize].boxed = true;
                    self.boxed_locals.insert(box_local.0);
                    self.emit(Instr::BoxRef { dest: box_local, value: value_local, span: value.span() });
                    self.declare(name, box_local);
                } else {
                    let local = self.fresh_named_local(name, ty.clone());
                    self.emit(Instr::Move { dest: local, src: value_local, span: value.span() });
                    self.declare(name, local);
                }
                Ok(())
            }
            HirStmt::Assign { target, value, span } => self.lower_assign(target, value, *span),
            HirStmt::If { condition, then_branch, else_branch, .. } => {
                let cond_local = self.lower_expr(condition)?;
                let then_block = self.fresh_block();
                let else_block = self.fresh_block();
                let join_block = self.fresh_block();
                self.terminate(Terminator::Branch { cond: cond_local, then_block, else_block });

                self.current = then_block;
                self.push_scope();
                self.lower_block(then_branch)?;
                self.pop_scope();
                if !self.is_terminated() {
                    self.terminate(Terminator::Jump(join_block));
                }

                self.current = else_block;
                if let Some(e) = else_branch {
                    self.push_scope();
                    self.lower_block(e)?;
                    self.pop_scope();
                }
                if !self.is_terminated() {
                    self.terminate(Terminator::Jump(join_block));
                }

                self.current = join_block;
                Ok(())
            }
            HirStmt::While { label, condition, body, .. } => {
                let header = self.fresh_block();
                let body_block = self.fresh_block();
                let exit = self.fresh_block();
                self.terminate(Terminator::Jump(header));

                self.current = header;
                let cond_local = self.lower_expr(condition)?;
                self.terminate(Terminator::Branch { cond: cond_local, then_block: body_block, else_block: exit });

                self.loops.push(LoopCx {
                    label: label.clone(),
                    latch: header,
                    exit,
                    handlers_len_at_entry: self.handlers.len(),
                });
                self.current = body_block;
                self.push_scope();
                self.lower_block(body)?;
                self.pop_scope();
                if !self.is_terminated() {
                    self.terminate(Terminator::Jump(header));
                }
                self.loops.pop();

                self.current = exit;
                Ok(())
            }
            HirStmt::DoWhile { label, body, condition, .. } => {
                let body_block = self.fresh_block();
                let latch = self.fresh_block();
                let exit = self.fresh_block();
                self.terminate(Terminator::Jump(body_block));

                self.loops.push(LoopCx {
                    label: label.clone(),
                    latch,
                    exit,
                    handlers_len_at_entry: self.handlers.len(),
                });
                self.current = body_block;
                self.push_scope();
                self.lower_block(body)?;
                self.pop_scope();
                if !self.is_terminated() {
                    self.terminate(Terminator::Jump(latch));
                }
                self.loops.pop();

                self.current = latch;
                let cond_local = self.lower_expr(condition)?;
                self.terminate(Terminator::Branch { cond: cond_local, then_block: body_block, else_block: exit });

                self.current = exit;
                Ok(())
            }
            HirStmt::For { label, variable, iterable, body, span } => {
                let iterable_local = self.lower_expr(iterable)?;
                let iter_local = self.fresh_local(NovaType::any());
                self.emit(Instr::Call {
                    dest: Some(iter_local),
                    target: CallTarget::Dynamic { name: "iterator".to_string(), arity: 0 },
                    args: vec![iterable_local],
                    span: *span,
                });

                let header = self.fresh_block();
                let body_block = self.fresh_block();
                let exit = self.fresh_block();
                self.terminate(Terminator::Jump(header));

                self.current = header;
                let has_next = self.fresh_local(NovaType::boolean());
                self.emit(Instr::Call {
                    dest: Some(has_next),
                    target: CallTarget::Dynamic { name: "hasNext".to_string(), arity: 0 },
                    args: vec![iter_local],
                    span: *span,
                });
                self.terminate(Terminator::Branch { cond: has_next, then_block: body_block, else_block: exit });

                self.loops.push(LoopCx {
                    label: label.clone(),
                    latch: header,
                    exit,
                    handlers_len_at_entry: self.handlers.len(),
                });
                self.current = body_block;
                let item_local = self.fresh_named_local(variable, NovaType::any());
                self.emit(Instr::Call {
                    dest: Some(item_local),
                    target: CallTarget::Dynamic { name: "next".to_string(), arity: 0 },
                    args: vec![iter_local],
                    span: *span,
                });
                self.push_scope();
                self.declare(variable, item_local);
                self.lower_block(body)?;
                self.pop_scope();
                if !self.is_terminated() {
                    self.terminate(Terminator::Jump(header));
                }
                self.loops.pop();

                self.current = exit;
                Ok(())
            }
            HirStmt::Return { value, span } => {
                let value_local = value.as_ref().map(|v| self.lower_expr(v)).transpose()?;
                self.run_all_finally(*span)?;
                self.terminate(Terminator::Return(value_local));
                self.start_new_block();
                Ok(())
            }
            HirStmt::Break { label, span } => {
                let idx = self.find_loop(label.as_deref(), *span)?;
                let (exit, from) = (self.loops[idx].exit, self.loops[idx].handlers_len_at_entry);
                self.run_finally_from(from, *span)?;
                self.terminate(Terminator::Jump(exit));
                self.start_new_block();
                Ok(())
            }
            HirStmt::Continue { label, span } => {
                let idx = self.find_loop(label.as_deref(), *span)?;
                let (latch, from) = (self.loops[idx].latch, self.loops[idx].handlers_len_at_entry);
                self.run_finally_from(from, *span)?;
                self.terminate(Terminator::Jump(latch));
                self.start_new_block();
                Ok(())
            }
            HirStmt::Throw { value, span } => {
                let value_local = self.lower_expr(value)?;
                self.raise(value_local, *span);
                self.start_new_block();
                Ok(())
            }
            HirStmt::Try { body, catches, finally, span } => {
                self.lower_try(body, catches, finally, *span, |b, s| b.lower_block(s))
            }
            HirStmt::Block { body, .. } => {
                self.push_scope();
                self.lower_block(body)?;
                self.pop_scope();
                Ok(())
            }
        }
    }

    fn lower_assign(&mut self, target: &HirExpr, value: &HirExpr, span: Span) -> Result<(), LoweringError> {
        match target {
            HirExpr::Identifier { name, .. } => {
                let value_local = self.lower_expr(value)?;
                let local = self
                    .lookup(name)
                    .ok_or_else(|| LoweringError::InvalidReference { detail: format!("unresolved name '{name}'"), span })?;
                if self.boxed_locals.contains(&local.0) {
                    self.emit(Instr::Store { object: local, field: "$value".to_string(), value: value_local, span });
                } else {
                    self.emit(Instr::Move { dest: local, src: value_local, span });
                }
                Ok(())
            }
            HirExpr::Member { receiver, name, .. } => {
                let receiver_local = self.lower_expr(receiver)?;
                let value_local = self.lower_expr(value)?;
                self.emit(Instr::Store { object: receiver_local, field: name.clone(), value: value_local, span });
                Ok(())
            }
            other => Err(LoweringError::InternalInvariant {
                detail: format!("assignment target {other:?} did not lower to a name or member"),
                span,
            }),
        }
    }

    fn find_loop(&self, label: Option<&str>, span: Span) -> Result<usize, LoweringError> {
        let search = self.loops.iter().enumerate().rev();
        for (i, l) in search {
            match label {
                Some(want) => {
                    if l.label.as_deref() == Some(want) {
                        return Ok(i);
                    }
                }
                None => return Ok(i),
            }
        }
        Err(LoweringError::InternalInvariant { detail: "break/continue outside of a loop".to_string(), span })
    }

    /// Runs every active handler's `finally`, innermost first (a `return`
    /// unwinds through all of them).
    fn run_all_finally(&mut self, span: Span) -> Result<(), LoweringError> {
        self.run_finally_from(0, span)
    }

    /// Runs the `finally` of every handler entered at or after index
    /// `from`, innermost (highest index) first.
    fn run_finally_from(&mut self, from: usize, _span: Span) -> Result<(), LoweringError> {
        let finallies: Vec<Option<HirBlock>> = self.handlers[from..].iter().map(|h| h.finally.clone()).collect();
        for f in finallies.iter().rev() {
            self.emit_finally(f)?;
        }
        Ok(())
    }

    /// Terminates the current block by raising `value_local`: unwinds to
    /// the nearest active handler's landing pad, or escapes the function
    /// entirely via `Throw` if none is active.
    fn raise(&mut self, value_local: LocalId, span: Span) {
        match self.handlers.last() {
            Some(h) => {
                let (exception_local, landing_pad) = (h.exception_local, h.landing_pad);
                self.emit(Instr::Move { dest: exception_local, src: value_local, span });
                self.terminate(Terminator::Unwind { landing_pad });
            }
            None => self.terminate(Terminator::Throw(value_local)),
        }
    }

    fn lower_try(
        &mut self,
        body: &HirBlock,
        catches: &[crate::hir::HirCatch],
        finally: &Option<HirBlock>,
        span: Span,
        lower_body: impl FnOnce(&mut Self, &HirBlock) -> Result<(), LoweringError>,
    ) -> Result<(), LoweringError> {
        let exception_local = self.fresh_local(NovaType::any());
        let landing_pad = self.fresh_block();
        let join = self.fresh_block();

        self.handlers.push(Handler { landing_pad, exception_local, finally: finally.clone() });
        self.push_scope();
        lower_body(self, body)?;
        self.pop_scope();
        self.handlers.pop();

        if !self.is_terminated() {
            self.emit_finally(finally)?;
            self.terminate(Terminator::Jump(join));
        }

        let saved = self.current;
        self.current = landing_pad;
        for c in catches {
            let check_local = self.fresh_local(NovaType::boolean());
            self.emit(Instr::TypeCheck { dest: check_local, value: exception_local, ty: c.exception_type.clone(), span: c.span });
            let catch_body = self.fresh_block();
            let next_check = self.fresh_block();
            self.terminate(Terminator::Branch { cond: check_local, then_block: catch_body, else_block: next_check });

            self.current = catch_body;
            self.push_scope();
            self.declare(&c.name, exception_local);
            self.lower_block(&c.body)?;
            self.pop_scope();
            if !self.is_terminated() {
                self.emit_finally(finally)?;
                self.terminate(Terminator::Jump(join));
            }

            self.current = next_check;
        }
        // No catch matched: the region's own `finally` still runs, then
        // the exception keeps propagating outward (§4.5 "finally bodies
        // are duplicated at every exit ... including unwind").
        self.emit_finally(finally)?;
        self.raise(exception_local, span);

        self.current = saved;
        Ok(())
    }

    fn lower_expr(&mut self, expr: &HirExpr) -> Result<LocalId, LoweringError> {
        match expr {
            HirExpr::IntLiteral { value, span } => self.emit_const(ConstValue::Int(*value as i32), *span),
            HirExpr::LongLiteral { value, span } => self.emit_const(ConstValue::Long(*value), *span),
            HirExpr::DoubleLiteral { value, span } => self.emit_const(ConstValue::Double(*value), *span),
            HirExpr::FloatLiteral { value, span } => self.emit_const(ConstValue::Float(*value), *span),
            HirExpr::BoolLiteral { value, span } => self.emit_const(ConstValue::Bool(*value), *span),
            HirExpr::CharLiteral { value, span } => self.emit_const(ConstValue::Char(*value), *span),
            HirExpr::NullLiteral { span } => self.emit_const(ConstValue::Null, *span),
            HirExpr::StringLiteral { value, span } => self.emit_const(ConstValue::Str(value.clone()), *span),

            HirExpr::Identifier { name, span, .. } => self.lower_name_read(name, *span),
            HirExpr::This { span, .. } => self.lower_name_read("this", *span),

            HirExpr::Binary { op, left, right, span, .. } => {
                let left_local = self.lower_expr(left)?;
                let right_local = self.lower_expr(right)?;
                let dest = self.fresh_local(expr.ty().clone());
                self.emit(Instr::BinaryOp { dest, op: map_binary_op(*op), left: left_local, right: right_local, span: *span });
                Ok(dest)
            }
            HirExpr::Unary { op, operand, span, .. } => {
                let operand_local = self.lower_expr(operand)?;
                let dest = self.fresh_local(expr.ty().clone());
                self.emit(Instr::UnaryOp { dest, op: map_unary_op(*op), operand: operand_local, span: *span });
                Ok(dest)
            }

            HirExpr::Call { callee, args, span, .. } => self.lower_call(callee, args, expr.ty().clone(), *span),

            HirExpr::Lambda { params, body, span, .. } => self.lower_lambda(params, body, expr.ty().clone(), *span),

            HirExpr::Member { receiver, name, span, .. } => {
                let receiver_local = self.lower_expr(receiver)?;
                let dest = self.fresh_local(expr.ty().clone());
                self.emit(Instr::Load { dest, object: receiver_local, field: name.clone(), span: *span });
                Ok(dest)
            }
            HirExpr::Index { receiver, index, span, .. } => {
                let receiver_local = self.lower_expr(receiver)?;
                let index_local = self.lower_expr(index)?;
                let dest = self.fresh_local(expr.ty().clone());
                self.emit(Instr::Call {
                    dest: Some(dest),
                    target: CallTarget::Dynamic { name: "get".to_string(), arity: 1 },
                    args: vec![receiver_local, index_local],
                    span: *span,
                });
                Ok(dest)
            }

            HirExpr::If { condition, then_branch, else_branch, span, .. } => {
                self.lower_if_expr(condition, then_branch, else_branch.as_deref(), expr.ty().clone(), *span)
            }
            HirExpr::When { subject, arms, span, .. } => {
                self.lower_when_expr(subject.as_deref(), arms, expr.ty().clone(), *span)
            }

            HirExpr::Is { value, type_ref, negated, span } => {
                let value_local = self.lower_expr(value)?;
                let check = self.fresh_local(NovaType::boolean());
                self.emit(Instr::TypeCheck { dest: check, value: value_local, ty: type_ref.clone(), span: *span });
                if *negated {
                    let negated_local = self.fresh_local(NovaType::boolean());
                    self.emit(Instr::UnaryOp { dest: negated_local, op: MirUnaryOp::Not, operand: check, span: *span });
                    Ok(negated_local)
                } else {
                    Ok(check)
                }
            }
            HirExpr::As { value, target_type, nullable, span } => {
                let value_local = self.lower_expr(value)?;
                let dest = self.fresh_local(target_type.clone());
                self.emit(Instr::TypeCast { dest, value: value_local, ty: target_type.clone(), fallible: *nullable, span: *span });
                Ok(dest)
            }

            HirExpr::CollectionLiteral { kind, elements, span, .. } => {
                self.lower_collection_literal(*kind, elements, expr.ty().clone(), *span)
            }

            HirExpr::StmtBlock { stmts, tail, .. } => {
                self.push_scope();
                self.lower_block(stmts)?;
                let tail_local = self.lower_expr(tail)?;
                self.pop_scope();
                Ok(tail_local)
            }

            HirExpr::Try { body, finally, span, .. } => self.lower_try_expr(body, finally, expr.ty().clone(), *span),
        }
    }

    fn emit_const(&mut self, value: ConstValue, span: Span) -> Result<LocalId, LoweringError> {
        let ty = const_ty(&value);
        let dest = self.fresh_local(ty);
        self.emit(Instr::Const { dest, value, span });
        Ok(dest)
    }

    fn lower_name_read(&mut self, name: &str, span: Span) -> Result<LocalId, LoweringError> {
        let resolved = if name == "super" { "this" } else { name };
        if let Some(local) = self.lookup(resolved) {
            if self.boxed_locals.contains(&local.0) {
                let dest = self.fresh_local(NovaType::any());
                self.emit(Instr::UnboxRef { dest, boxed: local, span });
                return Ok(dest);
            }
            return Ok(local);
        }
        // Not a local: assume a top-level property, read through its
        // initializer-function getter (§ lowering note on module state).
        let dest = self.fresh_local(NovaType::any());
        self.emit(Instr::Call {
            dest: Some(dest),
            target: CallTarget::Direct(format!("$init${resolved}")),
            args: vec![],
            span,
        });
        Ok(dest)
    }

    fn lower_call(&mut self, callee: &HirExpr, args: &[HirArg], result_ty: NovaType, span: Span) -> Result<LocalId, LoweringError> {
        let arg_locals: Vec<LocalId> = args
            .iter()
            .map(|a| match a {
                HirArg::Positional(e) | HirArg::Spread(e) => self.lower_expr(e),
            })
            .collect::<Result<_, _>>()?;

        let dest = self.fresh_local(result_ty);

        match callee {
            HirExpr::Identifier { name, .. } if self.prog_ctx.known_functions.contains(name) => {
                self.emit(Instr::Call { dest: Some(dest), target: CallTarget::Direct(name.clone()), args: arg_locals, span });
            }
            // A bare name that is neither a declared top-level function nor a
            // local binding: a builtin/intrinsic call by name (`println(...)`,
            // a bare constructor like `Error(...)`). Resolved the same way an
            // unqualified method name falls back to `Dynamic` below, rather
            // than treating the name as a value to read (there is nothing
            // bound to read).
            HirExpr::Identifier { name, .. } if self.lookup(name).is_none() => {
                self.emit(Instr::Call {
                    dest: Some(dest),
                    target: CallTarget::Dynamic { name: name.clone(), arity: arg_locals.len() },
                    args: arg_locals,
                    span,
                });
            }
            HirExpr::Member { receiver, name, .. } => {
                let receiver_local = self.lower_expr(receiver)?;
                let mut full_args = Vec::with_capacity(arg_locals.len() + 1);
                full_args.push(receiver_local);
                full_args.extend(arg_locals.iter().copied());

                let target = if self.prog_ctx.known_functions.contains(name) {
                    CallTarget::Direct(name.clone())
                } else if let NovaType::Class { qualified_name, .. } = receiver.ty().strip_nullable() {
                    CallTarget::Direct(format!("{qualified_name}.{name}"))
                } else {
                    CallTarget::Dynamic { name: name.clone(), arity: arg_locals.len() }
                };
                self.emit(Instr::Call { dest: Some(dest), target, args: full_args, span });
            }
            other => {
                let callee_local = self.lower_expr(other)?;
                self.emit(Instr::Call { dest: Some(dest), target: CallTarget::Value(callee_local), args: arg_locals, span });
            }
        }
        Ok(dest)
    }

    fn lower_if_expr(
        &mut self,
        condition: &HirExpr,
        then_branch: &HirExpr,
        else_branch: Option<&HirExpr>,
        ty: NovaType,
        span: Span,
    ) -> Result<LocalId, LoweringError> {
        let cond_local = self.lower_expr(condition)?;
        let result = self.fresh_local(ty);
        let then_block = self.fresh_block();
        let else_block = self.fresh_block();
        let join = self.fresh_block();
        self.terminate(Terminator::Branch { cond: cond_local, then_block, else_block });

        self.current = then_block;
        let then_val = self.lower_expr(then_branch)?;
        self.emit(Instr::Move { dest: result, src: then_val, span });
        if !self.is_terminated() {
            self.terminate(Terminator::Jump(join));
        }

        self.current = else_block;
        let else_val = match else_branch {
            Some(e) => self.lower_expr(e)?,
            None => self.emit_const(ConstValue::Null, span)?,
        };
        self.emit(Instr::Move { dest: result, src: else_val, span });
        if !self.is_terminated() {
            self.terminate(Terminator::Jump(join));
        }

        self.current = join;
        Ok(result)
    }

    fn lower_when_expr(
        &mut self,
        subject: Option<&HirExpr>,
        arms: &[crate::hir::HirWhenArm],
        ty: NovaType,
        span: Span,
    ) -> Result<LocalId, LoweringError> {
        let subject_local = subject.map(|s| self.lower_expr(s)).transpose()?;
        let result = self.fresh_local(ty);
        let join = self.fresh_block();

        for arm in arms {
            if arm.conditions.is_empty() {
                let val = self.lower_expr(&arm.body)?;
                self.emit(Instr::Move { dest: result, src: val, span: arm.span });
                if !self.is_terminated() {
                    self.terminate(Terminator::Jump(join));
                }
                self.current = join;
                return Ok(result);
            }

            let mut combined: Option<LocalId> = None;
            for cond in &arm.conditions {
                let cond_local = self.lower_expr(cond)?;
                let truth = match subject_local {
                    Some(s) => {
                        let eq = self.fresh_local(NovaType::boolean());
                        self.emit(Instr::BinaryOp { dest: eq, op: MirBinaryOp::Eq, left: s, right: cond_local, span: cond.span() });
                        eq
                    }
                    None => cond_local,
                };
                combined = Some(match combined {
                    None => truth,
                    Some(prev) => {
                        let or_local = self.fresh_local(NovaType::boolean());
                        self.emit(Instr::BinaryOp { dest: or_local, op: MirBinaryOp::Or, left: prev, right: truth, span: cond.span() });
                        or_local
                    }
                });
            }
            let combined = combined.expect("arm has at least one condition");

            let body_block = self.fresh_block();
            let next_block = self.fresh_block();
            self.terminate(Terminator::Branch { cond: combined, then_block: body_block, else_block: next_block });

            self.current = body_block;
            let val = self.lower_expr(&arm.body)?;
            self.emit(Instr::Move { dest: result, src: val, span: arm.span });
            if !self.is_terminated() {
                self.terminate(Terminator::Jump(join));
            }

            self.current = next_block;
        }

        // Fell through every arm with no match (non-exhaustive `when`,
        // flagged by the analyzer as a warning rather than an error):
        // produce `null` rather than leave the block unterminated.
        let fallback = self.emit_const(ConstValue::Null, span)?;
        self.emit(Instr::Move { dest: result, src: fallback, span });
        self.terminate(Terminator::Jump(join));

        self.current = join;
        Ok(result)
    }

    fn lower_try_expr(&mut self, body: &HirExpr, finally: &HirBlock, ty: NovaType, span: Span) -> Result<LocalId, LoweringError> {
        let exception_local = self.fresh_local(NovaType::any());
        let landing_pad = self.fresh_block();
        let result = self.fresh_local(ty);

        self.handlers.push(Handler { landing_pad, exception_local, finally: Some(finally.clone()) });
        let body_val = self.lower_expr(body)?;
        self.handlers.pop();
        self.emit(Instr::Move { dest: result, src: body_val, span });
        if !self.is_terminated() {
            self.emit_finally(&Some(finally.clone()))?;
        }

        let saved = self.current;
        self.current = landing_pad;
        self.emit_finally(&Some(finally.clone()))?;
        self.raise(exception_local, span);
        self.current = saved;

        Ok(result)
    }

    fn lower_collection_literal(
        &mut self,
        kind: HirCollectionKind,
        elements: &[HirCollectionElement],
        ty: NovaType,
        span: Span,
    ) -> Result<LocalId, LoweringError> {
        let class_name = match kind {
            HirCollectionKind::List => "List",
            HirCollectionKind::Set => "Set",
            HirCollectionKind::Map => "Map",
        };
        let dest = self.fresh_local(ty);
        self.emit(Instr::Alloc { dest, class_name: class_name.to_string(), span });
        for el in elements {
            match el {
                HirCollectionElement::Item(e) => {
                    let item = self.lower_expr(e)?;
                    self.emit(Instr::Call {
                        dest: None,
                        target: CallTarget::Dynamic { name: "add".to_string(), arity: 1 },
                        args: vec![dest, item],
                        span,
                    });
                }
                HirCollectionElement::Entry { key, value } => {
                    let key_local = self.lower_expr(key)?;
                    let value_local = self.lower_expr(value)?;
                    self.emit(Instr::Call {
                        dest: None,
                        target: CallTarget::Dynamic { name: "put".to_string(), arity: 2 },
                        args: vec![dest, key_local, value_local],
                        span,
                    });
                }
            }
        }
        Ok(dest)
    }

    fn lower_lambda(&mut self, params: &[HirParam], body: &HirBlock, ty: NovaType, span: Span) -> Result<LocalId, LoweringError> {
        let mut free: Vec<String> = capture::free_variables(params, body).into_iter().collect();
        free.sort();

        let mut capture_locals = Vec::with_capacity(free.len());
        for name in &free {
            let local = self.lookup(name).ok_or_else(|| LoweringError::InternalInvariant {
                detail: format!("lambda captures unresolved name '{name}'"),
                span,
            })?;
            capture_locals.push(local);
        }

        let function_name = format!("{}$lambda{}", self.owner_name, *self.lambda_seq);
        *self.lambda_seq += 1;

        let mut lambda_params: Vec<HirParam> = free
            .iter()
            .map(|name| HirParam { name: name.clone(), ty: NovaType::any(), default_value: None, is_vararg: false, span })
            .collect();
        lambda_params.extend(params.iter().cloned());

        let lambda_fn = lower_function_body(
            function_name.clone(),
            &lambda_params,
            body,
            NovaType::any(),
            self.prog_ctx,
            self.lambda_seq,
            self.extra,
        )?;
        self.extra.push(lambda_fn);

        let dest = self.fresh_local(ty);
        self.emit(Instr::MakeClosure { dest, function: function_name, captures: capture_locals, span });
        Ok(dest)
    }
}

fn const_ty(value: &ConstValue) -> NovaType {
    match value {
        ConstValue::Int(_) => NovaType::int(),
        ConstValue::Long(_) => NovaType::Primitive(crate::types::PrimitiveType::Long),
        ConstValue::Double(_) => NovaType::Primitive(crate::types::PrimitiveType::Double),
        ConstValue::Float(_) => NovaType::Primitive(crate::types::PrimitiveType::Float),
        ConstValue::Bool(_) => NovaType::boolean(),
        ConstValue::Char(_) => NovaType::Primitive(crate::types::PrimitiveType::Char),
        ConstValue::Str(_) => NovaType::string(),
        ConstValue::Null => NovaType::nullable(NovaType::nothing()),
    }
}

fn map_binary_op(op: HirBinaryOp) -> MirBinaryOp {
    match op {
        HirBinaryOp::Add => MirBinaryOp::Add,
        HirBinaryOp::Sub => MirBinaryOp::Sub,
        HirBinaryOp::Mul => MirBinaryOp::Mul,
        HirBinaryOp::Div => MirBinaryOp::Div,
        HirBinaryOp::Rem => MirBinaryOp::Rem,
        HirBinaryOp::Eq => MirBinaryOp::Eq,
        HirBinaryOp::NotEq => MirBinaryOp::NotEq,
        HirBinaryOp::RefEq => MirBinaryOp::RefEq,
        HirBinaryOp::NotRefEq => MirBinaryOp::NotRefEq,
        HirBinaryOp::Lt => MirBinaryOp::Lt,
        HirBinaryOp::LtEq => MirBinaryOp::LtEq,
        HirBinaryOp::Gt => MirBinaryOp::Gt,
        HirBinaryOp::GtEq => MirBinaryOp::GtEq,
        HirBinaryOp::And => MirBinaryOp::And,
        HirBinaryOp::Or => MirBinaryOp::Or,
        HirBinaryOp::BitAnd => MirBinaryOp::BitAnd,
        HirBinaryOp::BitOr => MirBinaryOp::BitOr,
        HirBinaryOp::BitXor => MirBinaryOp::BitXor,
        HirBinaryOp::Shl => MirBinaryOp::Shl,
        HirBinaryOp::Shr => MirBinaryOp::Shr,
    }
}

fn map_unary_op(op: HirUnaryOp) -> MirUnaryOp {
    match op {
        HirUnaryOp::Plus => MirUnaryOp::Plus,
        HirUnaryOp::Neg => MirUnaryOp::Neg,
        HirUnaryOp::Not => MirUnaryOp::Not,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use novalang_parser::parse;

    fn lower(source: &str) -> MirProgram {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors.errors());
        let result = Analyzer::new("test.nova", false).analyze(&program);
        let hir = crate::lower_hir::lower_program(&program, &result.types, "test.nova").unwrap();
        lower_program(&hir).unwrap()
    }

    #[test]
    fn every_block_has_exactly_one_terminator() {
        let mir = lower("fun main() { if (true) { val x = 1 } else { val y = 2 } }");
        for f in &mir.functions {
            for b in &f.blocks {
                let _ = &b.terminator;
            }
        }
        assert_eq!(mir.functions.len(), 1);
    }

    #[test]
    fn while_loop_produces_header_body_exit_blocks() {
        let mir = lower("fun main() { var i = 0; while (i < 10) { i = i + 1 } }");
        assert!(mir.functions[0].blocks.len() >= 4);
    }

    #[test]
    fn lambda_capturing_var_produces_extra_function_with_boxed_param() {
        let mir = lower("fun main() { var count = 0; val inc = { count = count + 1 } }");
        assert!(mir.functions.iter().any(|f| f.signature.name.contains("$lambda")));
    }

    #[test]
    fn try_finally_runs_on_normal_and_thrown_exit() {
        let mir = lower("fun main() { try { throw RuntimeException(\"x\") } finally { val done = 1 } }");
        assert_eq!(mir.functions.len(), 1);
    }

    #[test]
    fn for_loop_desugars_to_iterator_protocol_calls() {
        let mir = lower("fun main() { for (x in list()) { val y = x } }");
        let has_iterator_call = mir.functions[0].blocks.iter().any(|b| {
            b.instructions.iter().any(|i| matches!(i, Instr::Call { target: CallTarget::Dynamic { name, .. }, .. } if name == "iterator"))
        });
        assert!(has_iterator_call);
    }
}
