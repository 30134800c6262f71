//! MIR: a control-flow graph of basic blocks (§3.6), the input to both
//! back ends. Lower-level than HIR — no more structured `if`/`while`, only
//! blocks, instructions, and terminators — and SSA-adjacent in spirit
//! (every instruction names its destination local) without enforcing full
//! SSA (a local may be the destination of more than one instruction,
//! mirroring the teacher's `Instruction`/`Terminator` split rather than
//! `rustc`'s stricter form).

use serde::{Deserialize, Serialize};
use std::fmt;

use novalang_parser::span::Span;

use crate::types::NovaType;

/// Index into a [`MirFunction`]'s `locals`. Parameters occupy the first
/// `signature.params.len()` slots, in order; everything after is a
/// compiler-introduced temporary or user local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId(pub u32);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

/// Index into a [`MirFunction`]'s `blocks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A single local slot's static shape. `boxed` is set only for a `var`
/// captured by a nested lambda (§4.5 "Closure capture"); every read/write
/// of a boxed slot goes through `BoxRef`/`UnboxRef` rather than `Move`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSlot {
    pub name: String,
    pub ty: NovaType,
    pub boxed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Int(i32),
    Long(i64),
    Double(f64),
    Float(f32),
    Bool(bool),
    Char(char),
    Str(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    RefEq,
    NotRefEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirUnaryOp {
    Plus,
    Neg,
    Not,
}

/// Who a [`Instr::Call`] is calling. A name the lowerer could resolve at
/// lowering time (a known top-level function or method) becomes `Direct`;
/// a call through `Any` or an otherwise-unresolved receiver becomes
/// `Dynamic`, dispatched by the back end via name + arity (§4.5 "Call
/// lowering").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallTarget {
    Direct(String),
    Dynamic { name: String, arity: usize },
    /// Invoke whatever callable value `CreateClosure`-style instructions
    /// produced into this local (a lambda literal, a function reference,
    /// a higher-order parameter): the runtime reads the target function
    /// name and captured values stored in the value itself.
    Value(LocalId),
}

/// A single MIR instruction. Every variant but the flow-free ones names an
/// explicit `dest: LocalId`; instructions never branch (§3.6 invariant:
/// terminators are the only control-flow instructions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Instr {
    Const {
        dest: LocalId,
        value: ConstValue,
        span: Span,
    },
    Move {
        dest: LocalId,
        src: LocalId,
        span: Span,
    },
    UnaryOp {
        dest: LocalId,
        op: MirUnaryOp,
        operand: LocalId,
        span: Span,
    },
    BinaryOp {
        dest: LocalId,
        op: MirBinaryOp,
        left: LocalId,
        right: LocalId,
        span: Span,
    },
    Call {
        dest: Option<LocalId>,
        target: CallTarget,
        args: Vec<LocalId>,
        span: Span,
    },
    /// Allocates an instance of `class_name` with its fields left
    /// zero/null-initialized; field values are populated by subsequent
    /// `Store` instructions.
    Alloc {
        dest: LocalId,
        class_name: String,
        span: Span,
    },
    Load {
        dest: LocalId,
        object: LocalId,
        field: String,
        span: Span,
    },
    Store {
        object: LocalId,
        field: String,
        value: LocalId,
        span: Span,
    },
    TypeCheck {
        dest: LocalId,
        value: LocalId,
        ty: NovaType,
        span: Span,
    },
    TypeCast {
        dest: LocalId,
        value: LocalId,
        ty: NovaType,
        /// `true` for `as?` (failed cast yields `null`); `false` for `as`
        /// (failed cast throws `ClassCastException`).
        fallible: bool,
        span: Span,
    },
    /// Boxes `value` into a heap cell, for a `var` a nested lambda
    /// captures (§4.5 "Closure capture"). Only emitted for boxed locals.
    BoxRef {
        dest: LocalId,
        value: LocalId,
        span: Span,
    },
    /// Reads (or, paired with a `Store`-style use elsewhere, writes) through
    /// a box produced by `BoxRef`.
    UnboxRef {
        dest: LocalId,
        boxed: LocalId,
        span: Span,
    },
    /// Packages a lambda into a callable value: `function` names its
    /// dedicated `MirFunction`, and `captures` are the values (or, for a
    /// captured `var`, its box) threaded in as that function's leading
    /// parameters on every call through the resulting value (the same
    /// positional-threading idiom extension-receiver lowering uses for
    /// `this`). Grounded on the teacher's `Instr::CreateClosure`.
    MakeClosure {
        dest: LocalId,
        function: String,
        captures: Vec<LocalId>,
        span: Span,
    },
}

impl Instr {
    pub fn span(&self) -> Span {
        match self {
            Instr::Const { span, .. }
            | Instr::Move { span, .. }
            | Instr::UnaryOp { span, .. }
            | Instr::BinaryOp { span, .. }
            | Instr::Call { span, .. }
            | Instr::Alloc { span, .. }
            | Instr::Load { span, .. }
            | Instr::Store { span, .. }
            | Instr::TypeCheck { span, .. }
            | Instr::TypeCast { span, .. }
            | Instr::BoxRef { span, .. }
            | Instr::UnboxRef { span, .. }
            | Instr::MakeClosure { span, .. } => *span,
        }
    }

    /// The local this instruction writes, if any (`Store` writes through a
    /// field, not a local, so it has none).
    pub fn dest(&self) -> Option<LocalId> {
        match self {
            Instr::Const { dest, .. }
            | Instr::Move { dest, .. }
            | Instr::UnaryOp { dest, .. }
            | Instr::BinaryOp { dest, .. }
            | Instr::Alloc { dest, .. }
            | Instr::Load { dest, .. }
            | Instr::TypeCheck { dest, .. }
            | Instr::TypeCast { dest, .. }
            | Instr::BoxRef { dest, .. }
            | Instr::UnboxRef { dest, .. }
            | Instr::MakeClosure { dest, .. } => Some(*dest),
            Instr::Call { dest, .. } => *dest,
            Instr::Store { .. } => None,
        }
    }
}

/// A block's sole control-flow exit (§3.6 invariant: every block ends
/// with exactly one terminator). `Unwind` carries the landing-pad block a
/// `Try` region unwinds to; it never appears outside lowering of a `try`
/// (§4.5 "HirTry generates a landing-pad block").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Terminator {
    Return(Option<LocalId>),
    Jump(BlockId),
    Branch {
        cond: LocalId,
        then_block: BlockId,
        else_block: BlockId,
    },
    Switch {
        value: LocalId,
        cases: Vec<(ConstValue, BlockId)>,
        default: BlockId,
    },
    Throw(LocalId),
    Unwind { landing_pad: BlockId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instr>,
    pub terminator: Terminator,
    /// The handler a throwing instruction in this block implicitly
    /// unwinds to (§4.5 "every instruction that may throw has an implicit
    /// unwind edge to the current landing pad"): the landing-pad block to
    /// jump to, and the local the raised value is stored into before the
    /// jump. `None` outside any `try` region. Set per-block at lowering
    /// time from whichever handler was active while its instructions were
    /// emitted (`lower_mir::FunctionBuilder::emit`), so a back end never
    /// has to reconstruct handler scope from the CFG shape.
    pub landing_pad: Option<(BlockId, LocalId)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirSignature {
    pub name: String,
    pub param_types: Vec<NovaType>,
    pub return_type: NovaType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirFunction {
    pub signature: MirSignature,
    pub locals: Vec<LocalSlot>,
    pub blocks: Vec<BasicBlock>,
    pub entry: BlockId,
}

impl MirFunction {
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn entry_block(&self) -> &BasicBlock {
        self.block(self.entry)
            .expect("MirFunction invariant: entry must name a block in `blocks`")
    }
}

/// A class's field layout, carried into MIR so `Alloc`/`Load`/`Store`
/// instructions can be validated against a known shape by later passes
/// and by the back ends. Methods are lowered to ordinary [`MirFunction`]s
/// named `ClassName.methodName` and dispatched like any other call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirClass {
    pub name: String,
    pub fields: Vec<String>,
    pub superclass: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirProgram {
    pub functions: Vec<MirFunction>,
    pub classes: Vec<MirClass>,
}
