//! HIR: the AST after desugaring (§3.5). ~40 node kinds, each carrying an
//! attached [`NovaType`]. `Elvis`, `SafeCall`, `ErrorPropagation`,
//! `StringInterpolation`, and `RangeExpr` are absent here — they were
//! rewritten into `HirIf`/`HirCall`/`HirExpr::StmtBlock` equivalents
//! during AST→HIR lowering (§4.4); see [`crate::lower_hir`].

use novalang_parser::span::Span;
use serde::{Deserialize, Serialize};

use crate::types::NovaType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirProgram {
    pub functions: Vec<HirFunction>,
    pub classes: Vec<HirClass>,
    pub top_level_properties: Vec<HirProperty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirParam {
    pub name: String,
    pub ty: NovaType,
    pub default_value: Option<HirExpr>,
    pub is_vararg: bool,
    pub span: Span,
}

/// A function after extension-receiver threading (§4.4: `fun T.foo(x)`
/// becomes a regular function with the receiver as an explicit first
/// parameter, conventionally named `this`) and after named/default
/// arguments are resolved away at call sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirFunction {
    pub name: String,
    pub params: Vec<HirParam>,
    pub return_type: NovaType,
    pub body: HirBlock,
    /// `true` for `fun T.foo` — kept only so later stages can recognize
    /// "the first parameter is a thread-through receiver", not to carry
    /// any additional desugaring obligation.
    pub is_extension: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirField {
    pub name: String,
    pub ty: NovaType,
    pub is_mutable: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirClass {
    pub name: String,
    pub fields: Vec<HirField>,
    pub methods: Vec<HirFunction>,
    pub superclass: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirProperty {
    pub name: String,
    pub ty: NovaType,
    pub is_mutable: bool,
    pub initializer: Option<HirExpr>,
    pub span: Span,
}

pub type HirBlock = Vec<HirStmt>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HirStmt {
    Expr(HirExpr),
    Let {
        name: String,
        ty: NovaType,
        is_mutable: bool,
        value: HirExpr,
        span: Span,
    },
    Assign {
        target: HirExpr,
        value: HirExpr,
        span: Span,
    },
    If {
        condition: HirExpr,
        then_branch: HirBlock,
        else_branch: Option<HirBlock>,
        span: Span,
    },
    While {
        label: Option<String>,
        condition: HirExpr,
        body: HirBlock,
        span: Span,
    },
    DoWhile {
        label: Option<String>,
        body: HirBlock,
        condition: HirExpr,
        span: Span,
    },
    For {
        label: Option<String>,
        variable: String,
        iterable: HirExpr,
        body: HirBlock,
        span: Span,
    },
    Return {
        value: Option<HirExpr>,
        span: Span,
    },
    Break {
        label: Option<String>,
        span: Span,
    },
    Continue {
        label: Option<String>,
        span: Span,
    },
    Throw {
        value: HirExpr,
        span: Span,
    },
    Try {
        body: HirBlock,
        catches: Vec<HirCatch>,
        finally: Option<HirBlock>,
        span: Span,
    },
    Block {
        body: HirBlock,
        span: Span,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirCatch {
    pub name: String,
    pub exception_type: NovaType,
    pub body: HirBlock,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HirBinaryOp {
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
pub enum HirUnaryOp {
    Plus,
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HirCollectionKind {
    List,
    Set,
    Map,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HirCollectionElement {
    Item(HirExpr),
    Entry { key: HirExpr, value: HirExpr },
}

/// A call argument, keeping spread-positions visible after named/default
/// resolution has flattened everything else to positional order (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HirArg {
    Positional(HirExpr),
    Spread(HirExpr),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirWhenArm {
    /// Empty is the `else ->` arm.
    pub conditions: Vec<HirExpr>,
    pub body: HirExpr,
    pub span: Span,
}

/// Every HIR node kind attaches the [`NovaType`] the analyzer resolved
/// for it (§3.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HirExpr {
    IntLiteral { value: i64, span: Span },
    LongLiteral { value: i64, span: Span },
    DoubleLiteral { value: f64, span: Span },
    FloatLiteral { value: f32, span: Span },
    BoolLiteral { value: bool, span: Span },
    CharLiteral { value: char, span: Span },
    NullLiteral { span: Span },
    /// A string literal with no interpolation. Interpolated strings are
    /// rewritten to `Call(String::build, parts)` during lowering (§4.4)
    /// and never appear as this variant.
    StringLiteral { value: String, span: Span },

    Identifier { name: String, ty: NovaType, span: Span },
    This { ty: NovaType, span: Span },

    Binary {
        op: HirBinaryOp,
        left: Box<HirExpr>,
        right: Box<HirExpr>,
        ty: NovaType,
        span: Span,
    },
    Unary {
        op: HirUnaryOp,
        operand: Box<HirExpr>,
        ty: NovaType,
        span: Span,
    },

    Call {
        callee: Box<HirExpr>,
        args: Vec<HirArg>,
        ty: NovaType,
        span: Span,
    },

    Lambda {
        params: Vec<HirParam>,
        body: HirBlock,
        ty: NovaType,
        span: Span,
    },

    Member {
        receiver: Box<HirExpr>,
        name: String,
        ty: NovaType,
        span: Span,
    },
    Index {
        receiver: Box<HirExpr>,
        index: Box<HirExpr>,
        ty: NovaType,
        span: Span,
    },

    /// Unifies the AST's `IfStmt`/`Expression::If` (§3.5); `used_as_expression`
    /// records whether this node's value is consumed by its parent.
    If {
        condition: Box<HirExpr>,
        then_branch: Box<HirExpr>,
        else_branch: Option<Box<HirExpr>>,
        used_as_expression: bool,
        ty: NovaType,
        span: Span,
    },
    When {
        subject: Option<Box<HirExpr>>,
        arms: Vec<HirWhenArm>,
        ty: NovaType,
        span: Span,
    },

    Is {
        value: Box<HirExpr>,
        type_ref: NovaType,
        negated: bool,
        span: Span,
    },
    As {
        value: Box<HirExpr>,
        target_type: NovaType,
        nullable: bool,
        span: Span,
    },

    CollectionLiteral {
        kind: HirCollectionKind,
        elements: Vec<HirCollectionElement>,
        ty: NovaType,
        span: Span,
    },

    /// A block of statements that produces a value — the vehicle every
    /// desugaring rule in §4.4 uses to introduce a temporary `let` ahead
    /// of the expression it rewrites (`a ?: b`, `a?.m(x)`, `expr?`).
    StmtBlock {
        stmts: HirBlock,
        tail: Box<HirExpr>,
        ty: NovaType,
        span: Span,
    },

    /// `use (r) { body }` lowered form (§4.4): `body` is evaluated, then
    /// `finally` always runs, including on unwind.
    Try {
        body: Box<HirExpr>,
        finally: HirBlock,
        ty: NovaType,
        span: Span,
    },
}

impl HirExpr {
    pub fn ty(&self) -> &NovaType {
        match self {
            HirExpr::IntLiteral { .. } => &NOVA_INT,
            HirExpr::LongLiteral { .. } => &NOVA_LONG,
            HirExpr::DoubleLiteral { .. } => &NOVA_DOUBLE,
            HirExpr::FloatLiteral { .. } => &NOVA_FLOAT,
            HirExpr::BoolLiteral { .. } => &NOVA_BOOL,
            HirExpr::CharLiteral { .. } => &NOVA_CHAR,
            HirExpr::NullLiteral { .. } => &NOVA_NULL,
            HirExpr::StringLiteral { .. } => &NOVA_STRING,
            HirExpr::Identifier { ty, .. }
            | HirExpr::This { ty, .. }
            | HirExpr::Binary { ty, .. }
            | HirExpr::Unary { ty, .. }
            | HirExpr::Call { ty, .. }
            | HirExpr::Lambda { ty, .. }
            | HirExpr::Member { ty, .. }
            | HirExpr::Index { ty, .. }
            | HirExpr::If { ty, .. }
            | HirExpr::When { ty, .. }
            | HirExpr::CollectionLiteral { ty, .. }
            | HirExpr::StmtBlock { ty, .. }
            | HirExpr::Try { ty, .. } => ty,
            HirExpr::Is { .. } => &NOVA_BOOL,
            HirExpr::As { target_type, .. } => target_type,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            HirExpr::IntLiteral { span, .. }
            | HirExpr::LongLiteral { span, .. }
            | HirExpr::DoubleLiteral { span, .. }
            | HirExpr::FloatLiteral { span, .. }
            | HirExpr::BoolLiteral { span, .. }
            | HirExpr::CharLiteral { span, .. }
            | HirExpr::NullLiteral { span }
            | HirExpr::StringLiteral { span, .. }
            | HirExpr::Identifier { span, .. }
            | HirExpr::This { span, .. }
            | HirExpr::Binary { span, .. }
            | HirExpr::Unary { span, .. }
            | HirExpr::Call { span, .. }
            | HirExpr::Lambda { span, .. }
            | HirExpr::Member { span, .. }
            | HirExpr::Index { span, .. }
            | HirExpr::If { span, .. }
            | HirExpr::When { span, .. }
            | HirExpr::Is { span, .. }
            | HirExpr::As { span, .. }
            | HirExpr::CollectionLiteral { span, .. }
            | HirExpr::StmtBlock { span, .. }
            | HirExpr::Try { span, .. } => *span,
        }
    }
}

// `NovaType` has no `const fn` constructor, so the fixed types returned by
// literal-kind `ty()` accessors are built once behind `once_cell::sync::Lazy`
// rather than reconstructed on every call.
use once_cell::sync::Lazy;

static NOVA_INT: Lazy<NovaType> = Lazy::new(NovaType::int);
static NOVA_LONG: Lazy<NovaType> =
    Lazy::new(|| NovaType::Primitive(crate::types::PrimitiveType::Long));
static NOVA_DOUBLE: Lazy<NovaType> =
    Lazy::new(|| NovaType::Primitive(crate::types::PrimitiveType::Double));
static NOVA_FLOAT: Lazy<NovaType> =
    Lazy::new(|| NovaType::Primitive(crate::types::PrimitiveType::Float));
static NOVA_BOOL: Lazy<NovaType> = Lazy::new(NovaType::boolean);
static NOVA_CHAR: Lazy<NovaType> =
    Lazy::new(|| NovaType::Primitive(crate::types::PrimitiveType::Char));
static NOVA_STRING: Lazy<NovaType> = Lazy::new(NovaType::string);
static NOVA_NULL: Lazy<NovaType> = Lazy::new(|| NovaType::nullable(NovaType::nothing()));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_ty_accessors_do_not_panic() {
        let span = Span::empty();
        assert_eq!(*HirExpr::IntLiteral { value: 1, span }.ty(), NovaType::int());
        assert_eq!(*HirExpr::BoolLiteral { value: true, span }.ty(), NovaType::boolean());
    }
}
