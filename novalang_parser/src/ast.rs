//! The concrete AST: parser output, before semantic analysis or lowering.
//!
//! A discriminated union of node kinds grouped into four families —
//! [`Declaration`], [`Statement`], [`Expression`], [`TypeRef`] — per the
//! data model. The tree is arena-allocated in the sense that every node
//! owns its children directly (`Box`/`Vec`); there are no back-pointers.
//! Parent/scope relationships are built later by the analyzer in side
//! tables keyed by a stable id, not stored here.

use serde::{Deserialize, Serialize};

use crate::modifiers::ModifierSet;
use crate::span::Span;

/// A plain top-level or class-member declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Declaration {
    Function(FunctionDecl),
    Property(PropertyDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Object(ObjectDecl),
    Enum(EnumDecl),
    /// An `init { ... }` block; synthetic name `<init-block>`.
    InitBlock { body: Vec<Statement>, span: Span },
    Import(ImportDecl),
    /// `val (a, b) = pair` at declaration position.
    Destructuring(DestructuringDecl),
}

impl Declaration {
    /// Every declaration has a name, possibly synthetic.
    pub fn name(&self) -> &str {
        match self {
            Declaration::Function(d) => &d.name,
            Declaration::Property(d) => &d.name,
            Declaration::Class(d) => &d.name,
            Declaration::Interface(d) => &d.name,
            Declaration::Object(d) => &d.name,
            Declaration::Enum(d) => &d.name,
            Declaration::InitBlock { .. } => "<init-block>",
            Declaration::Import(d) => d.alias.as_deref().unwrap_or(&d.path_tail),
            Declaration::Destructuring(_) => "<destructuring>",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Declaration::Function(d) => d.span,
            Declaration::Property(d) => d.span,
            Declaration::Class(d) => d.span,
            Declaration::Interface(d) => d.span,
            Declaration::Object(d) => d.span,
            Declaration::Enum(d) => d.span,
            Declaration::InitBlock { span, .. } => *span,
            Declaration::Import(d) => d.span,
            Declaration::Destructuring(d) => d.span,
        }
    }
}

/// Exactly one of `expr_body`/`block_body` is set — a `FunctionDecl` never
/// has both an expression body (`= expr`) and a block body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub modifiers: ModifierSet,
    pub type_params: Vec<TypeParam>,
    /// `Some` only for `fun T.name(...)` extension functions; desugared
    /// into an explicit first parameter during AST→HIR lowering (§4.4).
    pub receiver: Option<TypeRef>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeRef>,
    pub body: FunctionBody,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FunctionBody {
    Expression(Box<Expression>),
    Block(Vec<Statement>),
    /// `abstract fun foo(): Int` — no body at all.
    Abstract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub type_annotation: Option<TypeRef>,
    pub default_value: Option<Expression>,
    pub is_vararg: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub bound: Option<TypeRef>,
    pub span: Span,
}

/// At most one getter and one setter, both optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    pub is_var: bool,
    pub modifiers: ModifierSet,
    pub type_annotation: Option<TypeRef>,
    pub initializer: Option<Expression>,
    pub getter: Option<Box<FunctionDecl>>,
    pub setter: Option<Box<FunctionDecl>>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub modifiers: ModifierSet,
    pub is_data: bool,
    pub type_params: Vec<TypeParam>,
    pub primary_constructor: Vec<Param>,
    pub superclass: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub members: Vec<Declaration>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub modifiers: ModifierSet,
    pub type_params: Vec<TypeParam>,
    pub superinterfaces: Vec<TypeRef>,
    pub members: Vec<Declaration>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDecl {
    pub name: String,
    pub modifiers: ModifierSet,
    pub superclass: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub members: Vec<Declaration>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub modifiers: ModifierSet,
    pub entries: Vec<EnumEntry>,
    pub members: Vec<Declaration>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumEntry {
    pub name: String,
    pub args: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDecl {
    pub path: Vec<String>,
    /// The last path segment, cached so `name()` doesn't need to re-derive it.
    pub path_tail: String,
    pub alias: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestructuringDecl {
    pub is_var: bool,
    pub bindings: Vec<String>,
    pub initializer: Expression,
    pub span: Span,
}

// ==================== Statements ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    Expression(Expression),
    Declaration(Declaration),
    Assignment(AssignmentStmt),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),
    Return { value: Option<Expression>, span: Span },
    Break { label: Option<String>, span: Span },
    Continue { label: Option<String>, span: Span },
    Throw { value: Expression, span: Span },
    Try(TryStmt),
    Block { body: Vec<Statement>, span: Span },
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Expression(e) => e.span(),
            Statement::Declaration(d) => d.span(),
            Statement::Assignment(s) => s.span,
            Statement::If(s) => s.span,
            Statement::While(s) => s.span,
            Statement::DoWhile(s) => s.span,
            Statement::For(s) => s.span,
            Statement::Return { span, .. }
            | Statement::Break { span, .. }
            | Statement::Continue { span, .. }
            | Statement::Throw { span, .. }
            | Statement::Block { span, .. } => *span,
            Statement::Try(s) => s.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentStmt {
    pub target: Expression,
    pub op: AssignOp,
    pub value: Expression,
    pub span: Span,
}

/// AST-level `if` used as a statement. The semantically identical
/// [`Expression::If`] exists for `if` used as an expression; the two
/// unify into a single `HirIf` during lowering (§3.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Box<Expression>,
    pub then_branch: Box<Statement>,
    pub else_branch: Option<Box<Statement>>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileStmt {
    pub label: Option<String>,
    pub condition: Box<Expression>,
    pub body: Box<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoWhileStmt {
    pub label: Option<String>,
    pub body: Box<Statement>,
    pub condition: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForStmt {
    pub label: Option<String>,
    pub variable: String,
    pub iterable: Box<Expression>,
    pub body: Box<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub name: String,
    pub exception_type: TypeRef,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryStmt {
    pub body: Vec<Statement>,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Vec<Statement>>,
    pub span: Span,
}

// ==================== Expressions ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
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
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
}

/// The kind tag a `CollectionLiteral` carries (§3.3): empty `#{}` is MAP,
/// empty `{}` at expression position is a zero-arg lambda and is never
/// represented as a `CollectionLiteral`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    List,
    Set,
    Map,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CollectionElement {
    Item(Expression),
    Entry { key: Expression, value: Expression },
    /// `*expr` spread into the surrounding collection literal.
    Spread(Expression),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaParam {
    pub name: String,
    pub type_annotation: Option<TypeRef>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaExpr {
    pub params: Vec<LambdaParam>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhenArm {
    /// Empty is the `else ->` arm.
    pub conditions: Vec<Expression>,
    pub body: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StringPart {
    Text(String),
    Interpolated(Box<Expression>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expression {
    IntLiteral { value: i64, span: Span },
    LongLiteral { value: i64, span: Span },
    DoubleLiteral { value: f64, span: Span },
    FloatLiteral { value: f32, span: Span },
    BoolLiteral { value: bool, span: Span },
    CharLiteral { value: char, span: Span },
    NullLiteral { span: Span },
    StringLiteral { parts: Vec<StringPart>, span: Span },

    Identifier { name: String, span: Span },
    This { span: Span },
    Super { span: Span },

    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
        span: Span,
    },

    /// A function call. Exactly one of `positional_args`/`named_args` may
    /// be empty, but original token-order indices are preserved via
    /// `arg_order` for diagnostics (§3.3).
    Call {
        callee: Box<Expression>,
        type_args: Vec<TypeRef>,
        positional_args: Vec<Expression>,
        named_args: Vec<(String, Expression)>,
        spread_positions: Vec<usize>,
        arg_order: Vec<ArgSlot>,
        trailing_lambda: Option<Box<LambdaExpr>>,
        span: Span,
    },

    Lambda(LambdaExpr),

    /// `.` or `?.` member access, distinguished by `safe`.
    Member {
        receiver: Box<Expression>,
        name: String,
        safe: bool,
        span: Span,
    },
    Index {
        receiver: Box<Expression>,
        index: Box<Expression>,
        span: Span,
    },

    If {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Option<Box<Expression>>,
        span: Span,
    },
    When {
        subject: Option<Box<Expression>>,
        arms: Vec<WhenArm>,
        span: Span,
    },

    Range {
        start: Box<Expression>,
        end: Box<Expression>,
        inclusive: bool,
        span: Span,
    },
    Elvis {
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    /// Postfix `expr?` error propagation.
    ErrorPropagation { inner: Box<Expression>, span: Span },
    /// `expr!!` not-null assertion.
    NotNullAssert { inner: Box<Expression>, span: Span },

    Is {
        value: Box<Expression>,
        type_ref: TypeRef,
        negated: bool,
        span: Span,
    },
    As {
        value: Box<Expression>,
        type_ref: TypeRef,
        nullable: bool,
        span: Span,
    },
    In {
        value: Box<Expression>,
        range: Box<Expression>,
        negated: bool,
        span: Span,
    },

    CollectionLiteral {
        kind: CollectionKind,
        elements: Vec<CollectionElement>,
        span: Span,
    },

    /// `use (resource) { body }`.
    Use {
        resource: Box<Expression>,
        body: Vec<Statement>,
        span: Span,
    },

    /// A standalone `@name` or `@name(args)` that did not resolve to a
    /// loop label during the label-vs-`@`-operator disambiguation (§4.2).
    Annotated {
        name: String,
        args: Vec<Expression>,
        inner: Box<Expression>,
        span: Span,
    },
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::IntLiteral { span, .. }
            | Expression::LongLiteral { span, .. }
            | Expression::DoubleLiteral { span, .. }
            | Expression::FloatLiteral { span, .. }
            | Expression::BoolLiteral { span, .. }
            | Expression::CharLiteral { span, .. }
            | Expression::NullLiteral { span }
            | Expression::StringLiteral { span, .. }
            | Expression::Identifier { span, .. }
            | Expression::This { span }
            | Expression::Super { span }
            | Expression::Binary { span, .. }
            | Expression::Unary { span, .. }
            | Expression::Call { span, .. }
            | Expression::Member { span, .. }
            | Expression::Index { span, .. }
            | Expression::If { span, .. }
            | Expression::When { span, .. }
            | Expression::Range { span, .. }
            | Expression::Elvis { span, .. }
            | Expression::ErrorPropagation { span, .. }
            | Expression::NotNullAssert { span, .. }
            | Expression::Is { span, .. }
            | Expression::As { span, .. }
            | Expression::In { span, .. }
            | Expression::CollectionLiteral { span, .. }
            | Expression::Use { span, .. }
            | Expression::Annotated { span, .. } => *span,
            Expression::Lambda(l) => l.span,
        }
    }
}

/// Where one call argument sits in the original token order, for
/// diagnostics that must point at e.g. the third written argument even
/// after positional/named/spread groups are split apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgSlot {
    Positional(usize),
    Named(usize),
    Spread(usize),
}

// ==================== Types ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeRef {
    Simple {
        name: String,
        type_args: Vec<TypeRef>,
        span: Span,
    },
    Nullable {
        inner: Box<TypeRef>,
        span: Span,
    },
    Function {
        receiver: Option<Box<TypeRef>>,
        params: Vec<TypeRef>,
        return_type: Box<TypeRef>,
        span: Span,
    },
    /// No type annotation was written; filled in by inference.
    Inferred { span: Span },
}

impl TypeRef {
    pub fn span(&self) -> Span {
        match self {
            TypeRef::Simple { span, .. }
            | TypeRef::Nullable { span, .. }
            | TypeRef::Function { span, .. }
            | TypeRef::Inferred { span } => *span,
        }
    }
}

/// The root AST node: a whole compilation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub imports: Vec<ImportDecl>,
    pub declarations: Vec<Declaration>,
    pub span: Span,
}
