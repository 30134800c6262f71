//! Error kinds raised by the analyzer, lowerers, and back ends (§7).
//!
//! `novalang_parser::error` already owns `LexicalError`/`ParseError`; this
//! module owns the three stages downstream of parsing, plus an umbrella
//! `CoreError` that wraps whichever stage actually failed, the way the
//! teacher's `pipeline::PipelineError` wraps `SyntaxError`/`UnsupportedFeature`/
//! `LoadError` behind one `Display` impl.

use novalang_parser::span::Span;
use novalang_parser::ParseError;
use thiserror::Error;

use crate::types::NovaType;

/// Errors raised by the semantic analyzer (§4.3, §7). These accumulate as
/// diagnostics during analysis and never abort the pipeline by
/// themselves — see [`crate::diagnostics`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("unresolved name '{name}' at {span:?}")]
    UnresolvedName { name: String, span: Span },

    #[error("type mismatch at {span:?}: expected {expected}, found {found}")]
    TypeMismatch {
        expected: NovaType,
        found: NovaType,
        span: Span,
    },

    #[error("arity mismatch at {span:?}: expected {expected} argument(s), found {found}")]
    ArityMismatch {
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("duplicate declaration of '{name}' at {span:?}")]
    DuplicateDeclaration { name: String, span: Span },

    #[error("invalid override of '{name}' at {span:?}: {reason}")]
    InvalidOverride {
        name: String,
        reason: String,
        span: Span,
    },

    #[error("unreachable code at {span:?}")]
    UnreachableCode { span: Span },

    #[error("possible null dereference of '{name}' at {span:?}")]
    NullDereference { name: String, span: Span },

    #[error("cannot reassign val '{name}' at {span:?}")]
    ReassignedVal { name: String, span: Span },

    #[error("non-exhaustive 'when' at {span:?}: missing case(s) {missing:?}")]
    NonExhaustiveWhen { missing: Vec<String>, span: Span },
}

impl SemanticError {
    pub fn span(&self) -> Span {
        match self {
            SemanticError::UnresolvedName { span, .. }
            | SemanticError::TypeMismatch { span, .. }
            | SemanticError::ArityMismatch { span, .. }
            | SemanticError::DuplicateDeclaration { span, .. }
            | SemanticError::InvalidOverride { span, .. }
            | SemanticError::UnreachableCode { span }
            | SemanticError::NullDereference { span, .. }
            | SemanticError::ReassignedVal { span, .. }
            | SemanticError::NonExhaustiveWhen { span, .. } => *span,
        }
    }
}

/// Errors raised while lowering AST→HIR or HIR→MIR (§7).
///
/// `InternalInvariant` must never be triggered by user input in a
/// shipping build — reaching it aborts the current compilation unit
/// (§7's recovery-policy table: "Lowerer — Continue after error? No").
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoweringError {
    #[error("internal invariant violated during lowering at {span:?}: {detail}")]
    InternalInvariant { detail: String, span: Span },

    #[error("cannot lower unresolved type at {span:?}")]
    UnresolvedType { span: Span },

    #[error("invalid reference at {span:?}: {detail}")]
    InvalidReference { detail: String, span: Span },
}

impl LoweringError {
    pub fn span(&self) -> Span {
        match self {
            LoweringError::InternalInvariant { span, .. }
            | LoweringError::UnresolvedType { span }
            | LoweringError::InvalidReference { span, .. } => *span,
        }
    }
}

/// Target-specific emission failures (§7). Emission failure for one
/// function does not prevent other functions in the same unit from being
/// emitted (§7's recovery-policy table: "Back end — Other functions OK").
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("cannot emit function '{function}': {detail}")]
    EmissionFailed { function: String, detail: String },

    #[error("evaluator trapped: {0}")]
    Trap(String),
}

/// The umbrella error the `novalang_core` pipeline entry points return,
/// wrapping whichever stage actually failed (§6.3, §7).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("lowering error: {0}")]
    Lowering(#[from] LoweringError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

pub type CoreResult<T> = Result<T, CoreError>;
