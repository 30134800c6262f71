//! Side tables for parent/scope relationships (§3.3, §3.7, §9 "Cyclic
//! references"): the AST/HIR tree itself is strictly top-down, so any
//! bottom-up relationship — symbol → declaration, `break` label → target
//! loop — lives here, keyed by a stable [`NodeId`], resolved during
//! semantic analysis.
//!
//! Grounded on the teacher's `compile/abstract_interp/env.rs`: a scoped
//! environment kept separate from the IR tree rather than threaded
//! through it.

use std::collections::HashMap;

use novalang_parser::span::Span;

use crate::types::NovaType;

/// A stable identifier assigned to an AST/HIR node during analysis,
/// independent of the node's position in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Default)]
pub struct NodeIdGen(u32);

impl NodeIdGen {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.0);
        self.0 += 1;
        id
    }
}

/// What introduced a scope (§4.3: "Scope kinds: file, class, function,
/// block").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    File,
    Class,
    Function,
    Block,
}

/// Mutability of a binding — a `val` cannot be reassigned (§3.3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Val,
    Var,
}

/// A single resolved binding: a variable, parameter, or function name
/// visible in some scope.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: NovaType,
    pub mutability: Mutability,
    pub declared_at: Span,
    pub node_id: NodeId,
}

/// One lexical scope. Declarations are recorded in source order as the
/// analyzer walks them (§4.3).
#[derive(Debug, Default)]
pub struct Scope {
    pub kind: Option<ScopeKind>,
    bindings: HashMap<String, Symbol>,
    /// Whether this scope is a loop body, so `break @label`/`continue
    /// @label` — and unlabeled `break`/`continue` — can resolve to the
    /// right enclosing loop (§3.3). `loop_label` is `Some` only when the
    /// loop itself was written with a label.
    is_loop: bool,
    pub loop_label: Option<String>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind: Some(kind),
            bindings: HashMap::new(),
            is_loop: false,
            loop_label: None,
        }
    }

    pub fn loop_scope(label: Option<String>) -> Self {
        Self {
            kind: Some(ScopeKind::Block),
            bindings: HashMap::new(),
            is_loop: true,
            loop_label: label,
        }
    }
}

/// A stack of lexical scopes, innermost last. Declaring a name already
/// present in the *same* scope is a redeclaration error (§4.3); declaring
/// a name present in an *enclosing* scope shadows it (warning at strict,
/// §4.3, §9 Open Question 1).
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    /// Resolved declaration-site span for every name reference, keyed by
    /// the reference's own [`NodeId`] (§3.3, §9).
    resolutions: HashMap<NodeId, Span>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeKind::File)],
            resolutions: HashMap::new(),
        }
    }

    pub fn push_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) -> Scope {
        assert!(self.scopes.len() > 1, "cannot pop the file scope");
        self.scopes.pop().unwrap()
    }

    /// Declare `symbol` in the current (innermost) scope. Returns `Err`
    /// with the prior declaration's span if `name` is already declared in
    /// this exact scope (§4.3 "a redeclaration in the same scope is an
    /// error"). Declaring over an *enclosing* scope's binding is allowed
    /// (shadowing) and returns `Ok(Some(shadowed_span))`.
    pub fn declare(&mut self, symbol: Symbol) -> Result<Option<Span>, Span> {
        let current = self.scopes.last_mut().expect("at least one scope");
        if let Some(existing) = current.bindings.get(&symbol.name) {
            return Err(existing.declared_at);
        }
        let shadowed = self.lookup(&symbol.name).map(|s| s.declared_at);
        current.bindings.insert(symbol.name.clone(), symbol);
        Ok(shadowed)
    }

    /// Look up `name` from the innermost scope outward.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    /// Find the nearest enclosing loop scope, optionally matching
    /// `label`. `None` label matches the nearest loop regardless of its
    /// own label (unlabeled `break`/`continue`); `Some(label)` requires an
    /// exact match (§3.3 "break/continue referencing @label").
    pub fn resolve_loop(&self, label: Option<&str>) -> Option<usize> {
        self.scopes.iter().enumerate().rev().find_map(|(i, s)| {
            if !s.is_loop {
                return None;
            }
            match label {
                None => Some(i),
                Some(l) => (s.loop_label.as_deref() == Some(l)).then_some(i),
            }
        })
    }

    pub fn record_resolution(&mut self, reference: NodeId, declared_at: Span) {
        self.resolutions.insert(reference, declared_at);
    }

    pub fn resolution(&self, reference: NodeId) -> Option<Span> {
        self.resolutions.get(&reference).copied()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(0, 0, 1, 1, 1, 1, 2)
    }

    fn symbol(name: &str) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty: NovaType::int(),
            mutability: Mutability::Val,
            declared_at: span(),
            node_id: NodeId(0),
        }
    }

    #[test]
    fn redeclaration_in_same_scope_errors() {
        let mut table = SymbolTable::new();
        table.declare(symbol("x")).unwrap();
        let err = table.declare(symbol("x"));
        assert!(err.is_err());
    }

    #[test]
    fn shadowing_inner_scope_is_allowed() {
        let mut table = SymbolTable::new();
        table.declare(symbol("x")).unwrap();
        table.push_scope(Scope::new(ScopeKind::Block));
        let shadowed = table.declare(symbol("x")).unwrap();
        assert!(shadowed.is_some());
    }

    #[test]
    fn lookup_finds_outer_scope_binding() {
        let mut table = SymbolTable::new();
        table.declare(symbol("x")).unwrap();
        table.push_scope(Scope::new(ScopeKind::Block));
        assert!(table.lookup("x").is_some());
        assert!(table.lookup("y").is_none());
    }

    #[test]
    fn unlabeled_break_resolves_to_nearest_loop() {
        let mut table = SymbolTable::new();
        table.push_scope(Scope::loop_scope(Some("outer".into())));
        table.push_scope(Scope::loop_scope(None));
        assert_eq!(table.resolve_loop(None), Some(2));
        assert_eq!(table.resolve_loop(Some("outer")), Some(1));
        assert_eq!(table.resolve_loop(Some("missing")), None);
    }

    #[test]
    fn node_id_gen_is_monotonic() {
        let mut gen = NodeIdGen::new();
        let a = gen.next();
        let b = gen.next();
        assert_ne!(a, b);
        assert!(b.0 > a.0);
    }
}
