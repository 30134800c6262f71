//! The stdlib registration catalog: the single cross-module contract
//! between the compiler core and whatever runtime backs a compiled
//! program (§6.4).
//!
//! The core never calls into a runtime implementation directly. It emits
//! a `StaticCall(owner, method, descriptor, args)` instruction against a
//! [`Registration`] looked up by canonical name, and the runtime decides
//! how (or whether) to honor it. This crate only carries the metadata
//! shape; it does not implement collection operations, math, or
//! concurrency primitives, which are out of scope for the core.

use std::collections::HashMap;

/// `-1` marks a variadic registration; any other value is an exact arity.
pub const VARIADIC: i32 = -1;

/// One entry in the stdlib registration catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Canonical name as it appears in NovaLang source, e.g. `"String.uppercase"`.
    pub canonical_name: String,
    /// Parameter count, or [`VARIADIC`].
    pub arity: i32,
    /// The artifact (class/module) that owns the target implementation.
    pub owner: String,
    /// The target method or field name on `owner`.
    pub method: String,
    /// A target signature descriptor, opaque to the compiler, passed
    /// through verbatim to the emitted `StaticCall`.
    pub descriptor: String,
    /// The signature as it should be shown to Nova-side tooling (LSP, docs).
    pub nova_signature: String,
}

impl Registration {
    pub fn new(
        canonical_name: impl Into<String>,
        arity: i32,
        owner: impl Into<String>,
        method: impl Into<String>,
        descriptor: impl Into<String>,
        nova_signature: impl Into<String>,
    ) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            arity,
            owner: owner.into(),
            method: method.into(),
            descriptor: descriptor.into(),
            nova_signature: nova_signature.into(),
        }
    }

    pub fn is_variadic(&self) -> bool {
        self.arity == VARIADIC
    }

    /// Whether a call with `arg_count` positional arguments matches this
    /// registration's declared arity.
    pub fn accepts_arity(&self, arg_count: usize) -> bool {
        self.is_variadic() || self.arity as usize == arg_count
    }
}

/// A catalog of registrations, keyed by canonical name, built once before
/// compilation starts and consulted by call-resolution in the analyzer and
/// by `StaticCall` emission in the lowerer.
#[derive(Debug, Default, Clone)]
pub struct RegistrationCatalog {
    entries: HashMap<String, Registration>,
}

impl RegistrationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, registration: Registration) {
        self.entries
            .insert(registration.canonical_name.clone(), registration);
    }

    pub fn lookup(&self, canonical_name: &str) -> Option<&Registration> {
        self.entries.get(canonical_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variadic_registration_accepts_any_arity() {
        let reg = Registration::new(
            "println",
            VARIADIC,
            "nova/lang/Console",
            "println",
            "([Ljava/lang/Object;)V",
            "fun println(vararg args: Any?)",
        );
        assert!(reg.accepts_arity(0));
        assert!(reg.accepts_arity(5));
    }

    #[test]
    fn fixed_arity_registration_rejects_mismatches() {
        let reg = Registration::new(
            "String.uppercase",
            0,
            "nova/lang/StringExt",
            "uppercase",
            "(Ljava/lang/String;)Ljava/lang/String;",
            "fun String.uppercase(): String",
        );
        assert!(reg.accepts_arity(0));
        assert!(!reg.accepts_arity(1));
    }

    #[test]
    fn catalog_looks_up_by_canonical_name() {
        let mut catalog = RegistrationCatalog::new();
        catalog.register(Registration::new(
            "Int.plus",
            1,
            "nova/lang/IntExt",
            "plus",
            "(I)I",
            "operator fun Int.plus(other: Int): Int",
        ));
        assert!(catalog.lookup("Int.plus").is_some());
        assert!(catalog.lookup("Int.minus").is_none());
    }
}
