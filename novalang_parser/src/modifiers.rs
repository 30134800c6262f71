//! Modifier sets: a bit-set over declaration modifiers, validated at parse
//! time against the exclusivity groups in §3.3/§4.2.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::span::Span;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Internal,
    Abstract,
    Open,
    Final,
    Override,
    Inline,
    Static,
}

impl Modifier {
    pub fn from_token(token: &Token) -> Option<Self> {
        Some(match token {
            Token::KwPublic => Modifier::Public,
            Token::KwPrivate => Modifier::Private,
            Token::KwProtected => Modifier::Protected,
            Token::KwInternal => Modifier::Internal,
            Token::KwAbstract => Modifier::Abstract,
            Token::KwOpen => Modifier::Open,
            Token::KwFinal => Modifier::Final,
            Token::KwOverride => Modifier::Override,
            Token::KwInline => Modifier::Inline,
            Token::KwStatic => Modifier::Static,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Public => "public",
            Modifier::Private => "private",
            Modifier::Protected => "protected",
            Modifier::Internal => "internal",
            Modifier::Abstract => "abstract",
            Modifier::Open => "open",
            Modifier::Final => "final",
            Modifier::Override => "override",
            Modifier::Inline => "inline",
            Modifier::Static => "static",
        }
    }

    /// The exclusivity group this modifier belongs to. Two modifiers in
    /// the same group (or a duplicate of the same modifier) conflict.
    /// Every modifier not covered by the named groups is its own
    /// singleton group (§3.3).
    fn group(&self) -> ModifierGroup {
        match self {
            Modifier::Public | Modifier::Private | Modifier::Protected | Modifier::Internal => {
                ModifierGroup::Visibility
            }
            Modifier::Abstract | Modifier::Open | Modifier::Final => ModifierGroup::Inheritance,
            Modifier::Override => ModifierGroup::Singleton(Modifier::Override),
            Modifier::Inline => ModifierGroup::Singleton(Modifier::Inline),
            Modifier::Static => ModifierGroup::Singleton(Modifier::Static),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModifierGroup {
    Visibility,
    Inheritance,
    Singleton(Modifier),
}

/// A validated, order-preserving set of modifiers attached to one
/// declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierSet {
    modifiers: Vec<Modifier>,
}

impl ModifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to add `modifier`, seen at `span`. Fails with
    /// `ParseError::ConflictingModifier` if `modifier`'s group already has
    /// an entry (including a literal duplicate).
    pub fn try_add(&mut self, modifier: Modifier, span: Span) -> Result<(), ParseError> {
        if let Some(existing) = self
            .modifiers
            .iter()
            .find(|m| m.group() == modifier.group())
        {
            return Err(ParseError::ConflictingModifier {
                a: existing.as_str().to_string(),
                b: modifier.as_str().to_string(),
                span,
            });
        }
        self.modifiers.push(modifier);
        Ok(())
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Modifier> {
        self.modifiers.iter()
    }

    pub fn visibility(&self) -> Option<Modifier> {
        self.modifiers
            .iter()
            .copied()
            .find(|m| m.group() == ModifierGroup::Visibility)
    }

    /// Render in a canonical, re-parseable form (space-separated, in the
    /// order they were written) — the round-trip property in §8.
    pub fn to_source(&self) -> String {
        self.modifiers
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(0, 0, 1, 1, 1, 1, 2)
    }

    #[test]
    fn visibility_modifiers_conflict() {
        let mut set = ModifierSet::new();
        set.try_add(Modifier::Public, span()).unwrap();
        let err = set.try_add(Modifier::Private, span()).unwrap_err();
        assert!(matches!(err, ParseError::ConflictingModifier { .. }));
    }

    #[test]
    fn inheritance_modifiers_conflict() {
        let mut set = ModifierSet::new();
        set.try_add(Modifier::Abstract, span()).unwrap();
        let err = set.try_add(Modifier::Final, span()).unwrap_err();
        assert!(matches!(err, ParseError::ConflictingModifier { .. }));
    }

    #[test]
    fn duplicate_modifier_conflicts() {
        let mut set = ModifierSet::new();
        set.try_add(Modifier::Public, span()).unwrap();
        let err = set.try_add(Modifier::Public, span()).unwrap_err();
        assert!(matches!(err, ParseError::ConflictingModifier { .. }));
    }

    #[test]
    fn distinct_groups_coexist() {
        let mut set = ModifierSet::new();
        set.try_add(Modifier::Public, span()).unwrap();
        set.try_add(Modifier::Abstract, span()).unwrap();
        set.try_add(Modifier::Override, span()).unwrap();
        assert_eq!(set.iter().count(), 3);
    }

    #[test]
    fn round_trips_through_source_form() {
        let mut set = ModifierSet::new();
        set.try_add(Modifier::Public, span()).unwrap();
        set.try_add(Modifier::Open, span()).unwrap();
        assert_eq!(set.to_source(), "public open");
    }
}
