//! The unified type representation (§3.4): one sum type, `NovaType`, used
//! from semantic analysis through IR and both back ends. `TypeRef` (the
//! parser's syntactic type annotation) is converted to `NovaType` at
//! analyzer entry and never seen again downstream — there is no second,
//! parallel IR-level type representation (§9 "Unifying the type system").

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every Nova type, from a single primitive to a generic function type.
///
/// Invariants (§3.4): `Nullable(Nullable(T))` simplifies to `Nullable(T)`
/// (enforced by the [`NovaType::nullable`] constructor, not by consumers);
/// `Union` collapses to its single member when all members are identical;
/// equality is structural (derived `PartialEq`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NovaType {
    Primitive(PrimitiveType),
    Class {
        qualified_name: String,
        type_args: Vec<NovaType>,
    },
    Function {
        params: Vec<NovaType>,
        return_type: Box<NovaType>,
        receiver: Option<Box<NovaType>>,
    },
    /// Invariant: inner is never itself `Nullable` — see [`NovaType::nullable`].
    Nullable(Box<NovaType>),
    TypeParameter {
        name: String,
        bound: Option<Box<NovaType>>,
    },
    /// Used only internally during inference (§3.4); must be resolved to
    /// a concrete type (or collapsed to a single member) before it
    /// reaches lowering.
    Union(Vec<NovaType>),
    /// Placeholder for a name not yet resolved; must not reach code gen
    /// (§3.4, §7 `LoweringError::InternalInvariant`).
    Unresolved(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Int,
    Long,
    Double,
    Float,
    Boolean,
    Char,
    String,
    Unit,
    Nothing,
    Any,
}

impl NovaType {
    pub fn int() -> Self {
        NovaType::Primitive(PrimitiveType::Int)
    }

    pub fn unit() -> Self {
        NovaType::Primitive(PrimitiveType::Unit)
    }

    pub fn any() -> Self {
        NovaType::Primitive(PrimitiveType::Any)
    }

    pub fn nothing() -> Self {
        NovaType::Primitive(PrimitiveType::Nothing)
    }

    pub fn string() -> Self {
        NovaType::Primitive(PrimitiveType::String)
    }

    pub fn boolean() -> Self {
        NovaType::Primitive(PrimitiveType::Boolean)
    }

    /// Wrap `inner` in `Nullable`, collapsing `Nullable(Nullable(T))` to
    /// `Nullable(T)` per the §3.4 invariant.
    pub fn nullable(inner: NovaType) -> Self {
        match inner {
            NovaType::Nullable(_) => inner,
            other => NovaType::Nullable(Box::new(other)),
        }
    }

    /// Build a `Union`, collapsing to the single member when every member
    /// is structurally identical (§3.4).
    pub fn union(mut members: Vec<NovaType>) -> Self {
        members.dedup();
        if members.len() == 1 {
            members.into_iter().next().unwrap()
        } else {
            NovaType::Union(members)
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, NovaType::Nullable(_))
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, NovaType::Unresolved(_))
            || matches!(self, NovaType::Nullable(inner) if inner.is_unresolved())
    }

    /// The non-nullable type underneath, or `self` if already non-nullable.
    pub fn strip_nullable(&self) -> &NovaType {
        match self {
            NovaType::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Structural equality ignoring a leading `Nullable` wrapper on either
    /// side — used by `a ?: b` desugaring to check that `b`'s type is
    /// already compatible with `a`'s non-null type.
    pub fn equals_ignoring_nullability(&self, other: &NovaType) -> bool {
        self.strip_nullable() == other.strip_nullable()
    }

    /// Is `self` assignable to `target`? (§4.3 nullability / modifier
    /// checks lean on this.) Widening rules: `Int -> Long -> Double`
    /// (§4.7 implicit promotion), `Nothing` is assignable to anything,
    /// anything non-nullable is assignable to its `Nullable` wrapper, and
    /// `Any` accepts everything.
    pub fn is_assignable_to(&self, target: &NovaType) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (NovaType::Primitive(PrimitiveType::Nothing), _) => true,
            (_, NovaType::Primitive(PrimitiveType::Any)) => true,
            (_, NovaType::Nullable(inner)) => {
                matches!(self, NovaType::Primitive(PrimitiveType::Nothing))
                    || self.is_assignable_to(inner)
            }
            (NovaType::Nullable(_), _) => false,
            (NovaType::Primitive(a), NovaType::Primitive(b)) => numeric_widens_to(*a, *b),
            (
                NovaType::Class {
                    qualified_name: a, ..
                },
                NovaType::Class {
                    qualified_name: b, ..
                },
            ) => a == b,
            (NovaType::Union(members), _) => members.iter().all(|m| m.is_assignable_to(target)),
            (_, NovaType::Union(members)) => members.iter().any(|m| self.is_assignable_to(m)),
            _ => false,
        }
    }

    /// The least-upper-bound of two types, used for `when`-expression
    /// branch unification (§4.3).
    pub fn least_upper_bound(&self, other: &NovaType) -> NovaType {
        if self == other {
            return self.clone();
        }
        if self.is_assignable_to(other) {
            return other.clone();
        }
        if other.is_assignable_to(self) {
            return self.clone();
        }
        if self.strip_nullable() == other.strip_nullable() {
            return NovaType::nullable(self.strip_nullable().clone());
        }
        NovaType::union(vec![self.clone(), other.clone()])
    }
}

fn numeric_widens_to(from: PrimitiveType, to: PrimitiveType) -> bool {
    use PrimitiveType::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (Int, Long) | (Int, Double) | (Int, Float) | (Long, Double) | (Float, Double)
    )
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::Int => "Int",
            PrimitiveType::Long => "Long",
            PrimitiveType::Double => "Double",
            PrimitiveType::Float => "Float",
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Char => "Char",
            PrimitiveType::String => "String",
            PrimitiveType::Unit => "Unit",
            PrimitiveType::Nothing => "Nothing",
            PrimitiveType::Any => "Any",
        };
        f.write_str(name)
    }
}

impl fmt::Display for NovaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NovaType::Primitive(p) => write!(f, "{p}"),
            NovaType::Class {
                qualified_name,
                type_args,
            } => {
                write!(f, "{qualified_name}")?;
                if !type_args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in type_args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            NovaType::Function {
                params,
                return_type,
                receiver,
            } => {
                if let Some(r) = receiver {
                    write!(f, "{r}.")?;
                }
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {return_type}")
            }
            NovaType::Nullable(inner) => write!(f, "{inner}?"),
            NovaType::TypeParameter { name, bound } => {
                write!(f, "{name}")?;
                if let Some(b) = bound {
                    write!(f, " : {b}")?;
                }
                Ok(())
            }
            NovaType::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            NovaType::Unresolved(name) => write!(f, "<unresolved {name}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_of_nullable_collapses() {
        let t = NovaType::nullable(NovaType::nullable(NovaType::int()));
        assert_eq!(t, NovaType::Nullable(Box::new(NovaType::int())));
    }

    #[test]
    fn union_of_identical_members_collapses() {
        let t = NovaType::union(vec![NovaType::int(), NovaType::int()]);
        assert_eq!(t, NovaType::int());
    }

    #[test]
    fn union_of_distinct_members_stays_union() {
        let t = NovaType::union(vec![NovaType::int(), NovaType::string()]);
        assert!(matches!(t, NovaType::Union(_)));
    }

    #[test]
    fn int_widens_to_long_and_double() {
        assert!(NovaType::int().is_assignable_to(&NovaType::Primitive(PrimitiveType::Long)));
        assert!(NovaType::int().is_assignable_to(&NovaType::Primitive(PrimitiveType::Double)));
        assert!(!NovaType::Primitive(PrimitiveType::Double).is_assignable_to(&NovaType::int()));
    }

    #[test]
    fn nothing_assignable_to_anything() {
        assert!(NovaType::nothing().is_assignable_to(&NovaType::string()));
        assert!(NovaType::nothing().is_assignable_to(&NovaType::nullable(NovaType::int())));
    }

    #[test]
    fn non_nullable_assignable_to_nullable_wrapper() {
        assert!(NovaType::int().is_assignable_to(&NovaType::nullable(NovaType::int())));
        assert!(!NovaType::nullable(NovaType::int()).is_assignable_to(&NovaType::int()));
    }

    #[test]
    fn anything_assignable_to_any() {
        assert!(NovaType::string().is_assignable_to(&NovaType::any()));
        assert!(NovaType::nullable(NovaType::int()).is_assignable_to(&NovaType::any()));
    }

    #[test]
    fn lub_of_matching_nullability_widens() {
        let lub = NovaType::int().least_upper_bound(&NovaType::nullable(NovaType::int()));
        assert_eq!(lub, NovaType::nullable(NovaType::int()));
    }

    #[test]
    fn display_renders_nullable_and_function_types() {
        let f = NovaType::Function {
            params: vec![NovaType::int()],
            return_type: Box::new(NovaType::string()),
            receiver: None,
        };
        assert_eq!(f.to_string(), "(Int) -> String");
        assert_eq!(NovaType::nullable(NovaType::int()).to_string(), "Int?");
    }

    #[test]
    fn class_display_includes_type_args() {
        let t = NovaType::Class {
            qualified_name: "List".into(),
            type_args: vec![NovaType::int()],
        };
        assert_eq!(t.to_string(), "List<Int>");
    }
}
