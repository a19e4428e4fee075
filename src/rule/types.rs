// src/rule/types.rs
//! Static types of the rule language.

use std::fmt;

/// Static type assigned by the checker.
///
/// `Dyn` means "not known until evaluation": it is assignable to and from
/// every other type, and the interpreter re-checks operands at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Bool,
    Int,
    Double,
    String,
    Null,
    List(Box<Type>),
    Dyn,
}

impl Type {
    pub fn list_of(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn is_dyn(&self) -> bool {
        matches!(self, Type::Dyn)
    }

    /// Whether a value of type `self` may be passed where `expected` is required.
    pub fn assignable_to(&self, expected: &Type) -> bool {
        match (self, expected) {
            (Type::Dyn, _) | (_, Type::Dyn) => true,
            (Type::List(a), Type::List(b)) => a.assignable_to(b),
            (a, b) => a == b,
        }
    }

    /// Least common type of two branches / list elements, if any.
    pub fn join(&self, other: &Type) -> Option<Type> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (Type::Dyn, _) | (_, Type::Dyn) => Some(Type::Dyn),
            (Type::List(a), Type::List(b)) => a.join(b).map(Type::list_of),
            _ => None,
        }
    }

    /// Element type when iterating, for lists and `dyn`.
    pub fn element(&self) -> Option<Type> {
        match self {
            Type::List(elem) => Some((**elem).clone()),
            Type::Dyn => Some(Type::Dyn),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Double => write!(f, "double"),
            Type::String => write!(f, "string"),
            Type::Null => write!(f, "null_type"),
            Type::List(elem) => write!(f, "list({elem})"),
            Type::Dyn => write!(f, "dyn"),
        }
    }
}

/// Renders an argument list the way overload errors show it: `(string, int)`.
pub(crate) fn describe_args(types: &[Type]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dyn_is_assignable_both_ways() {
        assert!(Type::Dyn.assignable_to(&Type::Bool));
        assert!(Type::String.assignable_to(&Type::Dyn));
        assert!(Type::list_of(Type::Dyn).assignable_to(&Type::list_of(Type::String)));
        assert!(!Type::Int.assignable_to(&Type::Double));
    }

    #[test]
    fn join_widens_mismatched_lists_only_through_dyn() {
        assert_eq!(Type::Int.join(&Type::Int), Some(Type::Int));
        assert_eq!(Type::Int.join(&Type::String), None);
        assert_eq!(
            Type::list_of(Type::Dyn).join(&Type::list_of(Type::String)),
            Some(Type::list_of(Type::Dyn))
        );
    }

    #[test]
    fn display_matches_error_wording() {
        assert_eq!(Type::list_of(Type::String).to_string(), "list(string)");
        assert_eq!(describe_args(&[Type::String, Type::Int]), "string, int");
    }
}
