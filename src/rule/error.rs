// src/rule/error.rs
use thiserror::Error;

use super::types::Type;

/// The expression was rejected before any item was looked at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("undeclared reference to '{name}' at offset {offset}")]
    UndeclaredReference { name: String, offset: usize },

    #[error("found no matching overload for '{function}' applied to ({args}) at offset {offset}")]
    NoMatchingOverload {
        function: String,
        args: String,
        offset: usize,
    },

    #[error("type {on} has no field '{field}' (offset {offset})")]
    UnsupportedSelection {
        field: String,
        on: Type,
        offset: usize,
    },

    #[error("invalid regular expression {pattern:?} at offset {offset}: {message}")]
    InvalidRegex {
        pattern: String,
        message: String,
        offset: usize,
    },

    #[error("expression nesting exceeds the limit of {limit}")]
    TooDeep { limit: usize },

    #[error("expression must evaluate to bool, found {found}")]
    NotBoolean { found: Type },
}

impl CompileError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        CompileError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

/// Evaluation of a compiled rule against one item failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("modulus by zero")]
    ModulusByZero,

    #[error("integer overflow in '{op}'")]
    Overflow { op: &'static str },

    #[error("index {index} out of range for list of size {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("invalid regular expression {pattern:?}: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("invalid conversion: {0}")]
    InvalidConversion(String),

    #[error("no matching overload for '{function}' applied to ({args})")]
    NoMatchingOverload { function: String, args: String },

    #[error("rule produced a {found} instead of a bool")]
    NotBoolean { found: &'static str },

    #[error("rule produced null instead of a bool")]
    NullResult,
}
