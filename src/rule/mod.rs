// src/rule/mod.rs
//! `include_if` rules.
//!
//! A rule is a small, side-effect free boolean expression over four item
//! fields (`title`, `description`, `link`, `categories`). It is compiled once,
//! type-checked against those declarations, and then evaluated per item. An
//! empty (or whitespace-only) expression compiles to a rule that keeps every
//! item.
//!
//! ```
//! use feedfilter::rule::{ItemFields, Rule};
//!
//! let rule = Rule::compile("title.contains('Rust') || 'rust' in categories").unwrap();
//! let cats = vec!["rust".to_string()];
//! let item = ItemFields { title: "Weekly news", categories: &cats, ..Default::default() };
//! assert!(rule.evaluate(&item).unwrap());
//! ```

mod checker;
mod error;
mod eval;
mod lexer;
mod parser;
mod types;

use std::collections::HashMap;

use regex::Regex;

pub use error::{CompileError, EvalError};
pub use parser::MAX_NESTING;
pub use types::Type;

use crate::source::SourceItem;
use eval::{Interpreter, Value};
use parser::Expr;

/// The fields of one item that a rule can see.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemFields<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub link: &'a str,
    pub categories: &'a [String],
}

impl<'a> From<&'a SourceItem> for ItemFields<'a> {
    fn from(item: &'a SourceItem) -> Self {
        Self {
            title: &item.title,
            description: &item.description,
            link: &item.link,
            categories: &item.categories,
        }
    }
}

/// Variables in scope for every rule, with their static types.
pub fn declarations() -> Vec<(&'static str, Type)> {
    vec![
        ("title", Type::String),
        ("description", Type::String),
        ("link", Type::String),
        ("categories", Type::list_of(Type::String)),
    ]
}

#[derive(Debug, Clone)]
struct Program {
    source: String,
    expr: Expr,
    regexes: HashMap<String, Regex>,
}

/// A compiled `include_if` rule. Immutable and safe to share across threads.
#[derive(Debug, Clone)]
pub struct Rule {
    program: Option<Program>,
}

impl Rule {
    pub fn accept_all() -> Self {
        Self { program: None }
    }

    pub fn compile(expression: &str) -> Result<Self, CompileError> {
        if expression.trim().is_empty() {
            return Ok(Self::accept_all());
        }

        let expr = parser::parse(expression)?;
        let checked = checker::check(&expr, &declarations())?;
        if !checked.result.assignable_to(&Type::Bool) {
            return Err(CompileError::NotBoolean {
                found: checked.result,
            });
        }

        tracing::debug!(
            target: "rule",
            regexes = checked.regexes.len(),
            "compiled include_if rule"
        );

        Ok(Self {
            program: Some(Program {
                source: expression.to_string(),
                expr,
                regexes: checked.regexes,
            }),
        })
    }

    pub fn is_accept_all(&self) -> bool {
        self.program.is_none()
    }

    /// Source text of the compiled expression; `None` for accept-all.
    pub fn expression(&self) -> Option<&str> {
        self.program.as_ref().map(|p| p.source.as_str())
    }

    /// Decide whether an item is kept.
    ///
    /// A result of `null` or any non-bool value is an error, never "false".
    pub fn evaluate(&self, fields: &ItemFields<'_>) -> Result<bool, EvalError> {
        let Some(program) = &self.program else {
            return Ok(true);
        };
        match Interpreter::new(&program.regexes, fields).eval(&program.expr)? {
            Value::Bool(keep) => Ok(keep),
            Value::Null => Err(EvalError::NullResult),
            other => Err(EvalError::NotBoolean {
                found: other.type_name(),
            }),
        }
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::accept_all()
    }
}
