// src/rule/checker.rs
//! Static type-checking pass.
//!
//! Runs once per compile, before any item is evaluated. Besides assigning a
//! type to the whole expression it pre-compiles every literal regex pattern
//! handed to `matches`, so a bad pattern is a compile error and the per-item
//! path never has to build it.

use std::collections::HashMap;

use regex::Regex;

use super::error::CompileError;
use super::parser::{BinaryOp, Expr, ExprKind, Literal, MacroKind, UnaryOp};
use super::types::{describe_args, Type};

pub(crate) struct Checked {
    pub result: Type,
    pub regexes: HashMap<String, Regex>,
}

pub(crate) fn check(expr: &Expr, env: &[(&'static str, Type)]) -> Result<Checked, CompileError> {
    let mut checker = Checker {
        env,
        scopes: Vec::new(),
        regexes: HashMap::new(),
    };
    let result = checker.check(expr)?;
    Ok(Checked {
        result,
        regexes: checker.regexes,
    })
}

struct Checker<'e> {
    env: &'e [(&'static str, Type)],
    /// Variables bound by comprehension macros, innermost last.
    scopes: Vec<(String, Type)>,
    regexes: HashMap<String, Regex>,
}

impl Checker<'_> {
    fn check(&mut self, expr: &Expr) -> Result<Type, CompileError> {
        let offset = expr.offset;
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(match lit {
                Literal::Bool(_) => Type::Bool,
                Literal::Int(_) => Type::Int,
                Literal::Double(_) => Type::Double,
                Literal::String(_) => Type::String,
                Literal::Null => Type::Null,
            }),

            ExprKind::Ident(name) => self.lookup(name).ok_or_else(|| {
                CompileError::UndeclaredReference {
                    name: name.clone(),
                    offset,
                }
            }),

            ExprKind::List(items) => {
                let mut elem: Option<Type> = None;
                for item in items {
                    let ty = self.check(item)?;
                    elem = Some(match elem {
                        None => ty,
                        Some(prev) => prev.join(&ty).unwrap_or(Type::Dyn),
                    });
                }
                Ok(Type::list_of(elem.unwrap_or(Type::Dyn)))
            }

            ExprKind::Unary { op, operand } => {
                let ty = self.check(operand)?;
                let out = match (op, &ty) {
                    (UnaryOp::Not, t) if t.assignable_to(&Type::Bool) => Some(Type::Bool),
                    (UnaryOp::Neg, Type::Int) => Some(Type::Int),
                    (UnaryOp::Neg, Type::Double) => Some(Type::Double),
                    (UnaryOp::Neg, Type::Dyn) => Some(Type::Dyn),
                    _ => None,
                };
                let name = match op {
                    UnaryOp::Not => "!_",
                    UnaryOp::Neg => "-_",
                };
                out.ok_or_else(|| no_overload(name, &[ty], offset))
            }

            ExprKind::And(lhs, rhs) | ExprKind::Or(lhs, rhs) => {
                let l = self.check(lhs)?;
                let r = self.check(rhs)?;
                if l.assignable_to(&Type::Bool) && r.assignable_to(&Type::Bool) {
                    Ok(Type::Bool)
                } else {
                    let name = if matches!(expr.kind, ExprKind::And(..)) {
                        "_&&_"
                    } else {
                        "_||_"
                    };
                    Err(no_overload(name, &[l, r], offset))
                }
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.check(lhs)?;
                let r = self.check(rhs)?;
                binary_type(*op, &l, &r).ok_or_else(|| no_overload(&operator_name(*op), &[l, r], offset))
            }

            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let c = self.check(cond)?;
                let t = self.check(then)?;
                let o = self.check(otherwise)?;
                match (c.assignable_to(&Type::Bool), t.join(&o)) {
                    (true, Some(ty)) => Ok(ty),
                    _ => Err(no_overload("_?_:_", &[c, t, o], offset)),
                }
            }

            ExprKind::Index { target, index } => {
                let t = self.check(target)?;
                let i = self.check(index)?;
                match (&t, i.assignable_to(&Type::Int)) {
                    (Type::List(elem), true) => Ok((**elem).clone()),
                    (Type::Dyn, true) => Ok(Type::Dyn),
                    _ => Err(no_overload("_[_]", &[t, i], offset)),
                }
            }

            ExprKind::Select { operand, field } => {
                let on = self.check(operand)?;
                Err(CompileError::UnsupportedSelection {
                    field: field.clone(),
                    on,
                    offset,
                })
            }

            ExprKind::Call {
                target,
                function,
                args,
            } => {
                let mut types = Vec::with_capacity(args.len() + 1);
                if let Some(target) = target {
                    types.push(self.check(target)?);
                }
                for arg in args {
                    types.push(self.check(arg)?);
                }
                let ty = call_type(function, target.is_some(), &types)
                    .ok_or_else(|| no_overload(function, &types, offset))?;

                if function == "matches" {
                    // The pattern is the last argument in both call styles.
                    if let Some(ExprKind::Literal(Literal::String(pattern))) =
                        args.last().map(|a| &a.kind)
                    {
                        self.precompile(pattern, offset)?;
                    }
                }
                Ok(ty)
            }

            ExprKind::Comprehension {
                kind,
                range,
                var,
                body,
            } => {
                let range_ty = self.check(range)?;
                let elem = range_ty
                    .element()
                    .ok_or_else(|| no_overload(kind.name(), &[range_ty.clone()], offset))?;

                self.scopes.push((var.clone(), elem.clone()));
                let body_ty = self.check(body);
                self.scopes.pop();
                let body_ty = body_ty?;

                match kind {
                    MacroKind::Map => Ok(Type::list_of(body_ty)),
                    _ if !body_ty.assignable_to(&Type::Bool) => {
                        Err(no_overload(kind.name(), &[range_ty, body_ty], offset))
                    }
                    MacroKind::Filter => Ok(Type::list_of(elem)),
                    MacroKind::All | MacroKind::Exists | MacroKind::ExistsOne => Ok(Type::Bool),
                }
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.clone())
            .or_else(|| {
                self.env
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, t)| t.clone())
            })
    }

    fn precompile(&mut self, pattern: &str, offset: usize) -> Result<(), CompileError> {
        if self.regexes.contains_key(pattern) {
            return Ok(());
        }
        let re = Regex::new(pattern).map_err(|e| CompileError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
            offset,
        })?;
        self.regexes.insert(pattern.to_string(), re);
        Ok(())
    }
}

/// Result type of a function call. `types` holds the receiver first for
/// method-style calls.
fn call_type(function: &str, is_method: bool, types: &[Type]) -> Option<Type> {
    let fits = |params: &[Type]| {
        types.len() == params.len() && types.iter().zip(params).all(|(a, p)| a.assignable_to(p))
    };
    let fits_one_of = |candidates: &[Type]| {
        types.len() == 1 && candidates.iter().any(|c| types[0].assignable_to(c))
    };

    match (function, is_method) {
        ("contains" | "startsWith" | "endsWith", true) | ("matches", _)
            if fits(&[Type::String, Type::String]) =>
        {
            Some(Type::Bool)
        }
        ("lowerAscii" | "upperAscii" | "trim", true) if fits(&[Type::String]) => Some(Type::String),
        ("size", _) if fits_one_of(&[Type::String, Type::list_of(Type::Dyn)]) => Some(Type::Int),
        ("string", false) if fits_one_of(&[Type::String, Type::Int, Type::Double, Type::Bool]) => {
            Some(Type::String)
        }
        ("int", false) if fits_one_of(&[Type::Int, Type::Double, Type::String]) => Some(Type::Int),
        ("double", false) if fits_one_of(&[Type::Int, Type::Double, Type::String]) => {
            Some(Type::Double)
        }
        _ => None,
    }
}

fn binary_type(op: BinaryOp, l: &Type, r: &Type) -> Option<Type> {
    let either_dyn = l.is_dyn() || r.is_dyn();
    match op {
        BinaryOp::Eq | BinaryOp::Ne => {
            let comparable = l.join(r).is_some() || *l == Type::Null || *r == Type::Null;
            comparable.then_some(Type::Bool)
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => match l.join(r)? {
            Type::Int | Type::Double | Type::String | Type::Bool | Type::Dyn => Some(Type::Bool),
            _ => None,
        },
        BinaryOp::In => match r {
            Type::List(elem) if l.assignable_to(elem) => Some(Type::Bool),
            Type::Dyn => Some(Type::Bool),
            _ => None,
        },
        BinaryOp::Add => match (l, r) {
            (Type::Int, Type::Int) => Some(Type::Int),
            (Type::Double, Type::Double) => Some(Type::Double),
            (Type::String, Type::String) => Some(Type::String),
            (Type::List(a), Type::List(b)) => Some(Type::list_of(a.join(b).unwrap_or(Type::Dyn))),
            (Type::Null | Type::Bool, _) | (_, Type::Null | Type::Bool) => None,
            _ if either_dyn => Some(Type::Dyn),
            _ => None,
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => match (l, r) {
            (Type::Int, Type::Int) => Some(Type::Int),
            (Type::Double, Type::Double) => Some(Type::Double),
            (Type::Int | Type::Double | Type::Dyn, Type::Int | Type::Double | Type::Dyn)
                if either_dyn =>
            {
                Some(Type::Dyn)
            }
            _ => None,
        },
        BinaryOp::Rem => match (l, r) {
            (Type::Int, Type::Int) => Some(Type::Int),
            (Type::Int | Type::Dyn, Type::Int | Type::Dyn) if either_dyn => Some(Type::Dyn),
            _ => None,
        },
    }
}

pub(crate) fn operator_name(op: BinaryOp) -> String {
    match op {
        BinaryOp::In => "@in".to_string(),
        other => format!("_{}_", other.symbol()),
    }
}

fn no_overload(function: &str, types: &[Type], offset: usize) -> CompileError {
    CompileError::NoMatchingOverload {
        function: function.to_string(),
        args: describe_args(types),
        offset,
    }
}
