// src/rule/eval.rs
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

use regex::Regex;

use super::checker::operator_name;
use super::error::EvalError;
use super::parser::{BinaryOp, Expr, ExprKind, Literal, MacroKind, UnaryOp};
use super::ItemFields;

/// Runtime value of the rule language.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null_type",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }
}

pub(crate) struct Interpreter<'p> {
    regexes: &'p HashMap<String, Regex>,
    fields: &'p ItemFields<'p>,
    locals: Vec<(&'p str, Value)>,
}

impl<'p> Interpreter<'p> {
    pub(crate) fn new(regexes: &'p HashMap<String, Regex>, fields: &'p ItemFields<'p>) -> Self {
        Self {
            regexes,
            fields,
            locals: Vec::new(),
        }
    }

    pub(crate) fn eval(&mut self, expr: &'p Expr) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(match lit {
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Double(d) => Value::Double(*d),
                Literal::String(s) => Value::String(s.clone()),
                Literal::Null => Value::Null,
            }),

            ExprKind::Ident(name) => self.resolve(name),

            ExprKind::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),

            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or(EvalError::Overflow { op: "-" }),
                    (UnaryOp::Neg, Value::Double(d)) => Ok(Value::Double(-d)),
                    (op, other) => Err(overload(
                        match op {
                            UnaryOp::Not => "!_",
                            UnaryOp::Neg => "-_",
                        },
                        &[&other],
                    )),
                }
            }

            // Both logical operators absorb an error from one side when the
            // other side alone decides the result.
            ExprKind::And(lhs, rhs) => {
                let l = self.eval_bool(lhs, "_&&_");
                if let Ok(false) = l {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval_bool(rhs, "_&&_");
                match (l, r) {
                    (_, Ok(false)) => Ok(Value::Bool(false)),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                    _ => Ok(Value::Bool(true)),
                }
            }
            ExprKind::Or(lhs, rhs) => {
                let l = self.eval_bool(lhs, "_||_");
                if let Ok(true) = l {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval_bool(rhs, "_||_");
                match (l, r) {
                    (_, Ok(true)) => Ok(Value::Bool(true)),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                    _ => Ok(Value::Bool(false)),
                }
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                apply_binary(*op, l, r)
            }

            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval_bool(cond, "_?_:_")? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }

            ExprKind::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                match (&target, &index) {
                    (Value::List(items), Value::Int(i)) => usize::try_from(*i)
                        .ok()
                        .and_then(|at| items.get(at))
                        .cloned()
                        .ok_or(EvalError::IndexOutOfRange {
                            index: *i,
                            len: items.len(),
                        }),
                    _ => Err(overload("_[_]", &[&target, &index])),
                }
            }

            ExprKind::Select { operand, field } => {
                let value = self.eval(operand)?;
                Err(overload(&format!(".{field}"), &[&value]))
            }

            ExprKind::Call {
                target,
                function,
                args,
            } => {
                let mut values = Vec::with_capacity(args.len() + 1);
                if let Some(target) = target {
                    values.push(self.eval(target)?);
                }
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.call(function, &values)
            }

            ExprKind::Comprehension {
                kind,
                range,
                var,
                body,
            } => {
                let items = match self.eval(range)? {
                    Value::List(items) => items,
                    other => return Err(overload(kind.name(), &[&other])),
                };
                self.comprehension(*kind, items, var, body)
            }
        }
    }

    fn eval_bool(&mut self, expr: &'p Expr, function: &str) -> Result<bool, EvalError> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(overload(function, &[&other])),
        }
    }

    fn resolve(&self, name: &str) -> Result<Value, EvalError> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(n, _)| *n == name) {
            return Ok(value.clone());
        }
        let fields = self.fields;
        Ok(match name {
            "title" => Value::String(fields.title.to_string()),
            "description" => Value::String(fields.description.to_string()),
            "link" => Value::String(fields.link.to_string()),
            "categories" => Value::List(
                fields
                    .categories
                    .iter()
                    .map(|c| Value::String(c.clone()))
                    .collect(),
            ),
            // Unreachable for checked programs.
            _ => {
                return Err(EvalError::NoMatchingOverload {
                    function: name.to_string(),
                    args: String::new(),
                })
            }
        })
    }

    fn comprehension(
        &mut self,
        kind: MacroKind,
        items: Vec<Value>,
        var: &'p str,
        body: &'p Expr,
    ) -> Result<Value, EvalError> {
        let name = kind.name();
        let mut deferred: Option<EvalError> = None;
        let mut matched = 0usize;
        let mut out = Vec::new();

        for item in items {
            self.locals.push((var, item));
            let step = match kind {
                MacroKind::Map => self.eval(body).map(|v| {
                    out.push(v);
                    true
                }),
                _ => self.eval_bool(body, name),
            };
            let (_, item) = self.locals.pop().unwrap_or((var, Value::Null));

            match (kind, step) {
                (MacroKind::All, Ok(false)) => return Ok(Value::Bool(false)),
                (MacroKind::Exists, Ok(true)) => return Ok(Value::Bool(true)),
                (MacroKind::All | MacroKind::Exists, Err(e)) => {
                    deferred.get_or_insert(e);
                }
                (_, Err(e)) => return Err(e),
                (MacroKind::ExistsOne, Ok(true)) => matched += 1,
                (MacroKind::Filter, Ok(true)) => out.push(item),
                _ => {}
            }
        }

        if let Some(e) = deferred {
            return Err(e);
        }
        Ok(match kind {
            MacroKind::All => Value::Bool(true),
            MacroKind::Exists => Value::Bool(false),
            MacroKind::ExistsOne => Value::Bool(matched == 1),
            MacroKind::Filter | MacroKind::Map => Value::List(out),
        })
    }

    fn call(&self, function: &str, args: &[Value]) -> Result<Value, EvalError> {
        let value = match (function, args) {
            ("contains", [Value::String(s), Value::String(sub)]) => {
                Value::Bool(s.contains(sub.as_str()))
            }
            ("startsWith", [Value::String(s), Value::String(prefix)]) => {
                Value::Bool(s.starts_with(prefix.as_str()))
            }
            ("endsWith", [Value::String(s), Value::String(suffix)]) => {
                Value::Bool(s.ends_with(suffix.as_str()))
            }
            ("matches", [Value::String(s), Value::String(pattern)]) => {
                Value::Bool(self.regex(pattern)?.is_match(s))
            }
            ("lowerAscii", [Value::String(s)]) => Value::String(s.to_ascii_lowercase()),
            ("upperAscii", [Value::String(s)]) => Value::String(s.to_ascii_uppercase()),
            ("trim", [Value::String(s)]) => Value::String(s.trim().to_string()),
            ("size", [Value::String(s)]) => Value::Int(saturating_len(s.chars().count())),
            ("size", [Value::List(items)]) => Value::Int(saturating_len(items.len())),
            ("string", [v]) => Value::String(to_string(v)?),
            ("int", [v]) => Value::Int(to_int(v)?),
            ("double", [v]) => Value::Double(to_double(v)?),
            _ => {
                let refs: Vec<&Value> = args.iter().collect();
                return Err(overload(function, &refs));
            }
        };
        Ok(value)
    }

    fn regex(&self, pattern: &str) -> Result<Cow<'p, Regex>, EvalError> {
        if let Some(re) = self.regexes.get(pattern) {
            return Ok(Cow::Borrowed(re));
        }
        Regex::new(pattern)
            .map(Cow::Owned)
            .map_err(|e| EvalError::InvalidRegex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }
}

fn apply_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    let mismatch = |l: &Value, r: &Value| overload(&operator_name(op), &[l, r]);
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(&lhs, &rhs).ok_or_else(|| mismatch(&lhs, &rhs))?;
            // Unordered doubles (NaN) make every comparison false.
            let holds = ord.is_some_and(|ord| match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            });
            Ok(Value::Bool(holds))
        }
        BinaryOp::In => match &rhs {
            Value::List(items) => Ok(Value::Bool(items.iter().any(|i| values_equal(&lhs, i)))),
            _ => Err(mismatch(&lhs, &rhs)),
        },
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => int_op(a.checked_add(b), "+"),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (l, r) => Err(mismatch(&l, &r)),
        },
        BinaryOp::Sub => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => int_op(a.checked_sub(b), "-"),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a - b)),
            (l, r) => Err(mismatch(&l, &r)),
        },
        BinaryOp::Mul => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => int_op(a.checked_mul(b), "*"),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a * b)),
            (l, r) => Err(mismatch(&l, &r)),
        },
        BinaryOp::Div => match (lhs, rhs) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero),
            (Value::Int(a), Value::Int(b)) => int_op(a.checked_div(b), "/"),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a / b)),
            (l, r) => Err(mismatch(&l, &r)),
        },
        BinaryOp::Rem => match (lhs, rhs) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::ModulusByZero),
            (Value::Int(a), Value::Int(b)) => int_op(a.checked_rem(b), "%"),
            (l, r) => Err(mismatch(&l, &r)),
        },
    }
}

fn int_op(result: Option<i64>, op: &'static str) -> Result<Value, EvalError> {
    result.map(Value::Int).ok_or(EvalError::Overflow { op })
}

/// `None` when the operands cannot be ordered at all; `Some(None)` for NaN.
fn compare(lhs: &Value, rhs: &Value) -> Option<Option<Ordering>> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(Some(a.cmp(b))),
        (Value::Double(a), Value::Double(b)) => Some(a.partial_cmp(b)),
        (Value::Int(a), Value::Double(b)) => Some((*a as f64).partial_cmp(b)),
        (Value::Double(a), Value::Int(b)) => Some(a.partial_cmp(&(*b as f64))),
        (Value::String(a), Value::String(b)) => Some(Some(a.cmp(b))),
        (Value::Bool(a), Value::Bool(b)) => Some(Some(a.cmp(b))),
        _ => None,
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(a), Value::Double(b)) | (Value::Double(b), Value::Int(a)) => *a as f64 == *b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (a, b) => a == b,
    }
}

fn to_string(value: &Value) -> Result<String, EvalError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Double(d) => Ok(d.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(overload("string", &[other])),
    }
}

fn to_int(value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Double(d) if d.is_finite() && *d >= i64::MIN as f64 && *d < i64::MAX as f64 => {
            Ok(d.trunc() as i64)
        }
        Value::Double(d) => Err(EvalError::InvalidConversion(format!(
            "double {d} is out of int range"
        ))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| EvalError::InvalidConversion(format!("cannot parse {s:?} as int"))),
        other => Err(overload("int", &[other])),
    }
}

fn to_double(value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Double(d) => Ok(*d),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EvalError::InvalidConversion(format!("cannot parse {s:?} as double"))),
        other => Err(overload("double", &[other])),
    }
}

fn saturating_len(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn overload(function: &str, args: &[&Value]) -> EvalError {
    EvalError::NoMatchingOverload {
        function: function.to_string(),
        args: args
            .iter()
            .map(|v| v.type_name())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::parser::parse;

    fn run(src: &str, fields: &ItemFields<'_>) -> Result<Value, EvalError> {
        let expr = parse(src).unwrap();
        let regexes = HashMap::new();
        let mut interp = Interpreter::new(&regexes, fields);
        interp.eval(&expr)
    }

    fn empty() -> ItemFields<'static> {
        ItemFields::default()
    }

    #[test]
    fn and_absorbs_error_when_other_side_is_false() {
        assert_eq!(run("1 / 0 == 1 && false", &empty()), Ok(Value::Bool(false)));
        assert_eq!(run("true || 1 / 0 == 1", &empty()), Ok(Value::Bool(true)));
        assert_eq!(run("1 / 0 == 1 && true", &empty()), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn integer_arithmetic_is_checked() {
        assert_eq!(
            run("9223372036854775807 + 1 > 0", &empty()),
            Err(EvalError::Overflow { op: "+" })
        );
        assert_eq!(run("7 % 0 == 1", &empty()), Err(EvalError::ModulusByZero));
        assert_eq!(run("-7 / 2", &empty()), Ok(Value::Int(-3)));
    }

    #[test]
    fn index_out_of_range() {
        assert_eq!(
            run("[1, 2][2]", &empty()),
            Err(EvalError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn macros_bind_item_variable() {
        let cats = vec!["rust".to_string(), "go".to_string()];
        let fields = ItemFields {
            categories: &cats,
            ..ItemFields::default()
        };
        assert_eq!(
            run("categories.exists(c, c == 'go')", &fields),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            run("categories.all(c, size(c) == 4)", &fields),
            Ok(Value::Bool(false))
        );
        assert_eq!(
            run("categories.exists_one(c, c.endsWith('t'))", &fields),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            run("categories.map(c, c.upperAscii())", &fields),
            Ok(Value::List(vec![
                Value::String("RUST".into()),
                Value::String("GO".into())
            ]))
        );
        assert_eq!(
            run("size(categories.filter(c, c.startsWith('r')))", &fields),
            Ok(Value::Int(1))
        );
    }

    #[test]
    fn exists_defers_errors_until_no_match() {
        assert_eq!(
            run("[0, 1].exists(x, 1 / x == 1)", &empty()),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            run("[0, 2].exists(x, 1 / x == 1)", &empty()),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn dynamic_regex_is_compiled_at_runtime() {
        let fields = ItemFields {
            title: "(",
            ..ItemFields::default()
        };
        assert!(matches!(
            run("'x'.matches(title)", &fields),
            Err(EvalError::InvalidRegex { .. })
        ));
        assert_eq!(
            run("'release v2'.matches('v[0-9]')", &empty()),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(run("int('42')", &empty()), Ok(Value::Int(42)));
        assert_eq!(run("int(2.9)", &empty()), Ok(Value::Int(2)));
        assert_eq!(run("string(3)", &empty()), Ok(Value::String("3".into())));
        assert!(matches!(
            run("int('4x')", &empty()),
            Err(EvalError::InvalidConversion(_))
        ));
    }

    #[test]
    fn mixed_numeric_equality_and_ordering() {
        assert_eq!(run("[1, 2.0][0] == [1.0][0]", &empty()), Ok(Value::Bool(true)));
        assert_eq!(run("[1, 'a'][0] < [2.5][0]", &empty()), Ok(Value::Bool(true)));
    }
}
