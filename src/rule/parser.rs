// src/rule/parser.rs
//! Recursive-descent parser producing the rule AST.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! expr     = or ["?" or ":" expr]
//! or       = and {"||" and}
//! and      = rel {"&&" rel}
//! rel      = add {("=="|"!="|"<"|"<="|">"|">="|"in") add}
//! add      = mul {("+"|"-") mul}
//! mul      = unary {("*"|"/"|"%") unary}
//! unary    = member | "!" unary | "-" unary
//! member   = primary {"." IDENT ["(" args ")"] | "[" expr "]"}
//! primary  = IDENT ["(" args ")"] | "(" expr ")" | "[" [args [","]] "]" | literal
//! ```
//!
//! Macro calls (`list.exists(x, pred)` and friends) are recognised here and
//! turned into [`ExprKind::Comprehension`] so the checker and interpreter
//! never see them as ordinary calls.

use super::error::CompileError;
use super::lexer::{tokenize, Spanned, Token};

/// Deepest allowed nesting of sub-expressions.
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expr {
    pub offset: usize,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExprKind {
    Literal(Literal),
    Ident(String),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Select {
        operand: Box<Expr>,
        field: String,
    },
    Call {
        target: Option<Box<Expr>>,
        function: String,
        args: Vec<Expr>,
    },
    Comprehension {
        kind: MacroKind,
        range: Box<Expr>,
        var: String,
        body: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MacroKind {
    All,
    Exists,
    ExistsOne,
    Filter,
    Map,
}

impl MacroKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "all" => Some(MacroKind::All),
            "exists" => Some(MacroKind::Exists),
            "exists_one" => Some(MacroKind::ExistsOne),
            "filter" => Some(MacroKind::Filter),
            "map" => Some(MacroKind::Map),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            MacroKind::All => "all",
            MacroKind::Exists => "exists",
            MacroKind::ExistsOne => "exists_one",
            MacroKind::Filter => "filter",
            MacroKind::Map => "map",
        }
    }
}

pub(crate) fn parse(src: &str) -> Result<Expr, CompileError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    let next = parser.peek();
    if next.token != Token::Eof {
        return Err(CompileError::syntax(
            next.offset,
            format!("unexpected {} after expression", next.token.describe()),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Spanned {
        // The token stream always ends with Eof and `bump` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Spanned {
        let tok = self.peek().clone();
        if tok.token != Token::Eof {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if &self.peek().token == token {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<Spanned, CompileError> {
        let next = self.peek().clone();
        if next.token == token {
            Ok(self.bump())
        } else {
            Err(CompileError::syntax(
                next.offset,
                format!("expected {what}, found {}", next.token.describe()),
            ))
        }
    }

    fn enter(&mut self) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(CompileError::TooDeep { limit: MAX_NESTING });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expr(&mut self) -> Result<Expr, CompileError> {
        self.enter()?;
        let cond = self.or()?;
        let out = if self.peek().token == Token::Question {
            let offset = self.bump().offset;
            let then = self.or()?;
            self.expect(Token::Colon, "':' in conditional")?;
            let otherwise = self.expr()?;
            Expr {
                offset,
                kind: ExprKind::Conditional {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
            }
        } else {
            cond
        };
        self.leave();
        Ok(out)
    }

    // Each operator in a left-associative chain adds one level to the tree,
    // so chains count against MAX_NESTING the same way parentheses do.

    fn or(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.and()?;
        let mut levels = 0;
        while self.peek().token == Token::OrOr {
            self.enter()?;
            levels += 1;
            let offset = self.bump().offset;
            let rhs = self.and()?;
            lhs = Expr {
                offset,
                kind: ExprKind::Or(Box::new(lhs), Box::new(rhs)),
            };
        }
        self.depth -= levels;
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.relation()?;
        let mut levels = 0;
        while self.peek().token == Token::AndAnd {
            self.enter()?;
            levels += 1;
            let offset = self.bump().offset;
            let rhs = self.relation()?;
            lhs = Expr {
                offset,
                kind: ExprKind::And(Box::new(lhs), Box::new(rhs)),
            };
        }
        self.depth -= levels;
        Ok(lhs)
    }

    fn relation(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.addition()?;
        let mut levels = 0;
        loop {
            let op = match self.peek().token {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::Ne,
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                Token::In => BinaryOp::In,
                _ => break,
            };
            self.enter()?;
            levels += 1;
            let offset = self.bump().offset;
            let rhs = self.addition()?;
            lhs = binary(op, lhs, rhs, offset);
        }
        self.depth -= levels;
        Ok(lhs)
    }

    fn addition(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.multiplication()?;
        let mut levels = 0;
        loop {
            let op = match self.peek().token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.enter()?;
            levels += 1;
            let offset = self.bump().offset;
            let rhs = self.multiplication()?;
            lhs = binary(op, lhs, rhs, offset);
        }
        self.depth -= levels;
        Ok(lhs)
    }

    fn multiplication(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.unary()?;
        let mut levels = 0;
        loop {
            let op = match self.peek().token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.enter()?;
            levels += 1;
            let offset = self.bump().offset;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs, offset);
        }
        self.depth -= levels;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek().token {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            _ => return self.member(),
        };
        self.enter()?;
        let offset = self.bump().offset;
        let operand = self.unary()?;
        self.leave();

        // Negative numeric literals stay literals.
        let kind = match (op, operand.kind) {
            (UnaryOp::Neg, ExprKind::Literal(Literal::Int(v))) => {
                ExprKind::Literal(Literal::Int(-v))
            }
            (UnaryOp::Neg, ExprKind::Literal(Literal::Double(v))) => {
                ExprKind::Literal(Literal::Double(-v))
            }
            (op, kind) => ExprKind::Unary {
                op,
                operand: Box::new(Expr {
                    offset: operand.offset,
                    kind,
                }),
            },
        };
        Ok(Expr { offset, kind })
    }

    fn member(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.primary()?;
        let mut levels = 0;
        loop {
            match self.peek().token {
                Token::Dot => {
                    self.enter()?;
                    levels += 1;
                    self.bump();
                    let name_tok = self.bump();
                    let Token::Ident(name) = name_tok.token else {
                        return Err(CompileError::syntax(
                            name_tok.offset,
                            format!("expected member name, found {}", name_tok.token.describe()),
                        ));
                    };
                    if self.eat(&Token::LParen) {
                        let args = self.args(Token::RParen)?;
                        expr = make_call(Some(expr), name, args, name_tok.offset)?;
                    } else {
                        expr = Expr {
                            offset: name_tok.offset,
                            kind: ExprKind::Select {
                                operand: Box::new(expr),
                                field: name,
                            },
                        };
                    }
                }
                Token::LBracket => {
                    self.enter()?;
                    levels += 1;
                    let offset = self.bump().offset;
                    let index = self.expr()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr {
                        offset,
                        kind: ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                _ => break,
            }
        }
        self.depth -= levels;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let tok = self.bump();
        let offset = tok.offset;
        let kind = match tok.token {
            Token::True => ExprKind::Literal(Literal::Bool(true)),
            Token::False => ExprKind::Literal(Literal::Bool(false)),
            Token::Null => ExprKind::Literal(Literal::Null),
            Token::Int(v) => ExprKind::Literal(Literal::Int(v)),
            Token::Double(v) => ExprKind::Literal(Literal::Double(v)),
            Token::Str(s) => ExprKind::Literal(Literal::String(s)),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let args = self.args(Token::RParen)?;
                    return make_call(None, name, args, offset);
                }
                ExprKind::Ident(name)
            }
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                return Ok(inner);
            }
            Token::LBracket => {
                self.enter()?;
                let items = self.args(Token::RBracket)?;
                self.leave();
                ExprKind::List(items)
            }
            other => {
                return Err(CompileError::syntax(
                    offset,
                    format!("unexpected {}", other.describe()),
                ))
            }
        };
        Ok(Expr { offset, kind })
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn args(&mut self, close: Token) -> Result<Vec<Expr>, CompileError> {
        let mut out = Vec::new();
        if self.eat(&close) {
            return Ok(out);
        }
        loop {
            out.push(self.expr()?);
            if self.eat(&Token::Comma) {
                if self.eat(&close) {
                    return Ok(out);
                }
                continue;
            }
            let what = if close == Token::RParen { "')'" } else { "']'" };
            self.expect(close, what)?;
            return Ok(out);
        }
    }
}

/// Builds a call node, turning `range.macro(var, body)` into a comprehension.
fn make_call(
    target: Option<Expr>,
    function: String,
    args: Vec<Expr>,
    offset: usize,
) -> Result<Expr, CompileError> {
    let (range, kind) = match (target, MacroKind::from_name(&function)) {
        (Some(range), Some(kind)) => (range, kind),
        (target, _) => {
            return Ok(Expr {
                offset,
                kind: ExprKind::Call {
                    target: target.map(Box::new),
                    function,
                    args,
                },
            })
        }
    };

    let [var, body]: [Expr; 2] = args.try_into().map_err(|_| {
        CompileError::syntax(
            offset,
            format!("macro '{}' takes exactly 2 arguments", kind.name()),
        )
    })?;
    let ExprKind::Ident(var) = var.kind else {
        return Err(CompileError::syntax(
            offset,
            format!("macro '{}' needs an identifier as its first argument", kind.name()),
        ));
    };
    Ok(Expr {
        offset,
        kind: ExprKind::Comprehension {
            kind,
            range: Box::new(range),
            var,
            body: Box::new(body),
        },
    })
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, offset: usize) -> Expr {
    Expr {
        offset,
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(src: &str) -> ExprKind {
        parse(src).unwrap().kind
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let ExprKind::Or(lhs, rhs) = kind("a || b && c") else {
            panic!("expected ||");
        };
        assert_eq!(lhs.kind, ExprKind::Ident("a".into()));
        assert!(matches!(rhs.kind, ExprKind::And(..)));
    }

    #[test]
    fn method_call_keeps_receiver() {
        let ExprKind::Call {
            target,
            function,
            args,
        } = kind("title.startsWith('x')")
        else {
            panic!("expected call");
        };
        assert_eq!(function, "startsWith");
        assert_eq!(target.unwrap().kind, ExprKind::Ident("title".into()));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn macros_become_comprehensions() {
        let ExprKind::Comprehension { kind: k, var, .. } =
            kind("categories.exists(c, c == 'rust')")
        else {
            panic!("expected comprehension");
        };
        assert_eq!(k, MacroKind::Exists);
        assert_eq!(var, "c");
    }

    #[test]
    fn macro_needs_identifier() {
        let err = parse("categories.all('c', true)").unwrap_err();
        assert!(err.to_string().contains("identifier"), "{err}");
    }

    #[test]
    fn negative_literals_fold() {
        assert_eq!(kind("-5"), ExprKind::Literal(Literal::Int(-5)));
        assert!(matches!(kind("-size(title)"), ExprKind::Unary { .. }));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = parse("true false").unwrap_err();
        assert!(matches!(err, CompileError::Syntax { offset: 5, .. }), "{err}");
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}true{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(
            parse(&deep).unwrap_err(),
            CompileError::TooDeep { limit: MAX_NESTING }
        );
        let bangs = format!("{}true", "!".repeat(200));
        assert_eq!(
            parse(&bangs).unwrap_err(),
            CompileError::TooDeep { limit: MAX_NESTING }
        );
    }

    #[test]
    fn chains_count_toward_nesting() {
        let ors = format!("{}true", "false || ".repeat(MAX_NESTING + 1));
        assert_eq!(
            parse(&ors).unwrap_err(),
            CompileError::TooDeep { limit: MAX_NESTING }
        );
        let sums = format!("1{}", " + 1".repeat(MAX_NESTING + 1));
        assert_eq!(
            parse(&sums).unwrap_err(),
            CompileError::TooDeep { limit: MAX_NESTING }
        );
        let indexes = format!("categories{}", "[0]".repeat(MAX_NESTING + 1));
        assert_eq!(
            parse(&indexes).unwrap_err(),
            CompileError::TooDeep { limit: MAX_NESTING }
        );

        // Sibling chains don't accumulate depth.
        let siblings = vec!["(a || b || c)"; 40].join(" && ");
        assert!(parse(&siblings).is_ok());
    }

    #[test]
    fn list_literals_allow_trailing_comma() {
        let ExprKind::List(items) = kind("['a', 'b',]") else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);
    }
}
