// src/rule/lexer.rs
//! Tokenizer for the rule language.
//!
//! Offsets are byte offsets into the original expression so errors can point
//! at the offending spot.

use super::error::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Int(i64),
    Double(f64),
    Str(String),
    True,
    False,
    Null,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Question,
    Colon,
    Bang,
    Minus,
    Plus,
    Star,
    Slash,
    Percent,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Int(v) => format!("integer {v}"),
            Token::Double(v) => format!("double {v}"),
            Token::Str(s) => format!("string {s:?}"),
            Token::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::In => "in",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Bang => "!",
            Token::Minus => "-",
            Token::Plus => "+",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

const RESERVED: &[&str] = &[
    "as", "break", "const", "continue", "else", "for", "function", "if", "import", "let", "loop",
    "package", "namespace", "return", "var", "void", "while",
];

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, CompileError> {
    Lexer {
        src,
        bytes: src.as_bytes(),
        pos: 0,
    }
    .run()
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Spanned>, CompileError> {
        let mut out = Vec::new();
        loop {
            self.skip_trivia();
            let offset = self.pos;
            let Some(c) = self.peek() else {
                out.push(Spanned {
                    token: Token::Eof,
                    offset,
                });
                return Ok(out);
            };

            let token = match c {
                b'0'..=b'9' => self.number()?,
                b'"' | b'\'' => self.string(false)?,
                b'r' | b'R' if matches!(self.peek_at(1), Some(b'"' | b'\'')) => {
                    self.pos += 1;
                    self.string(true)?
                }
                b'.' if matches!(self.peek_at(1), Some(b'0'..=b'9')) => self.number()?,
                c if c == b'_' || c.is_ascii_alphabetic() => self.ident()?,
                _ => self.punct()?,
            };
            out.push(Spanned { token, offset });
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.pos + n).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else if c == b'/' && self.peek_at(1) == Some(b'/') {
                while let Some(c) = self.peek() {
                    if c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn punct(&mut self) -> Result<Token, CompileError> {
        let start = self.pos;
        let two = (self.peek(), self.peek_at(1));
        let (token, width) = match two {
            (Some(b'&'), Some(b'&')) => (Token::AndAnd, 2),
            (Some(b'|'), Some(b'|')) => (Token::OrOr, 2),
            (Some(b'='), Some(b'=')) => (Token::EqEq, 2),
            (Some(b'!'), Some(b'=')) => (Token::NotEq, 2),
            (Some(b'<'), Some(b'=')) => (Token::Le, 2),
            (Some(b'>'), Some(b'=')) => (Token::Ge, 2),
            (Some(b'('), _) => (Token::LParen, 1),
            (Some(b')'), _) => (Token::RParen, 1),
            (Some(b'['), _) => (Token::LBracket, 1),
            (Some(b']'), _) => (Token::RBracket, 1),
            (Some(b'.'), _) => (Token::Dot, 1),
            (Some(b','), _) => (Token::Comma, 1),
            (Some(b'?'), _) => (Token::Question, 1),
            (Some(b':'), _) => (Token::Colon, 1),
            (Some(b'!'), _) => (Token::Bang, 1),
            (Some(b'-'), _) => (Token::Minus, 1),
            (Some(b'+'), _) => (Token::Plus, 1),
            (Some(b'*'), _) => (Token::Star, 1),
            (Some(b'/'), _) => (Token::Slash, 1),
            (Some(b'%'), _) => (Token::Percent, 1),
            (Some(b'<'), _) => (Token::Lt, 1),
            (Some(b'>'), _) => (Token::Gt, 1),
            (Some(b'='), _) => {
                return Err(CompileError::syntax(start, "unexpected '=', did you mean '=='?"))
            }
            _ => {
                let ch = self.src[start..].chars().next().unwrap_or('?');
                return Err(CompileError::syntax(start, format!("unexpected character {ch:?}")));
            }
        };
        self.pos += width;
        Ok(token)
    }

    fn ident(&mut self) -> Result<Token, CompileError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'_' || c.is_ascii_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }
        let word = &self.src[start..self.pos];
        Ok(match word {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "in" => Token::In,
            w if RESERVED.contains(&w) => {
                return Err(CompileError::syntax(start, format!("reserved identifier '{w}'")))
            }
            w => Token::Ident(w.to_string()),
        })
    }

    fn number(&mut self) -> Result<Token, CompileError> {
        let start = self.pos;

        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = &self.src[digits_start..self.pos];
            return i64::from_str_radix(digits, 16)
                .map(Token::Int)
                .map_err(|_| CompileError::syntax(start, "invalid hexadecimal literal"));
        }

        let mut is_double = false;
        self.eat_digits();
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            is_double = true;
            self.pos += 1;
            self.eat_digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
            if matches!(self.peek_at(1 + sign), Some(b'0'..=b'9')) {
                is_double = true;
                self.pos += 1 + sign;
                self.eat_digits();
            }
        }

        let text = &self.src[start..self.pos];
        if is_double {
            text.parse::<f64>()
                .map(Token::Double)
                .map_err(|_| CompileError::syntax(start, format!("invalid double literal '{text}'")))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| CompileError::syntax(start, format!("integer literal '{text}' out of range")))
        }
    }

    fn eat_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }

    fn string(&mut self, raw: bool) -> Result<Token, CompileError> {
        let start = self.pos;
        let quote = self.bytes[self.pos] as char;
        self.pos += 1;

        let mut out = String::new();
        let mut chars = self.src[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                c if c == quote => {
                    self.pos += i + c.len_utf8();
                    return Ok(Token::Str(out));
                }
                '\n' | '\r' => break,
                '\\' if !raw => {
                    let Some((j, esc)) = chars.next() else { break };
                    let at = self.pos + j;
                    match esc {
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'a' => out.push('\u{07}'),
                        'b' => out.push('\u{08}'),
                        'f' => out.push('\u{0C}'),
                        'v' => out.push('\u{0B}'),
                        '\\' | '"' | '\'' | '`' | '?' => out.push(esc),
                        'x' | 'X' => out.push(hex_escape(&mut chars, 2, at)?),
                        'u' => out.push(hex_escape(&mut chars, 4, at)?),
                        'U' => out.push(hex_escape(&mut chars, 8, at)?),
                        '0'..='3' => {
                            let mut value = esc.to_digit(8).unwrap_or(0);
                            for _ in 0..2 {
                                match chars.next() {
                                    Some((_, d)) if d.is_digit(8) => {
                                        value = value * 8 + d.to_digit(8).unwrap_or(0);
                                    }
                                    _ => return Err(CompileError::syntax(at, "invalid octal escape")),
                                }
                            }
                            out.push(char::from_u32(value).ok_or_else(|| {
                                CompileError::syntax(at, "invalid octal escape")
                            })?);
                        }
                        other => {
                            return Err(CompileError::syntax(
                                at,
                                format!("invalid escape sequence '\\{other}'"),
                            ))
                        }
                    }
                }
                c => out.push(c),
            }
        }
        Err(CompileError::syntax(start, "unterminated string literal"))
    }
}

fn hex_escape(
    chars: &mut std::str::CharIndices<'_>,
    width: usize,
    at: usize,
) -> Result<char, CompileError> {
    let mut value = 0u32;
    for _ in 0..width {
        let digit = chars
            .next()
            .and_then(|(_, c)| c.to_digit(16))
            .ok_or_else(|| CompileError::syntax(at, "invalid hex escape"))?;
        value = value * 16 + digit;
    }
    char::from_u32(value).ok_or_else(|| CompileError::syntax(at, "escape is not a valid code point"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn method_call_tokens() {
        assert_eq!(
            tokens(r#"description.contains("breaking")"#),
            vec![
                Token::Ident("description".into()),
                Token::Dot,
                Token::Ident("contains".into()),
                Token::LParen,
                Token::Str("breaking".into()),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_operators() {
        assert_eq!(
            tokens("size(x) >= 0x10 && 1.5e2 != 3"),
            vec![
                Token::Ident("size".into()),
                Token::LParen,
                Token::Ident("x".into()),
                Token::RParen,
                Token::Ge,
                Token::Int(16),
                Token::AndAnd,
                Token::Double(150.0),
                Token::NotEq,
                Token::Int(3),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn escapes_and_raw_strings() {
        assert_eq!(
            tokens(r#"'a\tbé' r'\d+'"#),
            vec![
                Token::Str("a\tb\u{e9}".into()),
                Token::Str(r"\d+".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            tokens("true // keep everything\n || false"),
            vec![Token::True, Token::OrOr, Token::False, Token::Eof]
        );
    }

    #[test]
    fn errors_carry_offsets() {
        let err = tokenize("title = 'x'").unwrap_err();
        assert!(matches!(err, CompileError::Syntax { offset: 6, .. }), "{err}");

        let err = tokenize("'open").unwrap_err();
        assert!(matches!(err, CompileError::Syntax { offset: 0, .. }), "{err}");

        let err = tokenize("while").unwrap_err();
        assert!(err.to_string().contains("reserved"), "{err}");
    }
}
