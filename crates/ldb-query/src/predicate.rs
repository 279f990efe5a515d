//! A small predicate language over JSON documents.
//!
//! ```text
//! expr    := or
//! or      := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | compare
//! compare := operand ( ("==" | "!=" | "<" | "<=" | ">" | ">=") operand )?
//! operand := "(" expr ")" | literal | path
//! path    := ( "@" | ident ) ( "." ident | "[" integer "]" )*
//! literal := number | "…" | '…' | true | false | null
//! ```
//!
//! A path that does not exist evaluates to `null`. A bare operand tests
//! truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false.
//! Ordering comparisons only hold between two numbers or two strings.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{QueryError, QueryResult};

/// A parsed predicate expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Literal(Value),
    Path(Vec<Segment>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Predicate {
    /// Parse an expression.
    pub fn parse(input: &str) -> QueryResult<Self> {
        let tokens = lex(input)?;
        let mut parser = Parser {
            input,
            tokens,
            pos: 0,
        };
        let expr = parser.expr()?;
        if let Some(tok) = parser.tokens.get(parser.pos) {
            return Err(parse_error(input, tok.offset, "unexpected trailing input"));
        }
        Ok(Self {
            source: input.to_string(),
            expr,
        })
    }

    /// The expression text as given.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether `doc` satisfies the predicate.
    pub fn matches(&self, doc: &Value) -> bool {
        truthy(&eval(&self.expr, doc))
    }

    /// Evaluate the expression against `doc`.
    pub fn evaluate(&self, doc: &Value) -> Value {
        eval(&self.expr, doc)
    }
}

impl FromStr for Predicate {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn eval(expr: &Expr, doc: &Value) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Path(segments) => lookup(doc, segments).cloned().unwrap_or(Value::Null),
        Expr::Not(inner) => Value::Bool(!truthy(&eval(inner, doc))),
        Expr::And(a, b) => Value::Bool(truthy(&eval(a, doc)) && truthy(&eval(b, doc))),
        Expr::Or(a, b) => Value::Bool(truthy(&eval(a, doc)) || truthy(&eval(b, doc))),
        Expr::Compare(a, op, b) => Value::Bool(compare(&eval(a, doc), *op, &eval(b, doc))),
    }
}

fn lookup<'v>(doc: &'v Value, segments: &[Segment]) -> Option<&'v Value> {
    segments.iter().try_fold(doc, |cur, seg| match seg {
        Segment::Key(k) => cur.as_object()?.get(k),
        Segment::Index(i) => cur.as_array()?.get(*i),
    })
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => order(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn compare(a: &Value, op: CmpOp, b: &Value) -> bool {
    match op {
        CmpOp::Eq => equal(a, b),
        CmpOp::Ne => !equal(a, b),
        CmpOp::Lt => order(a, b) == Some(Ordering::Less),
        CmpOp::Le => matches!(order(a, b), Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => order(a, b) == Some(Ordering::Greater),
        CmpOp::Ge => matches!(order(a, b), Some(Ordering::Greater | Ordering::Equal)),
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum TokenKind {
    Ident(String),
    Root,
    Literal(Value),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Op(CmpOp),
    Not,
    And,
    Or,
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn parse_error(input: &str, offset: usize, message: impl Into<String>) -> QueryError {
    QueryError::Parse {
        input: input.to_string(),
        offset,
        message: message.into(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn lex(input: &str) -> QueryResult<Vec<Token>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let peek = |i: usize| chars.get(i).map(|(_, c)| *c);

    while let Some(&(offset, c)) = chars.get(i) {
        let next = peek(i + 1);
        let two = |want: char| next == Some(want);
        let (kind, width) = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '.' => (TokenKind::Dot, 1),
            '[' => (TokenKind::LBracket, 1),
            ']' => (TokenKind::RBracket, 1),
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            '@' => (TokenKind::Root, 1),
            '=' if two('=') => (TokenKind::Op(CmpOp::Eq), 2),
            '!' if two('=') => (TokenKind::Op(CmpOp::Ne), 2),
            '!' => (TokenKind::Not, 1),
            '<' if two('=') => (TokenKind::Op(CmpOp::Le), 2),
            '<' => (TokenKind::Op(CmpOp::Lt), 1),
            '>' if two('=') => (TokenKind::Op(CmpOp::Ge), 2),
            '>' => (TokenKind::Op(CmpOp::Gt), 1),
            '&' if two('&') => (TokenKind::And, 2),
            '|' if two('|') => (TokenKind::Or, 2),
            '"' | '\'' => {
                let (s, width) = lex_string(input, &chars, i)?;
                (TokenKind::Literal(Value::String(s)), width)
            }
            c if c.is_ascii_digit() || (c == '-' && peek(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let mut j = i + 1;
                while let Some(d) = peek(j) {
                    let sign_after_exp = (d == '-' || d == '+')
                        && matches!(peek(j - 1), Some('e' | 'E'));
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || sign_after_exp {
                        j += 1;
                    } else {
                        break;
                    }
                }
                let end = chars.get(j).map(|(o, _)| *o).unwrap_or(input.len());
                let text = &input[offset..end];
                let value: Value = serde_json::from_str(text)
                    .map_err(|_| parse_error(input, offset, format!("invalid number {text:?}")))?;
                (TokenKind::Literal(value), j - i)
            }
            c if is_ident_start(c) => {
                let mut j = i + 1;
                while peek(j).is_some_and(is_ident_char) {
                    j += 1;
                }
                let end = chars.get(j).map(|(o, _)| *o).unwrap_or(input.len());
                let word = &input[offset..end];
                let kind = match word {
                    "true" => TokenKind::Literal(Value::Bool(true)),
                    "false" => TokenKind::Literal(Value::Bool(false)),
                    "null" => TokenKind::Literal(Value::Null),
                    _ => TokenKind::Ident(word.to_string()),
                };
                (kind, j - i)
            }
            other => {
                return Err(parse_error(
                    input,
                    offset,
                    format!("unexpected character {other:?}"),
                ))
            }
        };
        tokens.push(Token { kind, offset });
        i += width;
    }
    Ok(tokens)
}

/// Lex a quoted string starting at char index `start`. Returns the unescaped
/// content and the width in chars including quotes.
fn lex_string(input: &str, chars: &[(usize, char)], start: usize) -> QueryResult<(String, usize)> {
    let (offset, quote) = chars[start];
    let mut out = String::new();
    let mut j = start + 1;
    while let Some(&(_, c)) = chars.get(j) {
        match c {
            c if c == quote => return Ok((out, j - start + 1)),
            '\\' => {
                let Some(&(_, esc)) = chars.get(j + 1) else {
                    break;
                };
                out.push(match esc {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                j += 2;
            }
            c => {
                out.push(c);
                j += 1;
            }
        }
    }
    Err(parse_error(input, offset, "unterminated string"))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.offset)
            .unwrap_or(self.input.len())
    }

    fn bump(&mut self) -> Option<TokenKind> {
        let tok = self.tokens.get(self.pos).map(|t| t.kind.clone());
        self.pos += 1;
        tok
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        parse_error(self.input, self.offset(), message)
    }

    fn expr(&mut self) -> QueryResult<Expr> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&TokenKind::Or) {
            self.bump();
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> QueryResult<Expr> {
        let mut lhs = self.unary()?;
        while self.peek() == Some(&TokenKind::And) {
            self.bump();
            let rhs = self.unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> QueryResult<Expr> {
        if self.peek() == Some(&TokenKind::Not) {
            self.bump();
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> QueryResult<Expr> {
        let lhs = self.operand()?;
        if let Some(TokenKind::Op(op)) = self.peek() {
            let op = *op;
            self.bump();
            let rhs = self.operand()?;
            return Ok(Expr::Compare(Box::new(lhs), op, Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn operand(&mut self) -> QueryResult<Expr> {
        match self.bump() {
            Some(TokenKind::LParen) => {
                let inner = self.expr()?;
                if self.bump() != Some(TokenKind::RParen) {
                    self.pos -= 1;
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            Some(TokenKind::Literal(v)) => Ok(Expr::Literal(v)),
            Some(TokenKind::Ident(name)) => self.path(vec![Segment::Key(name)]),
            Some(TokenKind::Root) => self.path(Vec::new()),
            Some(_) => {
                self.pos -= 1;
                Err(self.error("expected a value or path"))
            }
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn path(&mut self, mut segments: Vec<Segment>) -> QueryResult<Expr> {
        loop {
            match self.peek() {
                Some(TokenKind::Dot) => {
                    self.bump();
                    match self.bump() {
                        Some(TokenKind::Ident(key)) => segments.push(Segment::Key(key)),
                        _ => {
                            self.pos -= 1;
                            return Err(self.error("expected a key after '.'"));
                        }
                    }
                }
                Some(TokenKind::LBracket) => {
                    self.bump();
                    let index = match self.bump() {
                        Some(TokenKind::Literal(Value::Number(n))) => n.as_u64(),
                        _ => None,
                    };
                    let Some(index) = index else {
                        self.pos -= 1;
                        return Err(self.error("expected a non-negative integer index"));
                    };
                    if self.bump() != Some(TokenKind::RBracket) {
                        self.pos -= 1;
                        return Err(self.error("expected ']'"));
                    }
                    segments.push(Segment::Index(index as usize));
                }
                _ => return Ok(Expr::Path(segments)),
            }
        }
    }
}
