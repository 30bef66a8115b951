//! Arithmetic formulas over stat readings.
//!
//! Expression-based composite modifiers compute their amount from a
//! [`Formula`], parsed once at construction.
//!
//! ## Grammar
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := number | reading | call | '(' expr ')'
//! reading := ident ('.' ('value' | 'max' | 'min' | 'base'))?
//! call    := ('min' | 'max' | 'abs') '(' expr (',' expr)* ')'
//! ```
//!
//! Stat names may contain letters, digits and `_`. Division by zero and
//! missing stats evaluate to `0.0` with a warning. Formulas longer than
//! [`MAX_TOKENS`] tokens or nested deeper than [`MAX_DEPTH`] levels are
//! malformed.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::BuffError;

use super::modifier::StatReading;

/// Deepest nesting of parentheses, negations and calls a formula may use.
pub const MAX_DEPTH: usize = 64;

/// Longest formula, in tokens.
pub const MAX_TOKENS: usize = 1024;

/// Binary arithmetic operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Built-in function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    Min,
    Max,
    Abs,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "abs" => Some(Self::Abs),
            _ => None,
        }
    }

    fn arity_ok(self, count: usize) -> bool {
        match self {
            Self::Min | Self::Max => count >= 1,
            Self::Abs => count == 1,
        }
    }
}

/// Parsed expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Number(f64),
    Reading { stat: String, reading: StatReading },
    Neg(Box<Expression>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Call { func: Function, args: Vec<Expression> },
}

impl Expression {
    /// Evaluate with a reading lookup. Missing readings count as `0.0`.
    pub fn eval(&self, lookup: &dyn Fn(&str, StatReading) -> Option<f64>) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Reading { stat, reading } => lookup(stat, *reading).unwrap_or_else(|| {
                warn!(stat = %stat, "formula references missing stat, using 0");
                0.0
            }),
            Self::Neg(inner) => -inner.eval(lookup),
            Self::Binary { op, lhs, rhs } => {
                let l = lhs.eval(lookup);
                let r = rhs.eval(lookup);
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => {
                        if r == 0.0 {
                            warn!("formula divides by zero, using 0");
                            0.0
                        } else {
                            l / r
                        }
                    }
                }
            }
            Self::Call { func, args } => {
                let values = args.iter().map(|a| a.eval(lookup));
                match func {
                    Function::Min => values.fold(f64::INFINITY, f64::min),
                    Function::Max => values.fold(f64::NEG_INFINITY, f64::max),
                    Function::Abs => values.map(f64::abs).next().unwrap_or(0.0),
                }
            }
        }
    }

    /// Distinct stat names referenced, in first-appearance order.
    #[must_use]
    pub fn references(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<String>) {
        match self {
            Self::Number(_) => {}
            Self::Reading { stat, .. } => {
                if !out.iter().any(|s| s == stat) {
                    out.push(stat.clone());
                }
            }
            Self::Neg(inner) => inner.collect_references(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_references(out);
                rhs.collect_references(out);
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
        }
    }
}

/// A formula: source text plus its parse result.
///
/// Serializes as its text; deserializing re-parses. A formula that fails to
/// parse stays invalid for its whole lifetime.
///
/// ```
/// use buff_engine::modifiers::Formula;
///
/// let formula = Formula::new("strength * 2 + agility.max / 4");
/// assert!(formula.is_valid());
/// assert_eq!(formula.references(), vec!["strength", "agility"]);
///
/// assert!(!Formula::new("strength *").is_valid());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Formula {
    text: String,
    compiled: Result<Expression, String>,
}

impl Formula {
    /// Parse a formula, keeping the failure if it is malformed.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let compiled = Parser::new(&text).parse();
        if let Err(reason) = &compiled {
            warn!(formula = %text, %reason, "malformed formula, modifier will stay invalid");
        }
        Self { text, compiled }
    }

    /// Parse a formula, failing loudly if it is malformed.
    pub fn parse(text: impl Into<String>) -> Result<Self, BuffError> {
        let text = text.into();
        match Parser::new(&text).parse() {
            Ok(expr) => Ok(Self {
                text,
                compiled: Ok(expr),
            }),
            Err(reason) => Err(BuffError::Formula {
                formula: text,
                reason,
            }),
        }
    }

    /// Source text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the formula parsed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.compiled.is_ok()
    }

    /// Parsed expression, if valid.
    #[must_use]
    pub fn expression(&self) -> Option<&Expression> {
        self.compiled.as_ref().ok()
    }

    /// Parse error, if invalid.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.compiled.as_ref().err().map(String::as_str)
    }

    /// Evaluate, or `None` if the formula is invalid.
    pub fn eval(&self, lookup: &dyn Fn(&str, StatReading) -> Option<f64>) -> Option<f64> {
        self.expression().map(|e| e.eval(lookup))
    }

    /// Distinct stat names referenced.
    #[must_use]
    pub fn references(&self) -> Vec<String> {
        self.expression().map(Expression::references).unwrap_or_default()
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl From<String> for Formula {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> Self {
        formula.text
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// === Parsing ===

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Dot,
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' if !chars.get(i + 1).is_some_and(char::is_ascii_digit) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{literal}'"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            tokens: Vec::new(),
            pos: 0,
            depth: 0,
        }
    }

    fn parse(mut self) -> Result<Expression, String> {
        if self.text.trim().is_empty() {
            return Err("empty formula".to_string());
        }
        self.tokens = tokenize(self.text)?;
        if self.tokens.len() > MAX_TOKENS {
            return Err(format!("formula longer than {MAX_TOKENS} tokens"));
        }
        let expr = self.expr()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(format!("unexpected trailing {token:?}")),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {expected:?}, found {token:?}")),
            None => Err(format!("expected {expected:?}, found end of input")),
        }
    }

    fn descend(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(format!("formula nested deeper than {MAX_DEPTH} levels"));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expression, String> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expression, String> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expression, String> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            self.descend()?;
            let operand = self.unary()?;
            self.depth -= 1;
            return Ok(Expression::Neg(Box::new(operand)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expression, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expression::Number(n)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                self.depth -= 1;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    return self.call(&name);
                }
                let reading = if self.peek() == Some(&Token::Dot) {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Ident(field)) => StatReading::from_field(&field)
                            .ok_or_else(|| format!("unknown reading '.{field}'"))?,
                        _ => return Err(format!("expected reading after '{name}.'")),
                    }
                } else {
                    StatReading::Value
                };
                Ok(Expression::Reading {
                    stat: name,
                    reading,
                })
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn call(&mut self, name: &str) -> Result<Expression, String> {
        let func = Function::from_name(name).ok_or_else(|| format!("unknown function '{name}'"))?;
        self.expect(&Token::LParen)?;
        self.descend()?;

        let mut args = vec![self.expr()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            args.push(self.expr()?);
        }
        self.expect(&Token::RParen)?;
        self.depth -= 1;

        if !func.arity_ok(args.len()) {
            return Err(format!("wrong number of arguments to '{name}'"));
        }
        Ok(Expression::Call { func, args })
    }
}
