//! Text syntax for predicates
//!
//! ```text
//! or      := and ("||" and)*
//! and     := unary ("&&" unary)*
//! unary   := "!" unary | primary
//! primary := "(" or ")" | operand op operand | path "(" args ")" | path
//! operand := path | literal | "$" name
//! ```
//!
//! A bare `path` means `path == true`. Literals are numbers, `"..."` or
//! `'...'` strings (no escapes), `true`, `false` and `null`.

use super::{CompareOp, Literal, Predicate};
use crate::error::{FluentError, Result};
use crate::naming::Field;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use std::collections::HashMap;

/// Deepest `!`, `(` and operator-chain nesting accepted
const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Str(String),
    Int(i64),
    Float(f64),
    Var(String),
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
    Comma,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '@'
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '@' || c == '.'
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_path_char)))(input)
}

fn path(input: &str) -> IResult<&str, Token> {
    map(ident, |s: &str| Token::Path(s.to_string()))(input)
}

fn variable(input: &str) -> IResult<&str, Token> {
    map(preceded(char('$'), ident), |s: &str| Token::Var(s.to_string()))(input)
}

fn parse_number(text: &str) -> std::result::Result<Token, String> {
    if text.contains('.') {
        text.parse::<f64>().map(Token::Float).map_err(|e| e.to_string())
    } else {
        text.parse::<i64>().map(Token::Int).map_err(|e| e.to_string())
    }
}

fn number(input: &str) -> IResult<&str, Token> {
    map_res(
        recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1))))),
        parse_number,
    )(input)
}

fn string(input: &str) -> IResult<&str, Token> {
    map(
        alt((
            delimited(char('"'), take_until("\""), char('"')),
            delimited(char('\''), take_until("'"), char('\'')),
        )),
        |s: &str| Token::Str(s.to_string()),
    )(input)
}

fn symbol(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Op(CompareOp::Eq), tag("==")),
        value(Token::Op(CompareOp::Ne), tag("!=")),
        value(Token::Op(CompareOp::Le), tag("<=")),
        value(Token::Op(CompareOp::Ge), tag(">=")),
        value(Token::Op(CompareOp::Lt), tag("<")),
        value(Token::Op(CompareOp::Gt), tag(">")),
        value(Token::And, tag("&&")),
        value(Token::Or, tag("||")),
        value(Token::Not, tag("!")),
        value(Token::LParen, tag("(")),
        value(Token::RParen, tag(")")),
        value(Token::Comma, tag(",")),
    ))(input)
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let (rest, tokens) = many0(preceded(
        multispace0,
        alt((symbol, number, string, variable, path)),
    ))(input)
    .map_err(|e| FluentError::Parse(e.to_string()))?;

    let rest = rest.trim_start();
    if !rest.is_empty() {
        return Err(FluentError::Parse(format!("unexpected input at '{}'", rest)));
    }
    Ok(tokens)
}

/// Predicate text parser with optional variable bindings.
///
/// ```
/// use fluentes::filter::PredicateParser;
///
/// let p = PredicateParser::new()
///     .bind("min", 10)
///     .parse("price >= $min && color != \"red\"")
///     .unwrap();
/// assert_eq!(p.to_string(), "(price >= 10 && color != \"red\")");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PredicateParser {
    bindings: HashMap<String, Literal>,
}

impl PredicateParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `$name` to a literal value
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    pub fn parse(&self, input: &str) -> Result<Predicate> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(FluentError::Parse("empty predicate".to_string()));
        }

        let mut cursor = Cursor {
            tokens: &tokens,
            pos: 0,
            depth: 0,
            bindings: &self.bindings,
        };
        let predicate = cursor.parse_or()?;
        if let Some(token) = cursor.peek() {
            return Err(FluentError::Parse(format!("unexpected token {:?}", token)));
        }
        Ok(predicate)
    }
}

enum Operand {
    Field(Field),
    Value(Literal),
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    bindings: &'a HashMap<String, Literal>,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(FluentError::Parse(format!(
                "expected {:?}, found {:?}",
                expected,
                self.peek()
            )))
        }
    }

    // Every nesting level, including each link of an operator chain, deepens
    // the predicate tree that later gets walked recursively
    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FluentError::Parse("predicate nesting too deep".to_string()));
        }
        Ok(())
    }

    // Precedence: || (lowest) > && > ! > primary (highest)
    fn parse_or(&mut self) -> Result<Predicate> {
        let depth = self.depth;
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            self.descend()?;
            let right = self.parse_and()?;
            left = left.or(right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;
        while self.eat(&Token::And) {
            self.descend()?;
            let right = self.parse_unary()?;
            left = left.and(right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Predicate> {
        if self.eat(&Token::Not) {
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(inner.negate());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Predicate> {
        if self.eat(&Token::LParen) {
            self.descend()?;
            let inner = self.parse_or()?;
            self.expect(&Token::RParen)?;
            self.depth -= 1;
            return Ok(inner);
        }

        if let Some(Token::Path(path)) = self.peek() {
            if self.tokens.get(self.pos + 1) == Some(&Token::LParen) {
                self.pos += 2;
                return self.parse_call(path);
            }
        }

        let left = self.parse_operand()?;
        let op = match self.peek() {
            Some(Token::Op(op)) => {
                self.pos += 1;
                *op
            }
            _ => {
                return match left {
                    Operand::Field(field) => Ok(Predicate::eq(&field, true)),
                    Operand::Value(v) => Err(FluentError::UnsupportedExpression(format!(
                        "literal {} is not a condition",
                        v
                    ))),
                };
            }
        };
        let right = self.parse_operand()?;

        match (left, right) {
            (Operand::Field(field), Operand::Value(value)) => {
                Ok(Predicate::compare(&field, op, value))
            }
            (Operand::Value(value), Operand::Field(field)) => {
                Ok(Predicate::compare(&field, op.flipped(), value))
            }
            (Operand::Field(l), Operand::Field(r)) => Err(FluentError::UnsupportedExpression(
                format!("field-to-field comparison '{} {} {}'", l, op.symbol(), r),
            )),
            (Operand::Value(l), Operand::Value(r)) => Err(FluentError::UnsupportedExpression(
                format!("constant comparison '{} {} {}'", l, op.symbol(), r),
            )),
        }
    }

    // Called with the cursor just past `path(`
    fn parse_call(&mut self, path: &str) -> Result<Predicate> {
        let (target, method) = path.rsplit_once('.').ok_or_else(|| {
            FluentError::UnsupportedExpression(format!("function call '{}'", path))
        })?;
        let target = Field::parse(target)?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                match self.parse_operand()? {
                    Operand::Value(v) => args.push(v),
                    Operand::Field(f) => {
                        return Err(FluentError::UnsupportedExpression(format!(
                            "field '{}' passed as argument to '{}'",
                            f, path
                        )))
                    }
                }
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }
        Ok(Predicate::call(&target, method, args))
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        match self.next() {
            Some(Token::Path(p)) => Ok(match p.as_str() {
                "true" => Operand::Value(Literal::Bool(true)),
                "false" => Operand::Value(Literal::Bool(false)),
                "null" => Operand::Value(Literal::Null),
                _ => Operand::Field(Field::parse(p)?),
            }),
            Some(Token::Str(s)) => Ok(Operand::Value(Literal::Str(s.clone()))),
            Some(Token::Int(i)) => Ok(Operand::Value(Literal::Int(*i))),
            Some(Token::Float(f)) => Ok(Operand::Value(Literal::Float(*f))),
            Some(Token::Var(name)) => self
                .bindings
                .get(name)
                .cloned()
                .map(Operand::Value)
                .ok_or_else(|| {
                    FluentError::UnsupportedExpression(format!("unbound variable '${}'", name))
                }),
            other => Err(FluentError::Parse(format!(
                "expected a field or literal, found {:?}",
                other
            ))),
        }
    }
}
