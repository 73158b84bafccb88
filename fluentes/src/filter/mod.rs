//! Filter predicates for filtered statistics
//!
//! A [`Predicate`] is a small boolean expression over document fields:
//! comparisons against literals combined with and / or / not. The translator
//! turns it into the filter query of a `filter` aggregation, and
//! [`filter_name`] derives the name of that wrapper bucket.

mod parser;
mod translate;

pub use parser::PredicateParser;
pub use translate::{filter_name, translate};

use crate::error::{FluentError, Result};
use crate::naming::Field;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Compact UTC rendering of date literals in filter names
pub(crate) const DATE_TOKEN_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Constant side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<Utc>),
}

impl Literal {
    /// JSON value sent in term / range queries
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::from(*i),
            Literal::Float(f) => Value::from(*f),
            Literal::Str(s) => Value::String(s.clone()),
            Literal::Date(d) => Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }

    /// Whether range comparisons make sense for this literal
    pub fn is_orderable(&self) -> bool {
        matches!(
            self,
            Literal::Int(_) | Literal::Float(_) | Literal::Str(_) | Literal::Date(_)
        )
    }

    pub(crate) fn name_token(&self) -> String {
        match self {
            Literal::Null => "null".to_string(),
            Literal::Bool(b) => b.to_string(),
            Literal::Int(i) => i.to_string(),
            // Debug keeps the fraction, so `10.0` never reads as the int `10`
            Literal::Float(f) => format!("{:?}", f),
            Literal::Str(s) => s.clone(),
            Literal::Date(d) => d.format(DATE_TOKEN_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "\"{}\"", s),
            Literal::Date(d) => write!(f, "{}", d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            other => f.write_str(&other.name_token()),
        }
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Str(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::Str(v)
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Int(v.into())
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}

impl From<u32> for Literal {
    fn from(v: u32) -> Self {
        Literal::Int(v.into())
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(v: DateTime<Utc>) -> Self {
        Literal::Date(v)
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(v: Option<T>) -> Self {
        v.map_or(Literal::Null, Into::into)
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    pub(crate) fn token(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
        }
    }

    /// Comparison helper methods accepted in call position (`price.gt(10)`)
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "eq" | "equals" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "lt" => Some(CompareOp::Lt),
            "le" => Some(CompareOp::Le),
            "gt" => Some(CompareOp::Gt),
            "ge" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    /// Operator with sides swapped: `10 < x` is `x > 10`
    pub fn flipped(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            other => other,
        }
    }
}

/// Boolean filter expression over document fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// `field op value`
    Compare {
        field: Field,
        op: CompareOp,
        value: Literal,
    },

    /// Both sides must hold
    And(Box<Predicate>, Box<Predicate>),

    /// At least one side must hold
    Or(Box<Predicate>, Box<Predicate>),

    /// Negation
    Not(Box<Predicate>),

    /// Method call on a field: `target.method(args)`. Only the comparison
    /// helpers of [`CompareOp::from_method`] translate.
    Call {
        target: Field,
        method: String,
        args: Vec<Literal>,
    },
}

impl Predicate {
    /// Parse predicate text such as `price > 10 && color == "red"`
    pub fn parse(input: &str) -> Result<Self> {
        PredicateParser::new().parse(input)
    }

    pub fn compare(field: &Field, op: CompareOp, value: impl Into<Literal>) -> Self {
        Predicate::Compare {
            field: field.clone(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &Field, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: &Field, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn lt(field: &Field, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: &Field, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn gt(field: &Field, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: &Field, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn call(target: &Field, method: impl Into<String>, args: Vec<Literal>) -> Self {
        Predicate::Call {
            target: target.clone(),
            method: method.into(),
            args,
        }
    }

    /// Combine with AND
    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// Combine with OR
    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// Negate
    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Check that the predicate stays inside the translatable grammar
    pub fn validate(&self) -> Result<()> {
        translate(self).map(|_| ())
    }
}

impl std::ops::BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        self.and(rhs)
    }
}

impl std::ops::BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        self.or(rhs)
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        self.negate()
    }
}

impl FromStr for Predicate {
    type Err = FluentError;

    fn from_str(s: &str) -> Result<Self> {
        Predicate::parse(s)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { field, op, value } => {
                write!(f, "{} {} {}", field, op.symbol(), value)
            }
            Predicate::And(l, r) => write!(f, "({} && {})", l, r),
            Predicate::Or(l, r) => write!(f, "({} || {})", l, r),
            Predicate::Not(x) => write!(f, "!{}", x),
            Predicate::Call {
                target,
                method,
                args,
            } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{}.{}({})", target, method, args.join(", "))
            }
        }
    }
}
