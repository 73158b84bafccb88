use super::{CompareOp, Literal, Predicate, DATE_TOKEN_FORMAT};
use crate::error::{FluentError, Result};
use crate::naming::Field;
use chrono::NaiveDateTime;
use fluentes_dsl::{FilterQuery, RangeParams};
use tracing::trace;

/// Prefix of every filter bucket name
pub const FILTER_NAME_PREFIX: &str = "Filter";

/// Translate a predicate into the equivalent filter query.
///
/// The output mirrors the predicate tree: comparisons become `term` / `range`
/// / `exists` leaves, and / or / not become `bool` nodes. Nothing is returned
/// unless the whole tree translates.
pub fn translate(predicate: &Predicate) -> Result<FilterQuery> {
    let query = match predicate {
        Predicate::Compare { field, op, value } => translate_comparison(field, *op, value)?,
        Predicate::And(l, r) => FilterQuery::must(vec![translate(l)?, translate(r)?]),
        Predicate::Or(l, r) => FilterQuery::should(vec![translate(l)?, translate(r)?]),
        Predicate::Not(x) => FilterQuery::must_not(vec![translate(x)?]),
        Predicate::Call {
            target,
            method,
            args,
        } => {
            let (op, value) = comparison_call(target, method, args)?;
            translate_comparison(target, op, value)?
        }
    };
    trace!(predicate = %predicate, query_type = query.query_type(), "translated filter predicate");
    Ok(query)
}

fn comparison_call<'a>(
    target: &Field,
    method: &str,
    args: &'a [Literal],
) -> Result<(CompareOp, &'a Literal)> {
    let op = CompareOp::from_method(method).ok_or_else(|| {
        FluentError::UnsupportedExpression(format!(
            "method '{}' called on '{}' is not a comparison",
            method, target
        ))
    })?;
    match args {
        [value] => Ok((op, value)),
        _ => Err(FluentError::UnsupportedExpression(format!(
            "'{}.{}' takes exactly one argument, got {}",
            target,
            method,
            args.len()
        ))),
    }
}

fn translate_comparison(field: &Field, op: CompareOp, value: &Literal) -> Result<FilterQuery> {
    let path = field.path();
    match (op, value) {
        (CompareOp::Eq, Literal::Null) => Ok(FilterQuery::must_not(vec![FilterQuery::exists(path)])),
        (CompareOp::Ne, Literal::Null) => Ok(FilterQuery::exists(path)),
        (CompareOp::Eq, v) => Ok(FilterQuery::term(path, v.to_value())),
        (CompareOp::Ne, v) => Ok(FilterQuery::must_not(vec![FilterQuery::term(path, v.to_value())])),
        (op, v) if !v.is_orderable() => Err(FluentError::UnsupportedExpression(format!(
            "range comparison '{} {} {}'",
            field,
            op.symbol(),
            v
        ))),
        (CompareOp::Lt, v) => Ok(FilterQuery::range(path, RangeParams::lt(v.to_value()))),
        (CompareOp::Le, v) => Ok(FilterQuery::range(path, RangeParams::lte(v.to_value()))),
        (CompareOp::Gt, v) => Ok(FilterQuery::range(path, RangeParams::gt(v.to_value()))),
        (CompareOp::Ge, v) => Ok(FilterQuery::range(path, RangeParams::gte(v.to_value()))),
    }
}

/// Name of the filter bucket wrapping statistics filtered by `predicate`.
///
/// Derived from the predicate structure only, in prefix order so that
/// differently grouped trees get different names. Field paths, method names
/// and string values are percent-escaped outside `[A-Za-z0-9.-]`, which keeps
/// `_` free as the token separator and `[`, `]`, `>` out of the name. String
/// values that would read as another literal (`"5"`, `"null"`) get their first
/// character escaped too, so distinct predicates never share a name.
pub fn filter_name(predicate: &Predicate) -> String {
    let mut tokens = vec![FILTER_NAME_PREFIX.to_string()];
    push_tokens(predicate, &mut tokens);
    tokens.join("_")
}

fn push_tokens(predicate: &Predicate, tokens: &mut Vec<String>) {
    match predicate {
        Predicate::Compare { field, op, value } => push_comparison(field, *op, value, tokens),
        Predicate::And(l, r) => {
            tokens.push("and".to_string());
            push_tokens(l, tokens);
            push_tokens(r, tokens);
        }
        Predicate::Or(l, r) => {
            tokens.push("or".to_string());
            push_tokens(l, tokens);
            push_tokens(r, tokens);
        }
        Predicate::Not(x) => {
            tokens.push("not".to_string());
            push_tokens(x, tokens);
        }
        Predicate::Call {
            target,
            method,
            args,
        } => match comparison_call(target, method, args) {
            // `price.gt(10)` names the same bucket as `price > 10`
            Ok((op, value)) => push_comparison(target, op, value, tokens),
            Err(_) => {
                tokens.push("call".to_string());
                tokens.push(escape(method));
                tokens.push(escape(target.path()));
                tokens.push(args.len().to_string());
                tokens.extend(args.iter().map(value_token));
            }
        },
    }
}

fn push_comparison(field: &Field, op: CompareOp, value: &Literal, tokens: &mut Vec<String>) {
    tokens.push(op.token().to_string());
    tokens.push(escape(field.path()));
    tokens.push(value_token(value));
}

fn value_token(value: &Literal) -> String {
    let Literal::Str(s) = value else {
        return value.name_token();
    };
    let escaped = escape(s);
    if escaped != *s || !reads_as_other_literal(s) {
        return escaped;
    }
    // Unescaped, so the first character is ASCII
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => format!("%{:02X}{}", first as u32, chars.as_str()),
        None => escaped,
    }
}

fn reads_as_other_literal(s: &str) -> bool {
    matches!(s, "null" | "true" | "false")
        || s.parse::<f64>().is_ok()
        || NaiveDateTime::parse_from_str(s, DATE_TOKEN_FORMAT).is_ok()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    out
}
