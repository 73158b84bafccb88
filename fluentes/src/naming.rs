//! Aggregation name derivation
//!
//! Every aggregation the builder attaches is keyed by a name derived from the
//! field it reads and the kind of statistic. The reader re-derives the same
//! name to find the aggregate in the response, so these functions must stay
//! pure: the same inputs always give the same string.

use crate::error::{FluentError, Result};
use fluentes_dsl::SortOrder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

static FIELD_PATH: OnceLock<Regex> = OnceLock::new();

fn field_path_regex() -> &'static Regex {
    FIELD_PATH.get_or_init(|| {
        Regex::new(r"^[A-Za-z_@][A-Za-z0-9_@]*(\.[A-Za-z_@][A-Za-z0-9_@]*)*$")
            .expect("field path regex is valid")
    })
}

/// Reference to a single document field, as a dotted path (`engine.power`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Field {
    path: String,
}

impl Field {
    /// Parse a field access path.
    ///
    /// Only plain property reads are accepted: one or more identifiers joined
    /// by `.`. Calls, operators, literals and whitespace are rejected with
    /// [`FluentError::InvalidExpression`].
    pub fn parse(expression: &str) -> Result<Self> {
        if expression.is_empty() {
            return Err(FluentError::invalid_expression(expression, "empty expression"));
        }
        if expression.contains(char::is_whitespace) {
            return Err(FluentError::invalid_expression(
                expression,
                "whitespace is not allowed in a field path",
            ));
        }
        if expression.contains('(') || expression.contains(')') {
            return Err(FluentError::invalid_expression(
                expression,
                "method calls are not field accesses",
            ));
        }
        if expression.split('.').any(str::is_empty) {
            return Err(FluentError::invalid_expression(expression, "empty path segment"));
        }
        if !field_path_regex().is_match(expression) {
            return Err(FluentError::invalid_expression(
                expression,
                "expected a property access path",
            ));
        }
        Ok(Self {
            path: expression.to_string(),
        })
    }

    /// Build from a struct member path checked by the compiler.
    ///
    /// Used by [`field!`](crate::field); raw identifier prefixes (`r#type`)
    /// and a trailing `.` are stripped.
    #[doc(hidden)]
    pub fn from_member(member: &str) -> Self {
        let path = member
            .trim_end_matches('.')
            .split('.')
            .map(|segment| segment.strip_prefix("r#").unwrap_or(segment))
            .collect::<Vec<_>>()
            .join(".");
        Self { path }
    }

    /// Full dotted path, as sent to the search engine
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Property name: the last path segment
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    /// Enclosing sub-path, if the field is nested
    pub fn parent(&self) -> Option<&str> {
        self.path.rsplit_once('.').map(|(parent, _)| parent)
    }

    /// Aggregation name for `kind` over this field
    pub fn agg_name(&self, kind: AggKind) -> String {
        derive_name(self, kind)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl FromStr for Field {
    type Err = FluentError;

    fn from_str(s: &str) -> Result<Self> {
        Field::parse(s)
    }
}

impl TryFrom<String> for Field {
    type Error = FluentError;

    fn try_from(value: String) -> Result<Self> {
        Field::parse(&value)
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.path
    }
}

/// Compile-time checked field reference.
///
/// `field!(Car, price)` fails to compile unless `Car` has a `price` member.
/// Nested members are joined with `.`; a literal after `=>` overrides the
/// indexed name for members renamed during serialization.
///
/// ```
/// use fluentes::field;
///
/// struct Engine { power: u32 }
/// struct Car { credit_limit: f64, engine: Engine }
///
/// assert_eq!(field!(Car, credit_limit).path(), "credit_limit");
/// assert_eq!(field!(Car, engine.power).path(), "engine.power");
/// assert_eq!(field!(Car, credit_limit => "creditLimit").path(), "creditLimit");
/// ```
#[macro_export]
macro_rules! field {
    ($ty:ty, $($member:ident).+ => $name:literal) => {{
        #[allow(dead_code)]
        fn __member_exists(record: &$ty) {
            let _ = &record.$($member).+;
        }
        $crate::naming::Field::from_member($name)
    }};
    ($ty:ty, $($member:ident).+) => {{
        #[allow(dead_code)]
        fn __member_exists(record: &$ty) {
            let _ = &record.$($member).+;
        }
        $crate::naming::Field::from_member(concat!($(stringify!($member), "."),+))
    }};
}

/// Kind of aggregation a name is derived for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggKind {
    Sum,
    Count,
    Average,
    Cardinality,
    Distinct,
    Min,
    Max,
    Stats,
    Percentile,
    GroupBy,
    TopHits,
}

impl AggKind {
    pub const ALL: [AggKind; 11] = [
        AggKind::Sum,
        AggKind::Count,
        AggKind::Average,
        AggKind::Cardinality,
        AggKind::Distinct,
        AggKind::Min,
        AggKind::Max,
        AggKind::Stats,
        AggKind::Percentile,
        AggKind::GroupBy,
        AggKind::TopHits,
    ];

    /// Name prefix for this kind
    pub fn tag(self) -> &'static str {
        match self {
            AggKind::Sum => "Sum",
            AggKind::Count => "Count",
            AggKind::Average => "Average",
            AggKind::Cardinality => "Cardinality",
            AggKind::Distinct => "Distinct",
            AggKind::Min => "Min",
            AggKind::Max => "Max",
            AggKind::Stats => "Stats",
            AggKind::Percentile => "Percentile",
            AggKind::GroupBy => "GroupBy",
            AggKind::TopHits => "TopHits",
        }
    }
}

impl fmt::Display for AggKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Separator between path segments in derived names; never valid in a path
pub const SEGMENT_SEPARATOR: char = '-';

/// `kind` tag followed by the field path, one capitalized part per segment.
///
/// `(Sum, credit_limit)` gives `SumCredit_limit`, `(Max, engine.power)` gives
/// `MaxEngine-Power`. Distinct paths always give distinct names: `_` and `@`
/// are kept, `.` becomes `-`, and a segment that does not start with an ASCII
/// lower-case letter is prefixed with `_` instead of being capitalized
/// (`Price` gives `Sum_Price`, `@timestamp` gives `Min_@timestamp`).
pub fn derive_name(field: &Field, kind: AggKind) -> String {
    let mut name = String::from(kind.tag());
    for (i, segment) in field.path().split('.').enumerate() {
        if i > 0 {
            name.push(SEGMENT_SEPARATOR);
        }
        push_segment(&mut name, segment);
    }
    name
}

fn push_segment(name: &mut String, segment: &str) {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            name.push(first.to_ascii_uppercase());
            name.push_str(chars.as_str());
        }
        _ => {
            name.push('_');
            name.push_str(segment);
        }
    }
}

/// Lower-case the first character, leaving the rest untouched
pub fn first_char_to_lower(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Key order for multi-key group-by, outermost first.
///
/// The key list is reversed and each key's first character lower-cased, so
/// `["A", "B"]` groups by `b` on the outside and `a` inside. Existing
/// consumers depend on this nesting; keep it as is.
pub fn group_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut keys: Vec<String> = keys
        .into_iter()
        .map(|key| first_char_to_lower(key.as_ref()))
        .collect();
    keys.reverse();
    keys
}

pub fn sort_tag(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "Ascending",
        SortOrder::Desc => "Descending",
    }
}

/// Name for unsorted top hits
pub fn top_hits_name() -> &'static str {
    AggKind::TopHits.tag()
}

/// Name for top hits sorted on `field`; encodes both direction and field so
/// differently sorted siblings never collide.
pub fn sorted_top_hits_name(field: &Field, order: SortOrder) -> String {
    format!("{}{}", sort_tag(order), derive_name(field, AggKind::TopHits))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(path: &str) -> Field {
        Field::parse(path).unwrap()
    }

    // ===================================================================
    // Field parsing
    // ===================================================================

    #[test]
    fn test_parse_simple_field() {
        let f = field("price");
        assert_eq!(f.path(), "price");
        assert_eq!(f.name(), "price");
        assert!(f.parent().is_none());
    }

    #[test]
    fn test_parse_nested_field() {
        let f = field("engine.horse_power");
        assert_eq!(f.name(), "horse_power");
        assert_eq!(f.parent(), Some("engine"));
    }

    #[test]
    fn test_parse_at_prefixed_field() {
        assert_eq!(field("@timestamp").path(), "@timestamp");
    }

    #[test]
    fn test_parse_rejects_non_property_access() {
        for bad in ["", "price()", "a b", "a..b", ".a", "a.", "1price", "a+b", "\"price\"", "a[0]"] {
            match Field::parse(bad) {
                Err(FluentError::InvalidExpression { expression, .. }) => {
                    assert_eq!(expression, bad)
                }
                other => panic!("Expected InvalidExpression for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_from_str_and_display() {
        let f: Field = "engine.power".parse().unwrap();
        assert_eq!(f.to_string(), "engine.power");
    }

    #[test]
    fn test_serde_validates() {
        let f: Field = serde_json::from_str("\"price\"").unwrap();
        assert_eq!(f.path(), "price");
        assert!(serde_json::from_str::<Field>("\"price()\"").is_err());
    }

    // ===================================================================
    // field! macro
    // ===================================================================

    #[allow(dead_code)]
    struct Engine {
        power: u32,
    }

    #[allow(dead_code)]
    struct Car {
        credit_limit: f64,
        r#type: String,
        engine: Engine,
    }

    #[test]
    fn test_field_macro() {
        assert_eq!(field!(Car, credit_limit).path(), "credit_limit");
        assert_eq!(field!(Car, engine.power).path(), "engine.power");
        assert_eq!(field!(Car, r#type).path(), "type");
        assert_eq!(field!(Car, credit_limit => "creditLimit").path(), "creditLimit");
    }

    // ===================================================================
    // Name derivation
    // ===================================================================

    #[test]
    fn test_derive_name() {
        assert_eq!(derive_name(&field("credit_limit"), AggKind::Sum), "SumCredit_limit");
        assert_eq!(derive_name(&field("creditLimit"), AggKind::Count), "CountCreditLimit");
        assert_eq!(derive_name(&field("engine.power"), AggKind::Max), "MaxEngine-Power");
        assert_eq!(derive_name(&field("@timestamp"), AggKind::Min), "Min_@timestamp");
        assert_eq!(derive_name(&field("Price"), AggKind::Sum), "Sum_Price");
        assert_eq!(derive_name(&field("_id"), AggKind::Count), "Count__id");
        assert_eq!(derive_name(&field("color"), AggKind::GroupBy), "GroupByColor");
    }

    #[test]
    fn test_similar_paths_get_distinct_names() {
        let paths = [
            "credit_limit",
            "credit.limit",
            "creditLimit",
            "CreditLimit",
            "@creditLimit",
            "credit.Limit",
            "creditlimit",
            "_credit.limit",
            "credit._limit",
        ];
        let names: std::collections::HashSet<String> = paths
            .iter()
            .map(|p| derive_name(&field(p), AggKind::Sum))
            .collect();
        assert_eq!(names.len(), paths.len());
    }

    #[test]
    fn test_member_paths_with_non_ascii_start() {
        let f = Field::from_member("émission");
        assert_eq!(derive_name(&f, AggKind::Sum), "Sum_émission");
    }

    #[test]
    fn test_agg_name_matches_derive_name() {
        let f = field("price");
        for kind in AggKind::ALL {
            assert_eq!(f.agg_name(kind), derive_name(&f, kind));
        }
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let f = field("price");
        let names: std::collections::HashSet<String> =
            AggKind::ALL.iter().map(|k| derive_name(&f, *k)).collect();
        assert_eq!(names.len(), AggKind::ALL.len());
    }

    // ===================================================================
    // Group keys
    // ===================================================================

    #[test]
    fn test_group_keys_reverse_and_lower() {
        assert_eq!(group_keys(["A", "B"]), vec!["b", "a"]);
        assert_eq!(group_keys(vec!["CarType", "Color", "year"]), vec!["year", "color", "carType"]);
    }

    #[test]
    fn test_group_keys_empty() {
        assert!(group_keys(Vec::<String>::new()).is_empty());
    }

    // ===================================================================
    // Top hits names
    // ===================================================================

    #[test]
    fn test_top_hits_names() {
        let ts = field("timestamp");
        assert_eq!(top_hits_name(), "TopHits");
        assert_eq!(sorted_top_hits_name(&ts, SortOrder::Asc), "AscendingTopHitsTimestamp");
        assert_eq!(sorted_top_hits_name(&ts, SortOrder::Desc), "DescendingTopHitsTimestamp");
    }
}
