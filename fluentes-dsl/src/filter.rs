//! Query DSL subset used inside `filter` aggregations

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Filter query types
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterQuery {
    /// Match all documents
    MatchAll(MatchAllQuery),

    /// Term query (exact match, not analyzed)
    Term(BTreeMap<String, Value>),

    /// Range query
    Range(BTreeMap<String, RangeParams>),

    /// Bool query (must, should, must_not, filter)
    Bool(BoolQuery),

    /// Exists query
    Exists(ExistsQuery),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MatchAllQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RangeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl RangeParams {
    pub fn gt(value: impl Into<Value>) -> Self {
        Self {
            gt: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn gte(value: impl Into<Value>) -> Self {
        Self {
            gte: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Self {
            lt: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn lte(value: impl Into<Value>) -> Self {
        Self {
            lte: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn has_bounds(&self) -> bool {
        self.gte.is_some() || self.gt.is_some() || self.lte.is_some() || self.lt.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BoolQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<FilterQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<FilterQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<FilterQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<FilterQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExistsQuery {
    pub field: String,
}

impl FilterQuery {
    pub fn match_all() -> Self {
        FilterQuery::MatchAll(MatchAllQuery::default())
    }

    /// Exact match of `field` against `value`
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), value.into());
        FilterQuery::Term(fields)
    }

    pub fn range(field: impl Into<String>, params: RangeParams) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), params);
        FilterQuery::Range(fields)
    }

    pub fn exists(field: impl Into<String>) -> Self {
        FilterQuery::Exists(ExistsQuery {
            field: field.into(),
        })
    }

    /// All clauses must match
    pub fn must(clauses: Vec<FilterQuery>) -> Self {
        FilterQuery::Bool(BoolQuery {
            must: clauses,
            ..Default::default()
        })
    }

    /// At least one clause must match
    pub fn should(clauses: Vec<FilterQuery>) -> Self {
        FilterQuery::Bool(BoolQuery {
            should: clauses,
            minimum_should_match: Some(1),
            ..Default::default()
        })
    }

    /// No clause may match
    pub fn must_not(clauses: Vec<FilterQuery>) -> Self {
        FilterQuery::Bool(BoolQuery {
            must_not: clauses,
            ..Default::default()
        })
    }

    /// Get the query type as a string
    pub fn query_type(&self) -> &'static str {
        match self {
            FilterQuery::MatchAll(_) => "match_all",
            FilterQuery::Term(_) => "term",
            FilterQuery::Range(_) => "range",
            FilterQuery::Bool(_) => "bool",
            FilterQuery::Exists(_) => "exists",
        }
    }
}
