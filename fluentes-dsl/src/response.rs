//! Aggregation response readers
//!
//! [`AggregateDictionary`] keeps the raw JSON of one level of the response
//! tree and deserializes a node into its typed aggregate when it is asked for
//! by name.

use crate::error::Error;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// ES search response, reduced to what aggregation readers need
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub aggregations: AggregateDictionary,
}

/// Named aggregates at one level of the response tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateDictionary(Map<String, Value>);

impl AggregateDictionary {
    pub fn new(aggregates: Map<String, Value>) -> Self {
        Self(aggregates)
    }

    /// Build from the `aggregations` object of a response
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn typed<T: DeserializeOwned>(&self, name: &str, expected: &'static str) -> Result<T> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| Error::AggregationNotFound(name.to_string()))?;
        T::deserialize(value).map_err(|source| Error::UnexpectedShape {
            name: name.to_string(),
            expected,
            source,
        })
    }

    pub fn terms(&self, name: &str) -> Result<TermsAggregate> {
        self.typed(name, "terms")
    }

    pub fn sum(&self, name: &str) -> Result<ValueAggregate> {
        self.typed(name, "sum")
    }

    pub fn average(&self, name: &str) -> Result<ValueAggregate> {
        self.typed(name, "avg")
    }

    pub fn min(&self, name: &str) -> Result<ValueAggregate> {
        self.typed(name, "min")
    }

    pub fn max(&self, name: &str) -> Result<ValueAggregate> {
        self.typed(name, "max")
    }

    pub fn value_count(&self, name: &str) -> Result<ValueAggregate> {
        self.typed(name, "value_count")
    }

    pub fn cardinality(&self, name: &str) -> Result<ValueAggregate> {
        self.typed(name, "cardinality")
    }

    pub fn stats(&self, name: &str) -> Result<StatsAggregate> {
        self.typed(name, "stats")
    }

    pub fn percentiles(&self, name: &str) -> Result<PercentilesAggregate> {
        self.typed(name, "percentiles")
    }

    pub fn filter(&self, name: &str) -> Result<SingleBucketAggregate> {
        self.typed(name, "filter")
    }

    pub fn top_hits(&self, name: &str) -> Result<TopHitsAggregate> {
        self.typed(name, "top_hits")
    }
}

impl From<Map<String, Value>> for AggregateDictionary {
    fn from(aggregates: Map<String, Value>) -> Self {
        Self(aggregates)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermsAggregate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_count_error_upper_bound: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum_other_doc_count: Option<u64>,
    pub buckets: Vec<KeyedBucket>,
}

/// One group of a terms aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedBucket {
    pub key: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_as_string: Option<String>,
    pub doc_count: u64,
    #[serde(flatten)]
    pub aggregations: AggregateDictionary,
}

impl KeyedBucket {
    /// Bucket key as text: `key_as_string` when present, otherwise the
    /// scalar key rendered without JSON quoting.
    pub fn key_str(&self) -> Cow<'_, str> {
        if let Some(key) = &self.key_as_string {
            return Cow::Borrowed(key);
        }
        match &self.key {
            Value::String(s) => Cow::Borrowed(s),
            Value::Number(n) => Cow::Owned(n.to_string()),
            Value::Bool(b) => Cow::Owned(b.to_string()),
            Value::Null => Cow::Borrowed("null"),
            other => Cow::Owned(other.to_string()),
        }
    }
}

/// Single-value metric (`sum`, `avg`, `min`, `max`, `value_count`, `cardinality`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueAggregate {
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_as_string: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsAggregate {
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub sum: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentilesAggregate {
    pub values: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileItem {
    pub percent: f64,
    pub value: Option<f64>,
}

impl PercentilesAggregate {
    /// Percentile entries ordered by percent; keys that are not numbers are skipped
    pub fn items(&self) -> Vec<PercentileItem> {
        let mut items: Vec<PercentileItem> = self
            .values
            .iter()
            .filter_map(|(key, value)| {
                key.parse::<f64>().ok().map(|percent| PercentileItem {
                    percent,
                    value: *value,
                })
            })
            .collect();
        items.sort_by(|a, b| a.percent.total_cmp(&b.percent));
        items
    }
}

/// Single-bucket aggregate (`filter`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SingleBucketAggregate {
    pub doc_count: u64,
    #[serde(flatten)]
    pub aggregations: AggregateDictionary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopHitsAggregate {
    pub hits: HitsMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitsMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    Count(u64),
    Object { value: u64, relation: String },
}

impl TotalHits {
    pub fn value(&self) -> u64 {
        match self {
            TotalHits::Count(n) => *n,
            TotalHits::Object { value, .. } => *value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl TopHitsAggregate {
    /// Deserialize every hit's `_source` into `T`
    pub fn sources<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.hits
            .hits
            .iter()
            .map(|hit| T::deserialize(&hit.source).map_err(Error::from))
            .collect()
    }
}
