//! Aggregation request descriptors
//!
//! These types serialize to the `aggs` section of an Elasticsearch search body.

use crate::filter::FilterQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::btree_map::{self, BTreeMap};

/// Named aggregations at one level of the aggregation tree
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Aggregations(BTreeMap<String, Aggregation>);

impl Aggregations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an aggregation, returning the one previously stored under `name`
    pub fn insert(&mut self, name: impl Into<String>, agg: Aggregation) -> Option<Aggregation> {
        self.0.insert(name.into(), agg)
    }

    pub fn get(&self, name: &str) -> Option<&Aggregation> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Aggregation> {
        self.0.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Aggregation> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Aggregation> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Aggregations {
    type Item = (&'a String, &'a Aggregation);
    type IntoIter = btree_map::Iter<'a, String, Aggregation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, Aggregation)> for Aggregations {
    fn from_iter<I: IntoIterator<Item = (String, Aggregation)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One aggregation container: exactly one aggregation type plus optional
/// sub-aggregations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Aggregation {
    // Metric aggregations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_count: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<FieldAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentiles: Option<PercentilesAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_hits: Option<TopHitsAgg>,

    // Bucket aggregations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms: Option<TermsAgg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterQuery>,

    // Nested aggregations
    #[serde(default, alias = "aggregations", skip_serializing_if = "Aggregations::is_empty")]
    pub aggs: Aggregations,
}

impl Aggregation {
    pub fn avg(field: impl Into<String>) -> Self {
        Self {
            avg: Some(FieldAgg::new(field)),
            ..Default::default()
        }
    }

    pub fn sum(field: impl Into<String>) -> Self {
        Self {
            sum: Some(FieldAgg::new(field)),
            ..Default::default()
        }
    }

    pub fn min(field: impl Into<String>) -> Self {
        Self {
            min: Some(FieldAgg::new(field)),
            ..Default::default()
        }
    }

    pub fn max(field: impl Into<String>) -> Self {
        Self {
            max: Some(FieldAgg::new(field)),
            ..Default::default()
        }
    }

    pub fn stats(field: impl Into<String>) -> Self {
        Self {
            stats: Some(FieldAgg::new(field)),
            ..Default::default()
        }
    }

    pub fn value_count(field: impl Into<String>) -> Self {
        Self {
            value_count: Some(FieldAgg::new(field)),
            ..Default::default()
        }
    }

    pub fn cardinality(field: impl Into<String>) -> Self {
        Self {
            cardinality: Some(FieldAgg::new(field)),
            ..Default::default()
        }
    }

    pub fn percentiles(field: impl Into<String>, percents: Option<Vec<f64>>) -> Self {
        Self {
            percentiles: Some(PercentilesAgg {
                field: field.into(),
                percents,
            }),
            ..Default::default()
        }
    }

    pub fn terms(terms: TermsAgg) -> Self {
        Self {
            terms: Some(terms),
            ..Default::default()
        }
    }

    pub fn top_hits(top_hits: TopHitsAgg) -> Self {
        Self {
            top_hits: Some(top_hits),
            ..Default::default()
        }
    }

    /// Single-bucket aggregation of the documents matching `filter`
    pub fn filter(filter: FilterQuery) -> Self {
        Self {
            filter: Some(filter),
            ..Default::default()
        }
    }

    /// Replace the sub-aggregations
    pub fn with_aggs(mut self, aggs: Aggregations) -> Self {
        self.aggs = aggs;
        self
    }

    /// Get the aggregation type as a string
    pub fn kind(&self) -> Option<&'static str> {
        if self.avg.is_some() {
            Some("avg")
        } else if self.sum.is_some() {
            Some("sum")
        } else if self.min.is_some() {
            Some("min")
        } else if self.max.is_some() {
            Some("max")
        } else if self.stats.is_some() {
            Some("stats")
        } else if self.value_count.is_some() {
            Some("value_count")
        } else if self.cardinality.is_some() {
            Some("cardinality")
        } else if self.percentiles.is_some() {
            Some("percentiles")
        } else if self.top_hits.is_some() {
            Some("top_hits")
        } else if self.terms.is_some() {
            Some("terms")
        } else if self.filter.is_some() {
            Some("filter")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FieldAgg {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Value>,
}

impl FieldAgg {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            missing: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PercentilesAgg {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percents: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TermsAgg {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_doc_count: Option<u64>,
}

impl TermsAgg {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            size: None,
            min_doc_count: None,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TopHitsAgg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, rename = "_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortClause>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SourceFilter {
    Bool(bool),
    Fields(Vec<String>),
    Object {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        includes: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        excludes: Vec<String>,
    },
}

impl SourceFilter {
    pub fn includes(fields: Vec<String>) -> Self {
        SourceFilter::Object {
            includes: fields,
            excludes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SortClause {
    Field(String),
    Object(BTreeMap<String, FieldSort>),
}

impl SortClause {
    pub fn field(field: impl Into<String>, order: SortOrder) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), FieldSort { order });
        SortClause::Object(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FieldSort {
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Root search request body carrying aggregations
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SearchRequest {
    /// Number of hits to return; aggregation-only requests use 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<FilterQuery>,

    #[serde(default, alias = "aggregations", skip_serializing_if = "Aggregations::is_empty")]
    pub aggs: Aggregations,
}

impl SearchRequest {
    /// Aggregation-only request: no hits, only `aggs`
    pub fn aggregations_only(aggs: Aggregations) -> Self {
        Self {
            size: Some(0),
            query: None,
            aggs,
        }
    }

    pub fn with_query(mut self, query: FilterQuery) -> Self {
        self.query = Some(query);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ===================================================================
    // Aggregation serialization
    // ===================================================================

    #[test]
    fn test_metric_serialization() {
        let agg = Aggregation::sum("price");
        assert_eq!(
            serde_json::to_value(&agg).unwrap(),
            json!({"sum": {"field": "price"}})
        );
    }

    #[test]
    fn test_terms_with_sub_aggs() {
        let mut inner = Aggregations::new();
        inner.insert("AveragePrice", Aggregation::avg("price"));

        let agg = Aggregation::terms(TermsAgg::new("color").with_size(100)).with_aggs(inner);
        assert_eq!(
            serde_json::to_value(&agg).unwrap(),
            json!({
                "terms": {"field": "color", "size": 100},
                "aggs": {"AveragePrice": {"avg": {"field": "price"}}}
            })
        );
    }

    #[test]
    fn test_filter_aggregation() {
        let mut inner = Aggregations::new();
        inner.insert("SumPrice", Aggregation::sum("price"));
        let agg = Aggregation::filter(FilterQuery::term("color", "red")).with_aggs(inner);
        assert_eq!(
            serde_json::to_value(&agg).unwrap(),
            json!({
                "filter": {"term": {"color": "red"}},
                "aggs": {"SumPrice": {"sum": {"field": "price"}}}
            })
        );
    }

    #[test]
    fn test_top_hits_with_sort_and_source() {
        let agg = Aggregation::top_hits(TopHitsAgg {
            size: Some(3),
            source: Some(SourceFilter::includes(vec!["name".to_string()])),
            sort: vec![SortClause::field("timestamp", SortOrder::Desc)],
        });
        assert_eq!(
            serde_json::to_value(&agg).unwrap(),
            json!({
                "top_hits": {
                    "size": 3,
                    "_source": {"includes": ["name"]},
                    "sort": [{"timestamp": {"order": "desc"}}]
                }
            })
        );
    }

    #[test]
    fn test_percentiles_without_percents() {
        let agg = Aggregation::percentiles("latency", None);
        assert_eq!(
            serde_json::to_value(&agg).unwrap(),
            json!({"percentiles": {"field": "latency"}})
        );
    }

    // ===================================================================
    // Deserialization
    // ===================================================================

    #[test]
    fn test_deserialize_nested_with_alias() {
        let aggs: Aggregations = serde_json::from_value(json!({
            "by_color": {
                "terms": {"field": "color"},
                "aggregations": {"max_price": {"max": {"field": "price"}}}
            }
        }))
        .unwrap();
        let by_color = aggs.get("by_color").unwrap();
        assert_eq!(by_color.kind(), Some("terms"));
        assert_eq!(by_color.aggs.get("max_price").unwrap().kind(), Some("max"));
    }

    #[test]
    fn test_kind_of_empty_container() {
        assert_eq!(Aggregation::default().kind(), None);
    }

    // ===================================================================
    // Aggregations map
    // ===================================================================

    #[test]
    fn test_insert_replaces_and_returns_previous() {
        let mut aggs = Aggregations::new();
        assert!(aggs.insert("x", Aggregation::min("a")).is_none());
        let previous = aggs.insert("x", Aggregation::max("a")).unwrap();
        assert_eq!(previous.kind(), Some("min"));
        assert_eq!(aggs.len(), 1);
    }

    #[test]
    fn test_names_are_sorted() {
        let aggs: Aggregations = vec![
            ("b".to_string(), Aggregation::sum("x")),
            ("a".to_string(), Aggregation::sum("y")),
        ]
        .into_iter()
        .collect();
        assert_eq!(aggs.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    // ===================================================================
    // SearchRequest
    // ===================================================================

    #[test]
    fn test_aggregations_only_request() {
        let mut aggs = Aggregations::new();
        aggs.insert("CountId", Aggregation::value_count("id"));
        let req = SearchRequest::aggregations_only(aggs).with_query(FilterQuery::match_all());
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "size": 0,
                "query": {"match_all": {}},
                "aggs": {"CountId": {"value_count": {"field": "id"}}}
            })
        );
    }
}
