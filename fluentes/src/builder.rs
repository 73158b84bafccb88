//! Fluent aggregation request builder
//!
//! Each statistic is attached under a name derived from its field and kind,
//! optionally inside a `filter` bucket derived from a predicate. Grouping wraps
//! everything built so far in a terms bucket.
//!
//! ```
//! use fluentes::prelude::*;
//!
//! # fn main() -> fluentes::Result<()> {
//! let price = Field::parse("price")?;
//! let car_type = Field::parse("carType")?;
//! let sedans = Predicate::eq(&car_type, "sedan");
//!
//! let mut builder = AggregationBuilder::new();
//! builder
//!     .sum_by(&price, None)?
//!     .average_by(&price, Some(&sedans))?
//!     .group_by(&car_type);
//! let aggs = builder.into_aggregations();
//!
//! let group = aggs.get("GroupByCarType").unwrap();
//! assert!(group.aggs.contains("SumPrice"));
//! assert!(group.aggs.contains("Filter_eq_carType_sedan"));
//! # Ok(())
//! # }
//! ```

use crate::config::{FluentConfig, UNBOUNDED_SIZE};
use crate::error::{FluentError, Result};
use crate::filter::{filter_name, translate, Predicate};
use crate::naming::{derive_name, group_keys, sorted_top_hits_name, top_hits_name, AggKind, Field};
use fluentes_dsl::{
    Aggregation, Aggregations, SearchRequest, SortClause, SortOrder, SourceFilter, TermsAgg,
    TopHitsAgg,
};
use tracing::{debug, warn};

/// Sizes and defaults applied by [`AggregationBuilder`]
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderOptions {
    /// Terms size of group-by buckets
    pub group_by_size: u32,
    /// Terms size of distinct-value buckets
    pub distinct_size: u32,
    /// Hits kept by [`AggregationBuilder::top_hits_default`]
    pub top_hits_size: u32,
    /// Percents sent with `percentiles_by`
    pub percents: Option<Vec<f64>>,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            group_by_size: UNBOUNDED_SIZE,
            distinct_size: UNBOUNDED_SIZE,
            top_hits_size: 10,
            percents: None,
        }
    }
}

impl From<&FluentConfig> for BuilderOptions {
    fn from(config: &FluentConfig) -> Self {
        Self {
            group_by_size: config.buckets.group_by_size,
            distinct_size: config.buckets.distinct_size,
            top_hits_size: config.buckets.top_hits_size,
            percents: config.percentiles.percents.clone(),
        }
    }
}

/// Builder over an aggregation tree.
///
/// Methods chain through `&mut Self`; a method that fails returns before
/// touching the tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationBuilder {
    aggs: Aggregations,
    options: BuilderOptions,
}

impl AggregationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: BuilderOptions) -> Self {
        Self {
            aggs: Aggregations::new(),
            options,
        }
    }

    /// Continue building on an existing tree
    pub fn from_aggregations(aggs: Aggregations, options: BuilderOptions) -> Self {
        Self { aggs, options }
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    pub fn aggregations(&self) -> &Aggregations {
        &self.aggs
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn sum_by(&mut self, field: &Field, filter: Option<&Predicate>) -> Result<&mut Self> {
        self.attach(field, AggKind::Sum, filter, Aggregation::sum(field.path()))
    }

    /// Number of values (`value_count`)
    pub fn count_by(&mut self, field: &Field, filter: Option<&Predicate>) -> Result<&mut Self> {
        self.attach(field, AggKind::Count, filter, Aggregation::value_count(field.path()))
    }

    pub fn average_by(&mut self, field: &Field, filter: Option<&Predicate>) -> Result<&mut Self> {
        self.attach(field, AggKind::Average, filter, Aggregation::avg(field.path()))
    }

    /// Approximate number of distinct values
    pub fn cardinality_by(
        &mut self,
        field: &Field,
        filter: Option<&Predicate>,
    ) -> Result<&mut Self> {
        self.attach(field, AggKind::Cardinality, filter, Aggregation::cardinality(field.path()))
    }

    pub fn min_by(&mut self, field: &Field, filter: Option<&Predicate>) -> Result<&mut Self> {
        self.attach(field, AggKind::Min, filter, Aggregation::min(field.path()))
    }

    pub fn max_by(&mut self, field: &Field, filter: Option<&Predicate>) -> Result<&mut Self> {
        self.attach(field, AggKind::Max, filter, Aggregation::max(field.path()))
    }

    pub fn stats_by(&mut self, field: &Field, filter: Option<&Predicate>) -> Result<&mut Self> {
        self.attach(field, AggKind::Stats, filter, Aggregation::stats(field.path()))
    }

    pub fn percentiles_by(
        &mut self,
        field: &Field,
        filter: Option<&Predicate>,
    ) -> Result<&mut Self> {
        let agg = Aggregation::percentiles(field.path(), self.options.percents.clone());
        self.attach(field, AggKind::Percentile, filter, agg)
    }

    /// Every distinct value of `field`, as an unbounded terms bucket
    pub fn distinct_by(&mut self, field: &Field, filter: Option<&Predicate>) -> Result<&mut Self> {
        let terms = TermsAgg::new(field.path()).with_size(self.options.distinct_size);
        self.attach(field, AggKind::Distinct, filter, Aggregation::terms(terms))
    }

    /// Attach `agg` under its derived name, inside the predicate's filter
    /// bucket when one is given. The predicate is translated and the bucket
    /// name checked before anything is touched.
    fn attach(
        &mut self,
        field: &Field,
        kind: AggKind,
        filter: Option<&Predicate>,
        agg: Aggregation,
    ) -> Result<&mut Self> {
        let name = derive_name(field, kind);

        let Some(predicate) = filter else {
            if self.aggs.insert(name.clone(), agg).is_some() {
                warn!(name = %name, "replaced existing aggregation");
            }
            debug!(name = %name, field = %field, kind = %kind, "attached aggregation");
            return Ok(self);
        };

        let query = translate(predicate)?;
        let bucket_name = filter_name(predicate);

        let existing = self
            .aggs
            .get(&bucket_name)
            .map(|bucket| bucket.filter.as_ref() == Some(&query));

        if let (Some(true), Some(bucket)) = (existing, self.aggs.get_mut(&bucket_name)) {
            if bucket.aggs.insert(name.clone(), agg).is_some() {
                warn!(name = %name, filter = %bucket_name, "replaced existing aggregation");
            }
            debug!(
                name = %name,
                filter = %bucket_name,
                "merged aggregation into existing filter bucket"
            );
            return Ok(self);
        }

        // Same name, different filter: replacing it would lose statistics
        if existing.is_some() {
            return Err(FluentError::NameConflict(bucket_name));
        }

        let mut children = Aggregations::new();
        children.insert(name.clone(), agg);
        self.aggs
            .insert(bucket_name.clone(), Aggregation::filter(query).with_aggs(children));
        debug!(
            name = %name,
            filter = %bucket_name,
            predicate = %predicate,
            "attached filtered aggregation"
        );
        Ok(self)
    }

    // ========================================================================
    // Grouping
    // ========================================================================

    /// Wrap everything built so far in a terms bucket on `field`.
    ///
    /// Afterwards the tree has a single top-level aggregation named
    /// `GroupBy<Field>`; earlier aggregations become its children.
    pub fn group_by(&mut self, field: &Field) -> &mut Self {
        let name = derive_name(field, AggKind::GroupBy);
        self.wrap_in_terms(name, field.path())
    }

    /// Same as [`group_by`](Self::group_by) with a raw key used as both the
    /// bucket name and the indexed field.
    pub fn group_by_key(&mut self, key: &str) -> Result<&mut Self> {
        if key.trim().is_empty() {
            return Err(FluentError::invalid_expression(key, "empty group-by key"));
        }
        Ok(self.wrap_in_terms(key.to_string(), key))
    }

    /// Nested grouping over several keys.
    ///
    /// Keys go through [`group_keys`]: `["A", "B"]` yields an outer bucket on
    /// `b` holding an inner bucket on `a`.
    pub fn group_by_keys<I, S>(&mut self, keys: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = group_keys(keys);
        if let Some(empty) = keys.iter().find(|k| k.trim().is_empty()) {
            return Err(FluentError::invalid_expression(empty, "empty group-by key"));
        }
        // group_keys is outermost first; wrap innermost first
        for key in keys.iter().rev() {
            self.wrap_in_terms(key.clone(), key);
        }
        Ok(self)
    }

    fn wrap_in_terms(&mut self, name: String, field: &str) -> &mut Self {
        let terms = TermsAgg::new(field).with_size(self.options.group_by_size);
        let inner = std::mem::take(&mut self.aggs);
        self.aggs
            .insert(name.clone(), Aggregation::terms(terms).with_aggs(inner));
        debug!(name = %name, field = %field, "grouped aggregations");
        self
    }

    // ========================================================================
    // Top hits
    // ========================================================================

    /// Best `size` documents, returning only `fields` from `_source`
    pub fn top_hits(&mut self, size: u32, fields: &[Field]) -> &mut Self {
        let name = top_hits_name();
        let agg = TopHitsAgg {
            size: Some(size),
            source: source_filter(fields),
            sort: Vec::new(),
        };
        self.aggs.insert(name, Aggregation::top_hits(agg));
        debug!(name = %name, size, "attached top hits");
        self
    }

    /// Top hits with the configured default size
    pub fn top_hits_default(&mut self, fields: &[Field]) -> &mut Self {
        let size = self.options.top_hits_size;
        self.top_hits(size, fields)
    }

    /// Top hits ordered by `sort_field`. The name carries direction and sort
    /// field, so differently sorted siblings coexist.
    pub fn sorted_top_hits(
        &mut self,
        size: u32,
        sort_field: &Field,
        order: SortOrder,
        fields: &[Field],
    ) -> &mut Self {
        let name = sorted_top_hits_name(sort_field, order);
        let agg = TopHitsAgg {
            size: Some(size),
            source: source_filter(fields),
            sort: vec![SortClause::field(sort_field.path(), order)],
        };
        debug!(name = %name, size, sort = %sort_field, "attached sorted top hits");
        self.aggs.insert(name, Aggregation::top_hits(agg));
        self
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Snapshot of the tree built so far
    pub fn build(&self) -> Aggregations {
        self.aggs.clone()
    }

    pub fn into_aggregations(self) -> Aggregations {
        self.aggs
    }

    /// The `aggs` object as JSON
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(&self.aggs).map_err(|e| FluentError::Dsl(e.into()))
    }

    /// Aggregation-only search body (`size: 0`)
    pub fn into_search_request(self) -> SearchRequest {
        SearchRequest::aggregations_only(self.aggs)
    }
}

fn source_filter(fields: &[Field]) -> Option<SourceFilter> {
    if fields.is_empty() {
        return None;
    }
    Some(SourceFilter::includes(
        fields.iter().map(|f| f.path().to_string()).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Literal;
    use serde_json::json;

    fn field(path: &str) -> Field {
        Field::parse(path).unwrap()
    }

    // ===================================================================
    // Statistics
    // ===================================================================

    #[test]
    fn test_unfiltered_statistics() {
        let price = field("price");
        let mut builder = AggregationBuilder::new();
        builder
            .sum_by(&price, None)
            .unwrap()
            .count_by(&price, None)
            .unwrap()
            .average_by(&price, None)
            .unwrap()
            .cardinality_by(&price, None)
            .unwrap()
            .min_by(&price, None)
            .unwrap()
            .max_by(&price, None)
            .unwrap()
            .stats_by(&price, None)
            .unwrap();

        assert_eq!(
            builder.to_json().unwrap(),
            json!({
                "SumPrice": {"sum": {"field": "price"}},
                "CountPrice": {"value_count": {"field": "price"}},
                "AveragePrice": {"avg": {"field": "price"}},
                "CardinalityPrice": {"cardinality": {"field": "price"}},
                "MinPrice": {"min": {"field": "price"}},
                "MaxPrice": {"max": {"field": "price"}},
                "StatsPrice": {"stats": {"field": "price"}}
            })
        );
    }

    #[test]
    fn test_nested_field_name() {
        let mut builder = AggregationBuilder::new();
        builder.max_by(&field("engine.power"), None).unwrap();
        assert_eq!(
            builder.to_json().unwrap(),
            json!({"MaxEngine-Power": {"max": {"field": "engine.power"}}})
        );
    }

    #[test]
    fn test_filtered_sum_wraps_in_filter_bucket() {
        let p = Predicate::eq(&field("carType"), "sedan");
        let mut builder = AggregationBuilder::new();
        builder.sum_by(&field("price"), Some(&p)).unwrap();

        assert_eq!(
            builder.to_json().unwrap(),
            json!({
                "Filter_eq_carType_sedan": {
                    "filter": {"term": {"carType": "sedan"}},
                    "aggs": {"SumPrice": {"sum": {"field": "price"}}}
                }
            })
        );
    }

    #[test]
    fn test_shared_predicate_shares_bucket() {
        let p = Predicate::gt(&field("price"), 10);
        let mut builder = AggregationBuilder::new();
        builder
            .sum_by(&field("price"), Some(&p))
            .unwrap()
            .count_by(&field("price"), Some(&p))
            .unwrap();
        let aggs = builder.into_aggregations();

        assert_eq!(aggs.len(), 1);
        let bucket = aggs.get("Filter_gt_price_10").unwrap();
        assert_eq!(bucket.aggs.len(), 2);
        assert!(bucket.aggs.contains("SumPrice"));
        assert!(bucket.aggs.contains("CountPrice"));
    }

    #[test]
    fn test_unsupported_predicate_leaves_builder_unchanged() {
        let price = field("price");
        let mut builder = AggregationBuilder::new();
        builder.sum_by(&price, None).unwrap();
        let before = builder.clone();

        let p = Predicate::call(&field("name"), "contains", vec![Literal::from("x")]);
        match builder.average_by(&price, Some(&p)) {
            Err(FluentError::UnsupportedExpression(msg)) => assert!(msg.contains("contains")),
            other => panic!("Expected UnsupportedExpression, got {:?}", other),
        }
        assert_eq!(builder, before);
    }

    #[test]
    fn test_predicates_on_different_values_keep_separate_buckets() {
        let price = field("price");
        let city = field("city");
        let pairs = [("東京", "大阪"), ("New York", "NewYork")];
        for (first, second) in pairs {
            let first = Predicate::eq(&city, first);
            let second = Predicate::eq(&city, second);
            let mut builder = AggregationBuilder::new();
            builder
                .sum_by(&price, Some(&first))
                .unwrap()
                .count_by(&price, Some(&second))
                .unwrap();
            let aggs = builder.into_aggregations();

            assert_eq!(aggs.len(), 2);
            let first_bucket = aggs.get(&filter_name(&first)).unwrap();
            assert!(first_bucket.aggs.contains("SumPrice"));
            assert_eq!(first_bucket.filter.as_ref(), Some(&translate(&first).unwrap()));
            let second_bucket = aggs.get(&filter_name(&second)).unwrap();
            assert!(second_bucket.aggs.contains("CountPrice"));
        }
    }

    #[test]
    fn test_bucket_name_taken_by_other_aggregation_is_conflict() {
        let city = field("city");
        let tokyo = Predicate::eq(&city, "東京");
        let mut existing = Aggregations::new();
        existing.insert(
            filter_name(&tokyo),
            Aggregation::terms(TermsAgg::new("city")),
        );
        let mut builder =
            AggregationBuilder::from_aggregations(existing, BuilderOptions::default());
        let before = builder.clone();

        match builder.sum_by(&field("price"), Some(&tokyo)) {
            Err(FluentError::NameConflict(name)) => assert_eq!(name, filter_name(&tokyo)),
            other => panic!("Expected NameConflict, got {:?}", other),
        }
        assert_eq!(builder, before);
    }

    #[test]
    fn test_similar_field_paths_keep_separate_statistics() {
        let mut builder = AggregationBuilder::new();
        builder
            .sum_by(&field("credit_limit"), None)
            .unwrap()
            .sum_by(&field("credit.limit"), None)
            .unwrap()
            .sum_by(&field("creditLimit"), None)
            .unwrap();
        assert_eq!(
            builder.to_json().unwrap(),
            json!({
                "SumCredit_limit": {"sum": {"field": "credit_limit"}},
                "SumCredit-Limit": {"sum": {"field": "credit.limit"}},
                "SumCreditLimit": {"sum": {"field": "creditLimit"}}
            })
        );
    }

    #[test]
    fn test_distinct_is_unbounded_terms() {
        let mut builder = AggregationBuilder::new();
        builder.distinct_by(&field("color"), None).unwrap();
        assert_eq!(
            builder.to_json().unwrap(),
            json!({"DistinctColor": {"terms": {"field": "color", "size": 2147483647}}})
        );
    }

    #[test]
    fn test_percentiles_use_configured_percents() {
        let options = BuilderOptions {
            percents: Some(vec![50.0, 99.0]),
            ..BuilderOptions::default()
        };
        let mut builder = AggregationBuilder::with_options(options);
        builder.percentiles_by(&field("latency"), None).unwrap();
        assert_eq!(
            builder.to_json().unwrap(),
            json!({"PercentileLatency": {"percentiles": {"field": "latency", "percents": [50.0, 99.0]}}})
        );
    }

    // ===================================================================
    // Grouping
    // ===================================================================

    #[test]
    fn test_group_by_nests_previous_tree() {
        let mut builder = AggregationBuilder::new();
        builder
            .sum_by(&field("price"), None)
            .unwrap()
            .group_by(&field("carType"));

        assert_eq!(
            builder.to_json().unwrap(),
            json!({
                "GroupByCarType": {
                    "terms": {"field": "carType", "size": 2147483647},
                    "aggs": {"SumPrice": {"sum": {"field": "price"}}}
                }
            })
        );
    }

    #[test]
    fn test_group_by_size_is_configurable() {
        let options = BuilderOptions {
            group_by_size: 25,
            ..BuilderOptions::default()
        };
        let mut builder = AggregationBuilder::with_options(options);
        builder.group_by(&field("carType"));
        let aggs = builder.build();
        let terms = aggs.get("GroupByCarType").unwrap().terms.as_ref().unwrap();
        assert_eq!(terms.size, Some(25));
    }

    #[test]
    fn test_group_by_key_uses_key_verbatim() {
        let mut builder = AggregationBuilder::new();
        builder.group_by_key("carType").unwrap();
        let aggs = builder.build();
        let terms = aggs.get("carType").unwrap().terms.as_ref().unwrap();
        assert_eq!(terms.field, "carType");
    }

    #[test]
    fn test_group_by_keys_outer_b_inner_a() {
        let mut builder = AggregationBuilder::new();
        builder
            .count_by(&field("id"), None)
            .unwrap()
            .group_by_keys(["A", "B"])
            .unwrap();

        assert_eq!(
            builder.to_json().unwrap(),
            json!({
                "b": {
                    "terms": {"field": "b", "size": 2147483647},
                    "aggs": {
                        "a": {
                            "terms": {"field": "a", "size": 2147483647},
                            "aggs": {"CountId": {"value_count": {"field": "id"}}}
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_group_by_key_rejects_empty() {
        let mut builder = AggregationBuilder::new();
        builder.sum_by(&field("price"), None).unwrap();
        let before = builder.clone();

        assert!(matches!(
            builder.group_by_key(" "),
            Err(FluentError::InvalidExpression { .. })
        ));
        assert!(builder.group_by_keys(["a", ""]).is_err());
        assert_eq!(builder, before);
    }

    // ===================================================================
    // Top hits
    // ===================================================================

    #[test]
    fn test_top_hits() {
        let mut builder = AggregationBuilder::new();
        builder.top_hits(3, &[field("name"), field("price")]);
        assert_eq!(
            builder.to_json().unwrap(),
            json!({
                "TopHits": {"top_hits": {"size": 3, "_source": {"includes": ["name", "price"]}}}
            })
        );
    }

    #[test]
    fn test_top_hits_default_size() {
        let mut builder = AggregationBuilder::new();
        builder.top_hits_default(&[]);
        let aggs = builder.build();
        let top = aggs.get("TopHits").unwrap().top_hits.as_ref().unwrap();
        assert_eq!(top.size, Some(10));
        assert!(top.source.is_none());
    }

    #[test]
    fn test_sorted_top_hits_coexist() {
        let ts = field("timestamp");
        let mut builder = AggregationBuilder::new();
        builder
            .sorted_top_hits(1, &ts, SortOrder::Asc, &[field("name")])
            .sorted_top_hits(1, &ts, SortOrder::Desc, &[field("name")]);

        let json = builder.to_json().unwrap();
        assert_eq!(
            json["AscendingTopHitsTimestamp"],
            json!({"top_hits": {
                "size": 1,
                "_source": {"includes": ["name"]},
                "sort": [{"timestamp": {"order": "asc"}}]
            }})
        );
        assert_eq!(
            json["DescendingTopHitsTimestamp"]["top_hits"]["sort"],
            json!([{"timestamp": {"order": "desc"}}])
        );
    }

    // ===================================================================
    // Output
    // ===================================================================

    #[test]
    fn test_search_request_is_aggregation_only() {
        let mut builder = AggregationBuilder::new();
        builder.sum_by(&field("price"), None).unwrap();
        let json = serde_json::to_value(builder.into_search_request()).unwrap();
        assert_eq!(json["size"], json!(0));
        assert_eq!(json["aggs"]["SumPrice"], json!({"sum": {"field": "price"}}));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = FluentConfig::default();
        config.buckets.group_by_size = 7;
        config.percentiles.percents = Some(vec![90.0]);
        let options = BuilderOptions::from(&config);
        assert_eq!(options.group_by_size, 7);
        assert_eq!(options.distinct_size, UNBOUNDED_SIZE);
        assert_eq!(options.percents, Some(vec![90.0]));
    }
}
