//! Serde model of the Elasticsearch aggregation DSL
//!
//! Request side: [`Aggregations`] serializes to the `aggs` object of a search
//! body, with [`FilterQuery`] covering the query subset used by `filter`
//! aggregations.
//!
//! Response side: [`AggregateDictionary`] wraps the `aggregations` object of a
//! search response and hands out typed aggregates by name.
//!
//! Supported aggregations:
//! - `terms`
//! - `filter`
//! - `stats` / `avg` / `sum` / `min` / `max`
//! - `value_count` / `cardinality` / `percentiles`
//! - `top_hits`

pub mod error;
pub mod filter;
pub mod request;
pub mod response;

pub use error::Error;
pub use filter::{BoolQuery, ExistsQuery, FilterQuery, MatchAllQuery, RangeParams};
pub use request::{
    Aggregation, Aggregations, FieldAgg, FieldSort, PercentilesAgg, SearchRequest, SortClause,
    SortOrder, SourceFilter, TermsAgg, TopHitsAgg,
};
pub use response::{
    AggregateDictionary, Hit, HitsMetadata, KeyedBucket, PercentileItem, PercentilesAggregate,
    SearchResponse, SingleBucketAggregate, StatsAggregate, TermsAggregate, TopHitsAggregate,
    TotalHits, ValueAggregate,
};

/// Result type for DSL operations
pub type Result<T> = std::result::Result<T, Error>;
