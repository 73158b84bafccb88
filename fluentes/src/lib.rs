//! Fluent Elasticsearch aggregations
//!
//! Build an aggregation request with [`AggregationBuilder`] and read the
//! response back with [`AggregationReader`]. Both sides derive aggregation
//! names from the field and statistic kind, so callers never spell names out.

pub mod builder;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod naming;
pub mod reader;

pub use builder::{AggregationBuilder, BuilderOptions};
pub use config::FluentConfig;
pub use error::{FluentError, Result};
pub use filter::{filter_name, translate, CompareOp, Literal, Predicate, PredicateParser};
pub use naming::{derive_name, AggKind, Field};
pub use reader::AggregationReader;

/// Common imports for building and reading aggregations
pub mod prelude {
    pub use crate::builder::{AggregationBuilder, BuilderOptions};
    pub use crate::error::{FluentError, Result};
    pub use crate::field;
    pub use crate::filter::{Literal, Predicate};
    pub use crate::naming::{AggKind, Field};
    pub use crate::reader::AggregationReader;
    pub use fluentes_dsl::{AggregateDictionary, KeyedBucket, SearchResponse, SortOrder};
}
