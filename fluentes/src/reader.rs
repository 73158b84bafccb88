//! Typed access to aggregation results
//!
//! [`AggregationReader`] re-derives the names the builder used, so a value
//! attached with `sum_by(&price, Some(&p))` is read back with
//! `get_sum(&price, Some(&p))`.
//!
//! ```
//! use fluentes::prelude::*;
//! use serde_json::json;
//!
//! # fn main() -> fluentes::Result<()> {
//! let response: SearchResponse = serde_json::from_value(json!({
//!     "took": 3,
//!     "aggregations": {
//!         "GroupByCarType": {"buckets": [
//!             {"key": "sedan", "doc_count": 2, "SumPrice": {"value": 30.0}},
//!             {"key": "truck", "doc_count": 1, "SumPrice": {"value": 55.0}}
//!         ]}
//!     }
//! })).unwrap();
//!
//! let car_type = Field::parse("carType")?;
//! let price = Field::parse("price")?;
//! let groups = response.get_dictionary(&car_type)?;
//! assert_eq!(groups["truck"].get_sum(&price, None)?, 55.0);
//! # Ok(())
//! # }
//! ```

use crate::error::{FluentError, Result};
use crate::filter::{filter_name, Predicate};
use crate::naming::{derive_name, sorted_top_hits_name, top_hits_name, AggKind, Field};
use fluentes_dsl::{
    AggregateDictionary, KeyedBucket, PercentileItem, SearchResponse, SingleBucketAggregate,
    SortOrder, StatsAggregate,
};
use serde::de::DeserializeOwned;
use std::any::type_name;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;
use tracing::trace;

/// Reads aggregates by derived name.
///
/// Implemented for the response, for response dictionaries, and for buckets,
/// so nested groups are read the same way as the top level.
pub trait AggregationReader {
    /// Aggregates at this level of the tree
    fn aggregates(&self) -> &AggregateDictionary;

    // ========================================================================
    // Group-by
    // ========================================================================

    /// Buckets of `group_by(field)`, in response order
    fn get_group_by(&self, field: &Field) -> Result<Vec<KeyedBucket>> {
        let name = derive_name(field, AggKind::GroupBy);
        read_buckets(self.aggregates(), &name)
    }

    /// Buckets of `group_by_key(key)` or one level of `group_by_keys`
    fn get_group_by_key(&self, key: &str) -> Result<Vec<KeyedBucket>> {
        read_buckets(self.aggregates(), key)
    }

    /// Group-by buckets mapped through `f`
    fn get_group_by_with<K, F>(&self, field: &Field, f: F) -> Result<Vec<K>>
    where
        F: FnMut(&KeyedBucket) -> K,
    {
        Ok(self.get_group_by(field)?.iter().map(f).collect())
    }

    /// Group-by buckets keyed by their key text
    fn get_dictionary(&self, field: &Field) -> Result<HashMap<String, KeyedBucket>> {
        Ok(self
            .get_group_by(field)?
            .into_iter()
            .map(|bucket| (bucket.key_str().into_owned(), bucket))
            .collect())
    }

    /// Group-by buckets keyed by their key parsed as `V`.
    ///
    /// A key that does not parse fails the whole read with
    /// [`FluentError::Conversion`].
    fn get_dictionary_as<V>(&self, field: &Field) -> Result<HashMap<V, KeyedBucket>>
    where
        V: FromStr + Eq + Hash,
        V::Err: Display,
    {
        self.get_group_by(field)?
            .into_iter()
            .map(|bucket| {
                let key = convert_key::<V>(&bucket.key_str())?;
                Ok((key, bucket))
            })
            .collect()
    }

    /// Group-by buckets keyed by key text, values mapped through `f`
    fn get_dictionary_with<K, F>(&self, field: &Field, mut f: F) -> Result<HashMap<String, K>>
    where
        F: FnMut(&KeyedBucket) -> K,
    {
        Ok(self
            .get_group_by(field)?
            .iter()
            .map(|bucket| (bucket.key_str().into_owned(), f(bucket)))
            .collect())
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Sum of `field`; an empty sum reads as 0
    fn get_sum(&self, field: &Field, filter: Option<&Predicate>) -> Result<f64> {
        let scope = filter_scope(self.aggregates(), filter)?;
        let name = derive_name(field, AggKind::Sum);
        Ok(scope.sum(&name)?.value.unwrap_or(0.0))
    }

    /// Number of values of `field`
    fn get_count(&self, field: &Field, filter: Option<&Predicate>) -> Result<u64> {
        let scope = filter_scope(self.aggregates(), filter)?;
        let name = derive_name(field, AggKind::Count);
        Ok(scope.value_count(&name)?.value.map_or(0, as_count))
    }

    /// Average of `field`; `None` when no document had a value
    fn get_average(&self, field: &Field, filter: Option<&Predicate>) -> Result<Option<f64>> {
        let scope = filter_scope(self.aggregates(), filter)?;
        let name = derive_name(field, AggKind::Average);
        Ok(scope.average(&name)?.value)
    }

    fn get_cardinality(&self, field: &Field, filter: Option<&Predicate>) -> Result<u64> {
        let scope = filter_scope(self.aggregates(), filter)?;
        let name = derive_name(field, AggKind::Cardinality);
        Ok(scope.cardinality(&name)?.value.map_or(0, as_count))
    }

    fn get_min(&self, field: &Field, filter: Option<&Predicate>) -> Result<Option<f64>> {
        let scope = filter_scope(self.aggregates(), filter)?;
        let name = derive_name(field, AggKind::Min);
        Ok(scope.min(&name)?.value)
    }

    fn get_max(&self, field: &Field, filter: Option<&Predicate>) -> Result<Option<f64>> {
        let scope = filter_scope(self.aggregates(), filter)?;
        let name = derive_name(field, AggKind::Max);
        Ok(scope.max(&name)?.value)
    }

    fn get_stats(&self, field: &Field, filter: Option<&Predicate>) -> Result<StatsAggregate> {
        let scope = filter_scope(self.aggregates(), filter)?;
        let name = derive_name(field, AggKind::Stats);
        Ok(scope.stats(&name)?)
    }

    /// Percentiles ordered by percent
    fn get_percentiles(
        &self,
        field: &Field,
        filter: Option<&Predicate>,
    ) -> Result<Vec<PercentileItem>> {
        let scope = filter_scope(self.aggregates(), filter)?;
        let name = derive_name(field, AggKind::Percentile);
        Ok(scope.percentiles(&name)?.items())
    }

    /// Distinct values of `field`, each key parsed as `V`
    fn get_distinct<V>(&self, field: &Field, filter: Option<&Predicate>) -> Result<Vec<V>>
    where
        V: FromStr,
        V::Err: Display,
    {
        let scope = filter_scope(self.aggregates(), filter)?;
        let name = derive_name(field, AggKind::Distinct);
        scope
            .terms(&name)?
            .buckets
            .iter()
            .map(|bucket| convert_key::<V>(&bucket.key_str()))
            .collect()
    }

    // ========================================================================
    // Top hits
    // ========================================================================

    /// `_source` of each hit of the unsorted top hits
    fn get_top_hits<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let name = top_hits_name();
        trace!(name, "reading top hits");
        Ok(self.aggregates().top_hits(name)?.sources()?)
    }

    /// `_source` of each hit of the top hits sorted on `field`
    fn get_sorted_top_hits<T: DeserializeOwned>(
        &self,
        field: &Field,
        order: SortOrder,
    ) -> Result<Vec<T>> {
        let name = sorted_top_hits_name(field, order);
        trace!(name = %name, "reading top hits");
        Ok(self.aggregates().top_hits(&name)?.sources()?)
    }
}

impl AggregationReader for AggregateDictionary {
    fn aggregates(&self) -> &AggregateDictionary {
        self
    }
}

impl AggregationReader for KeyedBucket {
    fn aggregates(&self) -> &AggregateDictionary {
        &self.aggregations
    }
}

impl AggregationReader for SingleBucketAggregate {
    fn aggregates(&self) -> &AggregateDictionary {
        &self.aggregations
    }
}

impl AggregationReader for SearchResponse {
    fn aggregates(&self) -> &AggregateDictionary {
        &self.aggregations
    }
}

fn read_buckets(aggs: &AggregateDictionary, name: &str) -> Result<Vec<KeyedBucket>> {
    trace!(name, "reading group-by buckets");
    Ok(aggs.terms(name)?.buckets)
}

/// Dictionary holding the statistics for `filter`: the filter bucket's
/// children, or `aggs` itself when unfiltered.
fn filter_scope<'a>(
    aggs: &'a AggregateDictionary,
    filter: Option<&Predicate>,
) -> Result<Cow<'a, AggregateDictionary>> {
    let Some(predicate) = filter else {
        return Ok(Cow::Borrowed(aggs));
    };
    predicate.validate()?;
    let name = filter_name(predicate);
    trace!(name = %name, "reading filter bucket");
    Ok(Cow::Owned(aggs.filter(&name)?.aggregations))
}

fn convert_key<V>(key: &str) -> Result<V>
where
    V: FromStr,
    V::Err: Display,
{
    key.parse::<V>().map_err(|e| FluentError::Conversion {
        key: key.to_string(),
        target: type_name::<V>(),
        reason: e.to_string(),
    })
}

// Counts come back as JSON numbers; value_count / cardinality are integral
fn as_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}
