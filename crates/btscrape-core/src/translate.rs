//! Translate raw dumped values into metric samples.
//!
//! One raw value plus its descriptor yields zero or more samples: zero when
//! the value does not decode (logged, never fatal), one for scalars, one per
//! key for keyed variables.

use std::collections::BTreeMap;

use serde_json::value::RawValue;
use tracing::warn;

use crate::record::HistBucket;
use crate::registry::{Cardinality, Semantics, ValueKind, VariableDescriptor};

/// A histogram sample with cumulative per-bound counts.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSample {
    /// Total number of observations (sum of all bucket counts). The `+Inf`
    /// bound's cumulative count equals this.
    pub sample_count: u64,
    /// `(upper_bound, cumulative_count)` pairs, ascending by bound.
    pub buckets: Vec<(f64, u64)>,
}

/// The value carried by one emitted sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Gauge(f64),
    Counter(f64),
    Histogram(HistogramSample),
}

/// One emitted metric sample. Keyed variables carry the map key, exported
/// as the `key` label.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub key: Option<String>,
    pub value: SampleValue,
}

/// Translate one dumped raw value according to its descriptor.
///
/// Keyed values are walked in lexicographic key order so two translations
/// of the same value emit samples in the same order.
pub fn translate(descriptor: &VariableDescriptor, raw: &RawValue) -> Vec<Sample> {
    match descriptor.cardinality {
        Cardinality::Scalar => translate_scalar(descriptor, raw, None)
            .into_iter()
            .collect(),
        Cardinality::Keyed => {
            let entries: BTreeMap<String, Box<RawValue>> = match serde_json::from_str(raw.get()) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(variable = %descriptor.name, error = %e, "cannot decode map value");
                    return Vec::new();
                }
            };
            entries
                .into_iter()
                .filter_map(|(key, value)| translate_scalar(descriptor, &value, Some(key)))
                .collect()
        }
    }
}

fn translate_scalar(
    descriptor: &VariableDescriptor,
    raw: &RawValue,
    key: Option<String>,
) -> Option<Sample> {
    let value = match descriptor.value_kind {
        ValueKind::Number(semantics) => {
            let number: f64 = match serde_json::from_str(raw.get()) {
                Ok(number) => number,
                Err(e) => {
                    warn!(variable = %descriptor.name, error = %e, "cannot decode number value");
                    return None;
                }
            };
            match semantics {
                Semantics::Gauge => SampleValue::Gauge(number),
                Semantics::Counter => SampleValue::Counter(number),
            }
        }
        ValueKind::Histogram => {
            let raw_buckets: Vec<HistBucket> = match serde_json::from_str(raw.get()) {
                Ok(raw_buckets) => raw_buckets,
                Err(e) => {
                    warn!(variable = %descriptor.name, error = %e, "cannot decode histogram value");
                    return None;
                }
            };

            // bpftrace buckets are already sorted by bound; accumulate a
            // running total low to high.
            let mut cumulative = 0u64;
            let mut buckets = Vec::with_capacity(raw_buckets.len());
            for bucket in &raw_buckets {
                cumulative += bucket.count;
                buckets.push((bucket.max, cumulative));
            }
            SampleValue::Histogram(HistogramSample {
                sample_count: cumulative,
                buckets,
            })
        }
    };
    Some(Sample { key, value })
}
