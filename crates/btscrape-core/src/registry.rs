//! Variable definition grammar and the exported-name contract.
//!
//! `--vars` is a comma-separated list of `name[:modifier]` entries, e.g.
//! `bytes,reads:counter,usecs:hist`. Each entry becomes one descriptor; the
//! descriptor set is built once at startup and read-only afterwards.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{BtscrapeError, Result};
use crate::record::VAR_SIGIL;

/// Metric namespace every exported name is prefixed with.
pub const NAMESPACE: &str = "bpftrace";

/// Counting semantics of a numeric variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantics {
    Gauge,
    Counter,
}

/// Shape of a variable's dumped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// A single floating-point number. Histograms carry no counting
    /// semantics, so the gauge/counter distinction lives here.
    Number(Semantics),
    /// A bucket sequence, pre-sorted by bound.
    Histogram,
}

/// One value per variable, or a map from string key to value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Scalar,
    Keyed,
}

/// A registered bpftrace variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDescriptor {
    pub name: String,
    pub value_kind: ValueKind,
    pub cardinality: Cardinality,
}

impl VariableDescriptor {
    /// Exported metric name: `{namespace}_{script}_{name}`.
    ///
    /// This contract is bit-exact; dashboards key on it.
    pub fn metric_name(&self, script: &str) -> String {
        format!("{NAMESPACE}_{script}_{}", self.name)
    }

    /// Help text mirroring the variable's shape.
    pub fn help(&self) -> String {
        match (self.value_kind, self.cardinality) {
            (ValueKind::Histogram, _) => {
                format!("bpftrace histogram {VAR_SIGIL}{}", self.name)
            }
            (ValueKind::Number(_), Cardinality::Keyed) => {
                format!("bpftrace map {VAR_SIGIL}{}", self.name)
            }
            (ValueKind::Number(_), Cardinality::Scalar) => {
                format!("bpftrace variable {VAR_SIGIL}{}", self.name)
            }
        }
    }
}

/// Exported name of the synthetic probe-count gauge.
pub fn probes_metric_name(script: &str) -> String {
    format!("{NAMESPACE}_{script}_probes_total")
}

/// Derive the script identifier from its path: base name up to the first
/// dot (`/opt/scripts/biolatency.bt` -> `biolatency`).
pub fn script_identifier(script_path: &str) -> String {
    let base = Path::new(script_path)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.split('.').next().unwrap_or("").to_string()
}

/// Parse a variable definition string into descriptors keyed by name.
///
/// Empty entries (consecutive or trailing commas) are skipped. An unknown
/// modifier or a duplicate name is a config error; silently overwriting a
/// duplicate would hide a broken deployment.
pub fn parse_var_defs(defs: &str) -> Result<BTreeMap<String, VariableDescriptor>> {
    let mut vars = BTreeMap::new();
    for entry in defs.split(',') {
        if entry.is_empty() {
            continue;
        }

        // example: `usecs:hist`
        let (name, modifier) = match entry.split_once(':') {
            Some((name, modifier)) => (name, modifier),
            None => (entry, ""),
        };

        let (value_kind, cardinality) = match modifier {
            "" => (ValueKind::Number(Semantics::Gauge), Cardinality::Scalar),
            "counter" => (ValueKind::Number(Semantics::Counter), Cardinality::Scalar),
            "map" => (ValueKind::Number(Semantics::Gauge), Cardinality::Keyed),
            "countermap" => (ValueKind::Number(Semantics::Counter), Cardinality::Keyed),
            "hist" => (ValueKind::Histogram, Cardinality::Scalar),
            "histmap" => (ValueKind::Histogram, Cardinality::Keyed),
            other => {
                return Err(BtscrapeError::Config(format!(
                    "unknown variable modifier: \"{other}\""
                )))
            }
        };

        let descriptor = VariableDescriptor {
            name: name.to_string(),
            value_kind,
            cardinality,
        };
        if vars.insert(name.to_string(), descriptor).is_some() {
            return Err(BtscrapeError::Config(format!(
                "duplicate variable definition: \"{name}\""
            )));
        }
    }
    Ok(vars)
}
