//! bpftrace output-line grammar (`-f json` mode).
//!
//! bpftrace emits one JSON object per stdout line, shaped as
//! `{"type": "...", "data": ...}`. The payload stays as `RawValue` so each
//! record kind can decode its own shape lazily.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::Result;

/// Prefix bpftrace puts in front of variable names in map/hist dumps
/// (`@bytes`, `@usecs`, ...). Stripped before descriptor lookup.
pub const VAR_SIGIL: char = '@';

/// Variable dump payload: sigil-prefixed variable name to raw value.
///
/// `BTreeMap` keeps iteration deterministic, which in turn keeps sample
/// ordering stable across scrapes.
pub type VarData = BTreeMap<String, Box<RawValue>>;

/// One bucket of a bpftrace histogram value. Buckets arrive already sorted
/// by bound.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistBucket {
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

#[derive(Debug, Deserialize)]
struct OutputLine {
    #[serde(rename = "type")]
    kind: String,
    data: Box<RawValue>,
}

#[derive(Debug, Deserialize)]
struct AttachedProbesData {
    probes: u64,
}

/// A decoded line of bpftrace output.
#[derive(Debug)]
pub enum OutputRecord {
    /// Startup handshake: the script attached to `probes` probes.
    AttachedProbes { probes: u64 },
    /// `printf()` output from the script; opaque diagnostic text.
    Printf(Box<RawValue>),
    /// Scalar and map variable dump (emitted in response to SIGUSR1).
    MapDump(VarData),
    /// Histogram variable dump.
    HistDump(VarData),
    /// Forward compatibility: record kinds we do not know are logged and
    /// ignored by callers, never treated as an error.
    Unknown { kind: String },
}

/// Decode one stdout line into a record.
pub fn decode_line(line: &str) -> Result<OutputRecord> {
    let out: OutputLine = serde_json::from_str(line)?;
    let record = match out.kind.as_str() {
        "attached_probes" => {
            let data: AttachedProbesData = serde_json::from_str(out.data.get())?;
            OutputRecord::AttachedProbes {
                probes: data.probes,
            }
        }
        "printf" => OutputRecord::Printf(out.data),
        "map" => OutputRecord::MapDump(serde_json::from_str(out.data.get())?),
        "hist" => OutputRecord::HistDump(serde_json::from_str(out.data.get())?),
        _ => OutputRecord::Unknown { kind: out.kind },
    };
    Ok(record)
}

/// Strip the variable sigil off a dump key. Keys without the sigil do not
/// name a variable and never match a descriptor.
pub fn strip_sigil(name: &str) -> Option<&str> {
    name.strip_prefix(VAR_SIGIL)
}
