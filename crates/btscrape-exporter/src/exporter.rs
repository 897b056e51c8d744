//! Scrape coordination and the Prometheus collector binding.
//!
//! One scrape = one SIGUSR1 plus a drain of the reply stream until every
//! registered variable has been observed or the stream ends. The process
//! handle and its read cursor live behind a single mutex, so scrapes never
//! run concurrently with each other.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use prometheus::core::{Collector, Desc};
use prometheus::proto;
use tracing::{info, warn};

use btscrape_core::record::{decode_line, strip_sigil, OutputRecord, VarData};
use btscrape_core::registry::{self, Cardinality, VariableDescriptor};
use btscrape_core::translate::{translate, Sample, SampleValue};
use btscrape_core::{BtscrapeError, Result};

use crate::process::BpftraceProcess;

/// Label attached to samples of keyed variables.
const KEY_LABEL: &str = "key";

struct VarMetric {
    descriptor: VariableDescriptor,
    desc: Desc,
}

/// Exports the variables of one bpftrace script as Prometheus metrics.
pub struct Exporter {
    probes_desc: Desc,
    vars: BTreeMap<String, VarMetric>,
    process: Mutex<BpftraceProcess>,
}

impl Exporter {
    /// Parse the variable definitions, then start the script and perform
    /// the startup handshake. Any failure here means the service never
    /// becomes ready.
    pub fn new(bpftrace_path: &str, script_path: &str, var_defs: &str) -> Result<Self> {
        let script = registry::script_identifier(script_path);
        let descriptors = registry::parse_var_defs(var_defs)?;

        let probes_desc = Desc::new(
            registry::probes_metric_name(&script),
            "number of attached probes".to_string(),
            vec![],
            HashMap::new(),
        )
        .map_err(|e| BtscrapeError::Config(e.to_string()))?;

        let mut vars = BTreeMap::new();
        for (name, descriptor) in descriptors {
            let labels = match descriptor.cardinality {
                Cardinality::Keyed => vec![KEY_LABEL.to_string()],
                Cardinality::Scalar => vec![],
            };
            let desc = Desc::new(
                descriptor.metric_name(&script),
                descriptor.help(),
                labels,
                HashMap::new(),
            )
            .map_err(|e| BtscrapeError::Config(e.to_string()))?;
            vars.insert(name, VarMetric { descriptor, desc });
        }

        let process = BpftraceProcess::start(bpftrace_path, script_path)?;
        Ok(Self {
            probes_desc,
            vars,
            process: Mutex::new(process),
        })
    }

    /// Probe count reported by the running script.
    pub fn probe_count(&self) -> u64 {
        self.lock_process().probe_count()
    }

    /// Run one scrape and return `(variable name, sample)` pairs.
    ///
    /// An incomplete dump (stream ended before every variable was seen) is
    /// not an error: whatever was observed is still returned.
    pub fn scrape(&self) -> Vec<(String, Sample)> {
        let process = self.lock_process();
        self.scrape_on(&process)
    }

    /// Send the termination signal to the script.
    pub fn stop(&self) -> Result<()> {
        self.lock_process().terminate()
    }

    fn lock_process(&self) -> MutexGuard<'_, BpftraceProcess> {
        match self.process.lock() {
            Ok(process) => process,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn scrape_on(&self, process: &BpftraceProcess) -> Vec<(String, Sample)> {
        let mut samples = Vec::new();
        if let Err(e) = process.request_dump() {
            warn!(error = %e, "cannot request variable dump");
            return samples;
        }

        // One session: track which variables this dump has not yet shown.
        let mut remaining: HashSet<&str> = self.vars.keys().map(String::as_str).collect();
        while !remaining.is_empty() {
            let Some(line) = process.next_line() else {
                info!(missing = remaining.len(), "output stream ended mid-scrape");
                break;
            };
            let record = match decode_line(&line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(%line, error = %e, "cannot decode bpftrace output");
                    continue;
                }
            };
            match record {
                OutputRecord::Printf(data) => info!(output = data.get(), "bpftrace output"),
                OutputRecord::MapDump(data) | OutputRecord::HistDump(data) => {
                    self.consume_dump(data, &mut remaining, &mut samples);
                }
                OutputRecord::AttachedProbes { probes } => {
                    warn!(probes, "unexpected attach record mid-scrape");
                }
                OutputRecord::Unknown { kind } => warn!(%kind, "unknown output type"),
            }
        }
        samples
    }

    fn consume_dump<'a>(
        &'a self,
        data: VarData,
        remaining: &mut HashSet<&'a str>,
        samples: &mut Vec<(String, Sample)>,
    ) {
        for (raw_name, value) in &data {
            let Some(name) = strip_sigil(raw_name) else {
                continue;
            };
            let Some((name, metric)) = self.vars.get_key_value(name) else {
                continue;
            };
            for sample in translate(&metric.descriptor, value) {
                samples.push((name.clone(), sample));
            }
            remaining.remove(name.as_str());
        }
    }
}

impl Collector for Exporter {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = vec![&self.probes_desc];
        descs.extend(self.vars.values().map(|m| &m.desc));
        descs
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let process = self.lock_process();

        let mut families = Vec::with_capacity(self.vars.len() + 1);
        // The probe gauge is emitted unconditionally, even if the dump
        // below fails or comes back incomplete.
        families.push(build_family(
            &self.probes_desc,
            &[Sample {
                key: None,
                value: SampleValue::Gauge(process.probe_count() as f64),
            }],
        ));

        let mut by_var: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
        for (name, sample) in self.scrape_on(&process) {
            by_var.entry(name).or_default().push(sample);
        }
        for (name, samples) in by_var {
            if let Some(metric) = self.vars.get(&name) {
                families.push(build_family(&metric.desc, &samples));
            }
        }
        families
    }
}

/// Shared handle to an [`Exporter`], registrable with a Prometheus registry.
///
/// `Registry::register` takes ownership of its collector while the caller
/// still needs a handle for `stop()`; this newtype delegates to the shared
/// instance.
pub struct SharedExporter(pub Arc<Exporter>);

impl Collector for SharedExporter {
    fn desc(&self) -> Vec<&Desc> {
        self.0.desc()
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        self.0.collect()
    }
}

/// Build one const metric family from the samples of one variable.
fn build_family(desc: &Desc, samples: &[Sample]) -> proto::MetricFamily {
    let mut family = proto::MetricFamily::default();
    family.set_name(desc.fq_name.clone());
    family.set_help(desc.help.clone());

    let mut family_type = proto::MetricType::GAUGE;
    for sample in samples {
        let mut metric = proto::Metric::default();
        if let Some(key) = &sample.key {
            let mut label = proto::LabelPair::default();
            label.set_name(KEY_LABEL.to_string());
            label.set_value(key.clone());
            metric.mut_label().push(label);
        }
        match &sample.value {
            SampleValue::Gauge(v) => {
                let mut gauge = proto::Gauge::default();
                gauge.set_value(*v);
                metric.set_gauge(gauge);
                family_type = proto::MetricType::GAUGE;
            }
            SampleValue::Counter(v) => {
                let mut counter = proto::Counter::default();
                counter.set_value(*v);
                metric.set_counter(counter);
                family_type = proto::MetricType::COUNTER;
            }
            SampleValue::Histogram(h) => {
                let mut hist = proto::Histogram::default();
                hist.set_sample_count(h.sample_count);
                for (bound, cumulative) in &h.buckets {
                    let mut bucket = proto::Bucket::default();
                    bucket.set_upper_bound(*bound);
                    bucket.set_cumulative_count(*cumulative);
                    hist.mut_bucket().push(bucket);
                }
                metric.set_histogram(hist);
                family_type = proto::MetricType::HISTOGRAM;
            }
        }
        family.mut_metric().push(metric);
    }
    family.set_field_type(family_type);
    family
}
