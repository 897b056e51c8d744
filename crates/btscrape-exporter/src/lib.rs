//! btscrape exporter runtime.
//!
//! This crate wires the bpftrace subprocess, the scrape coordinator, and
//! the Prometheus collector binding into a service. It is consumed by the
//! binary (`main.rs`) and by integration tests.

pub mod exporter;
pub mod process;
pub mod server;
