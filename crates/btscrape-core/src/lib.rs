//! btscrape core: the bpftrace output-line grammar, the variable registry,
//! and the value-to-metric translation.
//!
//! This crate is host-agnostic: it knows nothing about subprocesses,
//! Prometheus, or HTTP. The exporter crate feeds it raw output lines and
//! consumes the samples it produces.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! bpftrace output is external input; every malformed line must surface as
//! `BtscrapeError`/`Result` instead of crashing the exporter.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod record;
pub mod registry;
pub mod translate;

/// Shared result type.
pub use error::{BtscrapeError, Result};
