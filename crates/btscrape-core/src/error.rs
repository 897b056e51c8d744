//! Shared error type across btscrape crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, BtscrapeError>;

/// Unified error type used by core and exporter.
#[derive(Debug, Error)]
pub enum BtscrapeError {
    /// Malformed variable definition string. Fatal at startup.
    #[error("invalid variable definition: {0}")]
    Config(String),
    /// bpftrace could not be started or never attached. Fatal at startup.
    #[error("failed to launch bpftrace: {0}")]
    Launch(String),
    /// Signal delivery to the subprocess failed. Aborts the in-flight
    /// scrape only; the process itself is assumed alive until the liveness
    /// watcher says otherwise.
    #[error("failed to signal bpftrace: {0}")]
    Signal(std::io::Error),
    /// Malformed JSON line or value. Always recovered: callers log the
    /// offending line and skip it.
    #[error("cannot decode bpftrace output: {0}")]
    Decode(#[from] serde_json::Error),
}
