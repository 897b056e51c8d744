//! Top-level facade crate for btscrape.
//!
//! Re-exports the core types and the exporter runtime so users can depend
//! on a single crate.

pub mod core {
    pub use btscrape_core::*;
}

pub mod exporter {
    pub use btscrape_exporter::*;
}
