//! btscraped: export bpftrace variables as Prometheus metrics.
//!
//! Runs one long-lived bpftrace script, asks it to dump its variable state
//! on every scrape (SIGUSR1), and serves the result on `/metrics`.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use prometheus::Registry;
use tracing_subscriber::{fmt, EnvFilter};

use btscrape_exporter::exporter::{Exporter, SharedExporter};
use btscrape_exporter::server;

#[derive(Parser, Debug)]
#[command(name = "btscraped", about = "bpftrace metrics exporter")]
struct Args {
    /// The address to listen on for HTTP requests.
    #[arg(long, default_value = "0.0.0.0:9928")]
    listen_address: SocketAddr,

    /// Path to the bpftrace executable.
    #[arg(long, default_value = "bpftrace")]
    bpftrace: String,

    /// Path to the bpftrace script.
    #[arg(long)]
    script: String,

    /// bpftrace variables to export, e.g. "bytes,reads:counter,usecs:hist".
    #[arg(long, default_value = "")]
    vars: String,
}

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let exporter = match Exporter::new(&args.bpftrace, &args.script, &args.vars) {
        Ok(exporter) => Arc::new(exporter),
        Err(e) => {
            tracing::error!(error = %e, "cannot create exporter");
            std::process::exit(1);
        }
    };

    let registry = Registry::new();
    registry
        .register(Box::new(SharedExporter(Arc::clone(&exporter))))
        .expect("collector registration failed");

    let app = server::build_router(registry);
    tracing::info!(listen = %args.listen_address, "btscraped starting");
    let listener = tokio::net::TcpListener::bind(args.listen_address)
        .await
        .expect("failed to bind");

    let shutdown = {
        let exporter = Arc::clone(&exporter);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down");
                if let Err(e) = exporter.stop() {
                    tracing::warn!(error = %e, "cannot stop bpftrace");
                }
            }
        }
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("server failed");
}
