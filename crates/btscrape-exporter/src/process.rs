//! bpftrace subprocess supervision.
//!
//! The child is spawned with `-f json` so every stdout line is one JSON
//! record; stderr is inherited for diagnostics. A reader thread forwards
//! stdout lines over a channel (channel close = end of stream), and a
//! watcher thread owns the `Child` and reacts to process exit. The exported
//! variable semantics are tied to the specific running script instance, so
//! an exit that was not requested is terminal for the whole service: no
//! restart, no backoff.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use btscrape_core::record::{decode_line, OutputRecord};
use btscrape_core::{BtscrapeError, Result};

/// How long to wait for the `attached_probes` handshake before giving up.
/// A script that compiles but never attaches would otherwise hang startup
/// forever.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A running bpftrace instance after a successful startup handshake.
pub struct BpftraceProcess {
    pid: i32,
    probes: u64,
    lines: Receiver<String>,
    shutdown_requested: Arc<AtomicBool>,
}

impl BpftraceProcess {
    /// Spawn `<bpftrace> -f json <script>` and wait for it to attach.
    pub fn start(bpftrace_path: &str, script_path: &str) -> Result<Self> {
        info!(bpftrace = bpftrace_path, script = script_path, "starting bpftrace");
        let mut child = Command::new(bpftrace_path)
            .arg("-f")
            .arg("json")
            .arg(script_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| BtscrapeError::Launch(format!("cannot spawn {bpftrace_path}: {e}")))?;

        let pid = child.id() as i32;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BtscrapeError::Launch("bpftrace stdout was not captured".into()))?;

        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            // Supervisor is gone; stop forwarding.
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "error reading bpftrace stdout");
                        break;
                    }
                }
            }
            // Dropping the sender closes the stream for the consumer.
        });

        let shutdown_requested = Arc::new(AtomicBool::new(false));
        let attached = Arc::new(AtomicBool::new(false));
        {
            let shutdown_requested = Arc::clone(&shutdown_requested);
            let attached = Arc::clone(&attached);
            thread::spawn(move || watch_exit(child, shutdown_requested, attached));
        }

        let probes = handshake(&lines)?;
        attached.store(true, Ordering::SeqCst);
        info!(probes, "bpftrace started successfully");

        Ok(Self {
            pid,
            probes,
            lines,
            shutdown_requested,
        })
    }

    /// Blocking read of the next stdout line; `None` once the subprocess
    /// closed its pipe. The read cursor persists across scrapes.
    pub fn next_line(&self) -> Option<String> {
        self.lines.recv().ok()
    }

    /// Probe count reported in the startup handshake.
    pub fn probe_count(&self) -> u64 {
        self.probes
    }

    /// Ask bpftrace to dump its current variable state (SIGUSR1).
    pub fn request_dump(&self) -> Result<()> {
        self.signal(libc::SIGUSR1)
    }

    /// Ask bpftrace to exit gracefully (SIGINT). Marks the shutdown as
    /// requested so the liveness watcher treats the exit as clean.
    pub fn terminate(&self) -> Result<()> {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.signal(libc::SIGINT)
    }

    fn signal(&self, sig: libc::c_int) -> Result<()> {
        // SAFETY: plain kill(2) on the pid we spawned.
        let rc = unsafe { libc::kill(self.pid, sig) };
        if rc == 0 {
            Ok(())
        } else {
            Err(BtscrapeError::Signal(std::io::Error::last_os_error()))
        }
    }
}

/// Drain startup output until the `attached_probes` record arrives. Other
/// records before the handshake (early printf, warnings) are logged and
/// skipped.
fn handshake(lines: &Receiver<String>) -> Result<u64> {
    let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
    loop {
        let remaining = match deadline.checked_duration_since(Instant::now()) {
            Some(remaining) => remaining,
            None => {
                return Err(BtscrapeError::Launch(
                    "timed out waiting for bpftrace to attach".into(),
                ))
            }
        };
        let line = match lines.recv_timeout(remaining) {
            Ok(line) => line,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(BtscrapeError::Launch(
                    "timed out waiting for bpftrace to attach".into(),
                ))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(BtscrapeError::Launch(
                    "bpftrace closed its output before attaching".into(),
                ))
            }
        };
        match decode_line(&line) {
            Ok(OutputRecord::AttachedProbes { probes }) => return Ok(probes),
            Ok(record) => warn!(?record, "output before attach"),
            Err(e) => warn!(%line, error = %e, "cannot decode bpftrace output"),
        }
    }
}

/// Liveness watch. `Running -> Exited` is terminal: a clean exit after a
/// termination request is logged, and an exit before the handshake is the
/// handshake's launch error to report; anything else takes the service down.
fn watch_exit(mut child: Child, shutdown_requested: Arc<AtomicBool>, attached: Arc<AtomicBool>) {
    match child.wait() {
        Ok(status) if shutdown_requested.load(Ordering::SeqCst) => {
            info!(%status, "bpftrace exited after termination request");
        }
        Ok(status) if !attached.load(Ordering::SeqCst) => {
            warn!(%status, "bpftrace exited before attaching");
        }
        Ok(status) => {
            error!(%status, "bpftrace exited unexpectedly, shutting down");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "cannot wait on bpftrace, shutting down");
            std::process::exit(1);
        }
    }
}
