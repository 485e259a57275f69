//! Index-build progress reporting.
//!
//! Reports observable progress during `brh index` so users see how many
//! chunks are embedded, which ones failed, and when the failure count gets
//! worrying. Progress is emitted on **stderr** so stdout remains parseable
//! for scripts.
//!
//! Every reporter implements the core [`BuildObserver`] port. Failures are
//! also forwarded to `tracing`.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bugreport_harness_core::observer::BuildObserver;
use bugreport_harness_core::CoreError;

/// Human-friendly progress on stderr: "index  embedding  1,234 / 5,000 chunks".
pub struct StderrProgress;

impl BuildObserver for StderrProgress {
    fn chunk_done(&self, done: usize, total: usize) {
        let line = format!(
            "index  embedding  {} / {} chunks\n",
            format_number(done as u64),
            format_number(total as u64)
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }

    fn chunk_failed(&self, chunk_id: u64, error: &CoreError) {
        tracing::warn!(chunk_id, error = %error, "chunk produced no embedding");
        let line = format!("index  chunk {} failed: {}\n", chunk_id, error);
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }

    fn failure_threshold_exceeded(&self, failed: usize, threshold: usize) {
        tracing::warn!(failed, threshold, "failed chunk count exceeds threshold");
        let line = format!(
            "index  warning: {} chunks failed (threshold {}); the index will be degraded\n",
            format_number(failed as u64),
            format_number(threshold as u64)
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn emit(obj: serde_json::Value) {
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

impl BuildObserver for JsonProgress {
    fn chunk_done(&self, done: usize, total: usize) {
        Self::emit(serde_json::json!({
            "event": "progress",
            "phase": "embedding",
            "n": done,
            "total": total
        }));
    }

    fn chunk_failed(&self, chunk_id: u64, error: &CoreError) {
        tracing::warn!(chunk_id, error = %error, "chunk produced no embedding");
        Self::emit(serde_json::json!({
            "event": "chunk_failed",
            "chunk_id": chunk_id,
            "error": error.to_string()
        }));
    }

    fn failure_threshold_exceeded(&self, failed: usize, threshold: usize) {
        tracing::warn!(failed, threshold, "failed chunk count exceeds threshold");
        Self::emit(serde_json::json!({
            "event": "failure_threshold_exceeded",
            "failed": failed,
            "threshold": threshold
        }));
    }
}

/// No-op reporter when progress is disabled. Failures still reach `tracing`.
pub struct NoProgress;

impl BuildObserver for NoProgress {
    fn chunk_failed(&self, chunk_id: u64, error: &CoreError) {
        tracing::warn!(chunk_id, error = %error, "chunk produced no embedding");
    }

    fn failure_threshold_exceeded(&self, failed: usize, threshold: usize) {
        tracing::warn!(failed, threshold, "failed chunk count exceeds threshold");
    }
}

/// Adds a cancellation flag to any observer.
///
/// The flag is shared, so a Ctrl-C handler can hold a clone of
/// [`Cancellable::flag`] and flip it while the build runs.
pub struct Cancellable<O> {
    inner: O,
    cancelled: Arc<AtomicBool>,
}

impl<O: BuildObserver> Cancellable<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl<O: BuildObserver> BuildObserver for Cancellable<O> {
    fn chunk_done(&self, done: usize, total: usize) {
        self.inner.chunk_done(done, total);
    }

    fn chunk_failed(&self, chunk_id: u64, error: &CoreError) {
        self.inner.chunk_failed(chunk_id, error);
    }

    fn failure_threshold_exceeded(&self, failed: usize, threshold: usize) {
        self.inner.failure_threshold_exceeded(failed, threshold);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.inner.is_cancelled()
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a cancellable reporter for this mode.
    pub fn reporter(&self) -> Cancellable<Box<dyn BuildObserver>> {
        let inner: Box<dyn BuildObserver> = match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        };
        Cancellable::new(inner)
    }
}
