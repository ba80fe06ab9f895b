//! JSON-lines scan progress on stderr
//!
//! Every line carries a `_t` tag, a sequence number `seq` and `ts`, the
//! milliseconds since the reporter was created. `p` lines are throttled; the
//! others are written whenever the reporter is enabled.

use serde::Serialize;
use serde_json::{Map, Value};
use std::cell::Cell;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::error::CatalogError;
use crate::models::{ScanProgress, ScanStats};

/// Which half of a directory visit just finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    /// Child directories reconciled
    Structure,
    /// Tracks and covers reconciled
    Content,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "_t")]
pub enum ProgressEvent {
    #[serde(rename = "start")]
    Start { dir_id: i64, path: String },
    #[serde(rename = "p")]
    Progress {
        phase: ScanPhase,
        #[serde(rename = "d")]
        dirs: u64,
        #[serde(rename = "t")]
        tracks: u64,
        #[serde(rename = "c")]
        covers: u64,
        dir: String,
        ms: u64,
    },
    #[serde(rename = "err")]
    Error {
        kind: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    #[serde(rename = "done")]
    Done(ScanStats),
}

impl ProgressEvent {
    pub fn progress(phase: ScanPhase, progress: &ScanProgress) -> Self {
        ProgressEvent::Progress {
            phase,
            dirs: progress.scanned_dirs,
            tracks: progress.track_count,
            covers: progress.cover_count,
            dir: progress.current_dir.clone(),
            ms: progress.elapsed_ms,
        }
    }

    pub fn error(err: &CatalogError) -> Self {
        ProgressEvent::Error {
            kind: format!("{:?}", err.kind),
            message: err.message.clone(),
            path: err.path.as_ref().map(|p| p.to_string_lossy().to_string()),
        }
    }
}

/// Writes [`ProgressEvent`]s to stderr while a scan runs
pub struct ProgressReporter {
    enabled: bool,
    interval_ms: u64,
    last_report: Cell<Instant>,
    seq: AtomicU64,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            interval_ms,
            last_report: Cell::new(now),
            seq: AtomicU64::new(0),
            start_time: now,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True once `interval_ms` has passed since the last `p` line
    pub fn should_report(&self) -> bool {
        self.enabled && self.last_report.get().elapsed().as_millis() as u64 >= self.interval_ms
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Stamp an event with the next sequence number and the current time
    pub fn line(&self, event: &ProgressEvent) -> Value {
        let mut line = match serde_json::to_value(event) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        line.insert("seq".to_string(), self.next_seq().into());
        line.insert(
            "ts".to_string(),
            (self.start_time.elapsed().as_millis() as u64).into(),
        );
        Value::Object(line)
    }

    fn emit(&self, event: &ProgressEvent) {
        if !self.enabled {
            return;
        }
        let line = self.line(event);
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{}", line).ok();
        stderr.flush().ok();
    }

    pub fn report_start(&self, dir_id: i64, path: &Path) {
        self.emit(&ProgressEvent::Start {
            dir_id,
            path: path.to_string_lossy().to_string(),
        });
    }

    /// Returns whether a line was written
    pub fn report_progress(&self, phase: ScanPhase, progress: &ScanProgress) -> bool {
        if !self.should_report() {
            return false;
        }
        self.emit(&ProgressEvent::progress(phase, progress));
        self.last_report.set(Instant::now());
        true
    }

    pub fn report_error(&self, err: &CatalogError) {
        self.emit(&ProgressEvent::error(err));
    }

    pub fn report_done(&self, stats: &ScanStats) {
        self.emit(&ProgressEvent::Done(stats.clone()));
    }
}
