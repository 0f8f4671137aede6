//! Statistics for static sources and the path manager

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Live counters of one supervised source
///
/// Written by the supervisor loop, read from anywhere.
#[derive(Debug, Default)]
pub struct SourceStats {
    runs: AtomicU64,
    failures: AtomicU64,
    ready: AtomicU64,
    not_ready: AtomicU64,
    last_error: Mutex<Option<String>>,
    last_run_at: Mutex<Option<Instant>>,
}

impl SourceStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// A new execution was launched
    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        *self
            .last_run_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    /// An execution ended in error (or could not be launched)
    pub fn record_failure(&self, err: &impl std::fmt::Display) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
    }

    /// A readiness announcement was forwarded
    pub fn record_ready(&self) {
        self.ready.fetch_add(1, Ordering::Relaxed);
    }

    /// A loss-of-media notification was forwarded
    pub fn record_not_ready(&self) {
        self.not_ready.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of launched executions
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Number of failed executions
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> SourceStatsSnapshot {
        let last_run_at = *self
            .last_run_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        SourceStatsSnapshot {
            runs: self.runs(),
            failures: self.failures(),
            ready_transitions: self.ready.load(Ordering::Relaxed),
            not_ready_transitions: self.not_ready.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            since_last_run: last_run_at.map(|t| t.elapsed()),
        }
    }
}

/// Copy of [`SourceStats`] suitable for reporting
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatsSnapshot {
    /// Executions launched
    pub runs: u64,
    /// Executions that failed
    pub failures: u64,
    /// Readiness announcements forwarded
    pub ready_transitions: u64,
    /// Loss-of-media notifications forwarded
    pub not_ready_transitions: u64,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// Time since the most recent launch
    #[serde(skip)]
    pub since_last_run: Option<Duration>,
}

/// Path manager totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStats {
    /// Paths currently active
    pub active_paths: usize,
    /// Active paths whose source is ready
    pub ready_paths: usize,
    /// Active paths driven by a static source
    pub static_sources: usize,
}
