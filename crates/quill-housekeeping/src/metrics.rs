//! Metrics collection for housekeeping sweeps

use crate::{SweepKind, SweepOutcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters for one sweep kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepMetrics {
    /// Successful iterations
    pub sweeps: usize,

    /// Failed iterations (lock, store or action errors)
    pub failures: usize,

    /// Candidates collected across successful iterations
    pub candidates: usize,

    /// Records the action changed across successful iterations
    pub affected: usize,

    /// Times the cursor wrapped back to the start of the project cycle
    pub cursor_resets: usize,

    /// Time spent in successful iterations
    pub total_runtime: Duration,
}

/// Metrics for all sweep kinds
#[derive(Debug, Clone, Default)]
pub struct HousekeepingMetrics {
    /// Counters per sweep kind
    pub per_kind: HashMap<SweepKind, SweepMetrics>,
}

impl HousekeepingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for `kind` (zeroed if it never ran)
    pub fn get(&self, kind: SweepKind) -> SweepMetrics {
        self.per_kind.get(&kind).cloned().unwrap_or_default()
    }

    /// Record a successful sweep
    pub fn record_success(&mut self, outcome: &SweepOutcome) {
        let entry = self.per_kind.entry(outcome.kind).or_default();
        entry.sweeps += 1;
        entry.candidates += outcome.candidates;
        entry.affected += outcome.affected;
        entry.total_runtime += outcome.elapsed;
        if outcome.next_cursor.is_start() {
            entry.cursor_resets += 1;
        }
    }

    /// Record a failed sweep
    pub fn record_failure(&mut self, kind: SweepKind) {
        self.per_kind.entry(kind).or_default().failures += 1;
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Housekeeping Metrics Summary".to_string(),
            "============================".to_string(),
        ];

        for kind in SweepKind::ALL {
            let m = self.get(kind);
            lines.push(format!("{}:", kind));
            lines.push(format!("  Sweeps: {} ({} failed)", m.sweeps, m.failures));
            lines.push(format!("  Candidates: {}", m.candidates));
            lines.push(format!("  {}: {}", capitalize(kind.verb()), m.affected));
            lines.push(format!("  Cycles completed: {}", m.cursor_resets));
            lines.push(format!("  Total runtime: {:?}", m.total_runtime));
        }

        lines.join("\n")
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Metrics shared between the scheduler loops and the [`crate::Housekeeping`] handle
#[derive(Debug, Clone, Default)]
pub struct SharedMetrics(Arc<Mutex<HousekeepingMetrics>>);

impl SharedMetrics {
    /// Create new empty shared metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful sweep
    pub fn record_success(&self, outcome: &SweepOutcome) {
        if let Ok(mut metrics) = self.0.lock() {
            metrics.record_success(outcome);
        }
    }

    /// Record a failed sweep
    pub fn record_failure(&self, kind: SweepKind) {
        if let Ok(mut metrics) = self.0.lock() {
            metrics.record_failure(kind);
        }
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> HousekeepingMetrics {
        self.0
            .lock()
            .map(|metrics| metrics.clone())
            .unwrap_or_default()
    }
}
