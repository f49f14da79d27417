//! Render metrics
//!
//! Counters for how much work the engine and the refresh scheduler did.
//! Tests use them to check refresh locality; the CLI prints them on exit.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one render tree
#[derive(Debug, Default)]
pub struct RenderMetrics {
    /// Macro nodes executed, including nested ones and re-executions
    pub execution_count: AtomicU64,

    /// Macro nodes re-executed by a refresh
    pub reexecution_count: AtomicU64,

    /// Macro nodes that forwarded a refresh to their children
    pub forward_count: AtomicU64,

    /// Error nodes produced
    pub error_count: AtomicU64,

    /// Transclusions cut off by the recursion guard
    pub recursion_count: AtomicU64,
}

impl RenderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_execution(&self) {
        self.execution_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reexecution(&self) {
        self.reexecution_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forward(&self) {
        self.forward_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recursion(&self) {
        self.recursion_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.execution_count.store(0, Ordering::Relaxed);
        self.reexecution_count.store(0, Ordering::Relaxed);
        self.forward_count.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
        self.recursion_count.store(0, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions: self.execution_count.load(Ordering::Relaxed),
            reexecutions: self.reexecution_count.load(Ordering::Relaxed),
            forwards: self.forward_count.load(Ordering::Relaxed),
            errors: self.error_count.load(Ordering::Relaxed),
            recursions: self.recursion_count.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of render metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub executions: u64,
    pub reexecutions: u64,
    pub forwards: u64,
    pub errors: u64,
    pub recursions: u64,
}

impl MetricsSnapshot {
    /// Share of refresh visits that ended in a re-execution
    pub fn reexecution_rate(&self) -> f64 {
        let visits = self.reexecutions + self.forwards;
        if visits == 0 {
            0.0
        } else {
            self.reexecutions as f64 / visits as f64
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "  Executions: {} | Re-executions: {} | Forwards: {} | Re-execution Rate: {:.1}%",
            self.executions,
            self.reexecutions,
            self.forwards,
            self.reexecution_rate() * 100.0
        )?;
        writeln!(f, "  Errors: {} | Recursions: {}", self.errors, self.recursions)?;
        Ok(())
    }
}
