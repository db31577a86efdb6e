//! Execution metrics for one analysis run.
//!
//! The runner fills a [`RunMetrics`] as it goes: wall time per [`Phase`], one
//! [`SpanTiming`] per worker, and a handful of named counters. Metrics can be
//! logged, turned into JSON, or saved next to the report.
//!
//! ```no_run
//! use ironsift::{AnalyzerConfig, Runner};
//!
//! # fn main() -> anyhow::Result<()> {
//! let (report, metrics) = Runner::default().run_with_metrics("auth.log", &AnalyzerConfig::default())?;
//! metrics.log_summary();
//! metrics.save_to_file("metrics.json")?;
//! # Ok(())
//! # }
//! ```

use crate::planner::FileSpan;
use crate::worker::WorkerOutput;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Coordinator-side stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Plan,
    Extract,
    Reduce,
    Report,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Extract => "extract",
            Self::Reduce => "reduce",
            Self::Report => "report",
        }
    }
}

/// How long one worker spent on its span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanTiming {
    pub worker_id: usize,
    pub span: FileSpan,
    pub bytes: u64,
    pub records: u64,
    pub matched: u64,
    pub elapsed_ms: f64,
}

/// Summary of the per-span durations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DurationStats {
    pub count: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    phases: BTreeMap<Phase, Duration>,
    spans: Vec<SpanTiming>,
    counters: BTreeMap<String, u64>,
}

impl RunMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `elapsed` to `phase`.
    pub fn record_phase(&mut self, phase: Phase, elapsed: Duration) {
        *self.phases.entry(phase).or_default() += elapsed;
    }

    pub fn record_span(&mut self, out: &WorkerOutput) {
        self.spans.push(SpanTiming {
            worker_id: out.worker_id,
            span: out.span,
            bytes: out.span.len(),
            records: out.tally.records_seen,
            matched: out.tally.matched,
            elapsed_ms: out.elapsed.as_secs_f64() * 1000.0,
        });
    }

    pub fn increment(&mut self, name: &str, by: u64) {
        *self.counters.entry(name.to_string()).or_insert(0) += by;
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn phase(&self, phase: Phase) -> Option<Duration> {
        self.phases.get(&phase).copied()
    }

    /// Sum of all recorded phases.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.phases.values().sum()
    }

    #[must_use]
    pub fn spans(&self) -> &[SpanTiming] {
        &self.spans
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn span_stats(&self) -> DurationStats {
        if self.spans.is_empty() {
            return DurationStats::default();
        }
        let mut ms: Vec<f64> = self.spans.iter().map(|s| s.elapsed_ms).collect();
        ms.sort_by(f64::total_cmp);
        let count = ms.len();
        DurationStats {
            count,
            mean_ms: ms.iter().sum::<f64>() / count as f64,
            min_ms: ms[0],
            max_ms: ms[count - 1],
            p50_ms: ms[count / 2],
            p95_ms: ms[((count * 95) / 100).min(count - 1)],
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let phases: serde_json::Map<String, Value> = self
            .phases
            .iter()
            .map(|(p, d)| (format!("{}_ms", p.as_str()), json!(d.as_secs_f64() * 1000.0)))
            .collect();
        json!({
            "total_ms": self.total().as_secs_f64() * 1000.0,
            "phases": phases,
            "counters": self.counters,
            "span_stats": self.span_stats(),
            "spans": self.spans,
        })
    }

    /// Emit a one-line summary at `info` level.
    pub fn log_summary(&self) {
        let stats = self.span_stats();
        info!(
            total_ms = self.total().as_millis() as u64,
            plan_ms = self.phase(Phase::Plan).unwrap_or_default().as_millis() as u64,
            extract_ms = self.phase(Phase::Extract).unwrap_or_default().as_millis() as u64,
            reduce_ms = self.phase(Phase::Reduce).unwrap_or_default().as_millis() as u64,
            spans = stats.count,
            slowest_span_ms = stats.max_ms,
            "run metrics"
        );
    }

    /// Save [`to_json`](Self::to_json) to `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }
}
