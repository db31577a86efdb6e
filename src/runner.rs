//! Run orchestration.
//!
//! A run goes through four steps, all driven from the calling (coordinating)
//! thread:
//!
//! 1. **Plan** -- validate the configuration, read the tabular header if needed,
//!    build the extractor, and plan line-aligned spans. Nothing has been
//!    extracted yet, so configuration errors surface here.
//! 2. **Extract** -- one [`Worker`] per span. In [`ExecMode::Parallel`] the workers
//!    run on a dedicated rayon pool of at most `worker_count` threads, one per
//!    non-empty span; empty spans resolve on the coordinator. Collecting their
//!    outputs is the single barrier. Any worker failure fails the run.
//! 3. **Reduce** -- merge the per-worker maps and tallies.
//! 4. **Report** -- rank and package the result.
//!
//! Both execution modes produce identical reports.

use crate::config::{AnalyzerConfig, Mode};
use crate::error::{AnalyzeError, Result};
use crate::extract::{Extractor, TabularHeader};
use crate::frequency::{FrequencyMap, reduce, reduce_tree};
use crate::metrics::{Phase, RunMetrics};
use crate::planner::{ChunkPlan, plan_file};
use crate::report::{Report, build};
use crate::worker::{Tally, Worker, WorkerOutput};
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecMode {
    /// Spans in order on the calling thread.
    Sequential,
    /// Spans on a fixed pool of up to `worker_count` threads.
    #[default]
    Parallel,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Runner {
    pub mode: ExecMode,
}

/// Analyze `path` with the default (parallel) runner.
///
/// # Errors
/// See [`Runner::run`].
pub fn analyze(path: impl AsRef<Path>, config: &AnalyzerConfig) -> Result<Report> {
    Runner::default().run(path, config)
}

impl Runner {
    #[must_use]
    pub const fn new(mode: ExecMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub const fn sequential() -> Self {
        Self::new(ExecMode::Sequential)
    }

    /// Run the whole pipeline and return the report.
    ///
    /// # Errors
    /// [`AnalyzeError::InvalidConfiguration`] / [`AnalyzeError::MalformedHeader`]
    /// before any worker starts; [`AnalyzeError::SourceUnreadable`] /
    /// [`AnalyzeError::SpanUnreadable`] if the source or any span cannot be read.
    pub fn run(&self, path: impl AsRef<Path>, config: &AnalyzerConfig) -> Result<Report> {
        self.run_with_metrics(path, config).map(|(report, _)| report)
    }

    /// Like [`run`](Self::run), also returning execution metrics.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub fn run_with_metrics(
        &self,
        path: impl AsRef<Path>,
        config: &AnalyzerConfig,
    ) -> Result<(Report, RunMetrics)> {
        let path = path.as_ref();
        let mut metrics = RunMetrics::new();
        info!(
            path = %path.display(),
            mode = %config.mode,
            workers = config.worker_count,
            exec = ?self.mode,
            "analysis started"
        );

        let started = Instant::now();
        let (plan, extractor) = prepare(path, config)?;
        metrics.record_phase(Phase::Plan, started.elapsed());
        metrics.increment("spans", plan.spans.len() as u64);
        metrics.increment("empty_spans", (plan.spans.len() - plan.non_empty_spans()) as u64);
        metrics.increment("bytes", plan.file_length);
        debug!(
            bytes = plan.file_length,
            spans = plan.spans.len(),
            non_empty = plan.non_empty_spans(),
            "plan ready"
        );

        // Spans past the last line hold no bytes; they never need a thread.
        let pool = match self.mode {
            ExecMode::Parallel => {
                let threads = plan.non_empty_spans().clamp(1, config.worker_count);
                metrics.increment("pool_threads", threads as u64);
                Some(
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(threads)
                        .thread_name(|i| format!("ironsift-worker-{i}"))
                        .build()
                        .map_err(|e| AnalyzeError::WorkerPool(e.to_string()))?,
                )
            }
            ExecMode::Sequential => None,
        };

        let started = Instant::now();
        let workers: Vec<Worker<'_>> = plan
            .spans
            .iter()
            .enumerate()
            .map(|(id, span)| {
                Worker::new(id, *span, path, &extractor).with_buffer_bytes(config.read_buffer_bytes)
            })
            .collect();
        let mut results: Vec<(usize, Result<WorkerOutput>)> = match &pool {
            Some(pool) => {
                let (busy, idle): (Vec<&Worker<'_>>, Vec<&Worker<'_>>) =
                    workers.iter().partition(|w| !w.span.is_empty());
                let mut done: Vec<_> =
                    pool.install(|| busy.par_iter().map(|w| (w.id, w.run())).collect());
                done.extend(idle.iter().map(|w| (w.id, w.run())));
                done
            }
            None => workers.iter().map(|w| (w.id, w.run())).collect(),
        };
        results.sort_unstable_by_key(|(id, _)| *id);
        let outputs = first_failure(results.into_iter().map(|(_, r)| r).collect())?;
        metrics.record_phase(Phase::Extract, started.elapsed());
        for out in &outputs {
            metrics.record_span(out);
        }

        let started = Instant::now();
        let (maps, tallies): (Vec<FrequencyMap>, Vec<Tally>) =
            outputs.into_iter().map(|o| (o.counts, o.tally)).unzip();
        let (counts, tally) = match &pool {
            Some(pool) => pool.install(|| (reduce_tree(maps), reduce_tree(tallies))),
            None => (reduce(maps), reduce(tallies)),
        };
        metrics.record_phase(Phase::Reduce, started.elapsed());
        metrics.increment("distinct_keys", counts.len() as u64);

        let started = Instant::now();
        let report = build(&counts, config.top_n, &tally, source_name(path));
        metrics.record_phase(Phase::Report, started.elapsed());

        info!(
            records = report.total_records_seen,
            matched = report.total_matched,
            malformed = report.malformed_rows,
            distinct = report.counts.len(),
            elapsed_ms = metrics.total().as_millis() as u64,
            "analysis finished"
        );
        Ok((report, metrics))
    }
}

/// Everything that must succeed before a worker may start.
fn prepare(path: &Path, config: &AnalyzerConfig) -> Result<(ChunkPlan, Extractor)> {
    config.validate()?;
    let header = match config.mode {
        Mode::TabularColumn => {
            let delimiter = config.delimiter.and_then(|c| u8::try_from(c).ok());
            Some(TabularHeader::read_from_file(path, delimiter)?)
        }
        Mode::LogPattern => None,
    };
    let extractor = Extractor::from_config(config, header.as_ref())?;
    let plan = plan_file(path, config.worker_count)?;
    Ok((plan, extractor))
}

/// All outputs in span order, or the error of the lowest failing span.
fn first_failure(results: Vec<Result<WorkerOutput>>) -> Result<Vec<WorkerOutput>> {
    let mut outputs = Vec::with_capacity(results.len());
    let mut failure = None;
    for result in results {
        match result {
            Ok(out) => outputs.push(out),
            Err(e) => {
                warn!(error = %e, "worker failed; aborting run");
                failure.get_or_insert(e);
            }
        }
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(outputs),
    }
}

fn source_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::FileSpan;
    use std::io;
    use std::path::PathBuf;
    use std::time::Duration;

    fn ok(id: usize, span: FileSpan) -> Result<WorkerOutput> {
        let mut counts = FrequencyMap::new();
        counts.increment("1.1.1.1");
        Ok(WorkerOutput {
            worker_id: id,
            span,
            counts,
            tally: Tally::default(),
            elapsed: Duration::ZERO,
        })
    }

    fn failed(span: FileSpan) -> Result<WorkerOutput> {
        Err(AnalyzeError::SpanUnreadable {
            path: PathBuf::from("auth.log"),
            span,
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "file shrank"),
        })
    }

    #[test]
    fn one_failed_span_fails_the_run() {
        let results = vec![
            ok(0, FileSpan::new(0, 10)),
            ok(1, FileSpan::new(10, 20)),
            failed(FileSpan::new(20, 30)),
            ok(3, FileSpan::new(30, 40)),
        ];
        let err = first_failure(results).unwrap_err();
        assert_eq!(err.failed_span(), Some(FileSpan::new(20, 30)));
    }

    #[test]
    fn lowest_failed_span_is_reported() {
        let results = vec![
            ok(0, FileSpan::new(0, 10)),
            failed(FileSpan::new(10, 20)),
            ok(2, FileSpan::new(20, 30)),
            failed(FileSpan::new(30, 40)),
        ];
        let err = first_failure(results).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SourceUnreadable);
        assert_eq!(err.failed_span(), Some(FileSpan::new(10, 20)));
    }

    #[test]
    fn all_ok_keeps_span_order() {
        let results = vec![ok(0, FileSpan::new(0, 5)), ok(1, FileSpan::new(5, 9))];
        let outputs = first_failure(results).unwrap();
        let ids: Vec<_> = outputs.iter().map(|o| o.worker_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }
}
