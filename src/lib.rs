//! # Ironsift
//!
//! Parallel **indicator frequency analysis** for large line-oriented files: auth
//! logs, web server logs, network-flow CSVs. Ironsift pulls one indicator (an IP
//! address, say) out of each line or row, counts them, and returns a ranked
//! report, without ever holding the whole file in memory.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ironsift::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = AnalyzerConfig::log_pattern().with_workers(4).with_top_n(5);
//! let report = analyze("/var/log/auth.log", &config)?;
//!
//! for entry in &report.top_n {
//!     println!("{:>3}. {:<15} {}", entry.rank, entry.key, entry.count);
//! }
//! report.write_json("results/analysis_result.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! 1. The [`planner`] splits the file into `worker_count` byte spans and snaps
//!    their boundaries to line starts.
//! 2. Each [`Worker`] reads only its span and feeds records to the shared,
//!    stateless [`Extractor`], counting hits in a private [`FrequencyMap`].
//! 3. After all workers finish, the maps are merged with [`reduce`] /
//!    [`reduce_tree`] (a key-wise sum, so merge order never matters).
//! 4. The [`report`] module ranks the merged map (count descending, key
//!    ascending) and packages the top entries with run totals.
//!
//! The report depends only on the file and the configuration: changing the
//! worker count or execution mode changes speed, never counts.
//!
//! ## Modes
//!
//! - [`Mode::LogPattern`] -- scan each text line with a configurable IP pattern;
//!   lines containing the failure phrase are classified as
//!   [`Category::FailedAuth`].
//! - [`Mode::TabularColumn`] -- parse delimited rows against the header in row 0
//!   and read the key from a named column; an optional label column marks
//!   attacks as [`Category::Attack`].
//!
//! ## Module Overview
//!
//! - [`config`] - Recognized options, defaults, JSON loading, validation
//! - [`planner`] - Byte-span planning and line snapping
//! - [`extract`] - Log-pattern and tabular-column extractors
//! - [`worker`] - Per-span reading and local aggregation
//! - [`frequency`] - Frequency maps and the reducer
//! - [`report`] - Ranking and JSON persistence
//! - [`runner`] - Sequential and parallel execution
//! - [`metrics`] - Phase and span timings
//! - [`testing`] - Fixtures and assertions for tests

pub mod config;
pub mod error;
pub mod extract;
pub mod frequency;
pub mod metrics;
pub mod planner;
pub mod report;
pub mod runner;
pub mod testing;
pub mod worker;

pub use config::{AnalyzerConfig, Mode};
pub use error::{AnalyzeError, ErrorKind, Result};
pub use extract::{Category, Extractor, Indicator, Outcome, Record, TabularHeader};
pub use frequency::{FrequencyMap, Merge, reduce, reduce_tree};
pub use metrics::RunMetrics;
pub use planner::{ChunkPlan, FileSpan, plan, plan_file};
pub use report::{RankedEntry, Report};
pub use runner::{ExecMode, Runner, analyze};
pub use worker::{Tally, Worker, WorkerOutput};
