//! Span workers.
//!
//! A worker owns one [`FileSpan`]: it opens its own read-only handle, seeks to the
//! span start, reads exactly `span.len()` bytes, splits them into records on `\n`,
//! and counts extracted keys into a private [`FrequencyMap`]. Workers share only
//! the immutable [`Extractor`], so they need no synchronization among themselves.
//!
//! In tabular mode the span that starts at byte 0 skips its first line, which is
//! the header already parsed by the coordinator.

use crate::config::Mode;
use crate::error::{AnalyzeError, Result};
use crate::extract::{Category, Extractor, Outcome, Record, trim_line_end};
use crate::frequency::{FrequencyMap, Merge};
use crate::planner::FileSpan;
use csv::ByteRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

/// Record-level counters of one span (or, after merging, of a run).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Non-blank records read, header excluded.
    pub records_seen: u64,
    /// Records that yielded an indicator.
    pub matched: u64,
    /// Tabular rows skipped as malformed.
    pub malformed: u64,
    pub by_category: BTreeMap<Category, u64>,
}

impl Tally {
    fn record(&mut self, outcome: &Outcome) {
        self.records_seen += 1;
        match outcome {
            Outcome::Matched(ind) => {
                self.matched += 1;
                *self.by_category.entry(ind.category()).or_insert(0) += 1;
            }
            Outcome::Miss => {}
            Outcome::Malformed => self.malformed += 1,
        }
    }
}

impl Merge for Tally {
    fn merge(&mut self, other: Self) {
        self.records_seen += other.records_seen;
        self.matched += other.matched;
        self.malformed += other.malformed;
        for (cat, n) in other.by_category {
            *self.by_category.entry(cat).or_insert(0) += n;
        }
    }
}

/// What a worker hands to the coordinator at the barrier.
#[derive(Debug, Clone)]
pub struct WorkerOutput {
    pub worker_id: usize,
    pub span: FileSpan,
    pub counts: FrequencyMap,
    pub tally: Tally,
    pub elapsed: Duration,
}

/// One unit of parallel work.
#[derive(Debug, Clone, Copy)]
pub struct Worker<'a> {
    pub id: usize,
    pub span: FileSpan,
    source: &'a Path,
    extractor: &'a Extractor,
    buffer_bytes: usize,
}

impl<'a> Worker<'a> {
    #[must_use]
    pub fn new(id: usize, span: FileSpan, source: &'a Path, extractor: &'a Extractor) -> Self {
        Self {
            id,
            span,
            source,
            extractor,
            buffer_bytes: crate::config::DEFAULT_READ_BUFFER_BYTES,
        }
    }

    #[must_use]
    pub fn with_buffer_bytes(mut self, bytes: usize) -> Self {
        self.buffer_bytes = bytes.max(1);
        self
    }

    /// Read and aggregate the span.
    ///
    /// # Errors
    /// [`AnalyzeError::SpanUnreadable`] if the file cannot be opened or the span
    /// cannot be read in full (for example because the file was truncated).
    pub fn run(&self) -> Result<WorkerOutput> {
        let started = Instant::now();
        let (counts, tally) = if self.span.is_empty() {
            (FrequencyMap::new(), Tally::default())
        } else {
            let file = File::open(self.source).map_err(|e| self.span_error(e))?;
            aggregate_span(file, self.span, self.extractor, self.buffer_bytes)
                .map_err(|e| self.span_error(e))?
        };
        let elapsed = started.elapsed();
        debug!(
            worker = self.id,
            span = %self.span,
            records = tally.records_seen,
            matched = tally.matched,
            malformed = tally.malformed,
            keys = counts.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "span done"
        );
        Ok(WorkerOutput {
            worker_id: self.id,
            span: self.span,
            counts,
            tally,
            elapsed,
        })
    }

    fn span_error(&self, source: io::Error) -> AnalyzeError {
        AnalyzeError::SpanUnreadable {
            path: self.source.to_path_buf(),
            span: self.span,
            source,
        }
    }
}

/// Aggregate `span` of any seekable source.
///
/// # Errors
/// Propagates I/O failures; a source shorter than the span is
/// [`io::ErrorKind::UnexpectedEof`].
pub fn aggregate_span<R: Read + Seek>(
    mut source: R,
    span: FileSpan,
    extractor: &Extractor,
    buffer_bytes: usize,
) -> io::Result<(FrequencyMap, Tally)> {
    let mut counts = FrequencyMap::new();
    let mut tally = Tally::default();
    if span.is_empty() {
        return Ok((counts, tally));
    }
    source.seek(SeekFrom::Start(span.start_byte))?;
    let mut reader = BufReader::with_capacity(buffer_bytes.max(1), source).take(span.len());

    let mut buf = Vec::with_capacity(256);
    if extractor.mode() == Mode::TabularColumn && span.is_first() {
        reader.read_until(b'\n', &mut buf)?;
    }

    let row_parser = match extractor {
        Extractor::TabularColumn(_) => Some(RowParser::new(extractor)),
        Extractor::LogPattern(_) => None,
    };

    let mut line_index = 0u64;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = trim_line_end(&buf);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let outcome = match &row_parser {
            Some(parser) => parser.classify(line, line_index),
            None => {
                let raw = String::from_utf8_lossy(line);
                extractor.classify(&Record::Line {
                    raw: &raw,
                    line_index,
                })
            }
        };
        line_index += 1;
        tally.record(&outcome);
        if let Outcome::Matched(ind) = outcome {
            counts.increment(ind.into_key());
        }
    }

    if reader.limit() > 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("span ended {} bytes early", reader.limit()),
        ));
    }
    Ok((counts, tally))
}

/// Splits one line into fields with the header's delimiter.
struct RowParser<'a> {
    extractor: &'a Extractor,
    builder: csv::ReaderBuilder,
}

impl<'a> RowParser<'a> {
    fn new(extractor: &'a Extractor) -> Self {
        let delimiter = match extractor {
            Extractor::TabularColumn(x) => x.delimiter(),
            Extractor::LogPattern(_) => b',',
        };
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .buffer_capacity(1024);
        Self { extractor, builder }
    }

    fn classify(&self, line: &[u8], line_index: u64) -> Outcome {
        let mut rdr = self.builder.from_reader(line);
        let mut fields = ByteRecord::new();
        match rdr.read_byte_record(&mut fields) {
            Ok(true) => self.extractor.classify(&Record::Row {
                fields: &fields,
                line_index,
            }),
            Ok(false) | Err(_) => Outcome::Malformed,
        }
    }
}
