//! Chunk planner.
//!
//! Planning happens once per run, on the coordinating thread, in two passes:
//!
//! 1. [`plan`] cuts `[0, file_length)` into `worker_count` raw byte ranges of
//!    `file_length / worker_count` bytes each, the remainder going to the last one.
//! 2. [`snap_to_lines`] moves every interior boundary forward to the first line
//!    start at or after it, so no span begins mid-line. A boundary with no line
//!    terminator after it snaps to end of file, leaving the trailing spans empty.
//!
//! The result is contiguous, non-overlapping, and covers every byte exactly once.
//! A final line without a terminator belongs to the last non-empty span.

use crate::error::{AnalyzeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Half-open byte range `[start_byte, end_byte)` of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileSpan {
    pub start_byte: u64,
    pub end_byte: u64,
}

impl FileSpan {
    #[must_use]
    pub const fn new(start_byte: u64, end_byte: u64) -> Self {
        Self {
            start_byte,
            end_byte,
        }
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end_byte.saturating_sub(self.start_byte)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end_byte <= self.start_byte
    }

    /// Whether this span starts at the first byte of the file.
    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.start_byte == 0
    }
}

impl fmt::Display for FileSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_byte, self.end_byte)
    }
}

/// Line-aligned spans for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    pub path: PathBuf,
    pub file_length: u64,
    pub spans: Vec<FileSpan>,
}

impl ChunkPlan {
    /// Number of spans that hold at least one byte.
    #[must_use]
    pub fn non_empty_spans(&self) -> usize {
        self.spans.iter().filter(|s| !s.is_empty()).count()
    }
}

impl fmt::Display for ChunkPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({} bytes, {} spans, {} non-empty)",
            self.path.display(),
            self.file_length,
            self.spans.len(),
            self.non_empty_spans()
        )?;
        for (i, span) in self.spans.iter().enumerate() {
            writeln!(f, "  span {i}: {span} ({} bytes)", span.len())?;
        }
        Ok(())
    }
}

/// Raw, unsnapped byte ranges.
///
/// An empty file yields a single empty span.
///
/// # Errors
/// [`AnalyzeError::InvalidConfiguration`] when `worker_count` is zero.
pub fn plan(file_length: u64, worker_count: usize) -> Result<Vec<FileSpan>> {
    if worker_count == 0 {
        return Err(AnalyzeError::config("worker_count must be at least 1"));
    }
    if file_length == 0 {
        return Ok(vec![FileSpan::new(0, 0)]);
    }
    let n = worker_count as u64;
    let chunk = file_length / n;
    let spans = (0..n)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == n { file_length } else { start + chunk };
            FileSpan::new(start, end)
        })
        .collect();
    Ok(spans)
}

/// Move each interior boundary of `spans` forward to a line start.
///
/// `spans` must be contiguous and start at 0, as produced by [`plan`]; the last
/// span's end is taken as the file length.
///
/// # Errors
/// Propagates read and seek failures from `reader`.
pub fn snap_to_lines<R: BufRead + Seek>(
    reader: &mut R,
    spans: &[FileSpan],
) -> io::Result<Vec<FileSpan>> {
    let Some(last) = spans.last() else {
        return Ok(Vec::new());
    };
    let file_length = last.end_byte;

    let mut boundaries = Vec::with_capacity(spans.len() + 1);
    boundaries.push(0u64);
    for span in &spans[1..] {
        let prev = boundaries.last().copied().unwrap_or(0);
        let snapped = if span.start_byte <= prev {
            prev
        } else {
            next_line_start(reader, span.start_byte, file_length)?
        };
        boundaries.push(snapped.max(prev));
    }
    boundaries.push(file_length);

    Ok(boundaries
        .windows(2)
        .map(|w| FileSpan::new(w[0], w[1]))
        .collect())
}

/// First offset `>= at` that begins a line, or `file_length` if none does.
fn next_line_start<R: BufRead + Seek>(reader: &mut R, at: u64, file_length: u64) -> io::Result<u64> {
    if at == 0 {
        return Ok(0);
    }
    if at >= file_length {
        return Ok(file_length);
    }
    // A line starts at `at` iff the byte before it is a terminator.
    let mut pos = at - 1;
    reader.seek(SeekFrom::Start(pos))?;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(file_length);
        }
        if let Some(i) = buf.iter().position(|&b| b == b'\n') {
            return Ok((pos + i as u64 + 1).min(file_length));
        }
        let n = buf.len();
        reader.consume(n);
        pos += n as u64;
        if pos >= file_length {
            return Ok(file_length);
        }
    }
}

/// Plan over any seekable reader of known length.
///
/// # Errors
/// [`AnalyzeError::InvalidConfiguration`] for zero workers; I/O failures are
/// returned as [`AnalyzeError::SourceUnreadable`] against `path`.
pub fn plan_reader<R: BufRead + Seek>(
    reader: &mut R,
    path: &Path,
    file_length: u64,
    worker_count: usize,
) -> Result<ChunkPlan> {
    let raw = plan(file_length, worker_count)?;
    let spans = snap_to_lines(reader, &raw).map_err(|e| AnalyzeError::unreadable(path, e))?;
    Ok(ChunkPlan {
        path: path.to_path_buf(),
        file_length,
        spans,
    })
}

/// Open `path` read-only and plan `worker_count` line-aligned spans over it.
///
/// # Errors
/// [`AnalyzeError::SourceUnreadable`] if the file cannot be opened or scanned;
/// [`AnalyzeError::InvalidConfiguration`] for zero workers.
pub fn plan_file(path: impl AsRef<Path>, worker_count: usize) -> Result<ChunkPlan> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| AnalyzeError::unreadable(path, e))?;
    let file_length = file
        .metadata()
        .map_err(|e| AnalyzeError::unreadable(path, e))?
        .len();
    let mut reader = BufReader::new(file);
    plan_reader(&mut reader, path, file_length, worker_count)
}
