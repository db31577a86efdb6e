//! Error taxonomy for an analysis run.
//!
//! A run ends in exactly one terminal status: a [`Report`](crate::Report) or a
//! single [`AnalyzeError`]. Lines or rows that yield no indicator are not errors
//! and never show up here; malformed tabular rows are tallied in the report.

use crate::planner::FileSpan;
use std::io;
use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AnalyzeError>;

/// Fatal errors that abort a whole run.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// Rejected before any worker starts.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The tabular header (row 0) could not be parsed.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The source file could not be opened or inspected.
    #[error("cannot read {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A worker could not read its whole span.
    #[error("cannot read span {span} of {}: {source}", path.display())]
    SpanUnreadable {
        path: PathBuf,
        span: FileSpan,
        #[source]
        source: io::Error,
    },

    /// The worker thread pool could not be built.
    #[error("worker pool: {0}")]
    WorkerPool(String),
}

/// Coarse classification used for the user-visible terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfiguration,
    SourceUnreadable,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConfiguration => "InvalidConfiguration",
            Self::SourceUnreadable => "SourceUnreadable",
            Self::Internal => "Internal",
        }
    }
}

impl AnalyzeError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            source,
        }
    }

    /// The kind reported to the user for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfiguration(_) | Self::MalformedHeader(_) => {
                ErrorKind::InvalidConfiguration
            }
            Self::SourceUnreadable { .. } | Self::SpanUnreadable { .. } => {
                ErrorKind::SourceUnreadable
            }
            Self::WorkerPool(_) => ErrorKind::Internal,
        }
    }

    /// The span whose read failed, if this is a span failure.
    #[must_use]
    pub const fn failed_span(&self) -> Option<FileSpan> {
        match self {
            Self::SpanUnreadable { span, .. } => Some(*span),
            _ => None,
        }
    }
}
