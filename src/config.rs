//! Run configuration.
//!
//! [`AnalyzerConfig`] is the single object a trigger surface hands to the
//! [`Runner`](crate::Runner). It can be built in code with the `with_*` methods or
//! loaded from JSON; every field has a default, so a JSON document only needs the
//! options it changes:
//!
//! ```
//! use ironsift::{AnalyzerConfig, Mode};
//!
//! let cfg = AnalyzerConfig::from_json_str(
//!     r#"{ "mode": "tabular", "key_column": "srcip", "label_column": "label", "worker_count": 4 }"#,
//! )?;
//! assert_eq!(cfg.mode, Mode::TabularColumn);
//! assert_eq!(cfg.top_n, 10);
//! # Ok::<(), ironsift::AnalyzeError>(())
//! ```
//!
//! Matching rules are data, not code: the IP pattern is compiled from a string at
//! run start and injected into the extractor.

use crate::error::{AnalyzeError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Dotted-quad IPv4 address.
pub const DEFAULT_IP_PATTERN: &str = r"\b(?:\d{1,3}\.){3}\d{1,3}\b";
/// sshd's marker for a rejected login.
pub const DEFAULT_FAILURE_PHRASE: &str = "Failed password";
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_READ_BUFFER_BYTES: usize = 64 * 1024;

/// How records are turned into indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Mode {
    /// Free-form text lines scanned with the IP pattern.
    #[default]
    LogPattern,
    /// Delimited rows; the key is read from a named column.
    TabularColumn,
}

impl Mode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LogPattern => "log_pattern",
            Self::TabularColumn => "tabular_column",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = AnalyzeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log_pattern" | "log-pattern" | "logpattern" | "log" => Ok(Self::LogPattern),
            "tabular_column" | "tabular-column" | "tabularcolumn" | "tabular" | "csv" => {
                Ok(Self::TabularColumn)
            }
            other => Err(AnalyzeError::config(format!("unknown mode '{other}'"))),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse().map_err(|e: AnalyzeError| e.to_string())
    }
}

/// Every recognized option of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    pub mode: Mode,
    /// Size of the fixed worker pool; also the number of planned spans.
    pub worker_count: usize,
    /// Number of ranked entries kept in the report.
    pub top_n: usize,
    /// Log mode only. Group 1 is the key when the pattern has a capture group.
    pub ip_pattern: String,
    /// Log mode only. Plain substring, case-sensitive.
    pub failure_phrase: String,
    /// Tabular mode only. Required there.
    pub key_column: Option<String>,
    /// Tabular mode only.
    pub label_column: Option<String>,
    /// Tabular mode only. `None` sniffs the delimiter from the header line.
    pub delimiter: Option<char>,
    /// Label values (lowercase) that do not mark a row as an attack.
    pub benign_labels: Vec<String>,
    pub read_buffer_bytes: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::LogPattern,
            worker_count: num_cpus::get().max(1),
            top_n: DEFAULT_TOP_N,
            ip_pattern: DEFAULT_IP_PATTERN.to_string(),
            failure_phrase: DEFAULT_FAILURE_PHRASE.to_string(),
            key_column: None,
            label_column: None,
            delimiter: None,
            benign_labels: ["0", "-", "normal", "benign", "none", ""]
                .into_iter()
                .map(String::from)
                .collect(),
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
        }
    }
}

impl AnalyzerConfig {
    /// Default configuration for text logs.
    #[must_use]
    pub fn log_pattern() -> Self {
        Self::default()
    }

    /// Default configuration for delimited files keyed by `key_column`.
    #[must_use]
    pub fn tabular(key_column: impl Into<String>) -> Self {
        Self {
            mode: Mode::TabularColumn,
            key_column: Some(key_column.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    #[must_use]
    pub const fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    #[must_use]
    pub fn with_ip_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.ip_pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn with_failure_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.failure_phrase = phrase.into();
        self
    }

    #[must_use]
    pub fn with_label_column(mut self, column: impl Into<String>) -> Self {
        self.label_column = Some(column.into());
        self
    }

    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Parse a JSON document. Unset fields keep their defaults.
    ///
    /// # Errors
    /// [`AnalyzeError::InvalidConfiguration`] on malformed JSON, unknown fields,
    /// an unknown mode, or a negative count.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AnalyzeError::config(e.to_string()))
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    /// [`AnalyzeError::InvalidConfiguration`] if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AnalyzeError::config(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Compile [`ip_pattern`](Self::ip_pattern).
    ///
    /// # Errors
    /// [`AnalyzeError::InvalidConfiguration`] if the pattern is empty or invalid.
    pub fn compile_ip_pattern(&self) -> Result<Regex> {
        if self.ip_pattern.trim().is_empty() {
            return Err(AnalyzeError::config("ip_pattern must not be empty"));
        }
        Regex::new(&self.ip_pattern)
            .map_err(|e| AnalyzeError::config(format!("ip_pattern does not compile: {e}")))
    }

    /// The key column for tabular mode.
    ///
    /// # Errors
    /// [`AnalyzeError::InvalidConfiguration`] if it is missing or blank.
    pub fn required_key_column(&self) -> Result<&str> {
        match self.key_column.as_deref().map(str::trim) {
            Some(col) if !col.is_empty() => Ok(col),
            _ => Err(AnalyzeError::config(
                "key_column is required in tabular_column mode",
            )),
        }
    }

    /// Check every option that can be checked without touching the source file.
    ///
    /// # Errors
    /// [`AnalyzeError::InvalidConfiguration`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(AnalyzeError::config("worker_count must be at least 1"));
        }
        if self.read_buffer_bytes == 0 {
            return Err(AnalyzeError::config("read_buffer_bytes must be at least 1"));
        }
        match self.mode {
            Mode::LogPattern => {
                self.compile_ip_pattern()?;
            }
            Mode::TabularColumn => {
                self.required_key_column()?;
                if let Some(label) = &self.label_column
                    && label.trim().is_empty()
                {
                    return Err(AnalyzeError::config("label_column must not be blank"));
                }
                if let Some(d) = self.delimiter
                    && !d.is_ascii()
                {
                    return Err(AnalyzeError::config(format!(
                        "delimiter '{d}' must be a single ASCII character"
                    )));
                }
            }
        }
        Ok(())
    }
}
