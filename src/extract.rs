//! Indicator extraction.
//!
//! Extraction is a pure function of one record: the same record always yields
//! the same [`Outcome`], whichever worker calls it and in whatever order. A record
//! that yields nothing is an ordinary [`Outcome::Miss`], not an error.

use crate::config::{AnalyzerConfig, Mode};
use crate::error::{AnalyzeError, Result};
use csv::ByteRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Classification attached to an extracted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Category {
    Generic,
    /// Log line containing the failure phrase.
    FailedAuth,
    /// Tabular row whose label is not benign.
    Attack,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generic => "generic",
            Self::FailedAuth => "failed_auth",
            Self::Attack => "attack",
        })
    }
}

/// The thing being counted. The key is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Indicator {
    key: String,
    category: Category,
}

impl Indicator {
    /// `None` when `key` is empty.
    pub fn new(key: impl Into<String>, category: Category) -> Option<Self> {
        let key = key.into();
        (!key.is_empty()).then_some(Self { key, category })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn into_key(self) -> String {
        self.key
    }
}

/// One logical input unit.
///
/// `line_index` counts records within the owning span and only serves
/// diagnostics.
#[derive(Debug, Clone, Copy)]
pub enum Record<'a> {
    Line { raw: &'a str, line_index: u64 },
    Row { fields: &'a ByteRecord, line_index: u64 },
}

impl Record<'_> {
    #[must_use]
    pub const fn line_index(&self) -> u64 {
        match self {
            Self::Line { line_index, .. } | Self::Row { line_index, .. } => *line_index,
        }
    }
}

/// Result of running an extractor over one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Matched(Indicator),
    Miss,
    /// Tabular only: wrong field count or an undecodable key.
    Malformed,
}

impl Outcome {
    #[must_use]
    pub fn into_indicator(self) -> Option<Indicator> {
        match self {
            Self::Matched(ind) => Some(ind),
            Self::Miss | Self::Malformed => None,
        }
    }
}

/* ===================== LogPattern ===================== */

/// Finds an address on a text line with an injected pattern.
#[derive(Debug, Clone)]
pub struct LogPatternExtractor {
    pattern: Regex,
    failure_phrase: String,
}

impl LogPatternExtractor {
    /// An empty `failure_phrase` disables the failed-auth classification.
    pub fn new(pattern: Regex, failure_phrase: impl Into<String>) -> Self {
        Self {
            pattern,
            failure_phrase: failure_phrase.into(),
        }
    }

    /// Extract from a raw line.
    ///
    /// With the failure phrase present, an address after the phrase wins over one
    /// before it ("Failed password for root from 10.0.0.1" keys on `10.0.0.1` even
    /// if a relay address precedes it).
    #[must_use]
    pub fn extract(&self, line: &str) -> Option<Indicator> {
        let phrase_at = if self.failure_phrase.is_empty() {
            None
        } else {
            line.find(&self.failure_phrase)
        };
        match phrase_at {
            Some(at) => {
                let after = at + self.failure_phrase.len();
                let key = self.key_at(line, after).or_else(|| self.key_at(line, 0))?;
                Indicator::new(key, Category::FailedAuth)
            }
            None => Indicator::new(self.key_at(line, 0)?, Category::Generic),
        }
    }

    fn key_at<'h>(&self, line: &'h str, start: usize) -> Option<&'h str> {
        if self.pattern.captures_len() > 1 {
            // First match that sets group 1; alternations may leave it unset.
            let mut at = start;
            while at <= line.len() {
                let caps = self.pattern.captures_at(line, at)?;
                if let Some(key) = caps.get(1) {
                    return Some(key.as_str());
                }
                let whole = caps.get(0)?;
                at = if whole.end() > whole.start() {
                    whole.end()
                } else {
                    // Empty match: step past the next char.
                    whole.end() + line[whole.end()..].chars().next()?.len_utf8()
                };
            }
            None
        } else {
            self.pattern.find_at(line, start).map(|m| m.as_str())
        }
    }
}

/* ===================== TabularColumn ===================== */

/// Column names of row 0, shared by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularHeader {
    columns: Vec<String>,
    delimiter: u8,
}

/// Guess the delimiter of a header line: tab, then `;`, then `,`.
#[must_use]
pub fn sniff_delimiter(line: &[u8]) -> u8 {
    [b'\t', b';', b',']
        .into_iter()
        .find(|d| line.contains(d))
        .unwrap_or(b',')
}

impl TabularHeader {
    /// Parse one header line (terminator optional).
    ///
    /// # Errors
    /// [`AnalyzeError::MalformedHeader`] when the line is blank or unparsable.
    pub fn parse(line: &[u8], delimiter: Option<u8>) -> Result<Self> {
        let line = trim_line_end(line);
        if line.iter().all(u8::is_ascii_whitespace) {
            return Err(AnalyzeError::MalformedHeader(
                "header line is empty".to_string(),
            ));
        }
        let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(line));
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .from_reader(line);
        let mut record = ByteRecord::new();
        match rdr.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => {
                return Err(AnalyzeError::MalformedHeader(
                    "header line has no fields".to_string(),
                ));
            }
            Err(e) => return Err(AnalyzeError::MalformedHeader(e.to_string())),
        }
        let columns = record
            .iter()
            .map(|f| String::from_utf8_lossy(f).trim().to_string())
            .collect();
        Ok(Self { columns, delimiter })
    }

    /// Read row 0 of `path`, whichever span the caller owns.
    ///
    /// # Errors
    /// [`AnalyzeError::SourceUnreadable`] on I/O failure, otherwise as [`parse`](Self::parse).
    pub fn read_from_file(path: impl AsRef<Path>, delimiter: Option<u8>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| AnalyzeError::unreadable(path, e))?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        reader
            .read_until(b'\n', &mut line)
            .map_err(|e| AnalyzeError::unreadable(path, e))?;
        Self::parse(&line, delimiter)
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub const fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Exact match first, then ASCII case-insensitive.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.position(name).ok_or_else(|| {
            AnalyzeError::config(format!(
                "column '{name}' not found in header [{}]",
                self.columns.join(", ")
            ))
        })
    }
}

/// Reads the key (and optional label) out of a parsed row.
#[derive(Debug, Clone)]
pub struct TabularColumnExtractor {
    delimiter: u8,
    width: usize,
    key_index: usize,
    label_index: Option<usize>,
    benign_labels: HashSet<String>,
}

impl TabularColumnExtractor {
    /// # Errors
    /// [`AnalyzeError::InvalidConfiguration`] when a named column is absent.
    pub fn new<I, S>(
        header: &TabularHeader,
        key_column: &str,
        label_column: Option<&str>,
        benign_labels: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let key_index = header.require(key_column)?;
        let label_index = label_column.map(|c| header.require(c)).transpose()?;
        Ok(Self {
            delimiter: header.delimiter(),
            width: header.width(),
            key_index,
            label_index,
            benign_labels: benign_labels
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .collect(),
        })
    }

    /// Field delimiter taken from the header.
    #[must_use]
    pub const fn delimiter(&self) -> u8 {
        self.delimiter
    }

    #[must_use]
    pub fn classify(&self, fields: &ByteRecord) -> Outcome {
        if fields.len() != self.width {
            return Outcome::Malformed;
        }
        let Some(raw) = fields.get(self.key_index) else {
            return Outcome::Malformed;
        };
        let Ok(key) = std::str::from_utf8(raw) else {
            return Outcome::Malformed;
        };
        let key = key.trim();
        if key.is_empty() || key.eq_ignore_ascii_case("nan") {
            return Outcome::Miss;
        }
        let category = match self.label_index.and_then(|i| fields.get(i)) {
            Some(label) => {
                let label = String::from_utf8_lossy(label).trim().to_lowercase();
                if self.benign_labels.contains(&label) {
                    Category::Generic
                } else {
                    Category::Attack
                }
            }
            None => Category::Generic,
        };
        Indicator::new(key, category).map_or(Outcome::Miss, Outcome::Matched)
    }
}

/* ===================== Extractor ===================== */

/// Mode-specific extractor, built once per run and shared read-only by workers.
#[derive(Debug, Clone)]
pub enum Extractor {
    LogPattern(LogPatternExtractor),
    TabularColumn(TabularColumnExtractor),
}

impl Extractor {
    /// Build from configuration. Tabular mode needs the header of row 0.
    ///
    /// # Errors
    /// [`AnalyzeError::InvalidConfiguration`] for a bad pattern, a missing column
    /// name, or a missing header.
    pub fn from_config(config: &AnalyzerConfig, header: Option<&TabularHeader>) -> Result<Self> {
        match config.mode {
            Mode::LogPattern => Ok(Self::LogPattern(LogPatternExtractor::new(
                config.compile_ip_pattern()?,
                config.failure_phrase.clone(),
            ))),
            Mode::TabularColumn => {
                let header = header.ok_or_else(|| {
                    AnalyzeError::config("tabular_column mode requires a header row")
                })?;
                Ok(Self::TabularColumn(TabularColumnExtractor::new(
                    header,
                    config.required_key_column()?,
                    config.label_column.as_deref(),
                    &config.benign_labels,
                )?))
            }
        }
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        match self {
            Self::LogPattern(_) => Mode::LogPattern,
            Self::TabularColumn(_) => Mode::TabularColumn,
        }
    }

    /// Full classification, distinguishing misses from malformed rows.
    #[must_use]
    pub fn classify(&self, record: &Record<'_>) -> Outcome {
        match (self, record) {
            (Self::LogPattern(x), Record::Line { raw, .. }) => {
                x.extract(raw).map_or(Outcome::Miss, Outcome::Matched)
            }
            (Self::TabularColumn(x), Record::Row { fields, .. }) => x.classify(fields),
            _ => Outcome::Miss,
        }
    }

    /// Zero or one indicator for `record`.
    #[must_use]
    pub fn extract(&self, record: &Record<'_>) -> Option<Indicator> {
        self.classify(record).into_indicator()
    }
}

/// Strip a trailing `\n` and/or `\r`.
pub(crate) fn trim_line_end(mut line: &[u8]) -> &[u8] {
    if let [rest @ .., b'\n'] = line {
        line = rest;
    }
    if let [rest @ .., b'\r'] = line {
        line = rest;
    }
    line
}
