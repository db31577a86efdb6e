//! Report builder and persistence.
//!
//! Ranking is a total order: count descending, then key ascending (byte-wise).
//! Ranks run `1..=k` with no gaps; tied counts get consecutive ranks in key order.
//! The top-`k` selection keeps a bounded min-heap of `k` entries, so memory for
//! the ranking is bounded by `k` rather than by the number of distinct keys.
//!
//! The persisted JSON keeps `counts`, `top_n`, `total_records_seen` and
//! `total_matched` under exactly those names:
//!
//! ```json
//! {
//!   "counts": { "1.1.1.1": 2, "2.2.2.2": 1 },
//!   "top_n": [ { "key": "1.1.1.1", "count": 2, "rank": 1 } ],
//!   "total_records_seen": 3,
//!   "total_matched": 3,
//!   "malformed_rows": 0,
//!   "categories": { "failed_auth": 1, "generic": 2 },
//!   "generated_for": "auth.log"
//! }
//! ```

use crate::frequency::FrequencyMap;
use crate::worker::Tally;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::Path;

/// One row of the ranked list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub key: String,
    pub count: u64,
    /// 1-based.
    pub rank: usize,
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Every key with its global count, key-ordered.
    pub counts: BTreeMap<String, u64>,
    pub top_n: Vec<RankedEntry>,
    pub total_records_seen: u64,
    pub total_matched: u64,
    #[serde(default)]
    pub malformed_rows: u64,
    /// Matched records per category name.
    #[serde(default)]
    pub categories: BTreeMap<String, u64>,
    #[serde(default)]
    pub generated_for: String,
}

/// Sort key where "greater" means "ranks higher".
#[derive(PartialEq, Eq)]
struct Standing<'a> {
    count: u64,
    key: &'a str,
}

impl Ord for Standing<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.count
            .cmp(&other.count)
            .then_with(|| other.key.cmp(self.key))
    }
}

impl PartialOrd for Standing<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The `top_n` highest-ranked entries of `map`, best first.
#[must_use]
pub fn rank_entries(map: &FrequencyMap, top_n: usize) -> Vec<RankedEntry> {
    if top_n == 0 || map.is_empty() {
        return Vec::new();
    }

    let best_first: Vec<Standing<'_>> = if top_n >= map.len() {
        let mut all: Vec<_> = map
            .iter()
            .map(|(k, &count)| Standing { count, key: k })
            .collect();
        all.sort_unstable_by(|a, b| b.cmp(a));
        all
    } else {
        // Min-heap of the k best seen so far; the root is the weakest.
        let mut heap: BinaryHeap<Reverse<Standing<'_>>> = BinaryHeap::with_capacity(top_n + 1);
        for (k, &count) in map.iter() {
            heap.push(Reverse(Standing { count, key: k }));
            if heap.len() > top_n {
                heap.pop();
            }
        }
        let mut v: Vec<_> = heap.into_iter().map(|Reverse(s)| s).collect();
        v.sort_unstable_by(|a, b| b.cmp(a));
        v
    };

    best_first
        .into_iter()
        .enumerate()
        .map(|(i, s)| RankedEntry {
            key: s.key.to_string(),
            count: s.count,
            rank: i + 1,
        })
        .collect()
}

/// Rank `map` and attach run totals.
#[must_use]
pub fn build(
    map: &FrequencyMap,
    top_n: usize,
    totals: &Tally,
    generated_for: impl Into<String>,
) -> Report {
    Report {
        counts: map.to_sorted(),
        top_n: rank_entries(map, top_n),
        total_records_seen: totals.records_seen,
        total_matched: totals.matched,
        malformed_rows: totals.malformed,
        categories: totals
            .by_category
            .iter()
            .map(|(cat, n)| (cat.to_string(), *n))
            .collect(),
        generated_for: generated_for.into(),
    }
}

impl Report {
    /// No indicator was found anywhere in the source.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `(key, count)` pairs in rank order, for a chart renderer.
    #[must_use]
    pub fn chart_series(&self) -> Vec<(&str, u64)> {
        self.top_n
            .iter()
            .map(|e| (e.key.as_str(), e.count))
            .collect()
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize report")
    }

    /// # Errors
    /// Returns an error if `json` is not a report document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parse report JSON")
    }

    /// Write the report as JSON, creating parent directories as needed.
    ///
    /// # Errors
    /// Returns an error if the file or its directories cannot be created or written.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut w = BufWriter::new(f);
        serde_json::to_writer_pretty(&mut w, self)
            .with_context(|| format!("write report to {}", path.display()))?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    }
}
