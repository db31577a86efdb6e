//! Test fixtures and assertions for analysis pipelines.
//!
//! Inputs are written to a [`TempDir`] that lives as long as the returned
//! [`Fixture`], so tests can hand a real path to the runner:
//!
//! ```
//! use ironsift::testing::*;
//! use ironsift::{AnalyzerConfig, Runner};
//!
//! # fn main() -> anyhow::Result<()> {
//! let fx = write_lines("auth.log", &["1.1.1.1 ok", "2.2.2.2 Failed password for root", "1.1.1.1 ok"])?;
//! let report = Runner::sequential().run(fx.path(), &AnalyzerConfig::log_pattern().with_workers(2))?;
//! assert_eq!(report.counts["1.1.1.1"], 2);
//! assert_rank_law(&report);
//! # Ok(())
//! # }
//! ```

use crate::planner::FileSpan;
use crate::report::Report;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A file inside a temporary directory.
#[derive(Debug)]
pub struct Fixture {
    _dir: TempDir,
    path: PathBuf,
}

impl Fixture {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write `contents` verbatim to a fresh temporary file named `name`.
///
/// # Errors
/// Returns an error if the directory or file cannot be created.
pub fn write_text(name: &str, contents: impl AsRef<[u8]>) -> std::io::Result<Fixture> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(name);
    fs::write(&path, contents)?;
    Ok(Fixture { _dir: dir, path })
}

/// Write `lines`, each terminated by `\n`.
///
/// # Errors
/// Returns an error if the directory or file cannot be created.
pub fn write_lines<S: AsRef<str>>(name: &str, lines: &[S]) -> std::io::Result<Fixture> {
    let mut text = String::new();
    for line in lines {
        text.push_str(line.as_ref());
        text.push('\n');
    }
    write_text(name, text)
}

/// A short sshd-style auth log.
///
/// `203.0.113.9` fails three times, `198.51.100.7` twice, `192.0.2.1` logs in
/// once; two lines carry no address.
#[must_use]
pub fn sample_auth_log() -> Vec<String> {
    [
        "Jan 10 10:00:01 host sshd[100]: Failed password for root from 203.0.113.9 port 52311 ssh2",
        "Jan 10 10:00:02 host sshd[101]: Failed password for invalid user admin from 198.51.100.7 port 40022 ssh2",
        "Jan 10 10:00:03 host sshd[102]: Accepted password for alice from 192.0.2.1 port 50000 ssh2",
        "Jan 10 10:00:04 host CRON[103]: pam_unix(cron:session): session opened for user root",
        "Jan 10 10:00:05 host sshd[104]: Failed password for root from 203.0.113.9 port 52312 ssh2",
        "",
        "Jan 10 10:00:06 host sshd[105]: Failed password for root from 198.51.100.7 port 40023 ssh2",
        "Jan 10 10:00:07 host systemd[1]: Started Session 42 of user alice.",
        "Jan 10 10:00:08 host sshd[106]: Failed password for root from 203.0.113.9 port 52313 ssh2",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// A network-flow CSV in the style of public intrusion datasets.
///
/// Header included. `10.0.0.5` appears three times (two attacks), `10.0.0.8`
/// twice, `10.0.0.9` once; one row is short and one has an empty source.
#[must_use]
pub fn sample_flow_csv() -> String {
    [
        "srcip,sport,dstip,dsport,proto,label",
        "10.0.0.5,1390,172.16.0.1,53,udp,normal",
        "10.0.0.8,33661,172.16.0.1,80,tcp,Exploits",
        "10.0.0.5,1464,172.16.0.2,22,tcp,Reconnaissance",
        "10.0.0.9,52000,172.16.0.1,443,tcp,0",
        "10.0.0.5,1465,172.16.0.2,22,tcp,Fuzzers",
        "10.0.0.8,33662,172.16.0.1",
        ",1000,172.16.0.3,25,tcp,normal",
        "10.0.0.8,33663,172.16.0.1,80,tcp,normal",
    ]
    .join("\n")
        + "\n"
}

/// Assert that `spans` tile `[0, file_length)` with no gap or overlap.
///
/// # Panics
///
/// Panics with the offending span if they do not.
pub fn assert_spans_cover(spans: &[FileSpan], file_length: u64) {
    assert!(!spans.is_empty(), "plan produced no spans");
    assert_eq!(spans[0].start_byte, 0, "first span must start at 0: {spans:?}");
    for pair in spans.windows(2) {
        assert_eq!(
            pair[0].end_byte, pair[1].start_byte,
            "spans not contiguous: {} then {}",
            pair[0], pair[1]
        );
    }
    for s in spans {
        assert!(s.start_byte <= s.end_byte, "inverted span {s}");
    }
    assert_eq!(
        spans[spans.len() - 1].end_byte,
        file_length,
        "last span must end at file length: {spans:?}"
    );
}

/// Assert the ranking invariants of a report.
///
/// `top_n` must be sorted by count descending then key ascending, ranks must be
/// `1..=k`, and every entry must agree with `counts`.
///
/// # Panics
///
/// Panics describing the first violated invariant.
pub fn assert_rank_law(report: &Report) {
    for (i, entry) in report.top_n.iter().enumerate() {
        assert_eq!(entry.rank, i + 1, "rank gap at index {i}: {:?}", report.top_n);
        assert_eq!(
            report.counts.get(&entry.key),
            Some(&entry.count),
            "top_n entry {entry:?} disagrees with counts"
        );
    }
    for pair in report.top_n.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.count > b.count || (a.count == b.count && a.key < b.key),
            "entries out of order: {a:?} before {b:?}"
        );
    }
    if let Some(last) = report.top_n.last() {
        let outranked = report
            .counts
            .iter()
            .filter(|(k, c)| **c > last.count || (**c == last.count && k.as_str() < last.key.as_str()))
            .count();
        assert_eq!(
            outranked,
            report.top_n.len() - 1,
            "top_n omits a key that outranks {last:?}"
        );
    }
}
