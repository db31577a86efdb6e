use anyhow::Result;
use ironsift::metrics::Phase;
use ironsift::testing::{assert_rank_law, sample_auth_log, sample_flow_csv, write_lines, write_text};
use ironsift::{AnalyzerConfig, ErrorKind, ExecMode, Mode, RankedEntry, Runner, analyze};

fn scenario_lines() -> Vec<&'static str> {
    vec!["1.1.1.1 ok", "2.2.2.2 Failed password for root", "1.1.1.1 ok"]
}

#[test]
fn log_scenario_counts_and_totals() -> Result<()> {
    let fx = write_lines("auth.log", &scenario_lines())?;
    let cfg = AnalyzerConfig::log_pattern().with_workers(2);
    let report = Runner::default().run(fx.path(), &cfg)?;

    assert_eq!(report.counts.len(), 2);
    assert_eq!(report.counts["1.1.1.1"], 2);
    assert_eq!(report.counts["2.2.2.2"], 1);
    assert_eq!(report.total_matched, 3);
    assert_eq!(report.total_records_seen, 3);
    assert_eq!(report.categories["failed_auth"], 1);
    assert_eq!(report.generated_for, "auth.log");
    assert_rank_law(&report);
    Ok(())
}

#[test]
fn log_scenario_top_one() -> Result<()> {
    let fx = write_lines("auth.log", &scenario_lines())?;
    let cfg = AnalyzerConfig::log_pattern().with_workers(2).with_top_n(1);
    let report = analyze(fx.path(), &cfg)?;
    assert_eq!(
        report.top_n,
        vec![RankedEntry {
            key: "1.1.1.1".into(),
            count: 2,
            rank: 1
        }]
    );
    Ok(())
}

#[test]
fn tabular_scenario_counts_both_labels() -> Result<()> {
    let fx = write_text("flows.csv", "srcip,label\n9.9.9.9,normal\n9.9.9.9,attack\n")?;
    let cfg = AnalyzerConfig::tabular("srcip")
        .with_label_column("label")
        .with_workers(2);
    let report = Runner::default().run(fx.path(), &cfg)?;
    assert_eq!(report.counts.len(), 1);
    assert_eq!(report.counts["9.9.9.9"], 2);
    assert_eq!(report.total_records_seen, 2);
    assert_eq!(report.categories["attack"], 1);
    assert_eq!(report.categories["generic"], 1);
    Ok(())
}

#[test]
fn more_workers_than_lines_changes_nothing() -> Result<()> {
    let fx = write_lines("auth.log", &scenario_lines())?;
    let one = analyze(fx.path(), &AnalyzerConfig::log_pattern().with_workers(1))?;
    let many = analyze(fx.path(), &AnalyzerConfig::log_pattern().with_workers(16))?;
    assert_eq!(one, many);
    Ok(())
}

#[test]
fn sequential_and_parallel_agree() -> Result<()> {
    let lines: Vec<String> = (0..2_000)
        .map(|i| match i % 7 {
            0 => format!("Failed password for root from 10.0.{}.{} port 22", i % 5, i % 3),
            1 | 2 => format!("GET /index.html from 192.168.{}.1", i % 11),
            3 => "no address on this line".to_string(),
            _ => format!("{}.{}.{}.{} - - [10/Oct/2024]", i % 4, i % 9, 1, 2),
        })
        .collect();
    let fx = write_lines("access.log", &lines)?;
    for workers in [1, 3, 8] {
        let cfg = AnalyzerConfig::log_pattern().with_workers(workers).with_top_n(5);
        let seq = Runner::new(ExecMode::Sequential).run(fx.path(), &cfg)?;
        let par = Runner::new(ExecMode::Parallel).run(fx.path(), &cfg)?;
        assert_eq!(seq, par, "workers={workers}");
        assert_rank_law(&par);
    }
    Ok(())
}

#[test]
fn repeated_runs_are_byte_identical() -> Result<()> {
    let fx = write_lines("auth.log", &sample_auth_log())?;
    let cfg = AnalyzerConfig::log_pattern().with_workers(3);
    let a = analyze(fx.path(), &cfg)?.to_json_pretty()?;
    let b = analyze(fx.path(), &cfg)?.to_json_pretty()?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn sample_auth_log_ranking() -> Result<()> {
    let fx = write_lines("auth.log", &sample_auth_log())?;
    let report = analyze(fx.path(), &AnalyzerConfig::log_pattern().with_workers(4))?;
    let keys: Vec<_> = report.top_n.iter().map(|e| (e.key.as_str(), e.count)).collect();
    assert_eq!(
        keys,
        vec![("203.0.113.9", 3), ("198.51.100.7", 2), ("192.0.2.1", 1)]
    );
    assert_eq!(report.total_records_seen, 8);
    assert_eq!(report.total_matched, 6);
    assert_eq!(report.categories["failed_auth"], 5);
    Ok(())
}

#[test]
fn sample_flow_csv_with_malformed_row() -> Result<()> {
    let fx = write_text("flows.csv", sample_flow_csv())?;
    let cfg = AnalyzerConfig::tabular("srcip")
        .with_label_column("label")
        .with_workers(3);
    let report = analyze(fx.path(), &cfg)?;
    assert_eq!(report.counts["10.0.0.5"], 3);
    assert_eq!(report.malformed_rows, 1);
    assert_eq!(report.total_records_seen, 8);
    assert_eq!(report.total_matched, 6);
    Ok(())
}

#[test]
fn empty_file_gives_empty_report() -> Result<()> {
    let fx = write_text("empty.log", "")?;
    let report = analyze(fx.path(), &AnalyzerConfig::log_pattern().with_workers(4))?;
    assert!(report.is_empty());
    assert!(report.top_n.is_empty());
    assert_eq!(report.total_records_seen, 0);
    Ok(())
}

#[test]
fn configuration_errors_surface_before_reading() {
    let cfg = AnalyzerConfig::log_pattern().with_workers(0);
    let err = analyze("/no/such/file.log", &cfg).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

    let mut cfg = AnalyzerConfig::log_pattern();
    cfg.mode = Mode::TabularColumn;
    let err = analyze("/no/such/file.csv", &cfg).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
}

#[test]
fn missing_file_is_source_unreadable() {
    let err = analyze("/no/such/file.log", &AnalyzerConfig::log_pattern()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnreadable);
}

#[test]
fn unknown_key_column_is_invalid_configuration() -> Result<()> {
    let fx = write_text("flows.csv", "srcip,label\n1.1.1.1,x\n")?;
    let err = analyze(fx.path(), &AnalyzerConfig::tabular("src_ip")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    Ok(())
}

#[test]
fn empty_tabular_file_has_no_header() -> Result<()> {
    let fx = write_text("flows.csv", "")?;
    let err = analyze(fx.path(), &AnalyzerConfig::tabular("srcip")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    Ok(())
}

#[test]
fn metrics_cover_every_phase_and_span() -> Result<()> {
    let fx = write_lines("auth.log", &sample_auth_log())?;
    let cfg = AnalyzerConfig::log_pattern().with_workers(3);
    let (_, metrics) = Runner::default().run_with_metrics(fx.path(), &cfg)?;
    for phase in [Phase::Plan, Phase::Extract, Phase::Reduce, Phase::Report] {
        assert!(metrics.phase(phase).is_some(), "missing {phase:?}");
    }
    assert_eq!(metrics.spans().len(), 3);
    assert_eq!(metrics.counter("spans"), 3);
    assert_eq!(metrics.counter("distinct_keys"), 3);
    let bytes: u64 = metrics.spans().iter().map(|s| s.bytes).sum();
    assert_eq!(bytes, metrics.counter("bytes"));
    Ok(())
}

#[test]
fn thousands_of_workers_on_a_tiny_file() -> Result<()> {
    let fx = write_lines("auth.log", &scenario_lines())?;
    let cfg = AnalyzerConfig::log_pattern().with_workers(20_000);
    let (report, metrics) = Runner::new(ExecMode::Parallel).run_with_metrics(fx.path(), &cfg)?;
    assert_eq!(report.counts["1.1.1.1"], 2);
    assert_eq!(report.total_matched, 3);
    assert_eq!(metrics.counter("spans"), 20_000);
    let busy = 20_000 - metrics.counter("empty_spans");
    assert_eq!(metrics.counter("pool_threads"), busy);
    assert!(busy <= 3);

    let seq = Runner::sequential().run(fx.path(), &cfg)?;
    assert_eq!(seq, report);
    Ok(())
}
