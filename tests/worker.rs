use anyhow::Result;
use ironsift::testing::{sample_flow_csv, write_lines, write_text};
use ironsift::worker::aggregate_span;
use ironsift::{
    AnalyzeError, AnalyzerConfig, Category, ErrorKind, Extractor, FileSpan, TabularHeader, Worker,
};
use std::io::Cursor;

fn log_extractor() -> Extractor {
    Extractor::from_config(&AnalyzerConfig::log_pattern(), None).unwrap()
}

#[test]
fn counts_only_the_owned_span() -> Result<()> {
    let text = "1.1.1.1 a\n2.2.2.2 b\n3.3.3.3 c\n";
    let x = log_extractor();
    // second line only
    let (counts, tally) = aggregate_span(Cursor::new(text), FileSpan::new(10, 20), &x, 4)?;
    assert_eq!(counts.len(), 1);
    assert_eq!(counts.get("2.2.2.2"), 1);
    assert_eq!(tally.records_seen, 1);
    assert_eq!(tally.matched, 1);
    Ok(())
}

#[test]
fn blank_lines_and_misses_are_tallied_correctly() -> Result<()> {
    let text = "1.1.1.1 ok\n\n   \nno address here\r\n1.1.1.1 again\r\n";
    let x = log_extractor();
    let span = FileSpan::new(0, text.len() as u64);
    let (counts, tally) = aggregate_span(Cursor::new(text), span, &x, 64)?;
    assert_eq!(counts.get("1.1.1.1"), 2);
    assert_eq!(tally.records_seen, 3);
    assert_eq!(tally.matched, 2);
    assert_eq!(tally.malformed, 0);
    assert_eq!(tally.by_category.get(&Category::Generic), Some(&2));
    Ok(())
}

#[test]
fn invalid_utf8_is_decoded_lossily() -> Result<()> {
    let mut bytes = b"\xff\xfe 4.4.4.4 \xc3\n".to_vec();
    bytes.extend_from_slice(b"5.5.5.5\n");
    let x = log_extractor();
    let span = FileSpan::new(0, bytes.len() as u64);
    let (counts, tally) = aggregate_span(Cursor::new(bytes), span, &x, 8)?;
    assert_eq!(counts.get("4.4.4.4"), 1);
    assert_eq!(counts.get("5.5.5.5"), 1);
    assert_eq!(tally.records_seen, 2);
    Ok(())
}

#[test]
fn empty_span_produces_empty_map() -> Result<()> {
    let x = log_extractor();
    let (counts, tally) = aggregate_span(Cursor::new("1.1.1.1\n"), FileSpan::new(8, 8), &x, 8)?;
    assert!(counts.is_empty());
    assert_eq!(tally, Default::default());
    Ok(())
}

#[test]
fn short_source_is_an_error() {
    let x = log_extractor();
    let err = aggregate_span(Cursor::new("1.1.1.1\n"), FileSpan::new(0, 100), &x, 8).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[test]
fn tabular_first_span_skips_header() -> Result<()> {
    let csv = sample_flow_csv();
    let header = TabularHeader::parse(csv.lines().next().unwrap().as_bytes(), None)?;
    let cfg = AnalyzerConfig::tabular("srcip").with_label_column("label");
    let x = Extractor::from_config(&cfg, Some(&header))?;
    let span = FileSpan::new(0, csv.len() as u64);
    let (counts, tally) = aggregate_span(Cursor::new(csv.as_bytes()), span, &x, 32)?;

    assert_eq!(counts.get("srcip"), 0);
    assert_eq!(counts.get("10.0.0.5"), 3);
    assert_eq!(counts.get("10.0.0.8"), 2);
    assert_eq!(counts.get("10.0.0.9"), 1);
    assert_eq!(tally.records_seen, 8);
    assert_eq!(tally.matched, 6);
    assert_eq!(tally.malformed, 1);
    assert_eq!(tally.by_category.get(&Category::Attack), Some(&3));
    assert_eq!(tally.by_category.get(&Category::Generic), Some(&3));
    Ok(())
}

#[test]
fn tabular_later_span_does_not_skip_its_first_row() -> Result<()> {
    let text = "srcip,label\n9.9.9.9,normal\n8.8.8.8,attack\n";
    let header = TabularHeader::parse(b"srcip,label", None)?;
    let x = Extractor::from_config(&AnalyzerConfig::tabular("srcip"), Some(&header))?;
    let (counts, _) = aggregate_span(Cursor::new(text), FileSpan::new(27, 42), &x, 16)?;
    assert_eq!(counts.get("8.8.8.8"), 1);
    assert_eq!(counts.len(), 1);
    Ok(())
}

#[test]
fn worker_reads_its_span_from_disk() -> Result<()> {
    let fx = write_lines("auth.log", &["1.1.1.1 ok", "2.2.2.2 Failed password for root"])?;
    let x = log_extractor();
    let out = Worker::new(7, FileSpan::new(11, 44), fx.path(), &x).run()?;
    assert_eq!(out.worker_id, 7);
    assert_eq!(out.counts.get("2.2.2.2"), 1);
    assert_eq!(out.tally.by_category.get(&Category::FailedAuth), Some(&1));
    Ok(())
}

#[test]
fn worker_on_truncated_file_reports_its_span() -> Result<()> {
    let fx = write_text("short.log", "1.1.1.1\n")?;
    let x = log_extractor();
    let span = FileSpan::new(0, 64);
    let err = Worker::new(0, span, fx.path(), &x).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnreadable);
    assert_eq!(err.failed_span(), Some(span));
    assert!(matches!(err, AnalyzeError::SpanUnreadable { .. }));
    Ok(())
}
