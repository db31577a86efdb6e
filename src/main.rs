use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use ironsift::{AnalyzeError, AnalyzerConfig, ExecMode, Mode, Report, Runner};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ironsift")]
#[command(about = "Rank the most frequent indicators (IP addresses) in a large log or CSV file")]
#[command(version)]
struct Args {
    /// Input file (log, txt, or delimited)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// JSON configuration file; flags below override it
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Extraction mode: log | tabular
    #[arg(short = 'm', long)]
    mode: Option<Mode>,

    /// Number of parallel workers (default: CPU count)
    #[arg(short = 'w', long = "workers")]
    workers: Option<usize>,

    /// Number of ranked entries to report
    #[arg(short = 'n', long = "top-n")]
    top_n: Option<usize>,

    /// Address pattern (log mode)
    #[arg(long)]
    ip_pattern: Option<String>,

    /// Substring marking a failed login (log mode)
    #[arg(long)]
    failure_phrase: Option<String>,

    /// Column holding the key (tabular mode)
    #[arg(short = 'k', long)]
    key_column: Option<String>,

    /// Column holding the attack label (tabular mode)
    #[arg(short = 'l', long)]
    label_column: Option<String>,

    /// Field delimiter (tabular mode; sniffed from the header if omitted)
    #[arg(short = 'd', long)]
    delimiter: Option<char>,

    /// Write the JSON report here
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Write execution metrics as JSON here
    #[arg(long = "metrics")]
    metrics: Option<PathBuf>,

    /// Process spans one after another on the main thread
    #[arg(long)]
    sequential: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn to_config(&self) -> Result<AnalyzerConfig, AnalyzeError> {
        let mut config = match &self.config {
            Some(path) => AnalyzerConfig::from_json_file(path)?,
            None => AnalyzerConfig::default(),
        };
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(w) = self.workers {
            config.worker_count = w;
        }
        if let Some(n) = self.top_n {
            config.top_n = n;
        }
        if let Some(p) = &self.ip_pattern {
            config.ip_pattern.clone_from(p);
        }
        if let Some(p) = &self.failure_phrase {
            config.failure_phrase.clone_from(p);
        }
        if self.key_column.is_some() {
            config.key_column.clone_from(&self.key_column);
        }
        if self.label_column.is_some() {
            config.label_column.clone_from(&self.label_column);
        }
        if self.delimiter.is_some() {
            config.delimiter = self.delimiter;
        }
        Ok(config)
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<AnalyzeError>() {
                Some(ae) => eprintln!("error[{}]: {ae}", ae.kind().as_str()),
                None => eprintln!("error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.to_config()?;
    let runner = Runner::new(if args.sequential {
        ExecMode::Sequential
    } else {
        ExecMode::Parallel
    });
    let (report, metrics) = runner.run_with_metrics(&args.input, &config)?;

    print_report(&report);

    if let Some(path) = &args.output {
        report
            .write_json(path)
            .with_context(|| format!("save report to {}", path.display()))?;
        println!("Report saved to {}", path.display());
    }
    if let Some(path) = &args.metrics {
        metrics.save_to_file(path)?;
    }
    metrics.log_summary();
    Ok(())
}

fn print_report(report: &Report) {
    if report.is_empty() {
        println!("No suspicious IPs or attack patterns detected.");
    } else {
        let width = report
            .top_n
            .iter()
            .map(|e| e.key.len())
            .max()
            .unwrap_or(0)
            .max(3);
        println!("{:>4}  {:<width$}  {:>10}", "RANK", "KEY", "COUNT");
        for e in &report.top_n {
            println!("{:>4}  {:<width$}  {:>10}", e.rank, e.key, e.count);
        }
    }
    println!(
        "\n{}: {} records, {} matched, {} distinct, {} malformed",
        report.generated_for,
        report.total_records_seen,
        report.total_matched,
        report.counts.len(),
        report.malformed_rows
    );
}
