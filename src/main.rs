//! Command line front end of sheetmerge.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use itertools::Itertools;
use sheetmerge::config::{
    DEFAULT_DIR, DEFAULT_OUTPUT, DEFAULT_PATTERN, DEFAULT_TIMESTAMP_COLUMN,
};
use sheetmerge::{BadTimestamp, EpochUnit, InputFormat, MergeConfig, Merger};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Merges spreadsheet exports into one CSV file sorted by time.
#[derive(Parser, Debug)]
#[command(name = "sheetmerge", version)]
#[command(about = "Merges spreadsheet exports into one CSV file sorted by time")]
struct Args {
    /// Directory containing the files to merge
    #[arg(long, short = 'd', env = "SHEETMERGE_DIR", default_value = DEFAULT_DIR)]
    dir: PathBuf,

    /// Glob pattern selecting file names in the directory
    #[arg(long, short = 'p', env = "SHEETMERGE_PATTERN", default_value = DEFAULT_PATTERN)]
    pattern: String,

    /// Column holding the timestamps to sort by
    #[arg(
        long,
        short = 't',
        env = "SHEETMERGE_TIMESTAMP_COLUMN",
        default_value = DEFAULT_TIMESTAMP_COLUMN
    )]
    timestamp_column: String,

    /// Path of the merged CSV file
    #[arg(long, short = 'o', env = "SHEETMERGE_OUTPUT", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Input format: auto, excel or csv
    #[arg(long, env = "SHEETMERGE_FORMAT", default_value_t = InputFormat::Auto)]
    format: InputFormat,

    /// Worksheet to read from workbooks (default: the first one)
    #[arg(long, env = "SHEETMERGE_SHEET")]
    sheet: Option<String>,

    /// Field delimiter of CSV inputs
    #[arg(long, env = "SHEETMERGE_DELIMITER", default_value_t = ',')]
    delimiter: char,

    /// Field delimiter of the merged file
    #[arg(long, env = "SHEETMERGE_OUTPUT_DELIMITER", default_value_t = ',')]
    output_delimiter: char,

    /// What to do with unparseable timestamps: abort, null or drop
    #[arg(long, env = "SHEETMERGE_ON_BAD_TIMESTAMP", default_value_t = BadTimestamp::Abort)]
    on_bad_timestamp: BadTimestamp,

    /// Unit of numeric timestamps since the Unix epoch: s, ms, us or ns
    #[arg(long, env = "SHEETMERGE_EPOCH_UNIT", default_value_t = EpochUnit::Seconds)]
    epoch_unit: EpochUnit,

    /// Sort newest first
    #[arg(long)]
    descending: bool,

    /// Print a JSON summary of the run to standard output
    #[arg(long)]
    json: bool,

    /// Log per-file details
    #[arg(long, short = 'v', conflicts_with = "quiet")]
    verbose: bool,

    /// Log warnings and errors only
    #[arg(long, short = 'q')]
    quiet: bool,
}

impl Args {
    fn config(&self) -> MergeConfig {
        MergeConfig::new(&self.dir, &self.output)
            .with_pattern(&self.pattern)
            .with_timestamp_column(&self.timestamp_column)
            .with_input_format(self.format)
            .with_sheet(self.sheet.clone())
            .with_input_delimiter(self.delimiter)
            .with_output_delimiter(self.output_delimiter)
            .with_bad_timestamp(self.on_bad_timestamp)
            .with_epoch_unit(self.epoch_unit)
            .with_descending(self.descending)
    }

    fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    if let Err(e) = run(&args) {
        error!("{e:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(args: &Args) -> anyhow::Result<()> {
    let report = Merger::new(args.config())
        .run()
        .context("merge aborted, no output written")?;

    if !report.skipped.is_empty() {
        warn!(
            "{} of {} files skipped: {}",
            report.skipped.len(),
            report.files_found,
            report
                .skipped
                .iter()
                .map(|s| s.path.display())
                .join(", ")
        );
    }
    info!(
        "process completed; merged file saved as {}",
        report.output.display()
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
