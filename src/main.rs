//! CLI entry point for `mbox2csv`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mbox2csv::config::Config;
use mbox2csv::convert::{self, ConvertEvent, ConvertSummary};
use mbox2csv::model::range::DateRange;

#[derive(Parser)]
#[command(
    name = "mbox2csv",
    version,
    about = "Convert an MBOX mail archive to CSV with date filtering"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an MBOX file to CSV
    Convert {
        /// Path to the MBOX file
        mbox_file: PathBuf,
        /// Path to the output CSV file (overwritten)
        csv_file: PathBuf,
        /// First day to include
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_day)]
        start_date: Option<NaiveDate>,
        /// Last day to include (up to 23:59:59)
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_day)]
        end_date: Option<NaiveDate>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected a date as YYYY-MM-DD ({e})"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mbox2csv::config::load_config(cli.config.as_deref());

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level);

    match cli.command {
        Commands::Convert {
            mbox_file,
            csv_file,
            start_date,
            end_date,
        } => cmd_convert(
            &mbox_file,
            &csv_file,
            DateRange::from_days(start_date, end_date),
            &config,
        ),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing on stderr. `RUST_LOG` overrides `level`.
fn setup_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mbox2csv", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let man = clap_mangen::Man::new(Cli::command());
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Convert an MBOX file to CSV.
///
/// Conversion failures are reported on stderr and do not change the exit status.
fn cmd_convert(mbox: &Path, csv: &Path, range: DateRange, config: &Config) -> anyhow::Result<()> {
    let options = config.convert_options(range);
    let start = Instant::now();
    let mut pb: Option<ProgressBar> = None;

    let result = convert::convert_mbox_to_csv(mbox, csv, &options, &mut |event| match event {
        ConvertEvent::Opened { path, total } => {
            println!("Opening mbox file: {}", path.display());
            println!("Total emails in mbox: {total}");
            println!("Filtering from {range}");
            pb = Some(new_progress_bar(total));
        }
        ConvertEvent::Progress { processed, total } => {
            let line = format!("Processed {processed}/{total} emails...");
            match &pb {
                Some(bar) => {
                    bar.set_position(processed);
                    bar.suspend(|| println!("{line}"));
                }
                None => println!("{line}"),
            }
        }
    });

    if let Some(bar) = pb {
        bar.finish_and_clear();
    }

    match result {
        Ok(summary) => print_summary(csv, &summary, start.elapsed()),
        Err(e) => eprintln!("Error: {e}"),
    }
    Ok(())
}

fn new_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Converting [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

fn print_summary(csv: &Path, summary: &ConvertSummary, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    println!(
        "Conversion complete. {} emails within date range exported to {}",
        summary.exported,
        csv.display()
    );

    let skipped = summary.missing_date + summary.bad_date + summary.out_of_range;
    if skipped > 0 || summary.body_errors > 0 {
        println!();
        println!("  {:<25} {}", "Without Date header", summary.missing_date);
        println!("  {:<25} {}", "Malformed Date header", summary.bad_date);
        println!("  {:<25} {}", "Outside date range", summary.out_of_range);
        println!("  {:<25} {}", "Body extraction errors", summary.body_errors);
    }
    if let Ok(meta) = std::fs::metadata(csv) {
        println!("  {:<25} {}", "Output size", format_size(meta.len(), BINARY));
    }
    println!("  {:<25} {:.2?}", "Elapsed", elapsed);
}
