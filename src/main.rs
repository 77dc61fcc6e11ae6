//! Bookdup Duplicate Book Detection
//!
//! Scans a Calibre library (or a JSON/XLSX catalog export) for records
//! that likely describe the same book.

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use bookdup::config::{self, ConfigFile};
use bookdup::models::{ScanParams, ScanReport, Strategy, TargetParams, TargetReport};
use bookdup::output::{
    render_markdown, render_target_markdown, write_csv, write_groups, write_json, write_summary,
    write_target_csv, write_target_json, write_target_report, OutputError,
};
use bookdup::scan::{check_library, scan_library};
use bookdup::source::open_source;

#[derive(Parser)]
#[command(name = "bookdup")]
#[command(about = "Find duplicate books in a Calibre library")]
#[command(version)]
struct Cli {
    /// Config file (default: ./.bookdup.toml over the platform config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Pretty-printed JSON report
    Json,
    /// One row per grouped record
    Csv,
    /// Markdown listing
    Markdown,
}

/// Grouping strategy (CLI version, mirrors models::Strategy)
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliStrategy {
    /// Similar normalized titles
    Title,
    /// Same author, similar titles
    #[value(alias = "author_title")]
    AuthorTitle,
    /// Shared ISBN/ASIN/other identifier
    #[value(alias = "identifiers")]
    Identifier,
}

impl From<CliStrategy> for Strategy {
    fn from(strategy: CliStrategy) -> Self {
        match strategy {
            CliStrategy::Title => Strategy::Title,
            CliStrategy::AuthorTitle => Strategy::AuthorTitle,
            CliStrategy::Identifier => Strategy::Identifier,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the whole library for duplicate groups
    ///
    /// Parameters not given on the command line come from the config file,
    /// then from ScanParams::default().
    Scan {
        /// Calibre library directory, metadata.db, or a .json/.xlsx catalog
        #[arg(long, env = "CALIBRE_LIBRARY_PATH")]
        library: Option<PathBuf>,

        /// Grouping strategy [default: title]
        #[arg(long, value_enum)]
        strategy: Option<CliStrategy>,

        /// Title similarity threshold, 0.0-1.0 [default: 0.8]
        #[arg(long)]
        threshold: Option<f64>,

        /// Maximum number of groups to report [default: 50]
        #[arg(long)]
        max_groups: Option<usize>,

        /// Output format [default: text]
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Write output to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print only the first N groups in text output
        #[arg(long)]
        show_groups: Option<usize>,

        /// Suppress progress output
        #[arg(long)]
        quiet: bool,
    },

    /// Find duplicates of a single book
    Check {
        /// Calibre library directory, metadata.db, or a .json/.xlsx catalog
        #[arg(long, env = "CALIBRE_LIBRARY_PATH")]
        library: Option<PathBuf>,

        /// ID of the book to check
        #[arg(long)]
        book_id: u64,

        /// Matching strategy [default: title]
        #[arg(long, value_enum)]
        strategy: Option<CliStrategy>,

        /// Title similarity threshold, 0.0-1.0 [default: 0.8]
        #[arg(long)]
        threshold: Option<f64>,

        /// Require the same author when the identifier strategy falls back to titles
        #[arg(long)]
        same_author: bool,

        /// Output format [default: text]
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Write output to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Suppress progress output
        #[arg(long)]
        quiet: bool,
    },

    /// Show library statistics
    Stats {
        /// Calibre library directory, metadata.db, or a .json/.xlsx catalog
        #[arg(long, env = "CALIBRE_LIBRARY_PATH")]
        library: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => config::load_from_path(path)?,
        None => config::load_config(),
    };

    match cli.command {
        Commands::Scan {
            library,
            strategy,
            threshold,
            max_groups,
            format,
            output,
            show_groups,
            quiet,
        } => {
            let library = resolve_library(library, &config)?;
            let source = open_source(&library)?;

            // Overlay command-line values onto config/defaults
            let defaults = config.scan_params();
            let params = ScanParams {
                strategy: strategy.map(Strategy::from).unwrap_or(defaults.strategy),
                threshold: threshold.unwrap_or(defaults.threshold),
                max_groups: max_groups.unwrap_or(defaults.max_groups),
            };

            let report = scan_library(source.as_ref(), &params, !quiet)?;

            let show_groups = show_groups.or(config.output.as_ref().and_then(|o| o.show_groups));
            let mut writer = open_output(output.as_deref())?;
            write_scan_report(
                &report,
                resolve_format(format, &config),
                show_groups,
                !quiet,
                &mut writer,
            )?;
            writer.flush()?;

            if let Some(path) = output {
                if !quiet {
                    eprintln!("\nOutput: {}", path.display());
                }
            }
        }

        Commands::Check {
            library,
            book_id,
            strategy,
            threshold,
            same_author,
            format,
            output,
            quiet,
        } => {
            let library = resolve_library(library, &config)?;
            let source = open_source(&library)?;

            let defaults = config.target_params();
            let params = TargetParams {
                strategy: strategy.map(Strategy::from).unwrap_or(defaults.strategy),
                threshold: threshold.unwrap_or(defaults.threshold),
                same_author: same_author || defaults.same_author,
            };

            let report = check_library(source.as_ref(), book_id, &params, !quiet)?;

            let mut writer = open_output(output.as_deref())?;
            write_check_report(&report, resolve_format(format, &config), &mut writer)?;
            writer.flush()?;

            if let Some(path) = &output {
                if !quiet {
                    eprintln!("\nOutput: {}", path.display());
                }
            }

            if report.result.is_not_found() {
                if !quiet {
                    eprintln!("Book {} not found in {}", book_id, source.describe());
                }
                std::process::exit(2);
            }
        }

        Commands::Stats { library } => {
            let library = resolve_library(library, &config)?;
            let source = open_source(&library)?;
            let stats = source.stats()?;

            println!("=== Library Statistics ===");
            println!("Source: {}", source.describe());
            println!("Total books: {}", stats.total_books);
            println!("Total authors: {}", stats.total_authors);
            println!("Books with identifiers: {}", stats.books_with_identifiers);
            println!("Total identifiers: {}", stats.total_identifiers);
            println!("Total formats: {}", stats.total_formats);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Command line (or CALIBRE_LIBRARY_PATH), then the config file.
fn resolve_library(
    library: Option<PathBuf>,
    config: &ConfigFile,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    library
        .or_else(|| config.library_path().map(Path::to_path_buf))
        .ok_or_else(|| {
            "no library given: pass --library, set CALIBRE_LIBRARY_PATH, or add [library] path to the config".into()
        })
}

fn resolve_format(format: Option<OutputFormat>, config: &ConfigFile) -> OutputFormat {
    format
        .or_else(|| {
            let name = config.output.as_ref()?.format.as_deref()?;
            match OutputFormat::from_str(name, true) {
                Ok(format) => Some(format),
                Err(_) => {
                    tracing::warn!(format = name, "unknown output format in config, using text");
                    None
                }
            }
        })
        .unwrap_or(OutputFormat::Text)
}


/// Render a scan report in `format`. The text summary is included when
/// `with_summary` is set.
fn write_scan_report<W: Write>(
    report: &ScanReport,
    format: OutputFormat,
    show_groups: Option<usize>,
    with_summary: bool,
    writer: &mut W,
) -> Result<(), OutputError> {
    match format {
        OutputFormat::Text => {
            if with_summary {
                write_summary(report, writer)?;
                writeln!(writer)?;
            }
            if report.groups.is_empty() {
                writeln!(writer, "No duplicates found.")?;
            } else {
                write_groups(&report.groups, show_groups, writer)?;
            }
        }
        OutputFormat::Json => {
            write_json(report, writer)?;
            writeln!(writer)?;
        }
        OutputFormat::Csv => write_csv(&report.groups, writer)?,
        OutputFormat::Markdown => writer.write_all(render_markdown(report).as_bytes())?,
    }
    Ok(())
}

fn write_check_report<W: Write>(
    report: &TargetReport,
    format: OutputFormat,
    writer: &mut W,
) -> Result<(), OutputError> {
    match format {
        OutputFormat::Text => write_target_report(report, writer)?,
        OutputFormat::Json => {
            write_target_json(report, writer)?;
            writeln!(writer)?;
        }
        OutputFormat::Csv => write_target_csv(report, writer)?,
        OutputFormat::Markdown => writer.write_all(render_target_markdown(report).as_bytes())?,
    }
    Ok(())
}

fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(File::create(path)?)),
        None => Ok(Box::new(io::stdout().lock())),
    }
}
