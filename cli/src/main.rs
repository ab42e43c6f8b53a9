//! pdfbatch CLI - batch extraction for page-limited PDF services

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfbatch::{
    inspect_file, parse_kinds, plan, BatchConfig, BatchError, BatchPlan, CommandService, KindSet,
    Orchestrator, OutputLayout, PageRange, RunObserver, RunOutcome, DEFAULT_MAX_BATCH_PAGES,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Exit code for a run that finished with failed batches.
const EXIT_PARTIAL: i32 = 2;

#[derive(Parser)]
#[command(name = "pdfbatch")]
#[command(version)]
#[command(about = "Split large PDFs into page batches for extraction services", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text, images, tables, and metadata batch by batch
    Extract {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory (default: <file dir>/<file stem>)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Show how a PDF would be split into batches
    Plan {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Largest number of pages per batch
        #[arg(long, env = "PDFBATCH_MAX_BATCH_PAGES", default_value_t = DEFAULT_MAX_BATCH_PAGES)]
        max_batch_pages: u32,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Largest number of pages per batch
        #[arg(long, env = "PDFBATCH_MAX_BATCH_PAGES", default_value_t = DEFAULT_MAX_BATCH_PAGES)]
        max_batch_pages: u32,
    },

    /// Show version information
    Version,
}

#[derive(Args)]
struct BatchArgs {
    /// Extractor command; {input}, {output}, {kinds}, {start}, {end} are substituted
    #[arg(long, env = "PDFBATCH_EXTRACTOR", value_name = "CMD")]
    extractor: String,

    /// Artifact kinds to extract (text, image, table, metadata)
    #[arg(long, env = "PDFBATCH_KINDS", value_name = "KINDS", default_value = "all")]
    kind: String,

    /// Extract every artifact kind (overrides --kind)
    #[arg(long)]
    all: bool,

    /// Largest number of pages per batch
    #[arg(long, env = "PDFBATCH_MAX_BATCH_PAGES", default_value_t = DEFAULT_MAX_BATCH_PAGES)]
    max_batch_pages: u32,

    /// Keep going after a batch fails and write a partial result
    #[arg(long, env = "PDFBATCH_CONTINUE_ON_FAILURE")]
    continue_on_failure: bool,

    /// Seconds allowed for one extractor call
    #[arg(long, env = "PDFBATCH_TIMEOUT", value_name = "SECS", default_value_t = 120)]
    timeout: u64,

    /// Number of batches in flight at once
    #[arg(long, env = "PDFBATCH_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Pause between extractor calls, in milliseconds
    #[arg(long, env = "PDFBATCH_DELAY_MS", value_name = "MS", default_value_t = 0)]
    delay_ms: u64,
}

impl BatchArgs {
    fn kinds(&self) -> CliResult<KindSet> {
        let list = if self.all { "all" } else { &self.kind };
        parse_kinds(list).map_err(|e| format!("Invalid --kind: {}", e).into())
    }

    fn config(&self) -> BatchConfig {
        BatchConfig::new()
            .with_max_batch_pages(self.max_batch_pages)
            .with_continue_on_batch_failure(self.continue_on_failure)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_concurrency(self.concurrency)
            .with_inter_batch_delay(Duration::from_millis(self.delay_ms))
    }
}

/// Drives a progress bar from orchestrator events.
struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

impl RunObserver for ProgressObserver {
    fn run_started(&self, plan: &BatchPlan) {
        self.bar.set_length(plan.len() as u64);
        self.bar.set_message("Starting...");
    }

    fn batch_started(&self, _index: usize, range: PageRange) {
        self.bar.set_message(format!("Extracting {}...", range));
    }

    fn batch_succeeded(&self, _index: usize, _range: PageRange) {
        self.bar.inc(1);
    }

    fn batch_failed(&self, _index: usize, range: PageRange, cause: &BatchError) {
        self.bar
            .println(format!("{} {}: {}", "Failed".red(), range, cause));
        self.bar.inc(1);
    }

    fn run_finished(&self, outcome: &RunOutcome) {
        if outcome.is_complete() {
            self.bar.finish_with_message("Done!");
        } else {
            self.bar.finish_with_message("Finished with failures");
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Extract {
            input,
            output,
            batch,
        }) => cmd_extract(&input, output.as_deref(), &batch),
        Some(Commands::Plan {
            input,
            max_batch_pages,
            json,
        }) => cmd_plan(&input, max_batch_pages, json).map(|_| true),
        Some(Commands::Info {
            input,
            max_batch_pages,
        }) => cmd_info(&input, max_batch_pages).map(|_| true),
        Some(Commands::Version) => {
            cmd_version();
            Ok(true)
        }
        None => {
            if let Some(input) = cli.input {
                cmd_info(&input, DEFAULT_MAX_BATCH_PAGES).map(|_| {
                    println!();
                    println!(
                        "{}",
                        format!(
                            "To extract: pdfbatch extract {} --extractor <CMD>",
                            input.display()
                        )
                        .yellow()
                    );
                    true
                })
            } else {
                println!("{}", "Usage: pdfbatch extract <FILE> --extractor <CMD>".yellow());
                println!("       pdfbatch --help for more information");
                Ok(true)
            }
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(EXIT_PARTIAL),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            process::exit(1);
        }
    }
}

/// Returns whether every batch was merged.
fn cmd_extract(input: &Path, output: Option<&Path>, args: &BatchArgs) -> CliResult<bool> {
    let kinds = args.kinds()?;
    let config = args.config();
    config.validate()?;

    let layout = output
        .map(OutputLayout::new)
        .unwrap_or_else(|| OutputLayout::beside(input));

    let doc = inspect_file(input)?;
    let plan = plan(doc.page_count(), config.max_batch_pages)?;
    println!(
        "{} {} ({} pages, {} batches)",
        "Processing".cyan().bold(),
        input.display(),
        doc.page_count(),
        plan.len()
    );

    let service = CommandService::from_command_line(&args.extractor)?;
    let orchestrator = Orchestrator::new(Arc::new(service), config)
        .with_observer(Arc::new(ProgressObserver::new()));
    let outcome = orchestrator.run(&doc, &plan, &kinds)?;

    let written = layout.write(&outcome)?;
    let stats = outcome.merged().stats();

    println!("\n{}", "Output files:".green().bold());
    let top_level: Vec<&PathBuf> = written
        .iter()
        .filter(|p| p.parent() == Some(layout.root()))
        .collect();
    for (i, path) in top_level.iter().enumerate() {
        let branch = if i + 1 == top_level.len() { "└─" } else { "├─" };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = if path.is_dir() { "/" } else { "" };
        println!("  {} {}{}", branch.dimmed(), name, suffix);
    }

    println!();
    println!("{}: {}", "Batches merged".bold(), stats.batch_count);
    println!("{}: {}", "Pages merged".bold(), stats.page_count);
    println!("{}: {}", "Text bytes".bold(), stats.text_bytes);
    println!("{}: {}", "Images".bold(), stats.image_count);
    println!("{}: {}", "Tables".bold(), stats.table_count);

    if outcome.is_complete() {
        println!("\n{} {}", "Done!".green().bold(), layout.root().display());
        return Ok(true);
    }

    println!(
        "\n{} {} batches failed:",
        "Partial result.".yellow().bold(),
        outcome.failures().len()
    );
    for failure in outcome.failures() {
        println!("  {} {}: {}", "✗".red(), failure.range, failure.cause);
    }
    Ok(false)
}

fn cmd_plan(input: &Path, max_batch_pages: u32, json: bool) -> CliResult<()> {
    let doc = inspect_file(input)?;
    let plan = plan(doc.page_count(), max_batch_pages)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!(
        "{} ({} pages, at most {} per batch)",
        "Batch Plan".cyan().bold(),
        plan.page_count(),
        plan.max_batch_pages()
    );
    println!("{}", "─".repeat(40).dimmed());
    for (i, range) in plan.iter().enumerate() {
        println!("{:>4}  {}-{}", i + 1, range.start(), range.end());
    }
    Ok(())
}

fn cmd_info(input: &Path, max_batch_pages: u32) -> CliResult<()> {
    let doc = inspect_file(input)?;
    let plan = plan(doc.page_count(), max_batch_pages)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), doc.version());
    println!("{}: {}", "Pages".bold(), doc.page_count());
    println!(
        "{}: {} (at most {} pages each)",
        "Batches".bold(),
        plan.len(),
        max_batch_pages
    );
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdfbatch".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Batch extraction for page-limited PDF services");
    println!();
    println!("License: MIT");
}
