//! CLI binary for kanban-cards.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `KanbanConfig`, runs one action and prints the result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use kanban_cards::{
    export_documents, export_print, generate_template, import_spreadsheet, CancelToken,
    DepartmentPalette, ExportTarget, HexColor, ImageKind, KanbanConfig, KanbanProgressCallback,
    ProgressCallback, QrSource, ValidationOutcome, TEMPLATE_FILENAME,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar over validated rows, plus one line per
/// image that fell back to its placeholder and per file written.
struct CliProgressCallback {
    bar: ProgressBar,
    image_failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Reading");
        bar.set_message("Opening spreadsheet…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            image_failures: AtomicUsize::new(0),
        })
    }
}

impl KanbanProgressCallback for CliProgressCallback {
    fn on_import_start(&self, total_rows: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} rows",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total_rows as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Validating");
    }

    fn on_row_validated(&self, _row: usize, _ok: bool) {
        self.bar.inc(1);
    }

    fn on_import_complete(&self, valid: usize, invalid: usize) {
        self.bar.set_prefix("Rendering");
        self.bar.set_message(format!("{valid} valid, {invalid} with errors"));
    }

    fn on_image_failed(&self, url: &str, kind: ImageKind, attempts: u32, error: &str) {
        self.image_failures.fetch_add(1, Ordering::SeqCst);
        let url = if url.chars().count() > 60 {
            format!("{}\u{2026}", url.chars().take(59).collect::<String>())
        } else {
            url.to_string()
        };
        self.bar.println(format!(
            "  {} {kind} image {}  {}",
            yellow("⚠"),
            url,
            dim(&format!("{attempts} attempt(s): {error}")),
        ));
    }

    fn on_document_written(&self, path: &Path) {
        self.bar
            .println(format!("  {} {}", green("✓"), bold(&path.display().to_string())));
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Write the blank spreadsheet template
  kanban template

  # Check a spreadsheet without generating anything
  kanban validate parts.xlsx

  # Machine-readable validation report
  kanban validate --json parts.xlsx > report.json

  # Cards and labels as PDF into ./out
  kanban generate parts.xlsx -o out

  # Labels only, images resolved against a web server
  kanban generate --target labels --base-url https://parts.example.com/ parts.xlsx

  # Self-printing HTML (opens the print dialog when loaded in a browser)
  kanban print parts.xlsx -o out

SPREADSHEET COLUMNS:
  Required   Product Name, Part Number, Description, Reorder Point,
             Reorder Quantity, Location, Department
  Optional   QR Code URL, Image URL, Department Color, Revision Date,
             Revision Number

ENVIRONMENT VARIABLES:
  KANBAN_OUTPUT           Output directory
  KANBAN_BASE_URL         Base for relative image paths
  KANBAN_MAX_RETRIES      Image load retries
  RUST_LOG                Log filter (overrides --verbose/--quiet)
"#;

/// Turn spreadsheet part data into printable kanban cards and bin labels.
#[derive(Parser, Debug)]
#[command(
    name = "kanban",
    version,
    about = "Turn spreadsheet part data into printable kanban cards and bin labels",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "KANBAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "KANBAN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the spreadsheet template.
    Template {
        /// Output file.
        #[arg(short, long, default_value = TEMPLATE_FILENAME)]
        output: PathBuf,
    },
    /// Validate a spreadsheet and report rows with errors.
    Validate {
        #[command(flatten)]
        import: ImportArgs,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Generate PDF cards and/or labels.
    Generate {
        #[command(flatten)]
        import: ImportArgs,

        #[command(flatten)]
        export: ExportArgs,
    },
    /// Generate self-printing HTML.
    Print {
        #[command(flatten)]
        import: ImportArgs,

        #[command(flatten)]
        export: ExportArgs,
    },
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Spreadsheet to read (xlsx, xls, ods).
    input: PathBuf,

    /// Base URL for relative image paths (default: current directory).
    #[arg(long, env = "KANBAN_BASE_URL")]
    base_url: Option<String>,

    /// Image load retries.
    #[arg(long, env = "KANBAN_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Delay between image load attempts, in milliseconds.
    #[arg(long, env = "KANBAN_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Timeout per image request, in milliseconds.
    #[arg(long, env = "KANBAN_IMAGE_TIMEOUT_MS", default_value_t = 5000)]
    image_timeout_ms: u64,

    /// Rows validated / images fetched at once.
    #[arg(short, long, env = "KANBAN_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// HEAD-check QR and image URLs while validating.
    #[arg(long, env = "KANBAN_CHECK_REACHABILITY")]
    check_reachability: bool,

    /// Disable progress bar.
    #[arg(long, env = "KANBAN_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Which documents to produce.
    #[arg(short, long, env = "KANBAN_TARGET", value_enum, default_value = "both")]
    target: TargetArg,

    /// Output directory.
    #[arg(short, long, env = "KANBAN_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// QR graphic source: local encoding or the row's QR image URL.
    #[arg(long, env = "KANBAN_QR_SOURCE", value_enum, default_value = "local")]
    qr_source: QrSourceArg,

    /// Delay between written files, in milliseconds.
    #[arg(long, env = "KANBAN_DOWNLOAD_DELAY_MS", default_value_t = 500)]
    download_delay_ms: u64,

    /// Department colour, as NAME=#RRGGBB. Repeatable.
    #[arg(long = "department", value_name = "NAME=COLOR")]
    departments: Vec<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TargetArg {
    Cards,
    Labels,
    Both,
}

impl From<TargetArg> for ExportTarget {
    fn from(v: TargetArg) -> Self {
        match v {
            TargetArg::Cards => ExportTarget::Cards,
            TargetArg::Labels => ExportTarget::Labels,
            TargetArg::Both => ExportTarget::Both,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum QrSourceArg {
    Local,
    Remote,
}

impl From<QrSourceArg> for QrSource {
    fn from(v: QrSourceArg) -> Self {
        match v {
            QrSourceArg::Local => QrSource::Local,
            QrSourceArg::Remote => QrSource::Remote,
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is given.
    let no_progress = match &cli.command {
        Command::Template { .. } => true,
        Command::Validate { import, json } => import.no_progress || *json,
        Command::Generate { import, .. } | Command::Print { import, .. } => import.no_progress,
    };
    let show_progress = !cli.quiet && !no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ctrl-C cancels the running action ────────────────────────────────
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let progress: Option<Arc<CliProgressCallback>> = show_progress.then(CliProgressCallback::new);
    let callback: Option<ProgressCallback> = progress
        .clone()
        .map(|cb| cb as Arc<dyn KanbanProgressCallback>);

    match &cli.command {
        Command::Template { output } => {
            let bytes = generate_template().context("Failed to build template")?;
            tokio::fs::write(output, bytes)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            if !cli.quiet {
                eprintln!("{} {}", green("✔"), bold(&output.display().to_string()));
            }
        }

        Command::Validate { import, json } => {
            let config = build_config(import, None, callback)?;
            let outcome = import_spreadsheet(&import.input, &config, &cancel)
                .await
                .context("Import failed")?;
            finish_bar(progress.as_deref());
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).context("Failed to serialise report")?
                );
            } else {
                print_report(&outcome, cli.quiet);
            }
            if !outcome.errors.is_empty() {
                std::process::exit(2);
            }
        }

        Command::Generate { import, export } | Command::Print { import, export } => {
            let start = Instant::now();
            let config = build_config(import, Some(export), callback)?;
            let palette = build_palette(&export.departments)?;

            let outcome = import_spreadsheet(&import.input, &config, &cancel)
                .await
                .context("Import failed")?;
            if outcome.valid_rows.is_empty() {
                finish_bar(progress.as_deref());
                print_report(&outcome, cli.quiet);
                anyhow::bail!("No valid rows to generate documents from");
            }

            let target = ExportTarget::from(export.target);
            let files = if matches!(cli.command, Command::Print { .. }) {
                export_print(&outcome.valid_rows, target, &palette, &export.output, &config, &cancel)
                    .await
                    .context("Print export failed")?
            } else {
                export_documents(&outcome.valid_rows, target, &palette, &export.output, &config, &cancel)
                    .await
                    .context("PDF export failed")?
            };
            finish_bar(progress.as_deref());

            if !cli.quiet {
                print_report(&outcome, true);
                let fallbacks = progress
                    .as_ref()
                    .map(|p| p.image_failures.load(Ordering::SeqCst))
                    .unwrap_or(0);
                eprintln!(
                    "{}  {} row(s)  {} file(s)  {}ms{}",
                    if outcome.errors.is_empty() {
                        green("✔")
                    } else {
                        yellow("⚠")
                    },
                    outcome.valid_rows.len(),
                    files.len(),
                    start.elapsed().as_millis(),
                    if fallbacks > 0 {
                        dim(&format!("  ({fallbacks} image placeholder(s))"))
                    } else {
                        String::new()
                    },
                );
                if progress.is_none() {
                    for file in &files {
                        eprintln!("   {}", bold(&file.display().to_string()));
                    }
                }
            }
        }
    }

    Ok(())
}

fn finish_bar(progress: Option<&CliProgressCallback>) {
    if let Some(p) = progress {
        p.bar.finish_and_clear();
    }
}

/// Print rejected rows; with `errors_only` the summary line is skipped.
fn print_report(outcome: &ValidationOutcome, errors_only: bool) {
    for row_error in &outcome.errors {
        eprintln!("  {} Row {}", red("✗"), row_error.row);
        for message in &row_error.errors {
            eprintln!("      {}", message);
        }
    }
    if !errors_only {
        eprintln!(
            "{} {} valid, {} with errors",
            if outcome.errors.is_empty() {
                green("✔")
            } else {
                red("✘")
            },
            bold(&outcome.valid_rows.len().to_string()),
            outcome.errors.len(),
        );
    }
}

/// Map CLI args to `KanbanConfig`.
fn build_config(
    import: &ImportArgs,
    export: Option<&ExportArgs>,
    progress: Option<ProgressCallback>,
) -> Result<KanbanConfig> {
    let mut builder = KanbanConfig::builder()
        .max_retries(import.max_retries)
        .retry_delay_ms(import.retry_delay_ms)
        .image_timeout_ms(import.image_timeout_ms)
        .concurrency(import.concurrency)
        .check_reachability(import.check_reachability);
    if let Some(ref base) = import.base_url {
        builder = builder.base_url(base.clone());
    }
    if let Some(export) = export {
        builder = builder
            .qr_source(export.qr_source.into())
            .download_delay_ms(export.download_delay_ms);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Parse repeated `--department NAME=#RRGGBB` into a palette over the defaults.
fn build_palette(entries: &[String]) -> Result<DepartmentPalette> {
    let mut palette = DepartmentPalette::new();
    for entry in entries {
        let (name, color) = entry
            .split_once('=')
            .with_context(|| format!("Expected NAME=COLOR, got '{entry}'"))?;
        let color: HexColor = color
            .trim()
            .parse()
            .with_context(|| format!("Invalid colour for department '{}'", name.trim()))?;
        let name = name.trim();
        if palette.color_for(name).is_some() {
            palette.update(name, color)?;
        } else {
            palette.add_with_color(name, color)?;
        }
    }
    Ok(palette)
}
