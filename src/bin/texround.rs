//! CLI binary for texround.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RoundTripConfig` and prints reports.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use texround::pipeline::plaintext::extract_text;
use texround::{
    annotate_project, build_caption_index, prepare_project, restore_file, round_trip,
    PandocConverter, ProgressCallback, ProgressObserver, RestoreOptions, RestoreReport,
    RoundTripConfig,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Spinner until the unit count is known, then a bar with one tick per unit.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Scanning");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ProgressObserver for CliProgress {
    fn on_run_start(&self, total_units: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} units  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_units as u64);
        self.bar.set_prefix("Preparing");
    }

    fn on_unit_complete(&self, _ordinal: usize, _total: usize, path: &str, listings: usize) {
        let note = if listings > 0 {
            dim(&format!("{listings} listings"))
        } else {
            String::new()
        };
        self.bar
            .println(format!("  {} {:<40} {}", green("✓"), path, note));
        self.bar.inc(1);
    }

    fn on_stage(&self, stage: &str) {
        self.bar.set_prefix("Restoring");
        self.bar.set_message(stage.to_string());
    }

    fn on_run_complete(&self, _restored: usize, _unresolved: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Normalize a thesis for pandoc
  texround prepare src/ -o build/prepared

  # Tag code blocks as captioned listings in the sources themselves
  texround annotate src/

  # Repair pandoc output, restoring labels and images
  texround restore build/converted.tex -o out/thesis.tex \
      --src-dir src/ --media-dir build/media

  # Whole round trip through pandoc
  texround roundtrip src/ --main main.tex -o out/thesis.tex

  # Compare original and restored text
  diff <(texround text src/main.tex) <(texround text out/thesis.tex)

ENVIRONMENT VARIABLES:
  TEXROUND_PANDOC       Path to the pandoc binary (default: search PATH)
  RUST_LOG              Override the log filter (e.g. texround=debug)
"#;

/// Restore LaTeX structure after a LaTeX → DOCX → LaTeX round trip.
#[derive(Parser, Debug)]
#[command(
    name = "texround",
    version,
    about = "Restore LaTeX structure after a LaTeX → DOCX → LaTeX round trip",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TEXROUND_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TEXROUND_QUIET")]
    quiet: bool,

    /// Print the report as JSON on stdout.
    #[arg(long, global = true, env = "TEXROUND_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "TEXROUND_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a normalized, converter-ready copy of a project.
    Prepare {
        /// Project source directory.
        src: PathBuf,
        /// Output directory for the prepared copy.
        #[arg(short, long, env = "TEXROUND_PREPARED_DIR")]
        output: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Tag eligible code blocks as captioned listings, in place.
    Annotate {
        src: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Repair converter output and restore labels, images and preamble.
    Restore {
        /// LaTeX written by the reverse converter.
        input: PathBuf,
        /// Restored document (default: overwrite the input).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Original sources, for label restoration.
        #[arg(long, env = "TEXROUND_SRC_DIR")]
        src_dir: Option<PathBuf>,
        /// Original assets (default: --src-dir).
        #[arg(long, env = "TEXROUND_ASSET_DIR")]
        asset_dir: Option<PathBuf>,
        /// Media extracted by the reverse converter.
        #[arg(long, env = "TEXROUND_MEDIA_DIR")]
        media_dir: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Prepare, convert through pandoc both ways, and restore.
    Roundtrip {
        src: PathBuf,
        /// Main unit, relative to the source directory.
        #[arg(long, default_value = "main.tex")]
        main: String,
        #[arg(short, long)]
        output: PathBuf,
        /// Keep intermediate files here (default: a temporary directory).
        #[arg(long, env = "TEXROUND_WORK_DIR")]
        work_dir: Option<PathBuf>,
        /// DOCX style template forwarded to pandoc.
        #[arg(long, env = "TEXROUND_REFERENCE_DOC")]
        reference_doc: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the readable text of a LaTeX file, for diffing.
    Text { file: PathBuf },
    /// Print the caption index of a project as JSON.
    Index { src: PathBuf },
}

/// Flags shared by the commands that transform text.
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Minimum non-blank lines for a code block to become a listing.
    #[arg(long, env = "TEXROUND_MIN_LISTING_LINES", default_value_t = 5)]
    min_listing_lines: usize,

    /// Percentage of glyph lines at which a block counts as a diagram.
    #[arg(long, env = "TEXROUND_DIAGRAM_PERCENT", default_value_t = 30,
          value_parser = clap::value_parser!(u32).range(0..=100))]
    diagram_percent: u32,

    /// Only number blocks already written as lstlisting.
    #[arg(long, env = "TEXROUND_NO_TAG")]
    no_tag: bool,

    /// File name of the title-page unit.
    #[arg(long, env = "TEXROUND_TITLE_UNIT")]
    title_unit: Option<String>,

    /// Word before listing numbers.
    #[arg(long, env = "TEXROUND_LISTING_PREFIX")]
    listing_prefix: Option<String>,

    /// Caption for listings with no preceding heading.
    #[arg(long, env = "TEXROUND_PLACEHOLDER_CAPTION")]
    placeholder_caption: Option<String>,

    /// Subsection titles promoted to sections (comma separated).
    #[arg(long, env = "TEXROUND_PROMOTE", value_delimiter = ',')]
    promote: Option<Vec<String>>,

    /// Section titles made unnumbered (comma separated).
    #[arg(long, env = "TEXROUND_UNNUMBERED", value_delimiter = ',')]
    unnumbered: Option<Vec<String>>,

    /// Directory next to the output that receives images.
    #[arg(long, env = "TEXROUND_ASSET_SUBDIR")]
    asset_subdir: Option<String>,

    /// File whose content replaces the built-in preamble.
    #[arg(long, env = "TEXROUND_PREAMBLE")]
    preamble: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs are noise while the bar is on screen.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgress::new() as Arc<dyn ProgressObserver>)
    } else {
        None
    };

    match &cli.command {
        Command::Prepare {
            src,
            output,
            config,
        } => {
            let config = build_config(config, progress)?;
            let report = prepare_project(src, output, &config).context("Prepare failed")?;
            if let Some(ref cb) = config.progress_callback {
                cb.on_run_complete(0, 0);
            }
            if cli.json {
                print_json(&report)?;
            } else if !cli.quiet {
                eprintln!(
                    "{} {} units  {} listings  {} assets  →  {}",
                    green("✔"),
                    report.units.len(),
                    report.total_listings(),
                    report.assets_staged,
                    bold(&output.display().to_string()),
                );
                for (chapter, count) in &report.listings_per_chapter {
                    eprintln!("   {}", dim(&format!("chapter {chapter}: {count} listings")));
                }
            }
        }

        Command::Annotate { src, config } => {
            let config = build_config(config, progress)?;
            let reports = annotate_project(src, &config).context("Annotate failed")?;
            if let Some(ref cb) = config.progress_callback {
                cb.on_run_complete(0, 0);
            }
            if cli.json {
                print_json(&reports)?;
            } else if !cli.quiet {
                let tagged: usize = reports.iter().map(|r| r.listings_tagged).sum();
                let files = reports.iter().filter(|r| r.written).count();
                eprintln!("{} tagged {tagged} listings in {files} files", green("✔"));
            }
        }

        Command::Restore {
            input,
            output,
            src_dir,
            asset_dir,
            media_dir,
            config,
        } => {
            let config = build_config(config, progress)?;
            let output = output.clone().unwrap_or_else(|| input.clone());
            let options = RestoreOptions {
                src_dir: src_dir.clone(),
                asset_dir: asset_dir.clone(),
                media_dir: media_dir.clone(),
            };
            let report =
                restore_file(input, &output, &options, &config).context("Restore failed")?;
            if cli.json {
                print_json(&report)?;
            } else if !cli.quiet {
                print_restore_summary(&report, &output);
            }
        }

        Command::Roundtrip {
            src,
            main,
            output,
            work_dir,
            reference_doc,
            config,
        } => {
            let config = build_config(config, progress)?;
            let converter = PandocConverter::locate()
                .context("pandoc is required for a round trip")?
                .reference_doc(reference_doc.clone());

            // The temp dir lives until the end of this arm.
            let temp;
            let work = match work_dir {
                Some(dir) => dir.clone(),
                None => {
                    temp = tempfile::TempDir::new().context("Failed to create work directory")?;
                    temp.path().to_path_buf()
                }
            };

            let result = round_trip(src, main, &work, output, &converter, &config)
                .context("Round trip failed")?;
            if cli.json {
                print_json(&result)?;
            } else if !cli.quiet {
                eprintln!(
                    "{} {} units  {} listings  via {}",
                    green("✔"),
                    result.prepare.units.len(),
                    result.prepare.total_listings(),
                    dim(&result.intermediate.display().to_string()),
                );
                print_restore_summary(&result.restore, &result.output);
            }
        }

        Command::Text { file } => {
            let tex = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", extract_text(&tex)).context("Failed to write to stdout")?;
        }

        Command::Index { src } => {
            let index = build_caption_index(src).context("Failed to index sources")?;
            print_json(&index)?;
        }
    }

    Ok(())
}

/// Map CLI args to `RoundTripConfig`.
fn build_config(args: &ConfigArgs, progress: Option<ProgressCallback>) -> Result<RoundTripConfig> {
    let mut builder = RoundTripConfig::builder()
        .min_listing_lines(args.min_listing_lines)
        .diagram_line_percent(args.diagram_percent)
        .tag_listings(!args.no_tag);

    if let Some(ref v) = args.title_unit {
        builder = builder.title_unit(v.clone());
    }
    if let Some(ref v) = args.listing_prefix {
        builder = builder.listing_prefix(v.clone());
    }
    if let Some(ref v) = args.placeholder_caption {
        builder = builder.placeholder_caption(v.clone());
    }
    if let Some(ref v) = args.promote {
        builder = builder.promote_titles(trimmed(v));
    }
    if let Some(ref v) = args.unnumbered {
        builder = builder.unnumbered_titles(trimmed(v));
    }
    if let Some(ref v) = args.asset_subdir {
        builder = builder.asset_subdir(v.clone());
    }
    if let Some(ref path) = args.preamble {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read preamble from {}", path.display()))?;
        builder = builder.preamble(text);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn trimmed(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise report")?;
    println!("{json}");
    Ok(())
}

fn print_restore_summary(report: &RestoreReport, output: &Path) {
    let clean = report.total_unresolved() == 0;
    eprintln!(
        "{}  {}",
        if clean { green("✔") } else { yellow("⚠") },
        bold(&output.display().to_string()),
    );
    eprintln!(
        "   labels  {} restored  {} already present  {} unresolved  {} equations skipped",
        report.labels_restored(),
        report
            .anchors
            .iter()
            .filter(|a| matches!(a, texround::AnchorOutcome::AlreadyPresent { .. }))
            .count(),
        report.labels_unresolved(),
        report.equations_skipped(),
    );
    eprintln!(
        "   images  {} mapped  {} unresolved  {} copied",
        report.images_mapped(),
        report.images_unresolved(),
        report.assets_copied,
    );
    if !report.stages_applied.is_empty() {
        eprintln!("   {} {}", cyan("repair:"), dim(&report.stages_applied.join(", ")));
    }
    for outcome in report.anchors.iter().filter(|a| !a.is_resolved()) {
        eprintln!("   {} {}", yellow("•"), dim(outcome.label()));
    }
}
