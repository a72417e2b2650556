//! CLI binary for pdfcover.
//!
//! A thin shim over the library crate: subcommands map to library calls and
//! print the results.

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfcover::pipeline::{encode, input, preview};
use pdfcover::providers::{
    self, http, query, ImageGenerator, OpenAiImageGenerator, ThumbnailPool, SEARCH_TIMEOUT_SECS,
};
use pdfcover::{
    prompts, target, AppConfig, BatchReport, CoverCandidate, ExportOptions,
    ExportProgressCallback, ExportTarget, Exporter, JobState, PageSize, ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders a live progress bar with one log line per finished job.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time and display name of each running job.
    started: Mutex<HashMap<usize, (Instant, String)>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            started: Mutex::new(HashMap::new()),
        })
    }

    fn finish_job(&self, index: usize) -> (String, f64) {
        self.started
            .lock()
            .unwrap()
            .remove(&index)
            .map(|(t, name)| (name, t.elapsed().as_secs_f64()))
            .unwrap_or_default()
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_jobs: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} books  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_jobs as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Exporting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Exporting {total_jobs} book(s)…"))
        ));
    }

    fn on_job_start(&self, index: usize, _total: usize, source: &Path) {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        self.bar.set_message(name.clone());
        self.started
            .lock()
            .unwrap()
            .insert(index, (Instant::now(), name));
    }

    fn on_job_state(&self, _index: usize, state: &JobState) {
        if !state.is_terminal() {
            self.bar.set_prefix(state.name().to_string());
        }
    }

    fn on_job_complete(&self, index: usize, total: usize, output: &Path) {
        let (name, secs) = self.finish_job(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {}  →  {}  {}",
            green("✓"),
            index + 1,
            total,
            name,
            output.display(),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_job_error(&self, index: usize, total: usize, error: &str) {
        let (name, secs) = self.finish_job(index);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {}  {}  {}",
            red("✗"),
            index + 1,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Which readers are plugged in?
  pdfcover devices

  # Look for covers, saving thumbnails to compare
  pdfcover search "Dune (1965).pdf" --thumbnails ./thumbs

  # Use search hit #2 as the cover and copy to the connected Kindle
  pdfcover inject "Dune (1965).pdf" --pick 2 --device kindle

  # Own image, Letter pages, into a folder
  pdfcover inject book.pdf --cover art.jpg --dest ./out --page-size letter

  # Generate a cover with AI for several books
  pdfcover inject a.pdf b.pdf --generate --dest ./out

  # Check the result
  pdfcover preview ./out/book.pdf -o first-page.png

CONFIGURATION:
  config.json (default: <config dir>/pdfcover/config.json)
    default_export_directory, cover_search_results, cover_page_size,
    cover_dpi, log_level, log_file, thumbnail_size, max_concurrent_downloads,
    ai_model, ai_image_size, ai_quality, api_keys_file

  api_keys.json (next to config.json)
    { "google_books_api_key": "...", "openai_api_key": "sk-..." }

ENVIRONMENT VARIABLES:
  PDFCOVER_CONFIG   Path to config.json
  RUST_LOG          Override the log filter
  PDFIUM_LIB_PATH   libpdfium used by `preview`
"#;

/// Put cover pages on PDF ebooks and copy them to e-readers.
#[derive(Parser, Debug)]
#[command(
    name = "pdfcover",
    version,
    about = "Put cover pages on PDF ebooks and copy them to e-readers",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to config.json.
    #[arg(long, global = true, env = "PDFCOVER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFCOVER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFCOVER_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List connected e-readers and the default export directory.
    Devices,

    /// Search Google Books and Open Library for covers.
    Search {
        /// A PDF file name (cleaned up into a title) or a title.
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        /// Download thumbnails into this directory as PNG.
        #[arg(long, value_name = "DIR")]
        thumbnails: Option<PathBuf>,
    },

    /// Generate a cover image with AI.
    #[command(group(ArgGroup::new("what").required(true).args(["title", "prompt"])))]
    Generate {
        /// Book title; uses the built-in cover prompt.
        #[arg(long)]
        title: Option<String>,

        /// Full prompt text.
        #[arg(long)]
        prompt: Option<String>,

        /// Image file to write.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Add a cover page to PDFs and export them.
    Inject(InjectArgs),

    /// Show page count and size of a PDF.
    Inspect { pdf: PathBuf },

    /// Rasterise the first page of a PDF to PNG.
    Preview {
        pdf: PathBuf,

        /// PNG file to write.
        #[arg(short, long)]
        output: PathBuf,

        /// Longest edge in pixels.
        #[arg(long, default_value_t = 800)]
        max_pixels: u32,
    },
}

#[derive(clap::Args, Debug)]
#[command(group(ArgGroup::new("cover_source").required(true).args(["cover", "pick", "generate"])))]
#[command(group(ArgGroup::new("destination").required(true).args(["dest", "device"])))]
struct InjectArgs {
    /// Source PDFs.
    #[arg(required = true)]
    pdfs: Vec<PathBuf>,

    /// Cover image file.
    #[arg(long)]
    cover: Option<PathBuf>,

    /// Use search hit N (1-based) for the first PDF's title.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pick: Option<u32>,

    /// Generate the cover with AI from the first PDF's title.
    #[arg(long)]
    generate: bool,

    /// Export into this folder.
    #[arg(long, value_name = "DIR")]
    dest: Option<PathBuf>,

    /// Export to a connected reader, optionally matched by name.
    #[arg(long, value_name = "NAME", num_args = 0..=1, default_missing_value = "")]
    device: Option<String>,

    /// Cover page size: a4 or letter.
    #[arg(long)]
    page_size: Option<PageSize>,

    /// Cover rendering DPI (72–600).
    #[arg(long, value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: Option<u32>,

    /// Replace the first page instead of prepending.
    #[arg(long)]
    replace_first_page: bool,

    /// Print the batch report as JSON.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&cli, &config)?;

    match &cli.command {
        Command::Devices => devices(&config),
        Command::Search {
            query,
            limit,
            thumbnails,
        } => search(&config, query, *limit, thumbnails.as_deref(), cli.quiet).await,
        Command::Generate {
            title,
            prompt,
            output,
        } => generate(&config, title.as_deref(), prompt.as_deref(), output).await,
        Command::Inject(args) => inject(args, &config, cli.quiet).await,
        Command::Inspect { pdf } => {
            let doc = pdfcover::inspect(pdf).context("Failed to inspect PDF")?;
            println!("File:   {}", doc.path().display());
            println!("Pages:  {}", doc.page_count());
            println!("Size:   {} bytes", doc.byte_size());
            Ok(())
        }
        Command::Preview {
            pdf,
            output,
            max_pixels,
        } => {
            let (w, h) = preview::save_preview(pdf, output, *max_pixels)
                .await
                .context("Preview failed")?;
            if !cli.quiet {
                eprintln!("{} {}  {}", green("✔"), output.display(), dim(&format!("{w}x{h}")));
            }
            Ok(())
        }
    }
}

// ── Logging ──────────────────────────────────────────────────────────────

/// Stderr logging filtered by `-v`/`-q`, `RUST_LOG` or `log_level`, plus an
/// uncoloured copy in `log_file` when configured.
fn init_logging(cli: &Cli, config: &AppConfig) -> Result<()> {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        config.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

// ── Commands ─────────────────────────────────────────────────────────────

fn devices(config: &AppConfig) -> Result<()> {
    let targets = target::list_devices(config);
    if targets.is_empty() {
        println!("No e-readers detected and no default export directory configured.");
        return Ok(());
    }
    for (i, t) in targets.iter().enumerate() {
        let flag = match t.writable {
            Some(true) => green("rw"),
            Some(false) => red("ro"),
            None => dim("?"),
        };
        println!("{:>2}. {}  {}", i + 1, t, flag);
    }
    Ok(())
}

async fn search(
    config: &AppConfig,
    input: &str,
    limit: Option<usize>,
    thumbnails: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let title = search_title(input);
    let credentials = config.load_credentials();
    let providers = providers::search_providers(&credentials)?;
    let outcome =
        providers::search_covers(&providers, &title, limit.unwrap_or(config.cover_search_results))
            .await;

    for warning in &outcome.warnings {
        eprintln!("{} {}", cyan("⚠"), warning);
    }
    if outcome.hits.is_empty() {
        println!("No covers found for '{title}'.");
        return Ok(());
    }
    for (i, hit) in outcome.hits.iter().enumerate() {
        println!(
            "{:>2}. {}  {}  {}",
            i + 1,
            bold(&hit.title),
            hit.author,
            dim(&format!("[{}]", hit.source))
        );
    }

    let Some(dir) = thumbnails else {
        return Ok(());
    };
    std::fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    let mut pool = ThumbnailPool::start(
        outcome.hits,
        http::client(SEARCH_TIMEOUT_SECS)?,
        config.thumbnail_size,
        config.max_concurrent_downloads,
    );
    let mut saved = 0usize;
    loop {
        let next = tokio::select! {
            t = pool.next() => Some(t),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(next) = next else {
            pool.cancel();
            eprintln!("{} thumbnail downloads cancelled", cyan("⚠"));
            break;
        };
        let Some(thumbnail) = next else { break };
        match thumbnail.image {
            Ok(image) => {
                let path = dir.join(format!("{:02}.png", thumbnail.index + 1));
                std::fs::write(&path, encode::encode_png(&image)?)
                    .with_context(|| format!("Cannot write {}", path.display()))?;
                saved += 1;
            }
            Err(e) => warn!("No thumbnail for #{}: {e}", thumbnail.index + 1),
        }
    }
    if !quiet {
        eprintln!("{} {saved}/{} thumbnail(s) saved to {}", green("✔"), pool.total(), dir.display());
    }
    Ok(())
}

async fn generate(
    config: &AppConfig,
    title: Option<&str>,
    prompt: Option<&str>,
    output: &Path,
) -> Result<()> {
    let prompt = match (prompt, title) {
        (Some(p), _) => p.to_string(),
        (None, Some(t)) => prompts::default_cover_prompt(t),
        (None, None) => bail!("Either --title or --prompt is required"),
    };
    let cover = generate_cover(config, &prompt).await?;
    std::fs::write(output, cover.bytes())
        .with_context(|| format!("Cannot write {}", output.display()))?;
    eprintln!(
        "{} {}  {}",
        green("✔"),
        output.display(),
        dim(&format!("{}x{}", cover.width(), cover.height()))
    );
    Ok(())
}

async fn inject(args: &InjectArgs, config: &AppConfig, quiet: bool) -> Result<()> {
    let options = ExportOptions::builder()
        .page_size(args.page_size.unwrap_or(config.cover_page_size))
        .dpi(args.dpi.unwrap_or(config.cover_dpi))
        .replace_first_page(args.replace_first_page)
        .build()
        .context("Invalid export options")?;

    let export_target = match (&args.dest, &args.device) {
        (Some(dir), _) => ExportTarget::folder(dir),
        (None, Some(name)) => pick_device(config, name)?,
        (None, None) => bail!("Either --dest or --device is required"),
    };

    let title = search_title(&args.pdfs[0].to_string_lossy());
    let cover: CoverCandidate = if let Some(path) = &args.cover {
        input::load_cover_image(path).context("Failed to load cover image")?
    } else if let Some(n) = args.pick {
        pick_search_hit(config, &title, n as usize).await?
    } else if args.generate {
        generate_cover(config, &prompts::default_cover_prompt(&title)).await?
    } else {
        bail!("One of --cover, --pick or --generate is required");
    };

    let show_progress = !quiet && !args.no_progress && !args.json;
    let mut exporter = Exporter::new(options);
    if show_progress {
        exporter = exporter.with_progress(CliProgressCallback::new() as ProgressCallback);
    }
    let token = exporter.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let report = exporter
        .run_sources(&args.pdfs, Arc::new(cover), &export_target)
        .await;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !quiet {
        print_summary(&report);
    }

    if !report.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// A title for searching: file names are cleaned up, other input is used as is.
fn search_title(input: &str) -> String {
    if query::looks_like_pdf(input) {
        query::sanitise_query(input)
    } else {
        input.trim().to_string()
    }
}

/// Resolve `--device [NAME]` against the detected readers.
fn pick_device(config: &AppConfig, name: &str) -> Result<ExportTarget> {
    let readers: Vec<ExportTarget> = target::list_devices(config)
        .into_iter()
        .filter(|t| t.device.is_some())
        .collect();
    let needle = name.trim().to_lowercase();
    let matches: Vec<&ExportTarget> = readers
        .iter()
        .filter(|t| {
            needle.is_empty()
                || t.label.to_lowercase().contains(&needle)
                || t.device
                    .is_some_and(|k| k.display_name().to_lowercase().contains(&needle))
        })
        .collect();

    match matches.as_slice() {
        [] if readers.is_empty() => bail!("No e-reader detected. Connect one or use --dest DIR."),
        [] => bail!("No connected e-reader matches '{name}'"),
        [only] => Ok((*only).clone()),
        several => {
            let names: Vec<String> = several.iter().map(|t| format!("  {t}")).collect();
            bail!(
                "Several e-readers are connected; name one with --device NAME:\n{}",
                names.join("\n")
            )
        }
    }
}

async fn pick_search_hit(config: &AppConfig, title: &str, n: usize) -> Result<CoverCandidate> {
    let providers = providers::search_providers(&config.load_credentials())?;
    let outcome =
        providers::search_covers(&providers, title, config.cover_search_results.max(n)).await;
    for warning in &outcome.warnings {
        eprintln!("{} {}", cyan("⚠"), warning);
    }
    let Some(hit) = outcome.hits.get(n - 1) else {
        bail!(
            "Search for '{title}' returned {} result(s); cannot pick #{n}",
            outcome.hits.len()
        );
    };
    let client = http::client(SEARCH_TIMEOUT_SECS)?;
    hit.fetch(&client)
        .await
        .with_context(|| format!("Failed to download cover #{n} ({})", hit.title))
}

async fn generate_cover(config: &AppConfig, prompt: &str) -> Result<CoverCandidate> {
    let generator = OpenAiImageGenerator::from_credentials(&config.load_credentials())?;
    generator
        .generate(prompt, &config.generation_options())
        .await
        .context("Cover generation failed")
}

fn print_summary(report: &BatchReport) {
    let total = report.results.len();
    if report.failed == 0 {
        eprintln!(
            "{} {} book(s) exported successfully",
            green("✔"),
            bold(&report.succeeded.to_string())
        );
        return;
    }
    eprintln!(
        "{} {}/{} book(s) exported  ({} failed)",
        if report.succeeded == 0 { red("✘") } else { cyan("⚠") },
        bold(&report.succeeded.to_string()),
        total,
        red(&report.failed.to_string()),
    );
    for result in &report.results {
        if let Some(error) = result.error() {
            eprintln!("   {}  {}", result.source.display(), red(&error.to_string()));
        }
    }
}
