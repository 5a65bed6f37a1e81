// pagemark CLI: extract page identifiers from a PDF and save cropped page images
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pagemark::config::{CollisionPolicy, Config, ExecutionStrategy};
use pagemark::orchestrator::normalize_path;
use pagemark::pdf_extraction::{LopdfSource, PageSource};
use pagemark::system_pdf_renderer::SystemPdfRenderer;
use pagemark::{logging, NoProgress, Orchestrator, ProgressSink, StderrProgress};

#[derive(Parser, Debug)]
#[command(name = "pagemark")]
#[command(version, about = "Name cropped PDF page images after the identifier printed on each page", long_about = None)]
struct Cli {
    /// Config file (default: ./pagemark.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Audit log file, `-` for stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process every page of a PDF
    Convert {
        /// Input PDF file
        input: PathBuf,

        /// Output folder for <identifier>.png images (created if missing)
        output: PathBuf,

        /// Identifier regex
        #[arg(short, long)]
        pattern: Option<String>,

        /// Fraction of width and height kept, anchored top-left
        #[arg(long)]
        crop_ratio: Option<f64>,

        /// Tesseract language
        #[arg(short, long)]
        lang: Option<String>,

        /// Worker count
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Process pages one at a time, in order
        #[arg(long)]
        sequential: bool,

        /// Render resolution for OCR and images
        #[arg(long)]
        dpi: Option<u32>,

        /// Don't save images for identifiers found in embedded text
        #[arg(long)]
        no_native_artifacts: bool,

        /// What to do when two pages share an identifier
        #[arg(long, value_enum)]
        collision: Option<CollisionPolicy>,

        /// Write the per-page report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// No progress or per-page lines
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show page count of a PDF
    Info {
        /// Input PDF file
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover()?,
    };
    if let Some(log_file) = cli.log_file {
        config.log_file = log_file;
    }
    logging::init(&config.log_file)
        .with_context(|| format!("failed to open log file {}", config.log_file.display()))?;

    match cli.command {
        Commands::Convert {
            input,
            output,
            pattern,
            crop_ratio,
            lang,
            jobs,
            sequential,
            dpi,
            no_native_artifacts,
            collision,
            report,
            quiet,
        } => {
            if let Some(pattern) = pattern {
                config.identifier_pattern = pattern;
            }
            if let Some(ratio) = crop_ratio {
                config.crop_ratio = ratio;
            }
            if let Some(lang) = lang {
                config.recognition_language = lang;
            }
            if let Some(jobs) = jobs {
                config.concurrency = jobs;
            }
            if sequential {
                config.strategy = ExecutionStrategy::Sequential;
            }
            if let Some(dpi) = dpi {
                config.dpi = dpi;
            }
            if no_native_artifacts {
                config.persist_native_matches = false;
            }
            if let Some(policy) = collision {
                config.collision_policy = policy;
            }
            convert(config, input, output, report, quiet).await
        }
        Commands::Info { input } => show_info(&config, input),
    }
}

async fn convert(
    config: Config,
    input: PathBuf,
    output: PathBuf,
    report_path: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    if !quiet {
        println!("[*] Processing: {}", input.display());
        println!("[*] Output: {}", output.display());
    }

    let orchestrator = Orchestrator::from_config(config);
    let progress: &dyn ProgressSink = if quiet { &NoProgress } else { &StderrProgress };
    let report = orchestrator
        .run(&input, &output, progress)
        .await
        .with_context(|| format!("Failed to process PDF: {}", input.display()))?;

    if !quiet {
        for result in &report.results {
            println!("{}", result.status_line());
        }
        println!("\n[✓] {}", report.summary());
    }

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
    }

    Ok(())
}

fn show_info(config: &Config, input: PathBuf) -> Result<()> {
    let input = normalize_path(&input);
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let source = LopdfSource::new(SystemPdfRenderer::new(&config.pdftoppm_path));
    let document = source
        .open(&input)
        .with_context(|| format!("Failed to open PDF: {}", input.display()))?;

    println!("PDF Information");
    println!("===============");
    println!("File: {}", input.display());
    println!("Pages: {}", document.page_count());

    Ok(())
}
