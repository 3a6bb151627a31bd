//! CLI binary for lectern.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `LecternConfig` and prints results. All real behaviour lives in the
//! library; this file is argument parsing and terminal presentation.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lectern::{DocumentSource, Lectern, LecternConfig};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # List the available generation modes
  lectern modes

  # Stream a study guide to the terminal
  lectern generate --mode STUDY_GUIDE lecture1.pdf lecture2.pdf

  # Flashcards, written to a file in one shot
  lectern generate --mode FLASHCARD_CREATION --no-stream -o cards.md deck.pdf

  # Warm the cache without generating anything
  lectern prepare slides/*.pdf

  # Remove cache entries older than the configured age (default 7 days)
  lectern expire
  lectern expire --max-age-days 1

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY   API key for the completion service
  RUST_LOG         Log filter (e.g. lectern=debug)

SETUP:
  1. Set API key:  export OPENAI_API_KEY=sk-...
  2. Generate:     lectern generate --mode STUDY_GUIDE notes.pdf
"#;

/// Generate study materials from PDF course documents.
#[derive(Parser, Debug)]
#[command(
    name = "lectern",
    version,
    about = "Generate study materials from PDF course documents with LLMs",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Cache directory for extracted document text.
    #[arg(long, env = "LECTERN_CACHE_DIR", default_value = ".lectern-cache", global = true)]
    cache_dir: PathBuf,

    /// Completion-service model.
    #[arg(long, env = "LECTERN_MODEL", default_value = "gpt-4o", global = true)]
    model: String,

    /// Base URL of an OpenAI-compatible endpoint.
    #[arg(long, env = "LECTERN_API_BASE_URL", default_value = "https://api.openai.com/v1", global = true)]
    api_base_url: String,

    /// Maximum output tokens per generation.
    #[arg(long, default_value_t = 4096, global = true)]
    max_tokens: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available generation modes.
    Modes,

    /// Extract the given PDFs into the cache and show a preview of each.
    Prepare {
        /// PDF files to process.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Generate study material from the given PDFs.
    Generate {
        /// Generation mode id (see `lectern modes`).
        #[arg(long)]
        mode: String,

        /// Wait for the complete text instead of streaming fragments.
        #[arg(long)]
        no_stream: bool,

        /// Write the output to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// PDF files to generate from.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove expired cache entries.
    Expire {
        /// Override the maximum entry age in days.
        #[arg(long)]
        max_age_days: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = LecternConfig::builder()
        .cache_dir(cli.cache_dir.clone())
        .model(cli.model.clone())
        .api_base_url(cli.api_base_url.clone())
        .max_output_tokens(cli.max_tokens);
    if let Command::Expire {
        max_age_days: Some(days),
    } = &cli.command
    {
        builder = builder.cache_max_age(Duration::from_secs(days * 86_400));
    }
    let config = builder.build().context("invalid configuration")?;
    let lectern = Lectern::new(config).context("failed to initialise")?;

    match cli.command {
        Command::Modes => {
            for mode in Lectern::list_use_cases() {
                println!("{:<22} {}", mode.id, dim(mode.name));
            }
            Ok(())
        }
        Command::Prepare { files } => prepare(&lectern, &files).await,
        Command::Generate {
            mode,
            no_stream,
            output,
            files,
        } => generate(&lectern, &mode, no_stream, output.as_deref(), &files).await,
        Command::Expire { .. } => {
            let removed = lectern.expire_cache().await?;
            eprintln!("{} {} expired cache entr{} removed", green("✔"), bold(&removed.to_string()), if removed == 1 { "y" } else { "ies" });
            Ok(())
        }
    }
}

/// Read the given paths into labelled document sources.
fn read_documents(files: &[PathBuf]) -> Result<Vec<DocumentSource>> {
    files
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(DocumentSource::new(label, bytes))
        })
        .collect()
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

async fn prepare(lectern: &Lectern, files: &[PathBuf]) -> Result<()> {
    let documents = read_documents(files)?;
    let bar = spinner("Extracting…");
    let prepared = lectern.prepare(&documents).await;
    bar.finish_and_clear();

    let prepared = prepared?;
    for doc in &prepared {
        println!("{}", bold(&doc.label));
        println!("  {}", dim(&doc.preview.replace('\n', " ")));
    }
    eprintln!("{} {} document(s) cached", green("✔"), prepared.len());
    Ok(())
}

async fn generate(
    lectern: &Lectern,
    mode: &str,
    no_stream: bool,
    output: Option<&std::path::Path>,
    files: &[PathBuf],
) -> Result<()> {
    let documents = read_documents(files)?;

    let text = if no_stream {
        let bar = spinner("Generating…");
        let result = lectern.process(mode, &documents).await;
        bar.finish_and_clear();
        result?
    } else {
        let mut fragments = lectern.process_stream(mode, &documents).await?;
        let mut full = String::new();
        let mut stdout = std::io::stdout();
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(fragment) => {
                    if output.is_none() {
                        stdout.write_all(fragment.as_bytes())?;
                        stdout.flush()?;
                    }
                    full.push_str(&fragment);
                }
                Err(e) => {
                    if !full.is_empty() {
                        eprintln!();
                        eprintln!("{} partial output kept ({} chars)", dim("⚠"), full.len());
                    }
                    bail!(e);
                }
            }
        }
        if output.is_none() {
            stdout.write_all(b"\n")?;
        }
        full
    };

    if let Some(path) = output {
        std::fs::write(path, &text)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        eprintln!("{} wrote {} chars to {}", green("✔"), text.len(), path.display());
    } else if no_stream {
        println!("{text}");
    }
    Ok(())
}
