//! # pdfqa CLI
//!
//! The `pdfqa` binary serves the HTTP API and offers one-shot commands for
//! asking questions and inspecting extraction from the terminal.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfqa serve` | Start the HTTP server |
//! | `pdfqa ask "<question>" [--pdf <file>]...` | Ingest PDFs (optional) and answer once |
//! | `pdfqa pages <file>` | Print the page records extracted from a PDF |
//!
//! ## Examples
//!
//! ```bash
//! # Start the API for the chat front end
//! pdfqa serve --config ./config/pdfqa.toml
//!
//! # Ask about a local report
//! pdfqa ask "What were the Q3 results?" --pdf report.pdf
//!
//! # Ask without documents (bare model)
//! pdfqa ask "What is 2+2?"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pdfqa::config::load_config;
use pdfqa::core::engine;
use pdfqa::core::session::SessionStore;
use pdfqa::extract::extract_pages;
use pdfqa::ingest::{ingest, UploadedFile};
use pdfqa::{build_pipeline, server};

/// pdfqa: ask questions about PDFs with retrieval-augmented generation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults (local embeddings, Gemini).
#[derive(Parser)]
#[command(
    name = "pdfqa",
    about = "Ask questions about PDFs with retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pdfqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves `/upload-pdfs/`, `/ask-question/`,
    /// `/clear-rag/`, and `/health`.
    Serve,

    /// Answer one question.
    ///
    /// With `--pdf`, the files are indexed into a fresh session first and the
    /// answer is grounded in them; without, the model answers directly.
    Ask {
        /// The question to answer.
        question: String,

        /// PDF file to index before asking (repeatable).
        #[arg(long = "pdf")]
        pdfs: Vec<PathBuf>,
    },

    /// Print the non-blank pages extracted from a PDF.
    Pages {
        /// PDF file to read.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load_config(&cli.config)?;
            let pipeline = build_pipeline(&config)?;
            server::run_server(&config, pipeline).await?;
        }
        Commands::Ask { question, pdfs } => {
            let config = load_config(&cli.config)?;
            let pipeline = build_pipeline(&config)?;
            let store = SessionStore::new();

            if !pdfs.is_empty() {
                let files = pdfs
                    .iter()
                    .map(|path| read_upload(path))
                    .collect::<Result<Vec<_>>>()?;
                let report = ingest(files, &pipeline, &store).await?;
                println!("{}", report.message());
            }

            let result = engine::ask(
                &store,
                pipeline.llm.as_ref(),
                pipeline.params.direct_temperature,
                &question,
            )
            .await?;

            println!("\n{}\n", result.answer());
            println!("mode: {}", result.mode());
            for page in result.sources() {
                println!("  source: {}", page.tag());
            }
        }
        Commands::Pages { file } => {
            let upload = read_upload(&file)?;
            let pages = extract_pages(&upload.name, &upload.bytes)?;
            if pages.is_empty() {
                println!("No pages with text in {}", upload.name);
            }
            for page in pages {
                println!("── {} ──", page.tag());
                println!("{}\n", page.text.trim());
            }
        }
    }

    Ok(())
}

fn read_upload(path: &PathBuf) -> Result<UploadedFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedFile::new(name, bytes))
}
