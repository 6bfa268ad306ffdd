//! # Code Scribe CLI (`scribe`)
//!
//! ## Usage
//!
//! ```bash
//! scribe --config ./config/scribe.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scribe organize` | Ingest the source and group files by language |
//! | `scribe metadata` | Write the per-file metadata store |
//! | `scribe structure` | Write the directory structure store |
//! | `scribe analyze [FILE]` | Print extracted functions, classes and comments |
//! | `scribe document` | Generate documentation for every chunk |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use code_scribe::progress::ProgressMode;
use code_scribe::{config, document_cmd, ingest, logging};

/// Code Scribe: source-code ingestion and LLM documentation pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/scribe.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "scribe",
    about = "Code Scribe: ingest a codebase and generate documentation for it",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scribe.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the source, classify files and group them by language.
    ///
    /// Writes the organized-corpus snapshot when `[output] corpus` is set.
    Organize,

    /// Record size and modification time for every file of the source.
    Metadata,

    /// Record the directory tree of the source.
    Structure,

    /// Extract functions, classes, comments and docstrings.
    ///
    /// With FILE, analyzes that single file (no config needed); otherwise
    /// analyzes every ingested file.
    Analyze {
        /// A single file to analyze.
        file: Option<PathBuf>,

        /// Language label to use instead of detection (e.g. `Python`).
        #[arg(long)]
        language: Option<String>,
    },

    /// Run the whole pipeline and write generated documentation.
    Document {
        /// Also produce per-chunk summaries and the combined overview.
        #[arg(long)]
        hierarchical: bool,

        /// Show file, chunk and request counts without calling the generator.
        #[arg(long)]
        dry_run: bool,

        /// Reuse the corpus snapshot written by `scribe organize` instead
        /// of ingesting the source again.
        #[arg(long)]
        from_snapshot: bool,

        /// Progress output on stderr: `human`, `json` or `off`.
        /// Defaults to human on a terminal, off otherwise.
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s).ok_or_else(|| format!("invalid progress mode '{}': use human, json or off", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    // Single-file analysis works without a config
    if let Commands::Analyze {
        file: Some(file),
        language,
    } = &cli.command
    {
        let cfg = config::load_config(&cli.config).ok();
        ingest::run_analyze(
            cfg.as_ref(),
            Some(file.as_path()),
            language.as_deref(),
            ProgressMode::Off.reporter().as_ref(),
        )
        .await?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Organize => {
            ingest::run_organize(&cfg, ProgressMode::default_for_tty().reporter().as_ref()).await?;
        }
        Commands::Metadata => {
            ingest::run_metadata(&cfg).await?;
        }
        Commands::Structure => {
            ingest::run_structure(&cfg).await?;
        }
        Commands::Analyze { file, language } => {
            ingest::run_analyze(
                Some(&cfg),
                file.as_deref(),
                language.as_deref(),
                ProgressMode::Off.reporter().as_ref(),
            )
            .await?;
        }
        Commands::Document {
            hierarchical,
            dry_run,
            from_snapshot,
            progress,
        } => {
            let opts = document_cmd::DocumentOptions {
                hierarchical,
                dry_run,
                from_snapshot,
                progress: progress.unwrap_or_else(ProgressMode::default_for_tty),
            };
            document_cmd::run_document(&cfg, opts).await?;
        }
    }

    Ok(())
}
