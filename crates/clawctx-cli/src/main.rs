#![deny(unsafe_code)]

//! clawctx CLI — index a repository and fetch prompt context from the shell.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use clawctx_config::{AppConfig, ContextConfig};
use clawctx_core::{ContextEngine, ContextError};
use clawctx_core::context::render_pack;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// clawctx — cached, incremental repository context for LLM prompts.
#[derive(Parser)]
#[command(name = "clawctx", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "clawctx.toml")]
    config: PathBuf,

    /// Repository root to index (overrides `context.workspace`).
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the repository index and print a summary.
    Index,

    /// Retrieve context for a natural-language query.
    Query {
        /// The query text.
        query: String,

        /// Maximum number of files to include.
        #[arg(long)]
        max_files: Option<usize>,

        /// Maximum total excerpt length, in characters.
        #[arg(long)]
        char_budget: Option<usize>,

        /// Print the pack as JSON instead of the prompt block.
        #[arg(long)]
        json: bool,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, found) = load_config(&cli.config).await?;
    if let Some(workspace) = cli.workspace {
        config.context.workspace = workspace;
        config.validate()?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, &config.logging.level))),
        )
        .with_writer(std::io::stderr)
        .init();

    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Index => cmd_index(config.context).await?,
        Commands::Query {
            query,
            max_files,
            char_budget,
            json,
        } => cmd_query(config.context, query, max_files, char_budget, json).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

async fn cmd_index(context: ContextConfig) -> Result<()> {
    let snapshot = tokio::task::spawn_blocking(move || {
        let engine = ContextEngine::from_config(&context)?;
        Ok::<_, ContextError>(engine.index()?)
    })
    .await??;

    println!("repo_hash: {}", snapshot.repo_hash);
    println!("files:     {}", snapshot.len());
    println!("symbols:   {}", snapshot.symbol_count());
    Ok(())
}

async fn cmd_query(
    context: ContextConfig,
    query: String,
    max_files: Option<usize>,
    char_budget: Option<usize>,
    json: bool,
) -> Result<()> {
    let max_files = max_files.unwrap_or(context.max_files);
    let char_budget = char_budget.unwrap_or(context.char_budget);

    let pack = tokio::task::spawn_blocking(move || {
        let mut engine = ContextEngine::from_config(&context)?;
        let pack = engine.get_pack(&query, max_files, char_budget)?;
        engine.close()?;
        Ok::<_, ContextError>(pack)
    })
    .await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&pack)?);
    } else if pack.is_empty() {
        eprintln!("No relevant context found.");
    } else {
        println!("{}", render_pack(&pack));
    }
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

/// Load the config file, or defaults when it does not exist. The flag
/// reports whether the file was found.
async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if tokio::fs::try_exists(path).await? {
        Ok((AppConfig::load(path).await?, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

/// `-v` flags win over the configured level.
fn log_filter(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_ascii_lowercase(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}
