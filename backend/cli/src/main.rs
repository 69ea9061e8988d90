mod commands;
mod runner;
mod spinner;
mod terminal_output;
mod trace;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use ponder_config::{parse_provider, ProviderManager, DEFAULT_PROVIDER, DEFAULT_PROVIDERS_DIR};
use ponder_core::{Mode, DEFAULT_LANGUAGE, DEFAULT_MAX_STEPS};
use ponder_logging::init_logger;

use commands::AutoMode;
use runner::{run_think, ThinkArgs};
use terminal_output::{note_error, note_info, render_table, Column, DIM};

#[derive(Parser)]
#[command(name = "ponder")]
#[command(about = "Steerable step-by-step reasoning sessions against chat-completion models")]
#[command(version)]
struct Cli {
    /// Directory holding `<name>.yml` provider files
    #[arg(long, global = true, default_value = DEFAULT_PROVIDERS_DIR)]
    providers_dir: PathBuf,

    /// Also write JSON logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a reasoning session
    Think {
        /// Task description
        #[arg(short, long)]
        task: String,

        /// Reasoning mode
        #[arg(short, long, default_value_t = Mode::ExploreOptimal)]
        mode: Mode,

        /// Reasoning language
        #[arg(short, long, default_value = DEFAULT_LANGUAGE)]
        language: String,

        /// Maximum number of steps
        #[arg(short = 's', long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: u32,

        /// Provider configuration to use
        #[arg(short, long, default_value = DEFAULT_PROVIDER)]
        provider: String,

        /// Directory to save reasoning traces
        #[arg(short, long, default_value = "traces")]
        output_dir: PathBuf,

        /// Pick commands automatically instead of prompting
        #[arg(short, long)]
        auto: bool,

        /// Command policy in automatic mode
        #[arg(long, value_enum, default_value_t = AutoMode::Continue)]
        auto_mode: AutoMode,

        /// Save every API call and full token usage
        #[arg(short, long)]
        debug: bool,

        /// Re-send a failed step this many times before giving up
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
    /// List available provider configurations
    Providers,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.log_dir.as_deref(), &cli.log_level);

    if let Err(e) = run(cli).await {
        note_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Think {
            task,
            mode,
            language,
            max_steps,
            provider,
            output_dir,
            auto,
            auto_mode,
            debug,
            retries,
        } => {
            run_think(ThinkArgs {
                task,
                mode,
                language,
                max_steps,
                provider,
                providers_dir: cli.providers_dir,
                output_dir,
                auto,
                auto_mode,
                debug,
                retries,
            })
            .await?;
        }
        Commands::Providers => list_providers(ProviderManager::new(cli.providers_dir)).await?,
    }
    Ok(())
}

async fn list_providers(manager: ProviderManager) -> Result<()> {
    let names = manager.list_providers().await?;
    if names.is_empty() {
        note_info(&format!(
            "No provider files found in {}",
            manager.providers_dir().display()
        ));
        return Ok(());
    }

    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let path = manager.config_path(&name);
        let raw = tokio::fs::read_to_string(&path).await?;
        let row = match parse_provider(&raw, &name) {
            Ok(config) => vec![name, config.model, config.description],
            Err(e) => vec![name, String::new(), terminal_output::paint(DIM, &e.to_string())],
        };
        rows.push(row);
    }

    let columns = [
        Column::left("Provider"),
        Column::left("Model"),
        Column::left("Description").max_width(60),
    ];
    print!("{}", render_table(&columns, &rows));
    Ok(())
}
