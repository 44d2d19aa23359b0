//! plantdoc - diagnose plant leaf photos with a vision model
//!
//! Uses XDG Base Directory specification for file locations:
//! - History: $XDG_DATA_HOME/plantdoc/history.db (~/.local/share/plantdoc/history.db)
//! - Logs: $XDG_STATE_HOME/plantdoc/plantdoc.log (~/.local/state/plantdoc/plantdoc.log)
//! - Config: $XDG_CONFIG_HOME/plantdoc/config.toml (~/.config/plantdoc/config.toml)

mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use plantdoc_core::{storage, Config, DiagnosisClient, HistoryStore};

#[derive(Parser)]
#[command(name = "plantdoc")]
#[command(about = "Diagnose plant diseases from leaf photos")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/plantdoc/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a photo (local path, file:// URI or http(s) URL)
    Analyze {
        /// Image to analyze
        image: String,

        /// Do not record the result in history
        #[arg(long)]
        no_save: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show past diagnoses, newest first
    History {
        /// Show a single entry
        #[arg(long)]
        id: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Delete all history
    Clear,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    let _log_guard =
        plantdoc_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let store = storage::open(&config.storage).context("failed to open history storage")?;
    let history = HistoryStore::new(store);

    match args.command {
        Command::Analyze {
            image,
            no_save,
            format,
        } => cmd_analyze(config, history, &image, no_save, format).await,
        Command::History { id, format } => cmd_history(&history, id.as_deref(), format),
        Command::Clear => cmd_clear(&history),
    }
}

async fn cmd_analyze(
    config: Config,
    history: HistoryStore,
    image: &str,
    no_save: bool,
    format: OutputFormat,
) -> Result<()> {
    let client =
        DiagnosisClient::new(config.inference, history).context("failed to create client")?;

    tracing::info!(image, no_save, "Analyzing image");

    let result = if no_save {
        client.analyze_without_saving(image).await?
    } else {
        client.analyze(image).await?
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => println!("{}", render::diagnosis_report(&result)),
    }

    Ok(())
}

fn cmd_history(history: &HistoryStore, id: Option<&str>, format: OutputFormat) -> Result<()> {
    let entries = match id {
        Some(id) => match history.get(id) {
            Some(entry) => vec![entry],
            None => anyhow::bail!("No history entry with id '{}'", id),
        },
        None => history.list(),
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No history yet.");
        println!("Run 'plantdoc analyze <IMAGE>' to diagnose a plant.");
        return Ok(());
    }

    let now = Local::now();
    if id.is_some() {
        let entry = &entries[0];
        println!("{}", render::history_row(entry, &now));
        println!();
        println!("{}", render::diagnosis_report(&entry.result));
    } else {
        for entry in &entries {
            println!("{}", render::history_row(entry, &now));
        }
    }

    Ok(())
}

fn cmd_clear(history: &HistoryStore) -> Result<()> {
    history.clear()?;
    println!("History cleared.");
    Ok(())
}
