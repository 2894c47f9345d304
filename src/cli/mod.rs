use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::api::{HttpBackend, InMemoryBackend, NotesBackend};
use crate::app::App;
use crate::config::{AppConfig, ConfigLoader, CONFIG_ENV};

pub mod commands;

use self::commands::{
    ChatArgs, DeleteArgs, EditArgs, FolderArgs, LabelArgs, ListArgs, NewArgs, ShowArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "neuralnotes",
    version,
    about = "Terminal client for a NeuralNotes server"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over NEURALNOTES_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the API base URL from the config file
    #[arg(long)]
    pub api_url: Option<String>,

    /// Use built-in sample notes instead of a server
    #[arg(long)]
    pub demo: bool,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Print the note collection view once
    List(ListArgs),
    /// Show a single note
    Show(ShowArgs),
    /// Create a note
    New(NewArgs),
    /// Update fields of an existing note
    Edit(EditArgs),
    /// Delete a note
    Delete(DeleteArgs),
    /// List or create folders
    Folders(FolderArgs),
    /// List, create or delete labels
    Labels(LabelArgs),
    /// Send one message to the AI assistant
    Chat(ChatArgs),
}

enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();

    let command = cli.command.unwrap_or(Commands::Tui);
    let log_file = paths.log_file();
    let target = match command {
        Commands::Tui => LogTarget::File(&log_file),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let mut config = loader.load_or_init()?;
    config.apply_env();
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }

    let (backend, source) = build_backend(&config, cli.demo)?;
    let config = Arc::new(config);
    match command {
        Commands::Tui => {
            let mut app = App::new(config.clone(), backend, source)?;
            app.run()
        }
        other => {
            let output = commands::execute(backend.as_ref(), &config.view, other)?;
            print!("{output}");
            Ok(())
        }
    }
}

fn build_backend(config: &AppConfig, demo: bool) -> Result<(Arc<dyn NotesBackend>, String)> {
    if demo {
        tracing::info!("using in-memory demo notes");
        return Ok((Arc::new(InMemoryBackend::with_demo_data()), "demo".into()));
    }
    let backend = HttpBackend::new(&config.api)
        .with_context(|| format!("configuring API client for {}", config.api.base_url))?;
    let source = backend.base_url().to_string();
    tracing::debug!(%source, "using HTTP backend");
    Ok((Arc::new(backend), source))
}

fn init_tracing(level: &str, target: LogTarget<'_>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        let (writer, ansi) = match target {
            LogTarget::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
            LogTarget::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                (BoxMakeWriter::new(Mutex::new(file)), false)
            }
        };
        fmt()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_ansi(ansi)
            .init();
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}
