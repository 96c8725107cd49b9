//! Sheetvault - save, version and publish spreadsheet documents
//!
//! Keeps named sheets in a local store and can publish a content-addressed
//! copy on Save As.

mod app;
mod core;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::{Command, Notice, SheetApp};
use crate::core::config::AppConfig;

#[derive(Parser)]
#[command(name = "sheetvault", about = "Save and publish spreadsheet documents", author, version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Working sheet the commands read and load
    #[arg(long, global = true, value_name = "PATH")]
    sheet: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the open document in place
    Save,
    /// Save the sheet under a new name, publishing it when configured
    SaveAs {
        /// Letters, digits, `-` and spaces, at most 30 characters
        name: String,
    },
    /// Save the open document and start a blank sheet
    New,
    /// Load a saved document into the sheet
    Open { name: String },
    /// List saved documents
    List,
    /// Render the sheet as HTML and open it for printing
    Print,
    /// Show the open document and settings
    Status,
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Save => Command::Save,
            Commands::SaveAs { name } => Command::SaveAs(name),
            Commands::New => Command::New,
            Commands::Open { name } => Command::Open(name),
            Commands::List => Command::List,
            Commands::Print => Command::Print,
            Commands::Status => Command::Status,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<Notice> {
    let config_path = cli.config.or_else(AppConfig::config_path);
    let config = match config_path {
        Some(ref path) => AppConfig::load_from(path)?,
        None => AppConfig::default(),
    };

    let mut app = SheetApp::new(config, config_path, cli.sheet)?;
    app.run(cli.command.into()).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    tracing::debug!("Starting Sheetvault...");

    match run(cli).await {
        Ok(Notice::Success(message)) => {
            println!("{}", message);
            ExitCode::SUCCESS
        }
        Ok(Notice::Failure(message)) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
