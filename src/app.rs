//! Application state and command dispatch

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::core::{
    config::AppConfig,
    error::SaveError,
    publish,
    session::Session,
    store::DiskStore,
    surface::{ContentSource, FileSurface},
    workflow::SaveWorkflow,
};

/// A user command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Save,
    SaveAs(String),
    New,
    Open(String),
    List,
    Print,
    Status,
}

/// What the user is told after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Failure(String),
}

impl Notice {
    #[allow(dead_code)]
    pub fn is_failure(&self) -> bool {
        matches!(self, Notice::Failure(_))
    }

    fn from_error(err: &SaveError) -> Self {
        tracing::debug!(kind = err.kind(), "Command failed");
        Notice::Failure(err.to_string())
    }
}

/// Main application state
pub struct SheetApp {
    /// Application configuration
    pub config: AppConfig,
    /// Where `config` was loaded from
    config_path: Option<PathBuf>,
    /// Open document
    pub session: Session,
    /// Working sheet
    pub editor: FileSurface,
    workflow: SaveWorkflow,
}

impl SheetApp {
    /// Build the application from configuration
    pub fn new(config: AppConfig, config_path: Option<PathBuf>, sheet: Option<PathBuf>) -> Result<Self> {
        let store_dir = config.store_dir();
        let store = DiskStore::open(&store_dir)
            .with_context(|| format!("Failed to open document store: {}", store_dir.display()))?;

        let mut workflow = SaveWorkflow::new(store);
        if let Some(publisher) = publish::from_config(&config.publish)? {
            workflow = workflow.with_publisher(publisher, config.publish.timeout());
        }

        let sheet = sheet.unwrap_or_else(|| config.default_sheet_path());
        let editor = FileSurface::new(sheet, config.device);
        let session = Session::load(&config.session_file());

        Ok(Self {
            config,
            config_path,
            session,
            editor,
            workflow,
        })
    }

    /// Run one command and persist whatever it changed
    pub async fn run(&mut self, command: Command) -> Result<Notice> {
        let notice = match command {
            Command::Save => match self.workflow.save(&mut self.session, &self.editor) {
                Ok(outcome) => {
                    self.remember(&outcome.name);
                    Notice::Success(format!("File {} updated successfully!", outcome.name))
                }
                Err(e) => Notice::from_error(&e),
            },
            Command::SaveAs(name) => {
                match self.workflow.save_as(&mut self.session, &name, &self.editor).await {
                    Ok(outcome) => {
                        self.remember(&outcome.name);
                        Notice::Success(outcome.notice())
                    }
                    Err(e) => Notice::from_error(&e),
                }
            }
            Command::New => match self.workflow.new_document(&mut self.session, &mut self.editor) {
                Ok(saved) => {
                    if let Some(outcome) = saved {
                        self.remember(&outcome.name);
                    }
                    Notice::Success("Started a new document".to_string())
                }
                Err(e) => Notice::from_error(&e),
            },
            Command::Open(name) => match self.workflow.open(&mut self.session, &name, &mut self.editor) {
                Ok(()) => Notice::Success(format!("Opened {}", self.session.active_name())),
                Err(e) => Notice::from_error(&e),
            },
            Command::List => match self.workflow.list() {
                Ok(names) if names.is_empty() => Notice::Success("No saved documents".to_string()),
                Ok(names) => Notice::Success(names.join("\n")),
                Err(e) => Notice::from_error(&e),
            },
            Command::Print => self.print()?,
            Command::Status => Notice::Success(self.status()),
        };

        self.session
            .save(&self.config.session_file())
            .context("Failed to remember the open document")?;
        Ok(notice)
    }

    /// Add to recent documents and write the config back.
    ///
    /// The document is already saved by now, so a config write failure is
    /// only logged.
    fn remember(&mut self, name: &str) {
        self.config.add_recent_document(name);
        if let Some(ref path) = self.config_path {
            if let Err(e) = self.config.save_to(path) {
                tracing::warn!("Failed to update recent documents in {}: {:#}", path.display(), e);
            }
        }
    }

    /// Render the sheet to HTML and hand it to the system viewer
    fn print(&self) -> Result<Notice> {
        let html = match self.editor.current_html() {
            Ok(html) => html,
            Err(e) => return Ok(Notice::Failure(e.to_string())),
        };

        let path = self.print_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, html)
            .with_context(|| format!("Failed to write print page: {}", path.display()))?;

        if let Err(e) = open::that(&path) {
            tracing::warn!("Could not open {}: {}", path.display(), e);
            return Ok(Notice::Success(format!("Print page written to {}", path.display())));
        }
        Ok(Notice::Success(format!("Opened {} for printing", path.display())))
    }

    fn print_path(&self) -> PathBuf {
        self.editor.path().with_extension("html")
    }

    fn status(&self) -> String {
        let publishing = if self.workflow.publishes() {
            format!("{:?}", self.config.publish.mode).to_lowercase()
        } else {
            "off".to_string()
        };
        let mut lines = vec![
            format!("Open document: {}", self.session.active_name()),
            format!("Sheet: {}", self.editor.path().display()),
            format!("Store: {}", self.config.store_dir().display()),
            format!("Device: {}", self.config.device),
            format!("Publishing: {}", publishing),
        ];
        if !self.config.recent_documents.is_empty() {
            lines.push(format!("Recent: {}", self.config.recent_documents.join(", ")));
        }
        lines.join("\n")
    }
}
