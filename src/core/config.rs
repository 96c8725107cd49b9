//! Application configuration management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::surface::DeviceKind;

/// Environment variable overriding `publish.token`
pub const TOKEN_ENV: &str = "SHEETVAULT_PUBLISH_TOKEN";

const MAX_RECENT_DOCUMENTS: usize = 10;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding saved documents
    pub store_dir: Option<PathBuf>,
    /// Where the open document is remembered between runs
    pub session_file: Option<PathBuf>,
    /// Device the default template is picked for
    pub device: DeviceKind,
    /// Recently saved documents, newest first
    pub recent_documents: Vec<String>,
    /// Remote publishing settings
    pub publish: PublishConfig,
}

/// Which publisher Save As goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Save locally only
    #[default]
    Off,
    /// HTTP storage gateway
    Http,
    /// Content-addressed directory mirror
    Local,
}

/// Publishing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub mode: PublishMode,
    /// Gateway base URL (http mode)
    pub endpoint: Option<String>,
    /// Account the upload is made for (http mode)
    pub account: Option<String>,
    /// Space identifier uploads go into (http mode)
    pub space: Option<String>,
    /// Bearer token (http mode)
    pub token: Option<String>,
    /// Mirror directory (local mode)
    pub dir: Option<PathBuf>,
    /// Upload timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            mode: PublishMode::Off,
            endpoint: None,
            account: None,
            space: None,
            token: None,
            dir: None,
            timeout_secs: 30,
        }
    }
}

impl PublishConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Mirror directory for local mode
    pub fn local_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| data_dir().join("published"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "sheetvault", "Sheetvault")
}

fn data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".sheetvault"))
}

impl AppConfig {
    /// Default config file path
    pub fn config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from `path`, falling back to defaults when absent
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Take credentials from the environment over the file
    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                self.publish.token = Some(token);
            }
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Record a saved document as recent
    pub fn add_recent_document(&mut self, name: &str) {
        self.recent_documents.retain(|n| n != name);
        self.recent_documents.insert(0, name.to_string());
        self.recent_documents.truncate(MAX_RECENT_DOCUMENTS);
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("documents"))
    }

    pub fn session_file(&self) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| data_dir().join("session.json"))
    }

    /// Working sheet file used when none is given on the command line
    pub fn default_sheet_path(&self) -> PathBuf {
        data_dir().join("current.sheet")
    }
}
