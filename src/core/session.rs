//! The open document, remembered between runs

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::document::ActiveDocument;

/// Per-user editing session. Owns the active document; the workflow only
/// borrows it for the length of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub active: ActiveDocument,
}

impl Session {
    /// Load session from `path`. A missing or unreadable session starts on the
    /// scratch document.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str::<Session>(&content) {
            Ok(session) => Self {
                active: session.active.sanitized(),
            },
            Err(e) => {
                tracing::warn!("Ignoring corrupt session file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create session dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize session")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write session file: {}", path.display()))?;
        Ok(())
    }

    pub fn active_name(&self) -> &str {
        self.active.name()
    }
}
