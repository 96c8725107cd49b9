//! Editor surface: where sheet content is read from and loaded into

use std::fmt;
use std::path::{Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Failed to access sheet {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Current content of the editor, in stored (percent-encoded) form
pub trait ContentSource {
    fn read_current(&self) -> Result<String, SurfaceError>;

    /// Printable rendering of the current sheet
    fn current_html(&self) -> Result<String, SurfaceError>;
}

/// Replaces the editor content with a stored document
pub trait ContentSink {
    fn load(&mut self, content: &str) -> Result<(), SurfaceError>;
}

/// Device the editor is displayed on
pub trait DisplayContext {
    fn device(&self) -> DeviceKind;
}

/// Everything the workflow needs from the editor
pub trait Editor: ContentSource + ContentSink + DisplayContext {}

impl<T: ContentSource + ContentSink + DisplayContext + ?Sized> Editor for T {}

/// Device classes with their own starter sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceKind {
    #[default]
    #[serde(rename = "default")]
    Desktop,
    #[serde(rename = "iPad")]
    IPad,
    #[serde(rename = "iPhone")]
    IPhone,
    Android,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            DeviceKind::Desktop => "default",
            DeviceKind::IPad => "iPad",
            DeviceKind::IPhone => "iPhone",
            DeviceKind::Android => "Android",
        };
        f.write_str(key)
    }
}

/// Bytes kept as-is when encoding sheet content, matching `encodeURIComponent`
const SHEET_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Serialized sheet to stored form
pub fn encode_sheet(raw: &str) -> String {
    utf8_percent_encode(raw, SHEET_UNRESERVED).to_string()
}

/// Stored form back to the serialized sheet
pub fn decode_sheet(stored: &str) -> String {
    percent_decode_str(stored).decode_utf8_lossy().to_string()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Editor surface backed by a plain sheet file on disk
#[derive(Debug, Clone)]
pub struct FileSurface {
    path: PathBuf,
    device: DeviceKind,
}

impl FileSurface {
    pub fn new(path: impl Into<PathBuf>, device: DeviceKind) -> Self {
        Self {
            path: path.into(),
            device,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SurfaceError {
        SurfaceError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_raw(&self) -> Result<String, SurfaceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(raw),
            // A sheet that was never written is empty
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

impl ContentSource for FileSurface {
    fn read_current(&self) -> Result<String, SurfaceError> {
        Ok(encode_sheet(&self.read_raw()?))
    }

    fn current_html(&self) -> Result<String, SurfaceError> {
        let raw = self.read_raw()?;
        let title = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "sheet".to_string());
        Ok(format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head>\n<body><pre>{}</pre></body></html>\n",
            escape_html(&title),
            escape_html(&raw)
        ))
    }
}

impl ContentSink for FileSurface {
    fn load(&mut self, content: &str) -> Result<(), SurfaceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        std::fs::write(&self.path, decode_sheet(content)).map_err(|e| self.io_error(e))?;
        tracing::debug!("Loaded {} bytes into {}", content.len(), self.path.display());
        Ok(())
    }
}

impl DisplayContext for FileSurface {
    fn device(&self) -> DeviceKind {
        self.device
    }
}
