//! Local document stores keyed by document name

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use walkdir::WalkDir;

use super::document::DocumentRecord;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent mapping from document name to its latest record
pub trait DocumentStore: Send + Sync {
    /// The record stored under `name`, if any
    fn get(&self, name: &str) -> Result<Option<DocumentRecord>, StoreError>;

    /// Insert or replace the record stored under `record.name`
    fn put(&self, record: &DocumentRecord) -> Result<(), StoreError>;

    /// All stored names, sorted
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn get(&self, name: &str) -> Result<Option<DocumentRecord>, StoreError> {
        (**self).get(name)
    }

    fn put(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        (**self).put(record)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        (**self).list()
    }
}

/// In-memory store
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, DocumentRecord>>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, DocumentRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn put(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        self.lock()?.insert(record.name.clone(), record.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// Characters escaped in on-disk file names. Names are restricted to
/// letters, digits, `-` and space, but `default` and older records may not be.
/// Upper-case letters are escaped too, so names differing only in case stay
/// distinct files on case-insensitive filesystems.
const FILE_NAME_ESCAPES: &AsciiSet = &escape_uppercase(NON_ALPHANUMERIC.remove(b'-'));

const fn escape_uppercase(set: AsciiSet) -> AsciiSet {
    let mut set = set;
    let mut c = b'A';
    while c <= b'Z' {
        set = set.add(c);
        c += 1;
    }
    set
}

const RECORD_EXTENSION: &str = "json";

/// Store keeping one JSON file per document in a directory
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[allow(dead_code)]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, name: &str) -> PathBuf {
        let stem = utf8_percent_encode(name, FILE_NAME_ESCAPES).to_string();
        self.root.join(format!("{}.{}", stem, RECORD_EXTENSION))
    }
}

impl DocumentStore for DiskStore {
    fn get(&self, name: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let path = self.record_path(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: DocumentRecord = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    fn put(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.name);
        let json = serde_json::to_string_pretty(record)?;

        // Write next to the target and rename so readers never see half a record
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp_path = self.root.join(format!(".{}.tmp", file_name));
        std::fs::write(&tmp_path, json)?;
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        tracing::debug!("Wrote record {} to {}", record.name, path.display());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let path = entry.path();

            let file_name = entry.file_name().to_string_lossy();
            if file_name.starts_with('.') || !entry.file_type().is_file() {
                continue;
            }
            if path.extension().map(|ext| ext != RECORD_EXTENSION).unwrap_or(true) {
                continue;
            }

            if let Some(stem) = path.file_stem() {
                let stem = stem.to_string_lossy();
                let name = percent_decode_str(&stem).decode_utf8_lossy().to_string();
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
