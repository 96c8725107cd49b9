//! Test doubles for the workflow's collaborators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use super::document::{Clock, DocumentRecord, PublishPayload};
use super::publish::{ContentId, PublishError, RemotePublisher};
use super::store::{DocumentStore, MemoryStore, StoreError};
use super::surface::{ContentSink, ContentSource, DeviceKind, DisplayContext, SurfaceError};

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
        }
    }

    pub fn advance(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Memory store counting every call
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub fail_gets: bool,
    pub fail_puts: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Self::default()
        }
    }

    pub fn unreadable() -> Self {
        Self {
            fail_gets: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst) + self.puts.load(Ordering::SeqCst)
    }

    /// Seed a record without counting it as a call
    pub fn seed(&self, record: &DocumentRecord) {
        self.inner.put(record).unwrap();
    }

    pub fn peek(&self, name: &str) -> Option<DocumentRecord> {
        self.inner.get(name).unwrap()
    }
}

impl DocumentStore for RecordingStore {
    fn get(&self, name: &str) -> Result<Option<DocumentRecord>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets {
            return Err(StoreError::Unavailable("disk unreadable".to_string()));
        }
        self.inner.get(name)
    }

    fn put(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.inner.put(record)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list()
    }
}

/// How a [`StubPublisher`] answers
pub enum PublishBehavior {
    Succeed(&'static str),
    Fail,
    Hang,
}

/// Publisher with a scripted answer that records what it was sent
pub struct StubPublisher {
    behavior: PublishBehavior,
    pub payloads: Mutex<Vec<PublishPayload>>,
}

impl StubPublisher {
    pub fn new(behavior: PublishBehavior) -> Self {
        Self {
            behavior,
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl RemotePublisher for StubPublisher {
    async fn publish(&self, payload: &PublishPayload) -> Result<ContentId, PublishError> {
        self.payloads.lock().unwrap().push(payload.clone());
        match self.behavior {
            PublishBehavior::Succeed(cid) => Ok(ContentId::new(cid)),
            PublishBehavior::Fail => Err(PublishError::Auth("login rejected".to_string())),
            PublishBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ContentId::new("never"))
            }
        }
    }
}

/// Editor holding its content in memory
pub struct MemoryEditor {
    pub content: String,
    pub device: DeviceKind,
    pub loaded: Vec<String>,
}

impl MemoryEditor {
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_string(),
            device: DeviceKind::Desktop,
            loaded: Vec::new(),
        }
    }
}

impl ContentSource for MemoryEditor {
    fn read_current(&self) -> Result<String, SurfaceError> {
        Ok(self.content.clone())
    }

    fn current_html(&self) -> Result<String, SurfaceError> {
        Ok(format!("<pre>{}</pre>", self.content))
    }
}

impl ContentSink for MemoryEditor {
    fn load(&mut self, content: &str) -> Result<(), SurfaceError> {
        self.content = content.to_string();
        self.loaded.push(content.to_string());
        Ok(())
    }
}

impl DisplayContext for MemoryEditor {
    fn device(&self) -> DeviceKind {
        self.device
    }
}
