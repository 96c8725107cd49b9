//! Save, Save As, New and Open

use std::time::Duration;

use super::document::{ActiveDocument, Clock, DocumentRecord, PersistedDocument, PublishPayload, SystemClock};
use super::error::SaveError;
use super::name::{is_reserved, normalize_name, DEFAULT_DOCUMENT};
use super::publish::{ContentId, PublishError, RemotePublisher};
use super::session::Session;
use super::store::DocumentStore;
use super::surface::{ContentSource, Editor};
use super::template::default_template;

/// Upload timeout used when none is configured
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

/// A successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub name: String,
    /// Present when Save As published the document
    pub cid: Option<ContentId>,
}

impl SaveOutcome {
    /// User-facing notice
    pub fn notice(&self) -> String {
        match self.cid {
            Some(ref cid) => format!("File {} saved successfully! CID: {}", self.name, cid),
            None => format!("File {} saved successfully!", self.name),
        }
    }
}

/// Orchestrates saving the editor content into the store, optionally
/// publishing it first.
///
/// Holds no per-document state: the open document lives in the [`Session`]
/// handed to each call, and `&mut Session` keeps operations on one session
/// from overlapping.
pub struct SaveWorkflow {
    store: Box<dyn DocumentStore>,
    publisher: Option<Box<dyn RemotePublisher>>,
    clock: Box<dyn Clock>,
    publish_timeout: Duration,
}

impl SaveWorkflow {
    /// Local-only workflow
    pub fn new(store: impl DocumentStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            publisher: None,
            clock: Box::new(SystemClock),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    /// Publish on Save As, giving up after `timeout`
    pub fn with_publisher(mut self, publisher: Box<dyn RemotePublisher>, timeout: Duration) -> Self {
        self.publisher = Some(publisher);
        self.publish_timeout = timeout;
        self
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[allow(dead_code)]
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn publishes(&self) -> bool {
        self.publisher.is_some()
    }

    fn write(&self, record: &DocumentRecord) -> Result<(), SaveError> {
        self.store.put(record).map_err(|source| {
            tracing::error!("Failed to write {}: {}", record.name, source);
            SaveError::StoreWriteFailed {
                name: record.name.clone(),
                source,
            }
        })
    }

    /// Save the open document in place.
    ///
    /// Rejected for the scratch document. The stored record keeps its
    /// creation time and gets a fresh modification time. A record that has
    /// disappeared from the store is created again.
    pub fn save<S>(&self, session: &mut Session, source: &S) -> Result<SaveOutcome, SaveError>
    where
        S: ContentSource + ?Sized,
    {
        let name = match session.active {
            ActiveDocument::Persisted(ref doc) if !is_reserved(doc.name()) => doc.name().to_string(),
            _ => {
                tracing::warn!("Refusing to save the {} document", DEFAULT_DOCUMENT);
                return Err(SaveError::ProtectedDocument(DEFAULT_DOCUMENT.to_string()));
            }
        };

        let content = source.read_current()?;
        let previous = self.store.get(&name).map_err(|source| {
            tracing::error!("Failed to read {}: {}", name, source);
            SaveError::StoreReadFailed {
                name: name.clone(),
                source,
            }
        })?;

        let now = self.clock.now();
        let record = match previous {
            Some(ref previous) => DocumentRecord::revise(previous, content, now),
            None => {
                tracing::warn!("No stored record for {}, creating it", name);
                DocumentRecord::create(name, content, now)
            }
        };
        self.write(&record)?;

        tracing::info!("Saved document: {} ({} bytes)", record.name, record.content.len());
        session.active = persisted(&record);
        Ok(SaveOutcome {
            name: record.name,
            cid: None,
        })
    }

    /// Save the editor content under a new name.
    ///
    /// With a publisher configured the payload is uploaded first; if that
    /// fails or times out nothing is written locally.
    pub async fn save_as<S>(&self, session: &mut Session, proposed: &str, source: &S) -> Result<SaveOutcome, SaveError>
    where
        S: ContentSource + ?Sized,
    {
        let name = match normalize_name(proposed) {
            Some(name) => name,
            None => {
                tracing::warn!("Rejected filename {:?}", proposed);
                return Err(SaveError::InvalidName(proposed.to_string()));
            }
        };

        let content = source.read_current()?;
        let record = DocumentRecord::create(name, content, self.clock.now());

        let cid = match self.publisher {
            Some(ref publisher) => Some(self.publish(publisher.as_ref(), &record).await?),
            None => None,
        };

        self.write(&record)?;

        tracing::info!("Saved new document: {}", record.name);
        session.active = persisted(&record);
        Ok(SaveOutcome {
            name: record.name,
            cid,
        })
    }

    async fn publish(&self, publisher: &dyn RemotePublisher, record: &DocumentRecord) -> Result<ContentId, SaveError> {
        let payload = PublishPayload::from(record);
        tracing::debug!("Publishing {} ({} bytes)", payload.name, payload.content.len());

        let result = match tokio::time::timeout(self.publish_timeout, publisher.publish(&payload)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(self.publish_timeout)),
        };

        result
            .map(|cid| {
                tracing::info!("Published {} as {}", record.name, cid);
                cid
            })
            .map_err(|source| {
                tracing::error!("Failed to publish {}: {}", record.name, source);
                SaveError::PublishFailed {
                    name: record.name.clone(),
                    source,
                }
            })
    }

    /// Reset the editor to a blank sheet.
    ///
    /// A saved document that is open gets saved first; if that save fails the
    /// editor is left untouched. Returns the outcome of that implicit save.
    pub fn new_document<E>(&self, session: &mut Session, editor: &mut E) -> Result<Option<SaveOutcome>, SaveError>
    where
        E: Editor + ?Sized,
    {
        let saved = if session.active.is_scratch() {
            None
        } else {
            Some(self.save(session, &*editor)?)
        };

        let template = default_template(editor.device());
        editor.load(&template)?;
        session.active = ActiveDocument::Scratch;

        tracing::info!("Started a new {} document for {}", DEFAULT_DOCUMENT, editor.device());
        Ok(saved)
    }

    /// Load a saved document into the editor and make it the open one.
    ///
    /// Opening `default` loads the blank sheet instead.
    pub fn open<E>(&self, session: &mut Session, name: &str, editor: &mut E) -> Result<(), SaveError>
    where
        E: Editor + ?Sized,
    {
        if is_reserved(name) {
            let template = default_template(editor.device());
            editor.load(&template)?;
            session.active = ActiveDocument::Scratch;
            return Ok(());
        }

        let record = self
            .store
            .get(name)
            .map_err(|source| SaveError::StoreReadFailed {
                name: name.to_string(),
                source,
            })?
            .ok_or_else(|| SaveError::DocumentNotFound(name.to_string()))?;

        editor.load(&record.content)?;
        session.active = persisted(&record);
        tracing::info!("Opened document: {}", record.name);
        Ok(())
    }

    /// Names of all saved documents
    pub fn list(&self) -> Result<Vec<String>, SaveError> {
        self.store.list().map_err(|source| SaveError::StoreReadFailed {
            name: "document list".to_string(),
            source,
        })
    }
}

fn persisted(record: &DocumentRecord) -> ActiveDocument {
    PersistedDocument::from_record(record)
        .map(ActiveDocument::Persisted)
        .unwrap_or(ActiveDocument::Scratch)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::surface::DeviceKind;
    use crate::core::testing::{ManualClock, MemoryEditor, PublishBehavior, RecordingStore, StubPublisher};

    fn workflow(store: &Arc<RecordingStore>, clock: &Arc<ManualClock>) -> SaveWorkflow {
        SaveWorkflow::new(Arc::clone(store)).with_clock(ArcClock(Arc::clone(clock)))
    }

    /// Lets a test keep its handle on the clock it gives away
    struct ArcClock(Arc<ManualClock>);

    impl Clock for ArcClock {
        fn now(&self) -> chrono::DateTime<chrono::Utc> {
            self.0.now()
        }
    }

    fn open_session(name: &str, store: &RecordingStore) -> Session {
        let record = store.peek(name).unwrap();
        Session {
            active: ActiveDocument::Persisted(PersistedDocument::from_record(&record).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_save_as_then_save() {
        let store = Arc::new(RecordingStore::new());
        let clock = Arc::new(ManualClock::new());
        let workflow = workflow(&store, &clock);
        let mut session = Session::default();
        let mut editor = MemoryEditor::new("A1=1");

        let outcome = workflow.save_as(&mut session, "Report1", &editor).await.unwrap();
        assert_eq!(outcome.name, "Report1");
        assert_eq!(outcome.cid, None);
        assert_eq!(session.active_name(), "Report1");

        let first = store.peek("Report1").unwrap();
        assert_eq!(first.content, "A1=1");
        assert_eq!(first.created_at, first.modified_at);
        let t = first.created_at;

        clock.advance(90);
        editor.content = "A1=2".to_string();
        workflow.save(&mut session, &editor).unwrap();

        let second = store.peek("Report1").unwrap();
        assert_eq!(second.content, "A1=2");
        assert_eq!(second.created_at, t);
        assert!(second.modified_at > t);
    }

    #[test]
    fn test_save_rejects_scratch_document() {
        let store = Arc::new(RecordingStore::new());
        store.seed(&DocumentRecord::create("default", "old", chrono::Utc::now()));
        let clock = Arc::new(ManualClock::new());
        let workflow = workflow(&store, &clock);
        let mut session = Session::default();

        let err = workflow.save(&mut session, &MemoryEditor::new("new")).unwrap_err();
        assert!(matches!(err, SaveError::ProtectedDocument(ref name) if name == "default"));
        assert_eq!(store.calls(), 0);
        assert_eq!(store.peek("default").unwrap().content, "old");
    }

    #[test]
    fn test_save_preserves_created_and_moves_modified() {
        let store = Arc::new(RecordingStore::new());
        let clock = Arc::new(ManualClock::new());
        let original = DocumentRecord::create("Budget", "A1=1", clock.now());
        store.seed(&original);
        let workflow = workflow(&store, &clock);
        let mut session = open_session("Budget", &store);

        for step in 1..=3 {
            let before = store.peek("Budget").unwrap();
            clock.advance(step);
            workflow.save(&mut session, &MemoryEditor::new("A1=2")).unwrap();
            let after = store.peek("Budget").unwrap();
            assert_eq!(after.created_at, original.created_at);
            assert!(after.modified_at >= before.modified_at);
        }
    }

    #[test]
    fn test_save_recreates_externally_deleted_record() {
        let store = Arc::new(RecordingStore::new());
        let clock = Arc::new(ManualClock::new());
        let original = DocumentRecord::create("Budget", "A1=1", clock.now());
        let mut session = Session {
            active: ActiveDocument::Persisted(PersistedDocument::from_record(&original).unwrap()),
        };
        clock.advance(5);

        let workflow = workflow(&store, &clock);
        workflow.save(&mut session, &MemoryEditor::new("A1=3")).unwrap();

        let record = store.peek("Budget").unwrap();
        assert_eq!(record.created_at, clock.now());
        assert_eq!(record.modified_at, record.created_at);
        assert_eq!(record.content, "A1=3");
    }

    #[test]
    fn test_save_keeps_created_from_store_not_session() {
        let store = Arc::new(RecordingStore::new());
        let clock = Arc::new(ManualClock::new());
        let stale = DocumentRecord::create("Budget", "A1=1", clock.now());
        let mut session = Session {
            active: ActiveDocument::Persisted(PersistedDocument::from_record(&stale).unwrap()),
        };

        clock.advance(100);
        let current = DocumentRecord::create("Budget", "A1=2", clock.now());
        store.seed(&current);
        clock.advance(10);

        let workflow = workflow(&store, &clock);
        workflow.save(&mut session, &MemoryEditor::new("A1=3")).unwrap();

        let record = store.peek("Budget").unwrap();
        assert_eq!(store.gets.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(record.created_at, current.created_at);
        assert_eq!(record.modified_at, clock.now());
        assert_eq!(record.content, "A1=3");
    }

    #[tokio::test]
    async fn test_two_sessions_share_one_store() {
        let store = Arc::new(RecordingStore::new());
        let clock = Arc::new(ManualClock::new());
        let workflow = workflow(&store, &clock);
        let mut first = Session::default();
        let mut second = Session::default();

        workflow
            .save_as(&mut first, "Report1", &MemoryEditor::new("A1=1"))
            .await
            .unwrap();
        clock.advance(100);
        workflow
            .save_as(&mut second, "Report1", &MemoryEditor::new("A1=2"))
            .await
            .unwrap();
        let created = store.peek("Report1").unwrap().created_at;

        clock.advance(10);
        workflow.save(&mut first, &MemoryEditor::new("A1=3")).unwrap();

        let record = store.peek("Report1").unwrap();
        assert_eq!(record.created_at, created);
        assert!(record.modified_at > created);
    }

    #[test]
    fn test_save_reports_unreadable_store() {
        let store = Arc::new(RecordingStore::unreadable());
        let clock = Arc::new(ManualClock::new());
        let record = DocumentRecord::create("Budget", "A1=1", clock.now());
        let mut session = Session {
            active: ActiveDocument::Persisted(PersistedDocument::from_record(&record).unwrap()),
        };

        let workflow = workflow(&store, &clock);
        let err = workflow.save(&mut session, &MemoryEditor::new("A1=2")).unwrap_err();
        assert!(matches!(err, SaveError::StoreReadFailed { ref name, .. } if name == "Budget"));
        assert_eq!(store.puts.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_name_touches_nothing() {
        let store = Arc::new(RecordingStore::new());
        let publisher = Arc::new(StubPublisher::new(PublishBehavior::Succeed("bafy1")));
        let workflow = SaveWorkflow::new(Arc::clone(&store))
            .with_publisher(Box::new(Arc::clone(&publisher)), DEFAULT_PUBLISH_TIMEOUT);
        let mut session = Session::default();
        let too_long = "x".repeat(31);

        for name in ["default", "Untitled", "", "   ", "bad@name", too_long.as_str()] {
            let err = workflow
                .save_as(&mut session, name, &MemoryEditor::new("A1=1"))
                .await
                .unwrap_err();
            assert!(matches!(err, SaveError::InvalidName(_)), "{:?} accepted", name);
        }

        assert_eq!(store.calls(), 0);
        assert_eq!(publisher.calls(), 0);
        assert!(session.active.is_scratch());
    }

    #[tokio::test]
    async fn test_save_as_publishes_and_reports_cid() {
        let store = Arc::new(RecordingStore::new());
        let publisher = Arc::new(StubPublisher::new(PublishBehavior::Succeed("bafyreport")));
        let workflow = SaveWorkflow::new(Arc::clone(&store))
            .with_publisher(Box::new(Arc::clone(&publisher)), DEFAULT_PUBLISH_TIMEOUT);
        let mut session = Session::default();

        let outcome = workflow
            .save_as(&mut session, "  Q3 Budget ", &MemoryEditor::new("A1%3D1"))
            .await
            .unwrap();

        assert_eq!(outcome.cid, Some(ContentId::new("bafyreport")));
        assert!(outcome.notice().contains("bafyreport"));

        let sent = publisher.payloads.lock().unwrap()[0].clone();
        assert_eq!(sent.name, "Q3 Budget");
        assert_eq!(sent.content, "A1%3D1");
        assert_eq!(sent.created_at, sent.modified_at);

        let stored = store.peek("Q3 Budget").unwrap();
        assert_eq!(stored.content, sent.content);
        assert_eq!(stored.created_at, sent.created_at);
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_store_unchanged() {
        let store = Arc::new(RecordingStore::new());
        let previous = DocumentRecord::create("Report1", "A1=0", chrono::Utc::now());
        store.seed(&previous);
        let workflow = SaveWorkflow::new(Arc::clone(&store)).with_publisher(
            Box::new(StubPublisher::new(PublishBehavior::Fail)),
            DEFAULT_PUBLISH_TIMEOUT,
        );
        let mut session = Session::default();

        let err = workflow
            .save_as(&mut session, "Report1", &MemoryEditor::new("A1=9"))
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::PublishFailed { .. }));
        assert_eq!(store.peek("Report1"), Some(previous));

        let err = workflow
            .save_as(&mut session, "Fresh", &MemoryEditor::new("A1=9"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "publish_failed");
        assert_eq!(store.peek("Fresh"), None);
        assert_eq!(store.puts.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(session.active.is_scratch());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_timeout_is_a_publish_failure() {
        let store = Arc::new(RecordingStore::new());
        let workflow = SaveWorkflow::new(Arc::clone(&store)).with_publisher(
            Box::new(StubPublisher::new(PublishBehavior::Hang)),
            Duration::from_secs(5),
        );
        let mut session = Session::default();

        let err = workflow
            .save_as(&mut session, "Slow", &MemoryEditor::new("A1=1"))
            .await
            .unwrap_err();
        match err {
            SaveError::PublishFailed { source, .. } => {
                assert!(matches!(source, PublishError::Timeout(d) if d == Duration::from_secs(5)))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let store = Arc::new(RecordingStore::failing());
        let clock = Arc::new(ManualClock::new());
        let workflow = workflow(&store, &clock);
        let mut session = Session::default();

        let err = workflow
            .save_as(&mut session, "Report1", &MemoryEditor::new("A1=1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::StoreWriteFailed { ref name, .. } if name == "Report1"));
        assert!(session.active.is_scratch());
    }

    #[test]
    fn test_new_document_saves_open_document_first() {
        let store = Arc::new(RecordingStore::new());
        let clock = Arc::new(ManualClock::new());
        store.seed(&DocumentRecord::create("Report1", "A1=1", clock.now()));
        let workflow = workflow(&store, &clock);
        let mut session = open_session("Report1", &store);
        let mut editor = MemoryEditor::new("A1=5");
        editor.device = DeviceKind::IPhone;

        clock.advance(10);
        let saved = workflow.new_document(&mut session, &mut editor).unwrap();

        assert_eq!(saved.map(|o| o.name), Some("Report1".to_string()));
        assert_eq!(store.peek("Report1").unwrap().content, "A1=5");
        assert_eq!(editor.loaded, vec![default_template(DeviceKind::IPhone)]);
        assert_eq!(session.active_name(), "default");
    }

    #[test]
    fn test_new_document_from_scratch_skips_save() {
        let store = Arc::new(RecordingStore::new());
        let clock = Arc::new(ManualClock::new());
        let workflow = workflow(&store, &clock);
        let mut session = Session::default();
        let mut editor = MemoryEditor::new("scribbles");

        let saved = workflow.new_document(&mut session, &mut editor).unwrap();
        assert!(saved.is_none());
        assert_eq!(store.calls(), 0);
        assert_eq!(editor.content, default_template(DeviceKind::Desktop));
    }

    #[test]
    fn test_new_document_keeps_editor_when_save_fails() {
        let store = Arc::new(RecordingStore::failing());
        let clock = Arc::new(ManualClock::new());
        let record = DocumentRecord::create("Report1", "A1=1", clock.now());
        let workflow = workflow(&store, &clock);
        let mut session = Session {
            active: ActiveDocument::Persisted(PersistedDocument::from_record(&record).unwrap()),
        };
        let mut editor = MemoryEditor::new("unsaved work");

        assert!(workflow.new_document(&mut session, &mut editor).is_err());
        assert_eq!(editor.content, "unsaved work");
        assert_eq!(session.active_name(), "Report1");
    }

    #[test]
    fn test_open_loads_record() {
        let store = Arc::new(RecordingStore::new());
        let clock = Arc::new(ManualClock::new());
        store.seed(&DocumentRecord::create("Budget", "A1%3D7", clock.now()));
        let workflow = workflow(&store, &clock);
        let mut session = Session::default();
        let mut editor = MemoryEditor::new("");

        workflow.open(&mut session, "Budget", &mut editor).unwrap();
        assert_eq!(editor.content, "A1%3D7");
        assert_eq!(session.active_name(), "Budget");

        let err = workflow.open(&mut session, "Nope", &mut editor).unwrap_err();
        assert!(matches!(err, SaveError::DocumentNotFound(_)));
        assert_eq!(session.active_name(), "Budget");

        workflow.open(&mut session, "default", &mut editor).unwrap();
        assert!(session.active.is_scratch());
        assert_eq!(workflow.list().unwrap(), vec!["Budget".to_string()]);
    }
}
