//! Open-document session
//!
//! Owns one [`ScriptDocument`] for as long as a script is open and drives
//! its network side: the initial fetch, load-more, and saves.
//!
//! ## Concurrency
//!
//! - The document sits behind an async `RwLock`; every mutation and every
//!   response is applied atomically under the write lock.
//! - The lock is never held across a backend call, so edits stay accepted
//!   while a page or a save is in flight.
//! - Load-more and save each have an in-flight flag. A second trigger while
//!   one is running coalesces into `AlreadyLoading` / `AlreadySaving`.
//! - After [`ScriptSession::close`] any late response is dropped without
//!   touching the document.

use crate::backend::ScriptBackend;
use crate::config::SessionConfig;
use crate::errors::{BackendError, SessionError};
use crate::reminder::AutosaveReminder;
use screenplay_editor::{
    MergeOutcome, Mutation, MutationResult, PageRequest, ReconcileOutcome, ScriptDocument, Segment, SegmentsPage,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Notifications for whoever renders the document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    PageLoaded { added_segments: usize, has_more: bool },
    LoadFailed { message: String },
    Saved { outcome: ReconcileOutcome },
    SaveFailed { message: String },
    DirtyChanged { dirty: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(MergeOutcome),
    /// Another load-more is running; this trigger was coalesced
    AlreadyLoading,
    /// The backend has no more segments
    Exhausted,
    /// The session closed while the page was in flight
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(ReconcileOutcome),
    NothingToSave,
    /// Another save is running; this trigger was coalesced
    AlreadySaving,
    /// The session closed while the save was in flight
    Cancelled,
}

/// Clears an in-flight flag when the operation ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ScriptSession<B: ScriptBackend> {
    script_id: String,
    backend: Arc<B>,
    config: SessionConfig,

    document: Arc<RwLock<ScriptDocument>>,

    loading: AtomicBool,
    saving: AtomicBool,
    closed: AtomicBool,

    /// Last dirty state reported to subscribers
    dirty: AtomicBool,
    reminder: Mutex<AutosaveReminder>,

    /// Event subscribers
    subscribers: Arc<RwLock<Vec<mpsc::Sender<SessionEvent>>>>,
}

impl<B: ScriptBackend> ScriptSession<B> {
    /// Fetch the first page (with bounded retry) and load it
    pub async fn open(
        script_id: impl Into<String>,
        backend: Arc<B>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let script_id = script_id.into();
        let mut document = ScriptDocument::new(script_id.clone(), config.editor.clone());

        let request = document.pagination().next_request();
        let page = fetch_with_retry(backend.as_ref(), &script_id, request, &config).await?;
        document.load_first_page(page);

        info!(script_id = %script_id, elements = document.len(), "Opened script session");
        Ok(Self {
            reminder: Mutex::new(AutosaveReminder::new(config.reminder_interval())),
            script_id,
            backend,
            config,
            document: Arc::new(RwLock::new(document)),
            loading: AtomicBool::new(false),
            saving: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            subscribers: Arc::new(RwLock::new(Vec::new())),
        })
    }

    pub fn script_id(&self) -> &str {
        &self.script_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Subscribe to session events
    pub async fn subscribe(&self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel(100);
        self.subscribers.write().await.push(tx);
        rx
    }

    /// Broadcast an event to all subscribers
    async fn broadcast(&self, event: SessionEvent) {
        let subscribers = self.subscribers.read().await;
        for tx in subscribers.iter() {
            let _ = tx.send(event.clone()).await;
        }
    }

    /// Read the document under the lock
    pub async fn read<R>(&self, f: impl FnOnce(&ScriptDocument) -> R) -> R {
        let document = self.document.read().await;
        f(&*document)
    }

    /// Copy of the current document
    pub async fn snapshot(&self) -> ScriptDocument {
        self.document.read().await.clone()
    }

    pub async fn has_unsaved_changes(&self) -> bool {
        self.document.read().await.has_unsaved_changes()
    }

    /// Apply an edit atomically
    pub async fn apply(&self, mutation: &Mutation) -> Result<MutationResult, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let (result, dirty) = {
            let mut document = self.document.write().await;
            let result = mutation.apply(&mut document)?;
            (result, document.has_unsaved_changes())
        };

        debug!(local_id = %mutation.local_id(), revision = result.revision, "Applied mutation");
        self.update_dirty(dirty).await;
        Ok(result)
    }

    /// Merge segments from the text-generation service as unsaved work
    pub async fn import_generated(&self, segments: Vec<Segment>) -> Result<Vec<String>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let (local_ids, dirty) = {
            let mut document = self.document.write().await;
            let local_ids = document.import_generated(segments);
            (local_ids, document.has_unsaved_changes())
        };
        self.update_dirty(dirty).await;
        Ok(local_ids)
    }

    /// Fetch and merge the next page
    pub async fn load_more(&self) -> Result<LoadOutcome, SessionError> {
        if self.is_closed() {
            return Ok(LoadOutcome::Cancelled);
        }
        let Some(_guard) = InFlight::acquire(&self.loading) else {
            debug!(script_id = %self.script_id, "Load-more already in flight");
            return Ok(LoadOutcome::AlreadyLoading);
        };

        let request = {
            let document = self.document.read().await;
            if !document.pagination().has_more() {
                return Ok(LoadOutcome::Exhausted);
            }
            document.pagination().next_request()
        };

        let page = match self
            .backend
            .fetch_segments(&self.script_id, request.skip, request.limit)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                if self.is_closed() {
                    return Ok(LoadOutcome::Cancelled);
                }
                warn!(script_id = %self.script_id, skip = request.skip, error = %e, "Load-more failed");
                self.broadcast(SessionEvent::LoadFailed { message: e.to_string() }).await;
                return Err(e.into());
            }
        };

        if self.is_closed() {
            warn!(script_id = %self.script_id, "Dropping page for closed session");
            return Ok(LoadOutcome::Cancelled);
        }

        let (outcome, dirty) = {
            let mut document = self.document.write().await;
            let outcome = document.merge_page(page);
            (outcome, document.has_unsaved_changes())
        };

        self.broadcast(SessionEvent::PageLoaded {
            added_segments: outcome.added_segments,
            has_more: outcome.has_more,
        })
        .await;
        self.update_dirty(dirty).await;
        Ok(LoadOutcome::Loaded(outcome))
    }

    /// Send everything unsaved and reconcile the answer
    pub async fn save(&self) -> Result<SaveOutcome, SessionError> {
        if self.is_closed() {
            return Ok(SaveOutcome::Cancelled);
        }
        let Some(_guard) = InFlight::acquire(&self.saving) else {
            debug!(script_id = %self.script_id, "Save already in flight");
            return Ok(SaveOutcome::AlreadySaving);
        };

        let plan = self.document.read().await.build_save_plan()?;
        if plan.is_empty() {
            return Ok(SaveOutcome::NothingToSave);
        }

        let response = match self.backend.save_changes(&self.script_id, &plan.request).await {
            Ok(response) => response,
            Err(e) => {
                if self.is_closed() {
                    return Ok(SaveOutcome::Cancelled);
                }
                warn!(script_id = %self.script_id, error = %e, "Save failed");
                self.broadcast(SessionEvent::SaveFailed { message: e.to_string() }).await;
                return Err(e.into());
            }
        };

        if self.is_closed() {
            warn!(script_id = %self.script_id, "Dropping save response for closed session");
            return Ok(SaveOutcome::Cancelled);
        }

        let applied = {
            let mut document = self.document.write().await;
            document
                .apply_save_response(&plan, &response)
                .map(|outcome| (outcome, document.has_unsaved_changes()))
        };

        match applied {
            Ok((outcome, dirty)) => {
                self.broadcast(SessionEvent::Saved { outcome }).await;
                self.update_dirty(dirty).await;
                Ok(SaveOutcome::Saved(outcome))
            }
            Err(e) => {
                self.broadcast(SessionEvent::SaveFailed { message: e.to_string() }).await;
                Err(e.into())
            }
        }
    }

    /// Dirty for longer than the reminder interval
    pub async fn autosave_due(&self) -> bool {
        self.reminder.lock().await.is_due(Instant::now())
    }

    /// Stop accepting work. Responses still in flight are dropped.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.subscribers.write().await.clear();
        info!(script_id = %self.script_id, "Closed script session");
    }

    async fn update_dirty(&self, dirty: bool) {
        self.reminder.lock().await.observe(dirty, Instant::now());
        if self.dirty.swap(dirty, Ordering::AcqRel) != dirty {
            self.broadcast(SessionEvent::DirtyChanged { dirty }).await;
        }
    }
}

/// Initial fetch. Only transient failures are retried, and an empty page is
/// an answer, not a failure.
async fn fetch_with_retry<B: ScriptBackend>(
    backend: &B,
    script_id: &str,
    request: PageRequest,
    config: &SessionConfig,
) -> Result<SegmentsPage, BackendError> {
    let policy = &config.retry;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match backend.fetch_segments(script_id, request.skip, request.limit).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    script_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Initial fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
