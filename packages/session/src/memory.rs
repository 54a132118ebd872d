//! In-memory backend
//!
//! Keeps scripts in a map and applies change-sets the way the real backend
//! does. Ids are issued from a counter, so runs are reproducible. Failures,
//! rejections and a save gate can be injected for tests.

use crate::backend::ScriptBackend;
use crate::errors::BackendError;
use chrono::Utc;
use screenplay_editor::{
    Component, IdMappings, PageRequest, SaveChangesRequest, SaveChangesResponse, Segment, SegmentsPage,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// Holds saves at the backend until released
#[derive(Debug, Clone, Default)]
pub struct SaveGate {
    arrived: Arc<Notify>,
    release: Arc<Notify>,
}

impl SaveGate {
    /// Resolves once a save has reached the backend
    pub async fn arrived(&self) {
        self.arrived.notified().await;
    }

    /// Let the held save continue
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    scripts: Mutex<BTreeMap<String, Vec<Segment>>>,
    next_id: AtomicU64,
    failing_fetches: AtomicUsize,
    failing_saves: AtomicUsize,
    rejected_saves: AtomicUsize,
    gate: Mutex<Option<SaveGate>>,
    fetch_log: Mutex<Vec<PageRequest>>,
}

/// Consume one injected failure, if any is left
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn rejected(message: impl Into<String>) -> SaveChangesResponse {
    SaveChangesResponse {
        success: false,
        message: message.into(),
        id_mappings: IdMappings::default(),
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_script(&self, script_id: &str, segments: Vec<Segment>) {
        self.scripts.lock().await.insert(script_id.to_string(), segments);
    }

    /// Seed a script from a page document (`{ "segments": [...], "total": n }`)
    pub async fn insert_script_json(&self, script_id: &str, json: &str) -> Result<(), BackendError> {
        let page: SegmentsPage = serde_json::from_str(json)?;
        self.insert_script(script_id, page.segments).await;
        Ok(())
    }

    pub async fn segments(&self, script_id: &str) -> Option<Vec<Segment>> {
        self.scripts.lock().await.get(script_id).cloned()
    }

    /// Every fetch received so far, in order
    pub async fn fetches(&self) -> Vec<PageRequest> {
        self.fetch_log.lock().await.clone()
    }

    /// Fail the next `count` fetches as unavailable
    pub fn fail_fetches(&self, count: usize) {
        self.failing_fetches.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` saves as unavailable
    pub fn fail_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    /// Answer the next `count` saves with `success == false`
    pub fn reject_saves(&self, count: usize) {
        self.rejected_saves.store(count, Ordering::SeqCst);
    }

    /// Hold every save until the returned gate is released
    pub async fn hold_saves(&self) -> SaveGate {
        let gate = SaveGate::default();
        *self.gate.lock().await = Some(gate.clone());
        gate
    }

    fn issue_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("00000000-0000-4000-8000-{:012x}", n)
    }

    /// Reject change-sets that point at things that do not exist
    fn validate(segments: &[Segment], request: &SaveChangesRequest) -> Result<(), String> {
        let segment = |id: &str| segments.iter().find(|s| s.id == id);

        for (segment_id, changes) in &request.changed_segments {
            let Some(target) = segment(segment_id.as_str()) else {
                return Err(format!("unknown segment {}", segment_id));
            };
            if let Some(change) = changes
                .iter()
                .find(|c| !target.components.iter().any(|existing| existing.id == c.id))
            {
                return Err(format!("unknown component {} in segment {}", change.id, segment_id));
            }
        }
        for entry in &request.new_components_in_existing_segments {
            if segment(entry.segment_id.as_str()).is_none() {
                return Err(format!("unknown segment {}", entry.segment_id));
            }
        }
        Ok(())
    }

    fn apply(&self, segments: &mut Vec<Segment>, request: &SaveChangesRequest) -> IdMappings {
        let mut mappings = IdMappings::default();

        segments.retain(|s| !request.deleted_segments.contains(&s.id));
        for segment in segments.iter_mut() {
            segment
                .components
                .retain(|c| !request.deleted_elements.contains(&c.id));
        }

        for (segment_id, changes) in &request.changed_segments {
            let Some(segment) = segments.iter_mut().find(|s| &s.id == segment_id) else {
                continue;
            };
            for change in changes {
                if let Some(component) = segment.components.iter_mut().find(|c| c.id == change.id) {
                    component.component_type = change.component_type;
                    component.position = change.position;
                    component.content = change.content.clone();
                    component.character_name = change.character_name.clone();
                    component.parenthetical = change.parenthetical.clone();
                }
            }
        }

        for entry in &request.new_components_in_existing_segments {
            let id = self.issue_id();
            mappings
                .components
                .insert(entry.component.frontend_id.clone(), id.clone());
            if let Some(segment) = segments.iter_mut().find(|s| s.id == entry.segment_id) {
                segment.components.push(Component {
                    id,
                    component_type: entry.component.component_type,
                    position: entry.component.position,
                    content: entry.component.content.clone(),
                    character_name: entry.component.character_name.clone(),
                    parenthetical: entry.component.parenthetical.clone(),
                });
            }
        }

        for new_segment in &request.new_segments {
            let segment_id = self.issue_id();
            mappings
                .segments
                .insert(new_segment.frontend_id.clone(), segment_id.clone());

            let components = new_segment
                .components
                .iter()
                .map(|component| {
                    let id = self.issue_id();
                    mappings.components.insert(component.frontend_id.clone(), id.clone());
                    Component {
                        id,
                        component_type: component.component_type,
                        position: component.position,
                        content: component.content.clone(),
                        character_name: component.character_name.clone(),
                        parenthetical: component.parenthetical.clone(),
                    }
                })
                .collect();

            segments.push(Segment {
                id: segment_id,
                position: Some(new_segment.segment_number),
                created_at: Utc::now().to_rfc3339(),
                components,
            });
        }

        for segment in segments.iter_mut() {
            segment.components.sort_by(|a, b| a.position.total_cmp(&b.position));
        }
        // Seeded rows without a position keep their order; new segments trail
        if segments.iter().all(|s| s.position.is_some()) {
            segments.sort_by(|a, b| a.position.unwrap_or_default().total_cmp(&b.position.unwrap_or_default()));
        }

        mappings
    }
}

impl ScriptBackend for InMemoryBackend {
    async fn fetch_segments(&self, script_id: &str, skip: usize, limit: usize) -> Result<SegmentsPage, BackendError> {
        self.fetch_log.lock().await.push(PageRequest { skip, limit });
        if take_one(&self.failing_fetches) {
            return Err(BackendError::Unavailable("injected fetch failure".to_string()));
        }

        let scripts = self.scripts.lock().await;
        let segments = scripts
            .get(script_id)
            .ok_or_else(|| BackendError::ScriptNotFound(script_id.to_string()))?;

        debug!(script_id, skip, limit, total = segments.len(), "Serving segments");
        Ok(SegmentsPage {
            segments: segments.iter().skip(skip).take(limit).cloned().collect(),
            total: segments.len(),
        })
    }

    async fn save_changes(
        &self,
        script_id: &str,
        request: &SaveChangesRequest,
    ) -> Result<SaveChangesResponse, BackendError> {
        let gate = self.gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.arrived.notify_one();
            gate.release.notified().await;
        }

        if take_one(&self.failing_saves) {
            return Err(BackendError::Unavailable("injected save failure".to_string()));
        }
        if take_one(&self.rejected_saves) {
            return Ok(rejected("injected rejection"));
        }

        let mut scripts = self.scripts.lock().await;
        let segments = scripts
            .get_mut(script_id)
            .ok_or_else(|| BackendError::ScriptNotFound(script_id.to_string()))?;

        if let Err(message) = Self::validate(&*segments, request) {
            debug!(script_id, %message, "Rejecting change-set");
            return Ok(rejected(message));
        }

        let id_mappings = self.apply(segments, request);
        Ok(SaveChangesResponse {
            success: true,
            message: "saved".to_string(),
            id_mappings,
        })
    }
}
