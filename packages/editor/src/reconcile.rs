//! # ID Reconciliation
//!
//! Applies a save response to the document the plan was built from.
//!
//! ```text
//! temp-s-… ──idMappings.segments──→ real segment id
//! temp-c-… ──idMappings.components─→ real component id
//! absorbed line ──owner's mapping──→ id of the speech block it was saved in
//! ```
//!
//! Edits made while the save was in flight are kept. When the revision moved
//! on, only what the plan sent is settled; anything newer stays pending.

use crate::document::ScriptDocument;
use crate::element::Element;
use crate::errors::EditorError;
use crate::payload::SavePlan;
use crate::wire::{IdMappings, SaveChangesResponse};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// What reconciliation did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub segments_mapped: usize,
    pub components_mapped: usize,
    /// The document was edited between plan and response
    pub concurrent_edits: bool,
}

/// Id rewriting for one response
struct IdRewriter<'a> {
    mappings: &'a IdMappings,
    /// `local_id → (id at plan time, owner component id)`
    absorbed: BTreeMap<&'a str, (&'a str, &'a str)>,
}

impl<'a> IdRewriter<'a> {
    fn new(plan: &'a SavePlan, mappings: &'a IdMappings) -> Self {
        let absorbed = plan
            .absorbed
            .iter()
            .map(|line| {
                (
                    line.local_id.as_str(),
                    (line.component_id.as_str(), line.owner_component_id.as_str()),
                )
            })
            .collect();
        Self { mappings, absorbed }
    }

    fn component(&self, id: &str) -> Option<&'a String> {
        self.mappings.components.get(id)
    }

    /// Returns whether anything changed
    fn rewrite(&self, element: &mut Element) -> bool {
        let mut changed = false;

        if let Some(real) = self.mappings.segments.get(&element.segment_id) {
            element.segment_id = real.clone();
            changed = true;
        }

        let owner = match self.absorbed.get(element.local_id.as_str()) {
            Some((at_plan, owner)) if *at_plan == element.component_id => Some(*owner),
            _ => None,
        };
        let target = match owner {
            Some(owner) => Some(self.component(owner).cloned().unwrap_or_else(|| owner.to_string())),
            None => self.component(&element.component_id).cloned(),
        };
        if let Some(target) = target {
            if target != element.component_id {
                element.component_id = target;
                changed = true;
            }
        }

        changed
    }
}

impl ScriptDocument {
    /// Apply the backend's answer to `plan`. A rejected save leaves the
    /// document untouched.
    ///
    /// Every element the plan carried ends up with backend ids. An untouched
    /// placeholder segment is never sent, so it keeps its temporary ids until
    /// something is written into it.
    pub fn apply_save_response(
        &mut self,
        plan: &SavePlan,
        response: &SaveChangesResponse,
    ) -> Result<ReconcileOutcome, EditorError> {
        if !response.success {
            warn!(message = %response.message, "Save rejected");
            return Err(EditorError::SaveRejected(response.message.clone()));
        }

        let rewriter = IdRewriter::new(plan, &response.id_mappings);
        let concurrent_edits = self.revision != plan.revision;

        for element in &mut self.elements {
            rewriter.rewrite(element);
            if element.is_persisted() {
                element.is_new = false;
            } else if element.is_new && !concurrent_edits {
                warn!(local_id = %element.local_id, component_id = %element.component_id, "No id mapping for saved element");
            }
        }

        if concurrent_edits {
            self.settle_sent(plan, &rewriter, &response.id_mappings);
        } else {
            self.tracker.reset(&self.elements);
        }

        for element in &self.elements {
            if element.segment_is_persisted() {
                self.pagination.mark_loaded(&element.segment_id);
            }
        }

        let outcome = ReconcileOutcome {
            segments_mapped: response.id_mappings.segments.len(),
            components_mapped: response.id_mappings.components.len(),
            concurrent_edits,
        };
        info!(
            segments = outcome.segments_mapped,
            components = outcome.components_mapped,
            concurrent = concurrent_edits,
            "Applied save response"
        );
        Ok(outcome)
    }

    /// Settle only what `plan` carried; later edits stay pending
    fn settle_sent(&mut self, plan: &SavePlan, rewriter: &IdRewriter<'_>, mappings: &IdMappings) {
        let mut snapshot = plan.sent_snapshot.clone();
        for element in &mut snapshot {
            rewriter.rewrite(element);
            element.is_new = false;
        }

        // Pages merged while the save was in flight are already synced
        let sent: BTreeSet<&str> = plan.sent_snapshot.iter().map(|e| e.local_id.as_str()).collect();
        let live: BTreeSet<&str> = self.elements.iter().map(|e| e.local_id.as_str()).collect();
        let merged: Vec<Element> = self
            .tracker
            .last_synced_snapshot()
            .iter()
            .filter(|e| !sent.contains(e.local_id.as_str()) && live.contains(e.local_id.as_str()))
            .cloned()
            .collect();
        snapshot.extend(merged);
        self.tracker.replace_snapshot(snapshot);
        self.tracker.settle(
            &plan.sent_modified,
            &plan.sent_deleted_components,
            &plan.sent_deleted_segments,
        );

        for component_id in self.tracker.diverged_components(&self.elements) {
            self.tracker.mark_modified(&component_id);
        }

        // Created by this save, removed locally while it was in flight
        let live_components: BTreeSet<&str> = self.elements.iter().map(|e| e.component_id.as_str()).collect();
        let live_segments: BTreeSet<&str> = self.elements.iter().map(|e| e.segment_id.as_str()).collect();
        let gone_components: Vec<String> = mappings
            .components
            .values()
            .filter(|real| !live_components.contains(real.as_str()))
            .cloned()
            .collect();
        let gone_segments: Vec<String> = mappings
            .segments
            .values()
            .filter(|real| !live_segments.contains(real.as_str()))
            .cloned()
            .collect();

        for component_id in &gone_components {
            self.tracker.mark_deleted_component(component_id);
        }
        for segment_id in &gone_segments {
            self.tracker.mark_deleted_segment(segment_id);
        }

        debug!(
            revision = self.revision,
            planned_at = plan.revision,
            orphaned_components = gone_components.len(),
            orphaned_segments = gone_segments.len(),
            "Settled save with concurrent edits"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::element::ElementType;
    use crate::wire::{Component, ComponentType, Segment, SegmentsPage};

    fn loaded_doc() -> ScriptDocument {
        let mut doc = ScriptDocument::new("script-1", EditorConfig::default());
        doc.load_first_page(SegmentsPage {
            segments: vec![Segment {
                id: "seg-1".to_string(),
                position: Some(1000.0),
                created_at: String::new(),
                components: vec![
                    Component {
                        id: "c-1".to_string(),
                        component_type: ComponentType::Heading,
                        position: 1000.0,
                        content: "INT. HOUSE - DAY".to_string(),
                        character_name: None,
                        parenthetical: None,
                    },
                    Component {
                        id: "c-2".to_string(),
                        component_type: ComponentType::Action,
                        position: 2000.0,
                        content: "Rain.".to_string(),
                        character_name: None,
                        parenthetical: None,
                    },
                ],
            }],
            total: 1,
        });
        doc
    }

    /// Answer a plan the way the backend would: every frontend id gets a
    /// real one
    fn accept(plan: &SavePlan) -> SaveChangesResponse {
        let mut mappings = IdMappings::default();
        let mut next = 100;
        let mut issue = |prefix: &str| {
            next += 1;
            format!("{}-{}", prefix, next)
        };

        for segment in &plan.request.new_segments {
            mappings.segments.insert(segment.frontend_id.clone(), issue("seg"));
            for component in &segment.components {
                mappings.components.insert(component.frontend_id.clone(), issue("c"));
            }
        }
        for entry in &plan.request.new_components_in_existing_segments {
            mappings.components.insert(entry.component.frontend_id.clone(), issue("c"));
        }

        SaveChangesResponse {
            success: true,
            message: String::new(),
            id_mappings: mappings,
        }
    }

    fn heading_id(doc: &ScriptDocument) -> String {
        doc.elements()[0].local_id.clone()
    }

    #[test]
    fn test_round_trip_clears_everything() {
        let mut doc = loaded_doc();
        let action = doc.elements()[1].local_id.clone();
        let inserted = doc.insert_after(&action, ElementType::Action).unwrap();
        doc.change_content(&inserted, "Thunder.").unwrap();
        doc.change_content(&action, "Heavy rain.").unwrap();
        let scene = doc.insert_after(&inserted, ElementType::SceneHeading).unwrap();
        doc.change_content(&scene, "EXT. ROAD - NIGHT").unwrap();

        let plan = doc.build_save_plan().unwrap();
        let outcome = doc.apply_save_response(&plan, &accept(&plan)).unwrap();

        assert!(!outcome.concurrent_edits);
        assert_eq!(outcome.segments_mapped, 1);
        assert_eq!(outcome.components_mapped, 2);
        assert!(doc.elements().iter().all(|e| e.is_persisted() && e.segment_is_persisted() && !e.is_new));
        assert!(doc.tracker().modified_component_ids().is_empty());
        assert!(!doc.has_unsaved_changes());
        assert!(doc.build_save_plan().unwrap().is_empty());

        let new_segment = doc.element(&scene).unwrap().segment_id.clone();
        assert!(doc.pagination().is_loaded(&new_segment));
    }

    #[test]
    fn test_rejected_save_leaves_state_untouched() {
        let mut doc = loaded_doc();
        let action = doc.elements()[1].local_id.clone();
        doc.change_content(&action, "Snow.").unwrap();
        let before = doc.clone();

        let plan = doc.build_save_plan().unwrap();
        let response = SaveChangesResponse {
            success: false,
            message: "validation failed".to_string(),
            id_mappings: IdMappings::default(),
        };

        let err = doc.apply_save_response(&plan, &response).unwrap_err();
        assert_eq!(err, EditorError::SaveRejected("validation failed".to_string()));
        assert_eq!(doc.elements(), before.elements());
        assert_eq!(doc.tracker(), before.tracker());
        assert!(doc.has_unsaved_changes());
    }

    #[test]
    fn test_absorbed_lines_take_the_block_id() {
        let mut doc = loaded_doc();
        let action = doc.elements()[1].local_id.clone();
        let character = doc.insert_after(&action, ElementType::Character).unwrap();
        doc.change_content(&character, "BOB").unwrap();
        let dialogue = doc.insert_after(&character, ElementType::Dialogue).unwrap();
        doc.change_content(&dialogue, "Hi.").unwrap();

        let plan = doc.build_save_plan().unwrap();
        doc.apply_save_response(&plan, &accept(&plan)).unwrap();

        let character = doc.element(&character).unwrap();
        let dialogue = doc.element(&dialogue).unwrap();
        assert!(dialogue.is_persisted());
        assert_eq!(character.component_id, dialogue.component_id);
        assert!(!doc.has_unsaved_changes());
    }

    #[test]
    fn test_edits_during_save_stay_pending() {
        let mut doc = loaded_doc();
        let action = doc.elements()[1].local_id.clone();
        let inserted = doc.insert_after(&action, ElementType::Action).unwrap();
        doc.change_content(&inserted, "Thunder.").unwrap();

        let plan = doc.build_save_plan().unwrap();

        // While the save is in flight
        doc.change_content(&inserted, "Thunder, closer.").unwrap();
        let late = doc.insert_after(&inserted, ElementType::Action).unwrap();
        doc.change_content(&late, "Lightning.").unwrap();

        let outcome = doc.apply_save_response(&plan, &accept(&plan)).unwrap();
        assert!(outcome.concurrent_edits);

        let saved = doc.element(&inserted).unwrap().clone();
        assert!(saved.is_persisted());
        assert!(!saved.is_new);
        assert!(doc.tracker().modified_component_ids().contains(&saved.component_id));

        let late = doc.element(&late).unwrap();
        assert!(late.is_new);
        assert!(doc.has_unsaved_changes());

        let next = doc.build_save_request().unwrap();
        assert_eq!(next.changed_segments["seg-1"][0].content, "Thunder, closer.");
        assert_eq!(next.new_components_in_existing_segments.len(), 1);
    }

    #[test]
    fn test_line_deleted_during_save_is_deleted_next() {
        let mut doc = loaded_doc();
        let inserted = doc.insert_after(&heading_id(&doc), ElementType::Action).unwrap();
        doc.change_content(&inserted, "Thunder.").unwrap();

        let plan = doc.build_save_plan().unwrap();
        doc.delete_element(&inserted).unwrap();
        let response = accept(&plan);
        let real = response.id_mappings.components.values().next().unwrap().clone();

        doc.apply_save_response(&plan, &response).unwrap();
        assert!(doc.tracker().deleted_component_ids().contains(&real));
        assert_eq!(doc.build_save_request().unwrap().deleted_elements, vec![real]);
    }

    #[test]
    fn test_page_merged_during_save_stays_synced() {
        let mut doc = loaded_doc();
        let action = doc.elements()[1].local_id.clone();
        doc.change_content(&action, "Heavy rain.").unwrap();

        let plan = doc.build_save_plan().unwrap();

        // While the save is in flight
        doc.change_content(&heading_id(&doc), "INT. HOUSE - NIGHT").unwrap();
        doc.merge_page(SegmentsPage {
            segments: vec![Segment {
                id: "seg-2".to_string(),
                position: Some(2000.0),
                created_at: String::new(),
                components: vec![Component {
                    id: "c-3".to_string(),
                    component_type: ComponentType::Heading,
                    position: 1000.0,
                    content: "EXT. YARD - DAY".to_string(),
                    character_name: None,
                    parenthetical: None,
                }],
            }],
            total: 2,
        });

        let outcome = doc.apply_save_response(&plan, &accept(&plan)).unwrap();
        assert!(outcome.concurrent_edits);

        let modified = doc.tracker().modified_component_ids();
        assert!(modified.contains("c-1"));
        assert!(!modified.contains("c-2"));
        assert!(!modified.contains("c-3"));
        assert!(!doc.dirty_report().count_differs);

        let next = doc.build_save_request().unwrap();
        assert_eq!(next.changed_segments.keys().collect::<Vec<_>>(), vec!["seg-1"]);
        assert_eq!(next.changed_segments["seg-1"].len(), 1);
        assert_eq!(next.changed_segments["seg-1"][0].id, "c-1");
    }

    #[test]
    fn test_untouched_placeholder_stays_temporary() {
        let mut doc = ScriptDocument::new("script-1", EditorConfig::default());
        doc.load_first_page(SegmentsPage::default());
        let placeholder = heading_id(&doc);

        let plan = doc.build_save_plan().unwrap();
        assert!(plan.is_empty());
        doc.apply_save_response(&plan, &accept(&plan)).unwrap();

        let placeholder = doc.element(&placeholder).unwrap();
        assert!(!placeholder.is_persisted());
        assert!(!placeholder.segment_is_persisted());
        assert!(!doc.has_unsaved_changes());
    }

    #[test]
    fn test_deletions_settle_after_save() {
        let mut doc = loaded_doc();
        let action = doc.elements()[1].local_id.clone();
        doc.delete_element(&action).unwrap();
        assert!(doc.has_unsaved_changes());

        let plan = doc.build_save_plan().unwrap();
        assert_eq!(plan.request.deleted_elements, vec!["c-2".to_string()]);
        doc.apply_save_response(&plan, &accept(&plan)).unwrap();

        assert!(doc.tracker().deleted_component_ids().is_empty());
        assert!(!doc.has_unsaved_changes());
    }
}
