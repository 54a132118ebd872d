//! # Change tracking and the dirty tracker
//!
//! The tracker holds the three change sets and the snapshot of the element
//! sequence as of the last successful load or save. `evaluate` is a pure
//! function of the tracker and the current elements: calling it any number of
//! times without an edit in between gives the same answer and touches
//! nothing.
//!
//! A component id stays in `modified_component_ids` until the next save or
//! load even when its content is edited back to the original. Such a
//! component no longer counts as a pending change, because the evaluation
//! compares tracked ids against the snapshot instead of trusting the set.

use crate::element::{Element, ElementType};
use crate::ids::is_temporary;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTracker {
    modified_component_ids: BTreeSet<String>,
    deleted_component_ids: BTreeSet<String>,
    deleted_segment_ids: BTreeSet<String>,
    last_synced_snapshot: Vec<Element>,
}

/// Breakdown behind the "unsaved changes" decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirtyReport {
    pub any_new: bool,
    pub any_structural_deletion: bool,
    pub count_differs: bool,
    pub content_modified: bool,
    pub tracked_modification_pending: bool,
}

impl DirtyReport {
    pub fn has_unsaved_changes(&self) -> bool {
        self.any_new || self.any_structural_deletion || self.tracked_modification_pending
    }
}

/// The lines a component is rendered as, in document order
type ComponentGroups<'a> = BTreeMap<&'a str, Vec<&'a Element>>;

fn group_by_component(elements: &[Element]) -> ComponentGroups<'_> {
    let mut groups: ComponentGroups<'_> = BTreeMap::new();
    for element in elements.iter().filter(|e| !is_temporary(&e.component_id)) {
        groups.entry(element.component_id.as_str()).or_default().push(element);
    }
    groups
}

fn same_text(a: &[&Element], b: &[&Element]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.element_type == y.element_type && x.content == y.content)
}

fn same_text_and_place(a: &[&Element], b: &[&Element]) -> bool {
    same_text(a, b) && a.iter().zip(b).all(|(x, y)| x.position == y.position)
}

impl ChangeTracker {
    pub fn modified_component_ids(&self) -> &BTreeSet<String> {
        &self.modified_component_ids
    }

    pub fn deleted_component_ids(&self) -> &BTreeSet<String> {
        &self.deleted_component_ids
    }

    pub fn deleted_segment_ids(&self) -> &BTreeSet<String> {
        &self.deleted_segment_ids
    }

    pub fn last_synced_snapshot(&self) -> &[Element] {
        &self.last_synced_snapshot
    }

    /// Record a content/type/position change. Temporary ids are ignored.
    pub fn mark_modified(&mut self, component_id: &str) {
        if !is_temporary(component_id) {
            self.modified_component_ids.insert(component_id.to_string());
        }
    }

    pub fn mark_deleted_component(&mut self, component_id: &str) {
        if !is_temporary(component_id) {
            self.modified_component_ids.remove(component_id);
            self.deleted_component_ids.insert(component_id.to_string());
        }
    }

    pub fn mark_deleted_segment(&mut self, segment_id: &str) {
        if !is_temporary(segment_id) {
            self.deleted_segment_ids.insert(segment_id.to_string());
        }
    }

    /// Clear every set and take a fresh snapshot
    pub fn reset(&mut self, elements: &[Element]) {
        self.modified_component_ids.clear();
        self.deleted_component_ids.clear();
        self.deleted_segment_ids.clear();
        self.last_synced_snapshot = elements.to_vec();
    }

    /// Add freshly fetched, already persisted elements to the baseline
    pub fn extend_snapshot(&mut self, elements: &[Element]) {
        self.last_synced_snapshot.extend_from_slice(elements);
    }

    pub(crate) fn replace_snapshot(&mut self, snapshot: Vec<Element>) {
        self.last_synced_snapshot = snapshot;
    }

    /// Drop ids a save has settled, keeping anything recorded afterwards
    pub(crate) fn settle(
        &mut self,
        modified: &BTreeSet<String>,
        deleted_components: &BTreeSet<String>,
        deleted_segments: &BTreeSet<String>,
    ) {
        self.modified_component_ids.retain(|id| !modified.contains(id));
        self.deleted_component_ids.retain(|id| !deleted_components.contains(id));
        self.deleted_segment_ids.retain(|id| !deleted_segments.contains(id));
    }

    /// Persisted components whose lines differ from the snapshot
    pub(crate) fn diverged_components(&self, elements: &[Element]) -> BTreeSet<String> {
        let snapshot = group_by_component(&self.last_synced_snapshot);
        group_by_component(elements)
            .into_iter()
            .filter(|(id, lines)| {
                snapshot
                    .get(id)
                    .map_or(true, |before| !same_text_and_place(lines, before))
            })
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Decide whether `elements` carries anything the backend has not seen
    pub fn evaluate(&self, elements: &[Element]) -> DirtyReport {
        let any_new = elements.iter().any(|e| e.is_new);
        let any_structural_deletion =
            !self.deleted_component_ids.is_empty() || !self.deleted_segment_ids.is_empty();
        let count_differs = elements.len() != self.last_synced_snapshot.len();

        let current = group_by_component(elements);
        let snapshot = group_by_component(&self.last_synced_snapshot);

        let content_modified = count_differs
            || current.iter().any(|(id, lines)| {
                snapshot.get(id).map_or(false, |before| !same_text(lines, before))
            });

        let tracked_modification_pending = !self.modified_component_ids.is_empty()
            && (count_differs
                || self.modified_component_ids.iter().any(|id| {
                    match (current.get(id.as_str()), snapshot.get(id.as_str())) {
                        (Some(now), Some(before)) => !same_text_and_place(now, before),
                        _ => true,
                    }
                }));

        DirtyReport {
            any_new,
            any_structural_deletion,
            count_differs,
            content_modified,
            tracked_modification_pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(component_id: &str, element_type: ElementType, content: &str, position: f64) -> Element {
        Element {
            local_id: format!("l-{}-{}", component_id, position),
            component_id: component_id.to_string(),
            element_type,
            content: content.to_string(),
            segment_id: "seg-1".to_string(),
            position,
            segment_position: 1000.0,
            is_new: false,
        }
    }

    fn saved() -> Vec<Element> {
        vec![
            element("c-1", ElementType::SceneHeading, "INT. HOUSE", 1000.0),
            element("c-2", ElementType::Action, "Rain.", 2000.0),
        ]
    }

    #[test]
    fn test_clean_document_is_not_dirty() {
        let mut tracker = ChangeTracker::default();
        let elements = saved();
        tracker.reset(&elements);

        let report = tracker.evaluate(&elements);
        assert!(!report.has_unsaved_changes());
        assert!(!report.content_modified);
    }

    #[test]
    fn test_edit_then_revert_is_not_dirty() {
        let mut tracker = ChangeTracker::default();
        let mut elements = saved();
        tracker.reset(&elements);

        elements[1].content = "Snow.".to_string();
        tracker.mark_modified("c-2");
        assert!(tracker.evaluate(&elements).has_unsaved_changes());

        elements[1].content = "Rain.".to_string();
        let report = tracker.evaluate(&elements);
        assert!(!report.has_unsaved_changes());
        // The id stays tracked until the next save
        assert!(tracker.modified_component_ids().contains("c-2"));
    }

    #[test]
    fn test_untracked_divergence_does_not_count() {
        let mut tracker = ChangeTracker::default();
        let mut elements = saved();
        tracker.reset(&elements);

        elements[1].content = "Snow.".to_string();
        let report = tracker.evaluate(&elements);
        assert!(report.content_modified);
        assert!(!report.has_unsaved_changes());
    }

    #[test]
    fn test_deletion_is_dirty() {
        let mut tracker = ChangeTracker::default();
        let mut elements = saved();
        tracker.reset(&elements);

        elements.pop();
        tracker.mark_deleted_component("c-2");
        let report = tracker.evaluate(&elements);
        assert!(report.any_structural_deletion);
        assert!(report.count_differs);
        assert!(report.has_unsaved_changes());
    }

    #[test]
    fn test_temporary_ids_are_never_tracked() {
        let mut tracker = ChangeTracker::default();
        tracker.mark_modified("temp-c-1");
        tracker.mark_deleted_component("temp-c-2");
        tracker.mark_deleted_segment("temp-s-3");

        assert!(tracker.modified_component_ids().is_empty());
        assert!(tracker.deleted_component_ids().is_empty());
        assert!(tracker.deleted_segment_ids().is_empty());
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let mut tracker = ChangeTracker::default();
        let mut elements = saved();
        tracker.reset(&elements);
        elements[0].content = "EXT. HOUSE".to_string();
        tracker.mark_modified("c-1");

        let before = tracker.clone();
        let first = tracker.evaluate(&elements);
        let second = tracker.evaluate(&elements);
        assert_eq!(first, second);
        assert_eq!(before, tracker);
    }

    #[test]
    fn test_repositioned_component_counts_when_tracked() {
        let mut tracker = ChangeTracker::default();
        let mut elements = saved();
        tracker.reset(&elements);

        elements[1].position = 3000.0;
        tracker.mark_modified("c-2");
        assert!(tracker.evaluate(&elements).has_unsaved_changes());
        assert_eq!(tracker.diverged_components(&elements).len(), 1);
    }
}
