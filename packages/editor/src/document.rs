//! # Script Document
//!
//! One open screenplay: the element sequence in display order plus
//! everything needed to reconcile it with the backend.
//!
//! ## Lifecycle
//!
//! ```text
//! new → load_first_page → edit* → build_save_plan → apply_save_response
//!                 ↑                                         │
//!                 └──────────── merge_page (load more) ─────┘
//! ```
//!
//! Segments are not materialized. A segment is the set of elements sharing a
//! `segment_id`; [`ScriptDocument::segments`] derives the grouped view on
//! demand.

use crate::config::EditorConfig;
use crate::element::{Element, ElementType};
use crate::ids::IdGenerator;
use crate::pagination::PaginationState;
use crate::tracking::{ChangeTracker, DirtyReport};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Editable screenplay document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDocument {
    /// Backend identity of the script
    pub script_id: String,

    pub(crate) config: EditorConfig,

    /// Display order
    pub(crate) elements: Vec<Element>,

    pub(crate) tracker: ChangeTracker,

    pub(crate) pagination: PaginationState,

    pub(crate) ids: IdGenerator,

    /// Highest segment position handed out so far
    pub(crate) segment_high_water: Option<f64>,

    /// Increments on every applied edit
    pub(crate) revision: u64,

    /// Initial load finished; the dirty tracker stays quiet until then
    pub(crate) loaded: bool,
}

/// Grouped, ordered view of one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentView<'a> {
    pub segment_id: &'a str,
    pub segment_position: f64,
    /// Sorted by `position`
    pub elements: Vec<&'a Element>,
}

impl<'a> SegmentView<'a> {
    /// Leading scene heading, if the segment has one
    pub fn heading(&self) -> Option<&'a Element> {
        self.elements
            .first()
            .copied()
            .filter(|e| e.element_type.is_scene_heading())
    }
}

impl ScriptDocument {
    pub fn new(script_id: impl Into<String>, config: EditorConfig) -> Self {
        let script_id = script_id.into();
        Self {
            ids: IdGenerator::new(&script_id),
            pagination: PaginationState::new(config.page_size),
            script_id,
            config,
            elements: Vec::new(),
            tracker: ChangeTracker::default(),
            segment_high_water: None,
            revision: 0,
            loaded: false,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Elements in display order
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, local_id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.local_id == local_id)
    }

    pub fn index_of(&self, local_id: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.local_id == local_id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    /// Unsaved-changes breakdown. Pure and idempotent.
    pub fn dirty_report(&self) -> DirtyReport {
        if !self.loaded {
            return DirtyReport::default();
        }
        self.tracker.evaluate(&self.elements)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty_report().has_unsaved_changes()
    }

    /// Segments ordered by `segment_position`, elements by `position`
    pub fn segments(&self) -> Vec<SegmentView<'_>> {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&Element>> = HashMap::new();

        for element in &self.elements {
            let group = groups.entry(element.segment_id.as_str()).or_insert_with(|| {
                order.push(element.segment_id.as_str());
                Vec::new()
            });
            group.push(element);
        }

        let mut views: Vec<SegmentView<'_>> = order
            .into_iter()
            .filter_map(|segment_id| {
                let mut elements = groups.remove(segment_id)?;
                elements.sort_by(|a, b| a.position.total_cmp(&b.position));
                let segment_position = elements.first()?.segment_position;
                Some(SegmentView {
                    segment_id,
                    segment_position,
                    elements,
                })
            })
            .collect();

        // Stable: equal keys keep first-appearance order
        views.sort_by(|a, b| a.segment_position.total_cmp(&b.segment_position));
        views
    }

    /// Re-sort the whole sequence: segments by their leader's
    /// `segment_position`, elements inside a segment by `position`.
    pub(crate) fn regroup(&mut self) {
        let mut leaders: HashMap<String, (f64, usize)> = HashMap::new();
        for (i, element) in self.elements.iter().enumerate() {
            leaders
                .entry(element.segment_id.clone())
                .or_insert((element.segment_position, i));
        }

        self.elements.sort_by(|a, b| {
            let (a_pos, a_first) = leaders[&a.segment_id];
            let (b_pos, b_first) = leaders[&b.segment_id];
            a_pos
                .total_cmp(&b_pos)
                .then(a_first.cmp(&b_first))
                .then(a.position.total_cmp(&b.position))
        });
    }

    pub fn max_segment_position(&self) -> Option<f64> {
        self.elements
            .iter()
            .map(|e| e.segment_position)
            .reduce(f64::max)
    }

    /// Tail key for a brand-new segment.
    ///
    /// Strictly above every segment in the document and every key issued
    /// before, and never behind the wall clock in milliseconds, so segments
    /// created locally also sort after segments saved earlier that are not
    /// fetched yet. Rapid successive scene headings keep moving forward
    /// through the high-water mark.
    pub(crate) fn next_segment_position(&mut self) -> f64 {
        let floor = match (self.max_segment_position(), self.segment_high_water) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let clock = Utc::now().timestamp_millis() as f64;
        let position = self.config.segment_allocator().after(floor).max(clock);
        self.note_segment_position(position);
        position
    }

    pub(crate) fn note_segment_position(&mut self, position: f64) {
        self.segment_high_water = Some(self.segment_high_water.map_or(position, |hw| hw.max(position)));
    }

    /// Single empty scene heading used when the script has no segments yet
    pub(crate) fn seed_placeholder(&mut self) {
        let base = self.config.position_base;
        let element = Element {
            local_id: self.ids.local_id(),
            component_id: self.ids.temp_component_id(),
            element_type: ElementType::SceneHeading,
            content: String::new(),
            segment_id: self.ids.temp_segment_id(),
            position: base,
            segment_position: base,
            is_new: false,
        };
        debug!(local_id = %element.local_id, "Seeding placeholder segment");
        self.note_segment_position(base);
        self.elements.push(element);
    }

    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }
}
