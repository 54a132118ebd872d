//! # Pagination Merger
//!
//! Segments arrive from the backend a page at a time. Each page is filtered
//! against what is already loaded, expanded into elements, appended, and then
//! the whole sequence is regrouped. Pages are small and merges only happen on
//! explicit load-more events, so a full re-sort is cheap enough.
//!
//! The offset always advances by the raw page length, duplicates included;
//! otherwise a page made entirely of already-loaded segments would be
//! requested forever.

use crate::convert::{expand_component, ExpandTarget};
use crate::document::ScriptDocument;
use crate::element::Element;
use crate::wire::{Segment, SegmentsPage};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Offset bookkeeping for incremental segment fetches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    page_size: usize,
    offset: usize,
    total: Option<usize>,
    has_more: bool,
    loaded_segment_ids: BTreeSet<String>,
}

/// `skip`/`limit` pair for the next fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub skip: usize,
    pub limit: usize,
}

/// What a merge did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub received: usize,
    pub added_segments: usize,
    pub skipped_duplicates: usize,
    pub added_elements: usize,
    pub has_more: bool,
}

impl PaginationState {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            offset: 0,
            total: None,
            has_more: true,
            loaded_segment_ids: BTreeSet::new(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total(&self) -> Option<usize> {
        self.total
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loaded(&self, segment_id: &str) -> bool {
        self.loaded_segment_ids.contains(segment_id)
    }

    pub fn mark_loaded(&mut self, segment_id: &str) {
        self.loaded_segment_ids.insert(segment_id.to_string());
    }

    pub fn next_request(&self) -> PageRequest {
        PageRequest {
            skip: self.offset,
            limit: self.page_size,
        }
    }

    /// Record a received page. An empty page ends pagination.
    pub fn advance(&mut self, received: usize, total: usize) {
        self.offset += received;
        self.total = Some(total);
        self.has_more = received > 0 && self.offset < total;
    }

    fn reset(&mut self) {
        *self = Self::new(self.page_size);
    }
}

/// Order key for a fetched segment: its position, else its creation time,
/// else its place in the overall fetch order
fn segment_position_for(segment: &Segment, absolute_index: usize, increment: f64) -> f64 {
    if let Some(position) = segment.position {
        return position;
    }
    match DateTime::parse_from_rfc3339(&segment.created_at) {
        Ok(created) => created.timestamp_millis() as f64,
        Err(e) => {
            warn!(segment_id = %segment.id, error = %e, "Segment has no usable order key");
            (absolute_index + 1) as f64 * increment
        }
    }
}

impl ScriptDocument {
    /// Initial load: replace everything with the first page, or seed a
    /// placeholder scene heading when the script is empty
    pub fn load_first_page(&mut self, page: SegmentsPage) -> MergeOutcome {
        self.elements.clear();
        self.tracker.reset(&[]);
        self.pagination.reset();
        self.segment_high_water = None;

        let outcome = self.merge_page(page);
        if self.elements.is_empty() {
            self.seed_placeholder();
        }

        self.tracker.reset(&self.elements);
        self.loaded = true;
        info!(
            script_id = %self.script_id,
            segments = outcome.added_segments,
            elements = self.elements.len(),
            "Loaded script"
        );
        outcome
    }

    /// Merge a fetched page into the document
    pub fn merge_page(&mut self, page: SegmentsPage) -> MergeOutcome {
        let received = page.segments.len();
        let mut outcome = MergeOutcome {
            received,
            ..Default::default()
        };

        let present: BTreeSet<String> = self.elements.iter().map(|e| e.segment_id.clone()).collect();
        let mut fresh: Vec<Element> = Vec::new();

        for (i, segment) in page.segments.iter().enumerate() {
            if self.pagination.is_loaded(&segment.id) || present.contains(&segment.id) {
                debug!(segment_id = %segment.id, "Skipping already loaded segment");
                outcome.skipped_duplicates += 1;
                continue;
            }

            let segment_position = segment_position_for(
                segment,
                self.pagination.offset() + i,
                self.config.segment_increment,
            );
            fresh.extend(self.expand_segment(segment, segment_position, true));
            self.pagination.mark_loaded(&segment.id);
            self.note_segment_position(segment_position);
            outcome.added_segments += 1;
        }

        outcome.added_elements = fresh.len();
        self.tracker.extend_snapshot(&fresh);
        self.elements.extend(fresh);
        self.regroup();

        self.pagination.advance(received, page.total);
        outcome.has_more = self.pagination.has_more();

        debug!(
            received,
            added = outcome.added_segments,
            skipped = outcome.skipped_duplicates,
            offset = self.pagination.offset(),
            "Merged page"
        );
        outcome
    }

    /// Merge segments produced by the text-generation service. They have
    /// never been saved, so they get temporary ids and tail positions.
    pub fn import_generated(&mut self, segments: Vec<Segment>) -> Vec<String> {
        let mut local_ids = Vec::new();

        for segment in &segments {
            let segment_position = self.next_segment_position();
            let elements = self.expand_segment(segment, segment_position, false);
            local_ids.extend(elements.iter().map(|e| e.local_id.clone()));
            self.elements.extend(elements);
        }

        if !local_ids.is_empty() {
            self.regroup();
            self.touch();
        }
        info!(segments = segments.len(), elements = local_ids.len(), "Imported generated segments");
        local_ids
    }

    fn expand_segment(&mut self, segment: &Segment, segment_position: f64, persisted: bool) -> Vec<Element> {
        let segment_id = if persisted {
            segment.id.clone()
        } else {
            self.ids.temp_segment_id()
        };
        let target = ExpandTarget {
            segment_id: &segment_id,
            segment_position,
            persisted,
        };

        let mut components: Vec<_> = segment.components.iter().collect();
        components.sort_by(|a, b| a.position.total_cmp(&b.position));

        components
            .into_iter()
            .flat_map(|component| expand_component(component, &target, &mut self.ids))
            .collect()
    }
}
