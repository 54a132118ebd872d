//! # Document Mutations
//!
//! Edits a user can make to the element sequence, each applied synchronously
//! and atomically.
//!
//! ## Mutation Semantics
//!
//! ### InsertAfter
//! - Scene headings open a new segment at the ordering tail
//! - Other lines join the segment of the nearest preceding scene heading and
//!   take a key between their true neighbours inside that segment
//! - A missing anchor appends at the tail instead of dropping the line
//!
//! ### ChangeType
//! - Promotion to scene heading: new segment, new component; the old
//!   persisted component is deleted
//! - Demotion from scene heading: joins the preceding segment as a new
//!   component; lines left without a heading follow it
//! - Anything else: same ids, the component is marked modified. A retype
//!   that breaks a persisted speech block apart splits it (see below)
//!
//! ### ChangeContent
//! - Atomic replacement; a no-op when the content is unchanged
//!
//! ### Delete / BackspaceEmpty
//! - Persisted components are recorded as deleted, persisted segments too
//!   when their heading goes
//!
//! Speech blocks share one component id across character, parenthetical and
//! dialogue lines. The dialogue line owns the id: when it leaves, the
//! component is deleted and its partners become new components; when a
//! partner leaves, the component is only modified. An insert or retype that
//! leaves those lines no longer reading as one block splits it: the
//! dialogue line (or the retyped former dialogue) keeps the id as a
//! modified component and the other lines become new components.

use crate::document::ScriptDocument;
use crate::element::{Element, ElementType};
use crate::errors::EditorError;
use crate::payload::group_units;
use crate::position::PositionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Semantic edits on a script document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mutation {
    /// Insert an empty line of `element_type` right after an existing one
    InsertAfter {
        after_local_id: String,
        element_type: ElementType,
    },

    /// Retype an existing line
    ChangeType {
        local_id: String,
        element_type: ElementType,
    },

    /// Replace the content of a line (atomic replacement)
    ChangeContent {
        local_id: String,
        content: String,
    },

    /// Remove a line
    Delete {
        local_id: String,
    },

    /// Backspace at the start of an empty line
    BackspaceEmpty {
        local_id: String,
    },
}

/// What backspace on an empty line did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackspaceOutcome {
    /// First line of the script: removed in place
    DeletedInPlace,
    /// Removed; the caret belongs at the end of the previous line
    MergeIntoPrevious { previous_local_id: String },
    /// The line still has text; nothing changed
    NotEmpty,
}

/// Result of applying a mutation
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    /// Document revision after the mutation
    pub revision: u64,

    /// Line created by an insert
    pub inserted_local_id: Option<String>,

    /// Outcome of a backspace
    pub backspace: Option<BackspaceOutcome>,
}

impl Mutation {
    /// Apply mutation to the document with validation
    pub fn apply(&self, doc: &mut ScriptDocument) -> Result<MutationResult, EditorError> {
        self.validate(doc)?;

        let mut result = MutationResult {
            revision: doc.revision(),
            inserted_local_id: None,
            backspace: None,
        };

        match self {
            Mutation::InsertAfter { after_local_id, element_type } => {
                result.inserted_local_id = Some(doc.insert_after(after_local_id, *element_type)?);
            }
            Mutation::ChangeType { local_id, element_type } => {
                doc.change_type(local_id, *element_type)?;
            }
            Mutation::ChangeContent { local_id, content } => {
                doc.change_content(local_id, content)?;
            }
            Mutation::Delete { local_id } => {
                doc.delete_element(local_id)?;
            }
            Mutation::BackspaceEmpty { local_id } => {
                result.backspace = Some(doc.backspace_empty(local_id)?);
            }
        }

        result.revision = doc.revision();
        Ok(result)
    }

    /// Validate without applying
    pub fn validate(&self, doc: &ScriptDocument) -> Result<(), EditorError> {
        match self {
            // A missing anchor is recovered by appending
            Mutation::InsertAfter { .. } => Ok(()),

            Mutation::ChangeType { local_id, .. }
            | Mutation::ChangeContent { local_id, .. }
            | Mutation::Delete { local_id }
            | Mutation::BackspaceEmpty { local_id } => doc
                .element(local_id)
                .map(|_| ())
                .ok_or_else(|| EditorError::ElementNotFound(local_id.clone())),
        }
    }

    /// Target line of the mutation
    pub fn local_id(&self) -> &str {
        match self {
            Mutation::InsertAfter { after_local_id, .. } => after_local_id,
            Mutation::ChangeType { local_id, .. }
            | Mutation::ChangeContent { local_id, .. }
            | Mutation::Delete { local_id }
            | Mutation::BackspaceEmpty { local_id } => local_id,
        }
    }
}

impl ScriptDocument {
    /// Insert an empty line after `after_local_id` and return its local id
    pub fn insert_after(&mut self, after_local_id: &str, element_type: ElementType) -> Result<String, EditorError> {
        let anchor = match self.index_of(after_local_id) {
            Some(index) => Some(index),
            None => {
                warn!(anchor = %after_local_id, "Insert anchor not found, appending at tail");
                self.elements.len().checked_sub(1)
            }
        };

        let (segment_id, segment_position) = match anchor {
            Some(index) if !element_type.is_scene_heading() => self.target_segment(index),
            _ => (self.ids.temp_segment_id(), self.next_segment_position()),
        };

        let element = Element {
            local_id: self.ids.local_id(),
            component_id: self.ids.temp_component_id(),
            element_type,
            content: String::new(),
            segment_id,
            position: 0.0,
            segment_position,
            is_new: true,
        };
        let local_id = element.local_id.clone();

        let index = anchor.map_or(0, |i| i + 1);
        self.elements.insert(index, element);
        self.place(index)?;
        if let Some(anchor) = anchor {
            let block = self.elements[anchor].component_id.clone();
            self.split_broken_block(&block, None);
        }
        self.touch();

        debug!(
            local_id = %local_id,
            element_type = %element_type,
            position = self.elements[index].position,
            "Inserted element"
        );
        Ok(local_id)
    }

    /// Retype a line, moving it between segments when a scene heading is
    /// gained or lost
    pub fn change_type(&mut self, local_id: &str, new_type: ElementType) -> Result<(), EditorError> {
        let index = self.require(local_id)?;
        let old_type = self.elements[index].element_type;
        if old_type == new_type {
            return Ok(());
        }

        match (old_type.is_scene_heading(), new_type.is_scene_heading()) {
            (false, true) => self.promote_to_heading(index),
            (true, false) => self.demote_heading(index, new_type)?,
            _ => {
                let element = &mut self.elements[index];
                element.element_type = new_type;
                let component_id = element.component_id.clone();
                self.tracker.mark_modified(&component_id);
                // The dialogue line keeps the id, even when this line now reads as one
                let keeper = if old_type == ElementType::Dialogue {
                    Some(local_id.to_string())
                } else {
                    self.elements
                        .iter()
                        .enumerate()
                        .find(|(i, e)| {
                            *i != index && e.component_id == component_id && e.element_type == ElementType::Dialogue
                        })
                        .map(|(_, e)| e.local_id.clone())
                };
                self.split_broken_block(&component_id, keeper.as_deref());
            }
        }

        self.touch();
        debug!(local_id = %local_id, from = %old_type, to = %new_type, "Changed element type");
        Ok(())
    }

    /// Replace the content of a line
    pub fn change_content(&mut self, local_id: &str, content: &str) -> Result<(), EditorError> {
        let index = self.require(local_id)?;
        let element = &mut self.elements[index];
        if element.content == content {
            return Ok(());
        }

        element.content = content.to_string();
        if element.is_persisted() {
            let component_id = element.component_id.clone();
            self.tracker.mark_modified(&component_id);
        } else {
            element.is_new = true;
        }

        self.touch();
        Ok(())
    }

    /// Remove a line, recording persisted ids for deletion
    pub fn delete_element(&mut self, local_id: &str) -> Result<(), EditorError> {
        let index = self.require(local_id)?;
        self.release_component(index);

        let removed = self.elements.remove(index);
        if removed.element_type.is_scene_heading() {
            self.tracker.mark_deleted_segment(&removed.segment_id);
            self.rehome_orphans(&removed.segment_id, removed.segment_is_persisted())?;
        }

        self.touch();
        debug!(local_id = %local_id, component_id = %removed.component_id, "Deleted element");
        Ok(())
    }

    /// Backspace at the start of an empty line
    pub fn backspace_empty(&mut self, local_id: &str) -> Result<BackspaceOutcome, EditorError> {
        let index = self.require(local_id)?;
        if !crate::convert::strip_markup(&self.elements[index].content).is_empty() {
            return Ok(BackspaceOutcome::NotEmpty);
        }

        let outcome = match index {
            0 => BackspaceOutcome::DeletedInPlace,
            _ => BackspaceOutcome::MergeIntoPrevious {
                previous_local_id: self.elements[index - 1].local_id.clone(),
            },
        };
        self.delete_element(local_id)?;
        Ok(outcome)
    }

    fn require(&self, local_id: &str) -> Result<usize, EditorError> {
        self.index_of(local_id)
            .ok_or_else(|| EditorError::ElementNotFound(local_id.to_string()))
    }

    /// Segment a line inserted after `anchor` belongs to: the one led by the
    /// nearest scene heading at or before the anchor, else the anchor's own
    fn target_segment(&self, anchor: usize) -> (String, f64) {
        let source = self.elements[..=anchor]
            .iter()
            .rev()
            .find(|e| e.element_type.is_scene_heading())
            .unwrap_or(&self.elements[anchor]);
        (source.segment_id.clone(), source.segment_position)
    }

    fn preceding_heading(&self, index: usize) -> Option<usize> {
        self.elements[..index]
            .iter()
            .rposition(|e| e.element_type.is_scene_heading())
    }

    /// Give the element at `index` a key between its neighbours in its own
    /// segment, rebalancing the segment when the gap is used up
    pub(crate) fn place(&mut self, index: usize) -> Result<(), EditorError> {
        let segment_id = self.elements[index].segment_id.clone();
        let position = match self.slot_position(&segment_id, index) {
            Ok(position) => position,
            Err(PositionError::Exhausted { prev, next }) => {
                warn!(segment_id = %segment_id, prev, next, "Position gap exhausted, rebalancing segment");
                self.rebalance_segment(&segment_id);
                self.slot_position(&segment_id, index)?
            }
        };
        self.elements[index].position = position;
        Ok(())
    }

    fn slot_position(&self, segment_id: &str, index: usize) -> Result<f64, PositionError> {
        let prev = self.elements[..index]
            .iter()
            .rev()
            .find(|e| e.segment_id == segment_id)
            .map(|e| e.position);
        let next = self.elements[index + 1..]
            .iter()
            .find(|e| e.segment_id == segment_id)
            .map(|e| e.position);
        self.config.component_allocator().allocate_between(prev, next)
    }

    /// Renumber a segment in display order. Persisted components that move
    /// are recorded as modified.
    fn rebalance_segment(&mut self, segment_id: &str) {
        let allocator = self.config.component_allocator();
        let count = self.elements.iter().filter(|e| e.segment_id == segment_id).count();
        let mut keys = allocator.spread(count);

        let mut moved = Vec::new();
        for element in self.elements.iter_mut().filter(|e| e.segment_id == segment_id) {
            let Some(key) = keys.next() else { break };
            if element.position != key {
                element.position = key;
                moved.push(element.component_id.clone());
            }
        }
        for component_id in moved {
            self.tracker.mark_modified(&component_id);
        }
    }

    /// The element at `index` is leaving its component
    fn release_component(&mut self, index: usize) {
        let element = &self.elements[index];
        if !element.is_persisted() {
            return;
        }
        let component_id = element.component_id.clone();
        let owns_component = element.element_type == ElementType::Dialogue;
        let shared = self
            .elements
            .iter()
            .enumerate()
            .any(|(i, e)| i != index && e.component_id == component_id);

        if shared && !owns_component {
            self.tracker.mark_modified(&component_id);
            return;
        }

        self.tracker.mark_deleted_component(&component_id);
        if shared {
            // Partners of a deleted dialogue become new components
            for i in 0..self.elements.len() {
                if i != index && self.elements[i].component_id == component_id {
                    self.elements[i].component_id = self.ids.temp_component_id();
                    self.elements[i].is_new = true;
                }
            }
        }
    }

    /// Lines sharing a persisted component id must still group into one
    /// speech block. When they no longer do, `keeper` (else the dialogue
    /// line, else the first line) keeps the id and the others become new
    /// components.
    fn split_broken_block(&mut self, component_id: &str, keeper: Option<&str>) {
        let members: Vec<usize> = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.component_id == component_id)
            .map(|(i, _)| i)
            .collect();
        if members.len() < 2 || !self.elements[members[0]].is_persisted() {
            return;
        }

        let segment_id = self.elements[members[0]].segment_id.clone();
        let intact = self
            .segments()
            .iter()
            .filter(|segment| segment.segment_id == segment_id)
            .flat_map(|segment| group_units(&segment.elements))
            .any(|unit| {
                unit.owner.component_id == component_id
                    && unit.lines().filter(|e| e.component_id == component_id).count() == members.len()
            });
        if intact {
            return;
        }

        let keeper = keeper
            .and_then(|local_id| self.index_of(local_id))
            .filter(|index| members.contains(index))
            .or_else(|| {
                members
                    .iter()
                    .copied()
                    .find(|&i| self.elements[i].element_type == ElementType::Dialogue)
            })
            .unwrap_or(members[0]);

        for &index in members.iter().filter(|&&i| i != keeper) {
            self.elements[index].component_id = self.ids.temp_component_id();
            self.elements[index].is_new = true;
        }
        self.tracker.mark_modified(component_id);
        debug!(component_id = %component_id, lines = members.len(), "Split speech block");
    }

    /// Lines moved into `segment_id` may land inside one of its speech blocks
    fn split_broken_blocks_in(&mut self, segment_id: &str) {
        let mut shared: BTreeMap<String, usize> = BTreeMap::new();
        for element in self.elements.iter().filter(|e| e.segment_id == segment_id && e.is_persisted()) {
            *shared.entry(element.component_id.clone()).or_default() += 1;
        }
        for (component_id, lines) in shared {
            if lines > 1 {
                self.split_broken_block(&component_id, None);
            }
        }
    }

    fn promote_to_heading(&mut self, index: usize) {
        self.release_component(index);
        let segment_id = self.ids.temp_segment_id();
        let segment_position = self.next_segment_position();
        let component_id = self.ids.temp_component_id();
        let base = self.config.position_base;

        let element = &mut self.elements[index];
        element.element_type = ElementType::SceneHeading;
        element.component_id = component_id;
        element.segment_id = segment_id;
        element.segment_position = segment_position;
        element.position = base;
        element.is_new = true;
    }

    fn demote_heading(&mut self, index: usize, new_type: ElementType) -> Result<(), EditorError> {
        let Some(heading) = self.preceding_heading(index) else {
            // First segment keeps its id and becomes a placeholder segment
            let element = &mut self.elements[index];
            element.element_type = new_type;
            let component_id = element.component_id.clone();
            self.tracker.mark_modified(&component_id);
            return Ok(());
        };

        let old_segment = self.elements[index].segment_id.clone();
        let old_segment_persisted = self.elements[index].segment_is_persisted();
        let target_segment = self.elements[heading].segment_id.clone();
        let target_position = self.elements[heading].segment_position;

        self.release_component(index);
        self.tracker.mark_deleted_segment(&old_segment);

        let component_id = self.ids.temp_component_id();
        let element = &mut self.elements[index];
        element.element_type = new_type;
        element.component_id = component_id;
        element.segment_id = target_segment.clone();
        element.segment_position = target_position;
        element.is_new = true;
        self.place(index)?;
        self.split_broken_blocks_in(&target_segment);

        self.rehome_orphans(&old_segment, old_segment_persisted)
    }

    /// Lines whose scene heading is gone join the preceding segment as new
    /// components. A persisted segment takes its components with it on the
    /// backend, so their ids are recorded as deleted.
    fn rehome_orphans(&mut self, segment_id: &str, segment_persisted: bool) -> Result<(), EditorError> {
        let orphans: Vec<usize> = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.segment_id == segment_id)
            .map(|(i, _)| i)
            .collect();
        if orphans.is_empty() {
            return Ok(());
        }

        let replacement = match self.preceding_heading(orphans[0]) {
            Some(heading) => Some((
                self.elements[heading].segment_id.clone(),
                self.elements[heading].segment_position,
            )),
            None if segment_persisted => None,
            // Temporary leaderless first segment: nothing to reconcile
            None => return Ok(()),
        };
        let fresh_segment = self.ids.temp_segment_id();

        for index in orphans {
            let old_component = self.elements[index].component_id.clone();
            if segment_persisted {
                self.tracker.mark_deleted_component(&old_component);
            }
            let component_id = if segment_persisted {
                self.ids.temp_component_id()
            } else {
                old_component
            };

            let element = &mut self.elements[index];
            element.component_id = component_id;
            element.is_new = true;
            match &replacement {
                Some((target, target_position)) => {
                    element.segment_id = target.clone();
                    element.segment_position = *target_position;
                    self.place(index)?;
                }
                // No heading before them: they stay together as a fresh
                // placeholder segment in the same place
                None => element.segment_id = fresh_segment.clone(),
            }
        }

        if let Some((target, _)) = &replacement {
            self.split_broken_blocks_in(target);
        }

        debug!(segment_id = %segment_id, "Re-homed lines of a dissolved segment");
        Ok(())
    }
}
