//! # Save Payload Builder
//!
//! Turns the current document into the minimal change-set the backend
//! accepts. Segments are walked by `segment_position` and their lines by
//! `position`; every line (or speech block) becomes one pending change or
//! nothing at all.
//!
//! ## Speech blocks
//!
//! ```text
//! character "BOB" ─┐
//! parenthetical    ├─→ DIALOGUE { id: <dialogue's component id>,
//! dialogue ────────┘              character_name, parenthetical, content }
//! ```
//!
//! The character and parenthetical lines are absorbed into the dialogue's
//! component. Their own component ids are not sent as changes; a persisted
//! id that no longer owns a component is sent for deletion instead.

use crate::convert::{component_type_for, strip_markup, strip_parentheses};
use crate::document::ScriptDocument;
use crate::element::{Element, ElementType};
use crate::errors::EditorError;
use crate::wire::{
    ComponentChange, NewComponentForExistingSegment, NewComponentForSegment, NewSegment, SaveChangesRequest,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Classification of one component for the next save
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange {
    /// Persisted component in a persisted segment
    Modified { segment_id: String, change: ComponentChange },

    /// New component in a persisted segment
    NewInSegment(NewComponentForExistingSegment),

    /// Component of a segment the backend has not seen yet
    NewSegment {
        segment_id: String,
        segment_number: f64,
        component: NewComponentForSegment,
    },
}

impl PendingChange {
    fn fold_into(self, request: &mut SaveChangesRequest) {
        match self {
            PendingChange::Modified { segment_id, change } => {
                request.changed_segments.entry(segment_id).or_default().push(change);
            }
            PendingChange::NewInSegment(component) => {
                request.new_components_in_existing_segments.push(component);
            }
            PendingChange::NewSegment {
                segment_id,
                segment_number,
                component,
            } => match request.new_segments.iter_mut().find(|s| s.frontend_id == segment_id) {
                Some(segment) => segment.components.push(component),
                None => request.new_segments.push(NewSegment {
                    frontend_id: segment_id,
                    segment_number,
                    components: vec![component],
                }),
            },
        }
    }
}

/// A line folded into another component's speech block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsorbedLine {
    pub local_id: String,
    /// Id the line carried when the plan was built
    pub component_id: String,
    /// Component the line was saved as part of
    pub owner_component_id: String,
}

/// A save request plus what reconciliation needs to settle it
#[derive(Debug, Clone, PartialEq)]
pub struct SavePlan {
    pub request: SaveChangesRequest,

    pub absorbed: Vec<AbsorbedLine>,

    /// Document revision the plan was built at
    pub revision: u64,

    pub(crate) sent_snapshot: Vec<Element>,
    pub(crate) sent_modified: BTreeSet<String>,
    pub(crate) sent_deleted_components: BTreeSet<String>,
    pub(crate) sent_deleted_segments: BTreeSet<String>,
}

impl SavePlan {
    pub fn is_empty(&self) -> bool {
        self.request.is_empty()
    }
}

/// Everything one walk over the document produces
struct Collected {
    changes: Vec<PendingChange>,
    absorbed: Vec<AbsorbedLine>,
    extra_deletions: BTreeSet<String>,
}

/// One backend component: a plain line or a speech block
pub(crate) struct Unit<'a> {
    pub(crate) owner: &'a Element,
    character: Option<&'a Element>,
    parenthetical: Option<&'a Element>,
}

impl<'a> Unit<'a> {
    fn absorbed(&self) -> impl Iterator<Item = &'a Element> {
        self.character.into_iter().chain(self.parenthetical)
    }

    /// Every line of the unit, owner last
    pub(crate) fn lines(&self) -> impl Iterator<Item = &'a Element> {
        self.absorbed().chain(std::iter::once(self.owner))
    }

    fn position(&self) -> f64 {
        self.character.or(self.parenthetical).unwrap_or(self.owner).position
    }

    fn character_name(&self) -> Option<String> {
        self.character
            .map(|e| strip_markup(&e.content))
            .filter(|name| !name.is_empty())
    }

    fn parenthetical_text(&self) -> Option<String> {
        self.parenthetical
            .map(|e| strip_parentheses(&strip_markup(&e.content)))
            .filter(|text| !text.is_empty())
    }

    fn new_component(&self) -> NewComponentForSegment {
        NewComponentForSegment {
            frontend_id: self.owner.component_id.clone(),
            component_type: component_type_for(self.owner.element_type),
            position: self.position(),
            content: strip_markup(&self.owner.content),
            character_name: self.character_name(),
            parenthetical: self.parenthetical_text(),
        }
    }

    fn change(&self) -> ComponentChange {
        ComponentChange {
            id: self.owner.component_id.clone(),
            component_type: component_type_for(self.owner.element_type),
            position: self.position(),
            content: strip_markup(&self.owner.content),
            character_name: self.character_name(),
            parenthetical: self.parenthetical_text(),
        }
    }
}

/// A line may join a dialogue's block when it already belongs to it, or
/// when either side has never been saved. Two persisted components the
/// backend keeps apart (a standalone CHARACTER row followed by a DIALOGUE
/// row) stay apart, so loading such a script does not produce a change-set.
fn joins(line: &Element, owner: &Element) -> bool {
    line.component_id == owner.component_id || !line.is_persisted() || !owner.is_persisted()
}

/// Split a segment's lines into components. `character [parenthetical]
/// dialogue` and `parenthetical dialogue` runs become speech blocks.
pub(crate) fn group_units<'a>(lines: &[&'a Element]) -> Vec<Unit<'a>> {
    use ElementType::{Character, Dialogue, Parenthetical};

    let mut units = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let kind = |offset: usize| lines.get(i + offset).map(|e| e.element_type);
        let joined = |offset: usize, owner: usize| joins(lines[i + offset], lines[i + owner]);
        let (unit, width) = match (kind(0), kind(1), kind(2)) {
            (Some(Character), Some(Parenthetical), Some(Dialogue)) if joined(0, 2) && joined(1, 2) => (
                Unit {
                    owner: lines[i + 2],
                    character: Some(lines[i]),
                    parenthetical: Some(lines[i + 1]),
                },
                3,
            ),
            (Some(Character), Some(Dialogue), _) if joined(0, 1) => (
                Unit {
                    owner: lines[i + 1],
                    character: Some(lines[i]),
                    parenthetical: None,
                },
                2,
            ),
            (Some(Parenthetical), Some(Dialogue), _) if joined(0, 1) => (
                Unit {
                    owner: lines[i + 1],
                    character: None,
                    parenthetical: Some(lines[i]),
                },
                2,
            ),
            _ => (
                Unit {
                    owner: lines[i],
                    character: None,
                    parenthetical: None,
                },
                1,
            ),
        };
        units.push(unit);
        i += width;
    }
    units
}

impl ScriptDocument {
    /// Classify every component of the document. Pure.
    pub fn pending_changes(&self) -> Result<Vec<PendingChange>, EditorError> {
        Ok(self.collect_changes()?.changes)
    }

    /// Build the next save request together with what reconciliation needs
    pub fn build_save_plan(&self) -> Result<SavePlan, EditorError> {
        let Collected {
            changes,
            absorbed,
            extra_deletions,
        } = self.collect_changes()?;

        let mut request = SaveChangesRequest::default();
        for change in changes {
            change.fold_into(&mut request);
        }

        let mut deleted: BTreeSet<String> = self.tracker.deleted_component_ids().clone();
        deleted.extend(extra_deletions);
        request.deleted_elements = deleted.into_iter().collect();
        request.deleted_segments = self.tracker.deleted_segment_ids().iter().cloned().collect();

        info!(
            changed = request.changed_segments.values().map(Vec::len).sum::<usize>(),
            new_segments = request.new_segments.len(),
            new_components = request.new_components_in_existing_segments.len(),
            deleted_elements = request.deleted_elements.len(),
            deleted_segments = request.deleted_segments.len(),
            "Built save plan"
        );

        Ok(SavePlan {
            request,
            absorbed,
            revision: self.revision,
            sent_snapshot: self.elements.clone(),
            sent_modified: self.tracker.modified_component_ids().clone(),
            sent_deleted_components: self.tracker.deleted_component_ids().clone(),
            sent_deleted_segments: self.tracker.deleted_segment_ids().clone(),
        })
    }

    pub fn build_save_request(&self) -> Result<SaveChangesRequest, EditorError> {
        Ok(self.build_save_plan()?.request)
    }

    fn collect_changes(&self) -> Result<Collected, EditorError> {
        if !self.loaded {
            return Err(EditorError::NotLoaded);
        }

        let modified = self.tracker.modified_component_ids();
        let mut changes = Vec::new();
        let mut absorbed = Vec::new();
        let mut owners: BTreeSet<&str> = BTreeSet::new();
        let mut emitted: BTreeSet<&str> = BTreeSet::new();
        let mut absorbed_persisted: BTreeSet<&str> = BTreeSet::new();

        for segment in self.segments() {
            // An untouched placeholder segment has nothing to say yet
            if !segment.elements[0].segment_is_persisted() && !segment.elements.iter().any(|e| e.is_new) {
                debug!(segment_id = %segment.segment_id, "Skipping untouched placeholder segment");
                continue;
            }

            for unit in group_units(&segment.elements) {
                let owner_id = unit.owner.component_id.as_str();
                owners.insert(owner_id);

                let mut membership_changed = false;
                for line in unit.absorbed() {
                    if line.component_id != owner_id {
                        membership_changed = true;
                        if line.is_persisted() {
                            absorbed_persisted.insert(line.component_id.as_str());
                        }
                    }
                    absorbed.push(AbsorbedLine {
                        local_id: line.local_id.clone(),
                        component_id: line.component_id.clone(),
                        owner_component_id: owner_id.to_string(),
                    });
                }

                let change = if !unit.owner.segment_is_persisted() {
                    PendingChange::NewSegment {
                        segment_id: segment.segment_id.to_string(),
                        segment_number: segment.segment_position,
                        component: unit.new_component(),
                    }
                } else if !unit.owner.is_persisted() {
                    PendingChange::NewInSegment(NewComponentForExistingSegment {
                        component: unit.new_component(),
                        segment_id: segment.segment_id.to_string(),
                    })
                } else if modified.contains(owner_id) || membership_changed {
                    let first = emitted.insert(owner_id);
                    debug_assert!(first, "component {} emitted twice", owner_id);
                    if !first {
                        warn!(component_id = %owner_id, "Component split across units, sending it once");
                        continue;
                    }
                    PendingChange::Modified {
                        segment_id: segment.segment_id.to_string(),
                        change: unit.change(),
                    }
                } else {
                    continue;
                };
                changes.push(change);
            }
        }

        // A persisted id folded into another block and owning nothing anymore
        let extra_deletions = absorbed_persisted
            .into_iter()
            .filter(|id| !owners.contains(id))
            .map(str::to_string)
            .collect();

        Ok(Collected {
            changes,
            absorbed,
            extra_deletions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::ids::is_temporary;
    use crate::wire::{Component, ComponentType, Segment, SegmentsPage};

    fn component(id: &str, component_type: ComponentType, position: f64, content: &str) -> Component {
        Component {
            id: id.to_string(),
            component_type,
            position,
            content: content.to_string(),
            character_name: None,
            parenthetical: None,
        }
    }

    fn empty_doc() -> ScriptDocument {
        let mut doc = ScriptDocument::new("script-1", EditorConfig::default());
        doc.load_first_page(SegmentsPage::default());
        doc
    }

    fn loaded_doc() -> ScriptDocument {
        let mut speech = component("c-3", ComponentType::Dialogue, 3000.0, "Hello.");
        speech.character_name = Some("ANA".to_string());

        let mut doc = ScriptDocument::new("script-1", EditorConfig::default());
        doc.load_first_page(SegmentsPage {
            segments: vec![Segment {
                id: "seg-1".to_string(),
                position: Some(1000.0),
                created_at: String::new(),
                components: vec![
                    component("c-1", ComponentType::Heading, 1000.0, "INT. HOUSE - DAY"),
                    component("c-2", ComponentType::Action, 2000.0, "Rain."),
                    speech,
                ],
            }],
            total: 1,
        });
        doc
    }

    fn local_id_of(doc: &ScriptDocument, element_type: ElementType) -> String {
        doc.elements()
            .iter()
            .find(|e| e.element_type == element_type)
            .unwrap()
            .local_id
            .clone()
    }

    #[test]
    fn test_not_loaded_is_an_error() {
        let doc = ScriptDocument::new("script-1", EditorConfig::default());
        assert_eq!(doc.build_save_plan().unwrap_err(), EditorError::NotLoaded);
    }

    #[test]
    fn test_clean_documents_build_empty_plans() {
        assert!(empty_doc().build_save_plan().unwrap().is_empty());
        assert!(loaded_doc().build_save_plan().unwrap().is_empty());
    }

    #[test]
    fn test_new_speech_block_becomes_one_dialogue() {
        let mut doc = empty_doc();
        let heading = doc.elements()[0].local_id.clone();
        let character = doc.insert_after(&heading, ElementType::Character).unwrap();
        doc.change_content(&character, "BOB").unwrap();
        let paren = doc.insert_after(&character, ElementType::Parenthetical).unwrap();
        doc.change_content(&paren, "(angry)").unwrap();
        let dialogue = doc.insert_after(&paren, ElementType::Dialogue).unwrap();
        doc.change_content(&dialogue, "<p>Get out!</p>").unwrap();

        let plan = doc.build_save_plan().unwrap();
        assert_eq!(plan.request.new_segments.len(), 1);
        let segment = &plan.request.new_segments[0];
        assert_eq!(segment.segment_number, 1000.0);
        assert_eq!(segment.components.len(), 2);

        let speech = &segment.components[1];
        assert_eq!(speech.component_type, ComponentType::Dialogue);
        assert_eq!(speech.content, "Get out!");
        assert_eq!(speech.character_name.as_deref(), Some("BOB"));
        assert_eq!(speech.parenthetical.as_deref(), Some("angry"));
        assert_eq!(speech.frontend_id, doc.element(&dialogue).unwrap().component_id);
        assert_eq!(speech.position, doc.element(&character).unwrap().position);

        assert_eq!(plan.absorbed.len(), 2);
        assert!(plan.absorbed.iter().all(|a| a.owner_component_id == speech.frontend_id));
    }

    #[test]
    fn test_modified_speech_block_keeps_its_side_data() {
        let mut doc = loaded_doc();
        let dialogue = local_id_of(&doc, ElementType::Dialogue);
        doc.change_content(&dialogue, "Goodbye.").unwrap();

        let request = doc.build_save_request().unwrap();
        let changes = &request.changed_segments["seg-1"];
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, "c-3");
        assert_eq!(changes[0].content, "Goodbye.");
        assert_eq!(changes[0].character_name.as_deref(), Some("ANA"));
        assert_eq!(changes[0].position, 3000.0);
        assert!(request.new_segments.is_empty());
    }

    #[test]
    fn test_removed_character_line_modifies_the_block() {
        let mut doc = loaded_doc();
        let character = local_id_of(&doc, ElementType::Character);
        doc.delete_element(&character).unwrap();

        let request = doc.build_save_request().unwrap();
        let change = &request.changed_segments["seg-1"][0];
        assert_eq!(change.id, "c-3");
        assert_eq!(change.character_name, None);
        assert!(request.deleted_elements.is_empty());
    }

    #[test]
    fn test_new_line_in_persisted_segment() {
        let mut doc = loaded_doc();
        let action = local_id_of(&doc, ElementType::Action);
        let inserted = doc.insert_after(&action, ElementType::Action).unwrap();
        doc.change_content(&inserted, "Thunder.").unwrap();

        let request = doc.build_save_request().unwrap();
        assert_eq!(request.new_components_in_existing_segments.len(), 1);
        let entry = &request.new_components_in_existing_segments[0];
        assert_eq!(entry.segment_id, "seg-1");
        assert_eq!(entry.component.content, "Thunder.");
        assert_eq!(entry.component.position, 2500.0);
        assert!(request.changed_segments.is_empty());
    }

    #[test]
    fn test_deletions_are_listed() {
        let mut doc = loaded_doc();
        let heading = local_id_of(&doc, ElementType::SceneHeading);
        doc.delete_element(&heading).unwrap();

        let request = doc.build_save_request().unwrap();
        assert_eq!(request.deleted_segments, vec!["seg-1".to_string()]);
        assert!(request.deleted_elements.contains(&"c-1".to_string()));
    }

    #[test]
    fn test_new_character_line_joins_persisted_dialogue() {
        let mut doc = loaded_doc();
        let character = local_id_of(&doc, ElementType::Character);
        let paren = doc.insert_after(&character, ElementType::Parenthetical).unwrap();
        doc.change_content(&paren, "(whispering)").unwrap();

        let plan = doc.build_save_plan().unwrap();
        let change = &plan.request.changed_segments["seg-1"][0];
        assert_eq!(change.id, "c-3");
        assert_eq!(change.parenthetical.as_deref(), Some("whispering"));
        assert!(plan.request.new_components_in_existing_segments.is_empty());
        assert!(plan.absorbed.iter().any(|a| a.local_id == paren));
    }

    #[test]
    fn test_absorbed_persisted_character_is_deleted() {
        let mut doc = ScriptDocument::new("script-1", EditorConfig::default());
        doc.load_first_page(SegmentsPage {
            segments: vec![Segment {
                id: "seg-1".to_string(),
                position: Some(1000.0),
                created_at: String::new(),
                components: vec![
                    component("c-1", ComponentType::Heading, 1000.0, "INT. HOUSE - DAY"),
                    component("c-7", ComponentType::Character, 2000.0, "BOB"),
                ],
            }],
            total: 1,
        });
        let character = local_id_of(&doc, ElementType::Character);
        let dialogue = doc.insert_after(&character, ElementType::Dialogue).unwrap();
        doc.change_content(&dialogue, "Hi.").unwrap();

        let request = doc.build_save_request().unwrap();
        assert_eq!(request.deleted_elements, vec!["c-7".to_string()]);
        let entry = &request.new_components_in_existing_segments[0];
        assert_eq!(entry.component.character_name.as_deref(), Some("BOB"));
        assert_eq!(entry.component.position, 2000.0);
    }

    #[test]
    fn test_orphan_character_is_standalone() {
        let mut doc = empty_doc();
        let heading = doc.elements()[0].local_id.clone();
        let character = doc.insert_after(&heading, ElementType::Character).unwrap();
        doc.change_content(&character, "BOB").unwrap();
        doc.insert_after(&character, ElementType::Action).unwrap();

        let changes = doc.pending_changes().unwrap();
        let types: Vec<ComponentType> = changes
            .iter()
            .map(|c| match c {
                PendingChange::NewSegment { component, .. } => component.component_type,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            types,
            vec![ComponentType::Heading, ComponentType::Character, ComponentType::Action]
        );
    }

    fn component_ids(request: &SaveChangesRequest) -> Vec<String> {
        let mut ids: Vec<String> = request
            .changed_segments
            .values()
            .flatten()
            .map(|c| c.id.clone())
            .collect();
        ids.extend(
            request
                .new_components_in_existing_segments
                .iter()
                .map(|e| e.component.frontend_id.clone()),
        );
        ids
    }

    fn assert_unique(ids: &[String]) {
        let unique: BTreeSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len(), "duplicate ids in {:?}", ids);
    }

    #[test]
    fn test_retyped_dialogue_splits_the_block() {
        let mut doc = loaded_doc();
        let dialogue = local_id_of(&doc, ElementType::Dialogue);
        let character = local_id_of(&doc, ElementType::Character);
        doc.change_type(&dialogue, ElementType::Action).unwrap();

        assert_eq!(doc.element(&dialogue).unwrap().component_id, "c-3");
        assert!(is_temporary(&doc.element(&character).unwrap().component_id));

        let request = doc.build_save_request().unwrap();
        let changes = &request.changed_segments["seg-1"];
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, "c-3");
        assert_eq!(changes[0].component_type, ComponentType::Action);
        assert_eq!(changes[0].content, "Hello.");
        assert_eq!(changes[0].character_name, None);

        assert_eq!(request.new_components_in_existing_segments.len(), 1);
        let entry = &request.new_components_in_existing_segments[0].component;
        assert_eq!(entry.component_type, ComponentType::Character);
        assert_eq!(entry.content, "ANA");
        assert!(request.deleted_elements.is_empty());
        assert_unique(&component_ids(&request));
    }

    #[test]
    fn test_retyped_character_leaves_the_dialogue_bare() {
        let mut doc = loaded_doc();
        let character = local_id_of(&doc, ElementType::Character);
        doc.change_type(&character, ElementType::Action).unwrap();

        let request = doc.build_save_request().unwrap();
        let changes = &request.changed_segments["seg-1"];
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, "c-3");
        assert_eq!(changes[0].component_type, ComponentType::Dialogue);
        assert_eq!(changes[0].character_name, None);

        let entry = &request.new_components_in_existing_segments[0].component;
        assert_eq!(entry.component_type, ComponentType::Action);
        assert_eq!(entry.content, "ANA");
        assert_unique(&component_ids(&request));
    }

    #[test]
    fn test_character_retyped_as_dialogue_leaves_the_id_in_place() {
        let mut doc = loaded_doc();
        let dialogue = local_id_of(&doc, ElementType::Dialogue);
        let character = local_id_of(&doc, ElementType::Character);
        doc.change_type(&character, ElementType::Dialogue).unwrap();

        assert_eq!(doc.element(&dialogue).unwrap().component_id, "c-3");
        let request = doc.build_save_request().unwrap();
        let changes = &request.changed_segments["seg-1"];
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].content, "Hello.");
        assert_eq!(request.new_components_in_existing_segments[0].component.content, "ANA");
        assert_unique(&component_ids(&request));
    }

    #[test]
    fn test_line_inserted_inside_a_block_splits_it() {
        let mut doc = loaded_doc();
        let character = local_id_of(&doc, ElementType::Character);
        let inserted = doc.insert_after(&character, ElementType::Action).unwrap();
        doc.change_content(&inserted, "A door slams.").unwrap();

        let request = doc.build_save_request().unwrap();
        let changes = &request.changed_segments["seg-1"];
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, "c-3");
        assert_eq!(changes[0].character_name, None);

        let mut added: Vec<ComponentType> = request
            .new_components_in_existing_segments
            .iter()
            .map(|e| e.component.component_type)
            .collect();
        added.sort_by_key(|t| format!("{:?}", t));
        assert_eq!(added, vec![ComponentType::Action, ComponentType::Character]);
        assert_unique(&component_ids(&request));
    }

    #[test]
    fn test_lines_rehomed_into_a_block_split_it() {
        let mut doc = loaded_doc();
        let character = local_id_of(&doc, ElementType::Character);
        let scene = doc.insert_after(&character, ElementType::SceneHeading).unwrap();
        let action = doc.insert_after(&scene, ElementType::Action).unwrap();
        doc.change_content(&action, "A door slams.").unwrap();
        assert!(doc.build_save_plan().unwrap().request.changed_segments.is_empty());

        doc.delete_element(&scene).unwrap();
        assert_eq!(doc.element(&action).unwrap().segment_id, "seg-1");

        let request = doc.build_save_request().unwrap();
        let changes = &request.changed_segments["seg-1"];
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, "c-3");
        assert_eq!(changes[0].character_name, None);
        assert_eq!(request.new_components_in_existing_segments.len(), 2);
        assert_unique(&component_ids(&request));
    }

    #[test]
    fn test_separately_saved_character_and_dialogue_stay_apart() {
        let mut doc = ScriptDocument::new("script-1", EditorConfig::default());
        doc.load_first_page(SegmentsPage {
            segments: vec![Segment {
                id: "seg-1".to_string(),
                position: Some(1000.0),
                created_at: String::new(),
                components: vec![
                    component("c-1", ComponentType::Heading, 1000.0, "INT. HOUSE - DAY"),
                    component("c-5", ComponentType::Character, 2000.0, "BOB"),
                    component("c-6", ComponentType::Dialogue, 3000.0, "Hi."),
                ],
            }],
            total: 1,
        });

        assert!(doc.build_save_plan().unwrap().is_empty());
        assert!(!doc.has_unsaved_changes());

        let dialogue = local_id_of(&doc, ElementType::Dialogue);
        doc.change_content(&dialogue, "Hello.").unwrap();
        let request = doc.build_save_request().unwrap();
        let changes = &request.changed_segments["seg-1"];
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, "c-6");
        assert!(request.deleted_elements.is_empty());
    }

    #[test]
    fn test_plan_is_pure() {
        let mut doc = loaded_doc();
        let dialogue = local_id_of(&doc, ElementType::Dialogue);
        doc.change_content(&dialogue, "Goodbye.").unwrap();

        let first = doc.build_save_plan().unwrap();
        let second = doc.build_save_plan().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.revision, doc.revision());
    }
}
