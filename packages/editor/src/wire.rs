//! # Backend wire format
//!
//! Shapes exchanged with the persistence backend. Field names are part of
//! the contract: component records use snake_case, the request envelope and
//! id mappings use camelCase.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentType {
    Heading,
    Action,
    Dialogue,
    Character,
    Transition,
    /// Only produced for a parenthetical that is not part of a speech block
    Parenthetical,
}

/// Persisted component as returned by a segment fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub component_type: ComponentType,
    pub position: f64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub character_name: Option<String>,
    #[serde(default)]
    pub parenthetical: Option<String>,
}

/// Persisted segment as returned by a segment fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub components: Vec<Component>,
}

/// One page of a segment fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentsPage {
    pub segments: Vec<Segment>,
    pub total: usize,
}

/// Update of a component that already exists on the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentChange {
    pub id: String,
    pub component_type: ComponentType,
    pub position: f64,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parenthetical: Option<String>,
}

/// Component created by this save, tagged with the id the client knows it by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComponentForSegment {
    #[serde(rename = "frontendId")]
    pub frontend_id: String,
    pub component_type: ComponentType,
    pub position: f64,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parenthetical: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSegment {
    pub frontend_id: String,
    pub segment_number: f64,
    pub components: Vec<NewComponentForSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComponentForExistingSegment {
    #[serde(flatten)]
    pub component: NewComponentForSegment,
    pub segment_id: String,
}

/// Body of a save call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChangesRequest {
    pub changed_segments: BTreeMap<String, Vec<ComponentChange>>,
    pub deleted_elements: Vec<String>,
    pub deleted_segments: Vec<String>,
    pub new_segments: Vec<NewSegment>,
    pub new_components_in_existing_segments: Vec<NewComponentForExistingSegment>,
}

impl SaveChangesRequest {
    pub fn is_empty(&self) -> bool {
        self.changed_segments.is_empty()
            && self.deleted_elements.is_empty()
            && self.deleted_segments.is_empty()
            && self.new_segments.is_empty()
            && self.new_components_in_existing_segments.is_empty()
    }
}

/// `frontendId → real id` for everything a save created
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdMappings {
    #[serde(default)]
    pub segments: BTreeMap<String, String>,
    #[serde(default)]
    pub components: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChangesResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub id_mappings: IdMappings,
}
