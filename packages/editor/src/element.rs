use crate::ids::is_temporary;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of screenplay line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementType {
    SceneHeading,
    Action,
    Character,
    Dialogue,
    Parenthetical,
    Transition,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::SceneHeading => "scene-heading",
            ElementType::Action => "action",
            ElementType::Character => "character",
            ElementType::Dialogue => "dialogue",
            ElementType::Parenthetical => "parenthetical",
            ElementType::Transition => "transition",
        }
    }

    pub fn is_scene_heading(&self) -> bool {
        matches!(self, ElementType::SceneHeading)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single screenplay content unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Client-side identity (list keys, focus). Never sent, never changes.
    pub local_id: String,

    /// Backend identity, or a `temp-` id until the first successful save
    pub component_id: String,

    #[serde(rename = "type")]
    pub element_type: ElementType,

    /// Rich (HTML-ish) text
    pub content: String,

    pub segment_id: String,

    /// Order key among elements sharing `segment_id`
    pub position: f64,

    /// Order key among segments
    pub segment_position: f64,

    /// Never included in a successful save
    pub is_new: bool,
}

impl Element {
    /// Component id has been issued by the backend
    pub fn is_persisted(&self) -> bool {
        !is_temporary(&self.component_id)
    }

    /// Segment id has been issued by the backend
    pub fn segment_is_persisted(&self) -> bool {
        !is_temporary(&self.segment_id)
    }
}
