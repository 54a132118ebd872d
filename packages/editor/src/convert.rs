//! Conversion between backend components and editor elements.
//!
//! A DIALOGUE component carries its speaker and parenthetical as side data.
//! In the editor those are separate lines, so one component expands into up
//! to three elements sharing the component's id:
//!
//! ```text
//! DIALOGUE { character_name: "BOB", parenthetical: "angry", content: "Get out!" }
//!     → character "BOB"        position p
//!     → parenthetical "(angry)" position p + SPEECH_STEP
//!     → dialogue "Get out!"    position p + 2 * SPEECH_STEP
//! ```

use crate::element::{Element, ElementType};
use crate::ids::IdGenerator;
use crate::wire::{Component, ComponentType};
use regex::Regex;
use std::sync::OnceLock;

/// Offset between the lines of an expanded speech block
pub const SPEECH_STEP: f64 = 0.01;

fn break_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid break pattern"))
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"))
}

/// Plain text of a rich-text fragment: tags removed, common entities decoded
pub fn strip_markup(html: &str) -> String {
    let with_breaks = break_pattern().replace_all(html, "\n");
    let text = tag_pattern().replace_all(&with_breaks, "");

    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

/// Parenthetical text without its surrounding parentheses
pub fn strip_parentheses(text: &str) -> String {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('(').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(')').unwrap_or(trimmed);
    trimmed.trim().to_string()
}

pub fn element_type_for(component_type: ComponentType) -> ElementType {
    match component_type {
        ComponentType::Heading => ElementType::SceneHeading,
        ComponentType::Action => ElementType::Action,
        ComponentType::Dialogue => ElementType::Dialogue,
        ComponentType::Character => ElementType::Character,
        ComponentType::Transition => ElementType::Transition,
        ComponentType::Parenthetical => ElementType::Parenthetical,
    }
}

pub fn component_type_for(element_type: ElementType) -> ComponentType {
    match element_type {
        ElementType::SceneHeading => ComponentType::Heading,
        ElementType::Action => ComponentType::Action,
        ElementType::Dialogue => ComponentType::Dialogue,
        ElementType::Character => ComponentType::Character,
        ElementType::Transition => ComponentType::Transition,
        ElementType::Parenthetical => ComponentType::Parenthetical,
    }
}

/// Where the expanded elements go and which ids they carry
pub struct ExpandTarget<'a> {
    pub segment_id: &'a str,
    pub segment_position: f64,
    /// Keep backend ids; otherwise mint temporary ones and flag the elements new
    pub persisted: bool,
}

/// Expand one backend component into editor elements
pub fn expand_component(component: &Component, target: &ExpandTarget<'_>, ids: &mut IdGenerator) -> Vec<Element> {
    let component_id = if target.persisted {
        component.id.clone()
    } else {
        ids.temp_component_id()
    };

    let mut lines: Vec<(ElementType, String)> = Vec::with_capacity(3);
    if component.component_type == ComponentType::Dialogue {
        if let Some(name) = component.character_name.as_deref().filter(|n| !n.trim().is_empty()) {
            lines.push((ElementType::Character, name.to_string()));
        }
        if let Some(paren) = component.parenthetical.as_deref().filter(|p| !p.trim().is_empty()) {
            lines.push((ElementType::Parenthetical, format!("({})", strip_parentheses(paren))));
        }
    }
    lines.push((element_type_for(component.component_type), component.content.clone()));

    lines
        .into_iter()
        .enumerate()
        .map(|(i, (element_type, content))| Element {
            local_id: ids.local_id(),
            component_id: component_id.clone(),
            element_type,
            content,
            segment_id: target.segment_id.to_string(),
            position: component.position + SPEECH_STEP * i as f64,
            segment_position: target.segment_position,
            is_new: !target.persisted,
        })
        .collect()
}
