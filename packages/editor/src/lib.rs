//! # Screenplay Editor
//!
//! Script document reconciliation engine: keeps the ordered, segmented
//! element sequence of one open screenplay in step with the persistence
//! backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ backend page: segments + components         │
//! └─────────────────────────────────────────────┘
//!                     ↓ load_first_page / merge_page
//! ┌─────────────────────────────────────────────┐
//! │ document: elements grouped into segments    │
//! │  - Mutations with fractional positions      │
//! │  - Change tracking against the last sync    │
//! │  - Dirty evaluation (pure)                  │
//! └─────────────────────────────────────────────┘
//!                     ↓ build_save_plan
//! ┌─────────────────────────────────────────────┐
//! │ save request → backend → id mappings        │
//! └─────────────────────────────────────────────┘
//!                     ↓ apply_save_response
//!            temporary ids replaced, tracking reset
//! ```
//!
//! ## Core Principles
//!
//! 1. **Elements are the source of truth**: segments are derived groupings
//! 2. **Positions never renumber siblings**: inserts take a key between neighbours
//! 3. **Minimal payloads**: only new, modified and deleted components are sent
//! 4. **Edits never block on the network**: a save settles only what it sent
//!
//! ## Usage
//!
//! ```rust,ignore
//! use screenplay_editor::{EditorConfig, ElementType, ScriptDocument};
//!
//! let mut doc = ScriptDocument::new("script-42", EditorConfig::default());
//! doc.load_first_page(page);
//!
//! let heading = doc.elements()[0].local_id.clone();
//! let action = doc.insert_after(&heading, ElementType::Action)?;
//! doc.change_content(&action, "Rain hammers the roof.")?;
//!
//! let plan = doc.build_save_plan()?;
//! let response = backend.save_changes(&doc.script_id, &plan.request).await?;
//! doc.apply_save_response(&plan, &response)?;
//! assert!(!doc.has_unsaved_changes());
//! ```

mod config;
mod convert;
mod document;
mod element;
mod errors;
mod ids;
mod mutations;
mod pagination;
mod payload;
mod position;
mod reconcile;
mod tracking;
mod wire;

pub use config::{EditorConfig, DEFAULT_PAGE_SIZE};
pub use convert::{component_type_for, element_type_for, strip_markup, strip_parentheses};
pub use document::{ScriptDocument, SegmentView};
pub use element::{Element, ElementType};
pub use errors::EditorError;
pub use ids::{get_document_seed, is_temporary, IdGenerator, TEMP_PREFIX};
pub use mutations::{BackspaceOutcome, Mutation, MutationResult};
pub use pagination::{MergeOutcome, PageRequest, PaginationState};
pub use payload::{AbsorbedLine, PendingChange, SavePlan};
pub use position::{PositionAllocator, PositionError};
pub use reconcile::ReconcileOutcome;
pub use tracking::{ChangeTracker, DirtyReport};
pub use wire::{
    Component, ComponentChange, ComponentType, IdMappings, NewComponentForExistingSegment, NewComponentForSegment,
    NewSegment, SaveChangesRequest, SaveChangesResponse, Segment, SegmentsPage,
};
