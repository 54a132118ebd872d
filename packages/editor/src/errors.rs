//! Error types for the editor

use crate::position::PositionError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Position allocation failed: {0}")]
    Position(#[from] PositionError),

    #[error("Save rejected by backend: {0}")]
    SaveRejected(String),

    #[error("Document has not finished loading")]
    NotLoaded,
}
