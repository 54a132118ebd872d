use crate::position::{PositionAllocator, DEFAULT_BASE, DEFAULT_INCREMENT, DEFAULT_MIN_STEP};
use serde::{Deserialize, Serialize};

/// Default number of segments requested per page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Tunables for a single open script document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Key given to the first element of a segment (and the first segment)
    #[serde(default = "default_base")]
    pub position_base: f64,

    /// Gap left after the last element of a segment on append
    #[serde(default = "default_increment")]
    pub component_increment: f64,

    /// Gap left after the last segment when a scene heading is created
    #[serde(default = "default_increment")]
    pub segment_increment: f64,

    /// Smallest gap the allocator will split before reporting exhaustion
    #[serde(default = "default_min_step")]
    pub min_step: f64,

    /// Segments requested per page fetch
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_base() -> f64 {
    DEFAULT_BASE
}

fn default_increment() -> f64 {
    DEFAULT_INCREMENT
}

fn default_min_step() -> f64 {
    DEFAULT_MIN_STEP
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl EditorConfig {
    pub fn component_allocator(&self) -> PositionAllocator {
        PositionAllocator::new(self.position_base, self.component_increment, self.min_step)
    }

    pub fn segment_allocator(&self) -> PositionAllocator {
        PositionAllocator::new(self.position_base, self.segment_increment, self.min_step)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            position_base: default_base(),
            component_increment: default_increment(),
            segment_increment: default_increment(),
            min_step: default_min_step(),
            page_size: default_page_size(),
        }
    }
}
