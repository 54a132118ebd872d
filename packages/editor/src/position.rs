//! # Position Allocator
//!
//! Ordering keys for segments and components are sparse floats, not array
//! indices. Inserting between two items takes the midpoint of their keys, so
//! no sibling is ever renumbered on insert.
//!
//! ```text
//! prev=1000            next=2000
//!    │    insert → 1500    │
//!    │    insert → 1250    │
//!    │    ...              │
//! ```
//!
//! Each split halves the gap. Once the gap falls below `min_step` the
//! allocator reports [`PositionError::Exhausted`] instead of handing out a
//! duplicate or out-of-order key. The document reacts by rebalancing the
//! affected segment.

use thiserror::Error;

pub const DEFAULT_BASE: f64 = 1000.0;
pub const DEFAULT_INCREMENT: f64 = 1000.0;
pub const DEFAULT_MIN_STEP: f64 = 1e-3;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PositionError {
    #[error("No ordering key left between {prev} and {next}")]
    Exhausted { prev: f64, next: f64 },
}

/// Computes fractional ordering keys
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionAllocator {
    /// Key for the first item of an empty sequence
    pub base: f64,

    /// Gap left after the current last item on append
    pub increment: f64,

    /// Smallest gap that may still be split
    pub min_step: f64,
}

impl PositionAllocator {
    pub fn new(base: f64, increment: f64, min_step: f64) -> Self {
        Self {
            base,
            increment,
            min_step,
        }
    }

    /// Key sorting strictly between `prev` and `next`.
    ///
    /// A missing neighbour means "open-ended" on that side.
    pub fn allocate_between(&self, prev: Option<f64>, next: Option<f64>) -> Result<f64, PositionError> {
        match (prev, next) {
            (Some(prev), Some(next)) => self.split(prev, next),
            (Some(prev), None) => Ok(prev + self.increment),
            (None, Some(next)) => Ok(next - self.increment),
            (None, None) => Ok(self.base),
        }
    }

    /// Key after the current tail (or the base key when there is none)
    pub fn after(&self, prev: Option<f64>) -> f64 {
        prev.map_or(self.base, |prev| prev + self.increment)
    }

    /// Evenly spaced keys used when a sequence has to be renumbered
    pub fn spread(&self, count: usize) -> impl Iterator<Item = f64> + '_ {
        (0..count).map(move |i| self.base + self.increment * i as f64)
    }

    fn split(&self, prev: f64, next: f64) -> Result<f64, PositionError> {
        if !(prev < next) {
            return Err(PositionError::Exhausted { prev, next });
        }

        let mid = prev + (next - prev) / 2.0;
        if mid > prev && mid < next && mid - prev >= self.min_step {
            return Ok(mid);
        }

        let stepped = prev + self.min_step;
        if stepped > prev && stepped < next {
            return Ok(stepped);
        }

        Err(PositionError::Exhausted { prev, next })
    }
}

impl Default for PositionAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_INCREMENT, DEFAULT_MIN_STEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_item_gets_base() {
        let alloc = PositionAllocator::default();
        assert_eq!(alloc.allocate_between(None, None).unwrap(), 1000.0);
    }

    #[test]
    fn test_append_uses_increment() {
        let alloc = PositionAllocator::default();
        assert_eq!(alloc.allocate_between(Some(1000.0), None).unwrap(), 2000.0);
        assert_eq!(alloc.after(Some(2000.0)), 3000.0);
        assert_eq!(alloc.after(None), 1000.0);
    }

    #[test]
    fn test_midpoint_between_neighbours() {
        let alloc = PositionAllocator::default();
        assert_eq!(alloc.allocate_between(Some(1000.0), Some(2000.0)).unwrap(), 1500.0);
        assert_eq!(alloc.allocate_between(Some(1000.0), Some(1500.0)).unwrap(), 1250.0);
    }

    #[test]
    fn test_before_first_item() {
        let alloc = PositionAllocator::default();
        assert_eq!(alloc.allocate_between(None, Some(1000.0)).unwrap(), 0.0);
    }

    #[test]
    fn test_narrow_gap_falls_back_to_min_step() {
        let alloc = PositionAllocator::default();
        // Midpoint would be 0.0007 away from prev, below min_step
        let key = alloc.allocate_between(Some(1.0), Some(1.0014)).unwrap();
        assert!((key - 1.001).abs() < 1e-12);
        assert!(key < 1.0014);
    }

    #[test]
    fn test_exhausted_gap_is_reported() {
        let alloc = PositionAllocator::default();
        let err = alloc.allocate_between(Some(1.0), Some(1.0005)).unwrap_err();
        assert_eq!(err, PositionError::Exhausted { prev: 1.0, next: 1.0005 });

        // Equal or inverted neighbours have no valid key either
        assert!(alloc.allocate_between(Some(5.0), Some(5.0)).is_err());
        assert!(alloc.allocate_between(Some(6.0), Some(5.0)).is_err());
    }

    #[test]
    fn test_repeated_splits_stay_ordered_until_exhausted() {
        let alloc = PositionAllocator::default();
        let prev = 1000.0;
        let mut next = 2000.0;
        let mut issued = 0;

        while let Ok(key) = alloc.allocate_between(Some(prev), Some(next)) {
            assert!(key > prev && key < next);
            next = key;
            issued += 1;
            assert!(issued < 100, "allocator never exhausted");
        }

        // 1000 halves about twenty times before dropping under 1e-3
        assert!(issued >= 19);
    }

    #[test]
    fn test_spread_is_evenly_spaced() {
        let alloc = PositionAllocator::default();
        let keys: Vec<f64> = alloc.spread(3).collect();
        assert_eq!(keys, vec![1000.0, 2000.0, 3000.0]);
    }
}
