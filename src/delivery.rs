//! Generation-stamped delivery of completed results.
//!
//! Every request takes the next generation number before it starts. When
//! it finishes, its bitmap is delivered only if no newer generation has
//! been delivered already, so a slow early request can never overwrite
//! the output of a later one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::image_bridge::Bitmap;

/// Monotonic request counter. The first generation handed out is 1.
#[derive(Debug, Default)]
pub struct GenerationCounter {
    last: AtomicU64,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn last_issued(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct Delivered {
    pub generation: u64,
    pub bitmap: Arc<Bitmap>,
}

/// The currently displayed result.
#[derive(Debug, Default)]
pub struct LatestResult {
    slot: Mutex<Option<Delivered>>,
}

impl LatestResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bitmap` unless something at least as new is already shown.
    /// Returns whether it was accepted.
    pub fn deliver(&self, generation: u64, bitmap: Bitmap) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = slot.as_ref() {
            if generation <= current.generation {
                tracing::warn!(
                    generation,
                    delivered = current.generation,
                    "dropping stale result"
                );
                return false;
            }
        }
        *slot = Some(Delivered {
            generation,
            bitmap: Arc::new(bitmap),
        });
        true
    }

    pub fn latest(&self) -> Option<Delivered> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn generation(&self) -> u64 {
        self.latest().map_or(0, |delivered| delivered.generation)
    }
}
