//! An atomic `Option<u32>` used to hand a small index (such as a selected collection) to the audio thread.
//!
//! `None` is stored as 0 and `Some(x)` as `x + 1`, so the whole value fits in one `AtomicU32` and loads are a single
//! instruction.  This means `u32::MAX` cannot be stored.
use crate::sync::{AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct AtomicSlotIndex {
    inner: AtomicU32,
}

/// Error returned when attempting to store `u32::MAX`, which has no encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("u32::MAX cannot be stored in an AtomicSlotIndex")]
pub struct SlotIndexOverflow;

fn encode(index: Option<u32>) -> Result<u32, SlotIndexOverflow> {
    match index {
        Some(x) => x.checked_add(1).ok_or(SlotIndexOverflow),
        None => Ok(0),
    }
}

fn decode(raw: u32) -> Option<u32> {
    raw.checked_sub(1)
}

impl AtomicSlotIndex {
    pub fn new(index: Option<u32>) -> Result<Self, SlotIndexOverflow> {
        Ok(Self {
            inner: AtomicU32::new(encode(index)?),
        })
    }

    #[inline(always)]
    pub fn load(&self, ordering: Ordering) -> Option<u32> {
        decode(self.inner.load(ordering))
    }

    pub fn store(&self, index: Option<u32>, ordering: Ordering) -> Result<(), SlotIndexOverflow> {
        self.inner.store(encode(index)?, ordering);
        Ok(())
    }

    /// Store a new index, returning the one it replaced.
    pub fn swap(&self, index: Option<u32>, ordering: Ordering) -> Result<Option<u32>, SlotIndexOverflow> {
        Ok(decode(self.inner.swap(encode(index)?, ordering)))
    }
}
