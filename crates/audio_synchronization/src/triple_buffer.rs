//! A wait-free triple buffer for publishing small `Copy` snapshots from one thread to another.
//!
//! This is the primitive for "the latest value wins" state such as a listener direction: the control thread writes
//! whenever it likes, and the audio thread reads once per block.  Neither side ever waits for the other, and the reader
//! never observes a torn value.
//!
//! There are three slots.  At any time the writer owns one (the back slot), the reader owns one (the front slot), and
//! the third sits in the middle.  The middle's index lives in a single atomic byte along with a bit saying whether it
//! holds something the reader has not yet seen.  Publishing swaps the back slot into the middle; reading swaps the
//! middle into the front, but only if there is something new.
//!
//! Both halves require `&mut self`, and neither is `Clone`, so there is exactly one writer and one reader.
use crossbeam::utils::CachePadded;

use crate::sync::{Arc, AtomicU8, Ordering, UnsafeCell};

const INDEX_MASK: u8 = 0b011;
const FRESH_BIT: u8 = 0b100;

struct Shared<T> {
    slots: [CachePadded<UnsafeCell<T>>; 3],

    /// Index of the middle slot, ored with [FRESH_BIT] if the reader has not yet taken it.
    middle: CachePadded<AtomicU8>,
}

// Safety: a slot is only ever accessed by the half which currently owns its index, and ownership moves through the
// AcqRel swap on `middle`, which orders the slot's contents along with it.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

/// The writing half of a triple buffer.
pub struct TripleBufferWriter<T> {
    shared: Arc<Shared<T>>,
    back: u8,
}

/// The reading half of a triple buffer.
pub struct TripleBufferReader<T> {
    shared: Arc<Shared<T>>,
    front: u8,
}

/// Create a triple buffer whose reader will see `initial` until the first publish.
pub fn triple_buffer<T: Copy + Send>(initial: T) -> (TripleBufferWriter<T>, TripleBufferReader<T>) {
    let shared = Arc::new(Shared {
        slots: [
            CachePadded::new(UnsafeCell::new(initial)),
            CachePadded::new(UnsafeCell::new(initial)),
            CachePadded::new(UnsafeCell::new(initial)),
        ],
        middle: CachePadded::new(AtomicU8::new(1)),
    });

    let writer = TripleBufferWriter {
        shared: shared.clone(),
        back: 2,
    };
    let reader = TripleBufferReader { shared, front: 0 };
    (writer, reader)
}

impl<T: Copy + Send> TripleBufferWriter<T> {
    /// Publish a value.  The reader sees it on its next [TripleBufferReader::read].
    pub fn write(&mut self, value: T) {
        self.shared.slots[self.back as usize].with_mut(|ptr| unsafe { ptr.write(value) });
        let previous = self
            .shared
            .middle
            .swap(self.back | FRESH_BIT, Ordering::AcqRel);
        self.back = previous & INDEX_MASK;
    }
}

impl<T: Copy + Send> TripleBufferReader<T> {
    /// Get the most recently published value, or the previous one if nothing new has been published since.
    ///
    /// Never blocks and never allocates.
    pub fn read(&mut self) -> T {
        if self.has_update() {
            let previous = self.shared.middle.swap(self.front, Ordering::AcqRel);
            self.front = previous & INDEX_MASK;
        }

        self.shared.slots[self.front as usize].with(|ptr| unsafe { *ptr })
    }

    /// Has the writer published since the last [TripleBufferReader::read]?
    pub fn has_update(&self) -> bool {
        self.shared.middle.load(Ordering::Relaxed) & FRESH_BIT != 0
    }
}

impl<T> std::fmt::Debug for TripleBufferWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripleBufferWriter")
            .field("back", &self.back)
            .finish_non_exhaustive()
    }
}

impl<T> std::fmt::Debug for TripleBufferReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripleBufferReader")
            .field("front", &self.front)
            .finish_non_exhaustive()
    }
}
