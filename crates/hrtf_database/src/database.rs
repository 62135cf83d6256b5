//! A fixed-capacity arena of collections.
//!
//! Slots are handed out in order and never reused.  Each slot walks `Uninitialized -> Loading -> Ready | Failed`
//! exactly once, and a `Ready` slot's collection is published through a [OnceCell], so readers on the audio thread
//! never take a lock and a collection never changes once visible.
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use once_cell::sync::OnceCell;

use crate::error::{CapacityError, DatabaseError, LoadError};
use crate::{Collection, DatabaseOptions};

/// Names a slot of an [HrtfDatabase].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CollectionId(u32);

impl CollectionId {
    pub const fn new(index: u32) -> CollectionId {
        CollectionId(index)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    fn slot(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for CollectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, derive_more::IsVariant)]
#[repr(u8)]
pub enum SlotState {
    Uninitialized = 0,
    Loading = 1,
    Ready = 2,
    Failed = 3,
}

impl SlotState {
    fn from_u8(value: u8) -> SlotState {
        match value {
            1 => SlotState::Loading,
            2 => SlotState::Ready,
            3 => SlotState::Failed,
            _ => SlotState::Uninitialized,
        }
    }
}

struct Slot {
    state: AtomicU8,
    collection: OnceCell<Collection>,
}

/// The store of measurement collections, shared by every spatializer which uses it.
pub struct HrtfDatabase {
    options: DatabaseOptions,
    slots: Box<[Slot]>,
    reserved: AtomicUsize,
}

impl HrtfDatabase {
    pub fn new(options: DatabaseOptions) -> HrtfDatabase {
        let slots = (0..options.max_collections)
            .map(|_| Slot {
                state: AtomicU8::new(SlotState::Uninitialized as u8),
                collection: OnceCell::new(),
            })
            .collect();

        HrtfDatabase {
            options,
            slots,
            reserved: AtomicUsize::new(0),
        }
    }

    fn reserve(&self) -> Result<CollectionId, CapacityError> {
        let capacity = self.slots.len();
        let index = self
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| CapacityError { capacity })?;

        self.slots[index]
            .state
            .store(SlotState::Loading as u8, Ordering::Release);
        Ok(CollectionId(index as u32))
    }

    fn publish(&self, id: CollectionId, collection: Collection) {
        let slot = &self.slots[id.slot()];
        // Slots are reserved exactly once, so nothing else can have set this.
        let published = slot.collection.set(collection).is_ok();
        debug_assert!(published);
        slot.state
            .store(SlotState::Ready as u8, Ordering::Release);
    }

    fn fail(&self, id: CollectionId) {
        self.slots[id.slot()]
            .state
            .store(SlotState::Failed as u8, Ordering::Release);
    }

    /// Parse a measurement file from `source` into the next free slot.
    ///
    /// The slot is used even if parsing fails, in which case it is left [SlotState::Failed].  If there is no free slot,
    /// nothing changes.
    pub fn load(&self, source: impl Read) -> Result<CollectionId, DatabaseError> {
        let id = self.reserve()?;

        match Collection::from_reader(source, &self.options) {
            Ok(collection) => {
                log::info!(
                    "Loaded HRTF collection {}: {} measurements of {} samples at {} Hz",
                    id,
                    collection.measurement_count(),
                    collection.impulse_length(),
                    collection.sample_rate()
                );
                self.publish(id, collection);
                Ok(id)
            }
            Err(source) => {
                log::warn!("HRTF collection {} failed to load: {}", id, source);
                self.fail(id);
                Err(DatabaseError::Load { id, source })
            }
        }
    }

    /// Load from a file.  A file which can't be opened still uses up a slot.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<CollectionId, DatabaseError> {
        let path = path.as_ref();
        log::debug!("Loading HRTF collection from {}", path.display());

        match std::fs::File::open(path) {
            Ok(file) => self.load(std::io::BufReader::new(file)),
            Err(e) => {
                let id = self.reserve()?;
                log::warn!(
                    "HRTF collection {}: unable to open {}: {}",
                    id,
                    path.display(),
                    e
                );
                self.fail(id);
                Err(DatabaseError::Load {
                    id,
                    source: LoadError::Io(e),
                })
            }
        }
    }

    /// Load a numbered set of files, one slot each, in order.
    ///
    /// Every file is attempted even if earlier ones fail.
    pub fn load_files<P: AsRef<Path>>(
        &self,
        paths: impl IntoIterator<Item = P>,
    ) -> Vec<Result<CollectionId, DatabaseError>> {
        paths.into_iter().map(|p| self.load_file(p)).collect()
    }

    /// Publish a collection which was parsed earlier, possibly on another thread.
    ///
    /// Collections longer than this database allows are rejected without using a slot.
    pub fn insert(&self, collection: Collection) -> Result<CollectionId, DatabaseError> {
        if collection.impulse_length() > self.options.max_impulse_length {
            return Err(DatabaseError::Rejected(LoadError::ImpulseTooLong {
                length: collection.impulse_length(),
                max: self.options.max_impulse_length,
            }));
        }

        let id = self.reserve()?;
        log::info!("Inserted HRTF collection {}", id);
        self.publish(id, collection);
        Ok(id)
    }

    /// The collection in a slot, if that slot is ready.
    ///
    /// Wait-free, so usable from the audio thread.
    pub fn get(&self, id: CollectionId) -> Option<&Collection> {
        self.slots.get(id.slot())?.collection.get()
    }

    /// State of a slot, or `None` if `id` is past the end of the database.
    pub fn state(&self, id: CollectionId) -> Option<SlotState> {
        self.slots
            .get(id.slot())
            .map(|s| SlotState::from_u8(s.state.load(Ordering::Acquire)))
    }

    pub fn is_ready(&self, id: CollectionId) -> bool {
        self.get(id).is_some()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// How many slots have been used, counting failures.
    pub fn len(&self) -> usize {
        self.reserved.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_impulse_length(&self) -> usize {
        self.options.max_impulse_length
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }
}

impl Default for HrtfDatabase {
    fn default() -> Self {
        HrtfDatabase::new(Default::default())
    }
}

impl std::fmt::Debug for HrtfDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HrtfDatabase")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
