use std::sync::atomic::Ordering;
use std::sync::Arc;

use audio_synchronization::{AtomicSlotIndex, TripleBufferWriter};
use hrtf_database::{Collection, CollectionId, HrtfDatabase, SlotState, Vec3};

use crate::error::SelectionError;

/// Check that `id` names a collection a spatializer running at `sample_rate` can use.
///
/// This is the one rule, applied both when selecting and on every block.  Wait-free.
pub(crate) fn usable_collection(
    database: &HrtfDatabase,
    id: CollectionId,
    sample_rate: Option<u32>,
) -> Result<&Collection, SelectionError> {
    let state = database.state(id).ok_or(SelectionError::OutOfRange {
        id,
        capacity: database.capacity(),
    })?;

    let collection = match (state, database.get(id)) {
        (SlotState::Failed, _) => return Err(SelectionError::Failed(id)),
        (_, Some(c)) => c,
        (_, None) => return Err(SelectionError::NotLoaded(id)),
    };

    match sample_rate {
        Some(sr) if sr != collection.sample_rate() => Err(SelectionError::SampleRateMismatch {
            id,
            collection: collection.sample_rate(),
            spatializer: sr,
        }),
        _ => Ok(collection),
    }
}

/// The control side of a [crate::Spatializer]: where direction and collection changes come from.
///
/// Everything here is wait-free and takes effect at the start of the spatializer's next `process` call.  There is one
/// handle per spatializer, so it isn't `Clone`; move it to whichever thread drives the parameters.
pub struct ControlHandle {
    database: Arc<HrtfDatabase>,
    sample_rate: Option<u32>,
    selection: Arc<AtomicSlotIndex>,
    direction: TripleBufferWriter<Vec3>,
    last_direction: Vec3,
}

impl ControlHandle {
    pub(crate) fn new(
        database: Arc<HrtfDatabase>,
        sample_rate: Option<u32>,
        selection: Arc<AtomicSlotIndex>,
        direction: TripleBufferWriter<Vec3>,
        initial_direction: Vec3,
    ) -> ControlHandle {
        ControlHandle {
            database,
            sample_rate,
            selection,
            direction,
            last_direction: initial_direction,
        }
    }

    /// Set the source's direction relative to the listener: `x` forward, `y` left, `z` up.
    ///
    /// Only the direction matters, but it is matched against the measurement positions as-is, so keep it on their
    /// scale (usually the unit sphere).  Non-finite directions are ignored, in which case this returns `false`.
    pub fn set_direction(&mut self, x: f32, y: f32, z: f32) -> bool {
        let direction = Vec3::new(x, y, z);
        if !direction.is_finite() {
            log::debug!("Ignoring non-finite direction {:?}", direction);
            return false;
        }

        self.direction.write(direction);
        self.last_direction = direction;
        true
    }

    /// The last direction accepted by [ControlHandle::set_direction].
    pub fn direction(&self) -> Vec3 {
        self.last_direction
    }

    /// Switch to another collection.
    ///
    /// The collection must be loaded and usable at this spatializer's sample rate.  On error the previous selection
    /// stays in effect.
    pub fn select_collection(&self, id: CollectionId) -> Result<(), SelectionError> {
        usable_collection(&self.database, id, self.sample_rate)?;

        // Anything in range of the database also fits the atomic.
        self.selection
            .store(Some(id.get()), Ordering::Release)
            .map_err(|_| SelectionError::OutOfRange {
                id,
                capacity: self.database.capacity(),
            })?;

        log::info!("Selected HRTF collection {}", id);
        Ok(())
    }

    /// Stop spatializing and pass audio through.
    pub fn clear_selection(&self) {
        // None always fits.
        let _ = self.selection.store(None, Ordering::Release);
        log::info!("Cleared HRTF collection selection");
    }

    pub fn selected(&self) -> Option<CollectionId> {
        self.selection.load(Ordering::Acquire).map(CollectionId::new)
    }

    pub fn database(&self) -> &Arc<HrtfDatabase> {
        &self.database
    }
}

impl std::fmt::Debug for ControlHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlHandle")
            .field("selected", &self.selected())
            .field("direction", &self.last_direction)
            .finish_non_exhaustive()
    }
}
