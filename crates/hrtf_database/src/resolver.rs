//! Direction to impulse-pair resolution.
use crate::{Collection, Vec3};

/// The even ear index naming a stereo pair: `left_ear()` is the left ear, `right_ear()` the one after it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PairIndex(usize);

impl PairIndex {
    /// Normalize any ear index to the start of its pair.  Odd indices round down.
    pub fn from_ear_index(ear_index: usize) -> PairIndex {
        PairIndex(ear_index - ear_index % 2)
    }

    pub fn from_measurement(measurement: usize) -> PairIndex {
        PairIndex(measurement * 2)
    }

    pub fn measurement(&self) -> usize {
        self.0 / 2
    }

    pub fn left_ear(&self) -> usize {
        self.0
    }

    pub fn right_ear(&self) -> usize {
        self.0 + 1
    }
}

/// Find the pair measured at the position closest to `direction`.
///
/// Distance is Euclidean between cartesian positions, so `direction` should be on the same scale as the measurements
/// (usually the unit sphere).  Equidistant measurements go to the lowest index, and a non-finite direction resolves to
/// the first pair.  `O(log P)` expected, never allocates.
pub fn nearest(collection: &Collection, direction: Vec3) -> PairIndex {
    if !direction.is_finite() {
        return PairIndex::default();
    }

    let measurement = collection.nearest_measurement(direction).unwrap_or(0);
    PairIndex::from_measurement(measurement)
}
