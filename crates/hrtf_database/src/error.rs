use crate::CollectionId;

/// Which ear an impulse response belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, derive_more::Display)]
pub enum Ear {
    #[display(fmt = "left")]
    Left,
    #[display(fmt = "right")]
    Right,
}

/// Reasons a measurement file can't become a [crate::Collection].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error reading measurements: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to decode measurement file: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Unknown coordinate system {0}")]
    UnknownCoordinateSystem(i32),

    #[error("Sample rate must not be zero")]
    ZeroSampleRate,

    #[error("Impulse length must not be zero")]
    ZeroImpulseLength,

    #[error("Impulse length of {length} samples is longer than the maximum of {max}")]
    ImpulseTooLong { length: usize, max: usize },

    #[error("The file contains no measurements")]
    NoMeasurements,

    #[error("Measurement {index}: position must be 3 finite values, but got {position:?}")]
    InvalidPosition { index: usize, position: Vec<f32> },

    #[error("Measurement {index}: {ear} impulse has {got} samples, but the impulse length is {expected}")]
    ImpulseLengthMismatch {
        index: usize,
        ear: Ear,
        got: usize,
        expected: usize,
    },

    #[error("Measurement {index}: {ear} impulse contains a non-finite sample")]
    NonFiniteSample { index: usize, ear: Ear },
}

/// The database has no free slots.
#[derive(Debug, thiserror::Error)]
#[error("The database is full: all {capacity} slots are in use")]
pub struct CapacityError {
    pub capacity: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// The load got a slot, but failed.  The slot stays in the failed state.
    #[error("Collection {id} failed to load: {source}")]
    Load {
        id: CollectionId,
        #[source]
        source: LoadError,
    },

    /// A pre-parsed collection doesn't fit this database.  No slot was used.
    #[error("Collection rejected: {0}")]
    Rejected(#[source] LoadError),
}

impl DatabaseError {
    pub fn is_capacity(&self) -> bool {
        matches!(self, DatabaseError::Capacity(_))
    }

    /// The underlying load failure, if this was one.
    pub fn load_error(&self) -> Option<&LoadError> {
        match self {
            DatabaseError::Load { source, .. } => Some(source),
            DatabaseError::Rejected(e) => Some(e),
            DatabaseError::Capacity(_) => None,
        }
    }
}
