use hrtf_database::{CollectionId, DatabaseError};
use spatializer_dsp::ConvolverError;

/// Why a collection can't be used.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SelectionError {
    #[error("Collection {id} is out of range: the database has {capacity} slots")]
    OutOfRange { id: CollectionId, capacity: usize },

    #[error("Collection {0} has not finished loading")]
    NotLoaded(CollectionId),

    #[error("Collection {0} failed to load")]
    Failed(CollectionId),

    #[error("Collection {id} was measured at {collection} Hz, but the spatializer runs at {spatializer} Hz")]
    SampleRateMismatch {
        id: CollectionId,
        collection: u32,
        spatializer: u32,
    },
}

/// Why a spatializer is passing audio through.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum NotReadyError {
    #[error("No collection is selected")]
    NothingSelected,

    #[error(transparent)]
    Unusable(#[from] SelectionError),
}

#[derive(Debug, derive_more::Display, derive_more::IsVariant)]
enum ErrorPayload {
    #[display(fmt = "Convolver error: {}", _0)]
    Convolver(ConvolverError),

    #[display(fmt = "Database error: {}", _0)]
    Database(DatabaseError),

    #[display(fmt = "Selection error: {}", _0)]
    Selection(SelectionError),
}

#[derive(Debug, thiserror::Error)]
#[error("{payload}")]
pub struct Error {
    payload: ErrorPayload,
}

macro_rules! conv {
    ($variant: ident, $from_err: path) => {
        impl From<$from_err> for Error {
            fn from(value: $from_err) -> Error {
                Error {
                    payload: ErrorPayload::$variant(value),
                }
            }
        }
    };
}

conv!(Convolver, ConvolverError);
conv!(Database, DatabaseError);
conv!(Selection, SelectionError);

impl Error {
    /// Did the convolver reject the options, e.g. a block size of 0?
    pub fn is_convolver(&self) -> bool {
        self.payload.is_convolver()
    }

    pub fn is_database(&self) -> bool {
        self.payload.is_database()
    }

    /// Was a collection unusable?
    pub fn is_selection(&self) -> bool {
        self.payload.is_selection()
    }

    /// The selection failure, if that's what this is.
    pub fn as_selection(&self) -> Option<&SelectionError> {
        match &self.payload {
            ErrorPayload::Selection(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
