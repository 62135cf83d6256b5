//! HRTF measurement collections: the file format, validation, a spatial index for nearest-direction lookup, and the
//! fixed-capacity database the spatializer reads from.
mod builder;
mod collection;
mod database;
mod error;
pub mod format;
mod geometry;
mod options;
pub mod resolver;
mod spatial_index;

pub use builder::*;
pub use collection::*;
pub use database::*;
pub use error::*;
pub use format::CoordinateSystem;
pub use geometry::*;
pub use options::*;
pub use resolver::PairIndex;
