//! Real-time binaural spatialization with measured HRTFs.
//!
//! A [Spatializer] convolves a mono source with the head-related impulse response pair measured closest to the
//! source's direction, producing stereo for headphones.  Directions and collection changes arrive through a
//! [ControlHandle] from any thread, and filter changes are crossfaded within a block.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use spatializer::{HrtfDatabase, Spatializer, SpatializerOptions};
//!
//! let database = Arc::new(HrtfDatabase::default());
//! database.load_file("hrtf/0.bin").unwrap();
//!
//! let (mut spatializer, mut control) = Spatializer::new(database, SpatializerOptions::default()).unwrap();
//! control.set_direction(0.0, 1.0, 0.0);
//!
//! let input = vec![0.0f32; 512];
//! let mut output = vec![0.0f32; 1024];
//! spatializer.process(&input, &mut output, 1, 2);
//! ```
#[macro_use]
mod logging;

mod config;
mod control;
mod engine;
mod error;
mod is_audio_thread;
mod transition;

pub use config::*;
pub use control::ControlHandle;
pub use engine::Spatializer;
pub use error::*;

pub use hrtf_database::{
    CapacityError, Collection, CollectionId, CoordinateSystem, DatabaseError, DatabaseOptions, HrtfDatabase, LoadError,
    MeasurementFileBuilder, PairIndex, SlotState, Vec3,
};
