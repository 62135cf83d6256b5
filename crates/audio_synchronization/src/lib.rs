//! Primitives for synchronization in audio contexts.
//!
//! This crate provides mechanisms whereby an audio thread can receive state from control threads without ever entering
//! the kernel or blocking for an unbounded amount of time.  Generally, synchronization primitives optimize for memory
//! usage or throughput, but the important feature for an audio application is that the audio half of a communication
//! process is never blocked.  A mutex around the listener direction, for example, is enough to glitch audio whenever
//! the control thread is descheduled while holding it.
//!
//! Everything here is checked under loom: run the tests with `RUSTFLAGS="--cfg loom"`.

mod atomic_slot_index;
mod sync;
pub mod triple_buffer;

pub use atomic_slot_index::*;
pub use triple_buffer::{triple_buffer, TripleBufferReader, TripleBufferWriter};
