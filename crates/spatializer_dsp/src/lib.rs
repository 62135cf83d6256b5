//! DSP building blocks for the spatializer: partitioned FFT convolution, equal-power crossfades, and conversion
//! between host channel layouts.
pub mod channel_conversion;
mod channel_format;
pub mod crossfade;
mod direct;
mod output_buffer;
pub mod partitioned;

#[cfg(test)]
mod close_floats;

pub use channel_conversion::ChannelConverter;
pub use channel_format::*;
pub use direct::convolve_direct;
pub use output_buffer::*;
pub use partitioned::{BinauralConvolver, ConvolverError, MonoConvolver};
