/// Frames per block when nothing else is asked for.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Options for a [crate::Spatializer].
///
/// Everything here is fixed at construction.  A different block size or sample rate needs a new spatializer.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SpatializerOptions {
    /// Frames per convolution block.
    ///
    /// Hosts must hand [crate::Spatializer::process] a whole number of blocks, or the call passes audio through
    /// unprocessed.  Latency is one block.  Default: [DEFAULT_BLOCK_SIZE].
    pub block_size: usize,

    /// The host's sample rate, if known.
    ///
    /// When set, collections measured at any other rate can't be selected.  When unset, every collection is accepted
    /// as-is.  Measurements are never resampled.  Default: `None`.
    pub sample_rate: Option<u32>,

    /// The collection to start with, or `None` to pass through until one is selected.
    ///
    /// This doesn't need to be loaded yet; audio passes through until it is.  Default: `Some(0)`.
    pub initial_collection: Option<u32>,
}

impl Default for SpatializerOptions {
    fn default() -> Self {
        SpatializerOptions {
            block_size: DEFAULT_BLOCK_SIZE,
            sample_rate: None,
            initial_collection: Some(0),
        }
    }
}
