/// Limits for an [crate::HrtfDatabase], fixed when it is created.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DatabaseOptions {
    /// How many collections the database can ever hold, counting failed loads.
    ///
    /// Default: 10.
    pub max_collections: usize,

    /// The longest impulse response any collection may have.
    ///
    /// Convolvers are allocated up front for this length, so it bounds memory per spatializer.  Default: 4096.
    pub max_impulse_length: usize,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        DatabaseOptions {
            max_collections: 10,
            max_impulse_length: 4096,
        }
    }
}
