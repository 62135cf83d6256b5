//! The on-disk measurement format.
//!
//! Files are protobuf-encoded [MeasurementFile] messages.  The equivalent schema is:
//!
//! ```text
//! enum CoordinateSystem { SPHERICAL = 0; CARTESIAN = 1; }
//!
//! message Measurement {
//!   repeated float position = 1;
//!   repeated float left = 2;
//!   repeated float right = 3;
//! }
//!
//! message MeasurementFile {
//!   uint32 sample_rate = 1;
//!   uint32 impulse_length = 2;
//!   CoordinateSystem coordinate_system = 3;
//!   repeated Measurement measurements = 4;
//! }
//! ```

/// How [Measurement::position] is to be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum CoordinateSystem {
    /// `[azimuth degrees, elevation degrees, radius]`.
    Spherical = 0,

    /// `[x, y, z]`.
    Cartesian = 1,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Measurement {
    #[prost(float, repeated, tag = "1")]
    pub position: Vec<f32>,

    #[prost(float, repeated, tag = "2")]
    pub left: Vec<f32>,

    #[prost(float, repeated, tag = "3")]
    pub right: Vec<f32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MeasurementFile {
    #[prost(uint32, tag = "1")]
    pub sample_rate: u32,

    #[prost(uint32, tag = "2")]
    pub impulse_length: u32,

    #[prost(enumeration = "CoordinateSystem", tag = "3")]
    pub coordinate_system: i32,

    #[prost(message, repeated, tag = "4")]
    pub measurements: Vec<Measurement>,
}
