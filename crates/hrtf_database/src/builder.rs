use std::io::Write;

use prost::Message;

use crate::format::{CoordinateSystem, Measurement, MeasurementFile};
use crate::{Collection, DatabaseOptions, LoadError};

/// Builds measurement files in memory.
///
/// Nothing is validated until the file is parsed, so this can also produce broken files.
#[derive(Clone, Debug)]
pub struct MeasurementFileBuilder {
    file: MeasurementFile,
}

impl MeasurementFileBuilder {
    pub fn new(sample_rate: u32, impulse_length: u32, coordinate_system: CoordinateSystem) -> Self {
        MeasurementFileBuilder {
            file: MeasurementFile {
                sample_rate,
                impulse_length,
                coordinate_system: coordinate_system.into(),
                measurements: vec![],
            },
        }
    }

    /// Append a measurement.  `position` is read according to the coordinate system.
    pub fn measurement(&mut self, position: [f32; 3], left: &[f32], right: &[f32]) -> &mut Self {
        self.file.measurements.push(Measurement {
            position: position.to_vec(),
            left: left.to_vec(),
            right: right.to_vec(),
        });
        self
    }

    /// Get at the raw message, e.g. to write a field no other method will.
    pub fn file_mut(&mut self) -> &mut MeasurementFile {
        &mut self.file
    }

    pub fn build(&self) -> MeasurementFile {
        self.file.clone()
    }

    pub fn encode(&self) -> Vec<u8> {
        self.file.encode_to_vec()
    }

    pub fn write_to(&self, mut dest: impl Write) -> std::io::Result<()> {
        dest.write_all(&self.encode())
    }

    pub fn into_collection(self, options: &DatabaseOptions) -> Result<Collection, LoadError> {
        Collection::from_measurement_file(self.file, options)
    }
}
