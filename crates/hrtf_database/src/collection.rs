use std::io::Read;

use prost::Message;

use crate::error::{Ear, LoadError};
use crate::format::{CoordinateSystem, Measurement, MeasurementFile};
use crate::resolver::{self, PairIndex};
use crate::spatial_index::KdTree;
use crate::{DatabaseOptions, Vec3};

/// A set of HRIR pairs, each measured at one direction.
///
/// Immutable once built.  Impulses live in one flat table of `2 * measurement_count()` ear impulses, each
/// `impulse_length()` samples long: ear `2m` is the left ear of measurement `m` and ear `2m + 1` the right.
pub struct Collection {
    sample_rate: u32,
    impulse_length: usize,
    positions: Vec<Vec3>,
    impulses: Vec<f32>,
    index: KdTree,
}

impl Collection {
    /// Read a whole measurement file from `source`, then parse it with [Collection::from_bytes].
    pub fn from_reader(mut source: impl Read, options: &DatabaseOptions) -> Result<Collection, LoadError> {
        let mut bytes = vec![];
        source.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes, options)
    }

    pub fn from_bytes(bytes: &[u8], options: &DatabaseOptions) -> Result<Collection, LoadError> {
        let file = MeasurementFile::decode(bytes)?;
        Self::from_measurement_file(file, options)
    }

    /// Validate a decoded file, convert its positions to cartesian, and index them.
    pub fn from_measurement_file(
        file: MeasurementFile,
        options: &DatabaseOptions,
    ) -> Result<Collection, LoadError> {
        let coordinate_system = CoordinateSystem::from_i32(file.coordinate_system)
            .ok_or(LoadError::UnknownCoordinateSystem(file.coordinate_system))?;

        if file.sample_rate == 0 {
            return Err(LoadError::ZeroSampleRate);
        }

        let impulse_length = file.impulse_length as usize;
        if impulse_length == 0 {
            return Err(LoadError::ZeroImpulseLength);
        }
        if impulse_length > options.max_impulse_length {
            return Err(LoadError::ImpulseTooLong {
                length: impulse_length,
                max: options.max_impulse_length,
            });
        }

        if file.measurements.is_empty() {
            return Err(LoadError::NoMeasurements);
        }

        let mut positions = Vec::with_capacity(file.measurements.len());
        let mut impulses = Vec::with_capacity(file.measurements.len() * 2 * impulse_length);

        for (index, measurement) in file.measurements.into_iter().enumerate() {
            let Measurement {
                position,
                left,
                right,
            } = measurement;

            positions.push(convert_position(index, position, coordinate_system)?);

            for (ear, samples) in [(Ear::Left, left), (Ear::Right, right)] {
                if samples.len() != impulse_length {
                    return Err(LoadError::ImpulseLengthMismatch {
                        index,
                        ear,
                        got: samples.len(),
                        expected: impulse_length,
                    });
                }
                if !samples.iter().all(|s| s.is_finite()) {
                    return Err(LoadError::NonFiniteSample { index, ear });
                }
                impulses.extend_from_slice(&samples);
            }
        }

        let index = KdTree::new(&positions);

        Ok(Collection {
            sample_rate: file.sample_rate,
            impulse_length,
            positions,
            impulses,
            index,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn impulse_length(&self) -> usize {
        self.impulse_length
    }

    pub fn measurement_count(&self) -> usize {
        self.positions.len()
    }

    /// Cartesian position of measurement `m`.
    pub fn position(&self, measurement: usize) -> Option<Vec3> {
        self.positions.get(measurement).copied()
    }

    /// One ear's impulse response, by ear index.
    pub fn ear_impulse(&self, ear_index: usize) -> Option<&[f32]> {
        let start = ear_index.checked_mul(self.impulse_length)?;
        self.impulses.get(start..start + self.impulse_length)
    }

    /// The `(left, right)` impulses of a pair.
    pub fn pair(&self, pair: PairIndex) -> Option<(&[f32], &[f32])> {
        Some((
            self.ear_impulse(pair.left_ear())?,
            self.ear_impulse(pair.right_ear())?,
        ))
    }

    /// The pair measured closest to `direction`.  See [resolver::nearest].
    pub fn nearest(&self, direction: Vec3) -> PairIndex {
        resolver::nearest(self, direction)
    }

    pub(crate) fn nearest_measurement(&self, direction: Vec3) -> Option<usize> {
        self.index.nearest(direction)
    }
}

fn convert_position(
    index: usize,
    position: Vec<f32>,
    coordinate_system: CoordinateSystem,
) -> Result<Vec3, LoadError> {
    let coords: [f32; 3] = match position.as_slice() {
        [a, b, c] if a.is_finite() && b.is_finite() && c.is_finite() => [*a, *b, *c],
        _ => return Err(LoadError::InvalidPosition { index, position }),
    };

    let converted = match coordinate_system {
        CoordinateSystem::Cartesian => Vec3::from(coords),
        CoordinateSystem::Spherical => Vec3::from_spherical(coords[0], coords[1], coords[2]),
    };

    // Huge spherical radii can still overflow.
    if !converted.is_finite() {
        return Err(LoadError::InvalidPosition {
            index,
            position: coords.to_vec(),
        });
    }

    Ok(converted)
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("sample_rate", &self.sample_rate)
            .field("impulse_length", &self.impulse_length)
            .field("measurements", &self.positions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::MeasurementFileBuilder;

    fn options() -> DatabaseOptions {
        DatabaseOptions {
            max_collections: 4,
            max_impulse_length: 8,
        }
    }

    fn two_point_builder() -> MeasurementFileBuilder {
        let mut b = MeasurementFileBuilder::new(44100, 2, CoordinateSystem::Spherical);
        b.measurement([0.0, 0.0, 1.0], &[1.0, 2.0], &[3.0, 4.0])
            .measurement([90.0, 0.0, 1.0], &[5.0, 6.0], &[7.0, 8.0]);
        b
    }

    fn load_err(builder: &MeasurementFileBuilder) -> LoadError {
        Collection::from_bytes(&builder.encode(), &options()).unwrap_err()
    }

    #[test]
    fn loads_and_interleaves_ears() {
        let c = Collection::from_reader(&two_point_builder().encode()[..], &options()).unwrap();
        assert_eq!(c.sample_rate(), 44100);
        assert_eq!(c.impulse_length(), 2);
        assert_eq!(c.measurement_count(), 2);

        assert_eq!(c.ear_impulse(0), Some(&[1.0, 2.0][..]));
        assert_eq!(c.ear_impulse(1), Some(&[3.0, 4.0][..]));
        assert_eq!(c.ear_impulse(2), Some(&[5.0, 6.0][..]));
        assert_eq!(c.ear_impulse(3), Some(&[7.0, 8.0][..]));
        assert_eq!(c.ear_impulse(4), None);

        let (l, r) = c.pair(PairIndex::from_ear_index(3)).unwrap();
        assert_eq!((l, r), (&[5.0, 6.0][..], &[7.0, 8.0][..]));
    }

    #[test]
    fn spherical_positions_become_cartesian() {
        let c = two_point_builder().into_collection(&options()).unwrap();
        let p = c.position(1).unwrap();
        assert!(p.distance_squared(Vec3::new(0.0, 1.0, 0.0)) < 1e-10);
    }

    #[test]
    fn undecodable_bytes() {
        let got = Collection::from_bytes(&[0xff, 0xff, 0xff], &options());
        assert!(matches!(got, Err(LoadError::Decode(_))));
    }

    #[test]
    fn io_errors_propagate() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "broken"))
            }
        }
        assert!(matches!(
            Collection::from_reader(Broken, &options()),
            Err(LoadError::Io(_))
        ));
    }

    #[test]
    fn header_validation() {
        let mut b = two_point_builder();
        b.file_mut().coordinate_system = 7;
        assert!(matches!(load_err(&b), LoadError::UnknownCoordinateSystem(7)));

        let mut b = two_point_builder();
        b.file_mut().sample_rate = 0;
        assert!(matches!(load_err(&b), LoadError::ZeroSampleRate));

        let mut b = two_point_builder();
        b.file_mut().impulse_length = 0;
        assert!(matches!(load_err(&b), LoadError::ZeroImpulseLength));

        let mut b = two_point_builder();
        b.file_mut().impulse_length = 9;
        assert!(matches!(
            load_err(&b),
            LoadError::ImpulseTooLong { length: 9, max: 8 }
        ));

        let b = MeasurementFileBuilder::new(44100, 2, CoordinateSystem::Cartesian);
        assert!(matches!(load_err(&b), LoadError::NoMeasurements));
    }

    #[test]
    fn measurement_validation() {
        let mut b = two_point_builder();
        b.file_mut().measurements[1].position.pop();
        assert!(matches!(
            load_err(&b),
            LoadError::InvalidPosition { index: 1, .. }
        ));

        let mut b = two_point_builder();
        b.file_mut().measurements[0].position[2] = f32::NAN;
        assert!(matches!(
            load_err(&b),
            LoadError::InvalidPosition { index: 0, .. }
        ));

        let mut b = two_point_builder();
        b.file_mut().measurements[1].right.push(0.0);
        assert!(matches!(
            load_err(&b),
            LoadError::ImpulseLengthMismatch {
                index: 1,
                ear: Ear::Right,
                got: 3,
                expected: 2
            }
        ));

        let mut b = two_point_builder();
        b.file_mut().measurements[0].left[1] = f32::INFINITY;
        assert!(matches!(
            load_err(&b),
            LoadError::NonFiniteSample {
                index: 0,
                ear: Ear::Left
            }
        ));
    }
}
