/// A point or direction in the listener's frame: `x` forward, `y` left, `z` up.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Vec3 {
        Vec3 { x, y, z }
    }

    /// Convert from spherical coordinates, with angles in degrees.
    ///
    /// Azimuth is counterclockwise from straight ahead when seen from above, and elevation runs from -90 (straight
    /// down) to 90 (straight up), which is how measurement datasets are written.
    pub fn from_spherical(azimuth: f32, elevation: f32, radius: f32) -> Vec3 {
        let (az, el) = (azimuth.to_radians(), elevation.to_radians());
        Vec3 {
            x: radius * el.cos() * az.cos(),
            y: radius * el.cos() * az.sin(),
            z: radius * el.sin(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn distance_squared(&self, other: Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Coordinate along axis `0`, `1` or `2`; anything else is `z`.
    #[inline(always)]
    pub(crate) fn axis(&self, axis: usize) -> f32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(value: [f32; 3]) -> Vec3 {
        Vec3::new(value[0], value[1], value[2])
    }
}
