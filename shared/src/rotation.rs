use serde::{Deserialize, Serialize};

/// Angular slack, in degrees, when deciding whether an Euler angle is a right-angle multiple.
const ANGLE_TOLERANCE_DEGREES: f64 = 0.01;

/// How far the squared norm may drift from one before a quaternion stops
/// counting as a rotation. Loose enough for single-precision clients.
const NORM_TOLERANCE: f64 = 1e-5;

/// Above this fraction of the squared norm the decomposition is treated as gimbal-locked.
const SINGULARITY_THRESHOLD: f64 = 0.499;

/// A rotation quaternion as sent by clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Euler decomposition of a rotation, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub heading: f64,
    pub attitude: f64,
    pub bank: f64,
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::IDENTITY
    }
}

impl Rotation {
    pub const IDENTITY: Rotation = Rotation::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Decomposes the quaternion into heading (y), attitude (z) and bank (x).
    ///
    /// Near the poles (attitude of +/-90 degrees) the bank is folded into the
    /// heading and reported as zero.
    pub fn euler_angles(&self) -> EulerAngles {
        let (x, y, z, w) = (self.x, self.y, self.z, self.w);
        let (sqx, sqy, sqz, sqw) = (x * x, y * y, z * z, w * w);
        let unit = sqx + sqy + sqz + sqw;
        let test = x * y + z * w;

        let (heading, attitude, bank) = if test > SINGULARITY_THRESHOLD * unit {
            (2.0 * x.atan2(w), std::f64::consts::FRAC_PI_2, 0.0)
        } else if test < -SINGULARITY_THRESHOLD * unit {
            (-2.0 * x.atan2(w), -std::f64::consts::FRAC_PI_2, 0.0)
        } else {
            (
                (2.0 * y * w - 2.0 * x * z).atan2(sqx - sqy - sqz + sqw),
                (2.0 * test / unit).asin(),
                (2.0 * x * w - 2.0 * y * z).atan2(-sqx + sqy - sqz + sqw),
            )
        };

        EulerAngles {
            heading: heading.to_degrees(),
            attitude: attitude.to_degrees(),
            bank: bank.to_degrees(),
        }
    }

    pub fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    /// True when the rotation maps the integer lattice onto itself: a unit
    /// quaternion whose Euler components are all multiples of 90 degrees.
    ///
    /// Scaled quaternions are refused even when their angles are fine, since
    /// [`Vector::rotated`](crate::Vector::rotated) would scale the cells too.
    pub fn is_right_angled(&self) -> bool {
        let norm = self.norm_squared();
        if !norm.is_finite() || (norm - 1.0).abs() > NORM_TOLERANCE {
            return false;
        }
        let angles = self.euler_angles();
        [angles.heading, angles.attitude, angles.bank]
            .iter()
            .all(|angle| is_right_angle_multiple(*angle))
    }
}

fn is_right_angle_multiple(degrees: f64) -> bool {
    let rounded = degrees.round();
    (degrees - rounded).abs() <= ANGLE_TOLERANCE_DEGREES && (rounded as i64) % 90 == 0
}
