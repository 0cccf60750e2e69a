pub mod linalg;

pub use linalg::*;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Microseconds per second, for timestamp conversion.
pub const USEC_PER_SEC: f64 = 1_000_000.0;

/// One three-axis inertial sample: gyroscope angular velocity (rad/s) or
/// raw accelerometer output (m/s²), tagged with its capture time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImuSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp_usec: i64,
}

impl ImuSample {
    pub fn vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// One GPS fix reduced to scalar ground speed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GpsSpeedSample {
    pub speed_m_s: f64,
    pub timestamp_usec: i64,
}

/// One record of the steering output series.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SteeringRecord {
    pub timestamp_usec: i64,
    pub angular_value: f64,
}

/// One record of the fused velocity output series.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VelocityRecord {
    pub timestamp_usec: i64,
    pub speed_m_s: f64,
}

/// Elapsed seconds between two microsecond timestamps.
pub fn seconds_between(from_usec: i64, to_usec: i64) -> f64 {
    (to_usec - from_usec) as f64 / USEC_PER_SEC
}
