//! Offline reconciliation of smartphone IMU streams with GPS speed.
//!
//! Takes raw angular-velocity and acceleration logs plus a GPS track and
//! produces two denoised signals on the inertial timeline: a steering
//! angle from rotations around the dominant turn axis, and a forward
//! speed fitted by calibrating accelerometer biases against the GPS
//! speeds over sliding windows.

pub mod calibration;
pub mod error;
pub mod fusion;
pub mod io;
pub mod optimizer;
pub mod smoothing;
pub mod steering;
pub mod timeline;
pub mod types;

pub use error::{FitError, FitResult};
pub use fusion::{fuse_velocities, FitConfig};
pub use timeline::MergedTimeline;
