//! Linear algebra type aliases for the calibration parameter space.
//!
//! Provides compile-time dimension checking for the flat vector the
//! window optimizer updates.

use nalgebra::SVector;

// ===== Parameter Layout =====
pub const PARAM_DIM: usize = 9;
pub const GLOBAL_BIAS_OFFSET: usize = 0; // world-frame accelerometer bias
pub const LOCAL_BIAS_OFFSET: usize = 3;  // device-frame accelerometer bias
pub const VELOCITY_OFFSET: usize = 6;    // velocity at the integration origin

pub type ParamVec = SVector<f64, PARAM_DIM>;
