//! Per-window accelerometer calibration against GPS reference speed.
//!
//! The model integrates orientation from the gyroscope, corrects the
//! accelerometer with a device-frame and a world-frame bias, and double
//! integrates into a velocity trajectory starting from a fitted initial
//! velocity. The fit minimizes the squared mismatch between the model
//! speed and GPS speed over one sliding window.

use std::collections::BTreeMap;

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use crate::optimizer::Objective;
use crate::timeline::MergedTimeline;
use crate::types::{
    seconds_between, GpsSpeedSample, ParamVec, GLOBAL_BIAS_OFFSET, LOCAL_BIAS_OFFSET, PARAM_DIM,
    VELOCITY_OFFSET,
};

/// Model speeds below this are treated as zero when normalizing the
/// velocity direction for the gradient.
const MIN_SPEED_FOR_GRADIENT: f64 = 1e-12;

/// The nine fitted parameters of one window, in struct form.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CalibrationParams {
    /// Accelerometer bias fixed in the world frame (m/s²).
    pub global_bias: Vector3<f64>,
    /// Accelerometer bias fixed in the device frame (m/s²); absorbs
    /// gravity and static sensor offset.
    pub local_bias: Vector3<f64>,
    /// Velocity at the window's integration origin (m/s).
    pub initial_velocity: Vector3<f64>,
}

impl CalibrationParams {
    pub fn from_vector(x: &ParamVec) -> Self {
        CalibrationParams {
            global_bias: x.fixed_rows::<3>(GLOBAL_BIAS_OFFSET).into_owned(),
            local_bias: x.fixed_rows::<3>(LOCAL_BIAS_OFFSET).into_owned(),
            initial_velocity: x.fixed_rows::<3>(VELOCITY_OFFSET).into_owned(),
        }
    }

    pub fn to_vector(&self) -> ParamVec {
        let mut x = ParamVec::zeros();
        x.fixed_rows_mut::<3>(GLOBAL_BIAS_OFFSET)
            .copy_from(&self.global_bias);
        x.fixed_rows_mut::<3>(LOCAL_BIAS_OFFSET)
            .copy_from(&self.local_bias);
        x.fixed_rows_mut::<3>(VELOCITY_OFFSET)
            .copy_from(&self.initial_velocity);
        x
    }
}

/// Integrated motion state at one merged-timeline index.
#[derive(Clone, Copy, Debug)]
pub struct IntegratedPoint {
    pub velocity: Vector3<f64>,
}

/// Squared-error objective tying inertial dead reckoning to the GPS speeds
/// of one window.
///
/// Holds only borrows of immutable inputs plus the precomputed index span;
/// evaluation is a pure function of the parameters, so objectives for
/// different windows can run on different threads.
pub struct CalibrationObjective<'a> {
    timeline: &'a MergedTimeline,
    window: &'a [GpsSpeedSample],
    /// Integration starts here: the latest merged index at or before the
    /// window's first GPS timestamp, or the very first index.
    origin_idx: usize,
    /// Merged indices whose timestamps fall inside the window's GPS span.
    span: std::ops::Range<usize>,
}

impl<'a> CalibrationObjective<'a> {
    pub fn new(timeline: &'a MergedTimeline, window: &'a [GpsSpeedSample]) -> Self {
        let (origin_idx, span) = match (window.first(), window.last()) {
            (Some(first), Some(last)) => {
                let origin = timeline
                    .last_index_at_or_before(first.timestamp_usec)
                    .unwrap_or(0);
                let span =
                    timeline.index_range_within(first.timestamp_usec, last.timestamp_usec);
                (origin, span)
            }
            _ => (0, 0..0),
        };
        CalibrationObjective {
            timeline,
            window,
            origin_idx,
            span,
        }
    }

    /// Re-run the integration with fitted parameters and keep the velocity
    /// at every in-span index. This is what the orchestrator collects.
    pub fn integrate_trajectory(
        &self,
        params: &CalibrationParams,
    ) -> BTreeMap<usize, IntegratedPoint> {
        let mut points = BTreeMap::new();
        self.integrate_over_span(params, |idx, velocity, _, _| {
            points.insert(idx, IntegratedPoint {
                velocity: *velocity,
            });
        });
        points
    }

    /// Forward-Euler orientation and velocity integration from the origin
    /// index through the end of the span.
    ///
    /// `visit` sees every in-span index with the state at that instant:
    /// the velocity, the accumulated rotation Σ R·Δt (the sensitivity of
    /// the velocity to the device-frame bias) and the elapsed seconds
    /// since the origin (its sensitivity to the world-frame bias).
    fn integrate_over_span<F>(&self, params: &CalibrationParams, mut visit: F)
    where
        F: FnMut(usize, &Vector3<f64>, &Matrix3<f64>, f64),
    {
        if self.span.is_empty() {
            return;
        }

        let mut orientation = UnitQuaternion::identity();
        let mut velocity = params.initial_velocity;
        let mut rotation_sum = Matrix3::zeros();
        let mut elapsed = 0.0;

        for idx in self.origin_idx..self.span.end {
            if idx >= self.span.start {
                visit(idx, &velocity, &rotation_sum, elapsed);
            }
            if idx + 1 < self.span.end {
                let dt =
                    seconds_between(self.timeline.time_usec(idx), self.timeline.time_usec(idx + 1));
                let rotation_matrix = orientation.to_rotation_matrix();
                let world_acceleration = rotation_matrix
                    * (self.timeline.acceleration(idx).vector() - params.local_bias)
                    - params.global_bias;

                velocity += world_acceleration * dt;
                rotation_sum += rotation_matrix.matrix() * dt;
                elapsed += dt;

                let angular_rate = self.timeline.rotation(idx).vector();
                orientation *= UnitQuaternion::from_scaled_axis(angular_rate * dt);
            }
        }
    }

    /// GPS reference speed linearly interpolated to `time_usec`, clamped
    /// to the window's end values outside its span.
    fn reference_speed(&self, time_usec: i64) -> f64 {
        let window = self.window;
        let after = window.partition_point(|s| s.timestamp_usec < time_usec);
        if after == 0 {
            return window[0].speed_m_s;
        }
        if after == window.len() {
            return window[window.len() - 1].speed_m_s;
        }
        let left = &window[after - 1];
        let right = &window[after];
        let gap = (right.timestamp_usec - left.timestamp_usec) as f64;
        let frac = (time_usec - left.timestamp_usec) as f64 / gap;
        left.speed_m_s + frac * (right.speed_m_s - left.speed_m_s)
    }
}

impl Objective<PARAM_DIM> for CalibrationObjective<'_> {
    fn evaluate(&self, x: &ParamVec) -> (f64, ParamVec) {
        let params = CalibrationParams::from_vector(x);

        let mut cost = 0.0;
        let mut grad_global = Vector3::zeros();
        let mut grad_local = Vector3::zeros();
        let mut grad_velocity = Vector3::zeros();
        let mut count = 0usize;

        self.integrate_over_span(&params, |idx, velocity, rotation_sum, elapsed| {
            let speed = velocity.norm();
            let error = speed - self.reference_speed(self.timeline.time_usec(idx));
            cost += error * error;
            count += 1;

            // d|v|/dv is v/|v|; at |v| = 0 the norm has no defined
            // direction and the sample contributes nothing to the slope.
            if speed > MIN_SPEED_FOR_GRADIENT {
                let direction = velocity / speed;
                grad_velocity += error * direction;
                grad_global -= error * elapsed * direction;
                grad_local -= error * (rotation_sum.transpose() * direction);
            }
        });

        if count == 0 {
            return (0.0, ParamVec::zeros());
        }

        let scale = 2.0 / count as f64;
        let mut grad = ParamVec::zeros();
        grad.fixed_rows_mut::<3>(GLOBAL_BIAS_OFFSET)
            .copy_from(&(grad_global * scale));
        grad.fixed_rows_mut::<3>(LOCAL_BIAS_OFFSET)
            .copy_from(&(grad_local * scale));
        grad.fixed_rows_mut::<3>(VELOCITY_OFFSET)
            .copy_from(&(grad_velocity * scale));

        (cost / count as f64, grad)
    }
}
