//! Sliding-window orchestration: fit every window, average overlapping
//! estimates, smooth the result.

use std::collections::BTreeMap;
use std::thread;

use crate::calibration::{CalibrationObjective, CalibrationParams};
use crate::error::{FitError, FitResult};
use crate::optimizer::{self, LbfgsParams};
use crate::smoothing::smooth_time_series;
use crate::timeline::MergedTimeline;
use crate::types::{seconds_between, GpsSpeedSample, VelocityRecord};

/// Tuning for the sliding-window velocity fit.
#[derive(Clone, Debug)]
pub struct FitConfig {
    /// GPS samples per calibration window.
    pub window_size: usize,
    /// GPS samples between consecutive window starts.
    pub stride: usize,
    /// L-BFGS iteration cap per window.
    pub max_optimizer_iterations: usize,
    /// Width of the Gaussian post-smoothing kernel, in seconds.
    pub smoothing_sigma_sec: f64,
    /// Worker threads for window optimization; 0 picks the core count.
    pub threads: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            window_size: 40,
            stride: 5,
            max_optimizer_iterations: 500,
            smoothing_sigma_sec: 0.003,
            threads: 0,
        }
    }
}

impl FitConfig {
    /// Reject unusable settings before any data is touched.
    pub fn validate(&self) -> FitResult<()> {
        if self.window_size == 0 {
            return Err(FitError::Config("window_size must be positive".into()));
        }
        if self.stride == 0 {
            return Err(FitError::Config("stride must be positive".into()));
        }
        if self.stride > self.window_size {
            // A stride past the window size would leave GPS samples no
            // window ever covers.
            return Err(FitError::Config(format!(
                "stride {} exceeds window_size {}",
                self.stride, self.window_size
            )));
        }
        if self.max_optimizer_iterations == 0 {
            return Err(FitError::Config(
                "max_optimizer_iterations must be positive".into(),
            ));
        }
        if !(self.smoothing_sigma_sec > 0.0 && self.smoothing_sigma_sec.is_finite()) {
            return Err(FitError::Config(format!(
                "smoothing_sigma_sec must be a positive finite number, got {}",
                self.smoothing_sigma_sec
            )));
        }
        Ok(())
    }
}

/// Window boundaries over `gps_len` samples: one window per stride step,
/// the last one clipped to the data.
fn window_spans(gps_len: usize, window_size: usize, stride: usize) -> Vec<(usize, usize)> {
    (0..gps_len)
        .step_by(stride)
        .map(|start| (start, (start + window_size).min(gps_len)))
        .collect()
}

/// Arithmetic mean. The append order of window estimates does not matter.
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Fit calibration windows across the GPS track and reduce them to one
/// smoothed speed per covered merged-timeline index.
pub fn fuse_velocities(
    timeline: &MergedTimeline,
    gps: &[GpsSpeedSample],
    config: &FitConfig,
) -> FitResult<Vec<VelocityRecord>> {
    config.validate()?;
    if gps.is_empty() {
        return Err(FitError::Data("locations stream is empty".into()));
    }
    if timeline.is_empty() {
        return Err(FitError::Data("merged timeline is empty".into()));
    }
    let gps_first = gps[0].timestamp_usec;
    let gps_last = gps[gps.len() - 1].timestamp_usec;
    if timeline.time_usec(timeline.len() - 1) < gps_first || timeline.time_usec(0) > gps_last {
        return Err(FitError::Data(
            "inertial and GPS records do not overlap in time".into(),
        ));
    }

    let spans = window_spans(gps.len(), config.window_size, config.stride);
    log::info!(
        "fitting {} windows over {} GPS samples (window {}, stride {})",
        spans.len(),
        gps.len(),
        config.window_size,
        config.stride
    );

    let estimates = optimize_windows(timeline, gps, config, &spans);
    if estimates.is_empty() {
        return Err(FitError::Data(
            "no inertial samples inside the GPS time range".into(),
        ));
    }
    log::debug!(
        "{} of {} merged indices covered by at least one window",
        estimates.len(),
        timeline.len()
    );

    // Arithmetic mean over the windows covering each index, then Gaussian
    // smoothing on a time base relative to the first covered sample.
    let mut timestamps = Vec::with_capacity(estimates.len());
    let mut averaged = Vec::with_capacity(estimates.len());
    for (idx, speeds) in &estimates {
        timestamps.push(timeline.time_usec(*idx));
        averaged.push(mean(speeds));
    }
    let first_usec = timestamps[0];
    let seconds: Vec<f64> = timestamps
        .iter()
        .map(|&t| seconds_between(first_usec, t))
        .collect();
    let smoothed = smooth_time_series(&averaged, &seconds, &seconds, config.smoothing_sigma_sec);

    Ok(timestamps
        .into_iter()
        .zip(smoothed)
        .map(|(timestamp_usec, speed_m_s)| VelocityRecord {
            timestamp_usec,
            speed_m_s,
        })
        .collect())
}

/// Run every window and merge the per-worker estimate maps. Workers get
/// contiguous chunks of windows; estimate lists end up ordered by window
/// start regardless of the thread count.
fn optimize_windows(
    timeline: &MergedTimeline,
    gps: &[GpsSpeedSample],
    config: &FitConfig,
    spans: &[(usize, usize)],
) -> BTreeMap<usize, Vec<f64>> {
    let workers = if config.threads > 0 {
        config.threads
    } else {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }
    .min(spans.len());

    if workers <= 1 {
        let mut estimates = BTreeMap::new();
        for &span in spans {
            optimize_one_window(timeline, gps, config, span, &mut estimates);
        }
        return estimates;
    }

    let chunk_len = (spans.len() + workers - 1) / workers;
    let partials = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = spans
            .chunks(chunk_len)
            .map(|chunk| {
                scope.spawn(move |_| {
                    let mut estimates = BTreeMap::new();
                    for &span in chunk {
                        optimize_one_window(timeline, gps, config, span, &mut estimates);
                    }
                    estimates
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("window worker panicked"))
            .collect::<Vec<_>>()
    })
    .expect("window worker panicked");

    let mut estimates: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    for partial in partials {
        for (idx, mut speeds) in partial {
            estimates.entry(idx).or_default().append(&mut speeds);
        }
    }
    estimates
}

fn optimize_one_window(
    timeline: &MergedTimeline,
    gps: &[GpsSpeedSample],
    config: &FitConfig,
    (start, end): (usize, usize),
    estimates: &mut BTreeMap<usize, Vec<f64>>,
) {
    let objective = CalibrationObjective::new(timeline, &gps[start..end]);
    let lbfgs = LbfgsParams {
        max_iterations: config.max_optimizer_iterations,
        ..LbfgsParams::default()
    };
    let outcome = optimizer::minimize(&objective, &lbfgs);
    log::info!(
        "window {start}..{end}: {} iterations, cost {:.6e} -> {:.6e}",
        outcome.iterations,
        outcome.initial_cost,
        outcome.final_cost
    );
    if !outcome.converged {
        log::warn!("window {start}..{end} stopped before convergence, keeping best fit");
    }

    let params = CalibrationParams::from_vector(&outcome.solution);
    for (idx, point) in objective.integrate_trajectory(&params) {
        estimates.entry(idx).or_default().push(point.velocity.norm());
    }
}
