//! Gaussian-kernel smoothing for irregularly sampled scalar time series.

/// Smooth `values` sampled at `input_sec` onto the `output_sec` time grid.
///
/// Each output point is a weighted average of every input point with
/// weights `exp(-dt² / (2·sigma²))`, normalized to sum to 1. A constant
/// input series is therefore reproduced exactly.
pub fn smooth_time_series(
    values: &[f64],
    input_sec: &[f64],
    output_sec: &[f64],
    sigma_sec: f64,
) -> Vec<f64> {
    debug_assert_eq!(values.len(), input_sec.len());
    let inv_two_sigma_sq = 1.0 / (2.0 * sigma_sec * sigma_sec);

    output_sec
        .iter()
        .map(|&t_out| {
            let mut weighted = 0.0;
            let mut total = 0.0;
            for (&value, &t_in) in values.iter().zip(input_sec) {
                let dt = t_out - t_in;
                let weight = (-dt * dt * inv_two_sigma_sq).exp();
                weighted += weight * value;
                total += weight;
            }
            // Zero kernel mass only happens for an empty input series or
            // an output point absurdly far from every input sample.
            if total > 0.0 {
                weighted / total
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_series_unchanged() {
        let times: Vec<f64> = (0..50).map(|i| i as f64 * 0.02).collect();
        let values = vec![3.7; 50];
        let smoothed = smooth_time_series(&values, &times, &times, 0.05);
        assert_eq!(smoothed.len(), 50);
        for v in smoothed {
            assert_relative_eq!(v, 3.7, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_symmetric_neighbors_average_out() {
        // Midpoint between two equidistant samples gets their mean.
        let times = vec![0.0, 1.0];
        let values = vec![2.0, 4.0];
        let smoothed = smooth_time_series(&values, &times, &[0.5], 0.3);
        assert_relative_eq!(smoothed[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_narrow_kernel_keeps_samples() {
        // Sigma far below the sample spacing leaves the series alone.
        let times: Vec<f64> = (0..10).map(|i| i as f64 * 0.02).collect();
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let smoothed = smooth_time_series(&values, &times, &times, 0.0005);
        for (s, v) in smoothed.iter().zip(values.iter()) {
            assert_relative_eq!(s, v, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_wide_kernel_flattens_towards_mean() {
        let times: Vec<f64> = (0..5).map(|i| i as f64 * 0.1).collect();
        let values = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let smoothed = smooth_time_series(&values, &times, &times, 100.0);
        for v in smoothed {
            assert_relative_eq!(v, 2.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_output_grid_independent_of_input_grid() {
        let input = vec![0.0, 1.0, 2.0];
        let values = vec![1.0, 1.0, 1.0];
        let output = vec![0.25, 0.75, 1.5, 1.9];
        let smoothed = smooth_time_series(&values, &input, &output, 0.5);
        assert_eq!(smoothed.len(), 4);
        for v in smoothed {
            assert_relative_eq!(v, 1.0, epsilon = 1e-12);
        }
    }
}
