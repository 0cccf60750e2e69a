//! Principal rotation axis and horizontal turn angle extraction.
//!
//! A road vehicle rotates mostly about its vertical (yaw) axis, so the
//! dominant principal component of the gyroscope samples approximates
//! that axis. Projecting every angular-velocity sample onto it gives the
//! in-plane turn rate, whose integral is the steering signal.

use nalgebra::{Matrix3, Vector3};

use crate::types::{seconds_between, ImuSample};

/// Cap on samples entering the covariance accumulation. Longer logs are
/// axis-estimated from their prefix.
pub const PCA_SAMPLE_LIMIT: usize = 500_000;

/// Threshold below which the dominant eigenvalue is treated as noise.
const MIN_DOMINANT_EIGENVALUE: f64 = 1e-12;

/// Dominant rotation axis of the recording, unit length.
///
/// Computes the mean-centered covariance of the first
/// `min(max_samples, len)` angular-velocity vectors and returns its
/// dominant eigenvector. Degenerate data (for example a stationary log
/// with no rotational energy) falls back to +Z with a warning so the
/// steering output stays deterministic.
pub fn principal_rotation_axis(rotations: &[ImuSample], max_samples: usize) -> Vector3<f64> {
    let count = rotations.len().min(max_samples);
    if count == 0 {
        return Vector3::z();
    }

    let mut mean = Vector3::zeros();
    for sample in &rotations[..count] {
        mean += sample.vector();
    }
    mean /= count as f64;

    let mut covariance = Matrix3::zeros();
    for sample in &rotations[..count] {
        let centered = sample.vector() - mean;
        covariance += centered * centered.transpose();
    }
    covariance /= count as f64;

    let eigen = covariance.symmetric_eigen();
    let mut dominant = 0;
    for i in 1..3 {
        if eigen.eigenvalues[i] > eigen.eigenvalues[dominant] {
            dominant = i;
        }
    }

    if eigen.eigenvalues[dominant] < MIN_DOMINANT_EIGENVALUE {
        log::warn!("rotation data has no dominant axis, falling back to +Z");
        return Vector3::z();
    }
    eigen.eigenvectors.column(dominant).normalize()
}

/// Accumulated heading angle at every rotation sample.
///
/// The turn rate is the projection of each angular-velocity sample onto
/// `axis`; forward-Euler integration over the sample intervals yields a
/// running angle anchored at zero on the first sample. Output length
/// equals input length.
pub fn horizontal_turn_angles(rotations: &[ImuSample], axis: &Vector3<f64>) -> Vec<f64> {
    let mut angles = Vec::with_capacity(rotations.len());
    let mut angle = 0.0;
    for (i, sample) in rotations.iter().enumerate() {
        if i > 0 {
            let previous = &rotations[i - 1];
            let dt = seconds_between(previous.timestamp_usec, sample.timestamp_usec);
            angle += previous.vector().dot(axis) * dt;
        }
        angles.push(angle);
    }
    angles
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rotation(v: Vector3<f64>, timestamp_usec: i64) -> ImuSample {
        ImuSample {
            x: v.x,
            y: v.y,
            z: v.z,
            timestamp_usec,
        }
    }

    #[test]
    fn test_axis_recovered_from_single_axis_rotation() {
        // Yaw-only motion with varying rate; the axis comes back up to sign.
        let axis = Vector3::new(0.0, 0.0, 1.0);
        let samples: Vec<ImuSample> = (0..200)
            .map(|i| {
                let rate = 0.5 * (i as f64 * 0.1).sin();
                rotation(axis * rate, i * 20_000)
            })
            .collect();

        let recovered = principal_rotation_axis(&samples, PCA_SAMPLE_LIMIT);
        assert_relative_eq!(recovered.dot(&axis).abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_axis_recovered_off_cardinal_directions() {
        let axis = Vector3::new(1.0, 1.0, 0.2).normalize();
        let samples: Vec<ImuSample> = (0..500)
            .map(|i| {
                let rate = 0.3 * (i as f64 * 0.07).cos() + 0.1;
                rotation(axis * rate, i * 20_000)
            })
            .collect();

        let recovered = principal_rotation_axis(&samples, PCA_SAMPLE_LIMIT);
        assert_relative_eq!(recovered.dot(&axis).abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sample_limit_bounds_the_prefix() {
        // First 100 samples rotate about Z, the rest about X; with the
        // limit in place only the prefix decides the axis.
        let mut samples: Vec<ImuSample> = (0..100)
            .map(|i| rotation(Vector3::new(0.0, 0.0, 0.4 * ((i % 7) as f64 - 3.0)), i * 20_000))
            .collect();
        samples.extend(
            (100..1000).map(|i| rotation(Vector3::new(2.0 * ((i % 5) as f64 - 2.0), 0.0, 0.0), i * 20_000)),
        );

        let recovered = principal_rotation_axis(&samples, 100);
        assert_relative_eq!(recovered.z.abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_stationary_log_falls_back_to_z() {
        let samples: Vec<ImuSample> =
            (0..50).map(|i| rotation(Vector3::zeros(), i * 20_000)).collect();
        let recovered = principal_rotation_axis(&samples, PCA_SAMPLE_LIMIT);
        assert_relative_eq!(recovered.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_rate_integrates_linearly() {
        // 0.1 rad/s about Z for 10 seconds at 50 Hz.
        let samples: Vec<ImuSample> = (0..501)
            .map(|i| rotation(Vector3::new(0.0, 0.0, 0.1), i * 20_000))
            .collect();
        let angles = horizontal_turn_angles(&samples, &Vector3::z());

        assert_eq!(angles.len(), samples.len());
        assert_relative_eq!(angles[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(angles[500], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_off_axis_rotation_does_not_turn() {
        let samples: Vec<ImuSample> = (0..100)
            .map(|i| rotation(Vector3::new(0.7, -0.3, 0.0), i * 20_000))
            .collect();
        let angles = horizontal_turn_angles(&samples, &Vector3::z());
        for angle in angles {
            assert_relative_eq!(angle, 0.0, epsilon = 1e-12);
        }
    }
}
