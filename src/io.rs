//! JSON input/output for recorded sensor logs.
//!
//! Inputs may be plain `.json` or gzip-compressed `.json.gz`; the format
//! is detected from the file extension. All streams are validated eagerly
//! so malformed data fails the run before any optimization starts.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{FitError, FitResult};
use crate::types::{GpsSpeedSample, ImuSample, SteeringRecord, VelocityRecord};

#[derive(Deserialize)]
struct RotationsFile {
    rotations: Vec<ImuSample>,
}

#[derive(Deserialize)]
struct AccelerationsFile {
    accelerations: Vec<ImuSample>,
}

#[derive(Deserialize)]
struct LocationsFile {
    locations: Vec<GpsSpeedSample>,
}

#[derive(Serialize)]
struct SteeringFile<'a> {
    steering: &'a [SteeringRecord],
}

#[derive(Serialize)]
struct VelocitiesFile<'a> {
    velocities: &'a [VelocityRecord],
}

fn read_json<T: DeserializeOwned>(path: &Path) -> FitResult<T> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let gz = GzDecoder::new(file);
        let reader = BufReader::new(gz);
        Ok(serde_json::from_reader(reader)?)
    } else {
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Read the gyroscope log (top-level key `rotations`).
pub fn read_rotations(path: &Path) -> FitResult<Vec<ImuSample>> {
    let file: RotationsFile = read_json(path)?;
    validate_imu_stream(&file.rotations, "rotations")?;
    Ok(file.rotations)
}

/// Read the accelerometer log (top-level key `accelerations`).
pub fn read_accelerations(path: &Path) -> FitResult<Vec<ImuSample>> {
    let file: AccelerationsFile = read_json(path)?;
    validate_imu_stream(&file.accelerations, "accelerations")?;
    Ok(file.accelerations)
}

/// Read the GPS log (top-level key `locations`).
pub fn read_locations(path: &Path) -> FitResult<Vec<GpsSpeedSample>> {
    let file: LocationsFile = read_json(path)?;
    validate_gps_stream(&file.locations)?;
    Ok(file.locations)
}

pub fn write_steering(path: &Path, records: &[SteeringRecord]) -> FitResult<()> {
    let json = serde_json::to_string_pretty(&SteeringFile { steering: records })?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn write_velocities(path: &Path, records: &[VelocityRecord]) -> FitResult<()> {
    let json = serde_json::to_string_pretty(&VelocitiesFile {
        velocities: records,
    })?;
    std::fs::write(path, json)?;
    Ok(())
}

fn validate_imu_stream(samples: &[ImuSample], name: &str) -> FitResult<()> {
    if samples.is_empty() {
        return Err(FitError::Data(format!("{name} stream is empty")));
    }
    for pair in samples.windows(2) {
        if pair[1].timestamp_usec < pair[0].timestamp_usec {
            return Err(FitError::Data(format!(
                "{name} timestamps decrease: {} -> {}",
                pair[0].timestamp_usec, pair[1].timestamp_usec
            )));
        }
    }
    for sample in samples {
        if !(sample.x.is_finite() && sample.y.is_finite() && sample.z.is_finite()) {
            return Err(FitError::Data(format!(
                "{name} sample at {} has non-finite components",
                sample.timestamp_usec
            )));
        }
    }
    Ok(())
}

fn validate_gps_stream(samples: &[GpsSpeedSample]) -> FitResult<()> {
    if samples.is_empty() {
        return Err(FitError::Data("locations stream is empty".to_string()));
    }
    for pair in samples.windows(2) {
        if pair[1].timestamp_usec < pair[0].timestamp_usec {
            return Err(FitError::Data(format!(
                "locations timestamps decrease: {} -> {}",
                pair[0].timestamp_usec, pair[1].timestamp_usec
            )));
        }
    }
    for sample in samples {
        if !sample.speed_m_s.is_finite() || sample.speed_m_s < 0.0 {
            return Err(FitError::Data(format!(
                "GPS speed {} at {} is not a non-negative finite number",
                sample.speed_m_s, sample.timestamp_usec
            )));
        }
    }
    Ok(())
}
