use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use velofit::fusion::{fuse_velocities, FitConfig};
use velofit::steering::{horizontal_turn_angles, principal_rotation_axis, PCA_SAMPLE_LIMIT};
use velofit::timeline::MergedTimeline;
use velofit::io;
use velofit::types::SteeringRecord;

#[derive(Parser, Debug)]
#[command(name = "velofit")]
#[command(about = "Fit vehicle speed and steering from raw IMU and GPS logs", long_about = None)]
struct Args {
    /// Angular velocity JSON log (plain or .gz)
    #[arg(long)]
    rotations: PathBuf,

    /// Acceleration JSON log (plain or .gz)
    #[arg(long)]
    accelerations: PathBuf,

    /// GPS JSON log with speeds (plain or .gz)
    #[arg(long)]
    locations: PathBuf,

    /// Output path for the steering angle series
    #[arg(long)]
    steering_out: PathBuf,

    /// Output path for the fused velocity series
    #[arg(long)]
    velocities_out: PathBuf,

    /// GPS samples per calibration window
    #[arg(long, default_value = "40")]
    window_size: usize,

    /// GPS samples between consecutive window starts
    #[arg(long, default_value = "5")]
    stride: usize,

    /// L-BFGS iteration cap per window
    #[arg(long, default_value = "500")]
    max_optimizer_iterations: usize,

    /// Gaussian smoothing kernel width in seconds
    #[arg(long, default_value = "0.003")]
    smoothing_sigma_sec: f64,

    /// Worker threads for window optimization (0 = one per core)
    #[arg(long, default_value = "0")]
    threads: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = FitConfig {
        window_size: args.window_size,
        stride: args.stride,
        max_optimizer_iterations: args.max_optimizer_iterations,
        smoothing_sigma_sec: args.smoothing_sigma_sec,
        threads: args.threads,
    };
    config.validate()?;

    let rotations = io::read_rotations(&args.rotations)?;
    let accelerations = io::read_accelerations(&args.accelerations)?;
    let locations = io::read_locations(&args.locations)?;
    log::info!(
        "loaded {} rotations, {} accelerations, {} GPS fixes",
        rotations.len(),
        accelerations.len(),
        locations.len()
    );

    let axis = principal_rotation_axis(&rotations, PCA_SAMPLE_LIMIT);
    log::info!(
        "dominant rotation axis: [{:.4}, {:.4}, {:.4}]",
        axis.x,
        axis.y,
        axis.z
    );
    let steering: Vec<SteeringRecord> = rotations
        .iter()
        .zip(horizontal_turn_angles(&rotations, &axis))
        .map(|(sample, angular_value)| SteeringRecord {
            timestamp_usec: sample.timestamp_usec,
            angular_value,
        })
        .collect();

    let timeline = MergedTimeline::new(rotations, accelerations)?;
    log::info!("merged inertial timeline: {} samples", timeline.len());
    let velocities = fuse_velocities(&timeline, &locations, &config)?;

    // Nothing is written until the whole fit has succeeded.
    io::write_steering(&args.steering_out, &steering)?;
    io::write_velocities(&args.velocities_out, &velocities)?;
    log::info!(
        "wrote {} steering records to {} and {} velocity records to {}",
        steering.len(),
        args.steering_out.display(),
        velocities.len(),
        args.velocities_out.display()
    );
    Ok(())
}
