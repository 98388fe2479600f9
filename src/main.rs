use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use rust_cloud_matcher::config::{RawTrackerConfig, TrackerConfig};
use rust_cloud_matcher::io::CloudSequence;
use rust_cloud_matcher::system::CloudMatcher;

/// Track a depth sensor through a recorded point cloud sequence.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Recording directory containing data.csv and data/
    dataset: PathBuf,

    /// YAML parameter file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Publish per-frame delta poses
    #[arg(long, alias = "senddeltapose")]
    send_delta_pose: bool,

    /// Directory for tf.csv, path.csv and delta_pose.csv
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rust_cloud_matcher=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            TrackerConfig::from_yaml_file(path)?
        }
        None => TrackerConfig::resolve(RawTrackerConfig::default()),
    };
    if args.send_delta_pose {
        config.send_delta_pose = true;
    }

    let sequence = CloudSequence::new(&args.dataset)?;
    info!(
        "Loaded {} clouds from {}",
        sequence.len(),
        args.dataset.display()
    );

    let mut matcher = CloudMatcher::new(&config);
    if let Some(dir) = args.output {
        matcher.write_trajectory_to(dir)?;
    }

    let stats = matcher.run(&sequence)?;
    let writer = matcher.shutdown()?;

    let t = matcher.pose().translation;
    println!(
        "Done! {} frames ({} dropped, {} empty), {} registrations, {} failures, {} keyframes",
        stats.frames_received,
        stats.frames_dropped,
        stats.empty_frames,
        stats.registrations,
        stats.failures,
        stats.keyframes
    );
    println!("Final pose: [{:.3}, {:.3}, {:.3}]", t.x, t.y, t.z);
    if let Some(w) = writer {
        println!(
            "Wrote {} transforms, {} keyframes, {} delta poses ({} failed)",
            w.transforms, w.keyframes, w.delta_poses, w.failed_delta_poses
        );
    }

    Ok(())
}
