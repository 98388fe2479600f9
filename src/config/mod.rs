//! Tracker configuration.
//!
//! Parameters are read once at startup from an optional YAML file. Every
//! parameter may be absent: a missing value is replaced by its documented
//! default and reported with a warning, never an error.

use std::fmt::Display;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cloud::DEFAULT_PARTIAL_IMAGE_THRESHOLD;
use crate::registration::IcpConfig;

pub const DEFAULT_FIXED_FRAME: &str = "/world";
pub const DEFAULT_SENSOR_FRAME: &str = "/openni_rgb_optical_frame";

/// Fully resolved tracker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Frame the absolute pose is expressed in.
    pub fixed_frame: String,
    /// Frame of the sensor delivering the clouds.
    pub sensor_frame: String,
    /// Frames dropped at startup before tracking begins.
    pub startup_drop_count: u32,
    /// Emit a delta pose (or its failure) for every non-warm-up frame.
    pub send_delta_pose: bool,
    /// Valid-point count below which a frame is reported as partial.
    pub partial_image_threshold: usize,
    pub icp: IcpConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            fixed_frame: DEFAULT_FIXED_FRAME.to_string(),
            sensor_frame: DEFAULT_SENSOR_FRAME.to_string(),
            startup_drop_count: 0,
            send_delta_pose: false,
            partial_image_threshold: DEFAULT_PARTIAL_IMAGE_THRESHOLD,
            icp: IcpConfig::default(),
        }
    }
}

/// On-disk layout: every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTrackerConfig {
    pub fixed_frame: Option<String>,
    pub sensor_frame: Option<String>,
    pub startup_drop_count: Option<u32>,
    pub send_delta_pose: Option<bool>,
    pub partial_image_threshold: Option<usize>,
    #[serde(default)]
    pub icp: RawIcpConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIcpConfig {
    pub max_iterations: Option<u32>,
    pub max_correspondence_distance: Option<f64>,
    pub outlier_keep_ratio: Option<f64>,
    pub min_correspondences: Option<usize>,
    pub translation_epsilon: Option<f64>,
    pub rotation_epsilon: Option<f64>,
    pub max_translation_per_frame: Option<f64>,
    pub max_points: Option<usize>,
    pub ratio_to_switch_keyframe: Option<f64>,
}

impl TrackerConfig {
    /// Load from a YAML file and resolve defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Load from YAML text and resolve defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::resolve(RawTrackerConfig::default()));
        }
        // `~` is an explicit null document.
        let raw: Option<RawTrackerConfig> =
            serde_yaml::from_str(text).context("Failed to parse tracker configuration")?;
        Ok(Self::resolve(raw.unwrap_or_default()))
    }

    /// Substitute defaults for every missing parameter.
    pub fn resolve(raw: RawTrackerConfig) -> Self {
        let d = TrackerConfig::default();
        let di = d.icp;
        let ri = raw.icp;

        Self {
            fixed_frame: param("fixedFrame", raw.fixed_frame, d.fixed_frame),
            sensor_frame: param("sensorFrame", raw.sensor_frame, d.sensor_frame),
            startup_drop_count: param(
                "startupDropCount",
                raw.startup_drop_count,
                d.startup_drop_count,
            ),
            send_delta_pose: param("sendDeltaPose", raw.send_delta_pose, d.send_delta_pose),
            partial_image_threshold: param(
                "partialImageThreshold",
                raw.partial_image_threshold,
                d.partial_image_threshold,
            ),
            icp: IcpConfig {
                max_iterations: param("icp.maxIterations", ri.max_iterations, di.max_iterations),
                max_correspondence_distance: param(
                    "icp.maxCorrespondenceDistance",
                    ri.max_correspondence_distance,
                    di.max_correspondence_distance,
                ),
                outlier_keep_ratio: param(
                    "icp.outlierKeepRatio",
                    ri.outlier_keep_ratio,
                    di.outlier_keep_ratio,
                ),
                min_correspondences: param(
                    "icp.minCorrespondences",
                    ri.min_correspondences,
                    di.min_correspondences,
                ),
                translation_epsilon: param(
                    "icp.translationEpsilon",
                    ri.translation_epsilon,
                    di.translation_epsilon,
                ),
                rotation_epsilon: param(
                    "icp.rotationEpsilon",
                    ri.rotation_epsilon,
                    di.rotation_epsilon,
                ),
                max_translation_per_frame: param(
                    "icp.maxTranslationPerFrame",
                    ri.max_translation_per_frame,
                    di.max_translation_per_frame,
                ),
                max_points: param("icp.maxPoints", ri.max_points, di.max_points),
                ratio_to_switch_keyframe: param(
                    "icp.ratioToSwitchKeyframe",
                    ri.ratio_to_switch_keyframe,
                    di.ratio_to_switch_keyframe,
                ),
            },
        }
    }
}

fn param<T: Display>(name: &str, value: Option<T>, default: T) -> T {
    match value {
        Some(v) => {
            info!("Found parameter: {}, value: {}", name, v);
            v
        }
        None => {
            warn!(
                "Cannot find value for parameter: {}, assigning default: {}",
                name, default
            );
            default
        }
    }
}
