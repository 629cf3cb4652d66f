//! Configuration vault: reads and writes `~/.fieldpose/config.toml`.
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! stock robot setup: the Center Stage tag layout, the C920 calibration and
//! a camera 7.5 in behind the robot centre.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fieldpose_perception::tag_library::{CenterStageLayout, TableLayout, TagPoseLibrary};
use fieldpose_perception::tag_pose::{
    DEFAULT_AUDIENCE_SIDE_MIN_ID, DEFAULT_MOUNT_OFFSET, DEFAULT_STEP_SIZE, DetectionAggregation, TagPoseConfig,
};
use fieldpose_perception::HeadingConfig;
use fieldpose_types::{LensIntrinsics, PoseError, TagPoseEntry, Vector2d};
use serde::{Deserialize, Serialize};

/// Camera mounting and lens calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Lateral camera offset from the robot centre (inches).
    #[serde(default = "default_offset_x")]
    pub offset_x: f64,
    /// Forward camera offset from the robot centre (inches).
    #[serde(default = "default_offset_y")]
    pub offset_y: f64,
    #[serde(default)]
    pub intrinsics: LensIntrinsics,
}

fn default_offset_x() -> f64 {
    DEFAULT_MOUNT_OFFSET.x
}
fn default_offset_y() -> f64 {
    DEFAULT_MOUNT_OFFSET.y
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            offset_x: default_offset_x(),
            offset_y: default_offset_y(),
            intrinsics: LensIntrinsics::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TagPoseSettings {
    /// Recompute once every this many polls.
    #[serde(default = "default_step_size")]
    pub step_size: u32,
    /// Tags with an id at or above this sit on the audience wall.
    #[serde(default = "default_audience_side_min_id")]
    pub audience_side_min_id: u32,
    #[serde(default)]
    pub aggregation: DetectionAggregation,
}

fn default_step_size() -> u32 {
    DEFAULT_STEP_SIZE
}
fn default_audience_side_min_id() -> u32 {
    DEFAULT_AUDIENCE_SIDE_MIN_ID
}

impl Default for TagPoseSettings {
    fn default() -> Self {
        Self {
            step_size: default_step_size(),
            audience_side_min_id: default_audience_side_min_id(),
            aggregation: DetectionAggregation::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingSettings {
    #[serde(default = "default_sample_period_ms")]
    pub sample_period_ms: u64,
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

fn default_sample_period_ms() -> u64 {
    10
}
fn default_stale_after_ms() -> u64 {
    500
}
fn default_max_consecutive_failures() -> u32 {
    5
}

impl Default for HeadingSettings {
    fn default() -> Self {
        Self {
            sample_period_ms: default_sample_period_ms(),
            stale_after_ms: default_stale_after_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

/// Persisted configuration stored in `~/.fieldpose/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPoseConfig {
    /// Period of the estimator polling loop.
    #[serde(default = "default_loop_period_ms")]
    pub loop_period_ms: u64,

    #[serde(default)]
    pub camera: CameraSettings,

    #[serde(default)]
    pub tag_pose: TagPoseSettings,

    #[serde(default)]
    pub heading: HeadingSettings,

    /// Custom tag placements.  Empty means the built-in Center Stage layout.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagPoseEntry>,
}

fn default_loop_period_ms() -> u64 {
    5
}

impl Default for FieldPoseConfig {
    fn default() -> Self {
        Self {
            loop_period_ms: default_loop_period_ms(),
            camera: CameraSettings::default(),
            tag_pose: TagPoseSettings::default(),
            heading: HeadingSettings::default(),
            tags: Vec::new(),
        }
    }
}

impl FieldPoseConfig {
    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms.max(1))
    }

    pub fn tag_pose_config(&self) -> TagPoseConfig {
        TagPoseConfig {
            mount_offset: Vector2d::new(self.camera.offset_x, self.camera.offset_y),
            step_size: self.tag_pose.step_size,
            audience_side_min_id: self.tag_pose.audience_side_min_id,
            aggregation: self.tag_pose.aggregation,
            intrinsics: self.camera.intrinsics,
        }
    }

    /// Heading stage settings, clamped by [`HeadingConfig::sanitized`] so
    /// `stale_after` always spans several sample periods.
    pub fn heading_config(&self) -> HeadingConfig {
        HeadingConfig {
            sample_period: Duration::from_millis(self.heading.sample_period_ms),
            stale_after: Duration::from_millis(self.heading.stale_after_ms),
            max_consecutive_failures: self.heading.max_consecutive_failures,
        }
        .sanitized()
    }

    /// Build the tag library: the `[[tags]]` table if present, otherwise the
    /// Center Stage layout.
    ///
    /// # Errors
    ///
    /// [`PoseError::DuplicateTag`] if `[[tags]]` repeats an id.
    pub fn tag_library(&self) -> Result<TagPoseLibrary, PoseError> {
        if self.tags.is_empty() {
            TagPoseLibrary::from_layout(&CenterStageLayout)
        } else {
            TagPoseLibrary::from_layout(&TableLayout::new("custom", self.tags.clone()))
        }
    }
}

/// Return the path to `~/.fieldpose/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".fieldpose").join("config.toml")
}

/// Load the config from the default location.  `None` if there is no file.
pub fn load() -> Result<Option<FieldPoseConfig>, PoseError> {
    load_from(&config_path())
}

/// Load the config from `path`, then apply environment overrides.
pub fn load_from(path: &Path) -> Result<Option<FieldPoseConfig>, PoseError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| PoseError::Config(format!("failed to read {}: {e}", path.display())))?;
    let mut cfg: FieldPoseConfig = toml::from_str(&raw)
        .map_err(|e| PoseError::Config(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `FIELDPOSE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `FIELDPOSE_STEP_SIZE` | `tag_pose.step_size` |
/// | `FIELDPOSE_OFFSET_X` | `camera.offset_x` |
/// | `FIELDPOSE_OFFSET_Y` | `camera.offset_y` |
/// | `FIELDPOSE_LOOP_PERIOD_MS` | `loop_period_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut FieldPoseConfig) {
    if let Ok(v) = std::env::var("FIELDPOSE_STEP_SIZE")
        && let Ok(step) = v.parse::<u32>()
    {
        cfg.tag_pose.step_size = step;
    }
    if let Ok(v) = std::env::var("FIELDPOSE_OFFSET_X")
        && let Ok(offset) = v.parse::<f64>()
    {
        cfg.camera.offset_x = offset;
    }
    if let Ok(v) = std::env::var("FIELDPOSE_OFFSET_Y")
        && let Ok(offset) = v.parse::<f64>()
    {
        cfg.camera.offset_y = offset;
    }
    if let Ok(v) = std::env::var("FIELDPOSE_LOOP_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.loop_period_ms = ms;
    }
}

/// Save the config to the default location.
pub fn save(cfg: &FieldPoseConfig) -> Result<(), PoseError> {
    save_to(cfg, &config_path())
}

/// Save the config to `path`, creating parent directories as needed.
pub fn save_to(cfg: &FieldPoseConfig, path: &Path) -> Result<(), PoseError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PoseError::Config(format!("failed to create {}: {e}", parent.display())))?;
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| PoseError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| PoseError::Config(format!("failed to write {}: {e}", path.display())))
}
