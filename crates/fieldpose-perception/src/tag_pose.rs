//! Tag Pose Reconstructor.
//!
//! Turns the freshest raw tag detection into an absolute field-frame
//! [`Pose2d`] using the tag's known placement and the fixed camera mount
//! offset.
//!
//! For a detection of a registered tag:
//! ```text
//! m       = +1 if id >= audience_side_min_id else -1
//! x       = tag.x + (forward - offset.y) *  m
//! y       = tag.y + (strafe  - offset.x) * -m
//! heading = to_radians((audience ? 0 : 180) + yaw_deg)
//! ```
//!
//! Recomputation is throttled by a [`SamplingThrottle`] so the detector is
//! only consulted every `step_size` polls; every other poll yields `None`.
//!
//! When a batch contains several usable detections the last one processed
//! wins.  There is no confidence weighting.
//! [`DetectionAggregation::Mean`] can be selected instead.

use std::sync::Arc;

use fieldpose_hal::{RawTagDetection, TagDetector};
use fieldpose_types::{LensIntrinsics, Pose2d, PoseError, TagPoseEntry, Vector2d};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::estimator::ProducesTagPose;
use crate::tag_library::TagPoseLibrary;

/// Camera lens to drivetrain centre (inches).
pub const DEFAULT_MOUNT_OFFSET: Vector2d = Vector2d::new(0.0, -7.5);

/// Polls between recomputes.
pub const DEFAULT_STEP_SIZE: u32 = 100;

/// Tags with an id at or above this are on the audience wall.
pub const DEFAULT_AUDIENCE_SIDE_MIN_ID: u32 = 7;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// How several usable detections in one batch are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionAggregation {
    /// Keep only the last detection processed.
    #[default]
    LastWins,
    /// Average positions and take the circular mean of headings.
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagPoseConfig {
    pub mount_offset: Vector2d,
    pub step_size: u32,
    pub audience_side_min_id: u32,
    pub aggregation: DetectionAggregation,
    /// Passed through to the detector on [`ProducesTagPose::create_vision_sensor`].
    pub intrinsics: LensIntrinsics,
}

impl Default for TagPoseConfig {
    fn default() -> Self {
        Self {
            mount_offset: DEFAULT_MOUNT_OFFSET,
            step_size: DEFAULT_STEP_SIZE,
            audience_side_min_id: DEFAULT_AUDIENCE_SIDE_MIN_ID,
            aggregation: DetectionAggregation::default(),
            intrinsics: LensIntrinsics::default(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SamplingThrottle
// ────────────────────────────────────────────────────────────────────────────

/// Call counter gating how often a full recompute runs.
///
/// The first call after construction fires; after that exactly one call in
/// every `threshold` fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingThrottle {
    count: u32,
    threshold: u32,
}

impl SamplingThrottle {
    /// `threshold` of 0 is treated as 1 (fire on every call).
    pub fn new(threshold: u32) -> Self {
        let threshold = threshold.max(1);
        Self {
            count: threshold - 1,
            threshold,
        }
    }

    /// Register one call.  Returns `true` when this call should recompute,
    /// in which case the counter is reset to 0.
    pub fn ready(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.threshold {
            self.count = 0;
            true
        } else {
            false
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Reconstruction
// ────────────────────────────────────────────────────────────────────────────

/// Which wall a tag is mounted on.  Picks the sign convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSide {
    Audience,
    Backdrop,
}

impl FieldSide {
    pub fn classify(tag_id: u32, audience_side_min_id: u32) -> Self {
        if tag_id >= audience_side_min_id {
            FieldSide::Audience
        } else {
            FieldSide::Backdrop
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            FieldSide::Audience => 1.0,
            FieldSide::Backdrop => -1.0,
        }
    }

    /// Robot heading (degrees) when squarely facing a tag on this side.
    pub fn base_heading_deg(self) -> f64 {
        match self {
            FieldSide::Audience => 0.0,
            FieldSide::Backdrop => 180.0,
        }
    }
}

/// Field pose of the robot given one detection of a known tag.
pub fn reconstruct_pose(
    tag: &TagPoseEntry,
    detection: &RawTagDetection,
    mount_offset: Vector2d,
    side: FieldSide,
) -> Pose2d {
    let m = side.multiplier();
    let rel = detection.camera_relative;
    Pose2d::new(
        tag.field_position.x + (rel.forward - mount_offset.y) * m,
        tag.field_position.y + (rel.strafe - mount_offset.x) * -m,
        (side.base_heading_deg() + rel.yaw_deg).to_radians(),
    )
}

fn mean_pose(poses: &[Pose2d]) -> Option<Pose2d> {
    if poses.is_empty() {
        return None;
    }
    let n = poses.len() as f64;
    let (sx, sy, ss, sc) = poses.iter().fold((0.0, 0.0, 0.0, 0.0), |(sx, sy, ss, sc), p| {
        (sx + p.x, sy + p.y, ss + p.heading.sin(), sc + p.heading.cos())
    });
    Some(Pose2d::new(sx / n, sy / n, ss.atan2(sc)))
}

// ────────────────────────────────────────────────────────────────────────────
// TagPoseReconstructor
// ────────────────────────────────────────────────────────────────────────────

pub struct TagPoseReconstructor {
    detector: Box<dyn TagDetector>,
    library: Arc<TagPoseLibrary>,
    config: TagPoseConfig,
    throttle: SamplingThrottle,
    sensor_ready: bool,
}

impl TagPoseReconstructor {
    /// The detector is not opened here; call
    /// [`create_vision_sensor`][ProducesTagPose::create_vision_sensor] once
    /// before polling.
    pub fn new(detector: Box<dyn TagDetector>, library: Arc<TagPoseLibrary>, config: TagPoseConfig) -> Self {
        Self {
            detector,
            library,
            throttle: SamplingThrottle::new(config.step_size),
            config,
            sensor_ready: false,
        }
    }

    pub fn config(&self) -> &TagPoseConfig {
        &self.config
    }

    pub fn library(&self) -> &TagPoseLibrary {
        &self.library
    }

    /// Reconstruct a pose from every usable detection in `batch`, combined
    /// according to the configured [`DetectionAggregation`].
    ///
    /// Detections without metadata, or whose id is not in the library, are
    /// skipped.
    pub fn pose_from_batch(&self, batch: &[RawTagDetection]) -> Option<Pose2d> {
        let poses = batch
            .iter()
            .filter(|d| d.has_metadata)
            .filter_map(|d| {
                let tag = self.library.lookup(d.id)?;
                let side = FieldSide::classify(d.id, self.config.audience_side_min_id);
                Some(reconstruct_pose(tag, d, self.config.mount_offset, side))
            });

        match self.config.aggregation {
            DetectionAggregation::LastWins => poses.last(),
            DetectionAggregation::Mean => mean_pose(&poses.collect::<Vec<_>>()),
        }
    }
}

impl ProducesTagPose for TagPoseReconstructor {
    fn create_vision_sensor(&mut self) -> Result<(), PoseError> {
        if self.sensor_ready {
            return Err(PoseError::AlreadyStarted(format!(
                "vision sensor '{}'",
                self.detector.id()
            )));
        }
        self.detector
            .open(&self.config.intrinsics, &self.library.entries())?;
        self.sensor_ready = true;
        info!(
            detector = %self.detector.id(),
            layout = %self.library.name(),
            step_size = self.throttle.threshold(),
            "vision sensor ready"
        );
        Ok(())
    }

    fn estimate(&mut self, _localizer_pose: Pose2d) -> Option<Pose2d> {
        if !self.sensor_ready || !self.throttle.ready() {
            return None;
        }

        let batch = self.detector.raw_detections();
        let estimate = self.pose_from_batch(&batch);
        debug!(detections = batch.len(), ?estimate, "tag pose recompute");
        estimate
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_library::CenterStageLayout;
    use fieldpose_hal::sim::{SimTagDetector, SimTagFeed};

    const EPS: f64 = 1e-9;

    fn library() -> Arc<TagPoseLibrary> {
        Arc::new(TagPoseLibrary::from_layout(&CenterStageLayout).unwrap())
    }

    fn reconstructor(config: TagPoseConfig) -> (TagPoseReconstructor, SimTagFeed) {
        let detector = SimTagDetector::new("webcam_1");
        let feed = detector.feed();
        let mut r = TagPoseReconstructor::new(Box::new(detector), library(), config);
        r.create_vision_sensor().unwrap();
        (r, feed)
    }

    fn assert_pose(actual: Pose2d, x: f64, y: f64, heading: f64) {
        assert!((actual.x - x).abs() < EPS, "x: {} != {}", actual.x, x);
        assert!((actual.y - y).abs() < EPS, "y: {} != {}", actual.y, y);
        assert!(
            (actual.heading - heading).abs() < EPS,
            "heading: {} != {}",
            actual.heading,
            heading
        );
    }

    #[test]
    fn backdrop_tag_reconstruction() {
        let lib = library();
        let det = RawTagDetection::new(1, 10.0, 2.0, 5.0);
        let side = FieldSide::classify(1, DEFAULT_AUDIENCE_SIDE_MIN_ID);
        assert_eq!(side, FieldSide::Backdrop);

        let pose = reconstruct_pose(lib.lookup(1).unwrap(), &det, DEFAULT_MOUNT_OFFSET, side);
        assert_pose(pose, 44.25, 43.41, 185f64.to_radians());
    }

    #[test]
    fn audience_tag_reconstruction() {
        let lib = library();
        let det = RawTagDetection::new(8, 5.0, 0.0, 0.0);
        let side = FieldSide::classify(8, DEFAULT_AUDIENCE_SIDE_MIN_ID);
        assert_eq!(side, FieldSide::Audience);

        let pose = reconstruct_pose(lib.lookup(8).unwrap(), &det, DEFAULT_MOUNT_OFFSET, side);
        assert_pose(pose, -57.75, -35.125, 0.0);
    }

    #[test]
    fn side_boundary_is_inclusive() {
        assert_eq!(FieldSide::classify(6, 7), FieldSide::Backdrop);
        assert_eq!(FieldSide::classify(7, 7), FieldSide::Audience);
    }

    #[test]
    fn throttle_fires_once_per_step() {
        let mut throttle = SamplingThrottle::new(100);
        assert!(throttle.ready(), "first call recomputes");
        assert_eq!(throttle.count(), 0);
        for call in 1..100 {
            assert!(!throttle.ready(), "call {call} must be throttled");
            assert_eq!(throttle.count(), call);
        }
        assert!(throttle.ready(), "call 100 recomputes");
        assert_eq!(throttle.count(), 0);
    }

    #[test]
    fn throttle_zero_step_fires_every_call() {
        let mut throttle = SamplingThrottle::new(0);
        assert!(throttle.ready());
        assert!(throttle.ready());
    }

    #[test]
    fn estimate_is_throttled() {
        let (mut r, feed) = reconstructor(TagPoseConfig::default());
        feed.publish(vec![RawTagDetection::new(8, 5.0, 0.0, 0.0)]);
        let input = Pose2d::new(1.0, 1.0, 0.0);

        assert!(r.estimate(input).is_some());
        for _ in 1..100 {
            assert!(r.estimate(input).is_none());
        }
        let pose = r.estimate(input).unwrap();
        assert_pose(pose, -57.75, -35.125, 0.0);
    }

    #[test]
    fn estimate_before_sensor_created_is_none() {
        let detector = SimTagDetector::new("webcam_1");
        detector.feed().publish(vec![RawTagDetection::new(1, 10.0, 2.0, 5.0)]);
        let config = TagPoseConfig {
            step_size: 1,
            ..TagPoseConfig::default()
        };
        let mut r = TagPoseReconstructor::new(Box::new(detector), library(), config);
        assert!(r.estimate(Pose2d::default()).is_none());
    }

    #[test]
    fn create_vision_sensor_fails_fast_without_camera() {
        let detector = SimTagDetector::new("webcam_1").disconnected();
        let mut r = TagPoseReconstructor::new(Box::new(detector), library(), TagPoseConfig::default());
        assert!(matches!(
            r.create_vision_sensor(),
            Err(PoseError::SensorUnavailable { .. })
        ));
    }

    #[test]
    fn create_vision_sensor_twice_is_rejected() {
        let (mut r, _feed) = reconstructor(TagPoseConfig::default());
        assert!(matches!(
            r.create_vision_sensor(),
            Err(PoseError::AlreadyStarted(_))
        ));
    }

    #[test]
    fn empty_batch_yields_no_estimate() {
        let (mut r, feed) = reconstructor(TagPoseConfig {
            step_size: 1,
            ..TagPoseConfig::default()
        });
        feed.clear();
        assert!(r.estimate(Pose2d::default()).is_none());
    }

    #[test]
    fn unregistered_and_metadata_less_detections_are_ignored() {
        let (mut r, feed) = reconstructor(TagPoseConfig {
            step_size: 1,
            ..TagPoseConfig::default()
        });
        feed.publish(vec![
            RawTagDetection::without_metadata(2),
            RawTagDetection::new(42, 1.0, 1.0, 1.0),
        ]);
        assert!(r.estimate(Pose2d::default()).is_none());

        feed.publish(vec![
            RawTagDetection::new(8, 5.0, 0.0, 0.0),
            RawTagDetection::new(42, 1.0, 1.0, 1.0),
        ]);
        assert_pose(r.estimate(Pose2d::default()).unwrap(), -57.75, -35.125, 0.0);
    }

    #[test]
    fn last_detection_in_batch_wins() {
        let (mut r, feed) = reconstructor(TagPoseConfig {
            step_size: 1,
            ..TagPoseConfig::default()
        });
        feed.publish(vec![
            RawTagDetection::new(1, 10.0, 2.0, 5.0),
            RawTagDetection::new(8, 5.0, 0.0, 0.0),
        ]);
        assert_pose(r.estimate(Pose2d::default()).unwrap(), -57.75, -35.125, 0.0);
    }

    #[test]
    fn mean_aggregation_averages_detections() {
        let (r, _feed) = reconstructor(TagPoseConfig {
            step_size: 1,
            aggregation: DetectionAggregation::Mean,
            ..TagPoseConfig::default()
        });
        // Tags 8 and 9 differ only in y (-35.125 vs 35.125).
        let pose = r
            .pose_from_batch(&[
                RawTagDetection::new(8, 5.0, 0.0, 10.0),
                RawTagDetection::new(9, 5.0, 0.0, -10.0),
            ])
            .unwrap();
        assert_pose(pose, -57.75, 0.0, 0.0);
    }

    #[test]
    fn mount_offset_is_configurable() {
        let (r, _feed) = reconstructor(TagPoseConfig {
            mount_offset: Vector2d::new(1.0, 0.0),
            ..TagPoseConfig::default()
        });
        let pose = r
            .pose_from_batch(&[RawTagDetection::new(8, 5.0, 0.0, 0.0)])
            .unwrap();
        // x = -70.25 + 5 * 1, y = -35.125 + (0 - 1) * -1
        assert_pose(pose, -65.25, -34.125, 0.0);
    }

    #[test]
    fn intrinsics_pass_through_to_detector() {
        let intrinsics = LensIntrinsics {
            fx: 500.0,
            fy: 501.0,
            cx: 320.0,
            cy: 240.0,
        };
        let (_r, feed) = reconstructor(TagPoseConfig {
            intrinsics,
            ..TagPoseConfig::default()
        });
        assert_eq!(feed.opened_with(), Some(intrinsics));
    }
}
