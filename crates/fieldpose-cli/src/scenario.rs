//! Scripted drive used to exercise the estimator against simulated hardware.
//!
//! The robot starts four feet from one tag, squarely facing it, and creeps
//! towards it.  Odometry over-reports travel and slowly drifts sideways, so
//! the localizer wanders off unless tag fixes pull it back.

use fieldpose_hal::sim::{SimImuHandle, SimLocalizer, SimTagFeed};
use fieldpose_hal::RawTagDetection;
use fieldpose_perception::tag_pose::FieldSide;
use fieldpose_types::{Angle, Pose2d, TagPoseEntry, Vector2d};

const START_RANGE: f64 = 48.0;
/// Closest the camera can be and still see the whole tag.
const MIN_RANGE: f64 = 6.0;
const SPEED_PER_TICK: f64 = 0.02;
const ODOMETRY_SCALE: f64 = 1.03;
const ODOMETRY_SIDE_DRIFT: f64 = 0.002;

pub struct DriveScenario {
    tag: TagPoseEntry,
    side: FieldSide,
    mount_offset: Vector2d,
    feed: SimTagFeed,
    imu: SimImuHandle,
    truth: Pose2d,
}

impl DriveScenario {
    pub fn new(
        tag: TagPoseEntry,
        side: FieldSide,
        mount_offset: Vector2d,
        feed: SimTagFeed,
        imu: SimImuHandle,
    ) -> Self {
        let truth = Pose2d::new(
            tag.field_position.x + side.multiplier() * START_RANGE,
            tag.field_position.y,
            side.base_heading_deg().to_radians(),
        );
        imu.set_heading(Angle::Degrees(side.base_heading_deg()));
        Self {
            tag,
            side,
            mount_offset,
            feed,
            imu,
            truth,
        }
    }

    pub fn truth(&self) -> Pose2d {
        self.truth
    }

    pub fn tag_id(&self) -> u32 {
        self.tag.id
    }

    /// Advance the world by one loop tick.
    pub fn step(&mut self, _tick: u64, localizer: &mut SimLocalizer) {
        let m = self.side.multiplier();
        let dx = -m * SPEED_PER_TICK;
        self.truth = Pose2d::new(self.truth.x + dx, self.truth.y, self.truth.heading);
        localizer.advance(dx * ODOMETRY_SCALE, ODOMETRY_SIDE_DRIFT, 0.0);

        match self.detection() {
            Some(detection) => self.feed.publish(vec![detection]),
            None => self.feed.clear(),
        }
        self.imu.set_heading(Angle::Radians(self.truth.heading));
    }

    /// What the camera would report from the true pose, if the tag is in range.
    fn detection(&self) -> Option<RawTagDetection> {
        let m = self.side.multiplier();
        let forward = (self.truth.x - self.tag.field_position.x) / m + self.mount_offset.y;
        let strafe = (self.truth.y - self.tag.field_position.y) / -m + self.mount_offset.x;
        if forward - self.mount_offset.y < MIN_RANGE {
            return None;
        }
        let yaw_deg = self.truth.heading.to_degrees() - self.side.base_heading_deg();
        Some(RawTagDetection::new(self.tag.id, forward, strafe, yaw_deg))
    }
}
