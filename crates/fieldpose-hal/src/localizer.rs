//! The drivetrain localizer: source of the dead-reckoned pose and consumer
//! of corrected estimates.

use fieldpose_types::Pose2d;

pub trait Localizer {
    /// Current best-effort pose from dead reckoning.
    fn pose(&self) -> Pose2d;

    /// Replace the localizer pose with a corrected estimate.
    fn set_pose(&mut self, pose: Pose2d);
}
