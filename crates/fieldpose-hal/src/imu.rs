//! Generic `HeadingSensor` trait for inertial heading sources.

use fieldpose_types::{Angle, PoseError};

/// An inertial sensor that can report the robot's absolute heading.
///
/// Implementations are moved into the background sampling task, so they
/// must be `Send + 'static`.
pub trait HeadingSensor: Send + 'static {
    /// Stable identifier for this sensor, e.g. `"imu"`.
    fn id(&self) -> &str;

    /// Perform the (possibly slow) device bring-up.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::SensorUnavailable`] when the device does not
    /// answer.
    fn initialize(&mut self) -> Result<(), PoseError>;

    /// Read the current heading in whatever unit the device reports.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::SensorUnavailable`] if the read fails.
    fn read_heading(&mut self) -> Result<Angle, PoseError>;
}
