//! `fieldpose-types` – shared value types for the field pose estimator.
//!
//! Everything in here is a plain, immutable value: the 2-D robot pose, the
//! vectors and quaternions used to describe tag placements, and the single
//! error enum shared by every crate in the workspace.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Robot pose in the field frame.
///
/// `x`/`y` are in inches, `heading` is in radians measured counter-clockwise
/// from +X.  Degree values are converted before they reach this type.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2d {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose2d {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// Same position, different heading.
    pub fn with_heading(self, heading: f64) -> Self {
        Self { heading, ..self }
    }

    pub fn position(&self) -> Vector2d {
        Vector2d::new(self.x, self.y)
    }
}

/// A 2-D vector.  Used for the camera mount offset and field coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2d {
    pub x: f64,
    pub y: f64,
}

impl Vector2d {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A 3-D field position (inches).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Drop the vertical component.
    pub fn xy(&self) -> Vector2d {
        Vector2d::new(self.x, self.y)
    }
}

/// Orientation as a quaternion (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// An angle tagged with its unit, as reported by a sensor driver.
///
/// Drivers report in whatever unit their hardware uses; [`Angle::radians`]
/// normalises at the boundary so the estimator only ever sees radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Angle {
    Degrees(f64),
    Radians(f64),
}

impl Angle {
    pub fn radians(self) -> f64 {
        match self {
            Angle::Degrees(deg) => deg.to_radians(),
            Angle::Radians(rad) => rad,
        }
    }
}

/// Known placement of one fiducial tag on the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagPoseEntry {
    pub id: u32,
    /// Human-readable name, e.g. `"BlueAllianceLeft"`.
    pub label: String,
    /// Physical edge length of the printed tag (inches).
    pub size: f64,
    pub field_position: Vector3,
    pub field_orientation: Quaternion,
}

/// Pinhole lens intrinsics (pixels).
///
/// The estimator never uses these itself; they are handed to the external
/// tag detector when the vision sensor is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LensIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Default for LensIntrinsics {
    /// C920 at 640x480, calibrated with mrcal.
    fn default() -> Self {
        Self {
            fx: 693.5217154,
            fy: 687.7523885,
            cx: 326.6183680,
            cy: 243.0307655,
        }
    }
}

/// Error type shared by every `fieldpose` crate.
///
/// Only setup and configuration failures are errors.  A cycle with nothing
/// to report is expressed as `Option::None` by the estimators, never as a
/// `PoseError`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("Sensor Unavailable ({component}): {details}")]
    SensorUnavailable { component: String, details: String },

    #[error("Already Started: {0}")]
    AlreadyStarted(String),

    #[error("Duplicate Tag Id: {0}")]
    DuplicateTag(u32),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Runtime Error: {0}")]
    Runtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_heading_keeps_position() {
        let pose = Pose2d::new(1.0, -2.0, 0.3).with_heading(1.2);
        assert_eq!(pose.x, 1.0);
        assert_eq!(pose.y, -2.0);
        assert!((pose.heading - 1.2).abs() < 1e-12);
    }

    #[test]
    fn angle_degrees_normalised_to_radians() {
        assert!((Angle::Degrees(180.0).radians() - std::f64::consts::PI).abs() < 1e-12);
        assert!((Angle::Radians(0.25).radians() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn vector3_xy_drops_height() {
        let v = Vector3::new(61.75, 41.41, 4.0);
        assert_eq!(v.xy(), Vector2d::new(61.75, 41.41));
    }

    #[test]
    fn pose_serialises_with_field_names() {
        let json = serde_json::to_string(&Pose2d::new(1.0, 2.0, 0.5)).unwrap();
        assert!(json.contains("\"heading\":0.5"));
        let back: Pose2d = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Pose2d::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn pose_error_display() {
        let err = PoseError::SensorUnavailable {
            component: "imu".to_string(),
            details: "no response on bus".to_string(),
        };
        assert!(err.to_string().contains("imu"));
        assert!(err.to_string().contains("Sensor Unavailable"));

        assert!(PoseError::DuplicateTag(7).to_string().contains('7'));
    }
}
