//! `fieldpose-hal` – hardware seams for the pose estimator.
//!
//! The estimator never talks to a device directly.  It goes through the
//! traits defined here, so real drivers and the simulated ones in [`sim`]
//! are interchangeable.
//!
//! # Modules
//!
//! - [`vision`] – [`TagDetector`][vision::TagDetector]: polled source of raw
//!   fiducial tag detections.
//! - [`imu`] – [`HeadingSensor`][imu::HeadingSensor]: inertial heading source
//!   sampled in the background.
//! - [`localizer`] – [`Localizer`][localizer::Localizer]: the drivetrain
//!   localizer that supplies and receives poses.
//! - [`sim`] – in-process stand-ins for all three.

pub mod imu;
pub mod localizer;
pub mod sim;
pub mod vision;

pub use imu::HeadingSensor;
pub use localizer::Localizer;
pub use vision::{CameraRelativePose, RawTagDetection, TagDetector};
