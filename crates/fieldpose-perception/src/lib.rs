//! `fieldpose-perception` – field pose estimation from tags and an IMU.
//!
//! # Modules
//!
//! - [`tag_library`] – [`TagPoseLibrary`][tag_library::TagPoseLibrary]:
//!   read-only registry of tag placements built from a swappable
//!   [`TagLayout`][tag_library::TagLayout].
//! - [`tag_pose`] – [`TagPoseReconstructor`][tag_pose::TagPoseReconstructor]:
//!   turns raw camera-relative detections into field-frame poses, throttled
//!   to one recompute every `step_size` polls.
//! - [`heading`] – [`HeadingCorrectionStage`][heading::HeadingCorrectionStage]:
//!   samples the IMU on a background task and overlays its heading.
//! - [`estimator`] – [`TagImuEstimator`][estimator::TagImuEstimator]: chains
//!   the two stages behind the [`Estimator`][estimator::Estimator] trait.

pub mod estimator;
pub mod heading;
pub mod tag_library;
pub mod tag_pose;

pub use estimator::{Estimator, ProducesHeadingCorrectedPose, ProducesTagPose, TagImuEstimator};
pub use heading::{HeadingConfig, HeadingCorrectionStage, HeadingHealth, HeadingSample, SessionSignal};
pub use tag_library::{CenterStageLayout, TableLayout, TagLayout, TagPoseLibrary};
pub use tag_pose::{DetectionAggregation, SamplingThrottle, TagPoseConfig, TagPoseReconstructor};
