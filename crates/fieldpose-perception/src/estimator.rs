//! Estimator capabilities and their composition.
//!
//! Two narrow capability traits describe the halves of the pipeline:
//!
//! - [`ProducesTagPose`] – an absolute pose from fiducial tags.
//! - [`ProducesHeadingCorrectedPose`] – an inertial heading overlay.
//!
//! [`TagImuEstimator`] owns one of each and chains them: the tag half runs
//! first, the heading half has the final say on heading.  Either half can be
//! swapped for a test double.

use fieldpose_types::{Pose2d, PoseError};
use tracing::info;

use crate::heading::SessionSignal;

/// Something that can turn a localizer pose into a corrected one.
///
/// `None` means "no update this cycle" and is the common case.
pub trait Estimator {
    fn estimate(&mut self, localizer_pose: Pose2d) -> Option<Pose2d>;
}

/// Can produce a pose from tag observations.
pub trait ProducesTagPose {
    /// Open the camera and detector.  Call once, outside the polling loop.
    ///
    /// # Errors
    ///
    /// [`PoseError::SensorUnavailable`] if the camera cannot be opened,
    /// [`PoseError::AlreadyStarted`] on a second call.
    fn create_vision_sensor(&mut self) -> Result<(), PoseError>;

    /// Tag-based pose, or `None` when there is nothing new.
    fn estimate(&mut self, localizer_pose: Pose2d) -> Option<Pose2d>;
}

/// Can overlay an inertial heading onto a pose.
pub trait ProducesHeadingCorrectedPose {
    /// Initialise the IMU and start sampling it in the background until
    /// `session` signals shutdown.
    ///
    /// # Errors
    ///
    /// [`PoseError::SensorUnavailable`] if the IMU does not come up,
    /// [`PoseError::AlreadyStarted`] on a second call,
    /// [`PoseError::Runtime`] outside a tokio runtime.
    fn start_sampling(&mut self, session: SessionSignal) -> Result<(), PoseError>;

    /// `None` in, `None` out.  Never synthesises a pose from heading alone.
    fn estimate(&mut self, pose: Option<Pose2d>) -> Option<Pose2d>;
}

/// Tag reconstruction followed by IMU heading correction.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use fieldpose_hal::sim::{SimHeadingSensor, SimTagDetector};
/// use fieldpose_perception::estimator::{Estimator, TagImuEstimator};
/// use fieldpose_perception::heading::{HeadingConfig, HeadingCorrectionStage};
/// use fieldpose_perception::tag_library::{CenterStageLayout, TagPoseLibrary};
/// use fieldpose_perception::tag_pose::{TagPoseConfig, TagPoseReconstructor};
/// use fieldpose_types::Pose2d;
///
/// # async fn demo() -> Result<(), fieldpose_types::PoseError> {
/// let library = Arc::new(TagPoseLibrary::from_layout(&CenterStageLayout)?);
/// let tags = TagPoseReconstructor::new(
///     Box::new(SimTagDetector::new("webcam_1")),
///     library,
///     TagPoseConfig::default(),
/// );
/// let heading = HeadingCorrectionStage::new(
///     Box::new(SimHeadingSensor::new("imu")),
///     HeadingConfig::default(),
/// );
///
/// let (_stop, session) = tokio::sync::watch::channel(false);
/// let mut estimator = TagImuEstimator::new(tags, heading);
/// estimator.create_vision_sensor()?;
/// estimator.start_sampling(session)?;
///
/// let _update = estimator.estimate(Pose2d::default());
/// # Ok(())
/// # }
/// ```
pub struct TagImuEstimator<T, H> {
    tags: T,
    heading: H,
}

impl<T, H> TagImuEstimator<T, H>
where
    T: ProducesTagPose,
    H: ProducesHeadingCorrectedPose,
{
    pub fn new(tags: T, heading: H) -> Self {
        Self { tags, heading }
    }

    pub fn create_vision_sensor(&mut self) -> Result<(), PoseError> {
        self.tags.create_vision_sensor()
    }

    pub fn start_sampling(&mut self, session: SessionSignal) -> Result<(), PoseError> {
        self.heading.start_sampling(session)
    }

    /// Bring up both sensors, camera first.
    pub fn initialize(&mut self, session: SessionSignal) -> Result<(), PoseError> {
        self.create_vision_sensor()?;
        self.start_sampling(session)?;
        info!("tag + imu estimator initialised");
        Ok(())
    }

    pub fn tags(&self) -> &T {
        &self.tags
    }

    pub fn heading(&self) -> &H {
        &self.heading
    }

    pub fn heading_mut(&mut self) -> &mut H {
        &mut self.heading
    }
}

impl<T, H> Estimator for TagImuEstimator<T, H>
where
    T: ProducesTagPose,
    H: ProducesHeadingCorrectedPose,
{
    fn estimate(&mut self, localizer_pose: Pose2d) -> Option<Pose2d> {
        let tag_pose = self.tags.estimate(localizer_pose);
        self.heading.estimate(tag_pose)
    }
}
