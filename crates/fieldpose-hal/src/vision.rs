//! Generic `TagDetector` trait and the raw detection it produces.

use fieldpose_types::{LensIntrinsics, PoseError, TagPoseEntry};

/// Tag pose relative to the camera, as reported by the detector.
///
/// `forward` and `strafe` are inches, `yaw_deg` is degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraRelativePose {
    pub forward: f64,
    pub strafe: f64,
    pub yaw_deg: f64,
}

/// One tag sighting from the most recent vision frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawTagDetection {
    pub id: u32,
    /// `false` when the detector decoded an id it has no placement data for.
    pub has_metadata: bool,
    pub camera_relative: CameraRelativePose,
}

impl RawTagDetection {
    pub fn new(id: u32, forward: f64, strafe: f64, yaw_deg: f64) -> Self {
        Self {
            id,
            has_metadata: true,
            camera_relative: CameraRelativePose {
                forward,
                strafe,
                yaw_deg,
            },
        }
    }

    /// A detection of a tag the detector could not match to its library.
    pub fn without_metadata(id: u32) -> Self {
        Self {
            id,
            has_metadata: false,
            camera_relative: CameraRelativePose::default(),
        }
    }
}

/// A fiducial tag detector sitting on top of a camera pipeline.
///
/// The detector runs on its own; the estimator only polls it.
pub trait TagDetector: Send {
    /// Stable identifier for this detector, e.g. `"webcam_1"`.
    fn id(&self) -> &str;

    /// Bring up the camera and detection pipeline.
    ///
    /// Called once, outside the polling loop.  `tags` is the field layout
    /// the detector should decode against.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::SensorUnavailable`] if the camera cannot be
    /// opened.
    fn open(&mut self, intrinsics: &LensIntrinsics, tags: &[TagPoseEntry]) -> Result<(), PoseError>;

    /// The most recent completed batch of detections.
    ///
    /// Must not block waiting for a new frame.
    fn raw_detections(&self) -> Vec<RawTagDetection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockDetector {
        opened_with: Option<(LensIntrinsics, usize)>,
    }

    impl TagDetector for MockDetector {
        fn id(&self) -> &str {
            "mock"
        }

        fn open(&mut self, intrinsics: &LensIntrinsics, tags: &[TagPoseEntry]) -> Result<(), PoseError> {
            self.opened_with = Some((*intrinsics, tags.len()));
            Ok(())
        }

        fn raw_detections(&self) -> Vec<RawTagDetection> {
            vec![RawTagDetection::new(3, 12.0, -1.0, 4.0)]
        }
    }

    #[test]
    fn mock_detector_receives_intrinsics() {
        let mut det = MockDetector { opened_with: None };
        det.open(&LensIntrinsics::default(), &[]).unwrap();
        let (intrinsics, count) = det.opened_with.unwrap();
        assert!((intrinsics.fx - 693.5217154).abs() < 1e-9);
        assert_eq!(count, 0);
        assert_eq!(det.raw_detections()[0].id, 3);
    }

    #[test]
    fn detection_without_metadata_is_flagged() {
        let det = RawTagDetection::without_metadata(42);
        assert!(!det.has_metadata);
        assert_eq!(det.id, 42);
    }
}
