//! In-process simulated drivers for tests and headless runs.
//!
//! Each simulated device comes with a cloneable handle so a test (or the
//! CLI's scripted scenario) can change what the device reports while the
//! estimator owns the device itself.
//!
//! # Example
//!
//! ```rust
//! use fieldpose_hal::sim::SimTagDetector;
//! use fieldpose_hal::vision::{RawTagDetection, TagDetector};
//!
//! let detector = SimTagDetector::new("webcam_1");
//! let feed = detector.feed();
//! feed.publish(vec![RawTagDetection::new(1, 10.0, 2.0, 5.0)]);
//!
//! assert_eq!(detector.raw_detections().len(), 1);
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use fieldpose_types::{Angle, LensIntrinsics, Pose2d, PoseError, TagPoseEntry};
use tracing::debug;

use crate::imu::HeadingSensor;
use crate::localizer::Localizer;
use crate::vision::{RawTagDetection, TagDetector};

// ────────────────────────────────────────────────────────────────────────────
// Simulated tag detector
// ────────────────────────────────────────────────────────────────────────────

/// A detector whose "latest batch" is whatever was last published through
/// its [`SimTagFeed`].
pub struct SimTagDetector {
    id: String,
    batch: Arc<Mutex<Vec<RawTagDetection>>>,
    camera_present: bool,
    opened: Arc<Mutex<Option<LensIntrinsics>>>,
}

impl SimTagDetector {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            batch: Arc::new(Mutex::new(Vec::new())),
            camera_present: true,
            opened: Arc::new(Mutex::new(None)),
        }
    }

    /// Simulate a missing webcam: [`TagDetector::open`] will fail.
    pub fn disconnected(mut self) -> Self {
        self.camera_present = false;
        self
    }

    /// Handle used to publish detection batches.
    pub fn feed(&self) -> SimTagFeed {
        SimTagFeed {
            batch: Arc::clone(&self.batch),
            opened: Arc::clone(&self.opened),
        }
    }
}

impl TagDetector for SimTagDetector {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&mut self, intrinsics: &LensIntrinsics, tags: &[TagPoseEntry]) -> Result<(), PoseError> {
        if !self.camera_present {
            return Err(PoseError::SensorUnavailable {
                component: self.id.clone(),
                details: "simulated camera is disconnected".to_string(),
            });
        }
        debug!(detector = %self.id, tags = tags.len(), "sim detector opened");
        *self.opened.lock().unwrap_or_else(PoisonError::into_inner) = Some(*intrinsics);
        Ok(())
    }

    fn raw_detections(&self) -> Vec<RawTagDetection> {
        self.batch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Cloneable publisher for a [`SimTagDetector`].
#[derive(Clone)]
pub struct SimTagFeed {
    batch: Arc<Mutex<Vec<RawTagDetection>>>,
    opened: Arc<Mutex<Option<LensIntrinsics>>>,
}

impl SimTagFeed {
    /// Replace the detector's latest batch.
    pub fn publish(&self, batch: Vec<RawTagDetection>) {
        *self.batch.lock().unwrap_or_else(PoisonError::into_inner) = batch;
    }

    /// Simulate a frame with no tags in view.
    pub fn clear(&self) {
        self.publish(Vec::new());
    }

    /// Intrinsics passed to the last successful `open`, if any.
    pub fn opened_with(&self) -> Option<LensIntrinsics> {
        *self.opened.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated IMU
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ImuState {
    heading: Angle,
    connected: bool,
    reads: u64,
}

/// An IMU that reports whatever heading its [`SimImuHandle`] last set.
pub struct SimHeadingSensor {
    id: String,
    state: Arc<Mutex<ImuState>>,
}

impl SimHeadingSensor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(ImuState {
                heading: Angle::Radians(0.0),
                connected: true,
                reads: 0,
            })),
        }
    }

    pub fn handle(&self) -> SimImuHandle {
        SimImuHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl HeadingSensor for SimHeadingSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn initialize(&mut self) -> Result<(), PoseError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.connected {
            return Err(PoseError::SensorUnavailable {
                component: self.id.clone(),
                details: "simulated imu did not respond to init".to_string(),
            });
        }
        Ok(())
    }

    fn read_heading(&mut self) -> Result<Angle, PoseError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.connected {
            return Err(PoseError::SensorUnavailable {
                component: self.id.clone(),
                details: "simulated imu lost contact".to_string(),
            });
        }
        state.reads += 1;
        Ok(state.heading)
    }
}

/// Control handle for a [`SimHeadingSensor`].
#[derive(Clone)]
pub struct SimImuHandle {
    state: Arc<Mutex<ImuState>>,
}

impl SimImuHandle {
    pub fn set_heading(&self, heading: Angle) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).heading = heading;
    }

    /// Connect or disconnect the simulated device.
    pub fn set_connected(&self, connected: bool) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).connected = connected;
    }

    /// Number of successful reads so far.
    pub fn reads(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).reads
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated localizer
// ────────────────────────────────────────────────────────────────────────────

/// Dead-reckoning stand-in: holds a pose, optionally drifting on each
/// [`SimLocalizer::advance`].
#[derive(Debug, Default)]
pub struct SimLocalizer {
    pose: Pose2d,
    corrections: u64,
}

impl SimLocalizer {
    pub fn new(pose: Pose2d) -> Self {
        Self {
            pose,
            corrections: 0,
        }
    }

    /// Apply an odometry delta (field frame).
    pub fn advance(&mut self, dx: f64, dy: f64, dheading: f64) {
        self.pose = Pose2d::new(
            self.pose.x + dx,
            self.pose.y + dy,
            self.pose.heading + dheading,
        );
    }

    /// How many times an estimator overwrote the pose.
    pub fn corrections(&self) -> u64 {
        self.corrections
    }
}

impl Localizer for SimLocalizer {
    fn pose(&self) -> Pose2d {
        self.pose
    }

    fn set_pose(&mut self, pose: Pose2d) {
        self.pose = pose;
        self.corrections += 1;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
