//! Heading Correction Stage.
//!
//! Overlays the most recent inertial heading onto an upstream pose.  The IMU
//! is read by a background tokio task started with
//! [`start_sampling`][ProducesHeadingCorrectedPose::start_sampling]; the task
//! publishes through a [`watch`] channel, so the control loop always reads a
//! complete [`HeadingSample`] snapshot without blocking on the sensor.
//!
//! # Fault policy
//!
//! - IMU bring-up failure is fatal: `start_sampling` returns
//!   [`PoseError::SensorUnavailable`] and nothing is spawned.
//! - After `max_consecutive_failures` failed reads the sampler flags a fault.
//!   While faulted (or while the latest sample is older than `stale_after`)
//!   the stage leaves the upstream heading untouched instead of applying an
//!   old value.  The fault clears on the next successful read.
//!
//! The sampler exits when the session signal turns `true` or its sender is
//! dropped.
//!
//! Each read runs on tokio's blocking pool, so a slow sensor bus never holds
//! up a worker thread (including the only one of a current-thread runtime).
//! `HeadingSensor::initialize` runs once on the thread calling
//! `start_sampling`, which happens during setup and before the loop starts.

use std::time::{Duration, Instant};

use fieldpose_hal::HeadingSensor;
use fieldpose_types::{Pose2d, PoseError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::estimator::ProducesHeadingCorrectedPose;

/// Shutdown signal of the operating session.  `true` means stop.
pub type SessionSignal = watch::Receiver<bool>;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingConfig {
    /// Time between IMU reads.
    pub sample_period: Duration,
    /// Samples older than this are not applied.
    pub stale_after: Duration,
    /// Consecutive failed reads before the sampler reports a fault.
    pub max_consecutive_failures: u32,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            sample_period: Duration::from_millis(10),
            stale_after: Duration::from_millis(500),
            max_consecutive_failures: 5,
        }
    }
}

/// `stale_after` never drops below this many sample periods.
const MIN_STALE_PERIODS: u32 = 3;

impl HeadingConfig {
    /// Clamp values the sampler cannot work with.
    ///
    /// A zero period would spin the sampler, and a `stale_after` within a few
    /// periods would mark every sample stale before the next one lands.
    pub fn sanitized(self) -> Self {
        let sample_period = self.sample_period.max(Duration::from_millis(1));
        Self {
            sample_period,
            stale_after: self.stale_after.max(sample_period * MIN_STALE_PERIODS),
            max_consecutive_failures: self.max_consecutive_failures.max(1),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared sample state
// ────────────────────────────────────────────────────────────────────────────

/// One heading reading, already converted to radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingSample {
    pub heading_rad: f64,
    pub sampled_at: Instant,
}

#[derive(Debug, Clone, Default)]
struct SamplerState {
    latest: Option<HeadingSample>,
    fault: Option<String>,
    running: bool,
}

/// What the stage currently knows about the IMU.
#[derive(Debug, Clone, PartialEq)]
pub enum HeadingHealth {
    /// `start_sampling` has not been called.
    NotStarted,
    /// Sampler running, no reading yet.
    Waiting,
    Healthy,
    /// The latest reading is older than `stale_after`.
    Stale,
    /// Too many consecutive read failures; holds the last error.
    Faulted(String),
    /// The sampler task has exited.
    Stopped,
}

fn classify(state: &SamplerState, started: bool, stale_after: Duration, now: Instant) -> HeadingHealth {
    if !started {
        return HeadingHealth::NotStarted;
    }
    if !state.running {
        return HeadingHealth::Stopped;
    }
    if let Some(fault) = &state.fault {
        return HeadingHealth::Faulted(fault.clone());
    }
    match state.latest {
        None => HeadingHealth::Waiting,
        Some(sample) if now.saturating_duration_since(sample.sampled_at) > stale_after => {
            HeadingHealth::Stale
        }
        Some(_) => HeadingHealth::Healthy,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HeadingCorrectionStage
// ────────────────────────────────────────────────────────────────────────────

pub struct HeadingCorrectionStage {
    config: HeadingConfig,
    /// Sensor and sender, until they are moved into the sampler task.
    pending: Option<(Box<dyn HeadingSensor>, watch::Sender<SamplerState>)>,
    state: watch::Receiver<SamplerState>,
    started: bool,
    task: Option<JoinHandle<()>>,
    last_health: HeadingHealth,
}

impl HeadingCorrectionStage {
    /// The sensor is not touched until
    /// [`start_sampling`][ProducesHeadingCorrectedPose::start_sampling].
    pub fn new(sensor: Box<dyn HeadingSensor>, config: HeadingConfig) -> Self {
        let sanitized = config.sanitized();
        if sanitized != config {
            warn!(requested = ?config, using = ?sanitized, "heading config adjusted");
        }
        let (tx, rx) = watch::channel(SamplerState::default());
        Self {
            config: sanitized,
            pending: Some((sensor, tx)),
            state: rx,
            started: false,
            task: None,
            last_health: HeadingHealth::NotStarted,
        }
    }

    /// Effective configuration, after [`HeadingConfig::sanitized`].
    pub fn config(&self) -> &HeadingConfig {
        &self.config
    }

    pub fn health(&self) -> HeadingHealth {
        classify(
            &self.state.borrow(),
            self.started,
            self.config.stale_after,
            Instant::now(),
        )
    }

    /// Latest reading, regardless of health.
    pub fn latest_sample(&self) -> Option<HeadingSample> {
        self.state.borrow().latest
    }

    /// Wait for the sampler task to exit.  Returns immediately if it was
    /// never started.
    pub async fn stopped(&mut self) {
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "heading sampler task ended abnormally");
        }
    }

    fn note_health(&mut self, health: &HeadingHealth) {
        if *health == self.last_health {
            return;
        }
        match health {
            HeadingHealth::Healthy => info!("heading correction active"),
            HeadingHealth::Faulted(e) => warn!(error = %e, "imu faulted; heading correction suspended"),
            HeadingHealth::Stale => warn!("imu samples stale; heading correction suspended"),
            other => debug!(health = ?other, "heading health changed"),
        }
        self.last_health = health.clone();
    }
}

impl ProducesHeadingCorrectedPose for HeadingCorrectionStage {
    fn start_sampling(&mut self, session: SessionSignal) -> Result<(), PoseError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PoseError::Runtime(format!("heading sampler needs a tokio runtime: {e}")))?;

        let Some((sensor, _)) = self.pending.as_mut() else {
            return Err(PoseError::AlreadyStarted("heading sampler".to_string()));
        };
        sensor.initialize()?;

        let Some((sensor, tx)) = self.pending.take() else {
            return Err(PoseError::AlreadyStarted("heading sampler".to_string()));
        };
        info!(
            sensor = %sensor.id(),
            period_ms = self.config.sample_period.as_millis() as u64,
            "starting heading sampler"
        );
        tx.send_modify(|s| s.running = true);
        self.started = true;
        self.task = Some(runtime.spawn(run_sampler(sensor, tx, session, self.config)));
        Ok(())
    }

    fn estimate(&mut self, pose: Option<Pose2d>) -> Option<Pose2d> {
        let pose = pose?;
        let health = self.health();
        self.note_health(&health);

        if health != HeadingHealth::Healthy {
            return Some(pose);
        }
        match self.latest_sample() {
            Some(sample) => Some(pose.with_heading(sample.heading_rad)),
            None => Some(pose),
        }
    }
}

async fn run_sampler(
    mut sensor: Box<dyn HeadingSensor>,
    tx: watch::Sender<SamplerState>,
    mut session: SessionSignal,
    config: HeadingConfig,
) {
    let sensor_id = sensor.id().to_string();
    let mut ticker = tokio::time::interval(config.sample_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            _ = async { let _ = session.wait_for(|stop| *stop).await; } => break,
            _ = ticker.tick() => {
                // Bus reads block; keep them off the runtime's worker threads.
                let read = tokio::task::spawn_blocking(move || {
                    let reading = sensor.read_heading();
                    (sensor, reading)
                })
                .await;
                let reading = match read {
                    Ok((returned, reading)) => {
                        sensor = returned;
                        reading
                    }
                    Err(e) => {
                        warn!(sensor = %sensor_id, error = %e, "imu read task failed");
                        tx.send_modify(|s| s.fault = Some(format!("imu read task failed: {e}")));
                        break;
                    }
                };

                match reading {
                    Ok(angle) => {
                        failures = 0;
                        let sample = HeadingSample {
                            heading_rad: angle.radians(),
                            sampled_at: Instant::now(),
                        };
                        tx.send_modify(|s| {
                            if s.fault.take().is_some() {
                                info!("imu recovered");
                            }
                            s.latest = Some(sample);
                        });
                    }
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        debug!(error = %e, failures, "imu read failed");
                        if failures == config.max_consecutive_failures {
                            warn!(error = %e, failures, "imu unreachable");
                            tx.send_modify(|s| s.fault = Some(e.to_string()));
                        }
                    }
                }
            }
        }
    }

    tx.send_modify(|s| s.running = false);
    info!(sensor = %sensor_id, "heading sampler stopped");
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
