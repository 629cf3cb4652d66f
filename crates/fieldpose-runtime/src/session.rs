//! Operating session and the estimator polling loop.
//!
//! A [`Session`] is the lifetime of one run.  It hands out
//! [`SessionSignal`]s to everything that runs in the background (the IMU
//! sampler, the [`EstimatorLoop`]); [`Session::stop`] ends them all.
//!
//! Each [`EstimatorLoop::tick`]:
//!
//! 1. reads the current pose from the [`Localizer`],
//! 2. runs it through the [`Estimator`],
//! 3. writes any estimate back to the localizer.
//!
//! `None` from the estimator is the normal case and leaves the localizer
//! untouched.

use std::time::Duration;

use fieldpose_hal::Localizer;
use fieldpose_perception::{Estimator, SessionSignal};
use fieldpose_types::Pose2d;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::loop_timer::LoopTimer;

/// How many ticks between loop-rate reports.
const RATE_REPORT_INTERVAL: u64 = 250;

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of the session shutdown signal.
#[derive(Debug)]
pub struct Session {
    stop: watch::Sender<bool>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self { stop }
    }

    /// A receiver that resolves once [`stop`][Self::stop] is called.
    pub fn signal(&self) -> SessionSignal {
        self.stop.subscribe()
    }

    pub fn stop(&self) {
        if !self.stop.send_replace(true) {
            info!("session stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EstimatorLoop
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    /// Ticks on which the estimator produced a pose.
    pub updates: u64,
}

pub struct EstimatorLoop<E, L> {
    estimator: E,
    localizer: L,
    period: Duration,
    timer: LoopTimer,
    stats: LoopStats,
}

impl<E: Estimator, L: Localizer> EstimatorLoop<E, L> {
    pub fn new(estimator: E, localizer: L, period: Duration) -> Self {
        Self {
            estimator,
            localizer,
            period,
            timer: LoopTimer::new(),
            stats: LoopStats::default(),
        }
    }

    /// One synchronous estimate cycle.  Returns the pose written to the
    /// localizer, if any.
    pub fn tick(&mut self) -> Option<Pose2d> {
        self.stats.ticks += 1;
        let hz = self.timer.elapsed_hertz();
        if self.stats.ticks > 1 && self.stats.ticks % RATE_REPORT_INTERVAL == 0 {
            debug!(ticks = self.stats.ticks, loop_hz = hz, "estimator loop rate");
        }

        let estimate = self.estimator.estimate(self.localizer.pose())?;
        self.localizer.set_pose(estimate);
        self.stats.updates += 1;
        debug!(x = estimate.x, y = estimate.y, heading = estimate.heading, "localizer corrected");
        Some(estimate)
    }

    /// Tick every `period` until the session stops.
    pub async fn run(&mut self, session: SessionSignal) -> LoopStats {
        self.run_with(session, |_, _| {}).await
    }

    /// Like [`run`][Self::run], calling `before_tick` with the tick number
    /// and the localizer ahead of every cycle.
    pub async fn run_with<F>(&mut self, mut session: SessionSignal, mut before_tick: F) -> LoopStats
    where
        F: FnMut(u64, &mut L),
    {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.timer.reset();
        info!(period_ms = self.period.as_millis() as u64, "estimator loop running");

        loop {
            tokio::select! {
                _ = session.wait_for(|stop| *stop) => break,
                _ = ticker.tick() => {
                    before_tick(self.stats.ticks + 1, &mut self.localizer);
                    self.tick();
                }
            }
        }

        info!(ticks = self.stats.ticks, updates = self.stats.updates, "estimator loop stopped");
        self.stats
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn localizer(&self) -> &L {
        &self.localizer
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut E {
        &mut self.estimator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldpose_hal::sim::SimLocalizer;

    /// Emits a fixed pose every `every` calls.
    struct EveryNth {
        every: u64,
        calls: u64,
        pose: Pose2d,
    }

    impl Estimator for EveryNth {
        fn estimate(&mut self, _localizer_pose: Pose2d) -> Option<Pose2d> {
            self.calls += 1;
            (self.calls % self.every == 0).then_some(self.pose)
        }
    }

    fn every_nth(every: u64) -> EveryNth {
        EveryNth {
            every,
            calls: 0,
            pose: Pose2d::new(10.0, 20.0, 1.0),
        }
    }

    #[test]
    fn tick_writes_estimate_to_localizer() {
        let mut lp = EstimatorLoop::new(every_nth(1), SimLocalizer::default(), Duration::from_millis(1));
        assert_eq!(lp.tick(), Some(Pose2d::new(10.0, 20.0, 1.0)));
        assert_eq!(lp.localizer().pose(), Pose2d::new(10.0, 20.0, 1.0));
        assert_eq!(lp.stats(), LoopStats { ticks: 1, updates: 1 });
    }

    #[test]
    fn no_estimate_leaves_localizer_alone() {
        let start = Pose2d::new(1.0, 1.0, 0.0);
        let mut lp = EstimatorLoop::new(every_nth(3), SimLocalizer::new(start), Duration::from_millis(1));
        assert_eq!(lp.tick(), None);
        assert_eq!(lp.tick(), None);
        assert_eq!(lp.localizer().pose(), start);
        assert!(lp.tick().is_some());
        assert_eq!(lp.localizer().corrections(), 1);
        assert_eq!(lp.stats(), LoopStats { ticks: 3, updates: 1 });
    }

    #[test]
    fn session_stop_is_visible_to_signals() {
        let session = Session::new();
        let signal = session.signal();
        assert!(!session.is_stopped());
        session.stop();
        session.stop();
        assert!(session.is_stopped());
        assert!(*signal.borrow());
    }

    #[tokio::test]
    async fn run_ticks_until_session_stops() {
        let session = Session::new();
        let mut lp = EstimatorLoop::new(every_nth(2), SimLocalizer::default(), Duration::from_millis(2));

        let signal = session.signal();
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            session.stop();
        };
        let (stats, ()) = tokio::join!(
            lp.run_with(signal, |_, loc| loc.advance(0.1, 0.0, 0.0)),
            stopper
        );

        assert!(stats.ticks >= 2, "ticks: {}", stats.ticks);
        assert_eq!(stats.updates, stats.ticks / 2);
    }

    #[tokio::test]
    async fn run_returns_immediately_for_stopped_session() {
        let session = Session::new();
        session.stop();
        let mut lp = EstimatorLoop::new(every_nth(1), SimLocalizer::default(), Duration::from_secs(3600));
        let stats = tokio::time::timeout(Duration::from_secs(1), lp.run(session.signal()))
            .await
            .expect("loop must not run for a stopped session");
        assert!(stats.ticks <= 1);
    }
}
