//! `fieldpose-runtime` – everything needed to run an estimator on a robot.
//!
//! # Modules
//!
//! - [`config`] – [`FieldPoseConfig`][config::FieldPoseConfig] loaded from
//!   `~/.fieldpose/config.toml` with `FIELDPOSE_*` overrides.
//! - [`session`] – [`Session`][session::Session] shutdown signal and the
//!   [`EstimatorLoop`][session::EstimatorLoop] that feeds estimates back into
//!   the localizer.
//! - [`loop_timer`] – [`LoopTimer`][loop_timer::LoopTimer] for measuring
//!   loop rates.
//! - [`telemetry`] – `tracing` subscriber and OTLP export.

pub mod config;
pub mod loop_timer;
pub mod session;
pub mod telemetry;

pub use config::FieldPoseConfig;
pub use loop_timer::LoopTimer;
pub use session::{EstimatorLoop, LoopStats, Session};
pub use telemetry::{TracerProviderGuard, init_tracing};
