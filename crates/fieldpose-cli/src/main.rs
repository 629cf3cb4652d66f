//! `fieldpose-cli` – runs the tag + IMU estimator against simulated hardware.
//!
//! 1. Loads `~/.fieldpose/config.toml` (or `--config <path>`), falling back to
//!    defaults.  `--init-config` writes the defaults out and exits.
//! 2. Brings up the simulated camera and IMU.  A sensor that fails to start
//!    aborts the run.
//! 3. Drives a scripted approach to one tag, feeding every estimate back into
//!    the dead-reckoning localizer, until Ctrl-C or `--duration <secs>`.

mod scenario;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use fieldpose_hal::sim::{SimHeadingSensor, SimLocalizer, SimTagDetector};
use fieldpose_hal::Localizer;
use fieldpose_perception::tag_pose::FieldSide;
use fieldpose_perception::{HeadingCorrectionStage, TagImuEstimator, TagPoseReconstructor};
use fieldpose_runtime::config::{self, FieldPoseConfig};
use fieldpose_runtime::{EstimatorLoop, Session, init_tracing};
use tracing::warn;

use crate::scenario::DriveScenario;

/// Tag the scripted drive approaches when the layout has it.
const PREFERRED_TAG: u32 = 2;

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    init_config: bool,
    duration: Option<Duration>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--init-config" => parsed.init_config = true,
            "--duration" => {
                let secs = args.next().ok_or("--duration needs a number of seconds")?;
                let secs: f64 = secs.parse().map_err(|_| format!("invalid duration: {secs}"))?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(format!("invalid duration: {secs}"));
                }
                parsed.duration = Some(Duration::from_secs_f64(secs));
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(parsed)
}

fn main() -> ExitCode {
    let _telemetry = init_tracing("fieldpose");

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}: {e}", "Usage error".red());
            print_usage();
            return ExitCode::from(2);
        }
    };

    print_banner();

    let path = args.config.clone().unwrap_or_else(config::config_path);
    if args.init_config {
        return match config::save_to(&FieldPoseConfig::default(), &path) {
            Ok(()) => {
                println!("  {} {}", "Wrote default config to".green(), path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{}: {e}", "Error saving config".red());
                ExitCode::FAILURE
            }
        };
    }

    let cfg = load_config(&path);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {e}", "Failed to start tokio runtime".red());
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(cfg, args.duration))
}

/// Load `path`, falling back to defaults when it is missing or unreadable.
/// `FIELDPOSE_*` overrides apply either way.
fn load_config(path: &Path) -> FieldPoseConfig {
    match config::load_from(path) {
        Ok(Some(cfg)) => {
            println!("  Config: {}", path.display().to_string().bold());
            return cfg;
        }
        Ok(None) => println!("  No config at {}; using defaults.", path.display()),
        Err(e) => {
            println!("{}: {e}", "Config error".red());
            println!("  Using default configuration.");
        }
    }
    let mut cfg = FieldPoseConfig::default();
    config::apply_env_overrides(&mut cfg);
    cfg
}

async fn run(cfg: FieldPoseConfig, duration: Option<Duration>) -> ExitCode {
    let library = match cfg.tag_library() {
        Ok(library) => Arc::new(library),
        Err(e) => {
            println!("{}: {e}", "Tag layout error".red().bold());
            return ExitCode::FAILURE;
        }
    };
    let target = library
        .lookup(PREFERRED_TAG)
        .cloned()
        .or_else(|| library.entries().into_iter().next());
    let Some(target) = target else {
        println!("{}", "Tag layout is empty; nothing to drive towards.".red().bold());
        return ExitCode::FAILURE;
    };

    let tag_config = cfg.tag_pose_config();
    let detector = SimTagDetector::new("webcam_1");
    let feed = detector.feed();
    let imu = SimHeadingSensor::new("imu");
    let imu_handle = imu.handle();

    let side = FieldSide::classify(target.id, tag_config.audience_side_min_id);
    let mut scenario = DriveScenario::new(target, side, tag_config.mount_offset, feed, imu_handle);

    let tags = TagPoseReconstructor::new(Box::new(detector), Arc::clone(&library), tag_config);
    let heading = HeadingCorrectionStage::new(Box::new(imu), cfg.heading_config());
    let mut estimator = TagImuEstimator::new(tags, heading);

    let session = Arc::new(Session::new());
    if let Err(e) = estimator.initialize(session.signal()) {
        println!("{}: {e}", "Sensor startup failed".red().bold());
        return ExitCode::FAILURE;
    }

    let stop = Arc::clone(&session);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "Ctrl-C received, stopping estimator".yellow().bold());
        stop.stop();
    }) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }

    if let Some(duration) = duration {
        let stop = Arc::clone(&session);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            stop.stop();
        });
    }

    println!(
        "  Driving towards tag {} ({}) from {:.1}, {:.1}",
        scenario.tag_id().to_string().bold(),
        library.name(),
        scenario.truth().x,
        scenario.truth().y,
    );
    println!();

    let start = scenario.truth();
    let mut estimator_loop = EstimatorLoop::new(estimator, SimLocalizer::new(start), cfg.loop_period());
    let stats = estimator_loop
        .run_with(session.signal(), |tick, localizer| scenario.step(tick, localizer))
        .await;
    estimator_loop.estimator_mut().heading_mut().stopped().await;

    let estimate = estimator_loop.localizer().pose();
    let truth = scenario.truth();
    println!();
    println!("  {} ticks, {} corrections", stats.ticks, stats.updates.to_string().green());
    println!(
        "  localizer  x={:8.3} y={:8.3} heading={:7.4}",
        estimate.x, estimate.y, estimate.heading
    );
    println!(
        "  truth      x={:8.3} y={:8.3} heading={:7.4}",
        truth.x, truth.y, truth.heading
    );
    println!(
        "  imu        {:?}",
        estimator_loop.estimator().heading().health()
    );
    ExitCode::SUCCESS
}

fn print_banner() {
    println!();
    println!("{}", "  ┌─────────────────────────────┐".bold().cyan());
    println!("{}", "  │   fieldpose  tag + imu      │".bold().cyan());
    println!("{}", "  └─────────────────────────────┘".bold().cyan());
    println!("  {} {}", "version".dimmed(), env!("CARGO_PKG_VERSION"));
    println!();
}

fn print_usage() {
    println!("usage: fieldpose [--config <path>] [--init-config] [--duration <secs>]");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn no_arguments_is_default() {
        assert_eq!(parse_args(args(&[])).unwrap(), Args::default());
    }

    #[test]
    fn all_arguments() {
        let parsed = parse_args(args(&["--config", "/tmp/fp.toml", "--duration", "2.5", "--init-config"])).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("/tmp/fp.toml")));
        assert_eq!(parsed.duration, Some(Duration::from_millis(2500)));
        assert!(parsed.init_config);
    }

    #[test]
    fn env_overrides_apply_to_every_fallback() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "loop_period_ms = [").unwrap();
        let missing = dir.path().join("missing.toml");

        // SAFETY: no other test in this binary reads this variable.
        unsafe { std::env::set_var("FIELDPOSE_STEP_SIZE", "7") };
        let from_broken = load_config(&broken);
        let from_missing = load_config(&missing);
        unsafe { std::env::remove_var("FIELDPOSE_STEP_SIZE") };

        assert_eq!(from_broken.tag_pose.step_size, 7);
        assert_eq!(from_missing.tag_pose.step_size, 7);
        assert_eq!(from_broken.loop_period_ms, FieldPoseConfig::default().loop_period_ms);
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(parse_args(args(&["--config"])).is_err());
        assert!(parse_args(args(&["--duration", "-1"])).is_err());
        assert!(parse_args(args(&["--duration", "soon"])).is_err());
        assert!(parse_args(args(&["--verbose"])).is_err());
    }
}
