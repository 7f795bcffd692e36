use std::env;
use std::thread;
use std::time::{Duration, Instant};

use engine::{ConfigError, FrameController, FrameReport};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::dispatch::SimDispatcher;
use super::sim_world::SimWorld;

const FALLBACK_TICK: Duration = Duration::from_millis(33);

#[derive(Debug, Clone)]
pub(crate) struct LoopConfig {
    pub(crate) target_tps: u32,
    pub(crate) max_frame_delta: Duration,
    pub(crate) max_ticks_per_frame: u32,
    pub(crate) metrics_log_interval: Duration,
    /// `None` runs until the process is stopped.
    pub(crate) run_for: Option<Duration>,
    pub(crate) seed: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 30,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            run_for: None,
            seed: None,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to spawn {name} thread: {source}")]
    SpawnThread {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

/// Fixed-rate tick loop: one engine frame per simulation tick.
pub(crate) fn run_loop(
    config: &LoopConfig,
    controller: &mut FrameController,
    world: &mut SimWorld,
    dispatcher: &mut SimDispatcher,
) {
    let fixed_dt = normalize_non_zero_duration(tick_duration(config.target_tps), FALLBACK_TICK);
    let max_frame_delta = normalize_non_zero_duration(config.max_frame_delta, fixed_dt);
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let metrics = controller.metrics();

    info!(
        target_tps = config.target_tps,
        tick_ms = fixed_dt.as_millis() as u64,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        run_for_secs = config.run_for.map(|limit| limit.as_secs()),
        "loop_config"
    );

    let started = Instant::now();
    let mut last_frame = started;
    let mut last_metrics_log = started;
    let mut accumulator = Duration::ZERO;

    loop {
        let now = Instant::now();
        if config
            .run_for
            .is_some_and(|limit| now.saturating_duration_since(started) >= limit)
        {
            info!(reason = "run_limit", "shutdown_requested");
            break;
        }

        let frame_dt = clamp_frame_delta(now.saturating_duration_since(last_frame), max_frame_delta);
        last_frame = now;
        accumulator = accumulator.saturating_add(frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        accumulator = step_plan.remaining_accumulator;
        for _ in 0..step_plan.ticks_to_run {
            world.advance(fixed_dt);
            let report = controller.run_frame(world, dispatcher, Instant::now());
            log_report(&report);
            world.apply(dispatcher.drain());
        }
        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if now.saturating_duration_since(last_metrics_log) >= metrics_log_interval {
            let snapshot = metrics.snapshot();
            info!(
                fps = snapshot.frames_per_sec,
                ready_frames = snapshot.ready_frames,
                skipped_frames = snapshot.skipped_frames,
                rules_fired = snapshot.rules_fired,
                rule_faults = snapshot.rule_faults,
                tracked_monsters = controller.registry().len(),
                "loop_metrics"
            );
            last_metrics_log = now;
        }

        thread::sleep(fixed_dt.saturating_sub(accumulator));
    }
}

fn log_report(report: &FrameReport) {
    match report {
        FrameReport::Skipped(reason) => debug!(reason = %reason, "frame_not_ready"),
        FrameReport::Evaluated(_) => {
            for kind in report.fired() {
                debug!(rule = kind.label(), "rule_fired");
            }
            for (kind, fault) in report.faults() {
                warn!(rule = kind.label(), error = %fault, "rule_faulted");
            }
        }
    }
}

fn tick_duration(target_tps: u32) -> Duration {
    if target_tps == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(1.0 / target_tps as f64)
    }
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
