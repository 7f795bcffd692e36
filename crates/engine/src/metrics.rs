use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineMetricsSnapshot {
    pub frames_per_sec: f32,
    pub ready_frames: u32,
    pub skipped_frames: u32,
    pub rules_fired: u32,
    pub rule_faults: u32,
}

/// Shared read side of the engine counters. Cloned into whoever reports them.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<EngineMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(EngineMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: EngineMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    ready_frames: u32,
    skipped_frames: u32,
    rules_fired: u32,
    rule_faults: u32,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval_start: now,
            interval,
            ready_frames: 0,
            skipped_frames: 0,
            rules_fired: 0,
            rule_faults: 0,
        }
    }

    pub(crate) fn record_frame(&mut self, ready: bool) {
        if ready {
            self.ready_frames = self.ready_frames.saturating_add(1);
        } else {
            self.skipped_frames = self.skipped_frames.saturating_add(1);
        }
    }

    pub(crate) fn record_fired(&mut self) {
        self.rules_fired = self.rules_fired.saturating_add(1);
    }

    pub(crate) fn record_fault(&mut self) {
        self.rule_faults = self.rule_faults.saturating_add(1);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<EngineMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frames = self.ready_frames.saturating_add(self.skipped_frames);
        let snapshot = EngineMetricsSnapshot {
            frames_per_sec: frames as f32 / elapsed_seconds,
            ready_frames: self.ready_frames,
            skipped_frames: self.skipped_frames,
            rules_fired: self.rules_fired,
            rule_faults: self.rule_faults,
        };

        self.interval_start = now;
        self.ready_frames = 0;
        self.skipped_frames = 0;
        self.rules_fired = 0;
        self.rule_faults = 0;

        Some(snapshot)
    }
}
