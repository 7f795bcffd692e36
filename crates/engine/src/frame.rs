use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{info, trace};

use crate::config::{ConfigError, EngineSettings};
use crate::diagnostics::{Diagnostics, DiagnosticsSink, Verbosity};
use crate::input::ActionDispatcher;
use crate::metrics::{MetricsAccumulator, MetricsHandle};
use crate::proximity::ProximityCache;
use crate::registry::EntityRegistry;
use crate::rules::{build_rules, Rule, RuleContext, RuleFault, RuleKind, RuleOutcome, GRACE_PERIOD_BUFF};
use crate::snapshot::{FrameSnapshot, MovementTimer};
use crate::world::{WorldError, WorldState};

const METRICS_INTERVAL: Duration = Duration::from_secs(1);

/// Why a frame was skipped before any rule ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotReady {
    #[error("engine disabled")]
    Disabled,
    #[error("player is in town")]
    InTown,
    #[error("player is in a hideout")]
    InHideout,
    #[error("no local player")]
    NoPlayer,
    #[error("player is dead")]
    PlayerDead,
    #[error("buff list unavailable")]
    BuffsUnavailable,
    #[error("grace period active")]
    GracePeriod,
    #[error("skill list unavailable")]
    SkillsUnavailable,
    #[error("world read failed: {0}")]
    WorldFault(#[from] WorldError),
    #[error("pre-check panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleReport {
    pub kind: RuleKind,
    pub result: Result<RuleOutcome, RuleFault>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameReport {
    Skipped(NotReady),
    Evaluated(Vec<RuleReport>),
}

impl FrameReport {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Evaluated(_))
    }

    /// Rules that dispatched this frame, in dispatch order.
    pub fn fired(&self) -> Vec<RuleKind> {
        match self {
            Self::Skipped(_) => Vec::new(),
            Self::Evaluated(reports) => reports
                .iter()
                .filter(|report| matches!(report.result, Ok(RuleOutcome::Fired)))
                .map(|report| report.kind)
                .collect(),
        }
    }

    pub fn faults(&self) -> Vec<(RuleKind, &RuleFault)> {
        match self {
            Self::Skipped(_) => Vec::new(),
            Self::Evaluated(reports) => reports
                .iter()
                .filter_map(|report| report.result.as_ref().err().map(|fault| (report.kind, fault)))
                .collect(),
        }
    }
}

struct FrameState {
    snapshot: FrameSnapshot,
    proximity: ProximityCache,
}

/// Drives one decision pass per tick: pre-check, ordered rule evaluation,
/// reset. Owns the rules and their cooldown stamps; shares the entity
/// registry with whatever thread feeds it.
pub struct FrameController {
    settings: EngineSettings,
    rules: Vec<Rule>,
    registry: Arc<EntityRegistry>,
    movement: MovementTimer,
    rng: ChaCha8Rng,
    diagnostics: Diagnostics,
    current: Option<FrameState>,
    accumulator: MetricsAccumulator,
    metrics: MetricsHandle,
}

impl FrameController {
    /// Validates `settings` the same way [`reload`](Self::reload) does.
    pub fn new(
        settings: EngineSettings,
        registry: Arc<EntityRegistry>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let verbosity = Verbosity::from_flags(settings.debug, settings.silence_errors);
        let rules = build_rules(&settings);
        info!(rules = rules.len(), verbosity = ?verbosity, "engine_ready");
        Ok(Self {
            rules,
            registry,
            movement: MovementTimer::default(),
            rng: ChaCha8Rng::from_entropy(),
            diagnostics: Diagnostics::tracing(verbosity),
            current: None,
            accumulator: MetricsAccumulator::new(METRICS_INTERVAL, Instant::now()),
            metrics: MetricsHandle::default(),
            settings,
        })
    }

    /// Makes cooldown jitter reproducible.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn with_diagnostics_sink(mut self, sink: Box<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Diagnostics::new(self.diagnostics.verbosity(), sink);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> MetricsHandle {
        self.metrics.clone()
    }

    /// The snapshot of the frame in progress, if the pre-check passed.
    pub fn current_snapshot(&self) -> Option<&FrameSnapshot> {
        self.current.as_ref().map(|state| &state.snapshot)
    }

    /// Decides whether rules may run this frame and, if so, captures the
    /// frame snapshot. Nothing is captured on failure.
    pub fn pre_check(&mut self, world: &dyn WorldState, now: Instant) -> Result<(), NotReady> {
        self.current = None;
        let captured = panic::catch_unwind(AssertUnwindSafe(|| self.capture(world, now)))
            .unwrap_or_else(|payload| Err(NotReady::Panicked(panic_message(payload.as_ref()))));
        match captured {
            Ok(snapshot) => {
                self.current = Some(FrameState {
                    snapshot,
                    proximity: ProximityCache::new(),
                });
                Ok(())
            }
            Err(reason @ (NotReady::WorldFault(_) | NotReady::Panicked(_))) => {
                self.diagnostics
                    .error(|| format!("Frame pre-check failed: {reason}"));
                Err(reason)
            }
            Err(reason) => Err(reason),
        }
    }

    fn capture(&mut self, world: &dyn WorldState, now: Instant) -> Result<FrameSnapshot, NotReady> {
        if !self.settings.enable {
            return Err(NotReady::Disabled);
        }

        let area = world.area()?;
        if area.is_town {
            return Err(NotReady::InTown);
        }
        if self.settings.disable_in_hideout && area.is_hideout {
            return Err(NotReady::InHideout);
        }

        let player = world.local_player()?.ok_or(NotReady::NoPlayer)?;
        if player.current_life <= 0 {
            return Err(NotReady::PlayerDead);
        }

        let buffs = world.buffs()?.ok_or(NotReady::BuffsUnavailable)?;
        if buffs
            .iter()
            .any(|buff| buff.name.eq_ignore_ascii_case(GRACE_PERIOD_BUFF))
        {
            return Err(NotReady::GracePeriod);
        }

        let skills = match world.skills()? {
            Some(skills) if !skills.is_empty() => skills,
            _ => return Err(NotReady::SkillsUnavailable),
        };

        let movement = self.movement.update(player.is_moving, now);
        Ok(FrameSnapshot {
            now,
            hp_percent: player.hp_percent,
            mp_percent: player.mp_percent,
            player_position: player.position,
            buffs: Some(buffs),
            skills: Some(skills),
            movement,
        })
    }

    /// Evaluates every rule once, in priority order, against the captured
    /// frame. A fault in one rule never stops the rest.
    fn evaluate_rules(&mut self, dispatcher: &mut dyn ActionDispatcher) -> Vec<RuleReport> {
        let Some(state) = self.current.as_mut() else {
            return Vec::new();
        };
        let FrameState {
            snapshot,
            proximity,
        } = state;

        let mut ctx = RuleContext {
            snapshot,
            proximity,
            proximity_settings: &self.settings.proximity,
            registry: self.registry.as_ref(),
            dispatcher,
            rng: &mut self.rng,
            diagnostics: &self.diagnostics,
        };

        let mut reports = Vec::with_capacity(self.rules.len());
        for rule in &mut self.rules {
            let kind = rule.kind();
            let result = match panic::catch_unwind(AssertUnwindSafe(|| rule.evaluate(&mut ctx))) {
                Ok(result) => result,
                Err(payload) => Err(RuleFault::Panicked(panic_message(payload.as_ref()))),
            };
            match &result {
                Ok(RuleOutcome::Fired) => self.accumulator.record_fired(),
                Ok(RuleOutcome::Skipped(_)) => {}
                Err(fault) => {
                    self.accumulator.record_fault();
                    ctx.diagnostics
                        .error(|| format!("{} failed: {fault}", kind.label()));
                }
            }
            reports.push(RuleReport { kind, result });
        }
        reports
    }

    /// Drops everything captured for the current frame. Always safe to call.
    pub fn post_reset(&mut self) {
        self.current = None;
    }

    pub fn run_frame(
        &mut self,
        world: &dyn WorldState,
        dispatcher: &mut dyn ActionDispatcher,
        now: Instant,
    ) -> FrameReport {
        let report = match self.pre_check(world, now) {
            Ok(()) => FrameReport::Evaluated(self.evaluate_rules(dispatcher)),
            Err(reason) => {
                trace!(reason = %reason, "frame_skipped");
                FrameReport::Skipped(reason)
            }
        };
        self.post_reset();

        self.accumulator.record_frame(report.is_ready());
        if let Some(snapshot) = self.accumulator.maybe_snapshot(now) {
            self.metrics.publish(snapshot);
        }
        report
    }

    /// Applies new settings: rules are rebuilt (cooldowns start fresh), the
    /// diagnostics policy follows the new flags and tracked entities are
    /// dropped. Invalid settings leave the controller untouched.
    pub fn reload(&mut self, settings: EngineSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        let verbosity = Verbosity::from_flags(settings.debug, settings.silence_errors);
        self.rules = build_rules(&settings);
        self.diagnostics.set_verbosity(verbosity);
        self.registry.clear();
        self.movement.reset();
        self.current = None;
        self.settings = settings;
        info!(rules = self.rules.len(), verbosity = ?verbosity, "settings_reloaded");
        Ok(())
    }

    pub fn shutdown(&mut self) {
        let tracked = self.registry.len();
        self.registry.clear();
        self.movement.reset();
        self.current = None;
        info!(tracked, "engine_shutdown");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
