mod catalog;
mod evaluator;

use std::time::{Duration, Instant};

use rand::RngCore;
use thiserror::Error;

use crate::config::ProximitySettings;
use crate::diagnostics::Diagnostics;
use crate::input::{ActionDispatcher, Trigger};
use crate::proximity::ProximityCache;
use crate::registry::EntityRegistry;
use crate::snapshot::FrameSnapshot;
use crate::world::WorldError;

pub use catalog::{build_rules, catalog_entry, CatalogEntry, GRACE_PERIOD_BUFF};

/// Upper bound (exclusive) of the random delay added to a rule's fire stamp.
pub const FIRE_JITTER_MAX: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    BladeFlurry,
    ScourgeArrow,
    BloodRage,
    SteelSkin,
    ImmortalCall,
    MoltenShell,
    VaalMoltenShell,
    PhaseRun,
    WitheringStep,
}

impl RuleKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::BladeFlurry => "Blade Flurry",
            Self::ScourgeArrow => "Scourge Arrow",
            Self::BloodRage => "Blood Rage",
            Self::SteelSkin => "Steelskin",
            Self::ImmortalCall => "Immortal Call",
            Self::MoltenShell => "Molten Shell",
            Self::VaalMoltenShell => "Vaal Molten Shell",
            Self::PhaseRun => "Phase Run",
            Self::WitheringStep => "Withering Step",
        }
    }
}

/// Fixed evaluation priority; earlier rules dispatch first within a frame.
pub const RULE_ORDER: [RuleKind; 9] = [
    RuleKind::BladeFlurry,
    RuleKind::ScourgeArrow,
    RuleKind::BloodRage,
    RuleKind::SteelSkin,
    RuleKind::ImmortalCall,
    RuleKind::MoltenShell,
    RuleKind::VaalMoltenShell,
    RuleKind::PhaseRun,
    RuleKind::WitheringStep,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillRef {
    pub name: String,
    pub internal_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequirement {
    pub buff: String,
    pub min_charges: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleConfig {
    pub enabled: bool,
    pub skill: Option<SkillRef>,
    pub cooldown: Duration,
    pub max_hp_percent: Option<f32>,
    pub max_mp_percent: Option<f32>,
    pub min_move_time: Option<Duration>,
    pub absent_buffs: Vec<String>,
    pub present_buff: Option<String>,
    pub charges: Option<ChargeRequirement>,
    pub proximity_gated: bool,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    CoolingDown,
    VitalsAboveCeiling,
    NotMovingLongEnough,
    BuffsUnavailable,
    BlockingBuffActive,
    RequiredBuffMissing,
    NotEnoughCharges,
    SkillsUnavailable,
    SkillUnavailable,
    NotEnoughNearbyMonsters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Fired,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleFault {
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("rule evaluation panicked: {0}")]
    Panicked(String),
}

/// Borrowed view of the frame a rule is evaluated in.
pub struct RuleContext<'a> {
    pub snapshot: &'a FrameSnapshot,
    pub proximity: &'a mut ProximityCache,
    pub proximity_settings: &'a ProximitySettings,
    pub registry: &'a EntityRegistry,
    pub dispatcher: &'a mut dyn ActionDispatcher,
    pub rng: &'a mut dyn RngCore,
    pub diagnostics: &'a Diagnostics,
}

#[derive(Debug, Clone)]
pub struct Rule {
    kind: RuleKind,
    config: RuleConfig,
    last_fired: Option<Instant>,
}

impl Rule {
    pub fn new(kind: RuleKind, config: RuleConfig) -> Self {
        Self {
            kind,
            config,
            last_fired: None,
        }
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Fire stamp of the last successful dispatch, jitter included.
    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.last_fired
            .is_some_and(|last| now.saturating_duration_since(last) < self.config.cooldown)
    }
}
