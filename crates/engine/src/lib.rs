pub mod config;
pub mod diagnostics;
pub mod frame;
pub mod input;
pub mod metrics;
pub mod proximity;
pub mod registry;
pub mod rules;
pub mod snapshot;
pub mod world;

pub use config::{
    load_settings, parse_settings, BuffSkillSettings, ChannelSettings, ConfigError,
    EngineSettings, MovementSkillSettings, PhaseRunSettings, ProximitySettings, VaalSkillSettings,
};
pub use diagnostics::{Diagnostics, DiagnosticsSink, TracingSink, Verbosity};
pub use frame::{FrameController, FrameReport, NotReady, RuleReport};
pub use input::{ActionDispatcher, KeyCode, MouseButton, Trigger};
pub use metrics::{EngineMetricsSnapshot, MetricsHandle};
pub use proximity::{count_within, meets_threshold, qualifies, ProximityCache};
pub use registry::EntityRegistry;
pub use rules::{
    build_rules, catalog_entry, CatalogEntry, ChargeRequirement, Rule, RuleConfig, RuleContext,
    RuleFault, RuleKind, RuleOutcome, SkillRef, SkipReason, FIRE_JITTER_MAX, GRACE_PERIOD_BUFF,
    RULE_ORDER,
};
pub use snapshot::{FrameSnapshot, MovementTimer};
pub use world::{
    AreaInfo, Buff, EntityId, PlayerState, Rarity, Skill, Vec3, WorldEntity, WorldError,
    WorldState,
};

/// Environment variable naming the settings file the host loads at startup.
pub const CONFIG_ENV_VAR: &str = "AUTOCAST_CONFIG";
