use std::time::Duration;

use super::{ChargeRequirement, Rule, RuleConfig, RuleKind, SkillRef, RULE_ORDER};
use crate::config::{BuffSkillSettings, ChannelSettings, EngineSettings, MovementSkillSettings};
use crate::input::{MouseButton, Trigger};

/// Buff granted on area entry; no rule runs while it is up.
pub const GRACE_PERIOD_BUFF: &str = "grace_period";

const BLADE_FLURRY_CHARGES: &str = "charged_attack";
const SCOURGE_ARROW_CHARGES: &str = "virulent_arrow_counter";
const INFUSED_CHANNELLING: &str = "storm_barrier_support_damage";
const BLADE_VORTEX_STACKS: &str = "new_new_blade_vortex";

const KEY_RULE_COOLDOWN: Duration = Duration::from_secs(1);

/// Game-side identity of a rule: the skill it presses and the buff it
/// maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub skill_name: &'static str,
    pub skill_internal_name: &'static str,
    pub buff: &'static str,
    pub cooldown: Duration,
}

pub fn catalog_entry(kind: RuleKind) -> CatalogEntry {
    match kind {
        RuleKind::BladeFlurry => {
            channel_entry("Blade Flurry", "charged_attack_channel", BLADE_FLURRY_CHARGES)
        }
        RuleKind::ScourgeArrow => {
            channel_entry("Scourge Arrow", "virulent_arrow", SCOURGE_ARROW_CHARGES)
        }
        RuleKind::BloodRage => key_entry("Blood Rage", "blood_rage", "blood_rage"),
        RuleKind::SteelSkin => key_entry("Steelskin", "quick_guard", "quick_guard"),
        RuleKind::ImmortalCall => key_entry("Immortal Call", "mana_guard", "mana_guard"),
        RuleKind::MoltenShell => key_entry("Molten Shell", "molten_shell_barrier", "fire_shield"),
        // Shares the regular shell buff: either shell blocks the other.
        RuleKind::VaalMoltenShell => {
            key_entry("Vaal Molten Shell", "vaal_molten_shell", "fire_shield")
        }
        RuleKind::PhaseRun => key_entry("Phase Run", "new_phase_run", "new_phase_run"),
        RuleKind::WitheringStep => key_entry("Withering Step", "slither", "slither"),
    }
}

const fn channel_entry(
    skill_name: &'static str,
    skill_internal_name: &'static str,
    buff: &'static str,
) -> CatalogEntry {
    CatalogEntry {
        skill_name,
        skill_internal_name,
        buff,
        cooldown: Duration::ZERO,
    }
}

const fn key_entry(
    skill_name: &'static str,
    skill_internal_name: &'static str,
    buff: &'static str,
) -> CatalogEntry {
    CatalogEntry {
        skill_name,
        skill_internal_name,
        buff,
        cooldown: KEY_RULE_COOLDOWN,
    }
}

impl CatalogEntry {
    fn skill_ref(&self) -> SkillRef {
        SkillRef {
            name: self.skill_name.to_string(),
            internal_name: self.skill_internal_name.to_string(),
        }
    }
}

/// Builds every rule in evaluation order from the current settings.
pub fn build_rules(settings: &EngineSettings) -> Vec<Rule> {
    RULE_ORDER
        .iter()
        .map(|&kind| Rule::new(kind, rule_config(kind, settings)))
        .collect()
}

fn rule_config(kind: RuleKind, settings: &EngineSettings) -> RuleConfig {
    let entry = catalog_entry(kind);
    match kind {
        RuleKind::BladeFlurry => channel_config(entry, &settings.blade_flurry),
        RuleKind::ScourgeArrow => channel_config(entry, &settings.scourge_arrow),
        RuleKind::BloodRage => buff_skill_config(entry, &settings.blood_rage),
        RuleKind::SteelSkin => buff_skill_config(entry, &settings.steel_skin),
        RuleKind::ImmortalCall => buff_skill_config(entry, &settings.immortal_call),
        RuleKind::MoltenShell => buff_skill_config(entry, &settings.molten_shell),
        RuleKind::VaalMoltenShell => {
            let vaal = &settings.vaal_molten_shell;
            let shared = BuffSkillSettings {
                enabled: vaal.enabled,
                key: vaal.key,
                max_hp_percent: settings.molten_shell.max_hp_percent,
                max_mp_percent: None,
            };
            buff_skill_config(entry, &shared)
        }
        RuleKind::PhaseRun => {
            let phase_run = &settings.phase_run;
            let mut config = movement_config(entry, &phase_run.movement);
            if phase_run.min_blade_vortex_stacks > 0 {
                config.charges = Some(ChargeRequirement {
                    buff: BLADE_VORTEX_STACKS.to_string(),
                    min_charges: phase_run.min_blade_vortex_stacks,
                });
            }
            config
        }
        RuleKind::WitheringStep => movement_config(entry, &settings.withering_step),
    }
}

fn channel_config(entry: CatalogEntry, channel: &ChannelSettings) -> RuleConfig {
    let button = if channel.use_left_click {
        MouseButton::Left
    } else {
        MouseButton::Right
    };
    RuleConfig {
        enabled: channel.enabled,
        skill: None,
        cooldown: entry.cooldown,
        max_hp_percent: None,
        max_mp_percent: None,
        min_move_time: None,
        absent_buffs: Vec::new(),
        present_buff: channel
            .wait_for_infused
            .then(|| INFUSED_CHANNELLING.to_string()),
        charges: Some(ChargeRequirement {
            buff: entry.buff.to_string(),
            min_charges: channel.min_charges,
        }),
        proximity_gated: false,
        trigger: Trigger::MousePulse(button),
    }
}

fn buff_skill_config(entry: CatalogEntry, skill: &BuffSkillSettings) -> RuleConfig {
    RuleConfig {
        enabled: skill.enabled,
        skill: Some(entry.skill_ref()),
        cooldown: entry.cooldown,
        max_hp_percent: Some(skill.max_hp_percent),
        max_mp_percent: skill.max_mp_percent,
        min_move_time: None,
        absent_buffs: vec![entry.buff.to_string()],
        present_buff: None,
        charges: None,
        proximity_gated: true,
        trigger: Trigger::Key(skill.key),
    }
}

fn movement_config(entry: CatalogEntry, movement: &MovementSkillSettings) -> RuleConfig {
    RuleConfig {
        enabled: movement.enabled,
        skill: Some(entry.skill_ref()),
        cooldown: entry.cooldown,
        max_hp_percent: Some(movement.max_hp_percent),
        max_mp_percent: None,
        min_move_time: Some(Duration::from_millis(movement.min_move_time_ms)),
        absent_buffs: vec![entry.buff.to_string()],
        present_buff: None,
        charges: None,
        proximity_gated: true,
        trigger: Trigger::Key(movement.key),
    }
}
