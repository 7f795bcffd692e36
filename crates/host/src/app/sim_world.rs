use std::collections::HashMap;
use std::time::Duration;

use engine::{
    catalog_entry, AreaInfo, Buff, EngineSettings, KeyCode, PlayerState, RuleKind, Skill, Trigger,
    Vec3, WorldError, WorldState, RULE_ORDER,
};
use tracing::debug;

const BUFF_DURATION: Duration = Duration::from_secs(4);
const CHARGE_INTERVAL: Duration = Duration::from_millis(250);
const MAX_CHANNEL_CHARGES: u32 = 10;
const MOVE_CYCLE_SECS: f32 = 6.0;
const MOVING_SECS_PER_CYCLE: f32 = 4.0;

#[derive(Debug, Clone)]
struct TimedBuff {
    name: &'static str,
    remaining: Duration,
}

/// Scripted stand-in for a game client: vitals swing on a slow wave, the
/// player alternates between running and standing, channel charges build up
/// and key presses grant the matching buff for a few seconds.
pub(crate) struct SimWorld {
    elapsed: Duration,
    player: PlayerState,
    buffs: Vec<TimedBuff>,
    skills: Vec<Skill>,
    key_buffs: HashMap<KeyCode, &'static str>,
    channel_buffs: Vec<&'static str>,
    channel_charges: u32,
    charge_clock: Duration,
}

impl SimWorld {
    pub(crate) fn new(settings: &EngineSettings) -> Self {
        let skills = RULE_ORDER
            .iter()
            .map(|&kind| {
                let entry = catalog_entry(kind);
                Skill::new(entry.skill_name, entry.skill_internal_name, true)
            })
            .collect();

        let key_bindings = [
            (RuleKind::BloodRage, settings.blood_rage.key),
            (RuleKind::SteelSkin, settings.steel_skin.key),
            (RuleKind::ImmortalCall, settings.immortal_call.key),
            (RuleKind::MoltenShell, settings.molten_shell.key),
            (RuleKind::VaalMoltenShell, settings.vaal_molten_shell.key),
            (RuleKind::PhaseRun, settings.phase_run.movement.key),
            (RuleKind::WitheringStep, settings.withering_step.key),
        ];
        let key_buffs = key_bindings
            .into_iter()
            .map(|(kind, key)| (key, catalog_entry(kind).buff))
            .collect();

        Self {
            elapsed: Duration::ZERO,
            player: PlayerState {
                current_life: 1000,
                hp_percent: 100.0,
                mp_percent: 100.0,
                position: Vec3::default(),
                is_moving: false,
            },
            buffs: Vec::new(),
            skills,
            key_buffs,
            channel_buffs: vec![
                catalog_entry(RuleKind::BladeFlurry).buff,
                catalog_entry(RuleKind::ScourgeArrow).buff,
            ],
            channel_charges: 0,
            charge_clock: Duration::ZERO,
        }
    }

    pub(crate) fn advance(&mut self, dt: Duration) {
        self.elapsed = self.elapsed.saturating_add(dt);
        let t = self.elapsed.as_secs_f32();

        self.player.hp_percent = (55.0 + 45.0 * (t * 0.4).sin()).clamp(1.0, 100.0);
        self.player.mp_percent = (60.0 + 40.0 * (t * 0.25).cos()).clamp(0.0, 100.0);
        self.player.current_life = (self.player.hp_percent * 10.0) as i32;
        self.player.is_moving = t % MOVE_CYCLE_SECS < MOVING_SECS_PER_CYCLE;

        for buff in &mut self.buffs {
            buff.remaining = buff.remaining.saturating_sub(dt);
        }
        self.buffs.retain(|buff| !buff.remaining.is_zero());

        self.charge_clock = self.charge_clock.saturating_add(dt);
        while self.charge_clock >= CHARGE_INTERVAL {
            self.charge_clock -= CHARGE_INTERVAL;
            self.channel_charges = (self.channel_charges + 1).min(MAX_CHANNEL_CHARGES);
        }
    }

    /// Reacts to the input the engine sent during the last frame.
    pub(crate) fn apply(&mut self, actions: Vec<Trigger>) {
        for action in actions {
            match action {
                Trigger::Key(key) => {
                    let Some(&name) = self.key_buffs.get(&key) else {
                        continue;
                    };
                    self.buffs.retain(|buff| buff.name != name);
                    self.buffs.push(TimedBuff {
                        name,
                        remaining: BUFF_DURATION,
                    });
                    debug!(buff = name, "sim_buff_granted");
                }
                Trigger::MousePulse(_) => {
                    debug!(charges = self.channel_charges, "sim_channel_released");
                    self.channel_charges = 0;
                    self.charge_clock = Duration::ZERO;
                }
            }
        }
    }
}

impl WorldState for SimWorld {
    fn area(&self) -> Result<AreaInfo, WorldError> {
        Ok(AreaInfo::default())
    }

    fn local_player(&self) -> Result<Option<PlayerState>, WorldError> {
        Ok(Some(self.player))
    }

    fn buffs(&self) -> Result<Option<Vec<Buff>>, WorldError> {
        let mut buffs: Vec<Buff> = self
            .buffs
            .iter()
            .map(|buff| Buff::new(buff.name, 0))
            .collect();
        if self.channel_charges > 0 {
            buffs.extend(
                self.channel_buffs
                    .iter()
                    .map(|&name| Buff::new(name, self.channel_charges)),
            );
        }
        Ok(Some(buffs))
    }

    fn skills(&self) -> Result<Option<Vec<Skill>>, WorldError> {
        Ok(Some(self.skills.clone()))
    }
}
