use std::time::Duration;

use rand::Rng;

use super::{Rule, RuleContext, RuleFault, RuleOutcome, SkipReason, FIRE_JITTER_MAX};
use crate::proximity::meets_threshold;

impl Rule {
    /// Runs the gate chain once. Every failed gate is a silent skip; only
    /// collaborator faults come back as `Err`.
    pub fn evaluate(&mut self, ctx: &mut RuleContext<'_>) -> Result<RuleOutcome, RuleFault> {
        let outcome = match self.check_gates(ctx)? {
            Some(reason) => RuleOutcome::Skipped(reason),
            None => {
                self.fire(ctx);
                RuleOutcome::Fired
            }
        };
        Ok(outcome)
    }

    fn check_gates(&self, ctx: &mut RuleContext<'_>) -> Result<Option<SkipReason>, RuleFault> {
        let config = &self.config;
        let snapshot = ctx.snapshot;
        let label = self.kind.label();

        if !config.enabled {
            return Ok(Some(SkipReason::Disabled));
        }

        if self.is_cooling_down(snapshot.now) {
            return Ok(Some(SkipReason::CoolingDown));
        }

        let hp_exceeded = config
            .max_hp_percent
            .is_some_and(|max| snapshot.hp_percent > max);
        let mp_exceeded = config
            .max_mp_percent
            .is_some_and(|max| snapshot.mp_percent > max);
        if hp_exceeded || mp_exceeded {
            return Ok(Some(SkipReason::VitalsAboveCeiling));
        }

        if config
            .min_move_time
            .is_some_and(|min| snapshot.movement < min)
        {
            return Ok(Some(SkipReason::NotMovingLongEnough));
        }

        for name in &config.absent_buffs {
            match snapshot.has_buff(name) {
                None => return Ok(Some(buffs_unavailable(ctx, label))),
                Some(true) => return Ok(Some(SkipReason::BlockingBuffActive)),
                Some(false) => {}
            }
        }

        // Charges before the infused buff, so a building channel reports
        // NotEnoughCharges.
        if let Some(requirement) = &config.charges {
            match snapshot.buff(&requirement.buff) {
                None => return Ok(Some(buffs_unavailable(ctx, label))),
                Some(Some(buff)) if buff.charges >= requirement.min_charges => {}
                Some(_) => return Ok(Some(SkipReason::NotEnoughCharges)),
            }
        }

        if let Some(name) = &config.present_buff {
            match snapshot.has_buff(name) {
                None => return Ok(Some(buffs_unavailable(ctx, label))),
                Some(false) => return Ok(Some(SkipReason::RequiredBuffMissing)),
                Some(true) => {}
            }
        }

        if let Some(skill) = &config.skill {
            match snapshot.usable_skill(&skill.name, &skill.internal_name) {
                None => {
                    ctx.diagnostics
                        .error(|| format!("{label}: requested usable skill, but skill list is unavailable."));
                    return Ok(Some(SkipReason::SkillsUnavailable));
                }
                Some(None) => {
                    ctx.diagnostics
                        .debug(|| format!("Can not cast {label} - not found in usable skills."));
                    return Ok(Some(SkipReason::SkillUnavailable));
                }
                Some(Some(_)) => {}
            }
        }

        if config.proximity_gated {
            let met = meets_threshold(
                ctx.proximity_settings,
                ctx.proximity,
                ctx.registry,
                snapshot.player_position,
            )?;
            if !met {
                ctx.diagnostics
                    .debug(|| format!("{label}: nearby monster check failed."));
                return Ok(Some(SkipReason::NotEnoughNearbyMonsters));
            }
        }

        Ok(None)
    }

    fn fire(&mut self, ctx: &mut RuleContext<'_>) {
        let label = self.kind.label();
        match &self.config.charges {
            Some(requirement) => {
                let charges = ctx
                    .snapshot
                    .buff(&requirement.buff)
                    .flatten()
                    .map_or(0, |buff| buff.charges);
                ctx.diagnostics
                    .debug(|| format!("Releasing {label} at {charges} charges."));
            }
            None => ctx.diagnostics.debug(|| format!("Casting {label}")),
        }

        self.config.trigger.dispatch(ctx.dispatcher);
        let jitter_nanos = ctx.rng.gen_range(0..FIRE_JITTER_MAX.as_nanos() as u64);
        self.last_fired = Some(ctx.snapshot.now + Duration::from_nanos(jitter_nanos));
    }
}

fn buffs_unavailable(ctx: &RuleContext<'_>, label: &str) -> SkipReason {
    ctx.diagnostics
        .error(|| format!("{label}: requested buff check, but buff list is unavailable."));
    SkipReason::BuffsUnavailable
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::config::ProximitySettings;
    use crate::diagnostics::testing::{Line, MemorySink};
    use crate::diagnostics::{Diagnostics, Verbosity};
    use crate::input::{ActionDispatcher, KeyCode, MouseButton, Trigger};
    use crate::proximity::ProximityCache;
    use crate::registry::EntityRegistry;
    use crate::rules::{ChargeRequirement, RuleConfig, RuleKind, SkillRef};
    use crate::snapshot::FrameSnapshot;
    use crate::world::{
        Buff, EntityId, Rarity, Skill, Vec3, WorldEntity, WorldError,
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Key(KeyCode),
        Down(MouseButton),
        Up(MouseButton),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl ActionDispatcher for Recorder {
        fn press_key(&mut self, key: KeyCode) {
            self.calls.push(Call::Key(key));
        }

        fn mouse_down(&mut self, button: MouseButton) {
            self.calls.push(Call::Down(button));
        }

        fn mouse_up(&mut self, button: MouseButton) {
            self.calls.push(Call::Up(button));
        }
    }

    struct Hostile {
        id: u64,
        position: Result<Vec3, WorldError>,
    }

    impl WorldEntity for Hostile {
        fn id(&self) -> EntityId {
            EntityId(self.id)
        }

        fn is_monster(&self) -> bool {
            true
        }

        fn position(&self) -> Result<Vec3, WorldError> {
            self.position.clone()
        }

        fn rarity(&self) -> Rarity {
            Rarity::Normal
        }

        fn is_alive(&self) -> bool {
            true
        }

        fn is_targetable(&self) -> bool {
            true
        }

        fn is_hostile(&self) -> bool {
            true
        }

        fn is_hidden(&self) -> bool {
            false
        }

        fn is_valid(&self) -> bool {
            true
        }
    }

    struct Harness {
        registry: EntityRegistry,
        entities: Vec<Arc<dyn WorldEntity>>,
        proximity: ProximityCache,
        proximity_settings: ProximitySettings,
        dispatcher: Recorder,
        rng: ChaCha8Rng,
        sink: MemorySink,
        diagnostics: Diagnostics,
    }

    impl Harness {
        fn new() -> Self {
            let sink = MemorySink::default();
            Self {
                registry: EntityRegistry::new(),
                entities: Vec::new(),
                proximity: ProximityCache::new(),
                proximity_settings: ProximitySettings {
                    require_min_count: true,
                    min_count: 2,
                    max_distance: 10.0,
                    ..ProximitySettings::default()
                },
                dispatcher: Recorder::default(),
                rng: ChaCha8Rng::seed_from_u64(7),
                diagnostics: Diagnostics::new(Verbosity::Debug, Box::new(sink.clone())),
                sink,
            }
        }

        fn spawn_hostile(&mut self, id: u64, x: f32) {
            let entity: Arc<dyn WorldEntity> = Arc::new(Hostile {
                id,
                position: Ok(Vec3::new(x, 0.0, 0.0)),
            });
            self.registry.add(&entity);
            self.entities.push(entity);
        }

        fn spawn_broken(&mut self, id: u64) {
            let entity: Arc<dyn WorldEntity> = Arc::new(Hostile {
                id,
                position: Err(WorldError::StaleEntity(EntityId(id))),
            });
            self.registry.add(&entity);
            self.entities.push(entity);
        }

        fn evaluate(&mut self, rule: &mut Rule, snapshot: &FrameSnapshot) -> Result<RuleOutcome, RuleFault> {
            self.proximity.clear();
            let mut ctx = RuleContext {
                snapshot,
                proximity: &mut self.proximity,
                proximity_settings: &self.proximity_settings,
                registry: &self.registry,
                dispatcher: &mut self.dispatcher,
                rng: &mut self.rng,
                diagnostics: &self.diagnostics,
            };
            rule.evaluate(&mut ctx)
        }
    }

    fn steel_skin(max_hp_percent: f32) -> Rule {
        Rule::new(
            RuleKind::SteelSkin,
            RuleConfig {
                enabled: true,
                skill: Some(SkillRef {
                    name: "Steelskin".to_string(),
                    internal_name: "quick_guard".to_string(),
                }),
                cooldown: Duration::from_secs(1),
                max_hp_percent: Some(max_hp_percent),
                max_mp_percent: None,
                min_move_time: None,
                absent_buffs: vec!["quick_guard".to_string()],
                present_buff: None,
                charges: None,
                proximity_gated: true,
                trigger: Trigger::Key(KeyCode::W),
            },
        )
    }

    fn ready_snapshot(now: Instant, hp_percent: f32) -> FrameSnapshot {
        FrameSnapshot {
            hp_percent,
            skills: Some(vec![Skill::new("Steelskin", "quick_guard", true)]),
            ..FrameSnapshot::new(now)
        }
    }

    #[test]
    fn hp_above_ceiling_never_fires() {
        let mut harness = Harness::new();
        for (id, x) in [(1, 1.0), (2, 2.0), (3, 3.0)] {
            harness.spawn_hostile(id, x);
        }
        let mut rule = steel_skin(30.0);
        let snapshot = ready_snapshot(Instant::now(), 50.0);

        let outcome = harness.evaluate(&mut rule, &snapshot).expect("evaluate");
        assert_eq!(outcome, RuleOutcome::Skipped(SkipReason::VitalsAboveCeiling));
        assert!(harness.dispatcher.calls.is_empty());
        assert_eq!(rule.last_fired(), None);
    }

    #[test]
    fn all_gates_passing_fires_once_with_jittered_stamp() {
        let mut harness = Harness::new();
        for (id, x) in [(1, 1.0), (2, 2.0), (3, 3.0)] {
            harness.spawn_hostile(id, x);
        }
        let mut rule = steel_skin(30.0);
        let now = Instant::now();
        let snapshot = ready_snapshot(now, 20.0);

        let outcome = harness.evaluate(&mut rule, &snapshot).expect("evaluate");
        assert_eq!(outcome, RuleOutcome::Fired);
        assert_eq!(harness.dispatcher.calls, vec![Call::Key(KeyCode::W)]);
        let stamp = rule.last_fired().expect("stamp");
        let jitter = stamp.duration_since(now);
        assert!(jitter < FIRE_JITTER_MAX, "jitter {jitter:?}");
        assert!(harness
            .sink
            .lines()
            .contains(&Line::Debug("Casting Steelskin".to_string())));
    }

    #[test]
    fn cooldown_blocks_until_elapsed_past_jittered_stamp() {
        let mut harness = Harness::new();
        harness.spawn_hostile(1, 1.0);
        harness.spawn_hostile(2, 1.0);
        let mut rule = steel_skin(100.0);
        let base = Instant::now();

        let first = harness
            .evaluate(&mut rule, &ready_snapshot(base, 10.0))
            .expect("evaluate");
        assert_eq!(first, RuleOutcome::Fired);
        let stamp = rule.last_fired().expect("stamp");

        let early = harness
            .evaluate(&mut rule, &ready_snapshot(base + Duration::from_millis(900), 10.0))
            .expect("evaluate");
        assert_eq!(early, RuleOutcome::Skipped(SkipReason::CoolingDown));

        let late = harness
            .evaluate(&mut rule, &ready_snapshot(stamp + Duration::from_secs(1), 10.0))
            .expect("evaluate");
        assert_eq!(late, RuleOutcome::Fired);
        assert_eq!(harness.dispatcher.calls.len(), 2);
    }

    #[test]
    fn disabled_rule_is_skipped_first() {
        let mut harness = Harness::new();
        let mut rule = steel_skin(100.0);
        rule.config.enabled = false;
        let snapshot = FrameSnapshot {
            buffs: None,
            skills: None,
            ..FrameSnapshot::new(Instant::now())
        };
        let outcome = harness.evaluate(&mut rule, &snapshot).expect("evaluate");
        assert_eq!(outcome, RuleOutcome::Skipped(SkipReason::Disabled));
        assert!(harness.sink.lines().is_empty());
    }

    #[test]
    fn mp_ceiling_applies_when_configured() {
        let mut harness = Harness::new();
        harness.proximity_settings.require_min_count = false;
        let mut rule = steel_skin(100.0);
        rule.config.max_mp_percent = Some(40.0);
        let snapshot = FrameSnapshot {
            mp_percent: 60.0,
            ..ready_snapshot(Instant::now(), 10.0)
        };
        let outcome = harness.evaluate(&mut rule, &snapshot).expect("evaluate");
        assert_eq!(outcome, RuleOutcome::Skipped(SkipReason::VitalsAboveCeiling));
    }

    #[test]
    fn movement_gate_requires_minimum_duration() {
        let mut harness = Harness::new();
        harness.proximity_settings.require_min_count = false;
        let mut rule = steel_skin(100.0);
        rule.config.min_move_time = Some(Duration::from_millis(500));
        let now = Instant::now();

        let still = FrameSnapshot {
            movement: Duration::from_millis(499),
            ..ready_snapshot(now, 10.0)
        };
        assert_eq!(
            harness.evaluate(&mut rule, &still).expect("evaluate"),
            RuleOutcome::Skipped(SkipReason::NotMovingLongEnough)
        );

        let moving = FrameSnapshot {
            movement: Duration::from_millis(500),
            ..ready_snapshot(now, 10.0)
        };
        assert_eq!(harness.evaluate(&mut rule, &moving).expect("evaluate"), RuleOutcome::Fired);
    }

    #[test]
    fn active_buff_blocks_recast_case_insensitively() {
        let mut harness = Harness::new();
        harness.proximity_settings.require_min_count = false;
        let mut rule = steel_skin(100.0);
        let snapshot = FrameSnapshot {
            buffs: Some(vec![Buff::new("Quick_Guard", 0)]),
            ..ready_snapshot(Instant::now(), 10.0)
        };
        assert_eq!(
            harness.evaluate(&mut rule, &snapshot).expect("evaluate"),
            RuleOutcome::Skipped(SkipReason::BlockingBuffActive)
        );
    }

    #[test]
    fn unavailable_buffs_skip_with_error_diagnostic() {
        let mut harness = Harness::new();
        let mut rule = steel_skin(100.0);
        let snapshot = FrameSnapshot {
            buffs: None,
            ..ready_snapshot(Instant::now(), 10.0)
        };
        assert_eq!(
            harness.evaluate(&mut rule, &snapshot).expect("evaluate"),
            RuleOutcome::Skipped(SkipReason::BuffsUnavailable)
        );
        assert_eq!(harness.sink.errors().len(), 1);
        assert!(harness.dispatcher.calls.is_empty());
    }

    #[test]
    fn missing_skill_logs_debug_and_skips() {
        let mut harness = Harness::new();
        let mut rule = steel_skin(100.0);
        let snapshot = FrameSnapshot {
            skills: Some(vec![Skill::new("Steelskin", "quick_guard", false)]),
            ..FrameSnapshot::new(Instant::now())
        };
        assert_eq!(
            harness.evaluate(&mut rule, &snapshot).expect("evaluate"),
            RuleOutcome::Skipped(SkipReason::SkillUnavailable)
        );
        assert!(harness.sink.lines().contains(&Line::Debug(
            "Can not cast Steelskin - not found in usable skills.".to_string()
        )));
    }

    #[test]
    fn too_few_nearby_monsters_skips() {
        let mut harness = Harness::new();
        harness.spawn_hostile(1, 1.0);
        harness.spawn_hostile(2, 50.0);
        let mut rule = steel_skin(100.0);
        let outcome = harness
            .evaluate(&mut rule, &ready_snapshot(Instant::now(), 10.0))
            .expect("evaluate");
        assert_eq!(outcome, RuleOutcome::Skipped(SkipReason::NotEnoughNearbyMonsters));
    }

    #[test]
    fn proximity_fault_is_returned_not_swallowed() {
        let mut harness = Harness::new();
        harness.spawn_broken(4);
        let mut rule = steel_skin(100.0);
        let result = harness.evaluate(&mut rule, &ready_snapshot(Instant::now(), 10.0));
        assert_eq!(
            result,
            Err(RuleFault::World(WorldError::StaleEntity(EntityId(4))))
        );
        assert_eq!(rule.last_fired(), None);
    }

    fn blade_flurry(wait_for_infused: bool) -> Rule {
        Rule::new(
            RuleKind::BladeFlurry,
            RuleConfig {
                enabled: true,
                skill: None,
                cooldown: Duration::ZERO,
                max_hp_percent: None,
                max_mp_percent: None,
                min_move_time: None,
                absent_buffs: Vec::new(),
                present_buff: wait_for_infused.then(|| "infused_channelling".to_string()),
                charges: Some(ChargeRequirement {
                    buff: "charged_attack".to_string(),
                    min_charges: 6,
                }),
                proximity_gated: false,
                trigger: Trigger::MousePulse(MouseButton::Right),
            },
        )
    }

    #[test]
    fn channel_release_waits_for_charges_then_pulses_mouse() {
        let mut harness = Harness::new();
        let mut rule = blade_flurry(false);
        let now = Instant::now();

        let building = FrameSnapshot {
            buffs: Some(vec![Buff::new("charged_attack", 5)]),
            ..FrameSnapshot::new(now)
        };
        assert_eq!(
            harness.evaluate(&mut rule, &building).expect("evaluate"),
            RuleOutcome::Skipped(SkipReason::NotEnoughCharges)
        );

        let charged = FrameSnapshot {
            buffs: Some(vec![Buff::new("charged_attack", 6)]),
            ..FrameSnapshot::new(now)
        };
        assert_eq!(harness.evaluate(&mut rule, &charged).expect("evaluate"), RuleOutcome::Fired);
        assert_eq!(
            harness.dispatcher.calls,
            vec![Call::Up(MouseButton::Right), Call::Down(MouseButton::Right)]
        );
        assert!(harness.sink.lines().contains(&Line::Debug(
            "Releasing Blade Flurry at 6 charges.".to_string()
        )));
    }

    #[test]
    fn channel_release_without_charge_buff_is_skipped() {
        let mut harness = Harness::new();
        let mut rule = blade_flurry(false);
        let snapshot = FrameSnapshot::new(Instant::now());
        assert_eq!(
            harness.evaluate(&mut rule, &snapshot).expect("evaluate"),
            RuleOutcome::Skipped(SkipReason::NotEnoughCharges)
        );
    }

    #[test]
    fn channel_release_can_wait_for_infused_buff() {
        let mut harness = Harness::new();
        let mut rule = blade_flurry(true);
        let now = Instant::now();
        let not_infused = FrameSnapshot {
            buffs: Some(vec![Buff::new("charged_attack", 6)]),
            ..FrameSnapshot::new(now)
        };
        assert_eq!(
            harness.evaluate(&mut rule, &not_infused).expect("evaluate"),
            RuleOutcome::Skipped(SkipReason::RequiredBuffMissing)
        );

        let infused = FrameSnapshot {
            buffs: Some(vec![
                Buff::new("charged_attack", 6),
                Buff::new("infused_channelling", 0),
            ]),
            ..FrameSnapshot::new(now)
        };
        assert_eq!(harness.evaluate(&mut rule, &infused).expect("evaluate"), RuleOutcome::Fired);
    }

    #[test]
    fn missing_charges_are_reported_before_missing_infused_buff() {
        let mut harness = Harness::new();
        let mut rule = blade_flurry(true);
        let building = FrameSnapshot {
            buffs: Some(vec![Buff::new("charged_attack", 2)]),
            ..FrameSnapshot::new(Instant::now())
        };
        assert_eq!(
            harness.evaluate(&mut rule, &building).expect("evaluate"),
            RuleOutcome::Skipped(SkipReason::NotEnoughCharges)
        );
        assert!(harness.dispatcher.calls.is_empty());
    }

    #[test]
    fn zero_cooldown_rule_can_fire_on_consecutive_frames() {
        let mut harness = Harness::new();
        let mut rule = blade_flurry(false);
        let now = Instant::now();
        let charged = FrameSnapshot {
            buffs: Some(vec![Buff::new("charged_attack", 8)]),
            ..FrameSnapshot::new(now)
        };
        assert_eq!(harness.evaluate(&mut rule, &charged).expect("evaluate"), RuleOutcome::Fired);
        let next = FrameSnapshot {
            now: now + Duration::from_millis(16),
            ..charged.clone()
        };
        assert_eq!(harness.evaluate(&mut rule, &next).expect("evaluate"), RuleOutcome::Fired);
    }
}
