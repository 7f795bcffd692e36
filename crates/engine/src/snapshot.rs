use std::time::{Duration, Instant};

use crate::world::{Buff, Skill, Vec3};

/// Everything the rules may read during one frame. Captured once by the
/// pre-check; every rule in the frame sees the same values.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub now: Instant,
    pub hp_percent: f32,
    pub mp_percent: f32,
    pub player_position: Vec3,
    pub buffs: Option<Vec<Buff>>,
    pub skills: Option<Vec<Skill>>,
    pub movement: Duration,
}

impl FrameSnapshot {
    pub fn new(now: Instant) -> Self {
        Self {
            now,
            hp_percent: 100.0,
            mp_percent: 100.0,
            player_position: Vec3::default(),
            buffs: Some(Vec::new()),
            skills: Some(Vec::new()),
            movement: Duration::ZERO,
        }
    }

    /// `None` when the buff list is unavailable.
    pub fn has_buff(&self, name: &str) -> Option<bool> {
        self.buffs
            .as_ref()
            .map(|buffs| buffs.iter().any(|buff| buff.name.eq_ignore_ascii_case(name)))
    }

    /// Outer `None` when the buff list is unavailable.
    pub fn buff(&self, name: &str) -> Option<Option<&Buff>> {
        self.buffs
            .as_ref()
            .map(|buffs| buffs.iter().find(|buff| buff.name.eq_ignore_ascii_case(name)))
    }

    /// First immediately usable skill matching either name. Outer `None` when
    /// the skill list is unavailable.
    pub fn usable_skill(&self, name: &str, internal_name: &str) -> Option<Option<&Skill>> {
        self.skills.as_ref().map(|skills| {
            skills.iter().find(|skill| {
                skill.can_be_used && (skill.name == name || skill.internal_name == internal_name)
            })
        })
    }
}

/// Stopwatch for continuous movement. Keeps running across frames while the
/// player moves and drops back to zero on the first still frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementTimer {
    moving_since: Option<Instant>,
}

impl MovementTimer {
    pub fn update(&mut self, is_moving: bool, now: Instant) -> Duration {
        if !is_moving {
            self.moving_since = None;
            return Duration::ZERO;
        }
        let started = *self.moving_since.get_or_insert(now);
        now.saturating_duration_since(started)
    }

    pub fn is_running(&self) -> bool {
        self.moving_since.is_some()
    }

    pub fn reset(&mut self) {
        self.moving_since = None;
    }
}
