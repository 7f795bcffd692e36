use std::sync::Arc;

use crate::config::ProximitySettings;
use crate::registry::EntityRegistry;
use crate::world::{Rarity, Vec3, WorldEntity, WorldError};

/// Whether `entity` counts as a live, visible hostile of at least `min_rarity`.
pub fn qualifies(entity: &dyn WorldEntity, min_rarity: Rarity) -> bool {
    entity.is_targetable()
        && entity.is_alive()
        && entity.is_hostile()
        && !entity.is_hidden()
        && entity.is_valid()
        && entity.rarity() >= min_rarity
}

/// Counts qualifying entities whose planar distance to `origin` is at most
/// `max_distance`. Compared squared; no square roots are taken.
pub fn count_within(
    entities: &[Arc<dyn WorldEntity>],
    origin: Vec3,
    max_distance: f32,
    min_rarity: Rarity,
) -> Result<usize, WorldError> {
    let max_distance_sq = max_distance * max_distance;
    let mut count = 0usize;
    for entity in entities {
        if !qualifies(entity.as_ref(), min_rarity) {
            continue;
        }
        let position = entity.position()?;
        if origin.planar_distance_sq(position) <= max_distance_sq {
            count += 1;
        }
    }
    Ok(count)
}

/// Per-frame memo of registry reads and per-tier counts, so rules sharing the
/// same radius do not rescan the registry.
#[derive(Default)]
pub struct ProximityCache {
    entities: Option<Vec<Arc<dyn WorldEntity>>>,
    counts: [Option<usize>; 4],
}

impl ProximityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(
        &mut self,
        registry: &EntityRegistry,
        origin: Vec3,
        max_distance: f32,
        min_rarity: Rarity,
    ) -> Result<usize, WorldError> {
        if let Some(count) = self.counts[min_rarity.index()] {
            return Ok(count);
        }
        let entities = self.entities.get_or_insert_with(|| registry.snapshot());
        let count = count_within(entities, origin, max_distance, min_rarity)?;
        self.counts[min_rarity.index()] = Some(count);
        Ok(count)
    }

    pub fn cached_count(&self, rarity: Rarity) -> Option<usize> {
        self.counts[rarity.index()]
    }

    pub fn clear(&mut self) {
        self.entities = None;
        self.counts = [None; 4];
    }
}

/// Nearby-monster precondition. The base count is checked first; the magic,
/// rare and unique minimums are independent fallbacks tried in that order,
/// each against its own count. A tier minimum of zero disables that tier.
pub fn meets_threshold(
    settings: &ProximitySettings,
    cache: &mut ProximityCache,
    registry: &EntityRegistry,
    origin: Vec3,
) -> Result<bool, WorldError> {
    if !settings.require_min_count {
        return Ok(true);
    }

    let max_distance = settings.max_distance;
    let base = cache.count(registry, origin, max_distance, Rarity::Normal)?;
    if base >= settings.min_count as usize {
        return Ok(true);
    }

    let tiers = [
        (Rarity::Magic, settings.magic_min_count),
        (Rarity::Rare, settings.rare_min_count),
        (Rarity::Unique, settings.unique_min_count),
    ];
    for (rarity, min_count) in tiers {
        if min_count == 0 {
            continue;
        }
        if cache.count(registry, origin, max_distance, rarity)? >= min_count as usize {
            return Ok(true);
        }
    }
    Ok(false)
}
