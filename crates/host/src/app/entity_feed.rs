use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use engine::{EntityId, EntityRegistry, Rarity, Vec3, WorldEntity, WorldError};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use super::loop_runner::AppError;

const FEED_THREAD_NAME: &str = "entity-feed";
const FEED_INTERVAL: Duration = Duration::from_millis(150);
const MAX_LIVE_ENTITIES: usize = 24;
const SPAWN_RADIUS: f32 = 900.0;

struct SimEntity {
    id: EntityId,
    monster: bool,
    position: Vec3,
    rarity: Rarity,
}

impl WorldEntity for SimEntity {
    fn id(&self) -> EntityId {
        self.id
    }

    fn is_monster(&self) -> bool {
        self.monster
    }

    fn position(&self) -> Result<Vec3, WorldError> {
        Ok(self.position)
    }

    fn rarity(&self) -> Rarity {
        self.rarity
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

/// Owns the simulated entities and reports their arrival and departure to
/// the registry, the way a game client's entity notifications would.
struct FeedState {
    rng: ChaCha8Rng,
    live: VecDeque<Arc<dyn WorldEntity>>,
    next_id: u64,
}

impl FeedState {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            live: VecDeque::new(),
            next_id: 1,
        }
    }

    fn step(&mut self, registry: &EntityRegistry) {
        let despawn = self.live.len() >= MAX_LIVE_ENTITIES
            || (!self.live.is_empty() && self.rng.gen_bool(0.3));
        if despawn {
            if let Some(gone) = self.live.pop_front() {
                let removed = registry.remove(gone.id());
                debug!(id = gone.id().0, removed, "entity_removed");
            }
            return;
        }

        let entity: Arc<dyn WorldEntity> = Arc::new(self.spawn_entity());
        let added = registry.add(&entity);
        debug!(
            id = entity.id().0,
            rarity = entity.rarity().as_token(),
            added,
            "entity_added"
        );
        self.live.push_back(entity);
    }

    fn spawn_entity(&mut self) -> SimEntity {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        let rarity = match self.rng.gen_range(0..100) {
            0..=69 => Rarity::Normal,
            70..=89 => Rarity::Magic,
            90..=97 => Rarity::Rare,
            _ => Rarity::Unique,
        };
        SimEntity {
            id,
            monster: self.rng.gen_bool(0.85),
            position: Vec3::new(
                self.rng.gen_range(-SPAWN_RADIUS..SPAWN_RADIUS),
                self.rng.gen_range(-SPAWN_RADIUS..SPAWN_RADIUS),
                0.0,
            ),
            rarity,
        }
    }
}

pub(crate) struct EntityFeed {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl EntityFeed {
    pub(crate) fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        if self.handle.join().is_err() {
            warn!(thread = FEED_THREAD_NAME, "feed_thread_panicked");
        }
    }
}

pub(crate) fn spawn(registry: Arc<EntityRegistry>, seed: u64) -> Result<EntityFeed, AppError> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let handle = thread::Builder::new()
        .name(FEED_THREAD_NAME.to_string())
        .spawn(move || {
            let mut state = FeedState::new(seed);
            info!(seed, "entity_feed_started");
            while !stop_flag.load(Ordering::Relaxed) {
                state.step(&registry);
                thread::sleep(FEED_INTERVAL);
            }
            info!(live = state.live.len(), "entity_feed_stopped");
        })
        .map_err(|source| AppError::SpawnThread {
            name: FEED_THREAD_NAME,
            source,
        })?;
    Ok(EntityFeed { stop, handle })
}
