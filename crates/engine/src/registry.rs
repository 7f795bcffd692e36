use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::warn;

use crate::world::{EntityId, WorldEntity};

static REGISTRY_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_registry_lock_poison_once(operation: &'static str) {
    if REGISTRY_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "registry lock poisoned; recovered inner value");
    }
}

/// Set of monsters currently loaded in the world.
///
/// Fed by entity added/removed notifications from a world thread and read by
/// the tick thread. Readers always work on a [`snapshot`](Self::snapshot) so
/// the lock is never held while positions are evaluated.
#[derive(Default)]
pub struct EntityRegistry {
    tracked: Mutex<HashMap<EntityId, Weak<dyn WorldEntity>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `entity` if it is a monster. Returns whether membership changed.
    /// An entry whose entity the world already dropped is replaced.
    pub fn add(&self, entity: &Arc<dyn WorldEntity>) -> bool {
        if !entity.is_monster() {
            return false;
        }
        let id = entity.id();
        let weak = Arc::downgrade(entity);
        let mut tracked = self.lock("add");
        if tracked
            .get(&id)
            .is_some_and(|existing| existing.strong_count() > 0)
        {
            return false;
        }
        tracked.insert(id, weak);
        true
    }

    pub fn remove(&self, id: EntityId) -> bool {
        self.lock("remove").remove(&id).is_some()
    }

    /// Point-in-time copy of the tracked entities. Entities the world has
    /// already dropped are left out and forgotten.
    pub fn snapshot(&self) -> Vec<Arc<dyn WorldEntity>> {
        let weak_refs = {
            let mut tracked = self.lock("snapshot");
            tracked.retain(|_, weak| weak.strong_count() > 0);
            tracked.values().cloned().collect::<Vec<_>>()
        };
        weak_refs.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn len(&self) -> usize {
        self.lock("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock("clear").clear();
    }

    fn lock(&self, operation: &'static str) -> MutexGuard<'_, HashMap<EntityId, Weak<dyn WorldEntity>>> {
        match self.tracked.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_registry_lock_poison_once(operation);
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::world::{Rarity, Vec3, WorldError};

    struct Dummy {
        id: u64,
        monster: bool,
    }

    impl WorldEntity for Dummy {
        fn id(&self) -> EntityId {
            EntityId(self.id)
        }

        fn is_monster(&self) -> bool {
            self.monster
        }

        fn position(&self) -> Result<Vec3, WorldError> {
            Ok(Vec3::default())
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

    fn monster(id: u64) -> Arc<dyn WorldEntity> {
        Arc::new(Dummy { id, monster: true })
    }

    #[test]
    fn add_ignores_non_monsters() {
        let registry = EntityRegistry::new();
        let chest: Arc<dyn WorldEntity> = Arc::new(Dummy {
            id: 1,
            monster: false,
        });
        assert!(!registry.add(&chest));
        assert!(registry.is_empty());
    }

    #[test]
    fn add_has_set_semantics() {
        let registry = EntityRegistry::new();
        let entity = monster(7);
        assert!(registry.add(&entity));
        assert!(!registry.add(&entity));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn add_then_remove_leaves_registry_empty() {
        let registry = EntityRegistry::new();
        let entity = monster(3);
        registry.add(&entity);
        assert!(registry.remove(EntityId(3)));
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn snapshot_between_add_and_remove_contains_exactly_that_entity() {
        let registry = EntityRegistry::new();
        let entity = monster(3);
        registry.add(&entity);
        let snapshot = registry.snapshot();
        registry.remove(EntityId(3));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), EntityId(3));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_of_unknown_entity_is_a_no_op() {
        let registry = EntityRegistry::new();
        registry.add(&monster(1));
        assert!(!registry.remove(EntityId(99)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn snapshot_skips_entities_dropped_by_the_world() {
        let registry = EntityRegistry::new();
        let kept = monster(1);
        registry.add(&kept);
        {
            let dropped = monster(2);
            registry.add(&dropped);
        }
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), EntityId(1));
    }

    #[test]
    fn re_adding_an_id_whose_entity_was_dropped_tracks_the_new_entity() {
        let registry = EntityRegistry::new();
        registry.add(&monster(5));

        let respawned = monster(5);
        assert!(registry.add(&respawned));
        assert_eq!(registry.len(), 1);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), EntityId(5));
    }

    #[test]
    fn snapshot_forgets_dropped_entities() {
        let registry = EntityRegistry::new();
        let kept = monster(1);
        registry.add(&kept);
        registry.add(&monster(2));
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.snapshot().len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concurrent_add_remove_and_snapshot_do_not_deadlock() {
        let registry = Arc::new(EntityRegistry::new());
        let entities = (0..64).map(monster).collect::<Vec<_>>();

        thread::scope(|scope| {
            let writer_registry = Arc::clone(&registry);
            let writer_entities = &entities;
            scope.spawn(move || {
                for round in 0..50 {
                    for entity in writer_entities {
                        writer_registry.add(entity);
                    }
                    for entity in writer_entities.iter().filter(|e| e.id().0 % 2 == round % 2) {
                        writer_registry.remove(entity.id());
                    }
                }
            });
            for _ in 0..200 {
                assert!(registry.snapshot().len() <= entities.len());
            }
        });
    }

    #[test]
    fn operations_recover_after_poison_without_panic() {
        let registry = EntityRegistry::new();
        registry.add(&monster(1));
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = registry.tracked.lock().expect("lock");
                    panic!("poison registry lock");
                })
                .join();
        });

        assert_eq!(registry.snapshot().len(), 1);
        registry.add(&monster(2));
        assert_eq!(registry.len(), 2);
    }
}
