use crate::pet::{Pet, PetAction, StatKind, StatVector};
use crate::store::{PetStore, StoreError};
use std::sync::Arc;

/// Applies the decay rule and owner actions to single pets.
///
/// Every mutation runs through the same clamp-and-persist path: compute the
/// new vector from a snapshot of the old one, clamp, write with a version
/// check, and hand both snapshots back so the caller can notify without a
/// second read. A version conflict means another writer won the race and
/// nothing was persisted.
pub struct StatDecayEngine {
    store: Arc<PetStore>,
    decay_amount: i32,
}

impl StatDecayEngine {
    pub fn new(store: Arc<PetStore>, decay_amount: u8) -> Self {
        Self {
            store,
            decay_amount: i32::from(decay_amount),
        }
    }

    /// The pure decay step: hunger, hygiene and fun drop by the configured
    /// amount; energy is only ever spent by owner actions.
    pub fn decay_step(&self, stats: StatVector) -> StatVector {
        stats
            .with(StatKind::Hunger, -self.decay_amount)
            .with(StatKind::Hygiene, -self.decay_amount)
            .with(StatKind::Fun, -self.decay_amount)
    }

    /// Decay one pet and persist the result.
    ///
    /// Pets without a display name are not yet initialized and are skipped
    /// entirely (`Ok(None)`): no write, no notification.
    pub fn decay(&self, pet: &Pet) -> Result<Option<(StatVector, StatVector)>, StoreError> {
        if pet.name.is_none() {
            return Ok(None);
        }

        let old = pet.stats;
        let new = self.decay_step(old);
        self.store.update_stats(&pet.id, &new, pet.version)?;
        Ok(Some((old, new)))
    }

    /// Apply an owner action and persist the result.
    pub fn apply_action(
        &self,
        pet: &Pet,
        action: PetAction,
    ) -> Result<(StatVector, StatVector), StoreError> {
        let old = pet.stats;
        let new = action.apply(old);
        self.store.update_stats(&pet.id, &new, pet.version)?;
        Ok((old, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::GeoPoint;

    fn engine() -> (Arc<PetStore>, StatDecayEngine) {
        let store = Arc::new(PetStore::open_in_memory().unwrap());
        let engine = StatDecayEngine::new(Arc::clone(&store), 25);
        (store, engine)
    }

    #[test]
    fn decay_lowers_three_dimensions_and_spares_energy() {
        let (store, engine) = engine();
        let pet = store
            .create(Some("Momo"), None, GeoPoint::new(0.0, 0.0))
            .unwrap();

        let (old, new) = engine.decay(&pet).unwrap().expect("named pet decays");
        assert_eq!(old, StatVector::FULL);
        assert_eq!(new.hunger, 75);
        assert_eq!(new.hygiene, 75);
        assert_eq!(new.fun, 75);
        assert_eq!(new.energy, 100);

        let stored = store.get(&pet.id).unwrap().unwrap();
        assert_eq!(stored.stats, new);
    }

    #[test]
    fn unnamed_pet_is_skipped() {
        let (store, engine) = engine();
        let pet = store.create(None, None, GeoPoint::new(0.0, 0.0)).unwrap();

        assert!(engine.decay(&pet).unwrap().is_none());
        // No write happened either
        let stored = store.get(&pet.id).unwrap().unwrap();
        assert_eq!(stored.version, 0);
    }

    #[test]
    fn decay_floors_at_zero() {
        let (store, engine) = engine();
        let mut pet = store
            .create(Some("Momo"), None, GeoPoint::new(0.0, 0.0))
            .unwrap();

        // Five passes: 100, 75, 50, 25, 0, then a no-op at the floor
        for _ in 0..5 {
            engine.decay(&pet).unwrap();
            pet = store.get(&pet.id).unwrap().unwrap();
        }
        assert_eq!(pet.stats.hunger, 0);
        assert_eq!(pet.stats.energy, 100);

        engine.decay(&pet).unwrap();
        let settled = store.get(&pet.id).unwrap().unwrap();
        assert_eq!(settled.stats.hunger, 0);
    }

    #[test]
    fn stale_snapshot_decay_conflicts_instead_of_clobbering() {
        let (store, engine) = engine();
        let pet = store
            .create(Some("Momo"), None, GeoPoint::new(0.0, 0.0))
            .unwrap();

        // An owner action lands between the cycle's read and its write
        let (_, fed) = engine.apply_action(&pet, PetAction::Feed).unwrap();

        let err = engine.decay(&pet).unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        // The action's write survived untouched
        let stored = store.get(&pet.id).unwrap().unwrap();
        assert_eq!(stored.stats, fed);
    }

    #[test]
    fn action_returns_old_and_new_pair() {
        let (store, engine) = engine();
        let pet = store
            .create(Some("Momo"), None, GeoPoint::new(0.0, 0.0))
            .unwrap();

        let (old, new) = engine.apply_action(&pet, PetAction::Play).unwrap();
        assert_eq!(old, StatVector::FULL);
        assert_eq!(new.fun, 100); // clamped at the ceiling
        assert_eq!(new.energy, 80);
        assert_eq!(new.hunger, 85);
    }
}
