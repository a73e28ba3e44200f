use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A point on the globe, degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Coordinates valid for storage and room derivation
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// The four stat dimensions of a pet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Hunger,
    Hygiene,
    Energy,
    Fun,
}

impl StatKind {
    /// All dimensions, in notification order
    pub const ALL: [StatKind; 4] = [
        StatKind::Hunger,
        StatKind::Hygiene,
        StatKind::Energy,
        StatKind::Fun,
    ];

    /// Human-facing label for notification messages
    pub fn label(&self) -> &'static str {
        match self {
            StatKind::Hunger => "Hunger",
            StatKind::Hygiene => "Hygiene",
            StatKind::Energy => "Energy",
            StatKind::Fun => "Fun",
        }
    }
}

/// The clamped stat attributes of a pet.
///
/// Every value is held in [0, 100]; all mutation goes through `with`, which
/// applies a signed delta and clamps, so an out-of-range value can never be
/// constructed from in-range inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatVector {
    pub hunger: u8,
    pub hygiene: u8,
    pub energy: u8,
    pub fun: u8,
}

impl StatVector {
    /// A newly created pet starts with full stats
    pub const FULL: StatVector = StatVector {
        hunger: 100,
        hygiene: 100,
        energy: 100,
        fun: 100,
    };

    pub fn get(&self, kind: StatKind) -> u8 {
        match kind {
            StatKind::Hunger => self.hunger,
            StatKind::Hygiene => self.hygiene,
            StatKind::Energy => self.energy,
            StatKind::Fun => self.fun,
        }
    }

    /// Apply a signed delta to one dimension, clamped to [0, 100]
    pub fn with(mut self, kind: StatKind, delta: i32) -> Self {
        let value = clamp_stat(i32::from(self.get(kind)) + delta);
        match kind {
            StatKind::Hunger => self.hunger = value,
            StatKind::Hygiene => self.hygiene = value,
            StatKind::Energy => self.energy = value,
            StatKind::Fun => self.fun = value,
        }
        self
    }

    /// Set one dimension to an absolute value, clamped to [0, 100]
    pub fn set(mut self, kind: StatKind, value: i32) -> Self {
        let value = clamp_stat(value);
        match kind {
            StatKind::Hunger => self.hunger = value,
            StatKind::Hygiene => self.hygiene = value,
            StatKind::Energy => self.energy = value,
            StatKind::Fun => self.fun = value,
        }
        self
    }
}

fn clamp_stat(value: i32) -> u8 {
    value.clamp(0, 100) as u8
}

/// Owner-triggered stat mutations.
///
/// Each action is a fixed set of deltas applied through the same
/// clamp-and-persist path as decay. Actions are the only writers of energy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PetAction {
    Feed,
    Toilet,
    Sleep,
    Play,
}

impl PetAction {
    pub fn apply(&self, stats: StatVector) -> StatVector {
        match self {
            PetAction::Feed => stats.with(StatKind::Hunger, 30),
            PetAction::Toilet => stats.set(StatKind::Hygiene, 100),
            PetAction::Sleep => stats
                .with(StatKind::Energy, 40)
                .with(StatKind::Hunger, -10),
            PetAction::Play => stats
                .with(StatKind::Fun, 25)
                .with(StatKind::Energy, -20)
                .with(StatKind::Hunger, -15),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PetAction::Feed => "feed",
            PetAction::Toilet => "toilet",
            PetAction::Sleep => "sleep",
            PetAction::Play => "play",
        }
    }
}

/// A pet entity as persisted in the store.
///
/// Pets without a display name are not-yet-initialized: they are skipped by
/// the decay pass and never notified. `version` is the optimistic-concurrency
/// counter; every persisted write checks and bumps it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: Uuid,
    pub owner: Option<String>,
    pub name: Option<String>,
    pub stats: StatVector,
    pub location: GeoPoint,
    #[serde(skip_serializing)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_delta_clamps_at_floor_and_ceiling() {
        let stats = StatVector::FULL;
        assert_eq!(stats.with(StatKind::Hunger, 40).hunger, 100);
        assert_eq!(stats.with(StatKind::Hunger, -250).hunger, 0);
        assert_eq!(stats.with(StatKind::Fun, -60).fun, 40);
    }

    #[test]
    fn decay_on_empty_stat_is_noop() {
        let stats = StatVector::FULL.set(StatKind::Hygiene, 0);
        assert_eq!(stats.with(StatKind::Hygiene, -25).hygiene, 0);
    }

    #[test]
    fn feed_raises_hunger_only() {
        let stats = StatVector {
            hunger: 40,
            hygiene: 50,
            energy: 60,
            fun: 70,
        };
        let fed = PetAction::Feed.apply(stats);
        assert_eq!(fed.hunger, 70);
        assert_eq!(fed.hygiene, 50);
        assert_eq!(fed.energy, 60);
        assert_eq!(fed.fun, 70);
    }

    #[test]
    fn toilet_resets_hygiene() {
        let stats = StatVector::FULL.set(StatKind::Hygiene, 5);
        assert_eq!(PetAction::Toilet.apply(stats).hygiene, 100);
    }

    #[test]
    fn play_spends_energy_and_hunger() {
        let stats = StatVector {
            hunger: 50,
            hygiene: 50,
            energy: 10,
            fun: 50,
        };
        let played = PetAction::Play.apply(stats);
        assert_eq!(played.fun, 75);
        assert_eq!(played.energy, 0); // clamped, was 10 - 20
        assert_eq!(played.hunger, 35);
    }

    #[test]
    fn geo_point_validation() {
        assert!(GeoPoint::new(48.85, 2.35).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }
}
