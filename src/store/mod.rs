//! Persistent pet store backed by SQLite.
//!
//! Single source of truth for the pet population. Writes that mutate stats or
//! location carry an optimistic version check so a decay write racing an
//! owner action cannot silently clobber it: the loser gets
//! [`StoreError::Conflict`] and nothing is persisted.

use crate::pet::{GeoPoint, Pet, StatVector};
use chrono::{DateTime, Utc};
use geo::{point, HaversineDistance};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// A proximity query hit, paired with its distance from the query center.
#[derive(Clone, Debug)]
pub struct NearbyPet {
    pub pet: Pet,
    pub distance_m: f64,
}

/// Store errors
#[derive(Debug)]
pub enum StoreError {
    /// Referenced pet does not exist
    NotFound,
    /// Version check failed: the row changed since it was read
    Conflict,
    /// Underlying SQLite failure
    Database(rusqlite::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "pet not found"),
            StoreError::Conflict => write!(f, "write conflict: pet was modified concurrently"),
            StoreError::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e)
    }
}

/// Pet store backed by SQLite.
///
/// # Thread Safety
/// - Connection is wrapped in Mutex for safe concurrent access
/// - SQLite itself is thread-safe with serialized mode
pub struct PetStore {
    conn: Mutex<Connection>,
}

impl PetStore {
    /// Creates or opens a pet store.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS pets (
                id TEXT PRIMARY KEY,
                owner TEXT,
                name TEXT,
                hunger INTEGER NOT NULL,
                hygiene INTEGER NOT NULL,
                energy INTEGER NOT NULL,
                fun INTEGER NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pets_owner ON pets(owner)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests and ephemeral deployments
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    /// Insert a new pet with full stats at the given location.
    pub fn create(
        &self,
        name: Option<&str>,
        owner: Option<&str>,
        location: GeoPoint,
    ) -> Result<Pet, StoreError> {
        let now = Utc::now();
        let pet = Pet {
            id: Uuid::new_v4(),
            owner: owner.map(str::to_string),
            name: name.map(str::to_string),
            stats: StatVector::FULL,
            location,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        self.conn.lock().unwrap().execute(
            r#"
            INSERT INTO pets (
                id, owner, name,
                hunger, hygiene, energy, fun,
                latitude, longitude,
                version, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                pet.id.to_string(),
                pet.owner,
                pet.name,
                pet.stats.hunger,
                pet.stats.hygiene,
                pet.stats.energy,
                pet.stats.fun,
                pet.location.latitude,
                pet.location.longitude,
                pet.version,
                pet.created_at.to_rfc3339(),
                pet.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(pet)
    }

    /// Fetch one pet by id.
    pub fn get(&self, id: &Uuid) -> Result<Option<Pet>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let pet = conn
            .query_row(
                "SELECT id, owner, name, hunger, hygiene, energy, fun,
                        latitude, longitude, version, created_at, updated_at
                 FROM pets WHERE id = ?1",
                params![id.to_string()],
                row_to_pet,
            )
            .optional()?;
        Ok(pet)
    }

    /// Load the full population, oldest first.
    ///
    /// The tick cycle iterates this list; insertion order keeps the pass
    /// deterministic.
    pub fn list_all(&self) -> Result<Vec<Pet>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner, name, hunger, hygiene, energy, fun,
                    latitude, longitude, version, created_at, updated_at
             FROM pets ORDER BY created_at, id",
        )?;
        let pets = stmt
            .query_map([], row_to_pet)?
            .collect::<Result<Vec<Pet>, _>>()?;
        Ok(pets)
    }

    /// List pets owned by one user.
    pub fn list_by_owner(&self, owner: &str) -> Result<Vec<Pet>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner, name, hunger, hygiene, energy, fun,
                    latitude, longitude, version, created_at, updated_at
             FROM pets WHERE owner = ?1 ORDER BY created_at, id",
        )?;
        let pets = stmt
            .query_map(params![owner], row_to_pet)?
            .collect::<Result<Vec<Pet>, _>>()?;
        Ok(pets)
    }

    /// Persist a new stat vector for a pet, checking the expected version.
    ///
    /// Bumps the version and refreshes `updated_at`. Fails with `Conflict`
    /// when the row's version no longer matches (a concurrent write won),
    /// `NotFound` when the pet is gone.
    pub fn update_stats(
        &self,
        id: &Uuid,
        stats: &StatVector,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let affected = self.conn.lock().unwrap().execute(
            "UPDATE pets
             SET hunger = ?1, hygiene = ?2, energy = ?3, fun = ?4,
                 updated_at = ?5, version = version + 1
             WHERE id = ?6 AND version = ?7",
            params![
                stats.hunger,
                stats.hygiene,
                stats.energy,
                stats.fun,
                Utc::now().to_rfc3339(),
                id.to_string(),
                expected_version,
            ],
        )?;

        if affected == 0 {
            return Err(self.missing_or_conflict(id)?);
        }
        Ok(())
    }

    /// Persist new coordinates for a pet, checking the expected version.
    pub fn update_location(
        &self,
        id: &Uuid,
        location: GeoPoint,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let affected = self.conn.lock().unwrap().execute(
            "UPDATE pets
             SET latitude = ?1, longitude = ?2, updated_at = ?3, version = version + 1
             WHERE id = ?4 AND version = ?5",
            params![
                location.latitude,
                location.longitude,
                Utc::now().to_rfc3339(),
                id.to_string(),
                expected_version,
            ],
        )?;

        if affected == 0 {
            return Err(self.missing_or_conflict(id)?);
        }
        Ok(())
    }

    /// Delete a pet.
    ///
    /// Returns true if a row was removed.
    pub fn delete(&self, id: &Uuid) -> Result<bool, StoreError> {
        let affected = self
            .conn
            .lock()
            .unwrap()
            .execute("DELETE FROM pets WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }

    /// Radius-bounded proximity query: pets within `radius_m` meters of
    /// `center`, ordered by ascending distance.
    ///
    /// Full-table scan with haversine distance computed per row. Fine for the
    /// population sizes this server targets; the index-backed variant lives in
    /// the database, not here.
    pub fn nearby(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<NearbyPet>, StoreError> {
        let origin = point!(x: center.longitude, y: center.latitude);
        let mut hits: Vec<NearbyPet> = self
            .list_all()?
            .into_iter()
            .filter_map(|pet| {
                let here = point!(x: pet.location.longitude, y: pet.location.latitude);
                let distance_m = origin.haversine_distance(&here);
                (distance_m <= radius_m).then_some(NearbyPet { pet, distance_m })
            })
            .collect();
        hits.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        Ok(hits)
    }

    /// Distinguish a failed conditional update: missing row vs stale version.
    fn missing_or_conflict(&self, id: &Uuid) -> Result<StoreError, StoreError> {
        let conn = self.conn.lock().unwrap();
        let exists = conn
            .query_row(
                "SELECT 1 FROM pets WHERE id = ?1",
                params![id.to_string()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(if exists {
            StoreError::Conflict
        } else {
            StoreError::NotFound
        })
    }
}

fn row_to_pet(row: &Row<'_>) -> rusqlite::Result<Pet> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Pet {
        id: parse_uuid(0, &id)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        stats: StatVector {
            hunger: row.get(3)?,
            hygiene: row.get(4)?,
            energy: row.get(5)?,
            fun: row.get(6)?,
        },
        location: GeoPoint {
            latitude: row.get(7)?,
            longitude: row.get(8)?,
        },
        version: row.get(9)?,
        created_at: parse_timestamp(10, &created_at)?,
        updated_at: parse_timestamp(11, &updated_at)?,
    })
}

fn parse_uuid(index: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(index: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}
