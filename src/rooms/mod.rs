use crate::broadcast::Broadcaster;
use crate::events::ServerEvent;
use crate::pet::GeoPoint;
use crate::presence::{PresenceRegistry, SessionId};
use crate::store::{NearbyPet, PetStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A coarse spatial cell: one degree of latitude by one degree of longitude.
///
/// Derived from truncated coordinates, so membership needs no explicit
/// teardown — a cell with no sessions in it simply does not exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RoomKey {
    lat_cell: i32,
    lng_cell: i32,
}

impl RoomKey {
    pub fn from_point(point: GeoPoint) -> Self {
        Self {
            lat_cell: point.latitude.floor() as i32,
            lng_cell: point.longitude.floor() as i32,
        }
    }
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "geo:{}:{}", self.lat_cell, self.lng_cell)
    }
}

/// Room routing errors
#[derive(Debug)]
pub enum RoomError {
    /// The session is not registered (already disconnected)
    SessionNotFound,
    /// Pet unknown, or not owned by the caller
    PetNotFound,
    /// Coordinates or radius outside the valid range
    InvalidCoordinates,
    /// Store failure during the proximity query or location write
    Store(StoreError),
}

impl std::fmt::Display for RoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomError::SessionNotFound => write!(f, "session not registered"),
            RoomError::PetNotFound => write!(f, "pet not found or unauthorized"),
            RoomError::InvalidCoordinates => write!(f, "invalid coordinates"),
            RoomError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for RoomError {}

impl From<StoreError> for RoomError {
    fn from(e: StoreError) -> Self {
        RoomError::Store(e)
    }
}

/// Routes sessions into geo rooms and relays location events.
///
/// Holds no membership state of its own: the session's room field in the
/// presence registry is the only record, mutated through registry methods.
pub struct GeoRoomRouter {
    registry: Arc<PresenceRegistry>,
    store: Arc<PetStore>,
    broadcaster: Broadcaster,
}

impl GeoRoomRouter {
    pub fn new(
        registry: Arc<PresenceRegistry>,
        store: Arc<PetStore>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            registry,
            store,
            broadcaster,
        }
    }

    /// Enter the room covering `(lat, lng)` and query pets within `radius_m`.
    ///
    /// Membership is exclusive: any previous room is left implicitly. The
    /// joining session's exact coordinates are announced to ALL sessions —
    /// the world map is a shared radar, unlike `move_pet`'s room-scoped
    /// announcement.
    pub fn join(
        &self,
        session_id: SessionId,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> Result<Vec<NearbyPet>, RoomError> {
        let point = GeoPoint::new(latitude, longitude);
        if !point.is_valid() || !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(RoomError::InvalidCoordinates);
        }

        let session = self
            .registry
            .get(session_id)
            .ok_or(RoomError::SessionNotFound)?;

        let room = RoomKey::from_point(point);
        self.registry.set_room(session_id, Some(room));
        self.registry.touch(session_id, point);

        let nearby = self.store.nearby(point, radius_m)?;

        info!(
            user_id = %session.user_id,
            room = %room,
            nearby = nearby.len(),
            "session joined geo room"
        );

        self.broadcaster.to_all(ServerEvent::UserLocation {
            user_id: session.user_id,
            user_name: session.user_name,
            location: point,
        });

        Ok(nearby)
    }

    /// Leave the current room. No broadcast.
    pub fn leave(&self, session_id: SessionId) {
        self.registry.set_room(session_id, None);
    }

    /// Persist new coordinates for a pet owned by the session's user and
    /// announce the move to the session's current room only.
    pub fn move_pet(
        &self,
        session_id: SessionId,
        pet_id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), RoomError> {
        let point = GeoPoint::new(latitude, longitude);
        if !point.is_valid() {
            return Err(RoomError::InvalidCoordinates);
        }

        let session = self
            .registry
            .get(session_id)
            .ok_or(RoomError::SessionNotFound)?;

        let pet = self.store.get(&pet_id)?.ok_or(RoomError::PetNotFound)?;
        // Ownership gate; a foreign pet is indistinguishable from a missing one
        if pet.owner.as_deref() != Some(session.user_id.as_str()) {
            return Err(RoomError::PetNotFound);
        }

        self.store.update_location(&pet_id, point, pet.version)?;

        match session.room {
            Some(room) => {
                self.broadcaster.to_room(
                    room,
                    ServerEvent::PetMoved {
                        pet_id,
                        name: pet.name,
                        location: point,
                    },
                );
            }
            None => {
                warn!(pet_id = %pet_id, "pet moved outside any room, no announcement");
            }
        }

        Ok(())
    }
}
