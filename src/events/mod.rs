use crate::notify::Notification;
use crate::pet::{GeoPoint, StatVector};
use crate::presence::SessionView;
use crate::store::NearbyPet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server → Client events.
///
/// Wire format: `{"event": "<name>", "data": {...}}`. The variant names map
/// to the protocol event names; payload fields are camelCase.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Sent once to a newly connected client: everyone already online
    #[serde(rename = "users:existing")]
    UsersExisting { users: Vec<SessionView> },

    /// A user came online
    #[serde(rename = "user:online", rename_all = "camelCase")]
    UserOnline { user_id: String, user_name: String },

    /// A user went offline
    #[serde(rename = "user:offline", rename_all = "camelCase")]
    UserOffline { user_id: String, user_name: String },

    /// A user shared their location
    #[serde(rename = "user:location", rename_all = "camelCase")]
    UserLocation {
        user_id: String,
        user_name: String,
        location: GeoPoint,
    },

    /// A pet's stats changed (decay or owner action)
    #[serde(rename = "pet:updated", rename_all = "camelCase")]
    PetUpdated { pet_id: Uuid, stats: StatVector },

    /// A stat threshold alert for one of the client's pets
    #[serde(rename = "notification:new")]
    NotificationNew(Notification),

    /// Answer to `location:join`: pets near the given point
    #[serde(rename = "location:nearby-pets")]
    NearbyPets { pets: Vec<PetView> },

    /// A pet moved within the client's current room
    #[serde(rename = "pet:moved", rename_all = "camelCase")]
    PetMoved {
        pet_id: Uuid,
        name: Option<String>,
        location: GeoPoint,
    },

    /// Operation failed; the connection stays open
    #[serde(rename = "error")]
    Error { message: String },
}

/// Client → Server events
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Enter the geo room covering the given point and ask for nearby pets
    #[serde(rename = "location:join", rename_all = "camelCase")]
    LocationJoin {
        latitude: f64,
        longitude: f64,
        /// Proximity query radius in meters; server default when omitted
        radius: Option<f64>,
    },

    /// Leave the current geo room
    #[serde(rename = "location:leave")]
    LocationLeave {},

    /// Move one of the caller's pets
    #[serde(rename = "location:update", rename_all = "camelCase")]
    LocationUpdate {
        pet_id: Uuid,
        latitude: f64,
        longitude: f64,
    },
}

/// Pet shape sent in proximity query answers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PetView {
    pub pet_id: Uuid,
    pub name: Option<String>,
    pub owner: Option<String>,
    pub location: GeoPoint,
    pub stats: StatVector,
    #[serde(rename = "distanceMeters")]
    pub distance_m: f64,
}

impl From<&NearbyPet> for PetView {
    fn from(hit: &NearbyPet) -> Self {
        Self {
            pet_id: hit.pet.id,
            name: hit.pet.name.clone(),
            owner: hit.pet.owner.clone(),
            location: hit.pet.location,
            stats: hit.pet.stats,
            distance_m: hit.distance_m,
        }
    }
}
