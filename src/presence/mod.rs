use crate::broadcast::Broadcaster;
use crate::events::ServerEvent;
use crate::identity::UserIdentity;
use crate::pet::GeoPoint;
use crate::rooms::RoomKey;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Identifies one live connection
pub type SessionId = Uuid;

/// A connected, identified client.
///
/// Owned exclusively by the [`PresenceRegistry`]; other components read and
/// mutate session state only through registry methods. The room field is the
/// single source of truth for geo-room membership.
#[derive(Clone, Debug)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: String,
    pub user_name: String,
    pub connected_at: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    pub room: Option<RoomKey>,
}

/// Session shape shared with other clients (`users:existing`)
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user_id: String,
    pub user_name: String,
    pub location: Option<GeoPoint>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            user_name: session.user_name.clone(),
            location: session.location,
        }
    }
}

/// Registry of connected sessions.
///
/// Owned by the server's top-level context and passed as a handle into every
/// connection handler — no module-level singleton. Arrival and departure
/// events are broadcast from here so the lifecycle and its announcements
/// cannot drift apart.
pub struct PresenceRegistry {
    /// Primary storage: session_id -> Session
    sessions: DashMap<SessionId, Session>,
    /// Secondary index: user_id -> session_id; latest connection wins
    by_user: DashMap<String, SessionId>,
    broadcaster: Broadcaster,
}

impl PresenceRegistry {
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self {
            sessions: DashMap::new(),
            by_user: DashMap::new(),
            broadcaster,
        }
    }

    /// Register a newly authenticated connection.
    ///
    /// Returns the minted session id together with a snapshot of all other
    /// sessions (to hydrate the new client), and announces the arrival to
    /// everyone previously registered.
    pub fn register(&self, identity: &UserIdentity) -> (SessionId, Vec<SessionView>) {
        let session_id = Uuid::new_v4();
        let session = Session {
            session_id,
            user_id: identity.user_id.clone(),
            user_name: identity.user_name.clone(),
            connected_at: Utc::now(),
            location: None,
            room: None,
        };

        self.sessions.insert(session_id, session);
        self.by_user.insert(identity.user_id.clone(), session_id);

        let existing = self.snapshot(session_id);

        info!(
            user_id = %identity.user_id,
            user_name = %identity.user_name,
            online = self.sessions.len(),
            "session registered"
        );

        self.broadcaster.to_others(
            session_id,
            ServerEvent::UserOnline {
                user_id: identity.user_id.clone(),
                user_name: identity.user_name.clone(),
            },
        );

        (session_id, existing)
    }

    /// All sessions except the given one
    pub fn snapshot(&self, excluding: SessionId) -> Vec<SessionView> {
        self.sessions
            .iter()
            .filter(|entry| *entry.key() != excluding)
            .map(|entry| SessionView::from(entry.value()))
            .collect()
    }

    /// Update a session's last known location. Never broadcasts; location
    /// announcements are the room router's call.
    pub fn touch(&self, session_id: SessionId, location: GeoPoint) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(mut session) => {
                session.location = Some(location);
                true
            }
            None => false,
        }
    }

    /// Remove a session and announce the departure to everyone remaining.
    ///
    /// After this returns no further events reference the session id.
    pub fn unregister(&self, session_id: SessionId) {
        let Some((_, session)) = self.sessions.remove(&session_id) else {
            return;
        };

        // Only clear the user index if a reconnect has not already claimed it
        self.by_user
            .remove_if(&session.user_id, |_, current| *current == session_id);

        info!(
            user_id = %session.user_id,
            user_name = %session.user_name,
            online = self.sessions.len(),
            "session unregistered"
        );

        self.broadcaster.to_all(ServerEvent::UserOffline {
            user_id: session.user_id,
            user_name: session.user_name,
        });
    }

    /// Move a session's room membership; `None` leaves any current room.
    /// Membership is exclusive, so setting a room implicitly leaves the
    /// previous one.
    pub fn set_room(&self, session_id: SessionId, room: Option<RoomKey>) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(mut session) => {
                session.room = room;
                true
            }
            None => false,
        }
    }

    /// The room a session currently occupies, if any
    pub fn room_of(&self, session_id: SessionId) -> Option<RoomKey> {
        self.sessions.get(&session_id).and_then(|s| s.room)
    }

    /// Full session state, cloned
    pub fn get(&self, session_id: SessionId) -> Option<Session> {
        self.sessions.get(&session_id).map(|s| s.clone())
    }

    /// The live session for a user, if connected (latest connection wins)
    pub fn session_for_user(&self, user_id: &str) -> Option<SessionId> {
        self.by_user.get(user_id).map(|entry| *entry.value())
    }

    /// Number of connected sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
