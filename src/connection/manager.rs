use crate::broadcast::{Broadcaster, OutboundEvent, Scope};
use crate::events::{ClientMessage, PetView, ServerEvent};
use crate::identity::UserIdentity;
use crate::presence::{PresenceRegistry, SessionId};
use crate::rooms::{GeoRoomRouter, RoomError};
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Manages a single WebSocket connection: session lifecycle, inbound client
/// events, and scope-filtered delivery of broadcast events.
pub struct ConnectionManager {
    identity: UserIdentity,
    registry: Arc<PresenceRegistry>,
    router: Arc<GeoRoomRouter>,
    broadcaster: Broadcaster,
    default_radius_m: f64,
}

impl ConnectionManager {
    pub fn new(
        identity: UserIdentity,
        registry: Arc<PresenceRegistry>,
        router: Arc<GeoRoomRouter>,
        broadcaster: Broadcaster,
        default_radius_m: f64,
    ) -> Self {
        Self {
            identity,
            registry,
            router,
            broadcaster,
            default_radius_m,
        }
    }

    /// Handle the connection lifecycle: register, hydrate, pump events,
    /// unregister. The session exists exactly as long as this future runs.
    pub async fn handle(self, mut socket: WebSocket) {
        // Subscribe before registering so no event can slip between the two
        let mut rx = self.broadcaster.subscribe();
        let (session_id, existing) = self.registry.register(&self.identity);

        info!(
            user_id = %self.identity.user_id,
            user_name = %self.identity.user_name,
            "WebSocket connection established"
        );

        // Hydrate the new client with everyone already online
        if send_event(&mut socket, &ServerEvent::UsersExisting { users: existing })
            .await
            .is_err()
        {
            self.registry.unregister(session_id);
            return;
        }

        loop {
            tokio::select! {
                // Inbound client messages
                Some(msg) = socket.recv() => {
                    match msg {
                        Ok(Message::Text(text)) => {
                            if let Err(e) = self.handle_client_message(session_id, &mut socket, &text).await {
                                error!(error = %e, "failed to answer client message");
                                break;
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!(user_id = %self.identity.user_id, "WebSocket client disconnected");
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            if socket.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {
                            // Ignore binary, pong messages
                        }
                        Err(e) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                // Broadcast events, filtered by scope
                result = rx.recv() => {
                    match result {
                        Ok(out) => {
                            if self.should_forward(session_id, &out.scope)
                                && send_event(&mut socket, &out.event).await.is_err()
                            {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "WebSocket lagged, skipped events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            error!("broadcast channel closed");
                            break;
                        }
                    }
                }

                else => break,
            }
        }

        self.registry.unregister(session_id);
    }

    /// Dispatch one inbound event. Operation failures become `error` events;
    /// only a dead socket ends the connection.
    async fn handle_client_message(
        &self,
        session_id: SessionId,
        socket: &mut WebSocket,
        text: &str,
    ) -> anyhow::Result<()> {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "malformed client message");
                return send_error(socket, "Invalid message format").await;
            }
        };

        match msg {
            ClientMessage::LocationJoin {
                latitude,
                longitude,
                radius,
            } => {
                let radius_m = radius.unwrap_or(self.default_radius_m);
                match self.router.join(session_id, latitude, longitude, radius_m) {
                    Ok(nearby) => {
                        let pets = nearby.iter().map(PetView::from).collect();
                        send_event(socket, &ServerEvent::NearbyPets { pets }).await?;
                    }
                    Err(RoomError::InvalidCoordinates) => {
                        send_error(socket, "Invalid coordinates").await?;
                    }
                    Err(e) => {
                        warn!(error = %e, "location:join failed");
                        send_error(socket, "Failed to join location").await?;
                    }
                }
            }

            ClientMessage::LocationLeave {} => {
                self.router.leave(session_id);
            }

            ClientMessage::LocationUpdate {
                pet_id,
                latitude,
                longitude,
            } => match self.router.move_pet(session_id, pet_id, latitude, longitude) {
                Ok(()) => {}
                Err(RoomError::PetNotFound) => {
                    send_error(socket, "Pet not found or unauthorized").await?;
                }
                Err(RoomError::InvalidCoordinates) => {
                    send_error(socket, "Invalid coordinates").await?;
                }
                Err(e) => {
                    warn!(error = %e, pet_id = %pet_id, "location:update failed");
                    send_error(socket, "Failed to update location").await?;
                }
            },
        }

        Ok(())
    }

    /// Resolve an event's scope against this connection's session.
    fn should_forward(&self, session_id: SessionId, scope: &Scope) -> bool {
        match scope {
            Scope::All => true,
            Scope::Session(id) => *id == session_id,
            Scope::Others(id) => *id != session_id,
            Scope::Room(key) => self.registry.room_of(session_id) == Some(*key),
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> anyhow::Result<()> {
    let json = serde_json::to_string(event)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}

async fn send_error(socket: &mut WebSocket, message: &str) -> anyhow::Result<()> {
    send_event(
        socket,
        &ServerEvent::Error {
            message: message.to_string(),
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::GeoPoint;
    use crate::rooms::RoomKey;
    use crate::store::PetStore;
    use uuid::Uuid;

    fn manager_with_session() -> (ConnectionManager, SessionId, Arc<PresenceRegistry>) {
        let broadcaster = Broadcaster::default();
        let registry = Arc::new(PresenceRegistry::new(broadcaster.clone()));
        let store = Arc::new(PetStore::open_in_memory().unwrap());
        let router = Arc::new(GeoRoomRouter::new(
            Arc::clone(&registry),
            store,
            broadcaster.clone(),
        ));
        let identity = UserIdentity {
            user_id: "usr_alice".to_string(),
            user_name: "alice".to_string(),
        };
        let (session_id, _) = registry.register(&identity);
        let manager = ConnectionManager::new(
            identity,
            Arc::clone(&registry),
            router,
            broadcaster,
            1000.0,
        );
        (manager, session_id, registry)
    }

    #[test]
    fn scope_filtering_matches_own_session() {
        let (manager, session_id, _registry) = manager_with_session();
        let other = Uuid::new_v4();

        assert!(manager.should_forward(session_id, &Scope::All));
        assert!(manager.should_forward(session_id, &Scope::Session(session_id)));
        assert!(!manager.should_forward(session_id, &Scope::Session(other)));
        assert!(!manager.should_forward(session_id, &Scope::Others(session_id)));
        assert!(manager.should_forward(session_id, &Scope::Others(other)));
    }

    #[test]
    fn room_scope_tracks_registry_membership() {
        let (manager, session_id, registry) = manager_with_session();
        let room = RoomKey::from_point(GeoPoint::new(48.85, 2.35));

        // Not in any room yet
        assert!(!manager.should_forward(session_id, &Scope::Room(room)));

        registry.set_room(session_id, Some(room));
        assert!(manager.should_forward(session_id, &Scope::Room(room)));

        let elsewhere = RoomKey::from_point(GeoPoint::new(45.76, 4.83));
        assert!(!manager.should_forward(session_id, &Scope::Room(elsewhere)));
    }
}
