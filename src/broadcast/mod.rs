use crate::events::ServerEvent;
use crate::presence::SessionId;
use crate::rooms::RoomKey;
use tokio::sync::broadcast;

/// Delivery scope for an outbound event.
///
/// Handlers publish events with a scope; connection tasks resolve the scope
/// against their own session (and its current room) at delivery time, so
/// membership lives in exactly one place.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scope {
    /// Every connected session
    All,
    /// Exactly one session
    Session(SessionId),
    /// Every session except one (arrival announcements)
    Others(SessionId),
    /// Sessions currently in a geo room
    Room(RoomKey),
}

/// An event paired with its delivery scope
#[derive(Clone, Debug)]
pub struct OutboundEvent {
    pub scope: Scope,
    pub event: ServerEvent,
}

/// Fan-out sink for all server→client events.
///
/// Thin wrapper over a broadcast channel: every connection task subscribes
/// and filters by scope. Delivery is best-effort — send errors (no
/// receivers) are ignored and lagging receivers skip events.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<OutboundEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe a connection task to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.tx.subscribe()
    }

    pub fn to_all(&self, event: ServerEvent) {
        self.send(Scope::All, event);
    }

    pub fn to_session(&self, session_id: SessionId, event: ServerEvent) {
        self.send(Scope::Session(session_id), event);
    }

    pub fn to_others(&self, session_id: SessionId, event: ServerEvent) {
        self.send(Scope::Others(session_id), event);
    }

    pub fn to_room(&self, room: RoomKey, event: ServerEvent) {
        self.send(Scope::Room(room), event);
    }

    fn send(&self, scope: Scope, event: ServerEvent) {
        let _ = self.tx.send(OutboundEvent { scope, event });
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        // Matches the burst a full-population tick can produce
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_send_reaches_subscriber() {
        let broadcaster = Broadcaster::default();
        let mut rx = broadcaster.subscribe();

        broadcaster.to_all(ServerEvent::Error {
            message: "test".to_string(),
        });

        let out = rx.try_recv().expect("event delivered");
        assert_eq!(out.scope, Scope::All);
    }

    #[test]
    fn send_without_subscribers_is_ignored() {
        let broadcaster = Broadcaster::default();
        // No receiver; must not panic or error
        broadcaster.to_all(ServerEvent::Error {
            message: "dropped".to_string(),
        });
    }
}
