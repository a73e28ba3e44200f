use crate::broadcast::Broadcaster;
use crate::connection::ConnectionManager;
use crate::identity::UserDirectory;
use crate::presence::PresenceRegistry;
use crate::rooms::GeoRoomRouter;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Query, Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters for WebSocket upgrade
#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Shared application state for WebSocket handler
#[derive(Clone)]
pub struct WsAppState {
    pub directory: Arc<UserDirectory>,
    pub registry: Arc<PresenceRegistry>,
    pub router: Arc<GeoRoomRouter>,
    pub broadcaster: Broadcaster,
    pub default_radius_m: f64,
}

/// Auth middleware: validates ?token= against the user directory.
///
/// Runs as a tower layer BEFORE WebSocket upgrade extraction, so a bad
/// credential is a clean 401 and no presence entry is ever created for it.
async fn ws_auth(
    State(state): State<Arc<WsAppState>>,
    Query(params): Query<WsQuery>,
    req: Request,
    next: Next,
) -> Response {
    match params.token {
        Some(ref token) if state.directory.verify(token).is_ok() => next.run(req).await,
        _ => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    }
}

/// GET /api/ws - WebSocket upgrade handler (auth handled by ws_auth middleware)
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<WsAppState>>,
) -> Response {
    // The middleware already vetted the token; resolve it to an identity
    let identity = match params.token.as_deref().map(|t| state.directory.verify(t)) {
        Some(Ok(identity)) => identity,
        _ => return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Create WebSocket router with auth middleware applied
pub fn create_ws_router(state: Arc<WsAppState>) -> Router {
    Router::new()
        .route("/api/ws", get(ws_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), ws_auth))
        .with_state(state)
}

/// Handle WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    state: Arc<WsAppState>,
    identity: crate::identity::UserIdentity,
) {
    let manager = ConnectionManager::new(
        identity,
        Arc::clone(&state.registry),
        Arc::clone(&state.router),
        state.broadcaster.clone(),
        state.default_radius_m,
    );

    manager.handle(socket).await;
}
