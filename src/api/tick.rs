use crate::auth::extract_bearer_token;
use crate::identity::UserDirectory;
use crate::tick::TickScheduler;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::post,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Shared application state for the manual trigger
#[derive(Clone)]
pub struct TickAppState {
    pub scheduler: Arc<TickScheduler>,
    pub directory: Arc<UserDirectory>,
}

#[derive(Serialize)]
struct TickResponse {
    updated: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create the manual tick trigger router
pub fn create_tick_router(state: TickAppState) -> Router {
    Router::new()
        .route("/api/tick", post(manual_tick))
        .with_state(Arc::new(state))
}

/// POST /api/tick - run one decay cycle now.
///
/// Shares the scheduler's code path and non-overlap guard with the periodic
/// timer: a trigger landing mid-cycle is dropped and reports zero updates.
/// Idempotent-safe — re-running just advances the world further.
async fn manual_tick(
    State(state): State<Arc<TickAppState>>,
    headers: HeaderMap,
) -> Result<Json<TickResponse>, (StatusCode, Json<ErrorResponse>)> {
    let token = extract_bearer_token(&headers).map_err(unauthorized)?;
    state.directory.verify(&token).map_err(unauthorized)?;

    let outcome = state.scheduler.run_cycle().await;
    info!(?outcome, "manual tick");

    Ok(Json(TickResponse {
        updated: outcome.updated(),
    }))
}

fn unauthorized<E: std::fmt::Display>(e: E) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}
