use crate::identity::UserDirectory;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Shared application state for user registration
#[derive(Clone)]
pub struct UsersAppState {
    pub directory: Arc<UserDirectory>,
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    user_id: String,
    user_name: String,
    token: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create user registration router.
///
/// The one endpoint that takes no credential: it mints them.
pub fn create_users_router(state: UsersAppState) -> Router {
    Router::new()
        .route("/api/users", post(register_user))
        .with_state(Arc::new(state))
}

/// POST /api/users - register and receive a bearer token
async fn register_user(
    State(state): State<Arc<UsersAppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), (StatusCode, Json<ErrorResponse>)> {
    let user = state.directory.register(&request.name).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    info!(user_id = %user.id, user_name = %user.name, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            user_name: user.name,
            token: user.token,
        }),
    ))
}
