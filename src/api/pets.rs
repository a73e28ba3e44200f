use crate::auth::extract_bearer_token;
use crate::broadcast::Broadcaster;
use crate::identity::{UserDirectory, UserIdentity};
use crate::notify::{self, ThresholdNotifier};
use crate::pet::{GeoPoint, Pet, PetAction};
use crate::presence::PresenceRegistry;
use crate::store::{PetStore, StoreError};
use crate::tick::StatDecayEngine;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Shared application state for the pets API
#[derive(Clone)]
pub struct PetsAppState {
    pub store: Arc<PetStore>,
    pub engine: Arc<StatDecayEngine>,
    pub notifier: Arc<ThresholdNotifier>,
    pub presence: Arc<PresenceRegistry>,
    pub broadcaster: Broadcaster,
    pub directory: Arc<UserDirectory>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct CreatePetRequest {
    name: String,
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Deserialize)]
struct MovePetRequest {
    lat: f64,
    lng: f64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create pets API router (CRUD + owner actions)
pub fn create_pets_router(state: PetsAppState) -> Router {
    Router::new()
        .route("/api/pets", get(list_pets).post(create_pet))
        .route("/api/pets/:id", get(get_pet).delete(delete_pet))
        .route("/api/pets/:id/stats", get(get_stats))
        .route("/api/pets/:id/feed", post(feed_pet))
        .route("/api/pets/:id/toilet", post(toilet_pet))
        .route("/api/pets/:id/sleep", post(sleep_pet))
        .route("/api/pets/:id/play", post(play_pet))
        .route("/api/pets/:id/move", post(move_pet))
        .with_state(Arc::new(state))
}

/// GET /api/pets - list pets, optionally filtered by owner
async fn list_pets(
    State(state): State<Arc<PetsAppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Pet>>, ApiError> {
    authenticate(&state, &headers)?;

    let pets = match query.user_id {
        Some(ref owner) => state.store.list_by_owner(owner)?,
        None => state.store.list_all()?,
    };
    Ok(Json(pets))
}

/// POST /api/pets - create a pet owned by the caller
async fn create_pet(
    State(state): State<Arc<PetsAppState>>,
    headers: HeaderMap,
    Json(request): Json<CreatePetRequest>,
) -> Result<(StatusCode, Json<Pet>), ApiError> {
    let identity = authenticate(&state, &headers)?;

    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }

    let location = GeoPoint::new(request.lat.unwrap_or(0.0), request.lng.unwrap_or(0.0));
    if !location.is_valid() {
        return Err(ApiError::Validation("invalid coordinates".to_string()));
    }

    let pet = state
        .store
        .create(Some(name), Some(&identity.user_id), location)?;

    info!(pet_id = %pet.id, owner = %identity.user_id, "pet created");
    Ok((StatusCode::CREATED, Json(pet)))
}

/// GET /api/pets/:id
async fn get_pet(
    State(state): State<Arc<PetsAppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Pet>, ApiError> {
    authenticate(&state, &headers)?;
    let pet = state.store.get(&id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(pet))
}

/// DELETE /api/pets/:id - owner only
async fn delete_pet(
    State(state): State<Arc<PetsAppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let identity = authenticate(&state, &headers)?;
    let pet = state.store.get(&id)?.ok_or(ApiError::NotFound)?;
    check_ownership(&pet, &identity)?;

    state.store.delete(&id)?;
    info!(pet_id = %id, "pet deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/pets/:id/stats
async fn get_stats(
    State(state): State<Arc<PetsAppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<crate::pet::StatVector>, ApiError> {
    authenticate(&state, &headers)?;
    let pet = state.store.get(&id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(pet.stats))
}

async fn feed_pet(
    state: State<Arc<PetsAppState>>,
    headers: HeaderMap,
    path: Path<Uuid>,
) -> Result<Json<Pet>, ApiError> {
    apply_action(state, headers, path, PetAction::Feed).await
}

async fn toilet_pet(
    state: State<Arc<PetsAppState>>,
    headers: HeaderMap,
    path: Path<Uuid>,
) -> Result<Json<Pet>, ApiError> {
    apply_action(state, headers, path, PetAction::Toilet).await
}

async fn sleep_pet(
    state: State<Arc<PetsAppState>>,
    headers: HeaderMap,
    path: Path<Uuid>,
) -> Result<Json<Pet>, ApiError> {
    apply_action(state, headers, path, PetAction::Sleep).await
}

async fn play_pet(
    state: State<Arc<PetsAppState>>,
    headers: HeaderMap,
    path: Path<Uuid>,
) -> Result<Json<Pet>, ApiError> {
    apply_action(state, headers, path, PetAction::Play).await
}

/// POST /api/pets/:id/{feed,toilet,sleep,play}
///
/// Owner actions run through the same clamp-persist-notify pipeline as the
/// decay pass: the engine produces an old/new pair and the dispatch sends
/// `pet:updated` (and any threshold alert) to the owner's live session.
async fn apply_action(
    State(state): State<Arc<PetsAppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    action: PetAction,
) -> Result<Json<Pet>, ApiError> {
    let identity = authenticate(&state, &headers)?;
    let pet = state.store.get(&id)?.ok_or(ApiError::NotFound)?;
    check_ownership(&pet, &identity)?;

    let (old, new) = state.engine.apply_action(&pet, action)?;
    notify::dispatch_stat_change(
        &state.notifier,
        &state.presence,
        &state.broadcaster,
        &pet,
        old,
        new,
    );

    info!(pet_id = %id, action = action.as_str(), "action applied");

    // Re-read for the fresh version and timestamp
    let updated = state.store.get(&id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

/// POST /api/pets/:id/move - persist a new location for an owned pet
async fn move_pet(
    State(state): State<Arc<PetsAppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<MovePetRequest>,
) -> Result<Json<Pet>, ApiError> {
    let identity = authenticate(&state, &headers)?;

    let location = GeoPoint::new(request.lat, request.lng);
    if !location.is_valid() {
        return Err(ApiError::Validation(
            "lat and lng must be valid coordinates".to_string(),
        ));
    }

    let pet = state.store.get(&id)?.ok_or(ApiError::NotFound)?;
    check_ownership(&pet, &identity)?;

    state.store.update_location(&id, location, pet.version)?;

    let updated = state.store.get(&id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

/// Resolve the caller's bearer token to an identity
fn authenticate(state: &PetsAppState, headers: &HeaderMap) -> Result<UserIdentity, ApiError> {
    let token =
        extract_bearer_token(headers).map_err(|e| ApiError::Unauthorized(e.to_string()))?;
    state
        .directory
        .verify(&token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))
}

/// Owned pets may only be touched by their owner; ownerless pets are fair
/// game for anyone authenticated. A foreign pet reads as missing.
fn check_ownership(pet: &Pet, identity: &UserIdentity) -> Result<(), ApiError> {
    match pet.owner.as_deref() {
        Some(owner) if owner != identity.user_id => Err(ApiError::NotFound),
        _ => Ok(()),
    }
}

/// Application error types
enum ApiError {
    Unauthorized(String),
    NotFound,
    Validation(String),
    Conflict,
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Conflict => ApiError::Conflict,
            StoreError::Database(e) => {
                error!(error = %e, "store failure");
                ApiError::Internal("store unavailable".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "pet not found".to_string()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict => (
                StatusCode::CONFLICT,
                "pet was modified concurrently, retry".to_string(),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}
