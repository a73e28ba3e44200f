// Integration tests for the manual tick trigger.
//
// POST /api/tick shares one code path and one non-overlap guard with the
// periodic scheduler; these tests drive it through the router the way the
// REST collaborator does.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use menagerie::{
    api::{create_tick_router, TickAppState},
    broadcast::Broadcaster,
    config::TickConfig,
    identity::UserDirectory,
    notify::ThresholdNotifier,
    pet::GeoPoint,
    presence::PresenceRegistry,
    store::PetStore,
    tick::{StatDecayEngine, TickScheduler},
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct Harness {
    app: Router,
    store: Arc<PetStore>,
    directory: Arc<UserDirectory>,
}

fn harness() -> Harness {
    let broadcaster = Broadcaster::default();
    let store = Arc::new(PetStore::open_in_memory().expect("in-memory store"));
    let presence = Arc::new(PresenceRegistry::new(broadcaster.clone()));
    let notifier = Arc::new(ThresholdNotifier::new(Duration::from_secs(2)));
    let directory = Arc::new(UserDirectory::new());
    let engine = Arc::new(StatDecayEngine::new(Arc::clone(&store), 25));
    let scheduler = Arc::new(TickScheduler::new(
        Arc::clone(&store),
        engine,
        notifier,
        presence,
        broadcaster,
        &TickConfig::default(),
    ));
    let app = create_tick_router(TickAppState {
        scheduler,
        directory: Arc::clone(&directory),
    });
    Harness {
        app,
        store,
        directory,
    }
}

fn tick_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/tick");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_tick_without_token_returns_401() {
    let h = harness();
    let resp = h.app.oneshot(tick_request(None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tick_with_invalid_token_returns_401() {
    let h = harness();
    let resp = h
        .app
        .oneshot(tick_request(Some("not-a-real-token")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tick_reports_updated_count_and_decays() {
    let h = harness();
    let user = h.directory.register("alice").unwrap();

    let named = h
        .store
        .create(Some("Momo"), None, GeoPoint::new(0.0, 0.0))
        .unwrap();
    // Unnamed pets are not yet initialized and never decay
    h.store.create(None, None, GeoPoint::new(0.0, 0.0)).unwrap();

    let resp = h
        .app
        .oneshot(tick_request(Some(&user.token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, serde_json::json!({ "updated": 1 }));

    let decayed = h.store.get(&named.id).unwrap().unwrap();
    assert_eq!(decayed.stats.hunger, 75);
    assert_eq!(decayed.stats.energy, 100);
}

#[tokio::test]
async fn test_tick_is_idempotent_safe() {
    let h = harness();
    let user = h.directory.register("alice").unwrap();
    let pet = h
        .store
        .create(Some("Momo"), None, GeoPoint::new(0.0, 0.0))
        .unwrap();

    // Run the trigger repeatedly; the world just advances, stats stay clamped
    for _ in 0..6 {
        let resp = h
            .app
            .clone()
            .oneshot(tick_request(Some(&user.token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let settled = h.store.get(&pet.id).unwrap().unwrap();
    assert_eq!(settled.stats.hunger, 0);
    assert_eq!(settled.stats.hygiene, 0);
    assert_eq!(settled.stats.fun, 0);
    assert_eq!(settled.stats.energy, 100);
}
