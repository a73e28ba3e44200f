use anyhow::{Context, Result};
use menagerie::api::{
    create_pets_router, create_tick_router, create_users_router, create_ws_router, PetsAppState,
    TickAppState, UsersAppState, WsAppState,
};
use menagerie::broadcast::Broadcaster;
use menagerie::config::{load_config, MenagerieConfig};
use menagerie::identity::UserDirectory;
use menagerie::notify::ThresholdNotifier;
use menagerie::presence::PresenceRegistry;
use menagerie::rooms::GeoRoomRouter;
use menagerie::store::PetStore;
use menagerie::tick::{StatDecayEngine, TickScheduler};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "menagerie=info".into()),
        )
        .init();

    let config_path =
        std::env::var("MENAGERIE_CONFIG").unwrap_or_else(|_| "menagerie.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        load_config(&config_path)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Failed to load config from {}", config_path))?
    } else {
        info!(path = %config_path, "no config file, using defaults");
        MenagerieConfig::default()
    };

    let store = Arc::new(
        PetStore::open(&config.store.path)
            .with_context(|| format!("Failed to open pet store at {}", config.store.path))?,
    );

    let broadcaster = Broadcaster::default();
    let directory = Arc::new(UserDirectory::new());
    let presence = Arc::new(PresenceRegistry::new(broadcaster.clone()));
    let rooms = Arc::new(GeoRoomRouter::new(
        Arc::clone(&presence),
        Arc::clone(&store),
        broadcaster.clone(),
    ));
    let notifier = Arc::new(ThresholdNotifier::new(Duration::from_millis(
        config.notify.dedup_window_ms,
    )));
    let engine = Arc::new(StatDecayEngine::new(
        Arc::clone(&store),
        config.tick.decay_amount,
    ));
    let scheduler = Arc::new(TickScheduler::new(
        Arc::clone(&store),
        Arc::clone(&engine),
        Arc::clone(&notifier),
        Arc::clone(&presence),
        broadcaster.clone(),
        &config.tick,
    ));

    // Periodic decay runs for the life of the process
    tokio::spawn(Arc::clone(&scheduler).run_tick_loop());

    let ws_state = Arc::new(WsAppState {
        directory: Arc::clone(&directory),
        registry: Arc::clone(&presence),
        router: Arc::clone(&rooms),
        broadcaster: broadcaster.clone(),
        default_radius_m: config.rooms.default_radius_m,
    });

    let app = create_ws_router(ws_state)
        .merge(create_tick_router(TickAppState {
            scheduler,
            directory: Arc::clone(&directory),
        }))
        .merge(create_pets_router(PetsAppState {
            store,
            engine,
            notifier,
            presence,
            broadcaster,
            directory: Arc::clone(&directory),
        }))
        .merge(create_users_router(UsersAppState { directory }))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    info!(addr = %config.server.bind_addr, "menagerie listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
