//! CodeDuel backend binary entrypoint wiring REST, WebSocket and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use codeduel_back::{
    config::AppConfig,
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        storage::StorageError,
    },
    routes,
    services::{challenge_service::seed_catalog, storage_supervisor},
    state::{AppState, SharedState},
};
use futures::future::BoxFuture;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    let default_backend = if cfg!(feature = "mongo-store") { "mongo" } else { "memory" };
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| default_backend.into());
    info!(%backend, "selecting storage backend");
    spawn_storage(app_state.clone(), &backend)?;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

type Connector =
    Box<dyn FnMut() -> BoxFuture<'static, Result<Arc<dyn GameStore>, StorageError>> + Send>;

/// Start the storage supervisor for the backend named by `STORAGE_BACKEND`.
fn spawn_storage(state: SharedState, backend: &str) -> anyhow::Result<()> {
    let config = state.config();
    let connect: Connector = match backend {
        "memory" => {
            let store = MemoryGameStore::new();
            Box::new(move || seeded(config.clone(), Arc::new(store.clone())))
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use futures::FutureExt;

            Box::new(move || connect_mongo(config.clone()).boxed())
        }
        other => anyhow::bail!("unsupported STORAGE_BACKEND `{other}`"),
    };

    tokio::spawn(storage_supervisor::run(state, connect));
    Ok(())
}

/// Connect to MongoDB using `MONGO_URI`/`MONGO_DB` and seed the catalog.
#[cfg(feature = "mongo-store")]
async fn connect_mongo(config: Arc<AppConfig>) -> Result<Arc<dyn GameStore>, StorageError> {
    use codeduel_back::dao::game_store::mongodb::{MongoConfig, MongoGameStore};

    let mongo = MongoConfig::from_env().await?;
    let store = MongoGameStore::connect(mongo).await?;
    seeded(config, Arc::new(store)).await
}

/// Seed the challenge catalog into a freshly connected store.
fn seeded(
    config: Arc<AppConfig>,
    store: Arc<dyn GameStore>,
) -> BoxFuture<'static, Result<Arc<dyn GameStore>, StorageError>> {
    Box::pin(async move {
        seed_catalog(store.as_ref(), config.challenges()).await?;
        Ok(store)
    })
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
