use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tierphysio_manager::api;
use tierphysio_manager::auth::SqlSessionStore;
use tierphysio_manager::config::AppConfig;
use tierphysio_manager::database::Database;
use tierphysio_manager::error::set_expose_internal_errors;
use tierphysio_manager::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tierphysio_manager=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tierphysio Manager {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    set_expose_internal_errors(config.debug);
    info!("Configuration loaded");

    let database = Database::new(&config.database_url).await?;
    info!("Database connected");

    let applied = database.run_migrations().await?;
    info!("Database migrations completed ({} applied)", applied.len());

    let sessions = Arc::new(SqlSessionStore::new(database.clone()));
    let bind_address = config.bind_address();
    let cron_enabled = config.cron.enabled;
    let cron_tick = Duration::from_secs(config.cron.tick_secs);
    let state = AppState::new(config, database, sessions);

    if cron_enabled {
        state.cron.clone().spawn(cron_tick);
        info!("Cron runner started (tick every {:?})", cron_tick);
    }

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server listening on {}", bind_address);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
