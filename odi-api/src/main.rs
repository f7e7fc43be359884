use std::net::SocketAddr;
use std::sync::Arc;

use odi_api::{app, worker, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "odi_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = odi_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Odi API on port {}", config.server.port);

    let state = match config.database.url.as_deref() {
        Some(url) => {
            let db = odi_store::DbClient::new(url)
                .await
                .expect("Failed to connect to Postgres");
            db.migrate().await.expect("Failed to run migrations");

            AppState::build(
                Arc::new(odi_store::PgScheduleRepository::new(db.pool.clone())),
                Arc::new(odi_store::PgBookingRepository::new(db.pool.clone())),
                Arc::new(odi_store::PgCreditRepository::new(db.pool.clone())),
                Arc::new(odi_core::payment::MockGateway::new()),
                config.business_rules.clone(),
            )
        }
        None => {
            tracing::warn!("No database configured, using in-memory stores");
            AppState::in_memory(config.business_rules.clone())
        }
    };

    tokio::spawn(worker::start_expiry_sweeper(state.clone()));
    tokio::spawn(worker::start_notification_worker(state.clone()));

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
