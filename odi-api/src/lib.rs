use axum::{http::Method, routing::post, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod actor;
pub mod bookings;
pub mod connections;
pub mod error;
pub mod schedules;
pub mod state;
pub mod webhooks;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
            axum::http::HeaderName::from_static("x-actor-id"),
            axum::http::HeaderName::from_static("x-actor-role"),
            axum::http::HeaderName::from_static("idempotency-key"),
        ]);

    Router::new()
        .merge(schedules::routes())
        .merge(bookings::routes())
        .merge(connections::routes())
        .route(
            "/v1/webhooks/payments/gateway",
            post(webhooks::handle_gateway_webhook),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
