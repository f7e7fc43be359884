use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use odi_catalog::repository::ScheduleRepository;
use odi_catalog::schedule::{PricedTicketType, Schedule};
use odi_catalog::seatmap::SeatMap;
use odi_core::BookingFlowError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/schedules/{id}", get(get_schedule))
        .route("/v1/schedules/{id}/ticket-types", get(get_ticket_types))
        .route("/v1/schedules/{id}/seat-map", get(get_seat_map))
}

async fn load_schedule(state: &AppState, id: Uuid) -> Result<Schedule, AppError> {
    state
        .schedules
        .get_schedule(id)
        .await?
        .ok_or_else(|| BookingFlowError::NotFound(format!("schedule {}", id)).into())
}

async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Schedule>, AppError> {
    Ok(Json(load_schedule(&state, id).await?))
}

async fn get_ticket_types(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PricedTicketType>>, AppError> {
    load_schedule(&state, id).await?;
    Ok(Json(state.schedules.get_ticket_types(id).await?))
}

async fn get_seat_map(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SeatMap>, AppError> {
    load_schedule(&state, id).await?;
    Ok(Json(state.schedules.get_seat_map(id).await?))
}
