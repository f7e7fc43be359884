use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::actor::Caller;
use crate::error::AppError;
use crate::state::AppState;
use odi_booking::models::{Booking, Channel, PaymentMethod, Ticket};
use odi_booking::repository::BookingRepository;
use odi_booking::service::{BookingRequest, BookingResponse};
use odi_booking::wizard::{BookingWizard, WizardStep};
use odi_catalog::repository::ScheduleRepository;
use odi_core::identity::Role;
use odi_core::BookingFlowError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/schedules/{id}/bookings", post(create_booking))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/code/{code}", get(get_booking_by_code))
        .route("/v1/bookings/{id}/confirm", post(confirm_booking))
}

#[derive(Debug, Serialize)]
struct BookingView {
    booking: Booking,
    tickets: Vec<Ticket>,
}

fn channel_for(role: Role) -> Channel {
    match role {
        Role::Agent => Channel::Agent,
        Role::Owner | Role::Admin => Channel::Owner,
        Role::Public => Channel::Public,
    }
}

/// POST /v1/schedules/{id}/bookings
///
/// One-shot creation for stateless clients: the whole wizard runs
/// server-side against the submitted payload, so every step guard and
/// the saga's compensation logic apply exactly as they do for the
/// interactive flow.
async fn create_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(schedule_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let schedule = state
        .schedules
        .get_schedule(schedule_id)
        .await?
        .ok_or_else(|| BookingFlowError::NotFound(format!("schedule {}", schedule_id)))?;
    if !schedule.is_bookable() {
        return Err(BookingFlowError::Validation(
            "schedule is not open for booking".to_string(),
        )
        .into());
    }

    if request.payment_method == PaymentMethod::AgentCredit && caller.role() != Role::Agent {
        return Err(BookingFlowError::Validation(
            "agent-credit settlement requires an agent caller".to_string(),
        )
        .into());
    }

    let ticket_types = state.schedules.get_ticket_types(schedule_id).await?;
    let mut wizard = BookingWizard::new(&schedule, channel_for(caller.role()));
    wizard.set_selections(request.selections.clone(), &schedule, &ticket_types)?;

    if request.passenger_names.len() != wizard.passengers.len() {
        return Err(BookingFlowError::Validation(format!(
            "{} passenger names supplied for {} tickets",
            request.passenger_names.len(),
            wizard.passengers.len()
        ))
        .into());
    }
    for (passenger, name) in wizard.passengers.iter_mut().zip(&request.passenger_names) {
        passenger.name = name.clone();
    }

    wizard.advance()?;
    if wizard.step == WizardStep::Seats {
        for seat in &request.seats {
            if let Err(err) = wizard
                .seats
                .toggle_seat(&*state.schedules, seat, state.seat_hold_ttl())
                .await
            {
                let _ = wizard.abandon(&*state.schedules, &state.ledger).await;
                return Err(err.into());
            }
        }
        if let Err(err) = wizard.advance() {
            let _ = wizard.abandon(&*state.schedules, &state.ledger).await;
            return Err(err.into());
        }
    }
    wizard.advance()?;

    wizard.buyer = request.buyer.clone();
    wizard.payment_method = Some(request.payment_method);
    wizard.connection_id = request.connection_id;
    if let Err(err) = wizard.authorize_payment(&state.ledger).await {
        let _ = wizard.abandon(&*state.schedules, &state.ledger).await;
        return Err(err.into());
    }

    match state
        .booking_service
        .create(&mut wizard, idempotency_key)
        .await
    {
        Ok(response) => Ok((StatusCode::CREATED, Json(response))),
        // The booking survived; only the gateway leg failed. Holds stay
        // committed and the caller retries payment under the same key.
        Err(err @ BookingFlowError::ExternalService(_)) => Err(err.into()),
        Err(err) => {
            let _ = wizard.abandon(&*state.schedules, &state.ledger).await;
            Err(err.into())
        }
    }
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>, AppError> {
    let booking = state
        .bookings
        .get_booking(id)
        .await?
        .ok_or_else(|| BookingFlowError::NotFound(format!("booking {}", id)))?;
    let tickets = state.bookings.tickets_for(booking.id).await?;
    Ok(Json(BookingView { booking, tickets }))
}

async fn get_booking_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<BookingView>, AppError> {
    let code = code.trim().to_ascii_uppercase();
    let booking = state
        .bookings
        .find_by_code(&code)
        .await?
        .ok_or_else(|| BookingFlowError::NotFound(format!("booking {}", code)))?;
    let tickets = state.bookings.tickets_for(booking.id).await?;
    Ok(Json(BookingView { booking, tickets }))
}

/// POST /v1/bookings/{id}/confirm, the CARD polling path.
async fn confirm_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let response = state.booking_service.confirm_card_payment(id).await?;
    Ok(Json(response))
}
