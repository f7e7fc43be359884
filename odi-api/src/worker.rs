use chrono::Utc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::state::AppState;
use odi_booking::repository::BookingRepository;
use odi_catalog::repository::ScheduleRepository;
use odi_shared::events::BookingEvent;

/// Background sweep that releases expired seat holds and credit
/// authorizations. Runs until the process exits.
pub async fn start_expiry_sweeper(state: AppState) {
    let mut ticker = interval(Duration::from_secs(state.rules.sweep_interval_seconds));
    info!(
        interval_seconds = state.rules.sweep_interval_seconds,
        "expiry sweeper started"
    );

    loop {
        ticker.tick().await;
        let now = Utc::now();

        match state.schedules.release_expired_holds(now).await {
            Ok(released) if released > 0 => {
                info!(released, "released expired seat holds");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "seat hold sweep failed"),
        }

        let dropped = state.ledger.release_expired(now);
        if dropped > 0 {
            info!(dropped, "released expired credit authorizations");
        }
    }
}

/// Forwards booking lifecycle events to the notification sink.
/// Delivery is fire-and-forget; failures are logged and dropped.
pub async fn start_notification_worker(state: AppState) {
    let mut events = state.events.subscribe();
    info!("notification worker started");

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                error!(skipped, "notification worker lagged, events dropped");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        };

        if let Err(e) = handle_event(&state, event).await {
            error!(error = %e, "notification dispatch failed");
        }
    }
}

async fn handle_event(state: &AppState, event: BookingEvent) -> Result<(), odi_core::BoxError> {
    match event {
        BookingEvent::BookingConfirmed {
            booking_id,
            code,
            buyer_phone,
            ..
        } => {
            let (schedule_name, travel_date) = match state.bookings.get_booking(booking_id).await?
            {
                Some(booking) => match state.schedules.get_schedule(booking.schedule_id).await? {
                    Some(schedule) => (schedule.name, schedule.travel_date.to_string()),
                    None => (String::new(), String::new()),
                },
                None => (String::new(), String::new()),
            };
            state
                .notifier
                .send_booking_confirmation(&buyer_phone, &code, &schedule_name, &travel_date)
                .await
        }
        BookingEvent::TicketsIssued {
            booking_id,
            buyer_phone,
            ticket_codes,
            ..
        } => {
            let code = state
                .bookings
                .get_booking(booking_id)
                .await?
                .map(|b| b.code)
                .unwrap_or_default();
            state
                .notifier
                .send_ticket_issued(&buyer_phone, &code, &ticket_codes)
                .await
        }
        BookingEvent::BookingCancelled { code, reason, .. } => {
            info!(code, reason, "booking cancelled");
            Ok(())
        }
        BookingEvent::BookingCreated { .. } | BookingEvent::ConnectionApproved { .. } => Ok(()),
    }
}
