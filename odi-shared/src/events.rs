use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Laari;

/// Booking lifecycle events published on the in-process broadcast bus.
/// Consumers (notification worker, availability caches) treat these as
/// fire-and-forget signals; delivery is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEvent {
    BookingCreated {
        booking_id: Uuid,
        code: String,
        schedule_id: Uuid,
        buyer_phone: String,
        total: Laari,
        currency: String,
        occurred_at: DateTime<Utc>,
    },
    BookingConfirmed {
        booking_id: Uuid,
        code: String,
        buyer_phone: String,
        occurred_at: DateTime<Utc>,
    },
    BookingCancelled {
        booking_id: Uuid,
        code: String,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    TicketsIssued {
        booking_id: Uuid,
        buyer_phone: String,
        ticket_codes: Vec<String>,
        occurred_at: DateTime<Utc>,
    },
    ConnectionApproved {
        connection_id: Uuid,
        agent_id: Uuid,
        owner_id: Uuid,
        credit_limit: Laari,
        occurred_at: DateTime<Utc>,
    },
}

impl BookingEvent {
    pub fn booking_id(&self) -> Option<Uuid> {
        match self {
            BookingEvent::BookingCreated { booking_id, .. }
            | BookingEvent::BookingConfirmed { booking_id, .. }
            | BookingEvent::BookingCancelled { booking_id, .. }
            | BookingEvent::TicketsIssued { booking_id, .. } => Some(*booking_id),
            BookingEvent::ConnectionApproved { .. } => None,
        }
    }
}
