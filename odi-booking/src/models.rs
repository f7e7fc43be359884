use chrono::{DateTime, Utc};
use odi_shared::pii::Phone;
use odi_shared::Laari;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking-code alphabet with the lookalikes (I, L, O, 0, 1) removed.
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    AgentCredit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Public,
    Agent,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buyer {
    pub name: String,
    pub phone: Phone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<Phone>,
    pub ticket_type_id: Uuid,
    pub seat_number: Option<String>,
}

impl Passenger {
    pub fn new(name: impl Into<String>, ticket_type_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: None,
            ticket_type_id,
            seat_number: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// Short human-readable code quoted at the jetty.
    pub code: String,
    pub schedule_id: Uuid,
    pub channel: Channel,
    pub status: BookingStatus,
    pub buyer: Buyer,
    pub passengers: Vec<Passenger>,
    pub payment_method: PaymentMethod,
    /// Set for AGENT_CREDIT bookings; the connection that was debited.
    pub connection_id: Option<Uuid>,
    /// Gateway transaction id for CARD bookings awaiting confirmation.
    pub gateway_transaction_id: Option<String>,
    pub subtotal: Laari,
    pub tax: Laari,
    pub total: Laari,
    pub currency: String,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Generate a 6-character code. Uniqueness is enforced at insert time,
    /// not here; the store retries on a collision.
    pub fn generate_code() -> String {
        let mut rng = rand::thread_rng();
        (0..CODE_LEN)
            .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }
}

/// An issued travel document, one per passenger on a confirmed booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub passenger_id: Uuid,
    pub ticket_code: String,
    pub seat_number: Option<String>,
    pub issued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        for _ in 0..50 {
            let code = Booking::generate_code();
            assert_eq!(code.len(), 6);
            assert!(code
                .bytes()
                .all(|b| CODE_CHARSET.contains(&b)), "bad code {code}");
        }
    }

    #[test]
    fn test_code_skips_lookalikes() {
        for banned in [b'I', b'L', b'O', b'0', b'1'] {
            assert!(!CODE_CHARSET.contains(&banned));
        }
    }
}
