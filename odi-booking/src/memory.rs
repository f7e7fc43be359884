use async_trait::async_trait;
use chrono::Utc;
use odi_core::BoxError;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, Ticket};
use crate::repository::BookingRepository;

#[derive(Default)]
struct Inner {
    bookings: HashMap<Uuid, Booking>,
    tickets: Vec<Ticket>,
}

pub struct MemoryBookingStore {
    inner: Mutex<Inner>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingRepository for MemoryBookingStore {
    async fn create_booking(&self, booking: &Booking) -> Result<(), BoxError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.bookings.values().any(|b| b.code == booking.code) {
            return Err(format!("booking code {} already exists", booking.code).into());
        }
        // Same unique constraint the schema enforces on idempotency_key.
        if let Some(key) = booking.idempotency_key.as_deref() {
            if inner
                .bookings
                .values()
                .any(|b| b.idempotency_key.as_deref() == Some(key))
            {
                return Err(format!("idempotency key {} already exists", key).into());
            }
        }
        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, BoxError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.bookings.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Booking>, BoxError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.bookings.values().find(|b| b.code == code).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Booking>, BoxError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .bookings
            .values()
            .find(|b| b.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn update_status(&self, id: Uuid, status: BookingStatus) -> Result<(), BoxError> {
        let mut inner = self.inner.lock().unwrap();
        let booking = inner
            .bookings
            .get_mut(&id)
            .ok_or_else(|| format!("booking {} not found", id))?;
        booking.status = status;
        match status {
            BookingStatus::Confirmed => booking.confirmed_at = Some(Utc::now()),
            BookingStatus::Cancelled => booking.cancelled_at = Some(Utc::now()),
            BookingStatus::Pending => {}
        }
        Ok(())
    }

    async fn set_gateway_transaction(
        &self,
        id: Uuid,
        transaction_id: &str,
    ) -> Result<(), BoxError> {
        let mut inner = self.inner.lock().unwrap();
        let booking = inner
            .bookings
            .get_mut(&id)
            .ok_or_else(|| format!("booking {} not found", id))?;
        booking.gateway_transaction_id = Some(transaction_id.to_string());
        Ok(())
    }

    async fn find_by_gateway_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Booking>, BoxError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .bookings
            .values()
            .find(|b| b.gateway_transaction_id.as_deref() == Some(transaction_id))
            .cloned())
    }

    async fn store_tickets(&self, tickets: &[Ticket]) -> Result<(), BoxError> {
        let mut inner = self.inner.lock().unwrap();
        inner.tickets.extend_from_slice(tickets);
        Ok(())
    }

    async fn tickets_for(&self, booking_id: Uuid) -> Result<Vec<Ticket>, BoxError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tickets
            .iter()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Buyer, Channel, PaymentMethod};
    use odi_shared::pii::Phone;

    fn booking(code: &str, idempotency_key: Option<&str>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            code: code.to_string(),
            schedule_id: Uuid::new_v4(),
            channel: Channel::Public,
            status: BookingStatus::Pending,
            buyer: Buyer {
                name: "Hawwa Manike".to_string(),
                phone: Phone::new("7771234"),
            },
            passengers: vec![],
            payment_method: PaymentMethod::Cash,
            connection_id: None,
            gateway_transaction_id: None,
            subtotal: 5_000,
            tax: 0,
            total: 5_000,
            currency: "MVR".to_string(),
            idempotency_key: idempotency_key.map(str::to_string),
            created_at: Utc::now(),
            confirmed_at: None,
            cancelled_at: None,
        }
    }

    #[tokio::test]
    async fn test_rejects_duplicate_code() {
        let store = MemoryBookingStore::new();
        store.create_booking(&booking("ABC234", None)).await.unwrap();
        assert!(store.create_booking(&booking("ABC234", None)).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_duplicate_idempotency_key() {
        let store = MemoryBookingStore::new();
        store
            .create_booking(&booking("ABC234", Some("key-1")))
            .await
            .unwrap();
        let second = store.create_booking(&booking("XYZ789", Some("key-1"))).await;
        assert!(second.is_err());
        // Distinct keys and keyless bookings still insert.
        store
            .create_booking(&booking("QRS456", Some("key-2")))
            .await
            .unwrap();
        store.create_booking(&booking("TUV234", None)).await.unwrap();
    }
}
