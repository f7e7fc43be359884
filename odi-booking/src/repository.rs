use async_trait::async_trait;
use odi_core::BoxError;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, Ticket};

/// Durable store for bookings, their passengers and issued tickets.
/// `create_booking` must reject a duplicate booking code so the store can
/// retry with a fresh one, and must persist the idempotency key in the
/// same unit of work as the booking row.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create_booking(&self, booking: &Booking) -> Result<(), BoxError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, BoxError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Booking>, BoxError>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Booking>, BoxError>;

    async fn update_status(&self, id: Uuid, status: BookingStatus) -> Result<(), BoxError>;

    async fn set_gateway_transaction(&self, id: Uuid, transaction_id: &str)
        -> Result<(), BoxError>;

    async fn find_by_gateway_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Booking>, BoxError>;

    async fn store_tickets(&self, tickets: &[Ticket]) -> Result<(), BoxError>;

    async fn tickets_for(&self, booking_id: Uuid) -> Result<Vec<Ticket>, BoxError>;
}
