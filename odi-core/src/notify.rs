use async_trait::async_trait;

use crate::BoxError;

/// Outbound rider notifications (SMS today, push later). Dispatch is
/// fire-and-forget: a failed send must never block or roll back a booking
/// confirmation, so callers ignore the result or log it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_booking_confirmation(
        &self,
        phone: &str,
        booking_code: &str,
        schedule_name: &str,
        travel_date: &str,
    ) -> Result<(), BoxError>;

    async fn send_ticket_issued(
        &self,
        phone: &str,
        booking_code: &str,
        ticket_codes: &[String],
    ) -> Result<(), BoxError>;

    async fn send_notification(&self, phone: &str, message: &str) -> Result<(), BoxError>;
}

/// Console-backed sink for development: writes every message to the log
/// instead of a real SMS provider.
pub struct ConsoleNotifier;

#[async_trait]
impl NotificationSink for ConsoleNotifier {
    async fn send_booking_confirmation(
        &self,
        phone: &str,
        booking_code: &str,
        schedule_name: &str,
        travel_date: &str,
    ) -> Result<(), BoxError> {
        tracing::info!(
            phone = %odi_shared::pii::Phone::new(phone),
            booking_code,
            "SMS: booking {} confirmed for {} on {}",
            booking_code,
            schedule_name,
            travel_date
        );
        Ok(())
    }

    async fn send_ticket_issued(
        &self,
        phone: &str,
        booking_code: &str,
        ticket_codes: &[String],
    ) -> Result<(), BoxError> {
        tracing::info!(
            phone = %odi_shared::pii::Phone::new(phone),
            booking_code,
            "SMS: {} ticket(s) issued: {}",
            ticket_codes.len(),
            ticket_codes.join(", ")
        );
        Ok(())
    }

    async fn send_notification(&self, phone: &str, message: &str) -> Result<(), BoxError> {
        tracing::info!(phone = %odi_shared::pii::Phone::new(phone), "SMS: {}", message);
        Ok(())
    }
}
