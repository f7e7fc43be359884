use chrono::Utc;
use uuid::Uuid;

use crate::models::{Booking, Ticket};

/// Issues one scannable ticket per passenger once a booking is confirmed.
pub struct TicketIssuer;

impl TicketIssuer {
    /// Ticket codes look like `ODI-1756500000-9F3A21BC`.
    fn generate_code(passenger_id: &Uuid) -> String {
        let timestamp = Utc::now().timestamp();
        let short_id = &passenger_id.simple().to_string()[..8];
        format!("ODI-{}-{}", timestamp, short_id.to_uppercase())
    }

    pub fn issue_for(booking: &Booking) -> Vec<Ticket> {
        booking
            .passengers
            .iter()
            .map(|passenger| Ticket {
                id: Uuid::new_v4(),
                booking_id: booking.id,
                passenger_id: passenger.id,
                ticket_code: Self::generate_code(&passenger.id),
                seat_number: passenger.seat_number.clone(),
                issued_at: Utc::now(),
            })
            .collect()
    }

    /// QR payload for the deckhand's scanner app.
    pub fn qr_data(ticket: &Ticket) -> String {
        serde_json::json!({
            "ticket_code": ticket.ticket_code,
            "booking_id": ticket.booking_id,
            "seat": ticket.seat_number,
            "issued_at": ticket.issued_at,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, Buyer, Channel, Passenger, PaymentMethod};
    use odi_shared::pii::Phone;

    fn booking_with_passengers(count: usize) -> Booking {
        let passengers = (0..count)
            .map(|i| {
                let mut p = Passenger::new(format!("Passenger {i}"), Uuid::new_v4());
                p.seat_number = Some(format!("A{}", i + 1));
                p
            })
            .collect();
        Booking {
            id: Uuid::new_v4(),
            code: Booking::generate_code(),
            schedule_id: Uuid::new_v4(),
            channel: Channel::Public,
            status: BookingStatus::Confirmed,
            buyer: Buyer {
                name: "Aminath".to_string(),
                phone: Phone::from("9991234"),
            },
            passengers,
            payment_method: PaymentMethod::Cash,
            connection_id: None,
            gateway_transaction_id: None,
            subtotal: 10_000,
            tax: 0,
            total: 10_000,
            currency: "MVR".to_string(),
            idempotency_key: None,
            created_at: Utc::now(),
            confirmed_at: Some(Utc::now()),
            cancelled_at: None,
        }
    }

    #[test]
    fn test_one_ticket_per_passenger() {
        let booking = booking_with_passengers(3);
        let tickets = TicketIssuer::issue_for(&booking);
        assert_eq!(tickets.len(), 3);
        for (ticket, passenger) in tickets.iter().zip(&booking.passengers) {
            assert!(ticket.ticket_code.starts_with("ODI-"));
            assert_eq!(ticket.passenger_id, passenger.id);
            assert_eq!(ticket.seat_number, passenger.seat_number);
        }
    }

    #[test]
    fn test_qr_data_contains_code() {
        let booking = booking_with_passengers(1);
        let ticket = &TicketIssuer::issue_for(&booking)[0];
        let payload: serde_json::Value = serde_json::from_str(&TicketIssuer::qr_data(ticket)).unwrap();
        assert_eq!(payload["ticket_code"], ticket.ticket_code);
    }
}
