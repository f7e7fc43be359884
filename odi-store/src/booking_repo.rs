use async_trait::async_trait;
use chrono::{DateTime, Utc};
use odi_booking::models::{
    Booking, BookingStatus, Buyer, Channel, Passenger, PaymentMethod, Ticket,
};
use odi_booking::repository::BookingRepository;
use odi_core::BoxError;
use odi_shared::pii::Phone;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(&self, row: BookingRow) -> Result<Booking, BoxError> {
        let passengers = sqlx::query_as::<_, PassengerRow>(
            "SELECT id, name, phone, ticket_type_id, seat_number FROM passengers \
             WHERE booking_id = $1 ORDER BY position",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;
        row.into_booking(passengers)
    }
}

fn channel_str(channel: Channel) -> &'static str {
    match channel {
        Channel::Public => "PUBLIC",
        Channel::Agent => "AGENT",
        Channel::Owner => "OWNER",
    }
}

fn status_str(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "PENDING",
        BookingStatus::Confirmed => "CONFIRMED",
        BookingStatus::Cancelled => "CANCELLED",
    }
}

fn method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "CASH",
        PaymentMethod::BankTransfer => "BANK_TRANSFER",
        PaymentMethod::Card => "CARD",
        PaymentMethod::AgentCredit => "AGENT_CREDIT",
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    code: String,
    schedule_id: Uuid,
    channel: String,
    status: String,
    buyer_name: String,
    buyer_phone: String,
    payment_method: String,
    connection_id: Option<Uuid>,
    gateway_transaction_id: Option<String>,
    subtotal: i64,
    tax: i64,
    total: i64,
    currency: String,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

const BOOKING_COLUMNS: &str = "id, code, schedule_id, channel, status, buyer_name, buyer_phone, \
     payment_method, connection_id, gateway_transaction_id, subtotal, tax, total, currency, \
     idempotency_key, created_at, confirmed_at, cancelled_at";

#[derive(sqlx::FromRow)]
struct PassengerRow {
    id: Uuid,
    name: String,
    phone: Option<String>,
    ticket_type_id: Uuid,
    seat_number: Option<String>,
}

impl BookingRow {
    fn into_booking(self, passengers: Vec<PassengerRow>) -> Result<Booking, BoxError> {
        let channel = match self.channel.as_str() {
            "AGENT" => Channel::Agent,
            "OWNER" => Channel::Owner,
            _ => Channel::Public,
        };
        let status = match self.status.as_str() {
            "CONFIRMED" => BookingStatus::Confirmed,
            "CANCELLED" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        };
        let payment_method = match self.payment_method.as_str() {
            "BANK_TRANSFER" => PaymentMethod::BankTransfer,
            "CARD" => PaymentMethod::Card,
            "AGENT_CREDIT" => PaymentMethod::AgentCredit,
            _ => PaymentMethod::Cash,
        };
        Ok(Booking {
            id: self.id,
            code: self.code,
            schedule_id: self.schedule_id,
            channel,
            status,
            buyer: Buyer {
                name: self.buyer_name,
                phone: Phone::from(self.buyer_phone),
            },
            passengers: passengers
                .into_iter()
                .map(|p| Passenger {
                    id: p.id,
                    name: p.name,
                    phone: p.phone.map(Phone::from),
                    ticket_type_id: p.ticket_type_id,
                    seat_number: p.seat_number,
                })
                .collect(),
            payment_method,
            connection_id: self.connection_id,
            gateway_transaction_id: self.gateway_transaction_id,
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
            currency: self.currency,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
            confirmed_at: self.confirmed_at,
            cancelled_at: self.cancelled_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    booking_id: Uuid,
    passenger_id: Uuid,
    ticket_code: String,
    seat_number: Option<String>,
    issued_at: DateTime<Utc>,
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_booking(&self, booking: &Booking) -> Result<(), BoxError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO bookings (id, code, schedule_id, channel, status, buyer_name, \
             buyer_phone, payment_method, connection_id, gateway_transaction_id, subtotal, \
             tax, total, currency, idempotency_key, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(booking.id)
        .bind(&booking.code)
        .bind(booking.schedule_id)
        .bind(channel_str(booking.channel))
        .bind(status_str(booking.status))
        .bind(&booking.buyer.name)
        .bind(booking.buyer.phone.as_str())
        .bind(method_str(booking.payment_method))
        .bind(booking.connection_id)
        .bind(&booking.gateway_transaction_id)
        .bind(booking.subtotal)
        .bind(booking.tax)
        .bind(booking.total)
        .bind(&booking.currency)
        .bind(&booking.idempotency_key)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, passenger) in booking.passengers.iter().enumerate() {
            sqlx::query(
                "INSERT INTO passengers (id, booking_id, position, name, phone, \
                 ticket_type_id, seat_number) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(passenger.id)
            .bind(booking.id)
            .bind(position as i32)
            .bind(&passenger.name)
            .bind(passenger.phone.as_ref().map(|p| p.as_str().to_string()))
            .bind(passenger.ticket_type_id)
            .bind(&passenger.seat_number)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, BoxError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.load(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Booking>, BoxError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.load(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Booking>, BoxError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE idempotency_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.load(row).await?)),
            None => Ok(None),
        }
    }

    async fn update_status(&self, id: Uuid, status: BookingStatus) -> Result<(), BoxError> {
        let timestamp_column = match status {
            BookingStatus::Confirmed => "confirmed_at = now(),",
            BookingStatus::Cancelled => "cancelled_at = now(),",
            BookingStatus::Pending => "",
        };
        let result = sqlx::query(&format!(
            "UPDATE bookings SET {timestamp_column} status = $2 WHERE id = $1"
        ))
        .bind(id)
        .bind(status_str(status))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(format!("booking {} not found", id).into());
        }
        Ok(())
    }

    async fn set_gateway_transaction(
        &self,
        id: Uuid,
        transaction_id: &str,
    ) -> Result<(), BoxError> {
        sqlx::query("UPDATE bookings SET gateway_transaction_id = $2 WHERE id = $1")
            .bind(id)
            .bind(transaction_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_gateway_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Booking>, BoxError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE gateway_transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.load(row).await?)),
            None => Ok(None),
        }
    }

    async fn store_tickets(&self, tickets: &[Ticket]) -> Result<(), BoxError> {
        let mut tx = self.pool.begin().await?;
        for ticket in tickets {
            sqlx::query(
                "INSERT INTO tickets (id, booking_id, passenger_id, ticket_code, \
                 seat_number, issued_at) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(ticket.id)
            .bind(ticket.booking_id)
            .bind(ticket.passenger_id)
            .bind(&ticket.ticket_code)
            .bind(&ticket.seat_number)
            .bind(ticket.issued_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn tickets_for(&self, booking_id: Uuid) -> Result<Vec<Ticket>, BoxError> {
        let rows = sqlx::query_as::<_, TicketRow>(
            "SELECT id, booking_id, passenger_id, ticket_code, seat_number, issued_at \
             FROM tickets WHERE booking_id = $1 ORDER BY issued_at",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| Ticket {
                id: row.id,
                booking_id: row.booking_id,
                passenger_id: row.passenger_id,
                ticket_code: row.ticket_code,
                seat_number: row.seat_number,
                issued_at: row.issued_at,
            })
            .collect())
    }
}
