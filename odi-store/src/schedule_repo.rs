use async_trait::async_trait;
use chrono::{DateTime, Utc};
use odi_catalog::repository::ScheduleRepository;
use odi_catalog::schedule::{
    PricedTicketType, Schedule, ScheduleStatus, SeatMode, TicketType,
};
use odi_catalog::seatmap::{Seat, SeatMap, SeatStatus};
use odi_core::BoxError;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgScheduleRepository {
    pool: PgPool,
}

impl PgScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    boat_name: String,
    travel_date: chrono::NaiveDate,
    seat_mode: String,
    total_seats: i32,
    available_seats: i32,
    status: String,
    currency: String,
    tax_profile: Option<serde_json::Value>,
    segments: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl ScheduleRow {
    fn into_schedule(self) -> Result<Schedule, BoxError> {
        let seat_mode = match self.seat_mode.as_str() {
            "SEATMAP" => SeatMode::Seatmap,
            _ => SeatMode::Capacity,
        };
        let status = match self.status.as_str() {
            "PUBLISHED" => ScheduleStatus::Published,
            "CANCELLED" => ScheduleStatus::Cancelled,
            "COMPLETED" => ScheduleStatus::Completed,
            _ => ScheduleStatus::Draft,
        };
        let tax_profile = self
            .tax_profile
            .map(serde_json::from_value)
            .transpose()?;
        let segments = serde_json::from_value(self.segments)?;
        Ok(Schedule {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            boat_name: self.boat_name,
            travel_date: self.travel_date,
            seat_mode,
            total_seats: self.total_seats.max(0) as u32,
            available_seats: self.available_seats.max(0) as u32,
            status,
            currency: self.currency,
            tax_profile,
            segments,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PricedTicketTypeRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    code: String,
    base_price: i64,
    currency: String,
    refundable: bool,
    surcharge: i64,
    discount: i64,
    active: bool,
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    number: String,
    status: String,
    hold_expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>, BoxError> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            "SELECT id, owner_id, name, boat_name, travel_date, seat_mode, total_seats, \
             available_seats, status, currency, tax_profile, segments, created_at \
             FROM schedules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ScheduleRow::into_schedule).transpose()
    }

    async fn get_ticket_types(&self, schedule_id: Uuid) -> Result<Vec<PricedTicketType>, BoxError> {
        let rows = sqlx::query_as::<_, PricedTicketTypeRow>(
            "SELECT t.id, t.owner_id, t.name, t.code, t.base_price, t.currency, t.refundable, \
             s.surcharge, s.discount, s.active \
             FROM schedule_ticket_types s \
             JOIN ticket_types t ON t.id = s.ticket_type_id \
             WHERE s.schedule_id = $1",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PricedTicketType {
                ticket_type: TicketType {
                    id: row.id,
                    owner_id: row.owner_id,
                    name: row.name,
                    code: row.code,
                    base_price: row.base_price,
                    currency: row.currency,
                    refundable: row.refundable,
                },
                surcharge: row.surcharge,
                discount: row.discount,
                active: row.active,
            })
            .collect())
    }

    async fn get_seat_map(&self, schedule_id: Uuid) -> Result<SeatMap, BoxError> {
        let rows = sqlx::query_as::<_, SeatRow>(
            "SELECT number, status, hold_expires_at FROM seats \
             WHERE schedule_id = $1 ORDER BY number",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        let seats = rows
            .into_iter()
            .map(|row| {
                let status = match row.status.as_str() {
                    "OCCUPIED" => SeatStatus::Occupied,
                    "BLOCKED" => SeatStatus::Blocked,
                    // An expired hold reads as available.
                    "HELD" => match row.hold_expires_at {
                        Some(expires) if expires > now => SeatStatus::Selected,
                        _ => SeatStatus::Available,
                    },
                    _ => SeatStatus::Available,
                };
                Seat {
                    number: row.number,
                    status,
                }
            })
            .collect();
        Ok(SeatMap { seats })
    }

    async fn hold_seat(
        &self,
        schedule_id: Uuid,
        seat: &str,
        session_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        let result = sqlx::query(
            "UPDATE seats SET status = 'HELD', held_by = $3, hold_expires_at = $4 \
             WHERE schedule_id = $1 AND number = $2 \
             AND (status = 'AVAILABLE' \
                  OR (status = 'HELD' AND (held_by = $3 OR hold_expires_at <= now())))",
        )
        .bind(schedule_id)
        .bind(seat)
        .bind(session_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_hold(
        &self,
        schedule_id: Uuid,
        seat: &str,
        session_id: Uuid,
    ) -> Result<(), BoxError> {
        sqlx::query(
            "UPDATE seats SET status = 'AVAILABLE', held_by = NULL, hold_expires_at = NULL \
             WHERE schedule_id = $1 AND number = $2 AND status = 'HELD' AND held_by = $3",
        )
        .bind(schedule_id)
        .bind(seat)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn occupy_seat(
        &self,
        schedule_id: Uuid,
        seat: &str,
        session_id: Uuid,
    ) -> Result<bool, BoxError> {
        // The authoritative transition. The WHERE clause is the whole
        // concurrency story: the row changes only if nobody else won.
        let result = sqlx::query(
            "UPDATE seats SET status = 'OCCUPIED', held_by = NULL, hold_expires_at = NULL \
             WHERE schedule_id = $1 AND number = $2 \
             AND (status = 'AVAILABLE' \
                  OR (status = 'HELD' AND (held_by = $3 OR hold_expires_at <= now())))",
        )
        .bind(schedule_id)
        .bind(seat)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_seat(&self, schedule_id: Uuid, seat: &str) -> Result<(), BoxError> {
        sqlx::query(
            "UPDATE seats SET status = 'AVAILABLE', held_by = NULL, hold_expires_at = NULL \
             WHERE schedule_id = $1 AND number = $2 AND status = 'OCCUPIED'",
        )
        .bind(schedule_id)
        .bind(seat)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reserve_capacity(&self, schedule_id: Uuid, count: u32) -> Result<bool, BoxError> {
        let result = sqlx::query(
            "UPDATE schedules SET available_seats = available_seats - $2 \
             WHERE id = $1 AND available_seats >= $2",
        )
        .bind(schedule_id)
        .bind(count as i32)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_capacity(&self, schedule_id: Uuid, count: u32) -> Result<(), BoxError> {
        sqlx::query(
            "UPDATE schedules SET available_seats = LEAST(available_seats + $2, total_seats) \
             WHERE id = $1",
        )
        .bind(schedule_id)
        .bind(count as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_expired_holds(&self, now: DateTime<Utc>) -> Result<usize, BoxError> {
        let result = sqlx::query(
            "UPDATE seats SET status = 'AVAILABLE', held_by = NULL, hold_expires_at = NULL \
             WHERE status = 'HELD' AND hold_expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }
}
