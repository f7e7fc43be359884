use async_trait::async_trait;
use chrono::{DateTime, Utc};
use odi_core::BoxError;
use uuid::Uuid;

use crate::schedule::{PricedTicketType, Schedule};
use crate::seatmap::SeatMap;

/// Access to schedules, ticket-type catalogs and the authoritative
/// seat/capacity state. Every mutating operation is a single atomic
/// conditional update at the store boundary; callers never read-then-write
/// seat or capacity state, because that is a TOCTOU race under concurrent
/// bookings.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>, BoxError>;

    async fn get_ticket_types(&self, schedule_id: Uuid) -> Result<Vec<PricedTicketType>, BoxError>;

    async fn get_seat_map(&self, schedule_id: Uuid) -> Result<SeatMap, BoxError>;

    /// Place or refresh a hold (SELECTED) on a seat for a wizard session.
    /// Returns false when the seat is not AVAILABLE or is held by another
    /// live session. Holds carry a server-side expiry so abandoned
    /// sessions never lock a seat permanently.
    async fn hold_seat(
        &self,
        schedule_id: Uuid,
        seat: &str,
        session_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, BoxError>;

    /// Drop a session's hold, returning the seat to AVAILABLE. No-op when
    /// the hold belongs to a different session.
    async fn release_hold(&self, schedule_id: Uuid, seat: &str, session_id: Uuid)
        -> Result<(), BoxError>;

    /// Atomic conditional transition to OCCUPIED. Succeeds only when the
    /// seat is AVAILABLE or held by this session; returns false when a
    /// concurrent booking got there first (the row did not change).
    async fn occupy_seat(
        &self,
        schedule_id: Uuid,
        seat: &str,
        session_id: Uuid,
    ) -> Result<bool, BoxError>;

    /// Compensation path: OCCUPIED back to AVAILABLE.
    async fn release_seat(&self, schedule_id: Uuid, seat: &str) -> Result<(), BoxError>;

    /// Atomic decrement of the availability counter with a floor check.
    /// Returns false when remaining capacity changed concurrently and can
    /// no longer cover `count`.
    async fn reserve_capacity(&self, schedule_id: Uuid, count: u32) -> Result<bool, BoxError>;

    async fn release_capacity(&self, schedule_id: Uuid, count: u32) -> Result<(), BoxError>;

    /// Release seat holds whose expiry has passed. Returns how many were
    /// swept. Driven by the background expiry worker.
    async fn release_expired_holds(&self, now: DateTime<Utc>) -> Result<usize, BoxError>;
}
