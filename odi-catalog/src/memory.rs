use async_trait::async_trait;
use chrono::{DateTime, Utc};
use odi_core::BoxError;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::repository::ScheduleRepository;
use crate::schedule::{PricedTicketType, Schedule};
use crate::seatmap::{Seat, SeatMap, SeatStatus};

#[derive(Debug, Clone)]
enum SeatState {
    Available,
    Occupied,
    Blocked,
    Held {
        session_id: Uuid,
        expires_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
struct SeatRecord {
    number: String,
    state: SeatState,
}

#[derive(Default)]
struct Inner {
    schedules: HashMap<Uuid, Schedule>,
    ticket_types: HashMap<Uuid, Vec<PricedTicketType>>,
    seats: HashMap<Uuid, Vec<SeatRecord>>,
}

/// In-memory catalog store. Conditional updates run under one mutex, which
/// gives the same atomicity the Postgres store gets from conditional
/// UPDATEs. Used by tests and by the API when no database is configured.
pub struct MemoryCatalog {
    inner: Mutex<Inner>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn insert_schedule(&self, schedule: Schedule, ticket_types: Vec<PricedTicketType>) {
        let mut inner = self.inner.lock().unwrap();
        inner.ticket_types.insert(schedule.id, ticket_types);
        inner.schedules.insert(schedule.id, schedule);
    }

    /// Seed individually numbered seats for a SEATMAP schedule.
    pub fn insert_seats(&self, schedule_id: Uuid, numbers: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        inner.seats.insert(
            schedule_id,
            numbers
                .iter()
                .map(|n| SeatRecord {
                    number: n.to_string(),
                    state: SeatState::Available,
                })
                .collect(),
        );
    }

    pub fn block_seat(&self, schedule_id: Uuid, seat: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner
            .seats
            .get_mut(&schedule_id)
            .and_then(|seats| seats.iter_mut().find(|r| r.number == seat))
        {
            record.state = SeatState::Blocked;
        }
    }

    /// Force-occupy a seat, bypassing session checks. Test helper for
    /// simulating a concurrent booking winning the race.
    pub fn force_occupy(&self, schedule_id: Uuid, seat: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner
            .seats
            .get_mut(&schedule_id)
            .and_then(|seats| seats.iter_mut().find(|r| r.number == seat))
        {
            record.state = SeatState::Occupied;
        }
    }

    pub fn seat_status(&self, schedule_id: Uuid, seat: &str) -> Option<SeatStatus> {
        let inner = self.inner.lock().unwrap();
        inner
            .seats
            .get(&schedule_id)
            .and_then(|seats| seats.iter().find(|r| r.number == seat))
            .map(|r| status_of(&r.state, Utc::now()))
    }

    pub fn available_capacity(&self, schedule_id: Uuid) -> Option<u32> {
        let inner = self.inner.lock().unwrap();
        inner.schedules.get(&schedule_id).map(|s| s.available_seats)
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn status_of(state: &SeatState, now: DateTime<Utc>) -> SeatStatus {
    match state {
        SeatState::Available => SeatStatus::Available,
        SeatState::Occupied => SeatStatus::Occupied,
        SeatState::Blocked => SeatStatus::Blocked,
        SeatState::Held { expires_at, .. } => {
            if *expires_at <= now {
                SeatStatus::Available
            } else {
                SeatStatus::Selected
            }
        }
    }
}

#[async_trait]
impl ScheduleRepository for MemoryCatalog {
    async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>, BoxError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.schedules.get(&id).cloned())
    }

    async fn get_ticket_types(&self, schedule_id: Uuid) -> Result<Vec<PricedTicketType>, BoxError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.ticket_types.get(&schedule_id).cloned().unwrap_or_default())
    }

    async fn get_seat_map(&self, schedule_id: Uuid) -> Result<SeatMap, BoxError> {
        let inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let seats = inner
            .seats
            .get(&schedule_id)
            .map(|records| {
                records
                    .iter()
                    .map(|r| Seat {
                        number: r.number.clone(),
                        status: status_of(&r.state, now),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(SeatMap::new(seats))
    }

    async fn hold_seat(
        &self,
        schedule_id: Uuid,
        seat: &str,
        session_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let record = match inner
            .seats
            .get_mut(&schedule_id)
            .and_then(|seats| seats.iter_mut().find(|r| r.number == seat))
        {
            Some(record) => record,
            None => return Ok(false),
        };

        let holdable = match &record.state {
            SeatState::Available => true,
            SeatState::Held {
                session_id: holder,
                expires_at: held_until,
            } => *holder == session_id || *held_until <= now,
            _ => false,
        };

        if holdable {
            record.state = SeatState::Held {
                session_id,
                expires_at,
            };
        }
        Ok(holdable)
    }

    async fn release_hold(
        &self,
        schedule_id: Uuid,
        seat: &str,
        session_id: Uuid,
    ) -> Result<(), BoxError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner
            .seats
            .get_mut(&schedule_id)
            .and_then(|seats| seats.iter_mut().find(|r| r.number == seat))
        {
            if let SeatState::Held {
                session_id: holder, ..
            } = &record.state
            {
                if *holder == session_id {
                    record.state = SeatState::Available;
                }
            }
        }
        Ok(())
    }

    async fn occupy_seat(
        &self,
        schedule_id: Uuid,
        seat: &str,
        session_id: Uuid,
    ) -> Result<bool, BoxError> {
        let mut inner = self.inner.lock().unwrap();
        let record = match inner
            .seats
            .get_mut(&schedule_id)
            .and_then(|seats| seats.iter_mut().find(|r| r.number == seat))
        {
            Some(record) => record,
            None => return Ok(false),
        };

        let taken = match &record.state {
            SeatState::Available => true,
            SeatState::Held {
                session_id: holder, ..
            } => *holder == session_id,
            _ => false,
        };

        if taken {
            record.state = SeatState::Occupied;
        }
        Ok(taken)
    }

    async fn release_seat(&self, schedule_id: Uuid, seat: &str) -> Result<(), BoxError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner
            .seats
            .get_mut(&schedule_id)
            .and_then(|seats| seats.iter_mut().find(|r| r.number == seat))
        {
            if matches!(record.state, SeatState::Occupied) {
                record.state = SeatState::Available;
            }
        }
        Ok(())
    }

    async fn reserve_capacity(&self, schedule_id: Uuid, count: u32) -> Result<bool, BoxError> {
        let mut inner = self.inner.lock().unwrap();
        let schedule = match inner.schedules.get_mut(&schedule_id) {
            Some(schedule) => schedule,
            None => return Ok(false),
        };

        if schedule.available_seats < count {
            return Ok(false);
        }
        schedule.available_seats -= count;
        Ok(true)
    }

    async fn release_capacity(&self, schedule_id: Uuid, count: u32) -> Result<(), BoxError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(schedule) = inner.schedules.get_mut(&schedule_id) {
            schedule.available_seats = (schedule.available_seats + count).min(schedule.total_seats);
        }
        Ok(())
    }

    async fn release_expired_holds(&self, now: DateTime<Utc>) -> Result<usize, BoxError> {
        let mut inner = self.inner.lock().unwrap();
        let mut swept = 0;
        for seats in inner.seats.values_mut() {
            for record in seats.iter_mut() {
                if let SeatState::Held { expires_at, .. } = &record.state {
                    if *expires_at <= now {
                        record.state = SeatState::Available;
                        swept += 1;
                    }
                }
            }
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{ScheduleStatus, SeatMode};
    use chrono::Duration;

    fn seatmap_schedule() -> Schedule {
        Schedule {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Male - Maafushi 0900".to_string(),
            boat_name: "Odi Express".to_string(),
            travel_date: chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            seat_mode: SeatMode::Seatmap,
            total_seats: 4,
            available_seats: 4,
            status: ScheduleStatus::Published,
            currency: "MVR".to_string(),
            tax_profile: None,
            segments: vec![],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_hold_then_occupy() {
        let store = MemoryCatalog::new();
        let schedule = seatmap_schedule();
        let schedule_id = schedule.id;
        store.insert_schedule(schedule, vec![]);
        store.insert_seats(schedule_id, &["A1", "A2"]);

        let session = Uuid::new_v4();
        let expires = Utc::now() + Duration::minutes(10);

        assert!(store.hold_seat(schedule_id, "A1", session, expires).await.unwrap());
        assert_eq!(store.seat_status(schedule_id, "A1"), Some(SeatStatus::Selected));

        // Another session cannot hold or occupy a held seat.
        let other = Uuid::new_v4();
        assert!(!store.hold_seat(schedule_id, "A1", other, expires).await.unwrap());
        assert!(!store.occupy_seat(schedule_id, "A1", other).await.unwrap());

        // The holding session commits.
        assert!(store.occupy_seat(schedule_id, "A1", session).await.unwrap());
        assert_eq!(store.seat_status(schedule_id, "A1"), Some(SeatStatus::Occupied));
    }

    #[tokio::test]
    async fn test_expired_hold_can_be_retaken() {
        let store = MemoryCatalog::new();
        let schedule = seatmap_schedule();
        let schedule_id = schedule.id;
        store.insert_schedule(schedule, vec![]);
        store.insert_seats(schedule_id, &["A1"]);

        let stale = Uuid::new_v4();
        let past = Utc::now() - Duration::minutes(1);
        assert!(store.hold_seat(schedule_id, "A1", stale, past).await.unwrap());

        // Seat map already reports it as available again.
        assert_eq!(store.seat_status(schedule_id, "A1"), Some(SeatStatus::Available));

        let fresh = Uuid::new_v4();
        let future = Utc::now() + Duration::minutes(10);
        assert!(store.hold_seat(schedule_id, "A1", fresh, future).await.unwrap());

        // Sweep counts only holds that are actually stale.
        assert_eq!(store.release_expired_holds(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_capacity_floor() {
        let store = MemoryCatalog::new();
        let schedule = seatmap_schedule();
        let schedule_id = schedule.id;
        store.insert_schedule(schedule, vec![]);

        assert!(store.reserve_capacity(schedule_id, 3).await.unwrap());
        assert_eq!(store.available_capacity(schedule_id), Some(1));
        assert!(!store.reserve_capacity(schedule_id, 2).await.unwrap());

        store.release_capacity(schedule_id, 3).await.unwrap();
        assert_eq!(store.available_capacity(schedule_id), Some(4));
    }
}
