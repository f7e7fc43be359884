use chrono::{Duration, Utc};
use odi_catalog::repository::ScheduleRepository;
use odi_catalog::schedule::SeatMode;
use odi_core::{BookingFlowError, ResourceFault};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    NoneSelected,
    Partial,
    Complete,
}

/// One wizard session's view of seat selection. Holds are optimistic UI
/// state; the authoritative transition happens in `commit`, seat by seat,
/// as atomic conditional updates at the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatSession {
    pub session_id: Uuid,
    pub schedule_id: Uuid,
    pub mode: SeatMode,
    /// How many seats this booking needs, i.e. the passenger count.
    pub required: u32,
    /// Selected seat numbers in the order the rider picked them.
    pub selected: Vec<String>,
    /// Hold TTL in seconds, remembered from the last `toggle_seat` so a
    /// commit rollback can restore holds with the same lifetime.
    #[serde(default = "default_hold_seconds")]
    hold_seconds: i64,
}

fn default_hold_seconds() -> i64 {
    600
}

impl SeatSession {
    pub fn new(session_id: Uuid, schedule_id: Uuid, mode: SeatMode, required: u32) -> Self {
        Self {
            session_id,
            schedule_id,
            mode,
            required,
            selected: Vec::new(),
            hold_seconds: default_hold_seconds(),
        }
    }

    pub fn selection_state(&self) -> SelectionState {
        if self.mode == SeatMode::Capacity {
            // Capacity schedules have nothing to pick.
            return SelectionState::Complete;
        }
        match self.selected.len() as u32 {
            0 => SelectionState::NoneSelected,
            n if n >= self.required => SelectionState::Complete,
            _ => SelectionState::Partial,
        }
    }

    /// Select or deselect a seat. Selecting places a TTL'd hold at the
    /// repository; deselecting drops it.
    pub async fn toggle_seat(
        &mut self,
        repo: &dyn ScheduleRepository,
        seat: &str,
        hold_ttl: Duration,
    ) -> Result<(), BookingFlowError> {
        if self.mode == SeatMode::Capacity {
            return Err(BookingFlowError::Validation(
                "schedule does not use seat selection".to_string(),
            ));
        }

        if let Some(pos) = self.selected.iter().position(|s| s == seat) {
            repo.release_hold(self.schedule_id, seat, self.session_id)
                .await
                .map_err(BookingFlowError::storage)?;
            self.selected.remove(pos);
            return Ok(());
        }

        if self.selected.len() as u32 >= self.required {
            return Err(ResourceFault::SeatLimitExceeded {
                limit: self.required,
            }
            .into());
        }

        self.hold_seconds = hold_ttl.num_seconds();
        let held = repo
            .hold_seat(
                self.schedule_id,
                seat,
                self.session_id,
                Utc::now() + hold_ttl,
            )
            .await
            .map_err(BookingFlowError::storage)?;
        if !held {
            return Err(ResourceFault::SeatUnavailable {
                seat: seat.to_string(),
            }
            .into());
        }
        self.selected.push(seat.to_string());
        Ok(())
    }

    /// Authoritative commit. Seat-map mode occupies every selected seat;
    /// if any seat was taken by a concurrent booking the ones already
    /// occupied here are rolled back and the conflict is reported with the
    /// losing seats, which stay selected locally so the rider can swap
    /// them out. Capacity mode decrements the counter with a floor check.
    pub async fn commit(
        &mut self,
        repo: &dyn ScheduleRepository,
    ) -> Result<Vec<String>, BookingFlowError> {
        match self.mode {
            SeatMode::Capacity => {
                let reserved = repo
                    .reserve_capacity(self.schedule_id, self.required)
                    .await
                    .map_err(BookingFlowError::storage)?;
                if !reserved {
                    return Err(ResourceFault::CapacityExceeded {
                        requested: self.required,
                    }
                    .into());
                }
                Ok(Vec::new())
            }
            SeatMode::Seatmap => {
                if (self.selected.len() as u32) < self.required {
                    return Err(BookingFlowError::Validation(format!(
                        "selected {} of {} required seats",
                        self.selected.len(),
                        self.required
                    )));
                }

                let mut occupied: Vec<String> = Vec::new();
                let mut conflicts: Vec<String> = Vec::new();
                for seat in &self.selected {
                    let won = repo
                        .occupy_seat(self.schedule_id, seat, self.session_id)
                        .await
                        .map_err(BookingFlowError::storage)?;
                    if won {
                        occupied.push(seat.clone());
                    } else {
                        conflicts.push(seat.clone());
                    }
                }

                if conflicts.is_empty() {
                    return Ok(occupied);
                }

                // Roll the won seats back to SELECTED, not AVAILABLE: the
                // rider keeps them while swapping out the conflicted ones.
                let expires_at = Utc::now() + Duration::seconds(self.hold_seconds);
                for seat in &occupied {
                    repo.release_seat(self.schedule_id, seat)
                        .await
                        .map_err(BookingFlowError::storage)?;
                    repo.hold_seat(self.schedule_id, seat, self.session_id, expires_at)
                        .await
                        .map_err(BookingFlowError::storage)?;
                }
                tracing::warn!(
                    schedule_id = %self.schedule_id,
                    conflicts = ?conflicts,
                    "seat commit lost to a concurrent booking"
                );
                Err(ResourceFault::SeatConflict { seats: conflicts }.into())
            }
        }
    }

    /// Drop all holds, e.g. on back-navigation out of seat selection or
    /// wizard abandonment.
    pub async fn release_all(
        &mut self,
        repo: &dyn ScheduleRepository,
    ) -> Result<(), BookingFlowError> {
        if self.mode == SeatMode::Seatmap {
            for seat in &self.selected {
                repo.release_hold(self.schedule_id, seat, self.session_id)
                    .await
                    .map_err(BookingFlowError::storage)?;
            }
        }
        self.selected.clear();
        Ok(())
    }
}
