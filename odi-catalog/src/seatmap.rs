use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Occupied,
    /// Held by an in-flight wizard session, pending booking confirmation.
    Selected,
    /// Taken out of sale by the owner (crew seat, broken seat).
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub number: String,
    pub status: SeatStatus,
}

/// Snapshot of a schedule's seats as seen by one session at one instant.
/// Authoritative state lives in the store; this is presentation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatMap {
    pub seats: Vec<Seat>,
}

impl SeatMap {
    pub fn new(seats: Vec<Seat>) -> Self {
        Self { seats }
    }

    pub fn status_of(&self, number: &str) -> Option<SeatStatus> {
        self.seats.iter().find(|s| s.number == number).map(|s| s.status)
    }

    pub fn available_count(&self) -> usize {
        self.seats
            .iter()
            .filter(|s| s.status == SeatStatus::Available)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_counts() {
        let map = SeatMap::new(vec![
            Seat {
                number: "A1".to_string(),
                status: SeatStatus::Available,
            },
            Seat {
                number: "A2".to_string(),
                status: SeatStatus::Occupied,
            },
            Seat {
                number: "A3".to_string(),
                status: SeatStatus::Blocked,
            },
        ]);

        assert_eq!(map.status_of("A1"), Some(SeatStatus::Available));
        assert_eq!(map.status_of("A2"), Some(SeatStatus::Occupied));
        assert_eq!(map.status_of("B9"), None);
        assert_eq!(map.available_count(), 1);
    }
}
