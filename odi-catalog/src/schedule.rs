use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use odi_shared::Laari;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-boat seating policy: individually numbered seats or an
/// undifferentiated headcount against total capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatMode {
    Capacity,
    Seatmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

/// One stop on the route, in sailing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub island_name: String,
    pub sequence_order: u32,
    pub departure_time: Option<NaiveTime>,
    pub arrival_time: Option<NaiveTime>,
    pub is_pickup: bool,
    pub is_dropoff: bool,
}

/// A sailing riders can book. Immutable once referenced by a booking,
/// except for the seat/capacity counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub boat_name: String,
    pub travel_date: NaiveDate,
    pub seat_mode: SeatMode,
    pub total_seats: u32,
    pub available_seats: u32,
    pub status: ScheduleStatus,
    pub currency: String,
    pub tax_profile: Option<TaxProfile>,
    pub segments: Vec<Segment>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    pub fn is_bookable(&self) -> bool {
        self.status == ScheduleStatus::Published
    }
}

/// Ticket category defined by a boat owner, e.g. "ECO", "VIP", "Child".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketType {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub code: String,
    pub base_price: Laari,
    pub currency: String,
    pub refundable: bool,
}

/// A ticket type enabled on a specific schedule, with schedule-level price
/// modifiers applied on top of the base price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedTicketType {
    pub ticket_type: TicketType,
    pub surcharge: Laari,
    pub discount: Laari,
    pub active: bool,
}

impl PricedTicketType {
    /// Effective unit price for this schedule: base + surcharge - discount.
    pub fn effective_price(&self) -> Laari {
        self.ticket_type.base_price + self.surcharge - self.discount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rounding {
    RoundUp,
    RoundDown,
    RoundNearest,
}

/// A single tax rule: a percentage of the fare or a fixed amount per
/// booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxLine {
    pub name: String,
    #[serde(flatten)]
    pub kind: TaxKind,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaxKind {
    /// Percentage of the fare subtotal, e.g. 8.0 for 8%.
    Percent(f64),
    /// Fixed amount in laari.
    Fixed(Laari),
}

/// Owner-configured tax rules applied to a booking subtotal. Supplied by
/// configuration; a schedule without a profile is taxed at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxProfile {
    pub id: Uuid,
    pub name: String,
    pub lines: Vec<TaxLine>,
    pub rounding: Rounding,
}

impl TaxProfile {
    /// Total tax for a fare subtotal, rounded per the profile's rule.
    pub fn calculate_tax(&self, subtotal: Laari) -> Laari {
        let mut total = 0.0_f64;
        for line in &self.lines {
            if !line.active {
                continue;
            }
            total += match line.kind {
                TaxKind::Percent(rate) => subtotal as f64 * rate / 100.0,
                TaxKind::Fixed(amount) => amount as f64,
            };
        }

        match self.rounding {
            Rounding::RoundUp => total.ceil() as Laari,
            Rounding::RoundDown => total.floor() as Laari,
            Rounding::RoundNearest => total.round() as Laari,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(lines: Vec<TaxLine>, rounding: Rounding) -> TaxProfile {
        TaxProfile {
            id: Uuid::new_v4(),
            name: "Domestic VAT 8% + Green Tax".to_string(),
            lines,
            rounding,
        }
    }

    #[test]
    fn test_percent_and_fixed_lines() {
        let profile = profile(
            vec![
                TaxLine {
                    name: "GST".to_string(),
                    kind: TaxKind::Percent(8.0),
                    active: true,
                },
                TaxLine {
                    name: "Green Tax".to_string(),
                    kind: TaxKind::Fixed(600),
                    active: true,
                },
            ],
            Rounding::RoundNearest,
        );

        // 8% of 100.00 MVR = 8.00 MVR, plus 6.00 MVR fixed.
        assert_eq!(profile.calculate_tax(10_000), 1_400);
    }

    #[test]
    fn test_inactive_lines_skipped() {
        let profile = profile(
            vec![TaxLine {
                name: "GST".to_string(),
                kind: TaxKind::Percent(8.0),
                active: false,
            }],
            Rounding::RoundNearest,
        );
        assert_eq!(profile.calculate_tax(10_000), 0);
    }

    #[test]
    fn test_rounding_rules() {
        let lines = vec![TaxLine {
            name: "GST".to_string(),
            kind: TaxKind::Percent(8.0),
            active: true,
        }];

        // 8% of 1.55 MVR = 12.4 laari.
        assert_eq!(profile(lines.clone(), Rounding::RoundUp).calculate_tax(155), 13);
        assert_eq!(profile(lines.clone(), Rounding::RoundDown).calculate_tax(155), 12);
        assert_eq!(profile(lines, Rounding::RoundNearest).calculate_tax(155), 12);
    }

    #[test]
    fn test_effective_price_with_modifiers() {
        let priced = PricedTicketType {
            ticket_type: TicketType {
                id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                name: "Economy".to_string(),
                code: "ECO".to_string(),
                base_price: 5_000,
                currency: "MVR".to_string(),
                refundable: true,
            },
            surcharge: 500,
            discount: 200,
            active: true,
        };
        assert_eq!(priced.effective_price(), 5_300);
    }
}
