pub mod memory;
pub mod pricing;
pub mod repository;
pub mod schedule;
pub mod seatmap;

pub use pricing::{LineItem, PricingCalculator, PricingError, Quote, TicketSelection};
pub use repository::ScheduleRepository;
pub use schedule::{
    PricedTicketType, Rounding, Schedule, ScheduleStatus, SeatMode, Segment, TaxLine, TaxProfile,
    TicketType,
};
pub use seatmap::{Seat, SeatMap, SeatStatus};
