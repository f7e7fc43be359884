pub mod memory;
pub mod models;
pub mod repository;
pub mod seats;
pub mod service;
pub mod tickets;
pub mod wizard;

pub use models::{
    Booking, BookingStatus, Buyer, Channel, Passenger, PaymentMethod, Ticket,
};
pub use repository::BookingRepository;
pub use seats::{SeatSession, SelectionState};
pub use service::{BookingCreationService, BookingRequest, BookingResponse};
pub use tickets::TicketIssuer;
pub use wizard::{BookingWizard, WizardStep};
