pub mod error;
pub mod identity;
pub mod notify;
pub mod payment;

pub use error::{BookingFlowError, CreditFault, ResourceFault};

/// Boxed error type used across repository and adapter traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
