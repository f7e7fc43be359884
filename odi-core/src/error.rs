use odi_shared::Laari;

/// Contention failures on shared seat/capacity state. Recoverable by
/// re-entering seat selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceFault {
    #[error("Seat {seat} is not available")]
    SeatUnavailable { seat: String },

    #[error("Cannot select more than {limit} seats")]
    SeatLimitExceeded { limit: u32 },

    #[error("Seats taken by a concurrent booking: {}", seats.join(", "))]
    SeatConflict { seats: Vec<String> },

    #[error("Not enough capacity: requested {requested}")]
    CapacityExceeded { requested: u32 },
}

/// Failures on the agent credit path. Surfaced at the payment step, before
/// any seat or credit commit is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreditFault {
    #[error("Insufficient credit: requested {requested}, available {available}")]
    InsufficientCredit { requested: Laari, available: Laari },

    #[error("Credit connection is not active")]
    ConnectionInactive,

    #[error("Credit authorization expired")]
    AuthorizationExpired,

    #[error("Unknown credit authorization")]
    UnknownAuthorization,
}

impl CreditFault {
    /// Amount by which the request exceeds available credit, when known.
    pub fn shortfall(&self) -> Option<Laari> {
        match self {
            CreditFault::InsufficientCredit {
                requested,
                available,
            } => Some(requested - available),
            _ => None,
        }
    }
}

/// The booking-flow error taxonomy. Validation and conflicts are handled
/// within the current wizard step; persistence failures trigger the saga
/// compensation chain; external-service failures leave the booking PENDING
/// with payment retryable.
#[derive(Debug, thiserror::Error)]
pub enum BookingFlowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Conflict(#[from] ResourceFault),

    #[error(transparent)]
    Credit(#[from] CreditFault),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("External service failure: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookingFlowError {
    /// True when the caller may safely retry the same request (same
    /// idempotency key) without resubmitting the whole wizard.
    pub fn payment_retryable(&self) -> bool {
        matches!(self, BookingFlowError::ExternalService(_))
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        BookingFlowError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortfall() {
        let fault = CreditFault::InsufficientCredit {
            requested: 30_000,
            available: 20_000,
        };
        assert_eq!(fault.shortfall(), Some(10_000));
        assert_eq!(CreditFault::ConnectionInactive.shortfall(), None);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(BookingFlowError::ExternalService("gateway down".into()).payment_retryable());
        assert!(!BookingFlowError::Persistence("write failed".into()).payment_retryable());
    }
}
