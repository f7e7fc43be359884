use chrono::Duration;
use odi_catalog::pricing::{PricingCalculator, Quote, TicketSelection};
use odi_catalog::repository::ScheduleRepository;
use odi_catalog::schedule::{Schedule, SeatMode};
use odi_core::BookingFlowError;
use odi_credit::{CreditAuthorization, CreditLedger};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Buyer, Channel, Passenger, PaymentMethod};
use crate::seats::{SeatSession, SelectionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WizardStep {
    Trip,
    Seats,
    Passengers,
    Payment,
    Confirmation,
}

/// Per-session wizard state. Serializable so a server-side session store
/// can persist it between requests; every method that touches shared
/// state takes the repository or ledger as an argument instead of
/// holding one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingWizard {
    pub session_id: Uuid,
    pub schedule_id: Uuid,
    pub channel: Channel,
    pub step: WizardStep,
    pub selections: Vec<TicketSelection>,
    pub quote: Option<Quote>,
    pub seats: SeatSession,
    pub passengers: Vec<Passenger>,
    pub buyer: Buyer,
    pub payment_method: Option<PaymentMethod>,
    /// Agent bookings only: the credit connection to settle against.
    pub connection_id: Option<Uuid>,
    pub authorization: Option<CreditAuthorization>,
}

impl BookingWizard {
    pub fn new(schedule: &Schedule, channel: Channel) -> Self {
        let session_id = Uuid::new_v4();
        Self {
            session_id,
            schedule_id: schedule.id,
            channel,
            step: WizardStep::Trip,
            selections: Vec::new(),
            quote: None,
            seats: SeatSession::new(session_id, schedule.id, schedule.seat_mode, 0),
            passengers: Vec::new(),
            buyer: Buyer {
                name: String::new(),
                phone: odi_shared::pii::Phone::from(""),
            },
            payment_method: None,
            connection_id: None,
            authorization: None,
        }
    }

    /// Set ticket selections at the TRIP step, repricing and regenerating
    /// the passenger list. Names already typed in are kept positionally.
    pub fn set_selections(
        &mut self,
        selections: Vec<TicketSelection>,
        schedule: &Schedule,
        catalog: &[odi_catalog::schedule::PricedTicketType],
    ) -> Result<(), BookingFlowError> {
        if self.step != WizardStep::Trip {
            return Err(BookingFlowError::Validation(
                "ticket selections can only change at the trip step".to_string(),
            ));
        }

        let quote = PricingCalculator::quote(
            &selections,
            catalog,
            schedule.tax_profile.as_ref(),
            &schedule.currency,
        )
        .map_err(|e| BookingFlowError::Validation(e.to_string()))?;

        let previous_names: Vec<String> =
            self.passengers.iter().map(|p| p.name.clone()).collect();
        let mut passengers = Vec::new();
        for selection in &selections {
            for _ in 0..selection.quantity {
                let name = previous_names
                    .get(passengers.len())
                    .cloned()
                    .unwrap_or_default();
                passengers.push(Passenger::new(name, selection.ticket_type_id));
            }
        }

        self.seats.required = passengers.len() as u32;
        self.selections = selections;
        self.quote = Some(quote);
        self.passengers = passengers;
        Ok(())
    }

    pub fn total(&self) -> odi_shared::Laari {
        self.quote.as_ref().map(|q| q.total).unwrap_or(0)
    }

    /// Advance one step, enforcing the exit guard of the current step.
    /// Seat selection is skipped entirely for capacity-mode schedules.
    pub fn advance(&mut self) -> Result<WizardStep, BookingFlowError> {
        let next = match self.step {
            WizardStep::Trip => {
                if self.passengers.is_empty() {
                    return Err(BookingFlowError::Validation(
                        "at least one passenger is required".to_string(),
                    ));
                }
                if self.seats.mode == SeatMode::Capacity {
                    WizardStep::Passengers
                } else {
                    WizardStep::Seats
                }
            }
            WizardStep::Seats => {
                if self.seats.selection_state() != SelectionState::Complete {
                    return Err(BookingFlowError::Validation(format!(
                        "selected {} of {} required seats",
                        self.seats.selected.len(),
                        self.seats.required
                    )));
                }
                WizardStep::Passengers
            }
            WizardStep::Passengers => {
                if self.passengers.iter().any(|p| p.name.trim().is_empty()) {
                    return Err(BookingFlowError::Validation(
                        "every passenger needs a name".to_string(),
                    ));
                }
                WizardStep::Payment
            }
            WizardStep::Payment | WizardStep::Confirmation => {
                return Err(BookingFlowError::Validation(
                    "no further step to advance to".to_string(),
                ));
            }
        };
        self.step = next;
        Ok(next)
    }

    /// Step backwards without discarding entered data. Leaving SEATS
    /// backwards releases uncommitted holds.
    pub async fn back(
        &mut self,
        repo: &dyn ScheduleRepository,
    ) -> Result<WizardStep, BookingFlowError> {
        let previous = match self.step {
            WizardStep::Trip => {
                return Err(BookingFlowError::Validation(
                    "already at the first step".to_string(),
                ));
            }
            WizardStep::Seats => {
                self.seats.release_all(repo).await?;
                WizardStep::Trip
            }
            WizardStep::Passengers => {
                if self.seats.mode == SeatMode::Capacity {
                    WizardStep::Trip
                } else {
                    WizardStep::Seats
                }
            }
            WizardStep::Payment => WizardStep::Passengers,
            WizardStep::Confirmation => {
                return Err(BookingFlowError::Validation(
                    "booking already created".to_string(),
                ));
            }
        };
        self.step = previous;
        Ok(previous)
    }

    /// PAYMENT exit guard. Validates buyer details and, for agent-credit
    /// settlement, obtains the authorization before the wizard may hand
    /// off to booking creation. Credit failures surface here, before any
    /// seat or credit commit is attempted.
    pub async fn authorize_payment(
        &mut self,
        ledger: &CreditLedger,
    ) -> Result<(), BookingFlowError> {
        if self.step != WizardStep::Payment {
            return Err(BookingFlowError::Validation(
                "not at the payment step".to_string(),
            ));
        }
        if self.buyer.name.trim().is_empty() || self.buyer.phone.is_empty() {
            return Err(BookingFlowError::Validation(
                "buyer name and phone are required".to_string(),
            ));
        }
        let method = self.payment_method.ok_or_else(|| {
            BookingFlowError::Validation("a payment method must be chosen".to_string())
        })?;

        if method == PaymentMethod::AgentCredit {
            let connection_id = self.connection_id.ok_or_else(|| {
                BookingFlowError::Validation(
                    "agent-credit bookings need a credit connection".to_string(),
                )
            })?;
            let authorization = ledger
                .authorize(connection_id, self.total())
                .await
                .map_err(BookingFlowError::from)?;
            self.authorization = Some(authorization);
        }
        Ok(())
    }

    /// Booking creation succeeded; the wizard is terminal.
    pub fn complete(&mut self) {
        self.step = WizardStep::Confirmation;
    }

    /// Cleanup obligation on navigating away: drop seat holds and any
    /// standing credit authorization. Safe to call at any step.
    pub async fn abandon(
        &mut self,
        repo: &dyn ScheduleRepository,
        ledger: &CreditLedger,
    ) -> Result<(), BookingFlowError> {
        self.seats.release_all(repo).await?;
        if let Some(authorization) = self.authorization.take() {
            ledger.release(authorization.token);
        }
        Ok(())
    }
}
