use chrono::Utc;
use odi_catalog::repository::ScheduleRepository;
use odi_catalog::schedule::SeatMode;
use odi_core::payment::{GatewayStatus, PaymentGateway};
use odi_core::BookingFlowError;
use odi_credit::CreditLedger;
use odi_shared::events::BookingEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, PaymentMethod, Ticket};
use crate::repository::BookingRepository;
use crate::tickets::TicketIssuer;
use crate::wizard::{BookingWizard, WizardStep};

const CODE_RETRIES: usize = 5;

/// Everything the caller gets back from booking creation. `payment_url`
/// is set for CARD bookings that still need the rider to pay.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BookingResponse {
    pub booking: Booking,
    pub tickets: Vec<Ticket>,
    pub payment_url: Option<String>,
}

/// Wire-facing creation payload; the API layer reconstructs a wizard from
/// it so the same guards run for stateless clients.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BookingRequest {
    pub selections: Vec<odi_catalog::pricing::TicketSelection>,
    pub seats: Vec<String>,
    pub passenger_names: Vec<String>,
    pub buyer: crate::models::Buyer,
    pub payment_method: PaymentMethod,
    pub connection_id: Option<Uuid>,
}

/// The booking write path. Creation is a saga across three independently
/// owned resources (seats, credit, the booking record); each step is
/// compensable and the whole thing is idempotent under an idempotency
/// key. Not a database transaction: the seat store and the credit store
/// are separate authorities.
pub struct BookingCreationService {
    schedules: Arc<dyn ScheduleRepository>,
    bookings: Arc<dyn BookingRepository>,
    ledger: Arc<CreditLedger>,
    gateway: Arc<dyn PaymentGateway>,
    events: broadcast::Sender<BookingEvent>,
}

impl BookingCreationService {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        bookings: Arc<dyn BookingRepository>,
        ledger: Arc<CreditLedger>,
        gateway: Arc<dyn PaymentGateway>,
        events: broadcast::Sender<BookingEvent>,
    ) -> Self {
        Self {
            schedules,
            bookings,
            ledger,
            gateway,
            events,
        }
    }

    fn publish(&self, event: BookingEvent) {
        // Best-effort; a full receiver queue or no receivers is fine.
        let _ = self.events.send(event);
    }

    /// Create a booking from a completed wizard. The wizard must be at
    /// the PAYMENT step with `authorize_payment` already passed.
    ///
    /// Saga order: seat commit, credit commit, persist, side effect.
    /// Failures compensate prior steps in reverse; a gateway initiation
    /// failure is NOT compensated, the booking stays PENDING and the
    /// payment can be retried under the same idempotency key.
    pub async fn create(
        &self,
        wizard: &mut BookingWizard,
        idempotency_key: Option<String>,
    ) -> Result<BookingResponse, BookingFlowError> {
        if wizard.step != WizardStep::Payment {
            return Err(BookingFlowError::Validation(
                "wizard has not reached the payment step".to_string(),
            ));
        }
        let quote = wizard
            .quote
            .clone()
            .ok_or_else(|| BookingFlowError::Validation("no priced selections".to_string()))?;
        let payment_method = wizard.payment_method.ok_or_else(|| {
            BookingFlowError::Validation("a payment method must be chosen".to_string())
        })?;

        // Step 0: idempotent replay.
        if let Some(key) = idempotency_key.as_deref() {
            if let Some(existing) = self
                .bookings
                .find_by_idempotency_key(key)
                .await
                .map_err(BookingFlowError::storage)?
            {
                tracing::info!(booking_id = %existing.id, key, "idempotent replay");
                return self.replay(existing, wizard).await;
            }
        }

        // Step 1: authoritative seat/capacity commit.
        let committed_seats = wizard.seats.commit(&*self.schedules).await?;
        let passenger_count = wizard.passengers.len() as u32;
        for (passenger, seat) in wizard.passengers.iter_mut().zip(&committed_seats) {
            passenger.seat_number = Some(seat.clone());
        }

        let draft = Booking {
            id: Uuid::new_v4(),
            code: Booking::generate_code(),
            schedule_id: wizard.schedule_id,
            channel: wizard.channel,
            status: BookingStatus::Pending,
            buyer: wizard.buyer.clone(),
            passengers: wizard.passengers.clone(),
            payment_method,
            connection_id: wizard.connection_id,
            gateway_transaction_id: None,
            subtotal: quote.subtotal,
            tax: quote.tax,
            total: quote.total,
            currency: quote.currency.clone(),
            idempotency_key,
            created_at: Utc::now(),
            confirmed_at: None,
            cancelled_at: None,
        };

        // Step 2: agent credit commit, referencing the booking id. A
        // failure here releases the seats and aborts; the authorization
        // is already consumed either way.
        let mut debited: Option<(Uuid, odi_shared::Laari)> = None;
        if payment_method == PaymentMethod::AgentCredit {
            let authorization = wizard.authorization.take().ok_or_else(|| {
                BookingFlowError::Validation(
                    "agent-credit booking without a credit authorization".to_string(),
                )
            })?;
            let connection_id = authorization.connection_id;
            let amount = authorization.amount;
            let reference = format!("Booking {}", draft.id);
            if let Err(err) = self.ledger.commit(authorization.token, &reference).await {
                self.release_seats(wizard, &committed_seats, passenger_count)
                    .await;
                return Err(err.into());
            }
            debited = Some((connection_id, amount));
        }

        // Step 3: persist the booking record, PENDING.
        let booking = match self.persist(draft).await {
            Ok(booking) => booking,
            Err((booking, err)) => {
                // LIFO compensation: credit first, then seats.
                if let Some((connection_id, amount)) = debited {
                    self.compensate_credit(connection_id, amount, booking.id).await;
                }
                self.release_seats(wizard, &committed_seats, passenger_count)
                    .await;
                return Err(err);
            }
        };

        self.publish(BookingEvent::BookingCreated {
            booking_id: booking.id,
            code: booking.code.clone(),
            schedule_id: booking.schedule_id,
            buyer_phone: booking.buyer.phone.as_str().to_string(),
            total: booking.total,
            currency: booking.currency.clone(),
            occurred_at: Utc::now(),
        });

        // Step 4: payment-method side effect.
        let response = self.dispatch_side_effect(booking).await?;
        wizard.complete();
        Ok(response)
    }

    async fn replay(
        &self,
        booking: Booking,
        wizard: &mut BookingWizard,
    ) -> Result<BookingResponse, BookingFlowError> {
        let tickets = self
            .bookings
            .tickets_for(booking.id)
            .await
            .map_err(BookingFlowError::storage)?;
        // A CARD booking whose gateway initiation failed last time gets a
        // fresh attempt on replay.
        if booking.payment_method == PaymentMethod::Card
            && booking.status == BookingStatus::Pending
            && booking.gateway_transaction_id.is_none()
        {
            let response = self.dispatch_side_effect(booking).await?;
            wizard.complete();
            return Ok(response);
        }
        wizard.complete();
        Ok(BookingResponse {
            booking,
            tickets,
            payment_url: None,
        })
    }

    /// Insert the booking, regenerating the 6-char code on a collision.
    async fn persist(&self, mut booking: Booking) -> Result<Booking, (Booking, BookingFlowError)> {
        let mut last_err: Option<String> = None;
        for attempt in 0..CODE_RETRIES {
            if attempt > 0 {
                booking.code = Booking::generate_code();
            }
            match self.bookings.create_booking(&booking).await {
                Ok(()) => return Ok(booking),
                Err(err) => last_err = Some(err.to_string()),
            }
        }
        let err = BookingFlowError::Persistence(
            last_err.unwrap_or_else(|| "booking insert failed".to_string()),
        );
        Err((booking, err))
    }

    async fn dispatch_side_effect(
        &self,
        booking: Booking,
    ) -> Result<BookingResponse, BookingFlowError> {
        match booking.payment_method {
            // Cash settles in person at departure; agent credit was
            // settled by the step-2 debit. Both confirm immediately.
            PaymentMethod::Cash | PaymentMethod::AgentCredit => {
                self.confirm(booking).await
            }
            PaymentMethod::BankTransfer => {
                // Stays PENDING until a staff member verifies the receipt.
                Ok(BookingResponse {
                    booking,
                    tickets: Vec::new(),
                    payment_url: None,
                })
            }
            PaymentMethod::Card => {
                let transaction = match self
                    .gateway
                    .create_transaction(booking.id, booking.total, &booking.currency)
                    .await
                {
                    Ok(transaction) => transaction,
                    Err(err) => {
                        tracing::warn!(
                            booking_id = %booking.id,
                            error = %err,
                            "gateway initiation failed, booking stays PENDING"
                        );
                        return Err(BookingFlowError::ExternalService(err.to_string()));
                    }
                };
                self.bookings
                    .set_gateway_transaction(booking.id, &transaction.id)
                    .await
                    .map_err(BookingFlowError::storage)?;
                let mut booking = booking;
                booking.gateway_transaction_id = Some(transaction.id);
                Ok(BookingResponse {
                    booking,
                    tickets: Vec::new(),
                    payment_url: transaction.redirect_url,
                })
            }
        }
    }

    /// PENDING to CONFIRMED plus ticket issuance. A storage failure after
    /// resources were committed is irrecoverable and cancels the booking
    /// with full compensation.
    async fn confirm(&self, mut booking: Booking) -> Result<BookingResponse, BookingFlowError> {
        if let Err(err) = self
            .bookings
            .update_status(booking.id, BookingStatus::Confirmed)
            .await
        {
            self.cancel_with_compensation(&booking, "confirmation write failed")
                .await;
            return Err(BookingFlowError::Persistence(err.to_string()));
        }
        booking.status = BookingStatus::Confirmed;
        booking.confirmed_at = Some(Utc::now());

        let tickets = TicketIssuer::issue_for(&booking);
        self.bookings
            .store_tickets(&tickets)
            .await
            .map_err(BookingFlowError::storage)?;

        self.publish(BookingEvent::BookingConfirmed {
            booking_id: booking.id,
            code: booking.code.clone(),
            buyer_phone: booking.buyer.phone.as_str().to_string(),
            occurred_at: Utc::now(),
        });
        self.publish(BookingEvent::TicketsIssued {
            booking_id: booking.id,
            buyer_phone: booking.buyer.phone.as_str().to_string(),
            ticket_codes: tickets.iter().map(|t| t.ticket_code.clone()).collect(),
            occurred_at: Utc::now(),
        });

        Ok(BookingResponse {
            booking,
            tickets,
            payment_url: None,
        })
    }

    /// CARD polling path: ask the gateway for the transaction status and
    /// apply the outcome.
    pub async fn confirm_card_payment(
        &self,
        booking_id: Uuid,
    ) -> Result<BookingResponse, BookingFlowError> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await
            .map_err(BookingFlowError::storage)?
            .ok_or_else(|| BookingFlowError::NotFound(format!("booking {}", booking_id)))?;
        let transaction_id = booking.gateway_transaction_id.clone().ok_or_else(|| {
            BookingFlowError::Validation("booking has no gateway transaction".to_string())
        })?;

        let transaction = self
            .gateway
            .get_transaction(&transaction_id)
            .await
            .map_err(|e| BookingFlowError::ExternalService(e.to_string()))?;
        self.apply_gateway_status(booking, transaction.status).await
    }

    /// Webhook path: the gateway tells us a transaction's final status.
    pub async fn handle_gateway_callback(
        &self,
        transaction_id: &str,
        status: GatewayStatus,
    ) -> Result<BookingResponse, BookingFlowError> {
        let booking = self
            .bookings
            .find_by_gateway_transaction(transaction_id)
            .await
            .map_err(BookingFlowError::storage)?
            .ok_or_else(|| {
                BookingFlowError::NotFound(format!("gateway transaction {}", transaction_id))
            })?;
        self.apply_gateway_status(booking, status).await
    }

    async fn apply_gateway_status(
        &self,
        booking: Booking,
        status: GatewayStatus,
    ) -> Result<BookingResponse, BookingFlowError> {
        if booking.status == BookingStatus::Confirmed {
            // Duplicate webhook/poll after confirmation.
            let tickets = self
                .bookings
                .tickets_for(booking.id)
                .await
                .map_err(BookingFlowError::storage)?;
            return Ok(BookingResponse {
                booking,
                tickets,
                payment_url: None,
            });
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(BookingFlowError::Validation(
                "booking was already cancelled".to_string(),
            ));
        }

        match status {
            GatewayStatus::Confirmed => self.confirm(booking).await,
            GatewayStatus::Cancelled | GatewayStatus::Failed => {
                self.cancel_with_compensation(&booking, "card payment failed")
                    .await;
                let mut cancelled = booking;
                cancelled.status = BookingStatus::Cancelled;
                cancelled.cancelled_at = Some(Utc::now());
                Ok(BookingResponse {
                    booking: cancelled,
                    tickets: Vec::new(),
                    payment_url: None,
                })
            }
            GatewayStatus::Created | GatewayStatus::Pending => Ok(BookingResponse {
                booking,
                tickets: Vec::new(),
                payment_url: None,
            }),
        }
    }

    /// Staff cancellation of a PENDING booking, e.g. a bank transfer that
    /// never arrived.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        reason: &str,
    ) -> Result<Booking, BookingFlowError> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await
            .map_err(BookingFlowError::storage)?
            .ok_or_else(|| BookingFlowError::NotFound(format!("booking {}", booking_id)))?;
        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }
        self.cancel_with_compensation(&booking, reason).await;
        let mut cancelled = booking;
        cancelled.status = BookingStatus::Cancelled;
        cancelled.cancelled_at = Some(Utc::now());
        Ok(cancelled)
    }

    /// Reverse the saga in LIFO order: cancel the record, restore credit,
    /// free the seats. Compensations are best-effort and logged, never
    /// propagated; the expiry sweep backstops anything missed.
    async fn cancel_with_compensation(&self, booking: &Booking, reason: &str) {
        if let Err(err) = self
            .bookings
            .update_status(booking.id, BookingStatus::Cancelled)
            .await
        {
            tracing::error!(booking_id = %booking.id, error = %err, "cancel write failed");
        }

        if booking.payment_method == PaymentMethod::AgentCredit {
            if let Some(connection_id) = booking.connection_id {
                let reference = format!("Reversal for booking {}", booking.code);
                if let Err(err) = self
                    .ledger
                    .credit(connection_id, booking.total, &reference)
                    .await
                {
                    tracing::error!(
                        booking_id = %booking.id,
                        error = %err,
                        "compensating credit failed"
                    );
                }
            }
        }

        let seats: Vec<String> = booking
            .passengers
            .iter()
            .filter_map(|p| p.seat_number.clone())
            .collect();
        if seats.is_empty() {
            if let Err(err) = self
                .schedules
                .release_capacity(booking.schedule_id, booking.passengers.len() as u32)
                .await
            {
                tracing::error!(booking_id = %booking.id, error = %err, "capacity release failed");
            }
        } else {
            for seat in &seats {
                if let Err(err) = self.schedules.release_seat(booking.schedule_id, seat).await {
                    tracing::error!(
                        booking_id = %booking.id,
                        seat,
                        error = %err,
                        "seat release failed"
                    );
                }
            }
        }

        self.publish(BookingEvent::BookingCancelled {
            booking_id: booking.id,
            code: booking.code.clone(),
            reason: reason.to_string(),
            occurred_at: Utc::now(),
        });
        tracing::warn!(booking_id = %booking.id, reason, "booking cancelled with compensation");
    }

    async fn release_seats(&self, wizard: &BookingWizard, seats: &[String], count: u32) {
        if wizard.seats.mode == SeatMode::Capacity {
            if let Err(err) = self
                .schedules
                .release_capacity(wizard.schedule_id, count)
                .await
            {
                tracing::error!(schedule_id = %wizard.schedule_id, error = %err, "capacity release failed");
            }
            return;
        }
        for seat in seats {
            if let Err(err) = self.schedules.release_seat(wizard.schedule_id, seat).await {
                tracing::error!(schedule_id = %wizard.schedule_id, seat, error = %err, "seat release failed");
            }
        }
    }

    async fn compensate_credit(&self, connection_id: Uuid, amount: odi_shared::Laari, booking_id: Uuid) {
        let reference = format!("Reversal for failed booking {}", booking_id);
        if let Err(err) = self.ledger.credit(connection_id, amount, &reference).await {
            tracing::error!(connection_id = %connection_id, error = %err, "compensating credit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Buyer, Channel};
    use crate::wizard::BookingWizard;
    use chrono::Duration;
    use odi_catalog::memory::MemoryCatalog;
    use odi_catalog::pricing::TicketSelection;
    use odi_catalog::schedule::{
        PricedTicketType, Schedule, ScheduleStatus, SeatMode, TicketType,
    };
    use odi_catalog::seatmap::SeatStatus;
    use odi_core::payment::MockGateway;
    use odi_core::BoxError;
    use odi_credit::memory::MemoryCreditStore;
    use odi_credit::models::{AgentOwnerConnection, ConnectionStatus, TransactionKind};
    use odi_credit::CreditRepository;
    use odi_shared::pii::Phone;
    use crate::memory::MemoryBookingStore;

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        bookings: Arc<MemoryBookingStore>,
        credit: Arc<MemoryCreditStore>,
        ledger: Arc<CreditLedger>,
        schedule: Schedule,
        fare: PricedTicketType,
    }

    fn schedule(mode: SeatMode) -> Schedule {
        Schedule {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Male - Maafushi 0900".to_string(),
            boat_name: "Odi Express".to_string(),
            travel_date: chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            seat_mode: mode,
            total_seats: 4,
            available_seats: 4,
            status: ScheduleStatus::Published,
            currency: "MVR".to_string(),
            tax_profile: None,
            segments: vec![],
            created_at: Utc::now(),
        }
    }

    fn fixture(mode: SeatMode) -> Fixture {
        let catalog = Arc::new(MemoryCatalog::new());
        let schedule = schedule(mode);
        let fare = PricedTicketType {
            ticket_type: TicketType {
                id: Uuid::new_v4(),
                owner_id: schedule.owner_id,
                name: "Adult".to_string(),
                code: "ADT".to_string(),
                base_price: 5_000,
                currency: "MVR".to_string(),
                refundable: true,
            },
            surcharge: 0,
            discount: 0,
            active: true,
        };
        catalog.insert_schedule(schedule.clone(), vec![fare.clone()]);
        if mode == SeatMode::Seatmap {
            catalog.insert_seats(schedule.id, &["A1", "A2", "B1", "B2"]);
        }
        let credit = Arc::new(MemoryCreditStore::new());
        let ledger = Arc::new(CreditLedger::new(credit.clone(), Duration::minutes(5)));
        Fixture {
            catalog,
            bookings: Arc::new(MemoryBookingStore::new()),
            credit,
            ledger,
            schedule,
            fare,
        }
    }

    fn service_with_gateway(fixture: &Fixture, gateway: MockGateway) -> BookingCreationService {
        let (events, _) = broadcast::channel(16);
        BookingCreationService::new(
            fixture.catalog.clone(),
            fixture.bookings.clone(),
            fixture.ledger.clone(),
            Arc::new(gateway),
            events,
        )
    }

    fn service(fixture: &Fixture) -> BookingCreationService {
        service_with_gateway(fixture, MockGateway::new())
    }

    async fn wizard_at_payment(
        fixture: &Fixture,
        method: PaymentMethod,
        passengers: &[&str],
        seats: &[&str],
    ) -> BookingWizard {
        let mut wizard = BookingWizard::new(&fixture.schedule, Channel::Public);
        wizard
            .set_selections(
                vec![TicketSelection {
                    ticket_type_id: fixture.fare.ticket_type.id,
                    quantity: passengers.len() as i64,
                }],
                &fixture.schedule,
                std::slice::from_ref(&fixture.fare),
            )
            .unwrap();
        for (passenger, name) in wizard.passengers.iter_mut().zip(passengers) {
            passenger.name = name.to_string();
        }
        wizard.advance().unwrap();
        if fixture.schedule.seat_mode == SeatMode::Seatmap {
            for seat in seats {
                wizard
                    .seats
                    .toggle_seat(&*fixture.catalog, seat, Duration::minutes(5))
                    .await
                    .unwrap();
            }
            wizard.advance().unwrap();
        }
        wizard.advance().unwrap();
        wizard.buyer = Buyer {
            name: "Aminath".to_string(),
            phone: Phone::from("7779999"),
        };
        wizard.payment_method = Some(method);
        wizard
    }

    async fn approved_connection(fixture: &Fixture, balance: odi_shared::Laari) -> Uuid {
        let mut connection = AgentOwnerConnection::new_request(
            Uuid::new_v4(),
            fixture.schedule.owner_id,
            balance,
            None,
        );
        connection.status = ConnectionStatus::Approved;
        connection.credit_limit = balance;
        connection.current_balance = balance;
        fixture.credit.create_connection(&connection).await.unwrap();
        connection.id
    }

    #[tokio::test]
    async fn cash_booking_confirms_and_issues_tickets() {
        let fixture = fixture(SeatMode::Seatmap);
        let service = service(&fixture);
        let mut wizard =
            wizard_at_payment(&fixture, PaymentMethod::Cash, &["Aminath", "Hassan"], &["A1", "A2"])
                .await;

        let response = service.create(&mut wizard, None).await.unwrap();
        assert_eq!(response.booking.status, BookingStatus::Confirmed);
        assert_eq!(response.booking.total, 10_000);
        assert_eq!(response.tickets.len(), 2);
        assert_eq!(
            response.booking.passengers[0].seat_number.as_deref(),
            Some("A1")
        );
        assert_eq!(wizard.step, WizardStep::Confirmation);
        assert_eq!(
            fixture.catalog.seat_status(fixture.schedule.id, "A1"),
            Some(SeatStatus::Occupied)
        );
    }

    #[tokio::test]
    async fn agent_credit_booking_debits_and_confirms() {
        let fixture = fixture(SeatMode::Capacity);
        let service = service(&fixture);
        let connection_id = approved_connection(&fixture, 50_000).await;

        let mut wizard =
            wizard_at_payment(&fixture, PaymentMethod::AgentCredit, &["Ibrahim"], &[]).await;
        wizard.channel = Channel::Agent;
        wizard.connection_id = Some(connection_id);
        wizard.authorize_payment(&fixture.ledger).await.unwrap();

        let response = service.create(&mut wizard, None).await.unwrap();
        assert_eq!(response.booking.status, BookingStatus::Confirmed);

        let connection = fixture
            .credit
            .get_connection(connection_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(connection.current_balance, 45_000);
        let history = fixture.credit.history(connection_id, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Debit);
        assert_eq!(
            history[0].reference,
            format!("Booking {}", response.booking.id)
        );
    }

    #[tokio::test]
    async fn same_idempotency_key_yields_one_booking() {
        let fixture = fixture(SeatMode::Capacity);
        let service = service(&fixture);
        let mut wizard =
            wizard_at_payment(&fixture, PaymentMethod::Cash, &["Aminath"], &[]).await;

        let first = service
            .create(&mut wizard, Some("key-1".to_string()))
            .await
            .unwrap();
        let mut retry = wizard_at_payment(&fixture, PaymentMethod::Cash, &["Aminath"], &[]).await;
        let second = service
            .create(&mut retry, Some("key-1".to_string()))
            .await
            .unwrap();

        assert_eq!(first.booking.id, second.booking.id);
        // Capacity was decremented once, not twice.
        assert_eq!(
            fixture.catalog.available_capacity(fixture.schedule.id),
            Some(3)
        );
    }

    #[tokio::test]
    async fn bank_transfer_stays_pending() {
        let fixture = fixture(SeatMode::Capacity);
        let service = service(&fixture);
        let mut wizard =
            wizard_at_payment(&fixture, PaymentMethod::BankTransfer, &["Hawwa"], &[]).await;

        let response = service.create(&mut wizard, None).await.unwrap();
        assert_eq!(response.booking.status, BookingStatus::Pending);
        assert!(response.tickets.is_empty());
    }

    #[tokio::test]
    async fn card_booking_confirms_via_gateway_callback() {
        let fixture = fixture(SeatMode::Capacity);
        let service = service(&fixture);
        let mut wizard = wizard_at_payment(&fixture, PaymentMethod::Card, &["Hawwa"], &[]).await;

        let response = service.create(&mut wizard, None).await.unwrap();
        assert_eq!(response.booking.status, BookingStatus::Pending);
        let transaction_id = response.booking.gateway_transaction_id.clone().unwrap();

        let confirmed = service
            .handle_gateway_callback(&transaction_id, GatewayStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.booking.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.tickets.len(), 1);

        // A duplicate webhook replays the confirmed outcome.
        let replay = service
            .handle_gateway_callback(&transaction_id, GatewayStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(replay.tickets.len(), 1);
    }

    #[tokio::test]
    async fn failed_card_payment_cancels_and_frees_capacity() {
        let fixture = fixture(SeatMode::Capacity);
        let service = service(&fixture);
        let mut wizard = wizard_at_payment(&fixture, PaymentMethod::Card, &["Hawwa"], &[]).await;

        let response = service.create(&mut wizard, None).await.unwrap();
        assert_eq!(
            fixture.catalog.available_capacity(fixture.schedule.id),
            Some(3)
        );
        let transaction_id = response.booking.gateway_transaction_id.clone().unwrap();

        let cancelled = service
            .handle_gateway_callback(&transaction_id, GatewayStatus::Failed)
            .await
            .unwrap();
        assert_eq!(cancelled.booking.status, BookingStatus::Cancelled);
        assert_eq!(
            fixture.catalog.available_capacity(fixture.schedule.id),
            Some(4)
        );
    }

    #[tokio::test]
    async fn gateway_outage_leaves_booking_pending_and_retryable() {
        let fixture = fixture(SeatMode::Capacity);
        let service = service_with_gateway(&fixture, MockGateway::failing("gateway down"));
        let mut wizard = wizard_at_payment(&fixture, PaymentMethod::Card, &["Hawwa"], &[]).await;

        let err = service
            .create(&mut wizard, Some("key-9".to_string()))
            .await
            .unwrap_err();
        assert!(err.payment_retryable());

        // The booking exists, PENDING, with its capacity still committed.
        let booking = fixture
            .bookings
            .find_by_idempotency_key("key-9")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.gateway_transaction_id.is_none());
        assert_eq!(
            fixture.catalog.available_capacity(fixture.schedule.id),
            Some(3)
        );

        // Retrying under the same key re-initiates the gateway leg only.
        let working = service_with_gateway(&fixture, MockGateway::new());
        let mut retry = wizard_at_payment(&fixture, PaymentMethod::Card, &["Hawwa"], &[]).await;
        let response = working
            .create(&mut retry, Some("key-9".to_string()))
            .await
            .unwrap();
        assert_eq!(response.booking.id, booking.id);
        assert!(response.booking.gateway_transaction_id.is_some());
        assert_eq!(
            fixture.catalog.available_capacity(fixture.schedule.id),
            Some(3)
        );
    }

    /// Booking store that refuses every insert, for the compensation path.
    struct RefusingStore;

    #[async_trait::async_trait]
    impl BookingRepository for RefusingStore {
        async fn create_booking(&self, _booking: &Booking) -> Result<(), BoxError> {
            Err("disk full".into())
        }
        async fn get_booking(&self, _id: Uuid) -> Result<Option<Booking>, BoxError> {
            Ok(None)
        }
        async fn find_by_code(&self, _code: &str) -> Result<Option<Booking>, BoxError> {
            Ok(None)
        }
        async fn find_by_idempotency_key(&self, _key: &str) -> Result<Option<Booking>, BoxError> {
            Ok(None)
        }
        async fn update_status(&self, _id: Uuid, _status: BookingStatus) -> Result<(), BoxError> {
            Ok(())
        }
        async fn set_gateway_transaction(
            &self,
            _id: Uuid,
            _transaction_id: &str,
        ) -> Result<(), BoxError> {
            Ok(())
        }
        async fn find_by_gateway_transaction(
            &self,
            _transaction_id: &str,
        ) -> Result<Option<Booking>, BoxError> {
            Ok(None)
        }
        async fn store_tickets(&self, _tickets: &[Ticket]) -> Result<(), BoxError> {
            Ok(())
        }
        async fn tickets_for(&self, _booking_id: Uuid) -> Result<Vec<Ticket>, BoxError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn persistence_failure_reverses_seats_and_credit() {
        let fixture = fixture(SeatMode::Seatmap);
        let connection_id = approved_connection(&fixture, 50_000).await;
        let (events, _) = broadcast::channel(16);
        let service = BookingCreationService::new(
            fixture.catalog.clone(),
            Arc::new(RefusingStore),
            fixture.ledger.clone(),
            Arc::new(MockGateway::new()),
            events,
        );

        let mut wizard =
            wizard_at_payment(&fixture, PaymentMethod::AgentCredit, &["Ibrahim"], &["A1"]).await;
        wizard.channel = Channel::Agent;
        wizard.connection_id = Some(connection_id);
        wizard.authorize_payment(&fixture.ledger).await.unwrap();

        let err = service.create(&mut wizard, None).await.unwrap_err();
        assert!(matches!(err, BookingFlowError::Persistence(_)));

        // Seat back to AVAILABLE.
        assert_eq!(
            fixture.catalog.seat_status(fixture.schedule.id, "A1"),
            Some(SeatStatus::Available)
        );
        // Debit reversed by a compensating CREDIT naming the booking.
        let connection = fixture
            .credit
            .get_connection(connection_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(connection.current_balance, 50_000);
        let history = fixture.credit.history(connection_id, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TransactionKind::Credit);
        assert!(history[0].reference.starts_with("Reversal for failed booking"));
    }
}
