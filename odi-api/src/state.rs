use chrono::Duration;
use odi_booking::repository::BookingRepository;
use odi_booking::service::BookingCreationService;
use odi_catalog::repository::ScheduleRepository;
use odi_core::notify::{ConsoleNotifier, NotificationSink};
use odi_core::payment::PaymentGateway;
use odi_credit::repository::CreditRepository;
use odi_credit::{ConnectionRequestWorkflow, CreditLedger};
use odi_shared::events::BookingEvent;
use odi_store::app_config::BusinessRules;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub schedules: Arc<dyn ScheduleRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub credit: Arc<dyn CreditRepository>,
    pub ledger: Arc<CreditLedger>,
    pub booking_service: Arc<BookingCreationService>,
    pub connections: Arc<ConnectionRequestWorkflow>,
    pub notifier: Arc<dyn NotificationSink>,
    pub events: broadcast::Sender<BookingEvent>,
    pub rules: BusinessRules,
}

impl AppState {
    pub fn build(
        schedules: Arc<dyn ScheduleRepository>,
        bookings: Arc<dyn BookingRepository>,
        credit: Arc<dyn CreditRepository>,
        gateway: Arc<dyn PaymentGateway>,
        rules: BusinessRules,
    ) -> Self {
        let (events, _) = broadcast::channel(100);
        let ledger = Arc::new(CreditLedger::new(
            credit.clone(),
            Duration::seconds(rules.authorization_ttl_seconds as i64),
        ));
        let booking_service = Arc::new(BookingCreationService::new(
            schedules.clone(),
            bookings.clone(),
            ledger.clone(),
            gateway,
            events.clone(),
        ));
        let connections = Arc::new(ConnectionRequestWorkflow::new(
            credit.clone(),
            ledger.clone(),
        ));
        Self {
            schedules,
            bookings,
            credit,
            ledger,
            booking_service,
            connections,
            notifier: Arc::new(ConsoleNotifier),
            events,
            rules,
        }
    }

    /// Fully in-memory wiring, used when no database is configured and in
    /// the integration tests.
    pub fn in_memory(rules: BusinessRules) -> Self {
        Self::build(
            Arc::new(odi_catalog::memory::MemoryCatalog::new()),
            Arc::new(odi_booking::memory::MemoryBookingStore::new()),
            Arc::new(odi_credit::memory::MemoryCreditStore::new()),
            Arc::new(odi_core::payment::MockGateway::new()),
            rules,
        )
    }

    pub fn seat_hold_ttl(&self) -> Duration {
        Duration::seconds(self.rules.seat_hold_seconds as i64)
    }
}
