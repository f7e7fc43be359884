pub mod app_config;
pub mod booking_repo;
pub mod credit_repo;
pub mod database;
pub mod schedule_repo;

pub use booking_repo::PgBookingRepository;
pub use credit_repo::PgCreditRepository;
pub use database::DbClient;
pub use schedule_repo::PgScheduleRepository;
