use async_trait::async_trait;
use odi_core::BoxError;
use odi_shared::Laari;
use uuid::Uuid;

use crate::models::{AgentOwnerConnection, ConnectionStatus, CreditTransaction};

/// Result of the atomic conditional debit.
#[derive(Debug, Clone)]
pub enum DebitOutcome {
    /// Balance updated and a DEBIT transaction appended.
    Applied(CreditTransaction),
    /// The connection's balance version moved since authorization; the
    /// caller must re-authorize.
    VersionConflict,
    /// Balance can no longer cover the amount.
    InsufficientFunds { available: Laari },
}

/// Durable store for credit connections and their transaction trail.
/// The balance is never mutated by read-then-write from a client: `debit`
/// is a single conditional update keyed on `expected_version`, and
/// `credit` is a single atomic increment. Both append their transaction
/// row in the same unit of work.
#[async_trait]
pub trait CreditRepository: Send + Sync {
    async fn create_connection(&self, connection: &AgentOwnerConnection) -> Result<(), BoxError>;

    async fn get_connection(&self, id: Uuid) -> Result<Option<AgentOwnerConnection>, BoxError>;

    async fn find_by_agent_owner(
        &self,
        agent_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<AgentOwnerConnection>, BoxError>;

    async fn list_for_agent(&self, agent_id: Uuid) -> Result<Vec<AgentOwnerConnection>, BoxError>;

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<AgentOwnerConnection>, BoxError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: ConnectionStatus,
        credit_limit: Option<Laari>,
    ) -> Result<(), BoxError>;

    /// Atomic conditional debit: subtract `amount` and bump the version
    /// only when the stored version equals `expected_version` and the
    /// balance covers the amount.
    async fn debit(
        &self,
        id: Uuid,
        amount: Laari,
        expected_version: u64,
        reference: &str,
    ) -> Result<DebitOutcome, BoxError>;

    /// Atomic increment; always succeeds for an existing connection.
    async fn credit(
        &self,
        id: Uuid,
        amount: Laari,
        reference: &str,
    ) -> Result<CreditTransaction, BoxError>;

    /// Transaction history, newest first.
    async fn history(
        &self,
        connection_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<CreditTransaction>, BoxError>;
}
