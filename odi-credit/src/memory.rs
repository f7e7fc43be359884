use async_trait::async_trait;
use chrono::Utc;
use odi_core::BoxError;
use odi_shared::Laari;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{AgentOwnerConnection, ConnectionStatus, CreditTransaction, TransactionKind};
use crate::repository::{CreditRepository, DebitOutcome};

#[derive(Default)]
struct Inner {
    connections: HashMap<Uuid, AgentOwnerConnection>,
    transactions: Vec<CreditTransaction>,
}

/// In-memory credit store; conditional debits run under one mutex, the
/// same guarantee the Postgres store gets from a conditional UPDATE.
pub struct MemoryCreditStore {
    inner: Mutex<Inner>,
}

impl MemoryCreditStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryCreditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CreditRepository for MemoryCreditStore {
    async fn create_connection(&self, connection: &AgentOwnerConnection) -> Result<(), BoxError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connections.insert(connection.id, connection.clone());
        Ok(())
    }

    async fn get_connection(&self, id: Uuid) -> Result<Option<AgentOwnerConnection>, BoxError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.connections.get(&id).cloned())
    }

    async fn find_by_agent_owner(
        &self,
        agent_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<AgentOwnerConnection>, BoxError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .connections
            .values()
            .find(|c| c.agent_id == agent_id && c.owner_id == owner_id)
            .cloned())
    }

    async fn list_for_agent(&self, agent_id: Uuid) -> Result<Vec<AgentOwnerConnection>, BoxError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .connections
            .values()
            .filter(|c| c.agent_id == agent_id)
            .cloned()
            .collect())
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<AgentOwnerConnection>, BoxError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .connections
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ConnectionStatus,
        credit_limit: Option<Laari>,
    ) -> Result<(), BoxError> {
        let mut inner = self.inner.lock().unwrap();
        let connection = inner
            .connections
            .get_mut(&id)
            .ok_or_else(|| format!("connection {} not found", id))?;
        connection.status = status;
        if let Some(limit) = credit_limit {
            connection.credit_limit = limit;
        }
        connection.updated_at = Utc::now();
        Ok(())
    }

    async fn debit(
        &self,
        id: Uuid,
        amount: Laari,
        expected_version: u64,
        reference: &str,
    ) -> Result<DebitOutcome, BoxError> {
        let mut inner = self.inner.lock().unwrap();
        let connection = inner
            .connections
            .get_mut(&id)
            .ok_or_else(|| format!("connection {} not found", id))?;

        if connection.balance_version != expected_version {
            return Ok(DebitOutcome::VersionConflict);
        }
        if connection.current_balance < amount {
            return Ok(DebitOutcome::InsufficientFunds {
                available: connection.current_balance,
            });
        }

        connection.current_balance -= amount;
        connection.balance_version += 1;
        connection.updated_at = Utc::now();

        let transaction = CreditTransaction {
            id: Uuid::new_v4(),
            connection_id: id,
            kind: TransactionKind::Debit,
            amount,
            balance_after: connection.current_balance,
            reference: reference.to_string(),
            created_at: Utc::now(),
        };
        inner.transactions.push(transaction.clone());
        Ok(DebitOutcome::Applied(transaction))
    }

    async fn credit(
        &self,
        id: Uuid,
        amount: Laari,
        reference: &str,
    ) -> Result<CreditTransaction, BoxError> {
        let mut inner = self.inner.lock().unwrap();
        let connection = inner
            .connections
            .get_mut(&id)
            .ok_or_else(|| format!("connection {} not found", id))?;

        connection.current_balance += amount;
        connection.balance_version += 1;
        connection.updated_at = Utc::now();

        let transaction = CreditTransaction {
            id: Uuid::new_v4(),
            connection_id: id,
            kind: TransactionKind::Credit,
            amount,
            balance_after: connection.current_balance,
            reference: reference.to_string(),
            created_at: Utc::now(),
        };
        inner.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn history(
        &self,
        connection_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<CreditTransaction>, BoxError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<CreditTransaction> = inner
            .transactions
            .iter()
            .filter(|t| t.connection_id == connection_id)
            .cloned()
            .collect();
        rows.reverse();
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}
