use odi_core::BookingFlowError;
use odi_shared::Laari;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::{CreditError, CreditLedger};
use crate::models::{AgentOwnerConnection, ConnectionStatus};
use crate::repository::CreditRepository;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("connection between this agent and owner already exists")]
    Duplicate,

    #[error("connection {0} not found")]
    NotFound(Uuid),

    #[error("connection request has already been resolved")]
    AlreadyResolved,

    #[error("credit storage error: {0}")]
    Storage(String),
}

impl From<CreditError> for WorkflowError {
    fn from(err: CreditError) -> Self {
        match err {
            CreditError::NotFound(id) => WorkflowError::NotFound(id),
            other => WorkflowError::Storage(other.to_string()),
        }
    }
}

impl From<WorkflowError> for BookingFlowError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(msg) => BookingFlowError::Validation(msg),
            WorkflowError::Duplicate | WorkflowError::AlreadyResolved => {
                BookingFlowError::Validation(err.to_string())
            }
            WorkflowError::NotFound(id) => {
                BookingFlowError::NotFound(format!("connection {}", id))
            }
            WorkflowError::Storage(detail) => BookingFlowError::Persistence(detail),
        }
    }
}

/// Agent-to-owner connection lifecycle: the agent requests a credit line,
/// the owner approves with a limit or rejects. Approval funds the line with
/// a single opening CREDIT entry so the trail always sums to the balance.
pub struct ConnectionRequestWorkflow {
    repo: Arc<dyn CreditRepository>,
    ledger: Arc<CreditLedger>,
}

impl ConnectionRequestWorkflow {
    pub fn new(repo: Arc<dyn CreditRepository>, ledger: Arc<CreditLedger>) -> Self {
        Self { repo, ledger }
    }

    pub async fn request(
        &self,
        agent_id: Uuid,
        owner_id: Uuid,
        requested_limit: Laari,
        message: Option<String>,
    ) -> Result<AgentOwnerConnection, WorkflowError> {
        if requested_limit <= 0 {
            return Err(WorkflowError::Validation(
                "requested credit limit must be positive".to_string(),
            ));
        }
        if agent_id == owner_id {
            return Err(WorkflowError::Validation(
                "agent and owner must be different accounts".to_string(),
            ));
        }

        let existing = self
            .repo
            .find_by_agent_owner(agent_id, owner_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;
        if existing.is_some() {
            return Err(WorkflowError::Duplicate);
        }

        let connection =
            AgentOwnerConnection::new_request(agent_id, owner_id, requested_limit, message);
        self.repo
            .create_connection(&connection)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;
        tracing::info!(
            connection_id = %connection.id,
            agent_id = %agent_id,
            owner_id = %owner_id,
            requested_limit,
            "connection requested"
        );
        Ok(connection)
    }

    /// Owner decision. On approval the granted limit defaults to the
    /// requested one; the opening balance equals the limit.
    pub async fn respond(
        &self,
        connection_id: Uuid,
        approve: bool,
        credit_limit: Option<Laari>,
    ) -> Result<AgentOwnerConnection, WorkflowError> {
        let connection = self
            .repo
            .get_connection(connection_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
            .ok_or(WorkflowError::NotFound(connection_id))?;

        if connection.status != ConnectionStatus::Requested {
            return Err(WorkflowError::AlreadyResolved);
        }

        if approve {
            let limit = credit_limit.unwrap_or(connection.requested_limit);
            if limit <= 0 {
                return Err(WorkflowError::Validation(
                    "granted credit limit must be positive".to_string(),
                ));
            }
            self.repo
                .update_status(connection_id, ConnectionStatus::Approved, Some(limit))
                .await
                .map_err(|e| WorkflowError::Storage(e.to_string()))?;
            self.ledger
                .credit(connection_id, limit, "Initial credit allocation")
                .await?;
            tracing::info!(connection_id = %connection_id, limit, "connection approved");
        } else {
            self.repo
                .update_status(connection_id, ConnectionStatus::Rejected, None)
                .await
                .map_err(|e| WorkflowError::Storage(e.to_string()))?;
            tracing::info!(connection_id = %connection_id, "connection rejected");
        }

        self.repo
            .get_connection(connection_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
            .ok_or(WorkflowError::NotFound(connection_id))
    }

    pub async fn connections_for_agent(
        &self,
        agent_id: Uuid,
    ) -> Result<Vec<AgentOwnerConnection>, WorkflowError> {
        self.repo
            .list_for_agent(agent_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))
    }

    pub async fn connections_for_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<AgentOwnerConnection>, WorkflowError> {
        self.repo
            .list_for_owner(owner_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))
    }
}
