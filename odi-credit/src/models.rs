use chrono::{DateTime, Utc};
use odi_shared::Laari;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Requested,
    Approved,
    Rejected,
    Blocked,
}

/// A credit line between a travel agent and a boat owner.
/// `current_balance` is the available credit remaining, not outstanding
/// debt; `credit_limit - current_balance` is what the agent owes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOwnerConnection {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub owner_id: Uuid,
    pub currency: String,
    pub credit_limit: Laari,
    pub current_balance: Laari,
    /// Bumped on every balance mutation; commit-time staleness check.
    pub balance_version: u64,
    pub status: ConnectionStatus,
    pub active: bool,
    /// Limit the agent asked for when requesting the connection.
    pub requested_limit: Laari,
    pub request_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentOwnerConnection {
    pub fn new_request(
        agent_id: Uuid,
        owner_id: Uuid,
        requested_limit: Laari,
        message: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            agent_id,
            owner_id,
            currency: odi_shared::DEFAULT_CURRENCY.to_string(),
            credit_limit: 0,
            current_balance: 0,
            balance_version: 0,
            status: ConnectionStatus::Requested,
            active: true,
            requested_limit,
            request_message: message,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_spend(&self) -> bool {
        self.status == ConnectionStatus::Approved && self.active
    }

    /// Amount currently owed to the owner.
    pub fn outstanding(&self) -> Laari {
        self.credit_limit - self.current_balance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Credit,
    Debit,
}

/// One row of the append-only credit trail. Every balance mutation writes
/// exactly one of these; `balance_after` is the connection's balance at
/// commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Laari,
    pub balance_after: Laari,
    /// Booking id or adjustment reason.
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Signed contribution to the balance: credits add, debits subtract.
    pub fn signed_amount(&self) -> Laari {
        match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit => -self.amount,
        }
    }
}

/// A reserved-but-not-yet-debited hold against available credit,
/// analogous to a card pre-authorization. Valid until committed,
/// released, or expired by the TTL sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAuthorization {
    pub token: Uuid,
    pub connection_id: Uuid,
    pub amount: Laari,
    /// Connection balance version captured at authorization time.
    pub balance_version: u64,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outstanding_is_limit_minus_available() {
        let mut conn = AgentOwnerConnection::new_request(Uuid::new_v4(), Uuid::new_v4(), 500_000, None);
        conn.credit_limit = 500_000;
        conn.current_balance = 480_000;
        assert_eq!(conn.outstanding(), 20_000);
    }

    #[test]
    fn test_signed_amount() {
        let txn = CreditTransaction {
            id: Uuid::new_v4(),
            connection_id: Uuid::new_v4(),
            kind: TransactionKind::Debit,
            amount: 30_000,
            balance_after: 470_000,
            reference: "booking:ABC123".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(txn.signed_amount(), -30_000);
    }
}
