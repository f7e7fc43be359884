use chrono::{DateTime, Duration, Utc};
use odi_core::{BookingFlowError, CreditFault};
use odi_shared::Laari;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AgentOwnerConnection, CreditAuthorization, CreditTransaction};
use crate::repository::{CreditRepository, DebitOutcome};

#[derive(Debug, Error)]
pub enum CreditError {
    #[error(transparent)]
    Fault(#[from] CreditFault),

    #[error("connection {0} not found")]
    NotFound(Uuid),

    #[error("credit storage error: {0}")]
    Storage(String),
}

impl From<CreditError> for BookingFlowError {
    fn from(err: CreditError) -> Self {
        match err {
            CreditError::Fault(fault) => BookingFlowError::Credit(fault),
            CreditError::NotFound(id) => {
                BookingFlowError::NotFound(format!("connection {}", id))
            }
            CreditError::Storage(detail) => BookingFlowError::Persistence(detail),
        }
    }
}

/// Two-phase spending against an agent's credit line. `authorize` checks the
/// balance and pins the connection's balance version; `commit` applies the
/// debit only if no other writer moved the balance in between.
pub struct CreditLedger {
    repo: Arc<dyn CreditRepository>,
    authorizations: Mutex<HashMap<Uuid, CreditAuthorization>>,
    authorization_ttl: Duration,
}

impl CreditLedger {
    pub fn new(repo: Arc<dyn CreditRepository>, authorization_ttl: Duration) -> Self {
        Self {
            repo,
            authorizations: Mutex::new(HashMap::new()),
            authorization_ttl,
        }
    }

    async fn load(&self, connection_id: Uuid) -> Result<AgentOwnerConnection, CreditError> {
        self.repo
            .get_connection(connection_id)
            .await
            .map_err(|e| CreditError::Storage(e.to_string()))?
            .ok_or(CreditError::NotFound(connection_id))
    }

    /// Reserve `amount` against the connection without moving the balance.
    pub async fn authorize(
        &self,
        connection_id: Uuid,
        amount: Laari,
    ) -> Result<CreditAuthorization, CreditError> {
        let connection = self.load(connection_id).await?;
        if !connection.can_spend() {
            return Err(CreditFault::ConnectionInactive.into());
        }
        if connection.current_balance < amount {
            return Err(CreditFault::InsufficientCredit {
                requested: amount,
                available: connection.current_balance,
            }
            .into());
        }

        let authorization = CreditAuthorization {
            token: Uuid::new_v4(),
            connection_id,
            amount,
            balance_version: connection.balance_version,
            expires_at: Utc::now() + self.authorization_ttl,
        };
        self.authorizations
            .lock()
            .unwrap()
            .insert(authorization.token, authorization.clone());
        tracing::debug!(
            token = %authorization.token,
            connection_id = %connection_id,
            amount,
            "credit authorized"
        );
        Ok(authorization)
    }

    /// Apply an authorized debit. Fails with `AuthorizationExpired` when the
    /// hold has timed out or the balance moved since `authorize`.
    pub async fn commit(
        &self,
        token: Uuid,
        reference: &str,
    ) -> Result<CreditTransaction, CreditError> {
        let authorization = self
            .authorizations
            .lock()
            .unwrap()
            .remove(&token)
            .ok_or(CreditFault::UnknownAuthorization)?;

        if authorization.expires_at <= Utc::now() {
            return Err(CreditFault::AuthorizationExpired.into());
        }

        let outcome = self
            .repo
            .debit(
                authorization.connection_id,
                authorization.amount,
                authorization.balance_version,
                reference,
            )
            .await
            .map_err(|e| CreditError::Storage(e.to_string()))?;

        match outcome {
            DebitOutcome::Applied(transaction) => {
                tracing::info!(
                    connection_id = %authorization.connection_id,
                    amount = authorization.amount,
                    balance_after = transaction.balance_after,
                    reference,
                    "credit debited"
                );
                Ok(transaction)
            }
            DebitOutcome::VersionConflict => Err(CreditFault::AuthorizationExpired.into()),
            DebitOutcome::InsufficientFunds { available } => {
                Err(CreditFault::InsufficientCredit {
                    requested: authorization.amount,
                    available,
                }
                .into())
            }
        }
    }

    /// Drop an authorization without spending it. Unknown tokens are ignored
    /// so release can run in compensation paths without a prior lookup.
    pub fn release(&self, token: Uuid) {
        if self
            .authorizations
            .lock()
            .unwrap()
            .remove(&token)
            .is_some()
        {
            tracing::debug!(%token, "credit authorization released");
        }
    }

    /// Restore balance, e.g. refunds and the initial allocation on approval.
    pub async fn credit(
        &self,
        connection_id: Uuid,
        amount: Laari,
        reference: &str,
    ) -> Result<CreditTransaction, CreditError> {
        self.load(connection_id).await?;
        let transaction = self
            .repo
            .credit(connection_id, amount, reference)
            .await
            .map_err(|e| CreditError::Storage(e.to_string()))?;
        tracing::info!(
            connection_id = %connection_id,
            amount,
            balance_after = transaction.balance_after,
            reference,
            "credit restored"
        );
        Ok(transaction)
    }

    /// Sweep authorizations past their deadline. Returns how many were dropped.
    pub fn release_expired(&self, now: DateTime<Utc>) -> usize {
        let mut auths = self.authorizations.lock().unwrap();
        let before = auths.len();
        auths.retain(|_, a| a.expires_at > now);
        let dropped = before - auths.len();
        if dropped > 0 {
            tracing::debug!(dropped, "expired credit authorizations swept");
        }
        dropped
    }

    pub async fn history(
        &self,
        connection_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<CreditTransaction>, CreditError> {
        self.repo
            .history(connection_id, limit)
            .await
            .map_err(|e| CreditError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCreditStore;
    use crate::models::{ConnectionStatus, TransactionKind};

    async fn approved_connection(store: &MemoryCreditStore, balance: Laari) -> Uuid {
        let mut connection =
            AgentOwnerConnection::new_request(Uuid::new_v4(), Uuid::new_v4(), balance, None);
        connection.status = ConnectionStatus::Approved;
        connection.credit_limit = balance;
        connection.current_balance = balance;
        store.create_connection(&connection).await.unwrap();
        connection.id
    }

    fn ledger(store: Arc<MemoryCreditStore>) -> CreditLedger {
        CreditLedger::new(store, Duration::minutes(5))
    }

    #[tokio::test]
    async fn authorize_and_commit_debits_balance() {
        let store = Arc::new(MemoryCreditStore::new());
        let id = approved_connection(&store, 500_00).await;
        let ledger = ledger(store.clone());

        let auth = ledger.authorize(id, 120_00).await.unwrap();
        let txn = ledger.commit(auth.token, "Booking TEST01").await.unwrap();

        assert_eq!(txn.kind, TransactionKind::Debit);
        assert_eq!(txn.balance_after, 380_00);
        let connection = store.get_connection(id).await.unwrap().unwrap();
        assert_eq!(connection.current_balance, 380_00);
    }

    #[tokio::test]
    async fn authorize_rejects_when_balance_too_low() {
        // Limit MVR 5000 with MVR 200 remaining cannot cover a MVR 300 booking.
        let store = Arc::new(MemoryCreditStore::new());
        let id = approved_connection(&store, 200_00).await;
        let ledger = ledger(store);

        let err = ledger.authorize(id, 300_00).await.unwrap_err();
        match err {
            CreditError::Fault(CreditFault::InsufficientCredit {
                requested,
                available,
            }) => {
                assert_eq!(requested, 300_00);
                assert_eq!(available, 200_00);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn authorize_rejects_inactive_connection() {
        let store = Arc::new(MemoryCreditStore::new());
        let connection =
            AgentOwnerConnection::new_request(Uuid::new_v4(), Uuid::new_v4(), 500_00, None);
        store.create_connection(&connection).await.unwrap();
        let ledger = ledger(store);

        let err = ledger.authorize(connection.id, 10_00).await.unwrap_err();
        assert!(matches!(
            err,
            CreditError::Fault(CreditFault::ConnectionInactive)
        ));
    }

    #[tokio::test]
    async fn commit_fails_when_balance_moved_underneath() {
        let store = Arc::new(MemoryCreditStore::new());
        let id = approved_connection(&store, 500_00).await;
        let ledger = ledger(store.clone());

        let auth = ledger.authorize(id, 400_00).await.unwrap();
        // Another writer debits first, bumping the balance version.
        store
            .debit(id, 300_00, auth.balance_version, "Booking OTHER1")
            .await
            .unwrap();

        let err = ledger.commit(auth.token, "Booking TEST02").await.unwrap_err();
        assert!(matches!(
            err,
            CreditError::Fault(CreditFault::AuthorizationExpired)
        ));
        let connection = store.get_connection(id).await.unwrap().unwrap();
        assert_eq!(connection.current_balance, 200_00);
    }

    #[tokio::test]
    async fn commit_rejects_unknown_and_expired_tokens() {
        let store = Arc::new(MemoryCreditStore::new());
        let id = approved_connection(&store, 500_00).await;
        let ledger = CreditLedger::new(store, Duration::seconds(-1));

        let err = ledger.commit(Uuid::new_v4(), "Booking NOPE").await.unwrap_err();
        assert!(matches!(
            err,
            CreditError::Fault(CreditFault::UnknownAuthorization)
        ));

        // ttl is negative, so the authorization is born expired.
        let auth = ledger.authorize(id, 10_00).await.unwrap();
        let err = ledger.commit(auth.token, "Booking LATE").await.unwrap_err();
        assert!(matches!(
            err,
            CreditError::Fault(CreditFault::AuthorizationExpired)
        ));
    }

    #[tokio::test]
    async fn release_expired_sweeps_stale_authorizations() {
        let store = Arc::new(MemoryCreditStore::new());
        let id = approved_connection(&store, 500_00).await;
        let ledger = ledger(store);

        let auth = ledger.authorize(id, 10_00).await.unwrap();
        assert_eq!(ledger.release_expired(Utc::now()), 0);
        assert_eq!(
            ledger.release_expired(Utc::now() + Duration::minutes(10)),
            1
        );
        // The swept token can no longer commit.
        let err = ledger.commit(auth.token, "Booking GONE1").await.unwrap_err();
        assert!(matches!(
            err,
            CreditError::Fault(CreditFault::UnknownAuthorization)
        ));
    }

    #[tokio::test]
    async fn history_ties_out_with_balance() {
        let store = Arc::new(MemoryCreditStore::new());
        let id = approved_connection(&store, 500_00).await;
        let ledger = ledger(store.clone());

        let auth = ledger.authorize(id, 150_00).await.unwrap();
        ledger.commit(auth.token, "Booking AAAA11").await.unwrap();
        ledger.credit(id, 50_00, "Refund AAAA11").await.unwrap();

        let history = ledger.history(id, None).await.unwrap();
        assert_eq!(history.len(), 2);
        // Newest first.
        assert_eq!(history[0].kind, TransactionKind::Credit);

        let net: Laari = history.iter().map(|t| t.signed_amount()).sum();
        let connection = store.get_connection(id).await.unwrap().unwrap();
        assert_eq!(500_00 + net, connection.current_balance);
    }
}
