use async_trait::async_trait;
use chrono::{DateTime, Utc};
use odi_shared::Laari;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::BoxError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayStatus {
    Created,
    Pending,
    Confirmed,
    Cancelled,
    Failed,
}

/// A card transaction registered with the external payment gateway. The
/// rider is redirected to `redirect_url` and the gateway reports the final
/// status back through a webhook or polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTransaction {
    /// Provider's transaction id.
    pub id: String,
    /// Our booking id, passed to the provider as the local reference.
    pub local_id: Uuid,
    pub amount: Laari,
    pub currency: String,
    pub status: GatewayStatus,
    pub redirect_url: Option<String>,
    pub qr_code_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Adapter boundary for the external card payment processor. The engine
/// never sees gateway credentials or wire details; it only creates
/// transactions and reads their status.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_transaction(
        &self,
        booking_id: Uuid,
        amount: Laari,
        currency: &str,
    ) -> Result<GatewayTransaction, BoxError>;

    async fn get_transaction(&self, transaction_id: &str) -> Result<GatewayTransaction, BoxError>;

    async fn cancel_transaction(&self, transaction_id: &str) -> Result<GatewayTransaction, BoxError>;
}

/// Gateway stand-in for tests and local development. Encodes the booking
/// id inside the transaction id so `get_transaction` can recover it.
pub struct MockGateway {
    /// When set, `create_transaction` fails with this message. Used to
    /// exercise the external-service failure path.
    pub fail_with: Option<String>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self { fail_with: None }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_transaction(
        &self,
        booking_id: Uuid,
        amount: Laari,
        currency: &str,
    ) -> Result<GatewayTransaction, BoxError> {
        if let Some(message) = &self.fail_with {
            return Err(message.clone().into());
        }

        Ok(GatewayTransaction {
            id: format!("mock_txn_{}", booking_id.simple()),
            local_id: booking_id,
            amount,
            currency: currency.to_string(),
            status: GatewayStatus::Created,
            redirect_url: Some(format!("https://gateway.test/pay/{}", booking_id.simple())),
            qr_code_url: None,
            created_at: Utc::now(),
        })
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<GatewayTransaction, BoxError> {
        let local_id_str = transaction_id.strip_prefix("mock_txn_").unwrap_or_default();
        let local_id = Uuid::parse_str(local_id_str).map_err(|_| "unknown transaction id")?;

        // The mock reports success to simulate a completed checkout.
        Ok(GatewayTransaction {
            id: transaction_id.to_string(),
            local_id,
            amount: 0,
            currency: odi_shared::DEFAULT_CURRENCY.to_string(),
            status: GatewayStatus::Confirmed,
            redirect_url: None,
            qr_code_url: None,
            created_at: Utc::now(),
        })
    }

    async fn cancel_transaction(&self, transaction_id: &str) -> Result<GatewayTransaction, BoxError> {
        let mut txn = self.get_transaction(transaction_id).await?;
        txn.status = GatewayStatus::Cancelled;
        Ok(txn)
    }
}
