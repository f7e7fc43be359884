use async_trait::async_trait;
use chrono::{DateTime, Utc};
use odi_core::BoxError;
use odi_credit::models::{
    AgentOwnerConnection, ConnectionStatus, CreditTransaction, TransactionKind,
};
use odi_credit::repository::{CreditRepository, DebitOutcome};
use odi_shared::Laari;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgCreditRepository {
    pool: PgPool,
}

impl PgCreditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_str(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Requested => "REQUESTED",
        ConnectionStatus::Approved => "APPROVED",
        ConnectionStatus::Rejected => "REJECTED",
        ConnectionStatus::Blocked => "BLOCKED",
    }
}

#[derive(sqlx::FromRow)]
struct ConnectionRow {
    id: Uuid,
    agent_id: Uuid,
    owner_id: Uuid,
    currency: String,
    credit_limit: i64,
    current_balance: i64,
    balance_version: i64,
    status: String,
    active: bool,
    requested_limit: i64,
    request_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const CONNECTION_COLUMNS: &str = "id, agent_id, owner_id, currency, credit_limit, \
     current_balance, balance_version, status, active, requested_limit, request_message, \
     created_at, updated_at";

impl From<ConnectionRow> for AgentOwnerConnection {
    fn from(row: ConnectionRow) -> Self {
        let status = match row.status.as_str() {
            "APPROVED" => ConnectionStatus::Approved,
            "REJECTED" => ConnectionStatus::Rejected,
            "BLOCKED" => ConnectionStatus::Blocked,
            _ => ConnectionStatus::Requested,
        };
        AgentOwnerConnection {
            id: row.id,
            agent_id: row.agent_id,
            owner_id: row.owner_id,
            currency: row.currency,
            credit_limit: row.credit_limit,
            current_balance: row.current_balance,
            balance_version: row.balance_version.max(0) as u64,
            status,
            active: row.active,
            requested_limit: row.requested_limit,
            request_message: row.request_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    connection_id: Uuid,
    kind: String,
    amount: i64,
    balance_after: i64,
    reference: String,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for CreditTransaction {
    fn from(row: TransactionRow) -> Self {
        let kind = match row.kind.as_str() {
            "DEBIT" => TransactionKind::Debit,
            _ => TransactionKind::Credit,
        };
        CreditTransaction {
            id: row.id,
            connection_id: row.connection_id,
            kind,
            amount: row.amount,
            balance_after: row.balance_after,
            reference: row.reference,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CreditRepository for PgCreditRepository {
    async fn create_connection(&self, connection: &AgentOwnerConnection) -> Result<(), BoxError> {
        sqlx::query(
            "INSERT INTO connections (id, agent_id, owner_id, currency, credit_limit, \
             current_balance, balance_version, status, active, requested_limit, \
             request_message, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(connection.id)
        .bind(connection.agent_id)
        .bind(connection.owner_id)
        .bind(&connection.currency)
        .bind(connection.credit_limit)
        .bind(connection.current_balance)
        .bind(connection.balance_version as i64)
        .bind(status_str(connection.status))
        .bind(connection.active)
        .bind(connection.requested_limit)
        .bind(&connection.request_message)
        .bind(connection.created_at)
        .bind(connection.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_connection(&self, id: Uuid) -> Result<Option<AgentOwnerConnection>, BoxError> {
        let row = sqlx::query_as::<_, ConnectionRow>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_agent_owner(
        &self,
        agent_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<AgentOwnerConnection>, BoxError> {
        let row = sqlx::query_as::<_, ConnectionRow>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE agent_id = $1 AND owner_id = $2"
        ))
        .bind(agent_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_for_agent(&self, agent_id: Uuid) -> Result<Vec<AgentOwnerConnection>, BoxError> {
        let rows = sqlx::query_as::<_, ConnectionRow>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE agent_id = $1 ORDER BY created_at"
        ))
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<AgentOwnerConnection>, BoxError> {
        let rows = sqlx::query_as::<_, ConnectionRow>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE owner_id = $1 ORDER BY created_at"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ConnectionStatus,
        credit_limit: Option<Laari>,
    ) -> Result<(), BoxError> {
        let result = sqlx::query(
            "UPDATE connections SET status = $2, \
             credit_limit = COALESCE($3, credit_limit), updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status_str(status))
        .bind(credit_limit)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(format!("connection {} not found", id).into());
        }
        Ok(())
    }

    async fn debit(
        &self,
        id: Uuid,
        amount: Laari,
        expected_version: u64,
        reference: &str,
    ) -> Result<DebitOutcome, BoxError> {
        let mut tx = self.pool.begin().await?;

        // Single conditional update keyed on the balance version; the
        // version check and the floor check decide atomically.
        let updated = sqlx::query_as::<_, (i64,)>(
            "UPDATE connections \
             SET current_balance = current_balance - $2, \
                 balance_version = balance_version + 1, updated_at = now() \
             WHERE id = $1 AND balance_version = $3 AND current_balance >= $2 \
             RETURNING current_balance",
        )
        .bind(id)
        .bind(amount)
        .bind(expected_version as i64)
        .fetch_optional(&mut *tx)
        .await?;

        let balance_after = match updated {
            Some((balance,)) => balance,
            None => {
                tx.rollback().await?;
                let row = sqlx::query_as::<_, (i64, i64)>(
                    "SELECT balance_version, current_balance FROM connections WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| format!("connection {} not found", id))?;
                if row.0.max(0) as u64 != expected_version {
                    return Ok(DebitOutcome::VersionConflict);
                }
                return Ok(DebitOutcome::InsufficientFunds { available: row.1 });
            }
        };

        let transaction = CreditTransaction {
            id: Uuid::new_v4(),
            connection_id: id,
            kind: TransactionKind::Debit,
            amount,
            balance_after,
            reference: reference.to_string(),
            created_at: Utc::now(),
        };
        insert_transaction(&mut tx, &transaction).await?;
        tx.commit().await?;
        Ok(DebitOutcome::Applied(transaction))
    }

    async fn credit(
        &self,
        id: Uuid,
        amount: Laari,
        reference: &str,
    ) -> Result<CreditTransaction, BoxError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, (i64,)>(
            "UPDATE connections \
             SET current_balance = current_balance + $2, \
                 balance_version = balance_version + 1, updated_at = now() \
             WHERE id = $1 RETURNING current_balance",
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| format!("connection {} not found", id))?;

        let transaction = CreditTransaction {
            id: Uuid::new_v4(),
            connection_id: id,
            kind: TransactionKind::Credit,
            amount,
            balance_after: updated.0,
            reference: reference.to_string(),
            created_at: Utc::now(),
        };
        insert_transaction(&mut tx, &transaction).await?;
        tx.commit().await?;
        Ok(transaction)
    }

    async fn history(
        &self,
        connection_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<CreditTransaction>, BoxError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, connection_id, kind, amount, balance_after, reference, created_at \
             FROM credit_transactions WHERE connection_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(connection_id)
        .bind(limit.map(|l| l as i64).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

async fn insert_transaction(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    transaction: &CreditTransaction,
) -> Result<(), sqlx::Error> {
    let kind = match transaction.kind {
        TransactionKind::Credit => "CREDIT",
        TransactionKind::Debit => "DEBIT",
    };
    sqlx::query(
        "INSERT INTO credit_transactions (id, connection_id, kind, amount, balance_after, \
         reference, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(transaction.id)
    .bind(transaction.connection_id)
    .bind(kind)
    .bind(transaction.amount)
    .bind(transaction.balance_after)
    .bind(&transaction.reference)
    .bind(transaction.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
