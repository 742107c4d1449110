//! PostgreSQL ledger of settlement receipts.
//!
//! Same append-only chain mechanics as the request ledger; amounts are
//! bound and returned as TEXT so the stored decimal string round-trips
//! byte-for-byte.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::domain::{
    AgentId, Amount, ChainError, PaymentReceipt, ProjectId, ReceiptStatus, MAX_CHAIN_DEPTH,
};
use crate::infra::error::{is_unique_violation, LedgerError, Result};
use crate::infra::traits::ReceiptStore;

use super::parse_column;

#[derive(sqlx::FromRow)]
struct ReceiptRow {
    receipt_id: Uuid,
    project_id: Uuid,
    x402_request_id: Uuid,
    from_agent_id: Uuid,
    to_agent_id: Uuid,
    amount: String,
    status: String,
    transaction_hash: Option<String>,
    treasury_source: String,
    treasury_destination: String,
    idempotency_key: String,
    supersedes: Option<Uuid>,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    seq: i64,
}

impl ReceiptRow {
    fn into_domain(self) -> Result<PaymentReceipt> {
        Ok(PaymentReceipt {
            receipt_id: self.receipt_id,
            project_id: ProjectId::from_uuid(self.project_id),
            x402_request_id: self.x402_request_id,
            from_agent_id: AgentId::from_uuid(self.from_agent_id),
            to_agent_id: AgentId::from_uuid(self.to_agent_id),
            amount: Amount::parse(self.amount)
                .map_err(|e| LedgerError::Internal(format!("corrupt amount column: {e}")))?,
            status: parse_column::<ReceiptStatus>(&self.status, "receipt status")?,
            transaction_hash: self.transaction_hash,
            treasury_source: self.treasury_source,
            treasury_destination: self.treasury_destination,
            idempotency_key: self.idempotency_key,
            supersedes: self.supersedes,
            created_at: self.created_at,
            confirmed_at: self.confirmed_at,
            seq: self.seq,
        })
    }
}

/// PostgreSQL-backed receipt ledger.
pub struct PgReceiptStore {
    pool: PgPool,
}

impl PgReceiptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_row(
        &self,
        receipt: &PaymentReceipt,
        on_conflict_do_nothing: bool,
    ) -> Result<Option<PaymentReceipt>> {
        let conflict_clause = if on_conflict_do_nothing {
            "ON CONFLICT DO NOTHING"
        } else {
            ""
        };
        let sql = format!(
            r#"
            INSERT INTO payment_receipts (
                receipt_id, project_id, x402_request_id,
                from_agent_id, to_agent_id, amount, status,
                transaction_hash, treasury_source, treasury_destination,
                idempotency_key, supersedes, created_at, confirmed_at
            ) VALUES (
                $1, $2, $3,
                $4, $5, $6, $7,
                $8, $9, $10,
                $11, $12, $13, $14
            )
            {conflict_clause}
            RETURNING *
            "#
        );

        let row: Option<ReceiptRow> = sqlx::query_as(&sql)
            .bind(receipt.receipt_id)
            .bind(receipt.project_id.0)
            .bind(receipt.x402_request_id)
            .bind(receipt.from_agent_id.0)
            .bind(receipt.to_agent_id.0)
            .bind(receipt.amount.as_str())
            .bind(receipt.status.to_string())
            .bind(&receipt.transaction_hash)
            .bind(&receipt.treasury_source)
            .bind(&receipt.treasury_destination)
            .bind(&receipt.idempotency_key)
            .bind(receipt.supersedes)
            .bind(receipt.created_at)
            .bind(receipt.confirmed_at)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ReceiptRow::into_domain).transpose()
    }

    async fn fetch_successor(&self, receipt_id: Uuid) -> Result<Option<PaymentReceipt>> {
        let row: Option<ReceiptRow> =
            sqlx::query_as("SELECT * FROM payment_receipts WHERE supersedes = $1")
                .bind(receipt_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(ReceiptRow::into_domain).transpose()
    }
}

#[async_trait]
impl ReceiptStore for PgReceiptStore {
    async fn insert_root(&self, receipt: &PaymentReceipt) -> Result<Option<PaymentReceipt>> {
        self.insert_row(receipt, true).await
    }

    async fn insert_successor(&self, successor: &PaymentReceipt) -> Result<PaymentReceipt> {
        match self.insert_row(successor, false).await {
            Ok(Some(row)) => Ok(row),
            Ok(None) => Err(LedgerError::Internal(
                "successor insert returned no row".to_string(),
            )),
            Err(LedgerError::Database(e)) if is_unique_violation(&e) => {
                Err(LedgerError::AlreadySuperseded {
                    record_id: successor.supersedes.unwrap_or(successor.receipt_id),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn get(
        &self,
        project_id: ProjectId,
        receipt_id: Uuid,
    ) -> Result<Option<PaymentReceipt>> {
        let row: Option<ReceiptRow> = sqlx::query_as(
            "SELECT * FROM payment_receipts WHERE project_id = $1 AND receipt_id = $2",
        )
        .bind(project_id.0)
        .bind(receipt_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReceiptRow::into_domain).transpose()
    }

    async fn get_by_idempotency_key(
        &self,
        project_id: ProjectId,
        idempotency_key: &str,
    ) -> Result<Option<PaymentReceipt>> {
        let row: Option<ReceiptRow> = sqlx::query_as(
            r#"
            SELECT * FROM payment_receipts
            WHERE project_id = $1 AND idempotency_key = $2 AND supersedes IS NULL
            "#,
        )
        .bind(project_id.0)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReceiptRow::into_domain).transpose()
    }

    async fn resolve_effective(
        &self,
        project_id: ProjectId,
        receipt_id: Uuid,
    ) -> Result<PaymentReceipt> {
        let start = self
            .get(project_id, receipt_id)
            .await?
            .ok_or(LedgerError::ReceiptNotFound(receipt_id))?;

        let mut visited = std::collections::HashSet::with_capacity(8);
        visited.insert(start.receipt_id);
        let mut current = start;

        for _ in 0..MAX_CHAIN_DEPTH {
            match self.fetch_successor(current.receipt_id).await? {
                Some(next) => {
                    if !visited.insert(next.receipt_id) {
                        return Err(ChainError::CycleDetected {
                            start: receipt_id,
                            repeated: next.receipt_id,
                        }
                        .into());
                    }
                    current = next;
                }
                None => return Ok(current),
            }
        }

        Err(ChainError::DepthExceeded {
            start: receipt_id,
            max: MAX_CHAIN_DEPTH,
        }
        .into())
    }
}
