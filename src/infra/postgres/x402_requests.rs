//! PostgreSQL ledger of payment-authorization requests.
//!
//! Only inserts. Chain-root inserts go through `ON CONFLICT DO NOTHING` so
//! the idempotency race resolves at the store's uniqueness constraint;
//! successor inserts rely on the partial unique index over `supersedes` to
//! guarantee at most one successor per row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::domain::{
    AgentId, ChainError, ProjectId, RequestStatus, RunId, TaskId, X402Request, MAX_CHAIN_DEPTH,
};
use crate::infra::error::{is_unique_violation, LedgerError, Result};
use crate::infra::traits::X402RequestStore;

use super::{hash_from_column, parse_column};

#[derive(sqlx::FromRow)]
struct X402RequestRow {
    request_id: Uuid,
    project_id: Uuid,
    agent_id: Uuid,
    task_id: Uuid,
    run_id: Uuid,
    request_payload: serde_json::Value,
    payload_hash: Vec<u8>,
    signature: String,
    signature_verified: bool,
    status: String,
    linked_memory_ids: Vec<Uuid>,
    linked_compliance_ids: Vec<Uuid>,
    supersedes: Option<Uuid>,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
    seq: i64,
}

impl X402RequestRow {
    fn into_domain(self) -> Result<X402Request> {
        Ok(X402Request {
            request_id: self.request_id,
            project_id: ProjectId::from_uuid(self.project_id),
            agent_id: AgentId::from_uuid(self.agent_id),
            task_id: TaskId::from_uuid(self.task_id),
            run_id: RunId::from_uuid(self.run_id),
            request_payload: self.request_payload,
            payload_hash: hash_from_column(self.payload_hash)?,
            signature: self.signature,
            signature_verified: self.signature_verified,
            status: parse_column::<RequestStatus>(&self.status, "request status")?,
            linked_memory_ids: self.linked_memory_ids,
            linked_compliance_ids: self.linked_compliance_ids,
            supersedes: self.supersedes,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
            seq: self.seq,
        })
    }
}

/// PostgreSQL-backed request ledger.
pub struct PgX402RequestStore {
    pool: PgPool,
}

impl PgX402RequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_row(&self, request: &X402Request, on_conflict_do_nothing: bool) -> Result<Option<X402Request>> {
        let conflict_clause = if on_conflict_do_nothing {
            "ON CONFLICT DO NOTHING"
        } else {
            ""
        };
        let sql = format!(
            r#"
            INSERT INTO x402_requests (
                request_id, project_id, agent_id, task_id, run_id,
                request_payload, payload_hash, signature, signature_verified,
                status, linked_memory_ids, linked_compliance_ids,
                supersedes, idempotency_key, created_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9,
                $10, $11, $12,
                $13, $14, $15
            )
            {conflict_clause}
            RETURNING *
            "#
        );

        let row: Option<X402RequestRow> = sqlx::query_as(&sql)
            .bind(request.request_id)
            .bind(request.project_id.0)
            .bind(request.agent_id.0)
            .bind(request.task_id.0)
            .bind(request.run_id.0)
            .bind(&request.request_payload)
            .bind(request.payload_hash.as_slice())
            .bind(&request.signature)
            .bind(request.signature_verified)
            .bind(request.status.to_string())
            .bind(&request.linked_memory_ids)
            .bind(&request.linked_compliance_ids)
            .bind(request.supersedes)
            .bind(&request.idempotency_key)
            .bind(request.created_at)
            .fetch_optional(&self.pool)
            .await?;

        row.map(X402RequestRow::into_domain).transpose()
    }

    async fn fetch_successor(&self, request_id: Uuid) -> Result<Option<X402Request>> {
        let row: Option<X402RequestRow> =
            sqlx::query_as("SELECT * FROM x402_requests WHERE supersedes = $1")
                .bind(request_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(X402RequestRow::into_domain).transpose()
    }
}

#[async_trait]
impl X402RequestStore for PgX402RequestStore {
    async fn insert_root(&self, request: &X402Request) -> Result<Option<X402Request>> {
        self.insert_row(request, true).await
    }

    async fn insert_successor(&self, successor: &X402Request) -> Result<X402Request> {
        match self.insert_row(successor, false).await {
            Ok(Some(row)) => Ok(row),
            Ok(None) => Err(LedgerError::Internal(
                "successor insert returned no row".to_string(),
            )),
            Err(LedgerError::Database(e)) if is_unique_violation(&e) => {
                Err(LedgerError::AlreadySuperseded {
                    record_id: successor.supersedes.unwrap_or(successor.request_id),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn get(&self, project_id: ProjectId, request_id: Uuid) -> Result<Option<X402Request>> {
        let row: Option<X402RequestRow> = sqlx::query_as(
            "SELECT * FROM x402_requests WHERE project_id = $1 AND request_id = $2",
        )
        .bind(project_id.0)
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(X402RequestRow::into_domain).transpose()
    }

    async fn get_by_idempotency_key(
        &self,
        project_id: ProjectId,
        idempotency_key: &str,
    ) -> Result<Option<X402Request>> {
        let row: Option<X402RequestRow> = sqlx::query_as(
            r#"
            SELECT * FROM x402_requests
            WHERE project_id = $1 AND idempotency_key = $2 AND supersedes IS NULL
            "#,
        )
        .bind(project_id.0)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(X402RequestRow::into_domain).transpose()
    }

    async fn resolve_effective(
        &self,
        project_id: ProjectId,
        request_id: Uuid,
    ) -> Result<X402Request> {
        let start = self
            .get(project_id, request_id)
            .await?
            .ok_or(LedgerError::RequestNotFound(request_id))?;

        let mut visited = std::collections::HashSet::with_capacity(8);
        visited.insert(start.request_id);
        let mut current = start;

        for _ in 0..MAX_CHAIN_DEPTH {
            match self.fetch_successor(current.request_id).await? {
                Some(next) => {
                    if !visited.insert(next.request_id) {
                        return Err(ChainError::CycleDetected {
                            start: request_id,
                            repeated: next.request_id,
                        }
                        .into());
                    }
                    current = next;
                }
                None => return Ok(current),
            }
        }

        Err(ChainError::DepthExceeded {
            start: request_id,
            max: MAX_CHAIN_DEPTH,
        }
        .into())
    }
}
