//! Snapshot reader for run replay.
//!
//! Replay spans four independent stores. The reads are not required to form
//! a globally serialized view of the whole database, but they must share a
//! single logical read point so validation findings are reproducible. A
//! `REPEATABLE READ, READ ONLY` transaction provides exactly that: all four
//! queries observe one MVCC snapshot, and writes arriving mid-replay are
//! simply not included.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    Agent, AgentId, AgentMemory, AgentScope, ComplianceEvent, ComplianceEventType,
    ComplianceOutcome, MemoryType, ProjectId, RequestStatus, RunId, RunSnapshot, TaskId,
    X402Request,
};
use crate::infra::error::Result;
use crate::infra::traits::ReplayReader;

use super::{hash_from_column, parse_column};

/// PostgreSQL-backed replay snapshot reader.
pub struct PgReplayReader {
    pool: PgPool,
}

impl PgReplayReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotMemoryRow {
    memory_id: Uuid,
    project_id: Uuid,
    agent_id: Uuid,
    run_id: Uuid,
    memory_type: String,
    content: serde_json::Value,
    metadata: serde_json::Value,
    namespace: String,
    created_at: DateTime<Utc>,
    seq: i64,
}

#[derive(sqlx::FromRow)]
struct SnapshotComplianceRow {
    event_id: Uuid,
    project_id: Uuid,
    agent_id: Uuid,
    event_type: String,
    outcome: String,
    risk_score: f64,
    details: serde_json::Value,
    run_id: Uuid,
    created_at: DateTime<Utc>,
    seq: i64,
}

#[derive(sqlx::FromRow)]
struct SnapshotRequestRow {
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

#[derive(sqlx::FromRow)]
struct SnapshotAgentRow {
    agent_id: Uuid,
    project_id: Uuid,
    did: String,
    role: String,
    display_name: String,
    scope: String,
    created_at: DateTime<Utc>,
    seq: i64,
}

async fn fetch_agent(
    tx: &mut Transaction<'_, Postgres>,
    project_id: ProjectId,
    agent_id: Uuid,
) -> Result<Option<Agent>> {
    let row: Option<SnapshotAgentRow> = sqlx::query_as(
        "SELECT * FROM agents WHERE project_id = $1 AND agent_id = $2",
    )
    .bind(project_id.0)
    .bind(agent_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|r| {
        Ok(Agent {
            agent_id: AgentId::from_uuid(r.agent_id),
            project_id: ProjectId::from_uuid(r.project_id),
            did: r.did,
            role: r.role,
            display_name: r.display_name,
            scope: parse_column::<AgentScope>(&r.scope, "agent scope")?,
            created_at: r.created_at,
            seq: r.seq,
        })
    })
    .transpose()
}

#[async_trait]
impl ReplayReader for PgReplayReader {
    async fn fetch_run_snapshot(
        &self,
        project_id: ProjectId,
        run_id: RunId,
    ) -> Result<RunSnapshot> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let memory_rows: Vec<SnapshotMemoryRow> = sqlx::query_as(
            r#"
            SELECT * FROM agent_memories
            WHERE project_id = $1 AND run_id = $2
            ORDER BY created_at, seq
            "#,
        )
        .bind(project_id.0)
        .bind(run_id.0)
        .fetch_all(&mut *tx)
        .await?;

        let compliance_rows: Vec<SnapshotComplianceRow> = sqlx::query_as(
            r#"
            SELECT * FROM compliance_events
            WHERE project_id = $1 AND run_id = $2
            ORDER BY created_at, seq
            "#,
        )
        .bind(project_id.0)
        .bind(run_id.0)
        .fetch_all(&mut *tx)
        .await?;

        let request_rows: Vec<SnapshotRequestRow> = sqlx::query_as(
            r#"
            SELECT * FROM x402_requests
            WHERE project_id = $1 AND run_id = $2
            ORDER BY created_at, seq
            "#,
        )
        .bind(project_id.0)
        .bind(run_id.0)
        .fetch_all(&mut *tx)
        .await?;

        let memories: Vec<AgentMemory> = memory_rows
            .into_iter()
            .map(|r| AgentMemory {
                memory_id: r.memory_id,
                project_id: ProjectId::from_uuid(r.project_id),
                agent_id: AgentId::from_uuid(r.agent_id),
                run_id: RunId::from_uuid(r.run_id),
                memory_type: MemoryType::from(r.memory_type),
                content: r.content,
                metadata: r.metadata,
                namespace: r.namespace,
                created_at: r.created_at,
                seq: r.seq,
            })
            .collect();

        let compliance_events: Vec<ComplianceEvent> = compliance_rows
            .into_iter()
            .map(|r| {
                Ok(ComplianceEvent {
                    event_id: r.event_id,
                    project_id: ProjectId::from_uuid(r.project_id),
                    agent_id: AgentId::from_uuid(r.agent_id),
                    event_type: ComplianceEventType::from(r.event_type),
                    outcome: parse_column::<ComplianceOutcome>(&r.outcome, "compliance outcome")?,
                    risk_score: r.risk_score,
                    details: r.details,
                    run_id: RunId::from_uuid(r.run_id),
                    created_at: r.created_at,
                    seq: r.seq,
                })
            })
            .collect::<Result<_>>()?;

        let requests: Vec<X402Request> = request_rows
            .into_iter()
            .map(|r| {
                Ok(X402Request {
                    request_id: r.request_id,
                    project_id: ProjectId::from_uuid(r.project_id),
                    agent_id: AgentId::from_uuid(r.agent_id),
                    task_id: TaskId::from_uuid(r.task_id),
                    run_id: RunId::from_uuid(r.run_id),
                    request_payload: r.request_payload,
                    payload_hash: hash_from_column(r.payload_hash)?,
                    signature: r.signature,
                    signature_verified: r.signature_verified,
                    status: parse_column::<RequestStatus>(&r.status, "request status")?,
                    linked_memory_ids: r.linked_memory_ids,
                    linked_compliance_ids: r.linked_compliance_ids,
                    supersedes: r.supersedes,
                    idempotency_key: r.idempotency_key,
                    created_at: r.created_at,
                    seq: r.seq,
                })
            })
            .collect::<Result<_>>()?;

        // Resolve the run's agent via the first record encountered, still
        // inside the same snapshot.
        let first_agent_id = crate::replay::first_agent_id(&memories, &compliance_events, &requests);
        let agent = match first_agent_id {
            Some(agent_id) => fetch_agent(&mut tx, project_id, agent_id.0).await?,
            None => None,
        };

        tx.commit().await?;

        Ok(RunSnapshot {
            agent,
            memories,
            compliance_events,
            request_rows: requests,
        })
    }
}
