//! PostgreSQL compliance audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::domain::{
    AgentId, ComplianceEvent, ComplianceEventType, ComplianceOutcome, ProjectId, RunId,
};
use crate::infra::error::Result;
use crate::infra::traits::ComplianceStore;

use super::parse_column;

#[derive(sqlx::FromRow)]
struct ComplianceRow {
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

impl ComplianceRow {
    fn into_domain(self) -> Result<ComplianceEvent> {
        Ok(ComplianceEvent {
            event_id: self.event_id,
            project_id: ProjectId::from_uuid(self.project_id),
            agent_id: AgentId::from_uuid(self.agent_id),
            event_type: ComplianceEventType::from(self.event_type),
            outcome: parse_column::<ComplianceOutcome>(&self.outcome, "compliance outcome")?,
            risk_score: self.risk_score,
            details: self.details,
            run_id: RunId::from_uuid(self.run_id),
            created_at: self.created_at,
            seq: self.seq,
        })
    }
}

/// PostgreSQL-backed compliance event store.
pub struct PgComplianceStore {
    pool: PgPool,
}

impl PgComplianceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ComplianceStore for PgComplianceStore {
    async fn insert(&self, event: &ComplianceEvent) -> Result<ComplianceEvent> {
        let row: ComplianceRow = sqlx::query_as(
            r#"
            INSERT INTO compliance_events (
                event_id, project_id, agent_id, event_type, outcome,
                risk_score, details, run_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(event.event_id)
        .bind(event.project_id.0)
        .bind(event.agent_id.0)
        .bind(event.event_type.to_string())
        .bind(event.outcome.to_string())
        .bind(event.risk_score)
        .bind(&event.details)
        .bind(event.run_id.0)
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get(
        &self,
        project_id: ProjectId,
        event_id: Uuid,
    ) -> Result<Option<ComplianceEvent>> {
        let row: Option<ComplianceRow> = sqlx::query_as(
            "SELECT * FROM compliance_events WHERE project_id = $1 AND event_id = $2",
        )
        .bind(project_id.0)
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ComplianceRow::into_domain).transpose()
    }

    async fn list_by_run(
        &self,
        project_id: ProjectId,
        run_id: RunId,
    ) -> Result<Vec<ComplianceEvent>> {
        let rows: Vec<ComplianceRow> = sqlx::query_as(
            r#"
            SELECT * FROM compliance_events
            WHERE project_id = $1 AND run_id = $2
            ORDER BY created_at, seq
            "#,
        )
        .bind(project_id.0)
        .bind(run_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ComplianceRow::into_domain).collect()
    }

    async fn get_many(
        &self,
        project_id: ProjectId,
        event_ids: &[Uuid],
    ) -> Result<Vec<ComplianceEvent>> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<ComplianceRow> = sqlx::query_as(
            "SELECT * FROM compliance_events WHERE project_id = $1 AND event_id = ANY($2)",
        )
        .bind(project_id.0)
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id = std::collections::HashMap::with_capacity(rows.len());
        for row in rows {
            let event = row.into_domain()?;
            by_id.insert(event.event_id, event);
        }

        Ok(event_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }
}
