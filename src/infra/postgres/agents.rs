//! PostgreSQL agent registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::domain::{Agent, AgentId, AgentScope, ProjectId};
use crate::infra::error::{is_unique_violation, LedgerError, Result};
use crate::infra::traits::AgentStore;

use super::parse_column;

#[derive(sqlx::FromRow)]
struct AgentRow {
    agent_id: Uuid,
    project_id: Uuid,
    did: String,
    role: String,
    display_name: String,
    scope: String,
    created_at: DateTime<Utc>,
    seq: i64,
}

impl AgentRow {
    fn into_domain(self) -> Result<Agent> {
        Ok(Agent {
            agent_id: AgentId::from_uuid(self.agent_id),
            project_id: ProjectId::from_uuid(self.project_id),
            did: self.did,
            role: self.role,
            display_name: self.display_name,
            scope: parse_column::<AgentScope>(&self.scope, "agent scope")?,
            created_at: self.created_at,
            seq: self.seq,
        })
    }
}

/// PostgreSQL-backed agent registry.
pub struct PgAgentStore {
    pool: PgPool,
}

impl PgAgentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentStore for PgAgentStore {
    async fn insert(&self, agent: &Agent) -> Result<Agent> {
        let row: AgentRow = sqlx::query_as(
            r#"
            INSERT INTO agents (
                agent_id, project_id, did, role, display_name, scope, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(agent.agent_id.0)
        .bind(agent.project_id.0)
        .bind(&agent.did)
        .bind(&agent.role)
        .bind(&agent.display_name)
        .bind(agent.scope.to_string())
        .bind(agent.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::DidAlreadyRegistered(agent.did.clone())
            } else {
                e.into()
            }
        })?;

        row.into_domain()
    }

    async fn get(&self, project_id: ProjectId, agent_id: Uuid) -> Result<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as(
            "SELECT * FROM agents WHERE project_id = $1 AND agent_id = $2",
        )
        .bind(project_id.0)
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AgentRow::into_domain).transpose()
    }

    async fn get_by_did(&self, did: &str) -> Result<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE did = $1")
            .bind(did)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AgentRow::into_domain).transpose()
    }

    async fn list(&self, project_id: ProjectId) -> Result<Vec<Agent>> {
        let rows: Vec<AgentRow> =
            sqlx::query_as("SELECT * FROM agents WHERE project_id = $1 ORDER BY seq")
                .bind(project_id.0)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(AgentRow::into_domain).collect()
    }
}
