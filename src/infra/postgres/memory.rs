//! PostgreSQL agent memory log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::domain::{AgentId, AgentMemory, MemoryType, ProjectId, RunId};
use crate::infra::error::Result;
use crate::infra::traits::MemoryStore;

#[derive(sqlx::FromRow)]
struct MemoryRow {
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

impl MemoryRow {
    fn into_domain(self) -> AgentMemory {
        AgentMemory {
            memory_id: self.memory_id,
            project_id: ProjectId::from_uuid(self.project_id),
            agent_id: AgentId::from_uuid(self.agent_id),
            run_id: RunId::from_uuid(self.run_id),
            memory_type: MemoryType::from(self.memory_type),
            content: self.content,
            metadata: self.metadata,
            namespace: self.namespace,
            created_at: self.created_at,
            seq: self.seq,
        }
    }
}

/// PostgreSQL-backed agent memory store.
pub struct PgMemoryStore {
    pool: PgPool,
}

impl PgMemoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemoryStore for PgMemoryStore {
    async fn insert(&self, memory: &AgentMemory) -> Result<AgentMemory> {
        let row: MemoryRow = sqlx::query_as(
            r#"
            INSERT INTO agent_memories (
                memory_id, project_id, agent_id, run_id, memory_type,
                content, metadata, namespace, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(memory.memory_id)
        .bind(memory.project_id.0)
        .bind(memory.agent_id.0)
        .bind(memory.run_id.0)
        .bind(memory.memory_type.to_string())
        .bind(&memory.content)
        .bind(&memory.metadata)
        .bind(&memory.namespace)
        .bind(memory.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_domain())
    }

    async fn get(&self, project_id: ProjectId, memory_id: Uuid) -> Result<Option<AgentMemory>> {
        let row: Option<MemoryRow> = sqlx::query_as(
            "SELECT * FROM agent_memories WHERE project_id = $1 AND memory_id = $2",
        )
        .bind(project_id.0)
        .bind(memory_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MemoryRow::into_domain))
    }

    async fn list_by_run(
        &self,
        project_id: ProjectId,
        run_id: RunId,
    ) -> Result<Vec<AgentMemory>> {
        let rows: Vec<MemoryRow> = sqlx::query_as(
            r#"
            SELECT * FROM agent_memories
            WHERE project_id = $1 AND run_id = $2
            ORDER BY created_at, seq
            "#,
        )
        .bind(project_id.0)
        .bind(run_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MemoryRow::into_domain).collect())
    }

    async fn get_many(
        &self,
        project_id: ProjectId,
        memory_ids: &[Uuid],
    ) -> Result<Vec<AgentMemory>> {
        if memory_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<MemoryRow> = sqlx::query_as(
            "SELECT * FROM agent_memories WHERE project_id = $1 AND memory_id = ANY($2)",
        )
        .bind(project_id.0)
        .bind(memory_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id: std::collections::HashMap<Uuid, AgentMemory> = rows
            .into_iter()
            .map(|row| {
                let memory = row.into_domain();
                (memory.memory_id, memory)
            })
            .collect();

        Ok(memory_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }
}
