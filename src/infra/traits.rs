//! Store trait definitions.
//!
//! Handlers receive these as injected capabilities; no component holds
//! process-wide mutable state. Every store is append-only: the only write
//! operations are inserts of brand-new logical records or chained successor
//! rows.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    Agent, AgentMemory, ComplianceEvent, PaymentReceipt, ProjectId, RunId, RunSnapshot,
    X402Request,
};

use super::error::Result;

/// Agent identity registry.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Register a new agent. Fails with `DidAlreadyRegistered` when the DID
    /// is taken. Returns the stored row (with its assigned sequence).
    async fn insert(&self, agent: &Agent) -> Result<Agent>;

    async fn get(&self, project_id: ProjectId, agent_id: Uuid) -> Result<Option<Agent>>;

    async fn get_by_did(&self, did: &str) -> Result<Option<Agent>>;

    async fn list(&self, project_id: ProjectId) -> Result<Vec<Agent>>;
}

/// Append-only ledger of payment-authorization requests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait X402RequestStore: Send + Sync {
    /// Insert a chain root. Returns `None` when the (project, idempotency
    /// key) constraint rejected the row; the caller then resolves the race
    /// via [`get_by_idempotency_key`](Self::get_by_idempotency_key).
    async fn insert_root(&self, request: &X402Request) -> Result<Option<X402Request>>;

    /// Insert a successor row. Fails with `AlreadySuperseded` when the
    /// predecessor already has a successor.
    async fn insert_successor(&self, successor: &X402Request) -> Result<X402Request>;

    async fn get(&self, project_id: ProjectId, request_id: Uuid) -> Result<Option<X402Request>>;

    async fn get_by_idempotency_key(
        &self,
        project_id: ProjectId,
        idempotency_key: &str,
    ) -> Result<Option<X402Request>>;

    /// Resolve the effective (chain-tip) record for the logical transaction
    /// containing `request_id`. Chain corruption surfaces as
    /// `ChainIntegrity`, never as an unbounded walk.
    async fn resolve_effective(
        &self,
        project_id: ProjectId,
        request_id: Uuid,
    ) -> Result<X402Request>;
}

/// Append-only ledger of settlement receipts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Insert a chain root; `None` on idempotency-key conflict.
    async fn insert_root(&self, receipt: &PaymentReceipt) -> Result<Option<PaymentReceipt>>;

    /// Insert a successor row; `AlreadySuperseded` when beaten to it.
    async fn insert_successor(&self, successor: &PaymentReceipt) -> Result<PaymentReceipt>;

    async fn get(&self, project_id: ProjectId, receipt_id: Uuid)
        -> Result<Option<PaymentReceipt>>;

    async fn get_by_idempotency_key(
        &self,
        project_id: ProjectId,
        idempotency_key: &str,
    ) -> Result<Option<PaymentReceipt>>;

    async fn resolve_effective(
        &self,
        project_id: ProjectId,
        receipt_id: Uuid,
    ) -> Result<PaymentReceipt>;
}

/// Append-only compliance audit log.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ComplianceStore: Send + Sync {
    async fn insert(&self, event: &ComplianceEvent) -> Result<ComplianceEvent>;

    async fn get(&self, project_id: ProjectId, event_id: Uuid)
        -> Result<Option<ComplianceEvent>>;

    async fn list_by_run(&self, project_id: ProjectId, run_id: RunId)
        -> Result<Vec<ComplianceEvent>>;

    /// Fetch the subset of `event_ids` that exist, preserving input order.
    async fn get_many(
        &self,
        project_id: ProjectId,
        event_ids: &[Uuid],
    ) -> Result<Vec<ComplianceEvent>>;
}

/// Append-only agent memory log.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn insert(&self, memory: &AgentMemory) -> Result<AgentMemory>;

    async fn get(&self, project_id: ProjectId, memory_id: Uuid) -> Result<Option<AgentMemory>>;

    async fn list_by_run(&self, project_id: ProjectId, run_id: RunId)
        -> Result<Vec<AgentMemory>>;

    /// Fetch the subset of `memory_ids` that exist, preserving input order.
    async fn get_many(&self, project_id: ProjectId, memory_ids: &[Uuid])
        -> Result<Vec<AgentMemory>>;
}

/// Snapshot reader for the replay aggregator.
///
/// The snapshot spans four stores but is taken at one logical read point, so
/// a validation finding is reproducible rather than a flaked read.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReplayReader: Send + Sync {
    async fn fetch_run_snapshot(&self, project_id: ProjectId, run_id: RunId)
        -> Result<RunSnapshot>;
}
