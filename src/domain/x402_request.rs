//! Payment-authorization requests and their supersede chains.
//!
//! A logical transaction is represented by a chain of immutable rows. The
//! root row is the original signed request; every status transition or link
//! addition inserts a successor row whose `supersedes` field points at its
//! predecessor. The *effective* record for a transaction is the tip of its
//! chain, resolved at read time.
//!
//! This keeps the ledger non-repudiable: the audit trail shows exactly when
//! each transition and each link was established, and no committed row is
//! ever rewritten.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::Hash256;

use super::{hash256_hex, ts_millis, AgentId, ProjectId, RunId, TaskId};

/// Maximum supersede-chain length followed during resolution. Chains longer
/// than this indicate data corruption (most likely a cycle) and resolve to a
/// replay-integrity error instead of looping.
pub const MAX_CHAIN_DEPTH: usize = 64;

/// Lifecycle status of a payment-authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Completed,
}

impl RequestStatus {
    /// Whether a transition from `self` to `next` is legal.
    ///
    /// `PENDING -> {APPROVED, REJECTED, EXPIRED}`, `APPROVED -> COMPLETED`;
    /// `REJECTED`, `EXPIRED`, and `COMPLETED` are terminal.
    pub fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Pending, Self::Expired)
                | (Self::Approved, Self::Completed)
        )
    }

    /// Whether this status authorizes settlement tracking.
    pub fn is_authorized(self) -> bool {
        matches!(self, Self::Approved | Self::Completed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Expired | Self::Completed)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "EXPIRED" => Ok(Self::Expired),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

/// One immutable row of a payment-authorization chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct X402Request {
    /// Unique ID of this row (not of the logical transaction)
    pub request_id: Uuid,

    pub project_id: ProjectId,
    pub agent_id: AgentId,
    pub task_id: TaskId,
    pub run_id: RunId,

    /// Opaque caller payload; canonicalized only for hashing and signing
    pub request_payload: serde_json::Value,

    /// Canonical payload hash, used for idempotent-replay comparison
    #[serde(with = "hash256_hex")]
    pub payload_hash: Hash256,

    /// Agent signature over the canonical payload signing hash (0x-hex)
    pub signature: String,

    /// Outcome of signature verification at create time
    pub signature_verified: bool,

    pub status: RequestStatus,

    /// AgentMemory rows linked to this request
    pub linked_memory_ids: Vec<Uuid>,

    /// ComplianceEvent rows linked to this request
    pub linked_compliance_ids: Vec<Uuid>,

    /// Predecessor row in the supersede chain; `None` for chain roots
    pub supersedes: Option<Uuid>,

    /// Caller-supplied dedup key; only present on chain roots
    pub idempotency_key: Option<String>,

    #[serde(rename = "timestamp", with = "ts_millis")]
    pub created_at: DateTime<Utc>,

    /// Insertion order, used as the replay tie-break
    #[serde(skip)]
    pub seq: i64,
}

impl X402Request {
    /// Build the successor row expressing a status transition.
    ///
    /// Copies every immutable identity field; only `status`, `supersedes`,
    /// and the row identity change. Legality of the transition is the
    /// caller's responsibility (checked at the service layer so the error
    /// can carry both statuses).
    pub fn successor_with_status(&self, new_status: RequestStatus, now: DateTime<Utc>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            status: new_status,
            supersedes: Some(self.request_id),
            idempotency_key: None,
            created_at: now,
            seq: 0,
            ..self.clone()
        }
    }

    /// Build the successor row expressing newly established links.
    ///
    /// The successor carries the union of the predecessor's links and the
    /// new ones, preserving first-seen order so resolution is deterministic.
    pub fn successor_with_links(
        &self,
        memory_ids: &[Uuid],
        compliance_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Self {
        let mut linked_memory_ids = self.linked_memory_ids.clone();
        for id in memory_ids {
            if !linked_memory_ids.contains(id) {
                linked_memory_ids.push(*id);
            }
        }
        let mut linked_compliance_ids = self.linked_compliance_ids.clone();
        for id in compliance_ids {
            if !linked_compliance_ids.contains(id) {
                linked_compliance_ids.push(*id);
            }
        }

        Self {
            request_id: Uuid::new_v4(),
            linked_memory_ids,
            linked_compliance_ids,
            supersedes: Some(self.request_id),
            idempotency_key: None,
            created_at: now,
            seq: 0,
            ..self.clone()
        }
    }
}

/// Chain-resolution failure. Surfaced as a replay-integrity error rather
/// than a panic or an infinite walk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("supersede chain starting at {start} exceeds depth {max}; possible cycle")]
    DepthExceeded { start: Uuid, max: usize },

    #[error("supersede chain starting at {start} revisits row {repeated}")]
    CycleDetected { start: Uuid, repeated: Uuid },
}

/// Index chain rows by the row they supersede.
///
/// The store enforces at most one successor per row (unique index), so a
/// well-formed input has unique keys; a corrupted one keeps the first
/// successor seen, and resolution then reports the cycle or depth overflow.
pub fn successor_index(rows: &[X402Request]) -> HashMap<Uuid, &X402Request> {
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        if let Some(predecessor) = row.supersedes {
            index.entry(predecessor).or_insert(row);
        }
    }
    index
}

/// Walk a supersede chain from `start` to its tip.
///
/// Follows the newest-successor link until no row supersedes the current
/// one, visiting at most [`MAX_CHAIN_DEPTH`] rows. A revisited row or an
/// over-deep chain is reported as a [`ChainError`], never looped on.
pub fn resolve_chain_tip<'a>(
    start: &'a X402Request,
    successors: &HashMap<Uuid, &'a X402Request>,
) -> Result<&'a X402Request, ChainError> {
    let mut current = start;
    let mut visited = std::collections::HashSet::with_capacity(8);
    visited.insert(current.request_id);

    for _ in 0..MAX_CHAIN_DEPTH {
        match successors.get(&current.request_id) {
            Some(next) => {
                if !visited.insert(next.request_id) {
                    return Err(ChainError::CycleDetected {
                        start: start.request_id,
                        repeated: next.request_id,
                    });
                }
                current = next;
            }
            None => return Ok(current),
        }
    }

    Err(ChainError::DepthExceeded {
        start: start.request_id,
        max: MAX_CHAIN_DEPTH,
    })
}
