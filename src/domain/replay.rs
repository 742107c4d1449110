//! Replay aggregate types.
//!
//! A run is never stored as its own row; the replay engine materializes it
//! on demand from the four ledgers and validates the result. The assembled
//! bundle is fully deterministic: the same stored rows always produce
//! byte-identical output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ts_millis, Agent, AgentMemory, ComplianceEvent, RunId, X402Request};

/// Kind of record referenced by a timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    AgentMemory,
    ComplianceEvent,
    X402Request,
}

/// One position in the merged run timeline.
///
/// Entries reference records by ID rather than embedding them; the full
/// records travel in the per-store arrays of [`RunReplay`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub record_type: RecordType,
    pub record_id: Uuid,

    #[serde(rename = "timestamp", with = "ts_millis")]
    pub created_at: DateTime<Utc>,
}

/// Validation flags computed during replay assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayValidation {
    /// The agent referenced by the run resolves to a registered profile
    pub agent_profile_exists: bool,

    /// Every memory/compliance ID referenced by an effective request's link
    /// sets resolves to a row in this run's snapshot
    pub all_records_linked: bool,

    /// Records were written in timestamp order: replaying by insertion
    /// order yields non-decreasing timestamps
    pub chronological_order: bool,

    /// Chain-resolution integrity failures encountered while resolving
    /// effective requests; partial audits stay inspectable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub integrity_errors: Vec<String>,
}

/// Raw rows fetched for one run at a single logical read point.
#[derive(Debug, Clone, Default)]
pub struct RunSnapshot {
    pub agent: Option<Agent>,
    pub memories: Vec<AgentMemory>,
    pub compliance_events: Vec<ComplianceEvent>,
    /// Every request-chain row whose run matches, roots and successors alike
    pub request_rows: Vec<X402Request>,
}

/// The assembled, validated replay bundle for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReplay {
    pub run_id: RunId,

    pub agent_profile: Option<Agent>,

    /// Memory records in timeline order
    pub agent_memory: Vec<AgentMemory>,

    /// Compliance records in timeline order
    pub compliance_events: Vec<ComplianceEvent>,

    /// Effective (chain-resolved) requests in timeline order
    pub x402_requests: Vec<X402Request>,

    /// Merged ordering across all three stores
    pub timeline: Vec<TimelineEntry>,

    pub validation: ReplayValidation,
}
