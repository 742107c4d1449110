//! Run replay: deterministic reconstruction of one run's event history.
//!
//! The aggregator composes the four ledgers into a single validated
//! timeline. Assembly is a pure function of the snapshot, so given the same
//! stored rows it produces byte-identical output on every invocation;
//! that determinism is the entire point of the subsystem.
//!
//! Ordering: entries are merged by `(timestamp, record kind, seq)`. The
//! record-kind rank (memories, then compliance events, then requests)
//! breaks cross-store ties, since per-store sequence numbers are drawn from
//! independent counters and are only comparable within one store.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::domain::{
    resolve_chain_tip, successor_index, AgentId, AgentMemory, ComplianceEvent, ProjectId,
    RecordType, ReplayValidation, RunId, RunReplay, RunSnapshot, TimelineEntry, X402Request,
};
use crate::infra::{ReplayReader, Result};

/// Replay engine over an injected snapshot reader.
pub struct ReplayService {
    reader: Arc<dyn ReplayReader>,
}

impl ReplayService {
    pub fn new(reader: Arc<dyn ReplayReader>) -> Self {
        Self { reader }
    }

    /// Reconstruct one run as an ordered, validated bundle. Read-only.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn replay(&self, project_id: ProjectId, run_id: RunId) -> Result<RunReplay> {
        let snapshot = self.reader.fetch_run_snapshot(project_id, run_id).await?;
        Ok(assemble(run_id, snapshot))
    }
}

fn rank(record_type: RecordType) -> u8 {
    match record_type {
        RecordType::AgentMemory => 0,
        RecordType::ComplianceEvent => 1,
        RecordType::X402Request => 2,
    }
}

type OrderKey = (DateTime<Utc>, u8, i64);

/// The agent a run belongs to, resolved via the first record encountered.
pub fn first_agent_id(
    memories: &[AgentMemory],
    compliance_events: &[ComplianceEvent],
    requests: &[X402Request],
) -> Option<AgentId> {
    let mut first: Option<(OrderKey, AgentId)> = None;
    let mut consider = |key: OrderKey, agent_id: AgentId| match &first {
        Some((existing, _)) if *existing <= key => {}
        _ => first = Some((key, agent_id)),
    };

    for m in memories {
        consider((m.created_at, rank(RecordType::AgentMemory), m.seq), m.agent_id);
    }
    for c in compliance_events {
        consider(
            (c.created_at, rank(RecordType::ComplianceEvent), c.seq),
            c.agent_id,
        );
    }
    for r in requests {
        consider((r.created_at, rank(RecordType::X402Request), r.seq), r.agent_id);
    }

    first.map(|(_, agent_id)| agent_id)
}

/// Assemble a replay bundle from a snapshot. Pure; mutates nothing.
pub fn assemble(run_id: RunId, snapshot: RunSnapshot) -> RunReplay {
    let RunSnapshot {
        agent,
        mut memories,
        mut compliance_events,
        request_rows,
    } = snapshot;

    // Resolve every supersede chain present in the run to its effective tip.
    // Corrupt chains are reported in the validation object so the rest of
    // the audit stays inspectable.
    let mut integrity_errors = Vec::new();
    let successors = successor_index(&request_rows);
    let mut effective: Vec<X402Request> = Vec::new();
    for root in request_rows.iter().filter(|r| r.supersedes.is_none()) {
        match resolve_chain_tip(root, &successors) {
            Ok(tip) => effective.push(tip.clone()),
            Err(e) => integrity_errors.push(e.to_string()),
        }
    }
    // Successor rows whose predecessor lies outside the snapshot have no
    // root here; treat each as its own chain start so the record is not
    // silently dropped from the audit.
    let known_rows: HashSet<Uuid> = request_rows.iter().map(|r| r.request_id).collect();
    for orphan in request_rows
        .iter()
        .filter(|r| r.supersedes.is_some_and(|p| !known_rows.contains(&p)))
    {
        match resolve_chain_tip(orphan, &successors) {
            Ok(tip) => {
                if !effective.iter().any(|e| e.request_id == tip.request_id) {
                    effective.push(tip.clone());
                }
            }
            Err(e) => integrity_errors.push(e.to_string()),
        }
    }

    // Chronological-order validation compares insertion order against
    // timestamp order per store: a record committed after another but
    // stamped earlier means the write path emitted out-of-order data.
    let chronological_order = in_timestamp_order(&memories, |m| (m.created_at, m.seq))
        && in_timestamp_order(&compliance_events, |c| (c.created_at, c.seq))
        && in_timestamp_order(&request_rows, |r| (r.created_at, r.seq));

    // Link validation: every ID referenced by an effective request's link
    // sets must resolve to a row in this run's snapshot.
    let memory_ids: HashSet<Uuid> = memories.iter().map(|m| m.memory_id).collect();
    let compliance_ids: HashSet<Uuid> = compliance_events.iter().map(|c| c.event_id).collect();
    let all_records_linked = effective.iter().all(|r| {
        r.linked_memory_ids.iter().all(|id| memory_ids.contains(id))
            && r.linked_compliance_ids
                .iter()
                .all(|id| compliance_ids.contains(id))
    });

    memories.sort_by_key(|m| (m.created_at, m.seq));
    compliance_events.sort_by_key(|c| (c.created_at, c.seq));
    effective.sort_by_key(|r| (r.created_at, r.seq));

    let mut timeline: Vec<(OrderKey, TimelineEntry)> = Vec::with_capacity(
        memories.len() + compliance_events.len() + effective.len(),
    );
    for m in &memories {
        timeline.push((
            (m.created_at, rank(RecordType::AgentMemory), m.seq),
            TimelineEntry {
                record_type: RecordType::AgentMemory,
                record_id: m.memory_id,
                created_at: m.created_at,
            },
        ));
    }
    for c in &compliance_events {
        timeline.push((
            (c.created_at, rank(RecordType::ComplianceEvent), c.seq),
            TimelineEntry {
                record_type: RecordType::ComplianceEvent,
                record_id: c.event_id,
                created_at: c.created_at,
            },
        ));
    }
    for r in &effective {
        timeline.push((
            (r.created_at, rank(RecordType::X402Request), r.seq),
            TimelineEntry {
                record_type: RecordType::X402Request,
                record_id: r.request_id,
                created_at: r.created_at,
            },
        ));
    }
    timeline.sort_by(|a, b| a.0.cmp(&b.0));

    let validation = ReplayValidation {
        agent_profile_exists: agent.is_some(),
        all_records_linked,
        chronological_order,
        integrity_errors,
    };

    RunReplay {
        run_id,
        agent_profile: agent,
        agent_memory: memories,
        compliance_events,
        x402_requests: effective,
        timeline: timeline.into_iter().map(|(_, e)| e).collect(),
        validation,
    }
}

fn in_timestamp_order<T>(rows: &[T], key: impl Fn(&T) -> (DateTime<Utc>, i64)) -> bool {
    let mut by_seq: Vec<(DateTime<Utc>, i64)> = rows.iter().map(key).collect();
    by_seq.sort_by_key(|(_, seq)| *seq);
    by_seq.windows(2).all(|w| w[0].0 <= w[1].0)
}
