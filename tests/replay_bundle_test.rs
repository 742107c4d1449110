//! Replay bundle assembly tests against the wire contract.
//!
//! These exercise the pure assembler end to end: ordering, chain
//! resolution, link validation, and the exact serialized shape callers
//! depend on. No database required.

mod common;

use serde_json::json;
use uuid::Uuid;

use common::{at, payment_payload, signed_request, test_agent, test_project_id, test_run_id};
use x402_ledger::domain::{
    AgentMemory, ComplianceEvent, ComplianceEventType, ComplianceOutcome, MemoryType, ProjectId,
    RequestStatus, RunId, RunSnapshot,
};
use x402_ledger::replay::assemble;

fn memory_at(
    project_id: Uuid,
    agent_id: x402_ledger::domain::AgentId,
    run_id: Uuid,
    h: u32,
    m: u32,
    seq: i64,
) -> AgentMemory {
    AgentMemory {
        memory_id: Uuid::new_v4(),
        project_id: ProjectId::from_uuid(project_id),
        agent_id,
        run_id: RunId::from_uuid(run_id),
        memory_type: MemoryType::Decision,
        content: json!({"decision": "approve transfer"}),
        metadata: json!({}),
        namespace: "default".to_string(),
        created_at: at(h, m),
        seq,
    }
}

fn compliance_at(
    project_id: Uuid,
    agent_id: x402_ledger::domain::AgentId,
    run_id: Uuid,
    h: u32,
    m: u32,
    seq: i64,
) -> ComplianceEvent {
    ComplianceEvent {
        event_id: Uuid::new_v4(),
        project_id: ProjectId::from_uuid(project_id),
        agent_id,
        event_type: ComplianceEventType::AmlScreening,
        outcome: ComplianceOutcome::Pass,
        risk_score: 0.05,
        details: json!({"provider": "internal"}),
        run_id: RunId::from_uuid(run_id),
        created_at: at(h, m),
        seq,
    }
}

#[test]
fn replay_bundle_has_wire_shape() {
    let project_id = test_project_id();
    let run_id = test_run_id();
    let agent = test_agent(project_id);

    let m = memory_at(project_id, agent.agent.agent_id, run_id, 10, 5, 1);
    let c = compliance_at(project_id, agent.agent.agent_id, run_id, 10, 45, 1);
    let mut r = signed_request(&agent, run_id, payment_payload("1.500000"), at(10, 50));
    r.seq = 1;
    r.linked_memory_ids = vec![m.memory_id];
    r.linked_compliance_ids = vec![c.event_id];

    let replay = assemble(
        RunId::from_uuid(run_id),
        RunSnapshot {
            agent: Some(agent.agent.clone()),
            memories: vec![m.clone()],
            compliance_events: vec![c.clone()],
            request_rows: vec![r.clone()],
        },
    );

    let wire = serde_json::to_value(&replay).unwrap();

    // Top-level contract fields
    assert_eq!(wire["run_id"], json!(run_id));
    assert_eq!(wire["agent_profile"]["did"], json!(agent.agent.did));
    assert_eq!(wire["agent_memory"].as_array().unwrap().len(), 1);
    assert_eq!(wire["compliance_events"].as_array().unwrap().len(), 1);
    assert_eq!(wire["x402_requests"].as_array().unwrap().len(), 1);

    // Validation object
    assert_eq!(
        wire["validation"],
        json!({
            "agent_profile_exists": true,
            "all_records_linked": true,
            "chronological_order": true,
        })
    );

    // Timestamps carry millisecond precision
    assert_eq!(wire["agent_memory"][0]["timestamp"], "2026-01-15T10:05:00.000Z");
    assert_eq!(
        wire["compliance_events"][0]["timestamp"],
        "2026-01-15T10:45:00.000Z"
    );
    assert_eq!(wire["x402_requests"][0]["timestamp"], "2026-01-15T10:50:00.000Z");

    // Merged timeline is memory, compliance, request
    let kinds: Vec<&str> = wire["timeline"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["record_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["agent_memory", "compliance_event", "x402_request"]);
}

#[test]
fn replay_is_byte_identical_across_invocations() {
    let project_id = test_project_id();
    let run_id = test_run_id();
    let agent = test_agent(project_id);

    let snapshot = RunSnapshot {
        agent: Some(agent.agent.clone()),
        memories: vec![
            memory_at(project_id, agent.agent.agent_id, run_id, 10, 0, 2),
            memory_at(project_id, agent.agent.agent_id, run_id, 10, 0, 1),
        ],
        compliance_events: vec![compliance_at(project_id, agent.agent.agent_id, run_id, 10, 0, 1)],
        request_rows: vec![signed_request(
            &agent,
            run_id,
            payment_payload("2.000000"),
            at(10, 0),
        )],
    };

    let a = serde_json::to_vec(&assemble(RunId::from_uuid(run_id), snapshot.clone())).unwrap();
    let b = serde_json::to_vec(&assemble(RunId::from_uuid(run_id), snapshot)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn replay_resolves_multiple_chains_independently() {
    let project_id = test_project_id();
    let run_id = test_run_id();
    let agent = test_agent(project_id);

    // Chain 1: PENDING -> APPROVED -> COMPLETED
    let a = signed_request(&agent, run_id, payment_payload("1.00"), at(10, 0));
    let mut b = a.successor_with_status(RequestStatus::Approved, at(10, 10));
    b.seq = 2;
    let mut c = b.successor_with_status(RequestStatus::Completed, at(10, 20));
    c.seq = 3;

    // Chain 2: PENDING -> REJECTED
    let mut d = signed_request(&agent, run_id, payment_payload("9.99"), at(10, 5));
    d.seq = 4;
    let mut e = d.successor_with_status(RequestStatus::Rejected, at(10, 15));
    e.seq = 5;

    let replay = assemble(
        RunId::from_uuid(run_id),
        RunSnapshot {
            agent: Some(agent.agent.clone()),
            memories: vec![],
            compliance_events: vec![],
            request_rows: vec![a, b, c.clone(), d, e.clone()],
        },
    );

    assert_eq!(replay.x402_requests.len(), 2);
    let statuses: Vec<RequestStatus> = replay.x402_requests.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![RequestStatus::Rejected, RequestStatus::Completed]
    );
    // Timeline carries effective rows only, ordered by their own timestamps.
    let ids: Vec<Uuid> = replay.timeline.iter().map(|t| t.record_id).collect();
    assert_eq!(ids, vec![e.request_id, c.request_id]);
}

#[test]
fn dangling_link_is_reported_but_bundle_stays_complete() {
    let project_id = test_project_id();
    let run_id = test_run_id();
    let agent = test_agent(project_id);

    let m = memory_at(project_id, agent.agent.agent_id, run_id, 10, 5, 1);
    let mut r = signed_request(&agent, run_id, payment_payload("1.00"), at(10, 50));
    r.linked_memory_ids = vec![m.memory_id];
    r.linked_compliance_ids = vec![Uuid::new_v4()]; // never stored

    let replay = assemble(
        RunId::from_uuid(run_id),
        RunSnapshot {
            agent: Some(agent.agent.clone()),
            memories: vec![m],
            compliance_events: vec![],
            request_rows: vec![r],
        },
    );

    assert!(!replay.validation.all_records_linked);
    assert!(replay.validation.agent_profile_exists);
    assert!(replay.validation.chronological_order);
    assert_eq!(replay.timeline.len(), 2);
}

#[test]
fn link_union_survives_chain_resolution() {
    let project_id = test_project_id();
    let run_id = test_run_id();
    let agent = test_agent(project_id);

    let m1 = memory_at(project_id, agent.agent.agent_id, run_id, 10, 1, 1);
    let m2 = memory_at(project_id, agent.agent.agent_id, run_id, 10, 2, 2);

    let root = signed_request(&agent, run_id, payment_payload("3.00"), at(10, 0));
    let mut linked_once = root.successor_with_links(&[m1.memory_id], &[], at(10, 5));
    linked_once.seq = 2;
    let mut linked_twice = linked_once.successor_with_links(&[m2.memory_id], &[], at(10, 6));
    linked_twice.seq = 3;

    let replay = assemble(
        RunId::from_uuid(run_id),
        RunSnapshot {
            agent: Some(agent.agent.clone()),
            memories: vec![m1.clone(), m2.clone()],
            compliance_events: vec![],
            request_rows: vec![root, linked_once, linked_twice],
        },
    );

    assert_eq!(replay.x402_requests.len(), 1);
    assert_eq!(
        replay.x402_requests[0].linked_memory_ids,
        vec![m1.memory_id, m2.memory_id]
    );
    assert!(replay.validation.all_records_linked);
}
