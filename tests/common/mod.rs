//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use x402_ledger::crypto::{signature_to_hex, AgentSigningKey};
use x402_ledger::domain::{
    Agent, AgentId, AgentScope, ProjectId, RequestStatus, RunId, TaskId, X402Request,
};

/// Test project ID
pub fn test_project_id() -> Uuid {
    Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap()
}

/// Test run ID
pub fn test_run_id() -> Uuid {
    Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap()
}

/// Fixed timestamp helper
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, h, m, 0).unwrap()
}

/// A payment payload an agent would sign
pub fn payment_payload(amount: &str) -> serde_json::Value {
    json!({
        "action": "transfer",
        "amount": amount,
        "currency": "USDC",
        "recipient": "agent-treasury",
        "reason": "invoice settlement"
    })
}

/// A registered agent plus its signing key
pub struct TestAgent {
    pub key: AgentSigningKey,
    pub agent: Agent,
}

/// Build an agent identity with a fresh keypair
pub fn test_agent(project_id: Uuid) -> TestAgent {
    let key = AgentSigningKey::generate();
    let agent = Agent {
        agent_id: AgentId::new(),
        project_id: ProjectId::from_uuid(project_id),
        did: key.did(),
        role: "treasurer".to_string(),
        display_name: "Test Treasurer".to_string(),
        scope: AgentScope::Project,
        created_at: at(9, 0),
        seq: 0,
    };
    TestAgent { key, agent }
}

/// Sign `payload` and return the signature hex the wire expects
pub fn sign(key: &AgentSigningKey, payload: &serde_json::Value) -> String {
    signature_to_hex(&key.sign_payload(payload).unwrap())
}

/// Build a signed, verified chain-root request row
pub fn signed_request(
    agent: &TestAgent,
    run_id: Uuid,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
) -> X402Request {
    let payload_hash = x402_ledger::crypto::payload_hash(&payload).unwrap();
    X402Request {
        request_id: Uuid::new_v4(),
        project_id: agent.agent.project_id,
        agent_id: agent.agent.agent_id,
        task_id: TaskId::new(),
        run_id: RunId::from_uuid(run_id),
        signature: sign(&agent.key, &payload),
        request_payload: payload,
        payload_hash,
        signature_verified: true,
        status: RequestStatus::Pending,
        linked_memory_ids: vec![],
        linked_compliance_ids: vec![],
        supersedes: None,
        idempotency_key: None,
        created_at,
        seq: 0,
    }
}
