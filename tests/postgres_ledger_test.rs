//! PostgreSQL integration tests.
//!
//! These are ignored by default and are intended to run in CI (or locally)
//! with `DATABASE_URL` set:
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/x402_ledger_test cargo test -- --ignored
//! ```

mod common;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use common::{payment_payload, signed_request, test_agent, TestAgent};
use x402_ledger::domain::{
    PaymentReceipt, ProjectId, ReceiptStatus, RequestStatus, RunId, X402Request,
};
use x402_ledger::infra::{
    AgentStore, LedgerError, PgAgentStore, PgComplianceStore, PgMemoryStore, PgReceiptStore,
    PgReplayReader, PgX402RequestStore, ReceiptStore, ReplayReader, X402RequestStore,
};
use x402_ledger::replay::assemble;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .ok()?;
    x402_ledger::migrations::run_postgres(&pool).await.ok()?;
    Some(pool)
}

struct Harness {
    pool: PgPool,
    project_id: ProjectId,
    run_id: RunId,
    agent: TestAgent,
}

async fn harness() -> Option<Harness> {
    let pool = test_pool().await?;
    let project_id = ProjectId::new();
    let run_id = RunId::new();
    let mut agent = test_agent(project_id.0);
    agent.agent = PgAgentStore::new(pool.clone())
        .insert(&agent.agent)
        .await
        .expect("agent insert");
    Some(Harness {
        pool,
        project_id,
        run_id,
        agent,
    })
}

fn root_request(h: &Harness) -> X402Request {
    signed_request(
        &h.agent,
        h.run_id.0,
        payment_payload("1.500000"),
        Utc::now(),
    )
}

fn receipt_for(h: &Harness, request_id: Uuid, key: &str) -> PaymentReceipt {
    PaymentReceipt {
        receipt_id: Uuid::new_v4(),
        project_id: h.project_id,
        x402_request_id: request_id,
        from_agent_id: h.agent.agent.agent_id,
        to_agent_id: h.agent.agent.agent_id,
        amount: x402_ledger::domain::Amount::parse("1.500000").unwrap(),
        status: ReceiptStatus::Pending,
        transaction_hash: None,
        treasury_source: "treasury-main".to_string(),
        treasury_destination: "treasury-agent".to_string(),
        idempotency_key: key.to_string(),
        supersedes: None,
        created_at: Utc::now(),
        confirmed_at: None,
        seq: 0,
    }
}

// ============================================================================
// Idempotency
// ============================================================================

#[tokio::test]
#[ignore]
async fn concurrent_same_key_inserts_yield_one_row() {
    let Some(h) = harness().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let store = PgX402RequestStore::new(h.pool.clone());

    let mut a = root_request(&h);
    a.idempotency_key = Some("race-key".to_string());
    let mut b = root_request(&h);
    b.idempotency_key = Some("race-key".to_string());

    let (ra, rb) = tokio::join!(store.insert_root(&a), store.insert_root(&b));
    let ra = ra.expect("insert a");
    let rb = rb.expect("insert b");

    // Exactly one insert wins; the loser observes the conflict as None.
    assert!(ra.is_some() ^ rb.is_some());

    let winner = store
        .get_by_idempotency_key(h.project_id, "race-key")
        .await
        .expect("reread")
        .expect("winner exists");
    let winner_id = ra.or(rb).unwrap().request_id;
    assert_eq!(winner.request_id, winner_id);
}

// ============================================================================
// Supersede chains
// ============================================================================

#[tokio::test]
#[ignore]
async fn chain_resolution_follows_to_tip() {
    let Some(h) = harness().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let store = PgX402RequestStore::new(h.pool.clone());

    let a = store
        .insert_root(&root_request(&h))
        .await
        .expect("insert")
        .expect("created");
    let b = store
        .insert_successor(&a.successor_with_status(RequestStatus::Approved, Utc::now()))
        .await
        .expect("approve");
    let c = store
        .insert_successor(&b.successor_with_status(RequestStatus::Completed, Utc::now()))
        .await
        .expect("complete");

    // Resolving from the root reaches the newest row in the chain.
    let effective = store
        .resolve_effective(h.project_id, a.request_id)
        .await
        .expect("resolve");
    assert_eq!(effective.request_id, c.request_id);
    assert_eq!(effective.status, RequestStatus::Completed);
}

#[tokio::test]
#[ignore]
async fn second_successor_loses_the_race() {
    let Some(h) = harness().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let store = PgX402RequestStore::new(h.pool.clone());

    let a = store
        .insert_root(&root_request(&h))
        .await
        .expect("insert")
        .expect("created");
    store
        .insert_successor(&a.successor_with_status(RequestStatus::Approved, Utc::now()))
        .await
        .expect("first successor");

    let err = store
        .insert_successor(&a.successor_with_status(RequestStatus::Rejected, Utc::now()))
        .await
        .expect_err("second successor must fail");
    assert!(matches!(err, LedgerError::AlreadySuperseded { .. }));
}

// ============================================================================
// Immutability triggers
// ============================================================================

#[tokio::test]
#[ignore]
async fn update_and_delete_are_rejected_by_triggers() {
    let Some(h) = harness().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let store = PgX402RequestStore::new(h.pool.clone());
    let a = store
        .insert_root(&root_request(&h))
        .await
        .expect("insert")
        .expect("created");

    let update = sqlx::query("UPDATE x402_requests SET status = 'APPROVED' WHERE request_id = $1")
        .bind(a.request_id)
        .execute(&h.pool)
        .await;
    let update_err = update.expect_err("update must be rejected");
    assert!(update_err.to_string().contains("IMMUTABLE_RECORD"));

    let delete = sqlx::query("DELETE FROM x402_requests WHERE request_id = $1")
        .bind(a.request_id)
        .execute(&h.pool)
        .await;
    let delete_err = delete.expect_err("delete must be rejected");
    assert!(delete_err.to_string().contains("IMMUTABLE_RECORD"));

    // The row is untouched.
    let reread = store
        .get(h.project_id, a.request_id)
        .await
        .expect("get")
        .expect("still there");
    assert_eq!(reread.status, RequestStatus::Pending);
}

#[tokio::test]
#[ignore]
async fn every_protected_table_rejects_mutation() {
    let Some(h) = harness().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    for table in [
        "agents",
        "x402_requests",
        "payment_receipts",
        "compliance_events",
        "agent_memories",
    ] {
        let sql = format!("DELETE FROM {table}");
        match sqlx::query(&sql).execute(&h.pool).await {
            // No rows matched: the trigger is FOR EACH ROW, so an empty
            // table deletes nothing and errors nothing; insert coverage for
            // the populated tables comes from the other tests.
            Ok(result) => assert_eq!(result.rows_affected(), 0, "{table} allowed a delete"),
            Err(e) => assert!(
                e.to_string().contains("IMMUTABLE_RECORD"),
                "{table} failed with unexpected error: {e}"
            ),
        }
    }
}

// ============================================================================
// Receipts
// ============================================================================

#[tokio::test]
#[ignore]
async fn amount_string_round_trips_exactly() {
    let Some(h) = harness().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let requests = PgX402RequestStore::new(h.pool.clone());
    let receipts = PgReceiptStore::new(h.pool.clone());

    let a = requests
        .insert_root(&root_request(&h))
        .await
        .expect("insert")
        .expect("created");
    requests
        .insert_successor(&a.successor_with_status(RequestStatus::Approved, Utc::now()))
        .await
        .expect("approve");

    let stored = receipts
        .insert_root(&receipt_for(&h, a.request_id, "amount-key"))
        .await
        .expect("insert receipt")
        .expect("created");

    let reread = receipts
        .get(h.project_id, stored.receipt_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(reread.amount.as_str(), "1.500000");
}

#[tokio::test]
#[ignore]
async fn receipt_chain_confirms_with_transaction_hash() {
    let Some(h) = harness().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let requests = PgX402RequestStore::new(h.pool.clone());
    let receipts = PgReceiptStore::new(h.pool.clone());

    let a = requests
        .insert_root(&root_request(&h))
        .await
        .expect("insert")
        .expect("created");
    requests
        .insert_successor(&a.successor_with_status(RequestStatus::Approved, Utc::now()))
        .await
        .expect("approve");

    let root = receipts
        .insert_root(&receipt_for(&h, a.request_id, "confirm-key"))
        .await
        .expect("insert")
        .expect("created");
    receipts
        .insert_successor(&root.successor_with_status(
            ReceiptStatus::Confirmed,
            Some("0xdeadbeef".to_string()),
            Utc::now(),
        ))
        .await
        .expect("confirm");

    let effective = receipts
        .resolve_effective(h.project_id, root.receipt_id)
        .await
        .expect("resolve");
    assert_eq!(effective.status, ReceiptStatus::Confirmed);
    assert_eq!(effective.transaction_hash.as_deref(), Some("0xdeadbeef"));
    assert!(effective.confirmed_at.is_some());
}

// ============================================================================
// Replay snapshot
// ============================================================================

#[tokio::test]
#[ignore]
async fn replay_snapshot_assembles_run() {
    let Some(h) = harness().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let requests = PgX402RequestStore::new(h.pool.clone());
    let memories = PgMemoryStore::new(h.pool.clone());
    let compliance = PgComplianceStore::new(h.pool.clone());

    use x402_ledger::domain::{
        AgentMemory, ComplianceEvent, ComplianceEventType, ComplianceOutcome, MemoryType,
    };
    use x402_ledger::infra::{ComplianceStore, MemoryStore};

    let m = memories
        .insert(&AgentMemory {
            memory_id: Uuid::new_v4(),
            project_id: h.project_id,
            agent_id: h.agent.agent.agent_id,
            run_id: h.run_id,
            memory_type: MemoryType::Observation,
            content: serde_json::json!({"note": "balance checked"}),
            metadata: serde_json::json!({}),
            namespace: "default".to_string(),
            created_at: Utc::now(),
            seq: 0,
        })
        .await
        .expect("memory insert");

    let c = compliance
        .insert(&ComplianceEvent {
            event_id: Uuid::new_v4(),
            project_id: h.project_id,
            agent_id: h.agent.agent.agent_id,
            event_type: ComplianceEventType::KycVerification,
            outcome: ComplianceOutcome::Pass,
            risk_score: 0.02,
            details: serde_json::json!({}),
            run_id: h.run_id,
            created_at: Utc::now(),
            seq: 0,
        })
        .await
        .expect("compliance insert");

    let mut root = root_request(&h);
    root.linked_memory_ids = vec![m.memory_id];
    root.linked_compliance_ids = vec![c.event_id];
    requests
        .insert_root(&root)
        .await
        .expect("insert")
        .expect("created");

    let reader = PgReplayReader::new(h.pool.clone());
    let snapshot = reader
        .fetch_run_snapshot(h.project_id, h.run_id)
        .await
        .expect("snapshot");
    let replay = assemble(h.run_id, snapshot);

    assert!(replay.validation.agent_profile_exists);
    assert!(replay.validation.all_records_linked);
    assert!(replay.validation.chronological_order);
    assert_eq!(replay.timeline.len(), 3);
    assert_eq!(
        replay.agent_profile.as_ref().map(|a| a.did.clone()),
        Some(h.agent.agent.did.clone())
    );
}
