//! Settlement receipts.
//!
//! A receipt tracks the settlement of an authorized payment against the
//! treasury provider. Receipts follow the same append-only supersede-chain
//! pattern as requests: a status change inserts a successor row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{option_ts_millis, ts_millis, AgentId, Amount, ProjectId};

/// Settlement status of a payment receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    Pending,
    Confirmed,
    Failed,
    Refunded,
}

impl ReceiptStatus {
    /// Whether a transition from `self` to `next` is legal.
    ///
    /// `PENDING -> {CONFIRMED, FAILED, REFUNDED}` plus the post-settlement
    /// refund path `CONFIRMED -> REFUNDED`; `FAILED` and `REFUNDED` are
    /// terminal.
    pub fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Failed)
                | (Self::Pending, Self::Refunded)
                | (Self::Confirmed, Self::Refunded)
        )
    }
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ReceiptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "FAILED" => Ok(Self::Failed),
            "REFUNDED" => Ok(Self::Refunded),
            other => Err(format!("unknown receipt status: {other}")),
        }
    }
}

/// One immutable row of a settlement-receipt chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Unique ID of this row (not of the logical receipt)
    pub receipt_id: Uuid,

    pub project_id: ProjectId,

    /// The payment-authorization request this settles. Must chain-resolve
    /// to an APPROVED or COMPLETED effective status at creation time.
    pub x402_request_id: Uuid,

    pub from_agent_id: AgentId,
    pub to_agent_id: AgentId,

    /// Settled amount; fixed-precision decimal string, never a float
    pub amount: Amount,

    pub status: ReceiptStatus,

    /// Settlement transaction hash from the custody provider
    pub transaction_hash: Option<String>,

    /// Treasury account the funds leave
    pub treasury_source: String,

    /// Treasury account the funds arrive at
    pub treasury_destination: String,

    /// Concurrency anchor; unique per project among chain roots
    pub idempotency_key: String,

    /// Predecessor row in the supersede chain; `None` for chain roots
    pub supersedes: Option<Uuid>,

    #[serde(with = "ts_millis")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "option_ts_millis")]
    pub confirmed_at: Option<DateTime<Utc>>,

    /// Insertion order, used as the replay tie-break
    #[serde(skip)]
    pub seq: i64,
}

impl PaymentReceipt {
    /// Build the successor row expressing a settlement status change.
    ///
    /// `transaction_hash` and `confirmed_at` are carried forward unless the
    /// transition supplies new values (a `CONFIRMED` transition does both).
    pub fn successor_with_status(
        &self,
        new_status: ReceiptStatus,
        transaction_hash: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            receipt_id: Uuid::new_v4(),
            status: new_status,
            transaction_hash: transaction_hash.or_else(|| self.transaction_hash.clone()),
            supersedes: Some(self.receipt_id),
            created_at: now,
            confirmed_at: if new_status == ReceiptStatus::Confirmed {
                Some(now)
            } else {
                self.confirmed_at
            },
            seq: 0,
            ..self.clone()
        }
    }
}
