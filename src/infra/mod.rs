//! Infrastructure: errors, idempotency resolution, store traits, and the
//! PostgreSQL implementations.

pub mod error;
pub mod idempotency;
pub mod postgres;
pub mod traits;

pub use error::{is_unique_violation, LedgerError, Result};
pub use idempotency::{resolve_idempotent, Resolution};
pub use postgres::{
    PgAgentStore, PgComplianceStore, PgMemoryStore, PgReceiptStore, PgReplayReader,
    PgX402RequestStore,
};
pub use traits::{
    AgentStore, ComplianceStore, MemoryStore, ReceiptStore, ReplayReader, X402RequestStore,
};
