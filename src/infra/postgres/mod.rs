//! PostgreSQL-backed store implementations.
//!
//! Each store owns its own rows exclusively; cross-references are by ID
//! only. None of the implementations issue UPDATE or DELETE statements,
//! and the schema-level triggers would reject them if one ever did.

mod agents;
mod compliance;
mod memory;
mod receipts;
mod replay_reader;
mod x402_requests;

pub use agents::PgAgentStore;
pub use compliance::PgComplianceStore;
pub use memory::PgMemoryStore;
pub use receipts::PgReceiptStore;
pub use replay_reader::PgReplayReader;
pub use x402_requests::PgX402RequestStore;

use crate::infra::error::{LedgerError, Result};

/// Convert a stored 32-byte hash column into its fixed-size form.
pub(crate) fn hash_from_column(bytes: Vec<u8>) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| LedgerError::Internal("stored payload hash is not 32 bytes".to_string()))
}

/// Parse a stored status/outcome column.
pub(crate) fn parse_column<T>(value: &str, what: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| LedgerError::Internal(format!("corrupt {what} column: {e}")))
}
