//! Idempotent-creation resolution.
//!
//! The store-level uniqueness constraint on (project, idempotency key) is
//! the single source of truth for concurrent creations: exactly one insert
//! succeeds. This module implements the loser's side of that race: detect
//! the conflict, re-read the winning row, and decide between "replay of the
//! same logical request" and "key reuse with a different payload".
//!
//! The resolver is generic over the insert and re-read operations so the
//! request ledger and the receipt tracker share one implementation, and so
//! the race logic is testable without a database.

use std::future::Future;

use crate::crypto::Hash256;

use super::error::{LedgerError, Result};

/// Outcome of an idempotent create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// This call inserted the row.
    Created(T),
    /// Another call (possibly concurrent, possibly long past) inserted a row
    /// with the same key and the same logical payload; its row is returned.
    Replayed(T),
}

impl<T> Resolution<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Created(v) | Self::Replayed(v) => v,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Resolve an insert against a uniqueness constraint.
///
/// `insert` must return `Ok(None)` when the constraint rejected the row
/// (e.g. `INSERT .. ON CONFLICT DO NOTHING RETURNING ..`), and `reread`
/// must fetch the current winner for the same key. `fingerprint` is the
/// canonical hash of this caller's logical payload; `fingerprint_of`
/// recomputes it for the winning row.
pub async fn resolve_idempotent<T, I, FI, R, FR>(
    idempotency_key: &str,
    fingerprint: Hash256,
    fingerprint_of: impl Fn(&T) -> Result<Hash256>,
    insert: I,
    reread: R,
) -> Result<Resolution<T>>
where
    I: FnOnce() -> FI,
    FI: Future<Output = Result<Option<T>>>,
    R: FnOnce() -> FR,
    FR: Future<Output = Result<Option<T>>>,
{
    if let Some(row) = insert().await? {
        return Ok(Resolution::Created(row));
    }

    // Lost the race (or the key was used before). The winner is durably
    // committed, so the re-read must observe it.
    let winner = reread().await?.ok_or_else(|| {
        LedgerError::Internal(format!(
            "idempotency winner for key {idempotency_key:?} not readable after conflict"
        ))
    })?;

    if fingerprint_of(&winner)? == fingerprint {
        Ok(Resolution::Replayed(winner))
    } else {
        Err(LedgerError::IdempotencyConflict {
            idempotency_key: idempotency_key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(b: u8) -> Hash256 {
        [b; 32]
    }

    #[tokio::test]
    async fn test_winner_path() {
        let resolution = resolve_idempotent(
            "key",
            fp(1),
            |_row: &u32| Ok(fp(1)),
            || async { Ok(Some(42u32)) },
            || async { panic!("winner never re-reads") },
        )
        .await
        .unwrap();

        assert_eq!(resolution, Resolution::Created(42));
        assert!(resolution.was_created());
    }

    #[tokio::test]
    async fn test_loser_replays_matching_payload() {
        let resolution = resolve_idempotent(
            "key",
            fp(1),
            |_row: &u32| Ok(fp(1)),
            || async { Ok(None) },
            || async { Ok(Some(7u32)) },
        )
        .await
        .unwrap();

        assert_eq!(resolution, Resolution::Replayed(7));
        assert!(!resolution.was_created());
    }

    #[tokio::test]
    async fn test_loser_conflicts_on_different_payload() {
        let err = resolve_idempotent(
            "key",
            fp(1),
            |_row: &u32| Ok(fp(2)),
            || async { Ok(None) },
            || async { Ok(Some(7u32)) },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::IdempotencyConflict { idempotency_key } if idempotency_key == "key"
        ));
    }

    #[tokio::test]
    async fn test_missing_winner_is_internal_error() {
        let err = resolve_idempotent(
            "key",
            fp(1),
            |_row: &u32| Ok(fp(1)),
            || async { Ok(None) },
            || async { Ok(None) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, LedgerError::Internal(_)));
    }
}
