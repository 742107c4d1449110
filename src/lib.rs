//! x402 Ledger Library
//!
//! Append-only payment-authorization ledger and audit trail for
//! agent-native fintech workflows: DID signature verification, idempotent
//! creation, supersede-chain lifecycles, uniform append-only enforcement,
//! and deterministic run replay.
//!
//! ## Modules
//!
//! - [`domain`] - Core record types (agents, requests, receipts, audit logs)
//! - [`crypto`] - DID parsing, canonical hashing, signature verification
//! - [`infra`] - Store traits, PostgreSQL implementations, idempotency
//! - [`replay`] - Run replay aggregation and validation
//! - [`auth`] - API-key authentication middleware
//! - [`api`] - REST routes, wire errors, immutability gate
//! - [`metrics`] - In-process counters
//! - [`server`] - Configuration and bootstrap

pub mod api;
pub mod auth;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod metrics;
pub mod migrations;
pub mod replay;
pub mod server;

// Re-export commonly used types
pub use domain::{
    Agent, AgentMemory, Amount, ComplianceEvent, PaymentReceipt, ProjectId, ReplayValidation,
    RequestStatus, RunId, RunReplay, X402Request,
};

pub use infra::{LedgerError, Result};
