//! Compliance audit events.
//!
//! Free-form audit records of regulatory/risk checks. Other components link
//! to them by `event_id` only; the store itself never interprets `details`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ts_millis, AgentId, ProjectId, RunId};

/// Known compliance check kinds, with a fallback for event types this
/// service has not been taught about. Keeping the set closed lets downstream
/// code match exhaustively while still accepting third-party producers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComplianceEventType {
    KycVerification,
    AmlScreening,
    SanctionsScreening,
    TransactionRisk,
    PolicyCheck,
    /// Unrecognized event type, preserved verbatim
    Other(String),
}

impl From<String> for ComplianceEventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "kyc_verification" => Self::KycVerification,
            "aml_screening" => Self::AmlScreening,
            "sanctions_screening" => Self::SanctionsScreening,
            "transaction_risk" => Self::TransactionRisk,
            "policy_check" => Self::PolicyCheck,
            _ => Self::Other(s),
        }
    }
}

impl From<ComplianceEventType> for String {
    fn from(t: ComplianceEventType) -> Self {
        t.to_string()
    }
}

impl std::fmt::Display for ComplianceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KycVerification => f.write_str("kyc_verification"),
            Self::AmlScreening => f.write_str("aml_screening"),
            Self::SanctionsScreening => f.write_str("sanctions_screening"),
            Self::TransactionRisk => f.write_str("transaction_risk"),
            Self::PolicyCheck => f.write_str("policy_check"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Outcome of a compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceOutcome {
    Pass,
    Fail,
    Pending,
    Escalated,
    Error,
}

impl std::fmt::Display for ComplianceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Pending => "PENDING",
            Self::Escalated => "ESCALATED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ComplianceOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(Self::Pass),
            "FAIL" => Ok(Self::Fail),
            "PENDING" => Ok(Self::Pending),
            "ESCALATED" => Ok(Self::Escalated),
            "ERROR" => Ok(Self::Error),
            other => Err(format!("unknown compliance outcome: {other}")),
        }
    }
}

/// Recorded outcome of a regulatory/risk check. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceEvent {
    pub event_id: Uuid,
    pub project_id: ProjectId,
    pub agent_id: AgentId,
    pub event_type: ComplianceEventType,
    pub outcome: ComplianceOutcome,

    /// Risk score in [0.0, 1.0]; validated on ingest
    pub risk_score: f64,

    /// Opaque check details
    pub details: serde_json::Value,

    pub run_id: RunId,

    #[serde(rename = "timestamp", with = "ts_millis")]
    pub created_at: DateTime<Utc>,

    /// Insertion order, used as the replay tie-break
    #[serde(skip)]
    pub seq: i64,
}

impl ComplianceEvent {
    /// Whether `score` is a valid risk score.
    pub fn valid_risk_score(score: f64) -> bool {
        score.is_finite() && (0.0..=1.0).contains(&score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_event_types_round_trip() {
        for s in [
            "kyc_verification",
            "aml_screening",
            "sanctions_screening",
            "transaction_risk",
            "policy_check",
        ] {
            let t = ComplianceEventType::from(s.to_string());
            assert!(!matches!(t, ComplianceEventType::Other(_)));
            assert_eq!(t.to_string(), s);
        }
    }

    #[test]
    fn test_unknown_event_type_preserved() {
        let t = ComplianceEventType::from("travel_rule_check".to_string());
        assert_eq!(
            t,
            ComplianceEventType::Other("travel_rule_check".to_string())
        );
        assert_eq!(t.to_string(), "travel_rule_check");

        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#""travel_rule_check""#);
    }

    #[test]
    fn test_risk_score_bounds() {
        assert!(ComplianceEvent::valid_risk_score(0.0));
        assert!(ComplianceEvent::valid_risk_score(1.0));
        assert!(ComplianceEvent::valid_risk_score(0.37));

        assert!(!ComplianceEvent::valid_risk_score(-0.01));
        assert!(!ComplianceEvent::valid_risk_score(1.01));
        assert!(!ComplianceEvent::valid_risk_score(f64::NAN));
        assert!(!ComplianceEvent::valid_risk_score(f64::INFINITY));
    }
}
