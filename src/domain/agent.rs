//! Agent identity records.
//!
//! An agent is registered once with its DID and never mutated afterwards;
//! every other record references it by DID or agent id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ts_millis, AgentId, ProjectId};

/// Visibility scope of an agent identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentScope {
    /// Shared across all projects
    System,
    /// Scoped to one project
    Project,
    /// Ephemeral, scoped to a single run
    Run,
}

impl std::fmt::Display for AgentScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Project => write!(f, "project"),
            Self::Run => write!(f, "run"),
        }
    }
}

impl std::str::FromStr for AgentScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "project" => Ok(Self::Project),
            "run" => Ok(Self::Run),
            other => Err(format!("unknown agent scope: {other}")),
        }
    }
}

/// Registered agent identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent ID
    pub agent_id: AgentId,

    /// Owning project
    pub project_id: ProjectId,

    /// Decentralized identifier; unique across the whole service
    pub did: String,

    /// Role label, e.g. "treasurer" or "analyst"
    pub role: String,

    /// Human-readable display name
    pub display_name: String,

    /// Visibility scope
    pub scope: AgentScope,

    /// Registration time
    #[serde(with = "ts_millis")]
    pub created_at: DateTime<Utc>,

    /// Insertion order, used as the replay tie-break
    #[serde(skip)]
    pub seq: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_round_trip() {
        for scope in [AgentScope::System, AgentScope::Project, AgentScope::Run] {
            let s = scope.to_string();
            assert_eq!(s.parse::<AgentScope>().unwrap(), scope);
        }
    }

    #[test]
    fn test_scope_rejects_unknown() {
        assert!("global".parse::<AgentScope>().is_err());
    }
}
