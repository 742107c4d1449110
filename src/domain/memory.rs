//! Agent memory audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ts_millis, AgentId, ProjectId, RunId};

/// Known memory kinds, with a fallback for unrecognized producers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MemoryType {
    Observation,
    Decision,
    ToolCall,
    Plan,
    Reflection,
    /// Unrecognized memory type, preserved verbatim
    Other(String),
}

impl From<String> for MemoryType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "observation" => Self::Observation,
            "decision" => Self::Decision,
            "tool_call" => Self::ToolCall,
            "plan" => Self::Plan,
            "reflection" => Self::Reflection,
            _ => Self::Other(s),
        }
    }
}

impl From<MemoryType> for String {
    fn from(t: MemoryType) -> Self {
        t.to_string()
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Observation => f.write_str("observation"),
            Self::Decision => f.write_str("decision"),
            Self::ToolCall => f.write_str("tool_call"),
            Self::Plan => f.write_str("plan"),
            Self::Reflection => f.write_str("reflection"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// One entry of an agent's working memory during a run. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMemory {
    pub memory_id: Uuid,
    pub project_id: ProjectId,
    pub agent_id: AgentId,
    pub run_id: RunId,
    pub memory_type: MemoryType,

    /// Opaque memory content
    pub content: serde_json::Value,

    /// Producer-supplied metadata
    pub metadata: serde_json::Value,

    /// Namespace for partitioning memories within an agent
    pub namespace: String,

    #[serde(rename = "timestamp", with = "ts_millis")]
    pub created_at: DateTime<Utc>,

    /// Insertion order, used as the replay tie-break
    #[serde(skip)]
    pub seq: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_type_fallback() {
        let t = MemoryType::from("dream".to_string());
        assert_eq!(t, MemoryType::Other("dream".to_string()));
        assert_eq!(serde_json::to_string(&t).unwrap(), r#""dream""#);
    }

    #[test]
    fn test_known_types_round_trip() {
        for s in ["observation", "decision", "tool_call", "plan", "reflection"] {
            let t = MemoryType::from(s.to_string());
            assert!(!matches!(t, MemoryType::Other(_)));
            assert_eq!(t.to_string(), s);
        }
    }
}
