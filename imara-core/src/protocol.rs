//! Wire protocol for the research stream
//!
//! One connection per session. The client sends a single [`SubmitRequest`]
//! once the connection is ready, then receives a sequence of JSON frames,
//! each tagged with a `type` discriminator:
//!
//! ```text
//! {"type": "start"}
//! {"type": "routing", "data": {"path": "standard", "confidence": 0.6}}
//! {"type": "agent_start", "agent": "researcher", "progress": 25}
//! {"type": "agent_complete", "agent": "researcher", "data": {...}, "progress": 50}
//! {"type": "complete", "data": {"metrics": {...}, ...}}
//! {"type": "error", "message": "..."}
//! ```
//!
//! Frames with an unknown `type` are reported as [`DecodeError::UnknownType`]
//! so callers can drop them without treating them as fatal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AgentId, AgentResult, FinalReport, RoutingDecision};

/// Event kinds understood by the decoder
pub const EVENT_TYPES: [&str; 6] = [
    "start",
    "routing",
    "agent_start",
    "agent_complete",
    "complete",
    "error",
];

/// Outbound submission, sent once per connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub query: String,
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Backend accepted the query and is initializing its agents
    Start {
        #[serde(default)]
        message: Option<String>,
    },

    Routing { data: RoutingDecision },

    AgentStart {
        agent: AgentId,
        #[serde(default)]
        progress: Option<i64>,
    },

    AgentComplete {
        agent: AgentId,
        data: AgentResult,
        #[serde(default)]
        progress: Option<i64>,
    },

    /// Terminal success
    Complete { data: FinalReport },

    /// Terminal failure reported by the backend
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

impl ServerEvent {
    /// The wire `type` of this event
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Start { .. } => "start",
            ServerEvent::Routing { .. } => "routing",
            ServerEvent::AgentStart { .. } => "agent_start",
            ServerEvent::AgentComplete { .. } => "agent_complete",
            ServerEvent::Complete { .. } => "complete",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Complete and error end the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerEvent::Complete { .. } | ServerEvent::Error { .. })
    }
}

/// Why an inbound frame was rejected
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Not JSON, or not a JSON object
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("frame has no string `type` field")]
    MissingType,

    #[error("unrecognized event type `{0}`")]
    UnknownType(String),

    /// Known type with a payload that does not fit it
    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode one inbound text frame
pub fn decode(text: &str) -> Result<ServerEvent, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    if !value.is_object() {
        return Err(DecodeError::Malformed("expected a JSON object".to_string()));
    }

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(DecodeError::MissingType)?
        .to_string();

    if !EVENT_TYPES.contains(&kind.as_str()) {
        return Err(DecodeError::UnknownType(kind));
    }

    serde_json::from_value(value).map_err(|source| DecodeError::InvalidPayload { kind, source })
}

/// Encode the outbound submission for a query
pub fn encode_submit(query: &str) -> String {
    serde_json::json!({ "query": query }).to_string()
}
