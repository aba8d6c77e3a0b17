//! Core domain types for imara
//!
//! These types describe one research session as the client sees it.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One end-to-end research request and its accumulated state |
//! | **Agent** | A named backend processing stage that produces one opaque result |
//! | **Routing decision** | The backend's choice of processing path, with a confidence score |
//! | **Final report** | The backend's complete report, kept verbatim for export |
//!
//! Agent results and the final report are backend-defined JSON. The client
//! keeps them opaque and only reads a few well-known fields for display.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::AgentResults;

// ============================================
// Agents
// ============================================

/// One of the fixed backend processing stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    Researcher,
    Coder,
    Reviewer,
    Presenter,
}

impl AgentId {
    /// All agents in pipeline order
    pub const ALL: [AgentId; 4] = [
        AgentId::Researcher,
        AgentId::Coder,
        AgentId::Reviewer,
        AgentId::Presenter,
    ];

    /// Returns the wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Researcher => "researcher",
            AgentId::Coder => "coder",
            AgentId::Reviewer => "reviewer",
            AgentId::Presenter => "presenter",
        }
    }

    /// Returns the display name for this agent
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentId::Researcher => "Researcher",
            AgentId::Coder => "Coder",
            AgentId::Reviewer => "Reviewer",
            AgentId::Presenter => "Presenter",
        }
    }

    /// Result field holding the text shown for this agent
    pub fn primary_field(&self) -> &'static str {
        match self {
            AgentId::Researcher => "summary",
            AgentId::Coder => "code",
            AgentId::Reviewer => "review",
            AgentId::Presenter => "final_report",
        }
    }

    /// Heading used when rendering this agent's result
    pub fn result_heading(&self) -> &'static str {
        match self {
            AgentId::Researcher => "Research Findings",
            AgentId::Coder => "Generated Code",
            AgentId::Reviewer => "Review Feedback",
            AgentId::Presenter => "Final Presentation",
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "researcher" | "Researcher" => Ok(AgentId::Researcher),
            "coder" | "Coder" => Ok(AgentId::Coder),
            "reviewer" | "Reviewer" => Ok(AgentId::Reviewer),
            "presenter" | "Presenter" => Ok(AgentId::Presenter),
            _ => Err(format!("unknown agent: {}", s)),
        }
    }
}

/// Opaque payload produced by one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentResult(pub serde_json::Value);

impl AgentResult {
    /// Read a string field, if the payload is an object that has one
    pub fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|v| v.as_str())
    }

    /// Text the UI shows for the agent that produced this result
    pub fn primary_text(&self, agent: AgentId) -> Option<&str> {
        self.text(agent.primary_field())
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

// ============================================
// Routing
// ============================================

/// The backend's choice of processing path
///
/// Informational only; the client never branches on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Path name (e.g. "standard", "deep_research", "code_focused")
    pub path: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Per-dimension scores the decision was based on
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scores: BTreeMap<String, f64>,
}

impl RoutingDecision {
    /// Confidence as a whole percentage, clamped to [0, 100]
    pub fn confidence_percent(&self) -> u8 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

// ============================================
// Reports
// ============================================

/// The complete report delivered by the terminal `complete` event
///
/// Kept verbatim so that export reproduces every backend-defined field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalReport(pub serde_json::Map<String, serde_json::Value>);

impl FinalReport {
    /// Extract the quality metrics block
    ///
    /// Fields with an unexpected type are treated as absent.
    pub fn metrics(&self) -> QualityMetrics {
        self.0
            .get("metrics")
            .map(QualityMetrics::from_value)
            .unwrap_or_default()
    }

    /// Read a top-level string field
    pub fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|v| v.as_str())
    }

    pub fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }
}

/// Research quality metrics reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub grade: Option<String>,
    pub overall_score: Option<f64>,
    pub paper_count: Option<u64>,
    /// Per-dimension scores (recency, relevance, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub breakdown: BTreeMap<String, f64>,
}

impl QualityMetrics {
    /// Lenient extraction from an arbitrary JSON value
    pub fn from_value(value: &serde_json::Value) -> Self {
        let grade = value
            .get("grade")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let overall_score = value.get("overall_score").and_then(|v| v.as_f64());
        let paper_count = value.get("paper_count").and_then(|v| v.as_u64());
        let breakdown = value
            .get("breakdown")
            .and_then(|v| v.as_object())
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_f64().map(|score| (k.clone(), score)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            grade,
            overall_score,
            paper_count,
            breakdown,
        }
    }

    /// Grade, or "N/A" when absent or empty
    pub fn grade_or_default(&self) -> &str {
        match self.grade.as_deref() {
            Some(grade) if !grade.is_empty() => grade,
            _ => "N/A",
        }
    }

    pub fn score_or_default(&self) -> f64 {
        self.overall_score.unwrap_or(0.0)
    }

    pub fn paper_count_or_default(&self) -> u64 {
        self.paper_count.unwrap_or(0)
    }
}

// ============================================
// Errors surfaced to the user
// ============================================

/// Where a session failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The backend sent an `error` event
    Backend,
    /// The connection could not be opened or dropped before a terminal event
    Transport,
}

/// Failure details retained on a failed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ErrorKind::Backend => write!(f, "backend error: {}", self.message),
            ErrorKind::Transport => write!(f, "connection failed: {}", self.message),
        }
    }
}

// ============================================
// Session
// ============================================

/// Lifecycle status of a research session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Connecting,
    Active,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    /// Completed or failed; no further events change the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    /// Connecting or active; a new start request is rejected
    pub fn is_running(&self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One research request and everything accumulated for it
#[derive(Debug, Clone)]
pub struct Session {
    /// Client-side identifier, used for log correlation
    pub id: String,
    /// The submitted query; empty only while idle
    pub query: String,
    pub status: SessionStatus,
    /// Set by the `start` event until the first agent starts
    pub initializing: bool,
    pub current_agent: Option<AgentId>,
    /// Last reported progress, in [0, 100]
    pub progress_percent: u8,
    /// Set at most once
    pub routing: Option<RoutingDecision>,
    pub agent_results: AgentResults,
    pub final_report: Option<FinalReport>,
    /// Derived from `final_report` when it arrives
    pub metrics: Option<QualityMetrics>,
    pub error: Option<ErrorInfo>,
    /// Latch for the one-shot "bring results into view" effect
    pub has_shown_results: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A session with nothing submitted yet
    pub fn idle() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            query: String::new(),
            status: SessionStatus::Idle,
            initializing: false,
            current_agent: None,
            progress_percent: 0,
            routing: None,
            agent_results: AgentResults::default(),
            final_report: None,
            metrics: None,
            error: None,
            has_shown_results: false,
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether an agent has delivered its result
    pub fn is_agent_complete(&self, agent: AgentId) -> bool {
        self.agent_results.is_complete(agent)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::idle()
    }
}
