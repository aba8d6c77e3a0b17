//! Session state machine
//!
//! [`SessionMachine`] is the single owner of "where the current research
//! session is". It folds inbound stream events into a [`Session`] and tells
//! the caller which side effects to run via [`Effect`] values.
//!
//! ```text
//! Idle ──start()──▶ Connecting ──start event──▶ Active ──complete──▶ Completed
//!                        │                         │
//!                        └──── error / transport failure ──────────▶ Failed
//! ```
//!
//! Every inbound is tagged with the [`ConnectionId`] handed out by
//! [`SessionMachine::start`]. Inbound from any other connection is dropped,
//! so a superseded or cancelled connection can never touch the live session.

mod results;

pub use results::{AgentResults, Recorded};

use chrono::Utc;

use crate::error::{Error, Result};
use crate::protocol::{DecodeError, ServerEvent};
use crate::types::{
    AgentId, AgentResult, ErrorInfo, ErrorKind, FinalReport, RoutingDecision, Session,
    SessionStatus,
};

/// Identifies one streaming connection; unique per machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Something that arrived from the transport
#[derive(Debug)]
pub enum Inbound {
    Event(ServerEvent),
    /// Frame the decoder rejected
    Malformed(DecodeError),
    /// Connection could not be opened or dropped before a terminal event
    TransportFailure(String),
}

impl From<ServerEvent> for Inbound {
    fn from(event: ServerEvent) -> Self {
        Inbound::Event(event)
    }
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// First agent result of the session arrived; fires once per session
    RevealResults,
    /// Terminal state reached; the connection should be closed
    CloseTransport,
}

/// Owns the live session and its connection generation
#[derive(Debug)]
pub struct SessionMachine {
    session: Session,
    connection: Option<ConnectionId>,
    next_connection: u64,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            session: Session::idle(),
            connection: None,
            next_connection: 1,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    /// Connection bound to the current session, if one was started
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Begin a new session for `query`
    ///
    /// Rejected while a session is connecting or active. A finished session
    /// is discarded first, so the new one always starts from idle.
    pub fn start(&mut self, query: &str) -> Result<ConnectionId> {
        if self.session.status.is_running() {
            tracing::warn!(
                session_id = %self.session.id,
                status = %self.session.status,
                "Rejected start while a session is running"
            );
            return Err(Error::SessionBusy {
                status: self.session.status,
            });
        }

        if query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".to_string()));
        }

        if self.session.status.is_terminal() {
            self.reset();
        }

        let connection = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connection = Some(connection);

        self.session.query = query.to_string();
        self.session.status = SessionStatus::Connecting;
        self.session.started_at = Some(Utc::now());

        tracing::info!(
            session_id = %self.session.id,
            connection = %connection,
            query = %query,
            "Research session starting"
        );

        Ok(connection)
    }

    /// Fold one inbound into the session
    ///
    /// Inbound from a stale connection, malformed frames, and anything after
    /// a terminal state leave the session untouched.
    pub fn apply(&mut self, connection: ConnectionId, inbound: Inbound) -> Vec<Effect> {
        if self.connection != Some(connection) {
            tracing::debug!(
                connection = %connection,
                "Dropping inbound from stale connection"
            );
            return Vec::new();
        }

        if !self.session.status.is_running() {
            tracing::debug!(
                session_id = %self.session.id,
                status = %self.session.status,
                "Ignoring inbound after session ended"
            );
            return Vec::new();
        }

        match inbound {
            Inbound::Malformed(err) => {
                tracing::warn!(
                    session_id = %self.session.id,
                    error = %err,
                    "Dropping malformed frame"
                );
                Vec::new()
            }
            Inbound::TransportFailure(message) => self.fail(ErrorKind::Transport, message),
            Inbound::Event(event) => self.apply_event(event),
        }
    }

    /// Discard the current session and return to idle
    ///
    /// Returns true if a connection was still live and must be closed.
    /// Safe to call repeatedly.
    pub fn cancel(&mut self) -> bool {
        let was_running = self.session.status.is_running();
        if self.connection.is_some() {
            tracing::info!(
                session_id = %self.session.id,
                status = %self.session.status,
                "Research session cancelled"
            );
        }
        self.reset();
        was_running
    }

    fn reset(&mut self) {
        self.session = Session::idle();
        self.connection = None;
    }

    fn apply_event(&mut self, event: ServerEvent) -> Vec<Effect> {
        let mut effects = Vec::new();

        match event {
            ServerEvent::Start { .. } => {
                if self.session.status == SessionStatus::Connecting {
                    self.session.initializing = true;
                    self.transition(SessionStatus::Active, &mut effects);
                } else {
                    tracing::warn!(session_id = %self.session.id, "Ignoring duplicate start event");
                }
            }
            ServerEvent::Error { message } => {
                let message = message.unwrap_or_else(|| "unknown backend error".to_string());
                return self.fail(ErrorKind::Backend, message);
            }
            other => {
                if self.session.status == SessionStatus::Connecting {
                    tracing::warn!(
                        session_id = %self.session.id,
                        kind = other.kind(),
                        "Event arrived before start; treating session as active"
                    );
                    self.transition(SessionStatus::Active, &mut effects);
                }
                self.apply_active(other, &mut effects);
            }
        }

        effects
    }

    fn apply_active(&mut self, event: ServerEvent, effects: &mut Vec<Effect>) {
        match event {
            ServerEvent::Routing { data } => self.set_routing(data),
            ServerEvent::AgentStart { agent, progress } => {
                tracing::debug!(
                    session_id = %self.session.id,
                    agent = %agent,
                    ?progress,
                    "Agent started"
                );
                self.session.initializing = false;
                self.session.current_agent = Some(agent);
                self.update_progress(progress);
            }
            ServerEvent::AgentComplete {
                agent,
                data,
                progress,
            } => {
                self.record_result(agent, data, effects);
                self.update_progress(progress);
            }
            ServerEvent::Complete { data } => self.complete(data, effects),
            ServerEvent::Start { .. } | ServerEvent::Error { .. } => {}
        }
    }

    fn set_routing(&mut self, routing: RoutingDecision) {
        if self.session.routing.is_some() {
            tracing::warn!(
                session_id = %self.session.id,
                path = %routing.path,
                "Ignoring repeated routing decision"
            );
            return;
        }
        tracing::debug!(
            session_id = %self.session.id,
            path = %routing.path,
            confidence = routing.confidence,
            "Routing decided"
        );
        self.session.routing = Some(routing);
    }

    fn record_result(&mut self, agent: AgentId, result: AgentResult, effects: &mut Vec<Effect>) {
        let recorded = self.session.agent_results.record(agent, result);
        tracing::debug!(
            session_id = %self.session.id,
            agent = %agent,
            ?recorded,
            "Agent completed"
        );

        if !self.session.has_shown_results {
            self.session.has_shown_results = true;
            effects.push(Effect::RevealResults);
        }
    }

    fn complete(&mut self, report: FinalReport, effects: &mut Vec<Effect>) {
        self.session.metrics = Some(report.metrics());
        self.session.final_report = Some(report);
        self.session.progress_percent = 100;
        self.session.current_agent = None;
        self.session.initializing = false;
        self.session.finished_at = Some(Utc::now());
        self.transition(SessionStatus::Completed, effects);
        effects.push(Effect::CloseTransport);

        tracing::info!(
            session_id = %self.session.id,
            results = self.session.agent_results.len(),
            "Research session completed"
        );
    }

    fn fail(&mut self, kind: ErrorKind, message: String) -> Vec<Effect> {
        tracing::warn!(
            session_id = %self.session.id,
            kind = ?kind,
            error = %message,
            "Research session failed"
        );

        let mut effects = Vec::new();
        self.session.error = Some(ErrorInfo {
            kind,
            message,
            occurred_at: Utc::now(),
        });
        self.session.current_agent = None;
        self.session.initializing = false;
        self.session.finished_at = Some(Utc::now());
        self.transition(SessionStatus::Failed, &mut effects);
        effects.push(Effect::CloseTransport);
        effects
    }

    /// Latest report wins; absent values keep the previous one
    fn update_progress(&mut self, progress: Option<i64>) {
        if let Some(progress) = progress {
            self.session.progress_percent = progress.clamp(0, 100) as u8;
        }
    }

    fn transition(&mut self, to: SessionStatus, effects: &mut Vec<Effect>) {
        let from = self.session.status;
        self.session.status = to;
        effects.push(Effect::StatusChanged { from, to });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;
    use serde_json::json;

    fn event(frame: serde_json::Value) -> Inbound {
        Inbound::Event(decode(&frame.to_string()).unwrap())
    }

    fn started(query: &str) -> (SessionMachine, ConnectionId) {
        let mut machine = SessionMachine::new();
        let conn = machine.start(query).unwrap();
        (machine, conn)
    }

    fn active() -> (SessionMachine, ConnectionId) {
        let (mut machine, conn) = started("graph neural networks");
        machine.apply(conn, event(json!({"type": "start"})));
        (machine, conn)
    }

    #[test]
    fn test_start_moves_to_connecting() {
        let (machine, conn) = started("graph neural networks");
        assert_eq!(machine.status(), SessionStatus::Connecting);
        assert_eq!(machine.connection(), Some(conn));
        assert_eq!(machine.session().query, "graph neural networks");
        assert!(machine.session().started_at.is_some());
    }

    #[test]
    fn test_empty_query_rejected() {
        let mut machine = SessionMachine::new();
        for query in ["", "   ", "\n\t"] {
            let err = machine.start(query).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        assert_eq!(machine.status(), SessionStatus::Idle);
        assert!(machine.connection().is_none());
    }

    #[test]
    fn test_start_rejected_while_running() {
        let (mut machine, conn) = started("first");
        assert!(matches!(
            machine.start("second").unwrap_err(),
            Error::SessionBusy {
                status: SessionStatus::Connecting
            }
        ));

        machine.apply(conn, event(json!({"type": "start"})));
        assert!(matches!(
            machine.start("second").unwrap_err(),
            Error::SessionBusy {
                status: SessionStatus::Active
            }
        ));
        assert_eq!(machine.session().query, "first");
        assert_eq!(machine.connection(), Some(conn));
    }

    #[test]
    fn test_start_event_activates() {
        let (mut machine, conn) = started("q");
        let effects = machine.apply(conn, event(json!({"type": "start", "message": "hi"})));
        assert_eq!(
            effects,
            vec![Effect::StatusChanged {
                from: SessionStatus::Connecting,
                to: SessionStatus::Active
            }]
        );
        assert!(machine.session().initializing);
    }

    #[test]
    fn test_duplicate_start_ignored() {
        let (mut machine, conn) = active();
        assert!(machine
            .apply(conn, event(json!({"type": "start"})))
            .is_empty());
        assert_eq!(machine.status(), SessionStatus::Active);
    }

    #[test]
    fn test_routing_set_once() {
        let (mut machine, conn) = active();
        machine.apply(
            conn,
            event(json!({"type": "routing", "data": {"path": "standard", "confidence": 0.5}})),
        );
        machine.apply(
            conn,
            event(json!({"type": "routing", "data": {"path": "exploratory", "confidence": 0.9}})),
        );

        let routing = machine.session().routing.as_ref().unwrap();
        assert_eq!(routing.path, "standard");
        assert_eq!(routing.confidence, 0.5);
        assert_eq!(machine.status(), SessionStatus::Active);
    }

    #[test]
    fn test_agent_start_sets_current_agent_and_progress() {
        let (mut machine, conn) = active();
        machine.apply(
            conn,
            event(json!({"type": "agent_start", "agent": "researcher", "progress": 25})),
        );
        assert_eq!(machine.session().current_agent, Some(AgentId::Researcher));
        assert_eq!(machine.session().progress_percent, 25);
        assert!(!machine.session().initializing);

        machine.apply(conn, event(json!({"type": "agent_start", "agent": "coder"})));
        assert_eq!(machine.session().current_agent, Some(AgentId::Coder));
        assert_eq!(machine.session().progress_percent, 25);
    }

    #[test]
    fn test_progress_clamped_and_latest_wins() {
        let (mut machine, conn) = active();
        machine.apply(
            conn,
            event(json!({"type": "agent_start", "agent": "researcher", "progress": 250})),
        );
        assert_eq!(machine.session().progress_percent, 100);

        machine.apply(
            conn,
            event(json!({"type": "agent_start", "agent": "coder", "progress": 40})),
        );
        assert_eq!(machine.session().progress_percent, 40);

        machine.apply(
            conn,
            event(json!({"type": "agent_start", "agent": "coder", "progress": -5})),
        );
        assert_eq!(machine.session().progress_percent, 0);
    }

    #[test]
    fn test_reveal_results_fires_once() {
        let (mut machine, conn) = active();
        let mut reveals = 0;
        for (agent, progress) in [
            ("researcher", 50),
            ("coder", 75),
            ("reviewer", 90),
            ("coder", 95),
        ] {
            let effects = machine.apply(
                conn,
                event(json!({"type": "agent_complete", "agent": agent, "data": {}, "progress": progress})),
            );
            reveals += effects
                .iter()
                .filter(|e| **e == Effect::RevealResults)
                .count();
        }
        assert_eq!(reveals, 1);
        assert!(machine.session().has_shown_results);
        assert_eq!(machine.session().agent_results.len(), 3);
        assert_eq!(machine.session().progress_percent, 95);
    }

    #[test]
    fn test_complete_without_start_accepted() {
        let (mut machine, conn) = active();
        machine.apply(
            conn,
            event(json!({"type": "agent_complete", "agent": "coder", "data": {"code": "x = 1"}})),
        );
        assert!(machine.session().is_agent_complete(AgentId::Coder));
        assert!(machine.session().current_agent.is_none());
    }

    #[test]
    fn test_complete_event_finishes_session() {
        let (mut machine, conn) = active();
        machine.apply(
            conn,
            event(json!({"type": "agent_start", "agent": "reviewer", "progress": 75})),
        );
        let effects = machine.apply(
            conn,
            event(json!({"type": "complete", "data": {"metrics": {"grade": "A", "overall_score": 8.5, "paper_count": 12}}})),
        );

        assert_eq!(
            effects,
            vec![
                Effect::StatusChanged {
                    from: SessionStatus::Active,
                    to: SessionStatus::Completed
                },
                Effect::CloseTransport
            ]
        );
        let session = machine.session();
        assert_eq!(session.progress_percent, 100);
        assert!(session.current_agent.is_none());
        assert!(session.error.is_none());
        let metrics = session.metrics.as_ref().unwrap();
        assert_eq!(metrics.grade_or_default(), "A");
        assert_eq!(metrics.paper_count, Some(12));
    }

    #[test]
    fn test_backend_error_fails_session() {
        let (mut machine, conn) = active();
        machine.apply(
            conn,
            event(json!({"type": "agent_start", "agent": "coder", "progress": 50})),
        );
        let effects = machine.apply(
            conn,
            event(json!({"type": "error", "message": "model offline"})),
        );

        assert!(effects.contains(&Effect::CloseTransport));
        let session = machine.session();
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session.current_agent.is_none());
        assert_eq!(session.progress_percent, 50);
        let error = session.error.as_ref().unwrap();
        assert_eq!(error.kind, ErrorKind::Backend);
        assert_eq!(error.message, "model offline");
        assert!(session.final_report.is_none());
    }

    #[test]
    fn test_transport_failure_while_connecting() {
        let (mut machine, conn) = started("q");
        machine.apply(conn, Inbound::TransportFailure("refused".to_string()));

        let session = machine.session();
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.error.as_ref().unwrap().kind, ErrorKind::Transport);
        assert!(session.agent_results.is_empty());
    }

    #[test]
    fn test_events_after_terminal_are_noops() {
        let (mut machine, conn) = active();
        machine.apply(conn, event(json!({"type": "complete", "data": {}})));

        assert!(machine
            .apply(conn, event(json!({"type": "error", "message": "late"})))
            .is_empty());
        assert!(machine
            .apply(conn, Inbound::TransportFailure("dropped".to_string()))
            .is_empty());
        assert!(machine
            .apply(
                conn,
                event(json!({"type": "agent_complete", "agent": "presenter", "data": {}}))
            )
            .is_empty());

        let session = machine.session();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.error.is_none());
        assert!(session.agent_results.is_empty());
    }

    #[test]
    fn test_malformed_frame_changes_nothing() {
        let (mut machine, conn) = active();
        let err = decode(r#"{"type":"heartbeat"}"#).unwrap_err();
        assert!(machine.apply(conn, Inbound::Malformed(err)).is_empty());
        assert_eq!(machine.status(), SessionStatus::Active);
    }

    #[test]
    fn test_event_before_start_activates() {
        let (mut machine, conn) = started("q");
        let effects = machine.apply(
            conn,
            event(json!({"type": "agent_start", "agent": "researcher", "progress": 25})),
        );
        assert_eq!(
            effects,
            vec![Effect::StatusChanged {
                from: SessionStatus::Connecting,
                to: SessionStatus::Active
            }]
        );
        assert_eq!(machine.session().current_agent, Some(AgentId::Researcher));
    }

    #[test]
    fn test_stale_connection_is_ignored() {
        let (mut machine, old) = active();
        assert!(machine.cancel());
        assert_eq!(machine.status(), SessionStatus::Idle);

        let new = machine.start("second query").unwrap();
        assert_ne!(old, new);

        assert!(machine
            .apply(old, event(json!({"type": "start"})))
            .is_empty());
        assert!(machine
            .apply(
                old,
                event(json!({"type": "agent_complete", "agent": "coder", "data": {}}))
            )
            .is_empty());
        assert_eq!(machine.status(), SessionStatus::Connecting);
        assert!(machine.session().agent_results.is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (mut machine, _) = active();
        assert!(machine.cancel());
        assert!(!machine.cancel());
        assert_eq!(machine.status(), SessionStatus::Idle);
        assert!(machine.session().query.is_empty());
    }

    #[test]
    fn test_restart_after_terminal_starts_fresh() {
        let (mut machine, conn) = active();
        machine.apply(
            conn,
            event(json!({"type": "agent_complete", "agent": "researcher", "data": {}})),
        );
        machine.apply(conn, event(json!({"type": "error", "message": "boom"})));
        let old_id = machine.session().id.clone();

        machine.start("again").unwrap();
        let session = machine.session();
        assert_ne!(session.id, old_id);
        assert_eq!(session.status, SessionStatus::Connecting);
        assert!(session.error.is_none());
        assert!(session.agent_results.is_empty());
        assert!(!session.has_shown_results);
    }

    #[test]
    fn test_status_never_moves_backwards() {
        let frames = [
            json!({"type": "agent_start", "agent": "researcher", "progress": 10}),
            json!({"type": "start"}),
            json!({"type": "routing", "data": {"path": "standard", "confidence": 0.4}}),
            json!({"type": "agent_complete", "agent": "researcher", "data": {}, "progress": 30}),
            json!({"type": "start"}),
            json!({"type": "complete", "data": {}}),
            json!({"type": "error", "message": "late"}),
            json!({"type": "start"}),
        ];

        // Replay every suffix of the frame list against a fresh session.
        for skip in 0..frames.len() {
            let (mut machine, conn) = started("q");
            let mut last = machine.status();
            for frame in frames.iter().skip(skip) {
                machine.apply(conn, event(frame.clone()));
                assert!(machine.status() >= last, "status regressed");
                last = machine.status();
            }
            let session = machine.session();
            assert!(!(session.final_report.is_some() && session.error.is_some()));
        }
    }
}
