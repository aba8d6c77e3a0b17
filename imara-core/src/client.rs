//! Research session driver
//!
//! [`ResearchClient`] ties one [`Transport`] to the [`SessionMachine`]: it
//! opens the connection for a new query, pumps inbound frames through the
//! decoder into the state machine, and closes the connection when the
//! session reaches a terminal state or is cancelled.

use crate::error::Result;
use crate::export::{self, ExportFormat, ReportArtifact};
use crate::protocol;
use crate::session::{Effect, Inbound, SessionMachine};
use crate::transport::{Transport, TransportEvent, TransportHandle};
use crate::types::{Session, SessionStatus};

/// What one pumped transport event did to the session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionUpdate {
    pub effects: Vec<Effect>,
}

impl SessionUpdate {
    /// True on the update where the first agent result arrived
    pub fn reveals_results(&self) -> bool {
        self.effects.contains(&Effect::RevealResults)
    }

    /// The status transition in this update, if any
    pub fn status_change(&self) -> Option<(SessionStatus, SessionStatus)> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::StatusChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
    }
}

/// Drives a single research session over a transport
pub struct ResearchClient<T: Transport> {
    transport: T,
    machine: SessionMachine,
    handle: Option<TransportHandle>,
}

impl<T: Transport> ResearchClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            machine: SessionMachine::new(),
            handle: None,
        }
    }

    pub fn session(&self) -> &Session {
        self.machine.session()
    }

    pub fn status(&self) -> SessionStatus {
        self.machine.status()
    }

    /// Whether a connection is still open
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Start a new session for `query` and open its connection
    ///
    /// Nothing is opened when the query is empty or a session is already
    /// running. If the transport cannot be opened the session fails and the
    /// error is returned.
    pub fn start(&mut self, query: &str) -> Result<()> {
        let connection = self.machine.start(query)?;
        self.close_transport();

        match self.transport.open(query, connection) {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.machine
                    .apply(connection, Inbound::TransportFailure(e.to_string()));
                Err(e)
            }
        }
    }

    /// Wait for the next transport event and fold it into the session
    ///
    /// Returns None when no connection is open.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        let (connection, inbound) = {
            let handle = self.handle.as_mut()?;
            let connection = handle.connection();
            let inbound = match handle.next().await {
                Some(TransportEvent::Frame(text)) => match protocol::decode(&text) {
                    Ok(event) => Inbound::Event(event),
                    Err(e) => Inbound::Malformed(e),
                },
                Some(TransportEvent::Failed(message)) => Inbound::TransportFailure(message),
                Some(TransportEvent::Closed) | None => Inbound::TransportFailure(
                    "connection closed before research finished".to_string(),
                ),
            };
            (connection, inbound)
        };

        let effects = self.machine.apply(connection, inbound);

        if effects.contains(&Effect::CloseTransport) || !self.machine.status().is_running() {
            self.close_transport();
        }

        Some(SessionUpdate { effects })
    }

    /// Pump updates until the connection is closed
    pub async fn run_to_end<F>(&mut self, mut on_update: F) -> &Session
    where
        F: FnMut(&Session, &SessionUpdate),
    {
        while let Some(update) = self.next_update().await {
            on_update(self.machine.session(), &update);
        }
        self.machine.session()
    }

    /// Close any open connection and discard the session
    pub fn cancel(&mut self) {
        self.close_transport();
        self.machine.cancel();
    }

    /// Export the completed session's report
    pub fn export(&self, format: ExportFormat) -> Result<ReportArtifact> {
        export::export(self.machine.session(), format)
    }

    fn close_transport(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
    }
}
