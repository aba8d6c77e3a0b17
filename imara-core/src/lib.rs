//! # imara-core
//!
//! Core library for imara - a client for the IMARA multi-agent research backend.
//!
//! This library provides:
//! - Domain types for research sessions, agent results, and reports
//! - The stream protocol decoder and the session state machine
//! - WebSocket transport and a REST client for the companion endpoints
//! - Report export, configuration management, and logging infrastructure
//!
//! ## Architecture
//!
//! One session flows through four stages:
//! - **Transport:** opens the stream, submits the query, delivers frames in order
//! - **Protocol:** decodes each frame into a typed [`ServerEvent`]
//! - **Session:** folds events into [`Session`] state and requests side effects
//! - **Export:** turns a completed session's report into an artifact
//!
//! ## Example
//!
//! ```rust,no_run
//! use imara_core::{Config, ExportFormat, ResearchClient, WebSocketTransport};
//!
//! # async fn run() -> imara_core::Result<()> {
//! let config = Config::load()?;
//! let mut client = ResearchClient::new(WebSocketTransport::from_config(&config.server));
//!
//! client.start("graph neural networks")?;
//! let session = client.run_to_end(|_, _| {}).await;
//! println!("finished as {}", session.status);
//!
//! let artifact = client.export(ExportFormat::Json)?;
//! artifact.write_to(&config.export_dir())?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use api::ApiClient;
pub use client::{ResearchClient, SessionUpdate};
pub use config::Config;
pub use error::{Error, Result};
pub use export::{ExportFormat, ReportArtifact};
pub use protocol::ServerEvent;
pub use session::{ConnectionId, Effect, Inbound, SessionMachine};
pub use transport::{Transport, TransportEvent, TransportFeed, TransportHandle, WebSocketTransport};
pub use types::*;

// Public modules
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;
