//! imara - command-line client for the IMARA multi-agent research backend
//!
//! This tool provides commands for:
//! - Running a streamed research session and saving its report
//! - Checking backend health and the agent roster
//! - Running a quick, researcher-only request over REST
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/imara/config.toml (~/.config/imara/config.toml)
//! - Logs: $XDG_STATE_HOME/imara/imara.log (~/.local/state/imara/imara.log)

mod render;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use imara_core::{
    logging, ApiClient, Config, ExportFormat, ResearchClient, SessionStatus, SessionUpdate,
    WebSocketTransport,
};
use render::{print_dashboard, SessionView};
use std::path::PathBuf;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "imara")]
#[command(about = "Client for the IMARA multi-agent research assistant")]
#[command(version)]
struct Args {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a research session and stream its progress
    Research {
        /// What to research
        query: String,

        /// Streaming endpoint (default: from config)
        #[arg(long)]
        ws_url: Option<String>,

        /// Directory to save the report in (default: from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format: json or text (default: from config)
        #[arg(short, long)]
        format: Option<ExportFormat>,

        /// Do not save the report
        #[arg(long)]
        no_save: bool,
    },

    /// Check that the backend is up
    Health {
        /// REST base URL (default: from config)
        #[arg(long)]
        api_url: Option<String>,
    },

    /// Show the backend banner and agent roster
    Info,

    /// Run a researcher-only request without streaming
    Quick {
        /// What to research
        query: String,
    },

    /// Show the effective configuration
    Config,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load().context("failed to load configuration")?;

    if args.verbose {
        config.logging.level = "debug".to_string();
    }
    let _log_guard = logging::init(&config).context("failed to initialize logging")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    match args.command {
        Command::Research {
            query,
            ws_url,
            output,
            format,
            no_save,
        } => {
            if let Some(url) = ws_url {
                config.server.ws_url = url;
            }
            config.server.validate_ws_url()?;
            let save = (!no_save).then(|| SaveTarget {
                dir: output.unwrap_or_else(|| config.export_dir()),
                format: format.unwrap_or(config.export.format),
            });
            runtime.block_on(cmd_research(&config, &query, save))
        }
        Command::Health { api_url } => {
            if let Some(url) = api_url {
                config.server.api_url = url;
            }
            runtime.block_on(cmd_health(&config))
        }
        Command::Info => runtime.block_on(cmd_info(&config)),
        Command::Quick { query } => runtime.block_on(cmd_quick(&config, &query)),
        Command::Config => cmd_config(&config),
    }
}

/// Where and how a finished report is saved
struct SaveTarget {
    dir: PathBuf,
    format: ExportFormat,
}

enum Step {
    Update(Option<SessionUpdate>),
    Cancelled,
}

async fn cmd_research(config: &Config, query: &str, save: Option<SaveTarget>) -> Result<()> {
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling...");
        let _ = cancel_tx.send(true);
    })
    .context("failed to set Ctrl+C handler")?;

    let mut client = ResearchClient::new(WebSocketTransport::from_config(&config.server));
    client.start(query)?;

    let session_id = client.session().id.clone();
    tracing::info!(session_id = %session_id, url = %config.server.ws_url, "Research started");

    let mut view = SessionView::new(query)?;

    loop {
        let step = tokio::select! {
            update = client.next_update() => Step::Update(update),
            Ok(()) = cancel_rx.changed() => Step::Cancelled,
        };

        match step {
            Step::Update(Some(update)) => view.apply(client.session(), &update),
            Step::Update(None) => break,
            Step::Cancelled => {
                client.cancel();
                view.abandon("Cancelled");
                tracing::info!(session_id = %session_id, "Research cancelled by user");
                bail!("research cancelled");
            }
        }
    }

    let session = client.session();
    match session.status {
        SessionStatus::Completed => {
            view.finish(session);
        }
        SessionStatus::Failed => {
            view.abandon("Failed");
            match &session.error {
                Some(error) => bail!("research failed: {}", error),
                None => bail!("research failed"),
            }
        }
        status => bail!("research ended while {}", status),
    }

    if let Some(target) = save {
        let artifact = client.export(target.format)?;
        let path = artifact
            .write_to(&target.dir)
            .with_context(|| format!("failed to save report in {}", target.dir.display()))?;
        println!();
        println!("Report saved to {}", path.display());
    }

    Ok(())
}

async fn cmd_health(config: &Config) -> Result<()> {
    let api = ApiClient::new(&config.server)?;

    match api.health().await {
        Ok(health) if health.is_healthy() => {
            println!(
                "Backend:  healthy ({})",
                health.llm.as_deref().unwrap_or("unknown model")
            );
            println!("URL:      {}", api.base_url());
            Ok(())
        }
        Ok(health) => bail!("backend at {} reports {}", api.base_url(), health.status),
        Err(e) => Err(e).with_context(|| format!("backend at {} is unreachable", api.base_url())),
    }
}

async fn cmd_info(config: &Config) -> Result<()> {
    let api = ApiClient::new(&config.server)?;
    let info = api
        .info()
        .await
        .with_context(|| format!("failed to reach {}", api.base_url()))?;

    println!("{}", info.message);
    println!("Status:   {}", info.status);
    if !info.agents.is_empty() {
        println!("Agents:   {}", info.agents.join(", "));
    }
    Ok(())
}

async fn cmd_quick(config: &Config, query: &str) -> Result<()> {
    let api = ApiClient::new(&config.server)?;

    println!("Researching: {}", query);
    let result = api.quick_research(query).await?;

    println!();
    println!("{}", result.summary.trim());
    println!();
    print_dashboard(&result.metrics, None);
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    let config_path = Config::config_path();

    println!("imara Configuration");
    println!("===================");
    println!();
    println!(
        "Config file:     {}{}",
        config_path.display(),
        if config_path.exists() {
            ""
        } else {
            " (not found, using defaults)"
        }
    );
    println!("WebSocket URL:   {}", config.server.ws_url);
    println!("API URL:         {}", config.server.api_url);
    println!("Timeout:         {}s", config.server.request_timeout_secs);
    println!("Log level:       {}", config.logging.level);
    println!("Log file:        {}", logging::log_file_path().display());
    println!("Export dir:      {}", config.export_dir().display());
    println!("Export format:   {}", config.export.format.as_str());

    let problems = config.server.problems();
    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for problem in &problems {
            println!("  - {}", problem);
        }
    }
    Ok(())
}
