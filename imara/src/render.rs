//! Terminal rendering for a running research session

use anyhow::{Context, Result};
use imara_core::format::{format_confidence, format_elapsed, format_score};
use imara_core::{AgentId, QualityMetrics, RoutingDecision, Session, SessionUpdate};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Longest excerpt printed for a single agent result
const EXCERPT_CHARS: usize = 600;

/// Follows session updates and prints what changed
pub struct SessionView {
    pb: ProgressBar,
    routing_shown: bool,
    current_agent: Option<AgentId>,
    results_printed: usize,
}

impl SessionView {
    pub fn new(query: &str) -> Result<Self> {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .context("invalid progress template")?
                .progress_chars("#>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("Connecting...");

        let view = Self {
            pb,
            routing_shown: false,
            current_agent: None,
            results_printed: 0,
        };
        view.line(format!("Researching: {}", query));
        Ok(view)
    }

    /// Print whatever the last update changed
    pub fn apply(&mut self, session: &Session, update: &SessionUpdate) {
        if session.initializing && self.current_agent.is_none() {
            self.pb.set_message("Initializing agents...");
        }

        if let (false, Some(routing)) = (self.routing_shown, &session.routing) {
            self.line(format!(
                "Route: {} (confidence {})",
                routing.path,
                format_confidence(Some(routing))
            ));
            self.routing_shown = true;
        }

        if session.current_agent != self.current_agent {
            if let Some(agent) = session.current_agent {
                self.line(format!("  > {} working", agent.display_name()));
                self.pb.set_message(format!("{}...", agent.display_name()));
            }
            self.current_agent = session.current_agent;
        }

        if update.reveals_results() {
            self.line("");
            self.line("Results");
            self.line("=======");
        }

        for (agent, result) in session.agent_results.iter().skip(self.results_printed) {
            self.line(format!("  + {} complete", agent.display_name()));
            if let Some(text) = result.primary_text(agent) {
                self.line(format!("\n{}:", agent.result_heading()));
                self.line(excerpt(text));
                self.line("");
            }
        }
        self.results_printed = session.agent_results.len();

        self.pb.set_position(u64::from(session.progress_percent));
    }

    /// Print above the bar, or to stdout when the bar is not drawn
    fn line(&self, message: impl AsRef<str>) {
        if self.pb.is_hidden() {
            println!("{}", message.as_ref());
        } else {
            self.pb.println(message);
        }
    }

    /// Clear the bar and print the final summary of a completed session
    pub fn finish(&self, session: &Session) {
        self.pb.finish_and_clear();

        println!();
        println!("Research complete");
        if let (Some(start), Some(end)) = (session.started_at, session.finished_at) {
            println!("Finished in {}", format_elapsed(start, end));
        }
        println!();

        let metrics = session.metrics.clone().unwrap_or_default();
        print_dashboard(&metrics, session.routing.as_ref());
    }

    /// Stop the bar, leaving it on screen with a reason
    pub fn abandon(&self, reason: &str) {
        self.pb.abandon_with_message(reason.to_string());
    }
}

/// Metrics dashboard shared by `research` and `quick`
pub fn print_dashboard(metrics: &QualityMetrics, routing: Option<&RoutingDecision>) {
    println!("Quality Metrics");
    println!("===============");
    println!("Grade:           {}", metrics.grade_or_default());
    println!(
        "Overall Score:   {}",
        format_score(metrics.score_or_default())
    );
    println!("Papers Analyzed: {}", metrics.paper_count_or_default());
    println!("Confidence:      {}", format_confidence(routing));

    if !metrics.breakdown.is_empty() {
        println!();
        for (dimension, score) in &metrics.breakdown {
            println!("  {:<16} {}", format!("{}:", dimension), score);
        }
    }
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
