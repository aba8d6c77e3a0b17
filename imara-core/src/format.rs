//! Formatting helpers shared by the exporter and the CLI.

use chrono::{DateTime, Utc};

use crate::types::RoutingDecision;

/// Format an overall score out of ten (e.g., "8.5/10").
pub fn format_score(score: f64) -> String {
    format!("{}/10", score)
}

/// Format routing confidence as a percentage, or "N/A" without a routing decision.
pub fn format_confidence(routing: Option<&RoutingDecision>) -> String {
    match routing {
        Some(routing) => format!("{}%", routing.confidence_percent()),
        None => "N/A".to_string(),
    }
}

/// Format the time between two instants (e.g., "42s", "3m 05s").
pub fn format_elapsed(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let secs = end.signed_duration_since(start).num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}
