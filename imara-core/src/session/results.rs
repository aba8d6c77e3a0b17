//! Per-agent result accumulation
//!
//! Results are kept in completion order. A repeated completion for the same
//! agent replaces the stored value in place, so the agent keeps the position
//! of its first completion. Entries are never removed within a session.

use crate::types::{AgentId, AgentResult};

/// Ordered map from agent to its latest result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentResults {
    entries: Vec<(AgentId, AgentResult)>,
}

/// Outcome of recording a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// First result for this agent
    Inserted,
    /// Replaced an earlier result for this agent
    Replaced,
}

impl AgentResults {
    /// Record a result for an agent, overwriting any earlier one in place
    pub fn record(&mut self, agent: AgentId, result: AgentResult) -> Recorded {
        if let Some(slot) = self.entries.iter_mut().find(|(id, _)| *id == agent) {
            slot.1 = result;
            return Recorded::Replaced;
        }
        self.entries.push((agent, result));
        Recorded::Inserted
    }

    pub fn get(&self, agent: AgentId) -> Option<&AgentResult> {
        self.entries
            .iter()
            .find(|(id, _)| *id == agent)
            .map(|(_, result)| result)
    }

    /// Whether the agent has completed at least once
    pub fn is_complete(&self, agent: AgentId) -> bool {
        self.get(agent).is_some()
    }

    /// The agent that completed `n`-th (zero-based), in completion order
    pub fn nth_complete(&self, n: usize) -> Option<AgentId> {
        self.entries.get(n).map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Agents in completion order
    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &AgentResult)> {
        self.entries.iter().map(|(id, result)| (*id, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(text: &str) -> AgentResult {
        AgentResult(json!({ "summary": text }))
    }

    #[test]
    fn test_preserves_completion_order() {
        let mut results = AgentResults::default();
        results.record(AgentId::Coder, result("c"));
        results.record(AgentId::Researcher, result("r"));

        assert_eq!(results.nth_complete(0), Some(AgentId::Coder));
        assert_eq!(results.nth_complete(1), Some(AgentId::Researcher));
        assert_eq!(results.nth_complete(2), None);
    }

    #[test]
    fn test_repeat_overwrites_in_place() {
        let mut results = AgentResults::default();
        assert_eq!(
            results.record(AgentId::Researcher, result("first")),
            Recorded::Inserted
        );
        results.record(AgentId::Coder, result("code"));
        assert_eq!(
            results.record(AgentId::Researcher, result("second")),
            Recorded::Replaced
        );

        assert_eq!(results.len(), 2);
        assert_eq!(results.nth_complete(0), Some(AgentId::Researcher));
        assert_eq!(
            results.get(AgentId::Researcher).unwrap().text("summary"),
            Some("second")
        );
    }

    #[test]
    fn test_is_complete() {
        let mut results = AgentResults::default();
        assert!(results.is_empty());
        assert!(!results.is_complete(AgentId::Reviewer));

        results.record(AgentId::Reviewer, result("ok"));
        assert!(results.is_complete(AgentId::Reviewer));
        assert!(!results.is_complete(AgentId::Presenter));
        assert_eq!(
            results.agents().collect::<Vec<_>>(),
            vec![AgentId::Reviewer]
        );
    }
}
