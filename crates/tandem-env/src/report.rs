//! Progress reporting.
//!
//! The environment assembles a [`ProgressReport`] every `report_every`
//! cycles and hands it to a [`ReportSink`]. The built-in [`TracingSink`]
//! logs it; tests and embedders can capture reports instead.

use serde::Serialize;
use tandem_types::AgentState;
use tracing::info;

/// A point-in-time view of the whole simulation.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    /// The cycle this report was taken at.
    pub cycle: u32,
    /// Global virtual time: the minimum of all local clocks seen so far.
    pub global_time: u64,
    /// Total demands ever published.
    pub demands_published: usize,
    /// Demands fully satisfied.
    pub demands_complete: usize,
    /// Demands abandoned after a fruitless wait.
    pub demands_incomplete: usize,
    /// Per-agent progress, in scheduling order.
    pub agents: Vec<AgentProgress>,
}

/// One agent's slice of a [`ProgressReport`].
#[derive(Debug, Clone, Serialize)]
pub struct AgentProgress {
    /// The agent's name.
    pub name: String,
    /// Current lifecycle state.
    pub state: AgentState,
    /// Local virtual clock.
    pub local_time: u64,
    /// Cumulative virtual time spent waiting on others.
    pub wait_time: u64,
    /// Demands queued for work.
    pub backlog: usize,
    /// Provisionally completed demands.
    pub completed: usize,
    /// Causally safe completed demands.
    pub committed: usize,
    /// Demands this agent gave up waiting on.
    pub abandoned: usize,
    /// Total collaborations across all partners.
    pub collaborations: u32,
}

/// Consumer of progress reports.
pub trait ReportSink {
    /// Receive one report. Reports arrive in cycle order.
    fn report(&mut self, report: &ProgressReport);
}

/// A sink that logs each report through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&mut self, report: &ProgressReport) {
        info!(
            cycle = report.cycle,
            global_time = report.global_time,
            published = report.demands_published,
            complete = report.demands_complete,
            incomplete = report.demands_incomplete,
            "progress"
        );
        for agent in &report.agents {
            info!(
                agent = agent.name,
                state = ?agent.state,
                local_time = agent.local_time,
                wait_time = agent.wait_time,
                backlog = agent.backlog,
                completed = agent.completed,
                committed = agent.committed,
                abandoned = agent.abandoned,
                collaborations = agent.collaborations,
                "agent progress"
            );
        }
    }
}

/// A sink that retains every report; useful in tests.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    /// Reports in arrival order.
    pub reports: Vec<ProgressReport>,
}

impl ReportSink for CollectingSink {
    fn report(&mut self, report: &ProgressReport) {
        self.reports.push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_serialize_for_external_consumers() {
        let report = ProgressReport {
            cycle: 25,
            global_time: 118,
            demands_published: 14,
            demands_complete: 9,
            demands_incomplete: 1,
            agents: vec![AgentProgress {
                name: "engineer-0".to_owned(),
                state: AgentState::Active,
                local_time: 130,
                wait_time: 12,
                backlog: 3,
                completed: 2,
                committed: 5,
                abandoned: 0,
                collaborations: 1,
            }],
        };
        let json = serde_json::to_string(&report).ok();
        assert!(json.as_deref().is_some_and(|j| j.contains("engineer-0")));
    }
}
