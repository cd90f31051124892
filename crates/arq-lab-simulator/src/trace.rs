use arq_lab_abstract::{RunConfig, RunSummary, TimedEvent};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: Option<RunConfig>,
    pub duration_ms: u64,
    pub summary: Option<RunSummary>,
    pub events: Vec<TimedEvent>,
}

impl SimulationReport {
    pub fn count(&self, kind: &str) -> usize {
        self.events.iter().filter(|e| e.event.kind() == kind).count()
    }
}
