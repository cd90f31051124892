use serde::{Deserialize, Serialize};

/// Counters of one run. Only grow while the run is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total_transmissions: u32,
    pub retransmissions: u32,
    pub frames_lost: u32,
    pub acks_lost: u32,
    pub successful_deliveries: u32,
    pub duplicate_frames: u32,
    pub rejected_acks: u32,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
}

/// End-of-run metrics derived from [`RunStatistics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub stats: RunStatistics,
    pub frame_count: u32,
    pub duration_ms: u64,
    /// Successful deliveries per transmission, in [0, 1].
    pub efficiency: f64,
    /// Successful deliveries per second of simulated time.
    pub goodput: f64,
}

impl RunSummary {
    pub fn from_stats(stats: RunStatistics, frame_count: u32) -> Self {
        let duration_ms = match (stats.started_at_ms, stats.finished_at_ms) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        };
        let efficiency = if stats.total_transmissions == 0 {
            1.0
        } else {
            stats.successful_deliveries as f64 / stats.total_transmissions as f64
        };
        let goodput = if duration_ms == 0 {
            0.0
        } else {
            stats.successful_deliveries as f64 / (duration_ms as f64 / 1000.0)
        };
        Self {
            stats,
            frame_count,
            duration_ms,
            efficiency,
            goodput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_efficiency_and_goodput() {
        let stats = RunStatistics {
            total_transmissions: 4,
            successful_deliveries: 3,
            started_at_ms: Some(1000),
            finished_at_ms: Some(7000),
            ..Default::default()
        };
        let summary = RunSummary::from_stats(stats, 3);
        assert_eq!(summary.duration_ms, 6000);
        assert!((summary.efficiency - 0.75).abs() < 1e-9);
        assert!((summary.goodput - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_run_is_fully_efficient() {
        let summary = RunSummary::from_stats(RunStatistics::default(), 1);
        assert_eq!(summary.efficiency, 1.0);
        assert_eq!(summary.goodput, 0.0);
        assert_eq!(summary.duration_ms, 0);
    }
}
