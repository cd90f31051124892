use arq_lab_abstract::{ProtocolEvent, RunStatistics, RunSummary};

/// Passive accumulator fed with every event the engine emits.
#[derive(Debug, Default)]
pub struct StatisticsCollector {
    stats: RunStatistics,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, now: u64) {
        self.stats = RunStatistics {
            started_at_ms: Some(now),
            ..Default::default()
        };
    }

    pub fn record(&mut self, event: &ProtocolEvent) {
        let stats = &mut self.stats;
        match event {
            ProtocolEvent::FrameSent { .. } => stats.total_transmissions += 1,
            ProtocolEvent::TimeoutFired { .. } => stats.retransmissions += 1,
            ProtocolEvent::FrameLost { .. } => stats.frames_lost += 1,
            ProtocolEvent::AckLost { .. } => stats.acks_lost += 1,
            ProtocolEvent::FrameDelivered { .. } => stats.successful_deliveries += 1,
            ProtocolEvent::DuplicateFrame { .. } => stats.duplicate_frames += 1,
            ProtocolEvent::AckRejected { .. } => stats.rejected_acks += 1,
            _ => {}
        }
    }

    pub fn finish(&mut self, now: u64, frame_count: u32) -> RunSummary {
        self.stats.finished_at_ms = Some(now);
        RunSummary::from_stats(self.stats.clone(), frame_count)
    }

    pub fn snapshot(&self) -> &RunStatistics {
        &self.stats
    }

    pub fn reset(&mut self) {
        self.stats = RunStatistics::default();
    }
}
