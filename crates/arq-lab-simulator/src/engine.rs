use crate::channel::{ChannelModel, LossSource, RandomLoss};
use crate::error::EngineError;
use crate::receiver::{ReceiverPhase, ReceiverState, Reception};
use crate::sender::{SenderPhase, SenderState};
use crate::stats::StatisticsCollector;
use crate::timer::{TimerHandle, TimerService};
use crate::trace::SimulationReport;
use crate::transaction::TransactionRegistry;
use arq_lab_abstract::{
    Ack, Frame, ProtocolEvent, RejectReason, RunConfig, RunStatistics, RunSummary, TimedEvent,
    TxId,
};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info};

/// Time the receiver spends on a frame before answering.
pub const RECEIVER_PROCESSING_MS: u64 = 200;
/// Delay between a timer expiry and honouring it, so an ACK arriving in the
/// same instant can cancel it first.
pub const TIMEOUT_GRACE_MS: u64 = 100;
/// Settling pause between an accepted ACK and the next frame.
pub const NEXT_FRAME_DELAY_MS: u64 = 400;
/// Largest accepted one-way transit time (one hour).
pub const MAX_HOP_MS: u64 = 3_600_000;
/// Largest accepted retransmission timeout (one day).
pub const MAX_TIMEOUT_MS: u64 = 86_400_000;

#[derive(Debug)]
enum EventType {
    FrameArrival { frame: Frame },
    FrameProcessed { frame: Frame },
    AckArrival { ack: Ack },
    TimerExpiry { handle: TimerHandle },
    TimeoutGrace { tx_id: TxId },
    Retransmit { tx_id: TxId },
    NextFrame,
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Read-only view for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub time_ms: u64,
    pub running: bool,
    pub paused: bool,
    pub awaiting_step: bool,
    pub finished: bool,
    pub noisy: bool,
    pub sender: SenderState,
    pub receiver: ReceiverState,
    pub current_tx: TxId,
    pub delivered: u32,
    pub frame_count: u32,
    pub stats: RunStatistics,
}

/// Stop-and-Wait sender and receiver driven by a discrete-event queue.
///
/// Every transition runs inside [`ProtocolEngine::step`], one event at a
/// time. Transit delays and the retransmission timer are queued events
/// stamped with virtual time; whatever they produce is re-validated against
/// the current transaction before it touches sender state.
pub struct ProtocolEngine {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: Option<RunConfig>,
    channel: ChannelModel,
    // Replace the loss source with a config-seeded RNG on every start
    reseed_on_start: bool,

    registry: TransactionRegistry,
    timer: TimerService,
    sender: SenderState,
    receiver: ReceiverState,
    stats: StatisticsCollector,

    running: bool,
    paused: bool,
    awaiting_step: bool,
    summary: Option<RunSummary>,
    events: Vec<TimedEvent>,
}

impl Default for ProtocolEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolEngine {
    pub fn new() -> Self {
        Self::build(Box::new(RandomLoss::seeded(0)), true)
    }

    /// Engine whose loss decisions come from `source` for every run.
    pub fn with_loss_source(source: Box<dyn LossSource>) -> Self {
        Self::build(source, false)
    }

    fn build(source: Box<dyn LossSource>, reseed_on_start: bool) -> Self {
        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config: None,
            channel: ChannelModel::new(source),
            reseed_on_start,
            registry: TransactionRegistry::new(),
            timer: TimerService::new(),
            sender: SenderState::default(),
            receiver: ReceiverState::default(),
            stats: StatisticsCollector::new(),
            running: false,
            paused: false,
            awaiting_step: false,
            summary: None,
            events: Vec::new(),
        }
    }

    /// Register a deterministic fault: drop the first transmission of the frame carrying `payload`.
    pub fn add_drop_frame_once(&mut self, payload: impl Into<String>) {
        self.channel.add_drop_frame_once(payload);
    }

    /// Register a deterministic fault: drop the first ACK sent for `payload`.
    pub fn add_drop_ack_once(&mut self, payload: impl Into<String>) {
        self.channel.add_drop_ack_once(payload);
    }

    pub fn start(&mut self, config: RunConfig) -> Result<(), EngineError> {
        validate(&config)?;
        self.clear_run_state();

        let config = config.clamped();
        if self.reseed_on_start {
            self.channel
                .set_source(Box::new(RandomLoss::seeded(config.seed)));
        }
        self.channel.set_noisy(config.noisy);
        self.running = true;
        self.awaiting_step = config.step_mode;
        self.stats.begin(self.time);

        let step_mode = config.step_mode;
        self.emit(ProtocolEvent::RunStarted {
            noisy: config.noisy,
            step_mode,
            frame_count: config.frame_count,
        });
        info!(
            "Timeout per attempt: {} ms (expected RTT {} ms)",
            config.timeout_ms(),
            config.hop_ms * 2
        );
        self.config = Some(config);

        if step_mode {
            self.sender.phase = SenderPhase::WaitingForStep;
            info!("Step mode: waiting for the next step");
        } else {
            self.send_next_frame(false);
        }
        Ok(())
    }

    /// Releases the next transmission in step mode.
    pub fn advance_step(&mut self) -> Result<(), EngineError> {
        if !self.config.as_ref().is_some_and(|c| c.step_mode) {
            return Err(EngineError::NotInStepMode);
        }
        if !self.running || !self.awaiting_step {
            return Err(EngineError::NoPendingStep);
        }
        self.awaiting_step = false;
        self.send_next_frame(false);
        Ok(())
    }

    /// Suspends all progress. Returns false if no run is active.
    pub fn pause(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.paused = true;
        info!("Paused at {} ms", self.time);
        true
    }

    pub fn resume(&mut self) {
        if self.paused {
            info!("Resumed at {} ms", self.time);
        }
        self.paused = false;
    }

    /// Back to initial values: queue dropped, timer cancelled, faults cleared.
    pub fn reset(&mut self) {
        self.clear_run_state();
        self.channel.clear_faults();
        info!("Simulation reset");
    }

    fn clear_run_state(&mut self) {
        self.time = 0;
        self.event_queue.clear();
        self.event_id_counter = 0;
        self.config = None;
        self.timer.cancel_all();
        self.registry.reset();
        self.sender = SenderState::default();
        self.receiver = ReceiverState::default();
        self.stats.reset();
        self.running = false;
        self.paused = false;
        self.awaiting_step = false;
        self.summary = None;
        self.events.clear();
    }

    fn after(&self, delay_ms: u64) -> u64 {
        self.time.saturating_add(delay_ms)
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Process the next event. Returns false when paused or when the queue is empty.
    pub fn step(&mut self) -> bool {
        if self.paused {
            return false;
        }
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::FrameArrival { frame } => self.on_frame_arrival(frame),
            EventType::FrameProcessed { frame } => self.on_frame_processed(frame),
            EventType::AckArrival { ack } => self.on_ack_received(ack),
            EventType::TimerExpiry { handle } => {
                if !self.timer.expire(&handle) {
                    debug!("Skipping cancelled timer event for {}", handle.tx_id);
                    return true;
                }
                self.sender.timeout_armed = false;
                self.push_event(
                    self.after(TIMEOUT_GRACE_MS),
                    EventType::TimeoutGrace {
                        tx_id: handle.tx_id,
                    },
                );
            }
            EventType::TimeoutGrace { tx_id } => self.on_timeout(tx_id),
            EventType::Retransmit { tx_id } => {
                if self.running && self.sender.is_outstanding(tx_id) {
                    self.send_next_frame(true);
                } else {
                    debug!("Dropping retransmission for settled {}", tx_id);
                }
            }
            EventType::NextFrame => {
                if self.running && !self.sender.awaiting_ack {
                    self.send_next_frame(false);
                }
            }
        }
        true
    }

    /// Steps until the queue drains, the run is paused or a step is pending.
    pub fn run_until_idle(&mut self) {
        while self.step() {}
    }

    /// Like [`run_until_idle`](Self::run_until_idle) but also releases every
    /// pending step. Fails once simulated time passes `max_time_ms`.
    pub fn run_until_complete(&mut self, max_time_ms: u64) -> Result<(), EngineError> {
        loop {
            while self.step() {
                if self.time > max_time_ms {
                    return Err(EngineError::TimeLimitExceeded(max_time_ms));
                }
            }
            if self.paused || !self.awaiting_step {
                return Ok(());
            }
            self.advance_step()?;
        }
    }

    fn send_next_frame(&mut self, retransmit: bool) {
        if !self.running {
            return;
        }
        if self.sender.awaiting_ack && !retransmit {
            return;
        }
        let Some(config) = self.config.as_ref() else {
            return;
        };
        if self.sender.next_index >= config.frame_count {
            self.finish();
            return;
        }

        let payload = config.payload(self.sender.next_index);
        let timeout_ms = config.timeout_ms();
        let hop_ms = config.hop_ms;
        let frame_loss = config.frame_loss;

        let tx_id = self.registry.begin_transaction();
        let frame = self.sender.begin_attempt(tx_id, payload);
        self.emit(ProtocolEvent::FrameSent {
            seq: frame.seq,
            payload: frame.payload.clone(),
            tx_id,
            retransmit,
        });

        let handle = self.timer.arm(self.time, timeout_ms, tx_id);
        self.sender.timeout_armed = true;
        self.push_event(handle.fires_at, EventType::TimerExpiry { handle });
        self.emit(ProtocolEvent::TimeoutArmed {
            tx_id,
            after_ms: timeout_ms,
        });

        if let Some(cause) = self.channel.frame_lost(&frame, frame_loss) {
            debug!("Frame {} lost in channel ({:?})", frame.tx_id, cause);
            self.sender.phase = SenderPhase::AwaitingAck;
            self.emit(ProtocolEvent::FrameLost { seq: frame.seq });
            return;
        }
        self.push_event(self.after(hop_ms), EventType::FrameArrival { frame });
    }

    fn on_frame_arrival(&mut self, frame: Frame) {
        if !self.running {
            debug!("Discarding frame {} that arrived after the run", frame.tx_id);
            return;
        }
        self.receiver.phase = ReceiverPhase::Processing;
        if self.sender.is_outstanding(frame.tx_id) && !self.sender.timeout_expired {
            self.sender.phase = SenderPhase::AwaitingAck;
        }
        self.push_event(
            self.after(RECEIVER_PROCESSING_MS),
            EventType::FrameProcessed { frame },
        );
    }

    fn on_frame_processed(&mut self, frame: Frame) {
        if !self.running {
            debug!("Discarding frame {} that arrived after the run", frame.tx_id);
            return;
        }
        let reception = self.receiver.accept(&frame);
        let ack = reception.ack();
        let for_payload = match reception {
            Reception::InOrder { payload, .. } => {
                self.emit(ProtocolEvent::FrameDelivered {
                    seq: frame.seq,
                    payload: payload.clone(),
                });
                payload
            }
            Reception::Duplicate { last_payload, .. } => {
                self.emit(ProtocolEvent::DuplicateFrame { seq: frame.seq });
                last_payload
            }
        };
        self.send_ack(ack, for_payload);
    }

    fn send_ack(&mut self, ack: Ack, for_payload: String) {
        let Some(config) = self.config.as_ref() else {
            return;
        };
        let ack_loss = config.ack_loss;
        let hop_ms = config.hop_ms;

        let lost = self.channel.ack_lost(&for_payload, ack_loss);
        self.emit(ProtocolEvent::AckSent {
            seq: ack.seq,
            for_payload,
        });
        if let Some(cause) = lost {
            debug!("ACK for {} lost in channel ({:?})", ack.tx_id, cause);
            self.emit(ProtocolEvent::AckLost { seq: ack.seq });
            return;
        }
        self.push_event(self.after(hop_ms), EventType::AckArrival { ack });
    }

    /// Applies an ACK that reached the sender. Anything that does not answer
    /// the live, not-yet-timed-out attempt is rejected without touching state.
    pub fn on_ack_received(&mut self, ack: Ack) {
        if !self.running {
            debug!("Discarding ACK {} for {} after the run", ack.seq, ack.tx_id);
            return;
        }

        let rejection = if !self.registry.is_valid(ack.tx_id) {
            Some(RejectReason::StaleTransaction)
        } else if self.sender.active_seq != Some(ack.seq) {
            Some(RejectReason::SequenceMismatch)
        } else if self.sender.timeout_expired {
            Some(RejectReason::AfterTimeout)
        } else {
            None
        };
        if let Some(reason) = rejection {
            self.emit(ProtocolEvent::AckRejected {
                seq: ack.seq,
                reason,
            });
            return;
        }

        self.cancel_timer();
        self.registry.mark_handled(ack.tx_id);
        self.sender.complete();
        self.emit(ProtocolEvent::AckAccepted { seq: ack.seq });

        let (frame_count, step_mode) = match self.config.as_ref() {
            Some(c) => (c.frame_count, c.step_mode),
            None => return,
        };
        if self.sender.next_index >= frame_count {
            self.finish();
        } else if step_mode {
            self.awaiting_step = true;
            self.sender.phase = SenderPhase::WaitingForStep;
        } else {
            self.push_event(self.after(NEXT_FRAME_DELAY_MS), EventType::NextFrame);
        }
    }

    /// Honours a timeout for `tx_id` if it is still the outstanding attempt.
    pub fn on_timeout(&mut self, tx_id: TxId) {
        if !self.running {
            return;
        }
        if !self.sender.is_outstanding(tx_id)
            || self.registry.current() != tx_id
            || self.sender.timeout_expired
        {
            self.emit(ProtocolEvent::StaleTimeout { tx_id });
            return;
        }

        self.sender.timeout_expired = true;
        self.sender.phase = SenderPhase::TimeoutRetransmitting;
        self.emit(ProtocolEvent::TimeoutFired { tx_id });

        let settle = self.config.as_ref().map_or(0, |c| c.hop_ms / 3);
        self.push_event(self.after(settle), EventType::Retransmit { tx_id });
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.armed() {
            self.timer.cancel(handle);
        }
        self.sender.timeout_armed = false;
    }

    fn finish(&mut self) {
        self.running = false;
        self.awaiting_step = false;
        self.cancel_timer();
        self.sender.phase = SenderPhase::Done;
        self.receiver.phase = ReceiverPhase::Done;

        let frame_count = self.config.as_ref().map_or(0, |c| c.frame_count);
        let summary = self.stats.finish(self.time, frame_count);
        self.summary = Some(summary.clone());
        self.emit(ProtocolEvent::RunFinished { summary });
    }

    fn emit(&mut self, event: ProtocolEvent) {
        self.stats.record(&event);
        info!("[{} ms] {}", self.time, event);
        self.events.push(TimedEvent {
            time_ms: self.time,
            event,
        });
    }

    pub fn config(&self) -> Option<&RunConfig> {
        self.config.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_awaiting_step(&self) -> bool {
        self.awaiting_step
    }

    pub fn is_finished(&self) -> bool {
        self.summary.is_some()
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Causal journal of everything emitted since the run started.
    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn sender(&self) -> &SenderState {
        &self.sender
    }

    pub fn receiver(&self) -> &ReceiverState {
        &self.receiver
    }

    pub fn current_tx(&self) -> TxId {
        self.registry.current()
    }

    pub fn statistics(&self) -> &RunStatistics {
        self.stats.snapshot()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            time_ms: self.time,
            running: self.running,
            paused: self.paused,
            awaiting_step: self.awaiting_step,
            finished: self.is_finished(),
            noisy: self.channel.is_noisy(),
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            current_tx: self.registry.current(),
            delivered: self.sender.next_index,
            frame_count: self.config.as_ref().map_or(0, |c| c.frame_count),
            stats: self.stats.snapshot().clone(),
        }
    }

    /// Produce a serializable snapshot of the current run.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration_ms: self.time,
            summary: self.summary.clone(),
            events: self.events.clone(),
        }
    }
}

fn validate(config: &RunConfig) -> Result<(), EngineError> {
    if config.frame_count == 0 {
        return Err(EngineError::InvalidConfiguration(
            "frame count must be positive".into(),
        ));
    }
    if !config.timeout_factor.is_finite() || config.timeout_factor <= 0.0 {
        return Err(EngineError::InvalidConfiguration(format!(
            "timeout factor must be a positive number, got {}",
            config.timeout_factor
        )));
    }
    if config.hop_ms == 0 || config.hop_ms > MAX_HOP_MS {
        return Err(EngineError::InvalidConfiguration(format!(
            "hop duration must be between 1 and {} ms, got {}",
            MAX_HOP_MS, config.hop_ms
        )));
    }
    let timeout_ms = config.timeout_ms();
    if timeout_ms > MAX_TIMEOUT_MS {
        return Err(EngineError::InvalidConfiguration(format!(
            "timeout of {} ms exceeds {} ms",
            timeout_ms, MAX_TIMEOUT_MS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedLoss;
    use arq_lab_abstract::SeqBit;

    fn lossless(frames: u32) -> RunConfig {
        RunConfig {
            frame_count: frames,
            hop_ms: 1000,
            ..Default::default()
        }
    }

    fn kinds(engine: &ProtocolEngine) -> Vec<&'static str> {
        engine.events().iter().map(|e| e.event.kind()).collect()
    }

    #[test]
    fn rejects_zero_frames() {
        let mut engine = ProtocolEngine::new();
        let err = engine
            .start(RunConfig {
                frame_count: 0,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
        assert!(!engine.is_running());
        assert!(engine.events().is_empty());
    }

    #[test]
    fn rejects_non_positive_timeout_factor() {
        let mut engine = ProtocolEngine::new();
        for factor in [0.0, -1.0, f64::NAN] {
            let config = RunConfig {
                timeout_factor: factor,
                ..Default::default()
            };
            assert!(matches!(
                engine.start(config),
                Err(EngineError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn rejects_timing_that_would_overflow_the_clock() {
        let mut engine = ProtocolEngine::new();
        let huge_factor = RunConfig {
            timeout_factor: 1e20,
            ..lossless(2)
        };
        let huge_hop = RunConfig {
            hop_ms: u64::MAX / 2 + 1,
            ..lossless(2)
        };
        for config in [huge_factor, huge_hop] {
            assert!(matches!(
                engine.start(config),
                Err(EngineError::InvalidConfiguration(_))
            ));
            assert!(!engine.is_running());
        }

        engine
            .start(RunConfig {
                hop_ms: MAX_HOP_MS,
                ..lossless(1)
            })
            .unwrap();
        assert_eq!(engine.run_until_complete(u64::MAX), Ok(()));
        assert!(engine.is_finished());
    }

    #[test]
    fn run_until_complete_releases_steps() {
        let mut engine = ProtocolEngine::new();
        engine
            .start(RunConfig {
                step_mode: true,
                ..lossless(3)
            })
            .unwrap();
        engine.run_until_complete(60_000).unwrap();
        assert!(engine.is_finished());
        assert_eq!(engine.statistics().successful_deliveries, 3);
    }

    #[test]
    fn run_until_complete_stops_at_time_limit() {
        // Every attempt times out before its ACK arrives, so the run never ends.
        let mut engine = ProtocolEngine::new();
        engine
            .start(RunConfig {
                timeout_factor: 1.0,
                ..lossless(1)
            })
            .unwrap();
        assert_eq!(
            engine.run_until_complete(30_000),
            Err(EngineError::TimeLimitExceeded(30_000))
        );
        assert!(engine.is_running());
        assert!(engine.current_time() > 30_000);
    }

    #[test]
    fn start_sends_first_frame_immediately() {
        let mut engine = ProtocolEngine::new();
        engine.start(lossless(2)).unwrap();
        assert_eq!(kinds(&engine), ["run_started", "frame_sent", "timeout_armed"]);
        assert!(engine.sender().awaiting_ack);
        assert!(engine.sender().timeout_armed);
        assert_eq!(engine.current_tx(), TxId(1));
    }

    #[test]
    fn first_exchange_timeline() {
        let mut engine = ProtocolEngine::new();
        engine.start(lossless(1)).unwrap();
        engine.run_until_idle();

        let accepted = engine
            .events()
            .iter()
            .find(|e| e.event.kind() == "ack_accepted")
            .unwrap();
        // hop + receiver processing + hop
        assert_eq!(accepted.time_ms, 1000 + RECEIVER_PROCESSING_MS + 1000);
        assert!(engine.is_finished());
        assert_eq!(engine.sender().phase, SenderPhase::Done);
        assert_eq!(engine.receiver().phase, ReceiverPhase::Done);
    }

    #[test]
    fn step_mode_waits_for_advance() {
        let mut engine = ProtocolEngine::new();
        engine
            .start(RunConfig {
                step_mode: true,
                ..lossless(2)
            })
            .unwrap();
        assert!(engine.is_awaiting_step());
        assert_eq!(engine.remaining_events(), 0);

        engine.advance_step().unwrap();
        assert_eq!(engine.advance_step(), Err(EngineError::NoPendingStep));

        engine.run_until_idle();
        assert!(engine.is_awaiting_step());
        assert_eq!(engine.sender().phase, SenderPhase::WaitingForStep);
        assert_eq!(engine.statistics().total_transmissions, 1);

        engine.advance_step().unwrap();
        engine.run_until_idle();
        assert!(engine.is_finished());
        assert_eq!(engine.advance_step(), Err(EngineError::NoPendingStep));
    }

    #[test]
    fn advance_step_outside_step_mode_fails() {
        let mut engine = ProtocolEngine::new();
        assert_eq!(engine.advance_step(), Err(EngineError::NotInStepMode));
        engine.start(lossless(1)).unwrap();
        assert_eq!(engine.advance_step(), Err(EngineError::NotInStepMode));
    }

    #[test]
    fn pause_freezes_clock_and_queue() {
        let mut engine = ProtocolEngine::new();
        engine.start(lossless(2)).unwrap();
        assert!(engine.step());
        let time = engine.current_time();
        let pending = engine.remaining_events();

        assert!(engine.pause());
        assert!(!engine.step());
        engine.run_until_idle();
        assert_eq!(engine.current_time(), time);
        assert_eq!(engine.remaining_events(), pending);

        engine.resume();
        engine.run_until_idle();
        assert!(engine.is_finished());
        assert_eq!(engine.statistics().successful_deliveries, 2);
    }

    #[test]
    fn pause_without_run_is_refused() {
        let mut engine = ProtocolEngine::new();
        assert!(!engine.pause());
        assert!(!engine.is_paused());
    }

    #[test]
    fn reset_discards_in_flight_work() {
        let mut engine = ProtocolEngine::new();
        engine.start(lossless(3)).unwrap();
        engine.step();
        engine.reset();

        assert!(!engine.is_running());
        assert_eq!(engine.remaining_events(), 0);
        assert!(!engine.step());
        assert!(engine.events().is_empty());
        assert_eq!(engine.current_tx(), TxId(0));
        assert_eq!(engine.sender().seq, SeqBit::Zero);
        assert!(!engine.sender().timeout_armed);
        assert_eq!(engine.snapshot().frame_count, 0);
    }

    #[test]
    fn ack_after_run_is_inert() {
        let mut engine = ProtocolEngine::new();
        engine.start(lossless(1)).unwrap();
        engine.run_until_idle();
        let before = engine.events().len();

        engine.on_ack_received(Ack::new(SeqBit::Zero, TxId(1)));
        assert_eq!(engine.events().len(), before);
    }

    #[test]
    fn ack_racing_the_timer_wins_inside_grace_window() {
        // Timer fires at 2160 ms, the ACK lands at 2200 ms, the grace period ends at 2260 ms.
        let mut engine = ProtocolEngine::new();
        engine
            .start(RunConfig {
                timeout_factor: 1.2,
                ..lossless(3)
            })
            .unwrap();
        engine.run_until_idle();

        let stats = engine.summary().unwrap().stats.clone();
        assert_eq!(stats.total_transmissions, 3);
        assert_eq!(stats.retransmissions, 0);
        // The last frame's grace period ends after the run, where timeouts are silently dropped.
        assert_eq!(
            kinds(&engine).iter().filter(|k| **k == "stale_timeout").count(),
            2
        );
        assert!(!kinds(&engine).contains(&"timeout_fired"));
    }

    #[test]
    fn ack_inside_retransmit_settle_window_is_rejected_after_timeout() {
        // Timer at 1800 ms, honoured at 1900 ms, retransmission at 2233 ms; the ACK lands at 2200 ms.
        let mut engine = ProtocolEngine::new();
        engine
            .start(RunConfig {
                timeout_factor: 1.0,
                ..lossless(1)
            })
            .unwrap();
        while engine.step() {
            if kinds(&engine).contains(&"ack_rejected") {
                break;
            }
        }

        let last = &engine.events().last().unwrap().event;
        assert_eq!(
            *last,
            ProtocolEvent::AckRejected {
                seq: SeqBit::Zero,
                reason: RejectReason::AfterTimeout,
            }
        );
        assert_eq!(engine.sender().seq, SeqBit::Zero);
        assert!(engine.sender().awaiting_ack);
    }

    #[test]
    fn explicit_stale_timeout_has_no_effect() {
        let mut engine = ProtocolEngine::with_loss_source(Box::new(ScriptedLoss::default()));
        engine.start(lossless(2)).unwrap();
        let before = engine.sender().clone();

        engine.on_timeout(TxId(42));
        let after = engine.sender();
        assert_eq!(after.active_tx, before.active_tx);
        assert!(!after.timeout_expired);
        assert_eq!(engine.statistics().retransmissions, 0);
        assert_eq!(
            engine.events().last().unwrap().event,
            ProtocolEvent::StaleTimeout { tx_id: TxId(42) }
        );
    }

    #[test]
    fn same_seed_gives_same_run() {
        let config = RunConfig {
            frame_count: 6,
            frame_loss: 0.3,
            ack_loss: 0.3,
            noisy: true,
            seed: 9,
            hop_ms: 500,
            ..Default::default()
        };
        let mut a = ProtocolEngine::new();
        let mut b = ProtocolEngine::new();
        a.start(config.clone()).unwrap();
        b.start(config).unwrap();
        a.run_until_idle();
        b.run_until_idle();
        assert_eq!(a.events(), b.events());
    }
}
