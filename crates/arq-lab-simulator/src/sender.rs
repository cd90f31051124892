use arq_lab_abstract::{Frame, SeqBit, TxId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SenderPhase {
    Idle,
    /// Frame is on the wire towards the receiver.
    Sending,
    AwaitingAck,
    /// Timeout honoured, retransmission pending.
    TimeoutRetransmitting,
    WaitingForStep,
    Done,
}

/// Sender half of the engine. Mutated only by send, ACK and timeout transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderState {
    pub seq: SeqBit,
    pub active_tx: Option<TxId>,
    /// Bit of the outstanding frame, `None` when nothing is in flight.
    pub active_seq: Option<SeqBit>,
    pub awaiting_ack: bool,
    pub timeout_armed: bool,
    /// Set when the timer for `active_tx` was honoured.
    pub timeout_expired: bool,
    /// Index of the next undelivered payload.
    pub next_index: u32,
    pub phase: SenderPhase,
}

impl Default for SenderState {
    fn default() -> Self {
        Self {
            seq: SeqBit::Zero,
            active_tx: None,
            active_seq: None,
            awaiting_ack: false,
            timeout_armed: false,
            timeout_expired: false,
            next_index: 0,
            phase: SenderPhase::Idle,
        }
    }
}

impl SenderState {
    /// Builds the frame for a new attempt and marks it outstanding.
    /// A retransmission calls this again with a fresh id and the same payload.
    pub fn begin_attempt(&mut self, tx_id: TxId, payload: String) -> Frame {
        self.active_tx = Some(tx_id);
        self.active_seq = Some(self.seq);
        self.awaiting_ack = true;
        self.timeout_expired = false;
        self.phase = SenderPhase::Sending;
        Frame::new(self.seq, payload, tx_id)
    }

    pub fn is_outstanding(&self, tx_id: TxId) -> bool {
        self.awaiting_ack && self.active_tx == Some(tx_id)
    }

    /// Valid ACK accepted: toggle the bit and move to the next payload.
    pub fn complete(&mut self) {
        self.active_tx = None;
        self.active_seq = None;
        self.awaiting_ack = false;
        self.timeout_armed = false;
        self.timeout_expired = false;
        self.seq = self.seq.flip();
        self.next_index += 1;
        self.phase = SenderPhase::Idle;
    }
}
