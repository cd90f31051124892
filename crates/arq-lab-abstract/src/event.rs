use crate::frame::{SeqBit, TxId};
use crate::stats::RunSummary;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the sender discarded an ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// The ACK answers an attempt that is no longer current or was already handled.
    StaleTransaction,
    /// The ACK's bit does not match the outstanding frame.
    SequenceMismatch,
    /// The attempt already timed out; its retransmission owns the slot now.
    AfterTimeout,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::StaleTransaction => "stale-transaction",
            RejectReason::SequenceMismatch => "sequence-mismatch",
            RejectReason::AfterTimeout => "after-timeout",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the presentation layer can observe, in causal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    RunStarted {
        noisy: bool,
        step_mode: bool,
        frame_count: u32,
    },
    FrameSent {
        seq: SeqBit,
        payload: String,
        tx_id: TxId,
        retransmit: bool,
    },
    TimeoutArmed {
        tx_id: TxId,
        after_ms: u64,
    },
    FrameLost {
        seq: SeqBit,
    },
    FrameDelivered {
        seq: SeqBit,
        payload: String,
    },
    DuplicateFrame {
        seq: SeqBit,
    },
    AckSent {
        seq: SeqBit,
        for_payload: String,
    },
    AckLost {
        seq: SeqBit,
    },
    AckAccepted {
        seq: SeqBit,
    },
    AckRejected {
        seq: SeqBit,
        reason: RejectReason,
    },
    TimeoutFired {
        tx_id: TxId,
    },
    StaleTimeout {
        tx_id: TxId,
    },
    RunFinished {
        summary: RunSummary,
    },
}

impl ProtocolEvent {
    /// Stable snake_case name, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolEvent::RunStarted { .. } => "run_started",
            ProtocolEvent::FrameSent { .. } => "frame_sent",
            ProtocolEvent::TimeoutArmed { .. } => "timeout_armed",
            ProtocolEvent::FrameLost { .. } => "frame_lost",
            ProtocolEvent::FrameDelivered { .. } => "frame_delivered",
            ProtocolEvent::DuplicateFrame { .. } => "duplicate_frame",
            ProtocolEvent::AckSent { .. } => "ack_sent",
            ProtocolEvent::AckLost { .. } => "ack_lost",
            ProtocolEvent::AckAccepted { .. } => "ack_accepted",
            ProtocolEvent::AckRejected { .. } => "ack_rejected",
            ProtocolEvent::TimeoutFired { .. } => "timeout_fired",
            ProtocolEvent::StaleTimeout { .. } => "stale_timeout",
            ProtocolEvent::RunFinished { .. } => "run_finished",
        }
    }
}

impl fmt::Display for ProtocolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolEvent::RunStarted {
                noisy, frame_count, ..
            } => write!(
                f,
                "--- Run started ({}, {} frames) ---",
                if *noisy { "noisy" } else { "noiseless" },
                frame_count
            ),
            ProtocolEvent::FrameSent {
                seq,
                payload,
                tx_id,
                retransmit,
            } => write!(
                f,
                "SENDER -> Frame {seq} '{payload}' [{tx_id}]{}",
                if *retransmit { " (retransmit)" } else { "" }
            ),
            ProtocolEvent::TimeoutArmed { tx_id, after_ms } => {
                write!(f, "Timeout scheduled for {tx_id}: {after_ms} ms")
            }
            ProtocolEvent::FrameLost { seq } => {
                write!(f, "Frame {seq} lost. Waiting for timeout.")
            }
            ProtocolEvent::FrameDelivered { seq, payload } => {
                write!(f, "RECEIVER <- Frame {seq} '{payload}' accepted")
            }
            ProtocolEvent::DuplicateFrame { seq } => {
                write!(f, "RECEIVER duplicate frame {seq}, re-ACK last received")
            }
            ProtocolEvent::AckSent { seq, for_payload } => {
                write!(f, "RECEIVER -> ACK {seq} (for {for_payload})")
            }
            ProtocolEvent::AckLost { seq } => write!(f, "ACK {seq} lost."),
            ProtocolEvent::AckAccepted { seq } => write!(f, "SENDER ACK {seq} received"),
            ProtocolEvent::AckRejected { seq, reason } => {
                write!(f, "SENDER ignored ACK {seq} ({reason})")
            }
            ProtocolEvent::TimeoutFired { tx_id } => {
                write!(f, "Timeout for {tx_id}, no ACK, retransmitting")
            }
            ProtocolEvent::StaleTimeout { tx_id } => {
                write!(f, "Timeout for superseded {tx_id} ignored")
            }
            ProtocolEvent::RunFinished { summary } => write!(
                f,
                "Complete. Successful: {}/{}. Duration {:.2}s. Efficiency {:.1}%. Goodput {:.2} frames/s",
                summary.stats.successful_deliveries,
                summary.frame_count,
                summary.duration_ms as f64 / 1000.0,
                summary.efficiency * 100.0,
                summary.goodput
            ),
        }
    }
}

/// An event stamped with the virtual time (ms) at which it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub time_ms: u64,
    pub event: ProtocolEvent,
}
