use arq_lab_abstract::{Ack, Frame, SeqBit};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReceiverPhase {
    Ready,
    Processing,
    Done,
}

/// What the receiver made of an arriving frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reception {
    /// New frame: delivered, expected bit toggled.
    InOrder { ack: Ack, payload: String },
    /// Already-accepted bit: re-acknowledged with the previous bit, nothing delivered.
    Duplicate { ack: Ack, last_payload: String },
}

impl Reception {
    pub fn ack(&self) -> Ack {
        match self {
            Reception::InOrder { ack, .. } | Reception::Duplicate { ack, .. } => *ack,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiverState {
    pub expected: SeqBit,
    pub last_accepted: Option<String>,
    pub phase: ReceiverPhase,
}

impl Default for ReceiverState {
    fn default() -> Self {
        Self {
            expected: SeqBit::Zero,
            last_accepted: None,
            phase: ReceiverPhase::Ready,
        }
    }
}

impl ReceiverState {
    pub fn accept(&mut self, frame: &Frame) -> Reception {
        self.phase = ReceiverPhase::Ready;
        if frame.seq == self.expected {
            self.expected = self.expected.flip();
            self.last_accepted = Some(frame.payload.clone());
            Reception::InOrder {
                ack: Ack::new(frame.seq, frame.tx_id),
                payload: frame.payload.clone(),
            }
        } else {
            Reception::Duplicate {
                ack: Ack::new(self.expected.flip(), frame.tx_id),
                last_payload: self
                    .last_accepted
                    .clone()
                    .unwrap_or_else(|| "previous".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arq_lab_abstract::TxId;

    #[test]
    fn in_order_frame_toggles_expected_bit() {
        let mut receiver = ReceiverState::default();
        let reception = receiver.accept(&Frame::new(SeqBit::Zero, "Data-1", TxId(1)));

        assert_eq!(
            reception,
            Reception::InOrder {
                ack: Ack::new(SeqBit::Zero, TxId(1)),
                payload: "Data-1".into(),
            }
        );
        assert_eq!(receiver.expected, SeqBit::One);
    }

    #[test]
    fn duplicate_is_reacked_with_previous_bit() {
        let mut receiver = ReceiverState::default();
        receiver.accept(&Frame::new(SeqBit::Zero, "Data-1", TxId(1)));
        let reception = receiver.accept(&Frame::new(SeqBit::Zero, "Data-1", TxId(2)));

        assert_eq!(
            reception,
            Reception::Duplicate {
                ack: Ack::new(SeqBit::Zero, TxId(2)),
                last_payload: "Data-1".into(),
            }
        );
        assert_eq!(receiver.expected, SeqBit::One);
    }
}
