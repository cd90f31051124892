use serde::{Deserialize, Serialize};
use std::fmt;

/// The 1-bit sequence number used by Stop-and-Wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SeqBit {
    #[default]
    Zero,
    One,
}

impl SeqBit {
    pub fn flip(self) -> Self {
        match self {
            SeqBit::Zero => SeqBit::One,
            SeqBit::One => SeqBit::Zero,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            SeqBit::Zero => 0,
            SeqBit::One => 1,
        }
    }
}

impl From<SeqBit> for u8 {
    fn from(bit: SeqBit) -> Self {
        bit.as_u8()
    }
}

impl TryFrom<u8> for SeqBit {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SeqBit::Zero),
            1 => Ok(SeqBit::One),
            other => Err(format!("sequence bit must be 0 or 1, got {other}")),
        }
    }
}

impl fmt::Display for SeqBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Identifies one send-or-resend attempt. A retransmission reuses the
/// sequence bit but always gets a fresh id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TxId(pub u64);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub seq: SeqBit,
    /// Opaque data identifier, e.g. `Data-3`.
    pub payload: String,
    pub tx_id: TxId,
}

impl Frame {
    pub fn new(seq: SeqBit, payload: impl Into<String>, tx_id: TxId) -> Self {
        Self {
            seq,
            payload: payload.into(),
            tx_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub seq: SeqBit,
    /// Attempt this ACK answers; copied from the frame that triggered it.
    pub tx_id: TxId,
}

impl Ack {
    pub fn new(seq: SeqBit, tx_id: TxId) -> Self {
        Self { seq, tx_id }
    }
}
