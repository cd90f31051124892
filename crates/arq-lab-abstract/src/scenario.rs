use crate::config::RunConfig;
use crate::event::RejectReason;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub config: RunConfigOverride,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RunConfigOverride {
    pub frame_count: Option<u32>,
    pub frame_loss: Option<f64>,
    pub ack_loss: Option<f64>,
    pub timeout_factor: Option<f64>,
    pub hop_ms: Option<u64>,
    pub noisy: Option<bool>,
    pub step_mode: Option<bool>,
    pub seed: Option<u64>,
}

impl RunConfigOverride {
    pub fn apply_to(&self, config: &mut RunConfig) {
        if let Some(v) = self.frame_count {
            config.frame_count = v;
        }
        if let Some(v) = self.frame_loss {
            config.frame_loss = v;
        }
        if let Some(v) = self.ack_loss {
            config.ack_loss = v;
        }
        if let Some(v) = self.timeout_factor {
            config.timeout_factor = v;
        }
        if let Some(v) = self.hop_ms {
            config.hop_ms = v;
        }
        if let Some(v) = self.noisy {
            config.noisy = v;
        }
        if let Some(v) = self.step_mode {
            config.step_mode = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Deterministically drop the first transmission of the frame carrying `payload`
    DropFrame { payload: String },
    /// Deterministically drop the first ACK the receiver sends for `payload`
    DropAck { payload: String },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Every configured frame reached the receiver exactly once
    AllDelivered,
    SuccessfulDeliveries { count: u32 },
    /// Total frame transmissions, retransmissions included
    TransmissionCount { min: u32, max: Option<u32> },
    RetransmissionCount { min: u32, max: Option<u32> },
    /// Number of events of a given kind (e.g. "frame_lost") in the journal
    EventCount {
        event: String,
        min: u32,
        max: Option<u32>,
    },
    /// At least one ACK was rejected for `reason`
    AckRejected { reason: RejectReason },
    /// Run finishes within this much simulated time
    MaxDuration { ms: u64 },
}
