use serde::{Deserialize, Serialize};

/// Parameters of one run. Set once at `start` and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub frame_count: u32,
    /// Probability in [0, 1] that a data frame is lost (noisy mode only).
    pub frame_loss: f64,
    /// Probability in [0, 1] that an ACK is lost (noisy mode only).
    pub ack_loss: f64,
    pub timeout_factor: f64,
    /// Nominal one-way transit time in ms.
    pub hop_ms: u64,
    pub noisy: bool,
    pub step_mode: bool,
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            frame_count: 5,
            frame_loss: 0.0,
            ack_loss: 0.0,
            timeout_factor: 2.5,
            hop_ms: 1600,
            noisy: false,
            step_mode: false,
            seed: 0,
        }
    }
}

impl RunConfig {
    /// Copy with both loss probabilities clamped into [0, 1]. NaN counts as 0.
    pub fn clamped(&self) -> Self {
        Self {
            frame_loss: clamp_probability(self.frame_loss),
            ack_loss: clamp_probability(self.ack_loss),
            ..self.clone()
        }
    }

    /// Expected round trip is two hops; the timer gets 90% of `rtt * factor`.
    pub fn timeout_ms(&self) -> u64 {
        let rtt = self.hop_ms.saturating_mul(2) as f64;
        // `as` saturates at u64::MAX for out-of-range results.
        (rtt * self.timeout_factor * 0.9).round() as u64
    }

    /// Payload identifier of the frame at `index` (0-based).
    pub fn payload(&self, index: u32) -> String {
        format!("Data-{}", index + 1)
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}
