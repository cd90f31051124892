//! Loss model of the simulated link.
//!
//! Random loss is a Bernoulli trial per transmission and is only consulted
//! when the run is noisy. Scripted faults ("drop the first frame carrying
//! `Data-2`") are checked first and apply in both modes.

use std::collections::VecDeque;

use arq_lab_abstract::Frame;
use rand::{Rng, SeedableRng};

/// Source of drop decisions. Swappable so tests can force exact loss sequences.
pub trait LossSource: Send {
    /// Returns true with probability `probability`, independently per call.
    fn should_drop(&mut self, probability: f64) -> bool;
}

/// Uniform random source backed by a seeded `StdRng`.
pub struct RandomLoss {
    rng: rand::rngs::StdRng,
}

impl RandomLoss {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }
}

impl LossSource for RandomLoss {
    fn should_drop(&mut self, probability: f64) -> bool {
        self.rng.random::<f64>() < probability
    }
}

/// Replays a fixed list of decisions, then answers `fallback` forever.
/// Ignores the probability it is asked about.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLoss {
    decisions: VecDeque<bool>,
    fallback: bool,
}

impl ScriptedLoss {
    pub fn new(decisions: impl IntoIterator<Item = bool>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            fallback: false,
        }
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }
}

impl LossSource for ScriptedLoss {
    fn should_drop(&mut self, _probability: f64) -> bool {
        self.decisions.pop_front().unwrap_or(self.fallback)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossCause {
    Random,
    Scripted,
}

pub struct ChannelModel {
    noisy: bool,
    source: Box<dyn LossSource>,
    // Payloads whose first frame transmission gets dropped
    drop_frame_once: Vec<String>,
    // Payloads whose first ACK gets dropped
    drop_ack_once: Vec<String>,
}

impl ChannelModel {
    pub fn new(source: Box<dyn LossSource>) -> Self {
        Self {
            noisy: false,
            source,
            drop_frame_once: Vec::new(),
            drop_ack_once: Vec::new(),
        }
    }

    pub fn set_noisy(&mut self, noisy: bool) {
        self.noisy = noisy;
    }

    pub fn is_noisy(&self) -> bool {
        self.noisy
    }

    pub fn set_source(&mut self, source: Box<dyn LossSource>) {
        self.source = source;
    }

    pub fn add_drop_frame_once(&mut self, payload: impl Into<String>) {
        self.drop_frame_once.push(payload.into());
    }

    pub fn add_drop_ack_once(&mut self, payload: impl Into<String>) {
        self.drop_ack_once.push(payload.into());
    }

    pub fn clear_faults(&mut self) {
        self.drop_frame_once.clear();
        self.drop_ack_once.clear();
    }

    /// Bernoulli trial; a noiseless channel never consults the source.
    pub fn should_drop(&mut self, probability: f64) -> bool {
        if !self.noisy {
            return false;
        }
        self.source.should_drop(probability)
    }

    pub fn frame_lost(&mut self, frame: &Frame, probability: f64) -> Option<LossCause> {
        if take_once(&mut self.drop_frame_once, &frame.payload) {
            return Some(LossCause::Scripted);
        }
        self.should_drop(probability).then_some(LossCause::Random)
    }

    pub fn ack_lost(&mut self, for_payload: &str, probability: f64) -> Option<LossCause> {
        if take_once(&mut self.drop_ack_once, for_payload) {
            return Some(LossCause::Scripted);
        }
        self.should_drop(probability).then_some(LossCause::Random)
    }
}

fn take_once(pending: &mut Vec<String>, payload: &str) -> bool {
    match pending.iter().position(|p| p == payload) {
        Some(pos) => {
            pending.remove(pos);
            true
        }
        None => false,
    }
}
