pub mod channel;
pub mod engine;
pub mod error;
pub mod receiver;
pub mod scenario_runner;
pub mod sender;
pub mod stats;
pub mod timer;
pub mod trace;
pub mod transaction;

pub use channel::{ChannelModel, LossSource, RandomLoss, ScriptedLoss};
pub use engine::{EngineSnapshot, ProtocolEngine};
pub use error::EngineError;
pub use trace::SimulationReport;
