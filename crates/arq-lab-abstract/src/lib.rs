pub mod config;
pub mod event;
pub mod frame;
pub mod scenario;
pub mod stats;

pub use config::RunConfig;
pub use event::{ProtocolEvent, RejectReason, TimedEvent};
pub use frame::{Ack, Frame, SeqBit, TxId};
pub use scenario::{RunConfigOverride, TestAction, TestAssertion, TestScenario};
pub use stats::{RunStatistics, RunSummary};
