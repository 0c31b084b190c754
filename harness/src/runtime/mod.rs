//! Process lifecycle and log synchronization primitives

pub mod cancel;
pub mod log_gate;
pub mod supervisor;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use log_gate::{GateOutcome, LogGate};
pub use supervisor::{LineStream, SupervisedProcess};
