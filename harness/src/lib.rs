//! System-test harness for the broker→object-store ingestion pipeline
//!
//! Validates that the ingestion worker moves records from the broker into
//! chunked, checkpointed objects with exactly-once resumption across
//! restarts and partition growth. The worker, the broker, and the store
//! emulator are external processes; the harness supervises them, gates on
//! their log output, and verifies their persisted state.
//!
//! ## Quick start
//!
//! ```no_run
//! use harness::{cancel_pair, RunConfig, RunContext};
//!
//! # async fn example() -> harness::HarnessResult<()> {
//! let (_handle, cancel) = cancel_pair();
//! let mut ctx = RunContext::initialize(RunConfig::default(), cancel).await?;
//!
//! let result = harness::scenarios::run_scenario("pipeline", &mut ctx).await;
//! ctx.teardown().await;
//! result
//! # }
//! ```

// Core modules
pub mod broker;
pub mod config;
pub mod context;
pub mod error;
pub mod runtime;
pub mod scenarios;
pub mod store;

// Main interfaces - re-exported at crate root for convenience
pub use config::{RunConfig, WorkerConfig};
pub use context::RunContext;
pub use error::{HarnessError, HarnessResult};
pub use runtime::{cancel_pair, GateOutcome, LogGate, SupervisedProcess};

// Supporting types
pub use broker::{RecordProducer, TopicAdmin};
pub use runtime::{CancelHandle, CancelSignal, LineStream};
pub use store::{ChunkIndex, ChunkIndexEntry, KeyLayout, StoreClient, StoreVerifier};
