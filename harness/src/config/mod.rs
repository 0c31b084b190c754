//! Configuration for the run driver and the worker under test

pub mod run;
pub mod worker;

pub use run::RunConfig;
pub use worker::{WorkerConfig, WorkerConfigBuilder};
