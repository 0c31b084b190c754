//! Harness-specific error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Fixture setup failed: {message}")]
    Setup { message: String },

    #[error("Failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process reported failure: {failure_line}\n{}", join_lines(.context))]
    GateFailed {
        failure_line: String,
        context: Vec<String>,
    },

    #[error("No matching process output within {elapsed:?}")]
    GateTimeout { elapsed: Duration },

    #[error("Process output closed before any pattern matched")]
    GateClosed,

    #[error("Interrupted by operator")]
    Cancelled,

    #[error("Admin operation failed: {operation}\n{output}")]
    Admin { operation: String, output: String },

    #[error("Verification failed for '{key}' (gunzipped: {decompressed}):\n  expected: {expected}\n  actual:   {actual}")]
    Verification {
        key: String,
        expected: String,
        actual: String,
        decompressed: bool,
    },

    #[error("Producer error: {0}")]
    Producer(#[from] rdkafka::error::KafkaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

fn join_lines(lines: &[String]) -> String {
    lines.join("\n")
}
