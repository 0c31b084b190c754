//! Run-level configuration
//!
//! Everything a whole test run shares: broker and store endpoints, topic
//! names, data directories, and the worker launch configuration. Built
//! once from the command line and threaded by reference through every
//! scenario.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::worker::WorkerConfig;

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Broker bootstrap address, host:port.
    pub bootstrap: String,
    /// Directory holding the broker distribution's CLI scripts.
    pub kafka_bin: PathBuf,
    /// Store emulator executable.
    pub store_command: String,
    pub store_port: u16,
    /// Emulator's backing directory, wiped at setup.
    pub store_data_dir: PathBuf,
    /// The worker's own data directory, wiped at setup. Must match the
    /// worker properties file.
    pub connect_data_dir: PathBuf,
    pub bucket: String,
    /// Key prefix all checkpoint objects live under.
    pub namespace: String,
    pub topic: String,
    pub binary_topic: String,
    /// Deadline for one commit gate.
    pub gate_timeout: Duration,
    /// Bound on waiting for partition metadata to propagate.
    pub metadata_timeout: Duration,
    /// Entry point of the connector's bundled read-back tool.
    pub reader_class: String,
    pub worker: WorkerConfig,
    /// Properties pair for the byte-stream sink variant.
    pub binary_worker_props: PathBuf,
    pub binary_sink_props: PathBuf,
}

impl RunConfig {
    pub fn store_endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.store_port)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            bootstrap: "localhost:9092".to_string(),
            kafka_bin: PathBuf::from("standalone-kafka/kafka/bin"),
            store_command: "fakes3".to_string(),
            store_port: 9090,
            store_data_dir: PathBuf::from("data"),
            connect_data_dir: PathBuf::from("/tmp/connect-system-test"),
            bucket: "connect-system-test".to_string(),
            namespace: "systest".to_string(),
            topic: "system-test".to_string(),
            binary_topic: "binary-system-test".to_string(),
            gate_timeout: Duration::from_secs(15),
            metadata_timeout: Duration::from_secs(30),
            reader_class: "com.deviantart.kafka_connect_s3.S3FilesReader".to_string(),
            worker: WorkerConfig::default(),
            binary_worker_props: PathBuf::from("system-test-binary-worker.properties"),
            binary_sink_props: PathBuf::from("system-test-s3-binary-sink.properties"),
        }
    }
}
