//! Worker process configuration
//!
//! The ingestion worker is launched through the broker distribution's
//! standalone-connect script, given a worker properties file and a sink
//! properties file as positional arguments, with the packaged connector
//! artifact on the classpath. Debug mode injects a blocking
//! remote-debugger attach and lifts gate deadlines for the run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

const DEBUG_ATTACH_OPTS: &str =
    "-agentlib:jdwp=transport=dt_socket,server=y,address=8000,suspend=y";

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_props: PathBuf,
    pub sink_props: PathBuf,
    pub connector_jar: PathBuf,
    pub debug: bool,
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::new()
    }

    /// Build the launch command.
    pub fn command(&self, kafka_bin: &Path) -> Command {
        let mut cmd = Command::new(kafka_bin.join("connect-standalone.sh"));
        cmd.arg(&self.worker_props).arg(&self.sink_props);
        cmd.env("CLASSPATH", &self.connector_jar);
        if self.debug {
            cmd.env("KAFKA_JMX_OPTS", DEBUG_ATTACH_OPTS);
        }
        cmd
    }

    /// Effective gate deadline: none while a debugger may be attached.
    pub fn gate_deadline(&self, configured: Duration) -> Option<Duration> {
        if self.debug {
            None
        } else {
            Some(configured)
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_props: PathBuf::from("system-test-worker.properties"),
            sink_props: PathBuf::from("system-test-s3-sink.properties"),
            connector_jar: PathBuf::from("target/kafka-connect-s3.jar"),
            debug: false,
        }
    }
}

pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: WorkerConfig::default(),
        }
    }

    pub fn worker_props(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.worker_props = path.into();
        self
    }

    pub fn sink_props(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.sink_props = path.into();
        self
    }

    pub fn connector_jar(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.connector_jar = path.into();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn build(self) -> WorkerConfig {
        self.config
    }
}

impl Default for WorkerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
