//! System-test runner
//!
//! Brings up the run fixtures, executes the requested scenario against the
//! live broker and store emulator, and exits non-zero if any assertion
//! fails. Ctrl-C tears down every supervised process before exiting.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use harness::config::{RunConfig, WorkerConfig};
use harness::context::RunContext;
use harness::runtime::cancel_pair;
use harness::scenarios;

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "System tests for the broker -> object-store ingestion pipeline")]
struct Args {
    /// Scenario to run
    #[arg(long, default_value = "pipeline")]
    scenario: String,

    /// Broker bootstrap address
    #[arg(long, default_value = "localhost:9092")]
    bootstrap_server: String,

    /// Directory with the broker distribution's CLI scripts
    #[arg(long, default_value = "standalone-kafka/kafka/bin")]
    kafka_bin: PathBuf,

    /// Store emulator executable
    #[arg(long, default_value = "fakes3")]
    store_command: String,

    /// Store emulator port
    #[arg(long, default_value = "9090")]
    store_port: u16,

    /// Store emulator backing directory (wiped at setup)
    #[arg(long, default_value = "data")]
    store_data: PathBuf,

    /// Worker data directory (wiped at setup; must match the worker
    /// properties)
    #[arg(long, default_value = "/tmp/connect-system-test")]
    connect_data: PathBuf,

    /// Bucket holding all checkpoint objects
    #[arg(long, default_value = "connect-system-test")]
    bucket: String,

    /// Key prefix for checkpoint objects
    #[arg(long, default_value = "systest")]
    namespace: String,

    /// Topic for the checkpoint scenarios
    #[arg(long, default_value = "system-test")]
    topic: String,

    /// Topic for the byte-stream sink scenario
    #[arg(long, default_value = "binary-system-test")]
    binary_topic: String,

    /// Worker properties file
    #[arg(long, default_value = "system-test-worker.properties")]
    worker_props: PathBuf,

    /// Sink properties file
    #[arg(long, default_value = "system-test-s3-sink.properties")]
    sink_props: PathBuf,

    /// Worker properties for the byte-stream sink scenario
    #[arg(long, default_value = "system-test-binary-worker.properties")]
    binary_worker_props: PathBuf,

    /// Sink properties for the byte-stream sink scenario
    #[arg(long, default_value = "system-test-s3-binary-sink.properties")]
    binary_sink_props: PathBuf,

    /// Packaged connector artifact, placed on the worker's classpath
    #[arg(long, default_value = "target/kafka-connect-s3.jar")]
    connector_jar: PathBuf,

    /// Seconds to wait for one commit gate
    #[arg(long, default_value = "15")]
    timeout_secs: u64,

    /// Start the worker with a blocking remote-debugger attach and no gate
    /// deadlines
    #[arg(long)]
    debug: bool,

    /// Enable verbose tracing output
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> RunConfig {
        RunConfig {
            bootstrap: self.bootstrap_server,
            kafka_bin: self.kafka_bin,
            store_command: self.store_command,
            store_port: self.store_port,
            store_data_dir: self.store_data,
            connect_data_dir: self.connect_data,
            bucket: self.bucket,
            namespace: self.namespace,
            topic: self.topic,
            binary_topic: self.binary_topic,
            gate_timeout: Duration::from_secs(self.timeout_secs),
            worker: WorkerConfig::builder()
                .worker_props(self.worker_props)
                .sink_props(self.sink_props)
                .connector_jar(self.connector_jar)
                .debug(self.debug)
                .build(),
            binary_worker_props: self.binary_worker_props,
            binary_sink_props: self.binary_sink_props,
            ..RunConfig::default()
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let scenario = args.scenario.clone();
    tracing::info!("🧪 Starting system-test harness, scenario '{}'", scenario);

    let (cancel_handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupt received, tearing down");
            cancel_handle.trigger();
        }
    });

    let mut ctx = match RunContext::initialize(args.into_config(), cancel).await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!("❌ Setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let result = scenarios::run_scenario(&scenario, &mut ctx).await;
    ctx.teardown().await;

    match result {
        Ok(()) => {
            tracing::info!("🏆 Scenario '{}' passed", scenario);
        }
        Err(e) => {
            tracing::error!("❌ Scenario '{}' failed: {}", scenario, e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("harness=debug,info")
    } else {
        EnvFilter::new("harness=info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
