//! Byte-stream sink scenario
//!
//! Runs the worker with the binary sink properties against a dedicated
//! topic, then reads everything back through the connector's bundled
//! reader tool and compares its output byte-for-byte with what was
//! produced. Unlike the checkpoint scenario, records here carry their own
//! trailing newline and the producer is drained explicitly before gating,
//! since the read-back covers the whole topic rather than one commit.

use std::time::Duration;

use tokio::process::Command;

use crate::config::WorkerConfig;
use crate::context::RunContext;
use crate::error::{HarnessError, HarnessResult};
use crate::scenarios::context::ScenarioContext;

const RECORD_COUNT: u64 = 100;
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(ctx: &mut RunContext) -> HarnessResult<()> {
    let topic = ctx.config.binary_topic.clone();
    tracing::info!("🧪 Binary: byte-stream sink round-trip on '{}'", topic);

    // Dedicated topic, recreated so no records from earlier runs leak into
    // the read-back.
    ctx.admin.delete_topic(&topic).await?;
    ctx.admin.create_topic(&topic, 1, 1).await?;

    let worker_config = WorkerConfig::builder()
        .worker_props(ctx.config.binary_worker_props.clone())
        .sink_props(ctx.config.binary_sink_props.clone())
        .connector_jar(ctx.config.worker.connector_jar.clone())
        .debug(ctx.config.worker.debug)
        .build();

    let mut scenario = ScenarioContext::begin(ctx, &topic);
    let result = drive(&mut scenario, &topic, &worker_config).await;
    scenario.shutdown().await;
    result
}

async fn drive(
    s: &mut ScenarioContext<'_>,
    topic: &str,
    worker_config: &WorkerConfig,
) -> HarnessResult<()> {
    s.start_worker_with(worker_config).await?;

    let mut expected = Vec::new();
    for counter in 0..RECORD_COUNT {
        let body = format!("{counter}\n").into_bytes();
        s.run.producer.send(topic, None, &body)?;
        expected.extend_from_slice(&body);
    }
    s.run.producer.flush(FLUSH_TIMEOUT)?;

    s.await_commit(&format!("{topic}-0")).await?;

    let actual = read_back(s.run, worker_config).await?;
    if actual != expected {
        return Err(HarnessError::Verification {
            key: "<reader stdout>".to_string(),
            expected: String::from_utf8_lossy(&expected).into_owned(),
            actual: String::from_utf8_lossy(&actual).into_owned(),
            decompressed: false,
        });
    }

    tracing::info!("✅ Binary round-trip passed");
    Ok(())
}

/// Run the connector's bundled reader over the sink configuration and
/// collect its stdout: the decoded records of every stored chunk, in
/// order.
async fn read_back(run: &RunContext, worker_config: &WorkerConfig) -> HarnessResult<Vec<u8>> {
    let script = run.config.kafka_bin.join("kafka-run-class.sh");
    let mut cmd = Command::new(&script);
    cmd.arg(&run.config.reader_class)
        .arg(&run.config.binary_sink_props)
        .env("CLASSPATH", &worker_config.connector_jar);

    let output = cmd.output().await.map_err(|e| HarnessError::Launch {
        command: script.display().to_string(),
        source: e,
    })?;

    if !output.status.success() {
        return Err(HarnessError::Setup {
            message: format!(
                "reader exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }
    Ok(output.stdout)
}
