//! Per-scenario state
//!
//! Holds the worker process handle, the scenario date used for key
//! prefixes, and the key layout of the topic under test. The date is
//! sourced once when the scenario begins so verification cannot straddle a
//! midnight boundary halfway through.

use std::time::Duration;

use chrono::NaiveDate;

use crate::config::WorkerConfig;
use crate::context::RunContext;
use crate::error::{HarnessError, HarnessResult};
use crate::runtime::{LogGate, SupervisedProcess};
use crate::store::KeyLayout;

/// Emitted once the worker is ready to process records.
pub const WORKER_READY_PATTERN: &str = "finished initialization and start";
/// Emitted on any unrecoverable worker error.
pub const WORKER_FAILURE_PATTERN: &str = "ERROR";
/// Commit lines start with this, followed by `<topic>-<partition>`.
pub const COMMIT_PATTERN_PREFIX: &str = "Successfully uploaded chunk for ";

const WORKER_INIT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ScenarioContext<'a> {
    pub run: &'a mut RunContext,
    pub date: NaiveDate,
    pub layout: KeyLayout,
    worker: Option<SupervisedProcess>,
}

impl<'a> ScenarioContext<'a> {
    pub fn begin(run: &'a mut RunContext, topic: &str) -> Self {
        let layout = KeyLayout::new(run.config.namespace.clone(), topic);
        ScenarioContext {
            run,
            date: chrono::Local::now().date_naive(),
            layout,
            worker: None,
        }
    }

    /// Start the worker with the run's default configuration and block
    /// until it reports readiness.
    pub async fn start_worker(&mut self) -> HarnessResult<()> {
        let config = self.run.config.worker.clone();
        self.start_worker_with(&config).await
    }

    /// Start the worker with an alternate configuration (e.g. the binary
    /// sink properties). Replaces any worker already running.
    pub async fn start_worker_with(&mut self, config: &WorkerConfig) -> HarnessResult<()> {
        self.stop_worker().await;

        let cmd = config.command(&self.run.config.kafka_bin);
        let mut worker = SupervisedProcess::spawn("worker", cmd)?;

        tracing::info!("⏳ Waiting for worker initialization...");
        let gate = LogGate::until(WORKER_READY_PATTERN)
            .until_fail(WORKER_FAILURE_PATTERN)
            .trim_indented()
            .deadline_opt(config.gate_deadline(WORKER_INIT_TIMEOUT));

        match worker.wait_for(&gate, &self.run.cancel).await.expect_matched() {
            Ok(_) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                worker.stop().await;
                Err(e)
            }
        }
    }

    /// Kill the worker and wait for it to exit. No-op without one.
    pub async fn stop_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop().await;
        }
    }

    /// Block until the worker logs a committed chunk for
    /// `topic_partition` (a full `<topic>-<partition>` name, or a bare
    /// `<topic>-` prefix when the partition order is unknown).
    pub async fn await_commit(&mut self, topic_partition: &str) -> HarnessResult<String> {
        let deadline = self
            .run
            .config
            .worker
            .gate_deadline(self.run.config.gate_timeout);

        let Some(worker) = self.worker.as_mut() else {
            return Err(HarnessError::Setup {
                message: "no worker running to observe".to_string(),
            });
        };

        tracing::info!("⏳ Waiting for commit of {}...", topic_partition);
        let gate = LogGate::until(format!("{COMMIT_PATTERN_PREFIX}{topic_partition}"))
            .until_fail(WORKER_FAILURE_PATTERN)
            .trim_indented()
            .deadline_opt(deadline);

        worker.wait_for(&gate, &self.run.cancel).await.expect_matched()
    }

    /// Full checkpoint verification for one freshly committed chunk:
    /// pointer names the new index file, the index covers exactly the
    /// produced records, and the gunzipped payload is byte-identical.
    pub async fn verify_committed_chunk(
        &self,
        partition: u32,
        first_offset: u64,
        payload: &[u8],
        records: u64,
    ) -> HarnessResult<()> {
        let index_key = self.layout.index_key(self.date, partition, first_offset);
        let verifier = self.run.verifier();

        verifier
            .assert_text(&self.layout.pointer_key(partition), &index_key)
            .await?;

        let index = verifier.fetch_index(&index_key).await?;
        let covers_produced = index.first_record_offset() == Some(first_offset)
            && index.total_records() == records
            && index.total_uncompressed() == payload.len() as u64
            && index.chunks.first().map(|c| c.byte_offset) == Some(0);
        if !covers_produced {
            return Err(HarnessError::Verification {
                key: index_key,
                expected: format!(
                    "{records} records from offset {first_offset} covering {} bytes",
                    payload.len()
                ),
                actual: format!("{index:?}"),
                decompressed: false,
            });
        }

        verifier
            .assert_content(
                &self.layout.chunk_key(self.date, partition, first_offset),
                payload,
                true,
            )
            .await?;

        tracing::info!(
            "✅ Partition {} checkpoint verified at offset {}",
            partition,
            first_offset
        );
        Ok(())
    }

    /// Scenario teardown; runs on every exit path.
    pub async fn shutdown(&mut self) {
        self.stop_worker().await;
    }
}
