//! Run context
//!
//! Owns the clients shared across scenarios (producer, store, admin) and
//! the store emulator fixture. Constructed exactly once by the run driver
//! and passed by reference into each scenario; no global mutable client
//! state.

use std::path::Path;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::Command;

use crate::broker::{RecordProducer, TopicAdmin};
use crate::config::RunConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::runtime::{CancelSignal, LogGate, SupervisedProcess};
use crate::store::{StoreClient, StoreVerifier};

/// Ready marker printed by the store emulator once it is serving.
const STORE_READY_PATTERN: &str = "WEBrick::HTTPServer#start";
const STORE_READY_TIMEOUT: Duration = Duration::from_secs(30);
const BROKER_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct RunContext {
    pub config: RunConfig,
    pub producer: RecordProducer,
    pub store: StoreClient,
    pub admin: TopicAdmin,
    pub cancel: CancelSignal,
    store_emulator: Option<SupervisedProcess>,
}

impl RunContext {
    /// Bring up all run-scoped fixtures: probe the broker, wipe data
    /// directories, recreate the topic, start the store emulator, create
    /// the bucket, connect the producer. Any failure here aborts the whole
    /// run before a scenario executes.
    pub async fn initialize(config: RunConfig, cancel: CancelSignal) -> HarnessResult<RunContext> {
        probe_broker(&config.bootstrap).await?;

        reset_dir(&config.store_data_dir)?;
        reset_dir(&config.connect_data_dir)?;

        let admin = TopicAdmin::new(&config.kafka_bin, &config.bootstrap);
        admin.delete_topic(&config.topic).await?;
        admin.create_topic(&config.topic, 1, 1).await?;

        let store_emulator = start_store_emulator(&config, &cancel).await?;

        let store = StoreClient::new(&config.store_endpoint(), &config.bucket)?;
        store.create_bucket().await?;

        let mut producer = RecordProducer::connect(&config.bootstrap)?;
        producer.refresh_partitions(&config.topic)?;

        tracing::info!("✅ Fixtures ready");
        Ok(RunContext {
            config,
            producer,
            store,
            admin,
            cancel,
            store_emulator: Some(store_emulator),
        })
    }

    pub fn verifier(&self) -> StoreVerifier<'_> {
        StoreVerifier::new(&self.store)
    }

    /// Tear down run-scoped fixtures. Idempotent; never raises for a
    /// process that already exited.
    pub async fn teardown(&mut self) {
        if let Some(mut emulator) = self.store_emulator.take() {
            emulator.stop().await;
        }
        tracing::info!("🏁 Teardown complete");
    }
}

async fn start_store_emulator(
    config: &RunConfig,
    cancel: &CancelSignal,
) -> HarnessResult<SupervisedProcess> {
    let mut cmd = Command::new(&config.store_command);
    cmd.arg("-p")
        .arg(config.store_port.to_string())
        .arg("-r")
        .arg(&config.store_data_dir);

    let mut emulator = SupervisedProcess::spawn("store-emulator", cmd)?;

    let gate = LogGate::until(STORE_READY_PATTERN).deadline(STORE_READY_TIMEOUT);
    match emulator.wait_for(&gate, cancel).await.expect_matched() {
        Ok(_) => Ok(emulator),
        Err(HarnessError::Cancelled) => {
            emulator.stop().await;
            Err(HarnessError::Cancelled)
        }
        Err(e) => {
            emulator.stop().await;
            Err(HarnessError::Setup {
                message: format!("store emulator never became ready: {e}"),
            })
        }
    }
}

/// Cheap liveness check so a missing broker fails the run immediately
/// instead of through a producer timeout minutes later.
async fn probe_broker(bootstrap: &str) -> HarnessResult<()> {
    match tokio::time::timeout(BROKER_PROBE_TIMEOUT, TcpStream::connect(bootstrap)).await {
        Ok(Ok(_)) => {
            tracing::info!("🔌 Broker reachable at {}", bootstrap);
            Ok(())
        }
        Ok(Err(e)) => Err(HarnessError::Setup {
            message: format!("broker not reachable at {bootstrap}: {e}"),
        }),
        Err(_) => Err(HarnessError::Setup {
            message: format!("broker not reachable at {bootstrap}: connect timed out"),
        }),
    }
}

fn reset_dir(path: &Path) -> HarnessResult<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::fs::create_dir_all(path)?;
    tracing::debug!("🧹 Reset {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reset_dir_creates_and_empties() {
        let base = tempdir().unwrap();
        let target = base.path().join("data");

        // Missing directory: created.
        reset_dir(&target).unwrap();
        assert!(target.is_dir());

        // Dirty directory: wiped.
        std::fs::write(target.join("stale"), b"bytes").unwrap();
        reset_dir(&target).unwrap();
        assert!(target.is_dir());
        assert_eq!(std::fs::read_dir(&target).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn probe_fails_fast_on_unreachable_broker() {
        // Reserved port on localhost with nothing listening.
        let err = probe_broker("127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, HarnessError::Setup { .. }));
    }
}
