//! Broker control-plane operations
//!
//! Thin wrapper over the broker's topic administration CLI, invoked as a
//! subprocess. Success and failure are recognized from literal confirmation
//! strings in the tool's output; "does not exist" on delete is treated as
//! success so a fresh run can always start from a clean topic.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::error::{HarnessError, HarnessResult};

pub struct TopicAdmin {
    script: PathBuf,
    bootstrap: String,
}

impl TopicAdmin {
    pub fn new(kafka_bin: &Path, bootstrap: &str) -> Self {
        TopicAdmin {
            script: kafka_bin.join("kafka-topics.sh"),
            bootstrap: bootstrap.to_string(),
        }
    }

    /// Create `name` with the given partition and replication counts.
    pub async fn create_topic(
        &self,
        name: &str,
        partitions: u32,
        replication: u32,
    ) -> HarnessResult<()> {
        let output = self
            .run(&[
                "--create",
                "--topic",
                name,
                "--partitions",
                &partitions.to_string(),
                "--replication-factor",
                &replication.to_string(),
            ])
            .await?;

        if create_confirmed(&output, name) {
            tracing::info!("📦 Created topic '{}' with {} partition(s)", name, partitions);
            Ok(())
        } else {
            Err(HarnessError::Admin {
                operation: format!("create topic '{name}'"),
                output,
            })
        }
    }

    /// Delete `name`. Deleting a topic that does not exist is success.
    pub async fn delete_topic(&self, name: &str) -> HarnessResult<()> {
        let output = self.run(&["--delete", "--topic", name]).await?;

        if delete_tolerable(&output) {
            tracing::info!("🗑️ Deleted topic '{}' (or it was already absent)", name);
            Ok(())
        } else {
            Err(HarnessError::Admin {
                operation: format!("delete topic '{name}'"),
                output,
            })
        }
    }

    /// Grow `name` to `new_count` partitions.
    pub async fn alter_partitions(&self, name: &str, new_count: u32) -> HarnessResult<()> {
        let output = self
            .run(&[
                "--alter",
                "--topic",
                name,
                "--partitions",
                &new_count.to_string(),
            ])
            .await?;

        if alter_confirmed(&output) {
            tracing::info!("📈 Topic '{}' grown to {} partitions", name, new_count);
            Ok(())
        } else {
            Err(HarnessError::Admin {
                operation: format!("alter topic '{name}' to {new_count} partitions"),
                output,
            })
        }
    }

    /// Invoke the CLI and collect stdout and stderr into one blob; the
    /// tool splits its messages across both.
    async fn run(&self, args: &[&str]) -> HarnessResult<String> {
        let mut cmd = Command::new(&self.script);
        cmd.arg("--bootstrap-server").arg(&self.bootstrap).args(args);

        let output = cmd.output().await.map_err(|e| HarnessError::Launch {
            command: self.script.display().to_string(),
            source: e,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        tracing::debug!("[admin] {} -> {}", args.join(" "), combined.trim_end());
        Ok(combined)
    }
}

/// The CLI prints `Created topic <name>.` on success.
fn create_confirmed(output: &str, name: &str) -> bool {
    output.contains(&format!("Created topic {name}."))
}

/// Absent topics are an accepted outcome of delete; anything else needs the
/// CLI's own wording to be clean of errors.
fn delete_tolerable(output: &str) -> bool {
    !output.contains("Error") || output.contains("does not exist")
}

/// The CLI confirms partition growth with a literal marker.
fn alter_confirmed(output: &str) -> bool {
    output.contains("Adding partitions succeeded!")
}
