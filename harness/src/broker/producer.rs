//! Record publication
//!
//! Wraps an `rdkafka` threaded producer with the one partitioning contract
//! the scenarios depend on: a keyed record lands on `key mod partitions`,
//! computed from cached topic metadata so the expected per-partition
//! payloads can be derived without consuming the topic back. Unkeyed
//! records are left to the client's default routing, which is partition-0
//! only under a single-partition topic.

use std::collections::HashMap;
use std::time::Duration;

use rdkafka::config::{FromClientConfig, RDKafkaLogLevel};
use rdkafka::producer::{BaseRecord, DefaultProducerContext, Producer, ThreadedProducer};
use rdkafka::ClientConfig;

use crate::error::{HarnessError, HarnessResult};

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const PARTITION_POLL_BACKOFF: Duration = Duration::from_millis(500);

pub struct RecordProducer {
    producer: ThreadedProducer<DefaultProducerContext>,
    partitions: HashMap<String, usize>,
}

impl RecordProducer {
    pub fn connect(bootstrap: &str) -> HarnessResult<Self> {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", bootstrap)
            .set("message.timeout.ms", "0")
            // Keep the cached partition metadata fresh enough that a grown
            // topic becomes visible within one poll interval.
            .set("metadata.max.age.ms", "1000")
            .set_log_level(RDKafkaLogLevel::Warning);

        let producer = ThreadedProducer::from_config(&config)?;
        Ok(RecordProducer {
            producer,
            partitions: HashMap::new(),
        })
    }

    /// Fire-and-forget send. Keyed records get an explicit partition
    /// assignment of `key mod partitions`.
    pub fn send(&self, topic: &str, key: Option<u64>, payload: &[u8]) -> HarnessResult<()> {
        let key_text = key.map(|k| k.to_string());
        let mut record = BaseRecord::<[u8], [u8]>::to(topic).payload(payload);

        if let Some(key_text) = key_text.as_ref() {
            let count = self.partitions.get(topic).copied().unwrap_or(1);
            let partition = partition_for(key.unwrap_or(0), count);
            record = record.key(key_text.as_bytes()).partition(partition as i32);
        }

        self.producer.send(record).map_err(|(e, _)| HarnessError::from(e))
    }

    /// Drain in-flight records. Must be called before asserting on
    /// downstream state whenever send ordering matters.
    pub fn flush(&self, timeout: Duration) -> HarnessResult<()> {
        self.producer.flush(timeout)?;
        Ok(())
    }

    /// Partition count currently cached for `topic`.
    pub fn cached_partitions(&self, topic: &str) -> Option<usize> {
        self.partitions.get(topic).copied()
    }

    /// Fetch broker metadata for `topic` and update the cache.
    pub fn refresh_partitions(&mut self, topic: &str) -> HarnessResult<usize> {
        let metadata = self
            .producer
            .client()
            .fetch_metadata(Some(topic), METADATA_TIMEOUT)?;

        let count = metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .map(|t| t.partitions().len())
            .unwrap_or(0);

        self.partitions.insert(topic.to_string(), count);
        Ok(count)
    }

    /// Poll until the cached metadata shows at least `want` partitions.
    /// Metadata propagation after a partition change is asynchronous, so
    /// this blocks with a short fixed backoff, bounded by `timeout`.
    pub async fn wait_for_partitions(
        &mut self,
        topic: &str,
        want: usize,
        timeout: Duration,
    ) -> HarnessResult<()> {
        let start = tokio::time::Instant::now();
        loop {
            let count = self.refresh_partitions(topic)?;
            if count >= want {
                tracing::info!("📊 Topic '{}' now shows {} partitions", topic, count);
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(HarnessError::Admin {
                    operation: format!("wait for {want} partitions on '{topic}'"),
                    output: format!("still {count} partitions after {:?}", start.elapsed()),
                });
            }
            tracing::debug!(
                "Waiting for partition metadata on '{}' ({} of {})",
                topic,
                count,
                want
            );
            tokio::time::sleep(PARTITION_POLL_BACKOFF).await;
        }
    }
}

/// The deterministic assignment rule scenarios rely on.
pub fn partition_for(key: u64, partition_count: usize) -> usize {
    if partition_count == 0 {
        0
    } else {
        (key % partition_count as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_routing_is_key_mod_count() {
        assert_eq!(partition_for(0, 3), 0);
        assert_eq!(partition_for(200, 3), 2);
        assert_eq!(partition_for(201, 3), 0);
        assert_eq!(partition_for(202, 3), 1);
        assert_eq!(partition_for(7, 1), 0);
    }

    #[test]
    fn zero_partition_metadata_degrades_to_partition_zero() {
        assert_eq!(partition_for(42, 0), 0);
    }

    #[test]
    fn keyed_records_spread_as_the_scenario_expects() {
        // 100 keys starting at 200 over 3 partitions: 33/33/34.
        let mut per_partition = [0usize; 3];
        for key in 200..300u64 {
            per_partition[partition_for(key, 3)] += 1;
        }
        assert_eq!(per_partition, [33, 33, 34]);
    }
}
