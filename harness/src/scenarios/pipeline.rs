//! Checkpoint pipeline scenario
//!
//! The end-to-end resumption flow, in three phases over shared broker and
//! store state:
//!
//! 1. produce 100 records to a single-partition topic and verify the first
//!    committed chunk;
//! 2. kill the worker, produce 100 more, restart, and verify the second
//!    chunk continues at offset 100 with the first chunk untouched;
//! 3. grow the topic to 3 partitions, produce 100 keyed records, and
//!    verify three independent chunk sequences with the new partitions
//!    starting at offset 0.
//!
//! Records are produced without an intermediate flush: asynchronous
//! batching is what exercises the worker's own flush boundaries.

use crate::broker::partition_for;
use crate::context::RunContext;
use crate::error::{HarnessError, HarnessResult};
use crate::scenarios::context::ScenarioContext;
use crate::store::chain_continues;

const RECORDS_PER_PHASE: u64 = 100;
const EXPANDED_PARTITIONS: u32 = 3;

/// How far through the flow a scenario runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Commit,
    Restart,
    Expand,
}

pub async fn run(ctx: &mut RunContext, through: Phase) -> HarnessResult<()> {
    let topic = ctx.config.topic.clone();
    let mut scenario = ScenarioContext::begin(ctx, &topic);

    let result = drive(&mut scenario, &topic, through).await;
    scenario.shutdown().await;
    result
}

async fn drive(s: &mut ScenarioContext<'_>, topic: &str, through: Phase) -> HarnessResult<()> {
    let first_chunk = initial_commit(s, topic).await?;
    if through < Phase::Restart {
        return Ok(());
    }

    resume_after_restart(s, topic, &first_chunk).await?;
    if through < Phase::Expand {
        return Ok(());
    }

    expand_partitions(s, topic).await
}

/// Phase 1: first commit of a fresh partition starts at offset 0.
async fn initial_commit(s: &mut ScenarioContext<'_>, topic: &str) -> HarnessResult<Vec<u8>> {
    tracing::info!("🧪 Phase 1: initial commit on '{}'", topic);
    s.start_worker().await?;

    let expected = produce_batch(s, topic, 0..RECORDS_PER_PHASE)?;

    s.await_commit(&format!("{topic}-0")).await?;
    s.verify_committed_chunk(0, 0, &expected, RECORDS_PER_PHASE).await?;

    tracing::info!("✅ Phase 1 passed");
    Ok(expected)
}

/// Phase 2: a restarted worker resumes exactly after the last committed
/// chunk, without touching it.
async fn resume_after_restart(
    s: &mut ScenarioContext<'_>,
    topic: &str,
    first_chunk: &[u8],
) -> HarnessResult<()> {
    tracing::info!("🧪 Phase 2: restart and resume on '{}'", topic);
    s.stop_worker().await;

    let expected = produce_batch(s, topic, RECORDS_PER_PHASE..2 * RECORDS_PER_PHASE)?;

    s.start_worker().await?;
    s.await_commit(&format!("{topic}-0")).await?;

    s.verify_committed_chunk(0, RECORDS_PER_PHASE, &expected, RECORDS_PER_PHASE)
        .await?;

    // The first chunk must be untouched by the resumption, and the new
    // index file must continue exactly where it left off. The pointer has
    // moved on, so check the objects directly.
    let verifier = s.run.verifier();
    verifier
        .assert_content(&s.layout.chunk_key(s.date, 0, 0), first_chunk, true)
        .await?;

    let prev = verifier
        .fetch_index(&s.layout.index_key(s.date, 0, 0))
        .await?;
    let next = verifier
        .fetch_index(&s.layout.index_key(s.date, 0, RECORDS_PER_PHASE))
        .await?;
    if !chain_continues(&prev, &next) {
        return Err(HarnessError::Verification {
            key: s.layout.index_key(s.date, 0, RECORDS_PER_PHASE),
            expected: format!("an index resuming at offset {:?}", prev.next_record_offset()),
            actual: format!("an index starting at offset {:?}", next.first_record_offset()),
            decompressed: false,
        });
    }

    tracing::info!("✅ Phase 2 passed");
    Ok(())
}

/// Phase 3: partition growth. Existing partitions continue their offset
/// sequence, new partitions start their own at 0.
async fn expand_partitions(s: &mut ScenarioContext<'_>, topic: &str) -> HarnessResult<()> {
    tracing::info!(
        "🧪 Phase 3: grow '{}' to {} partitions",
        topic,
        EXPANDED_PARTITIONS
    );

    s.run.admin.alter_partitions(topic, EXPANDED_PARTITIONS).await?;
    let metadata_timeout = s.run.config.metadata_timeout;
    s.run
        .producer
        .wait_for_partitions(topic, EXPANDED_PARTITIONS as usize, metadata_timeout)
        .await?;

    let start = 2 * RECORDS_PER_PHASE;
    let per_partition = produce_keyed_batch(s, topic, start..start + RECORDS_PER_PHASE)?;

    // All three partitions commit, in no particular order; wait once per
    // partition on the bare topic prefix.
    for nth in 1..=EXPANDED_PARTITIONS {
        tracing::info!("Commit {}/{}", nth, EXPANDED_PARTITIONS);
        s.await_commit(&format!("{topic}-")).await?;
    }

    // Partition 0 continues its sequence; the new partitions start fresh.
    let continuing = [start, 0, 0];
    for (partition, payload) in per_partition.iter().enumerate() {
        let records = payload.iter().filter(|b| **b == b'\n').count() as u64;
        s.verify_committed_chunk(
            partition as u32,
            continuing[partition],
            payload,
            records,
        )
        .await?;
    }

    tracing::info!("✅ Phase 3 passed");
    Ok(())
}

/// One record body; the counter makes every record unique and ordered.
fn record(counter: u64) -> Vec<u8> {
    format!(r#"{{"foo": "bar", "counter":{counter}}}"#).into_bytes()
}

/// Produce unkeyed records and return the newline-terminated
/// concatenation the worker is expected to persist.
fn produce_batch(
    s: &ScenarioContext<'_>,
    topic: &str,
    counters: std::ops::Range<u64>,
) -> HarnessResult<Vec<u8>> {
    let mut expected = Vec::new();
    for counter in counters {
        let body = record(counter);
        s.run.producer.send(topic, None, &body)?;
        expected.extend_from_slice(&body);
        expected.push(b'\n');
    }
    Ok(expected)
}

/// Produce keyed records and return the expected payload per partition.
fn produce_keyed_batch(
    s: &ScenarioContext<'_>,
    topic: &str,
    counters: std::ops::Range<u64>,
) -> HarnessResult<Vec<Vec<u8>>> {
    let count = EXPANDED_PARTITIONS as usize;
    let mut per_partition = vec![Vec::new(); count];
    for counter in counters {
        let body = record(counter);
        s.run.producer.send(topic, Some(counter), &body)?;
        let slot = &mut per_partition[partition_for(counter, count)];
        slot.extend_from_slice(&body);
        slot.push(b'\n');
    }
    Ok(per_partition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_bodies_are_byte_stable() {
        assert_eq!(record(0), br#"{"foo": "bar", "counter":0}"#.to_vec());
        assert_eq!(record(99), br#"{"foo": "bar", "counter":99}"#.to_vec());
    }

    #[test]
    fn first_batch_has_the_known_uncompressed_length() {
        // 100 newline-terminated records for counters 0..100.
        let total: usize = (0..100u64).map(|c| record(c).len() + 1).sum();
        assert_eq!(total, 2890);
    }

    #[test]
    fn keyed_batch_splits_like_the_worker_will_see_it() {
        let mut per_partition = vec![Vec::new(); 3];
        for counter in 200..300u64 {
            let slot: &mut Vec<u8> = &mut per_partition[partition_for(counter, 3)];
            slot.extend_from_slice(&record(counter));
            slot.push(b'\n');
        }

        assert_eq!(per_partition[0].len(), 990);
        assert_eq!(per_partition[1].len(), 990);
        assert_eq!(per_partition[2].len(), 1020);

        let records: Vec<u64> = per_partition
            .iter()
            .map(|p| p.iter().filter(|b| **b == b'\n').count() as u64)
            .collect();
        assert_eq!(records, vec![33, 33, 34]);
    }

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Commit < Phase::Restart);
        assert!(Phase::Restart < Phase::Expand);
    }
}
