//! Broker-facing collaborators: topic administration and record publication

pub mod admin;
pub mod producer;

pub use admin::TopicAdmin;
pub use producer::{partition_for, RecordProducer};
