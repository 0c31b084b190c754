//! Object-store access, checkpoint layout, and content verification

pub mod client;
pub mod layout;
pub mod verifier;

pub use client::StoreClient;
pub use layout::{chain_continues, ChunkIndex, ChunkIndexEntry, KeyLayout};
pub use verifier::StoreVerifier;
