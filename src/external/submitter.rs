//! Submitter interface (spec §6 "Submitter interface"). The core does
//! not wait for chain inclusion; it fires and lets the chain-follower
//! path observe the outcome.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    Accepted,
    Rejected(String),
}

#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, tx_bytes: Vec<u8>) -> SubmitStatus;
}
