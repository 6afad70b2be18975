//! Raw-transaction parsing boundary (spec §6 "Mempool interface": "the
//! core re-parses to obtain outputs, hash, and inputs"). Decoding a raw
//! Cardano transaction body is adapter glue, not core matching logic
//! (spec §2's component table puts it outside the core's line budget),
//! so it is a trait boundary like every other external collaborator.

use crate::error::DecodeError;
use crate::external::chain::{ConsumedInput, ProducedOutput};

/// The output-level shape of a mempool transaction once re-parsed,
/// mirroring the fields `ChainFollower` gets from a confirmed
/// `TransactionEvent` minus the slot (mempool transactions have none
/// yet).
#[derive(Debug, Clone)]
pub struct ParsedTransaction {
    pub tx_hash: String,
    pub consumed: Vec<ConsumedInput>,
    pub produced: Vec<ProducedOutput>,
}

/// Parses a raw mempool transaction's bytes into its consumed inputs
/// and produced outputs.
pub trait TxParser: Send + Sync {
    fn parse(&self, era_tag: u16, raw_bytes: &[u8]) -> Result<ParsedTransaction, DecodeError>;
}
