//! Trait boundaries toward everything this crate treats as an external
//! collaborator (spec §1 "Out of scope", §6): chain sync, mempool,
//! persistent key-value storage, wallet key material, the transaction
//! builder, and the submitter. The core only ever depends on these
//! traits, never on a concrete transport.

pub mod chain;
pub mod kv;
pub mod mempool;
pub mod submitter;
pub mod tx_builder;
pub mod tx_parser;
pub mod wallet;

pub use chain::{ChainEvent, ChainSyncSource, ConsumedInput, ProducedOutput, RollbackEvent, StatusEvent, TransactionEvent};
pub use kv::KvStore;
pub use mempool::{MempoolSource, MempoolTransaction};
pub use submitter::{SubmitStatus, Submitter};
pub use tx_builder::{PlannedRedeemer, TxBuildRequest, TxBuilder, UtxoRef};
pub use tx_parser::{ParsedTransaction, TxParser};
pub use wallet::Wallet;
