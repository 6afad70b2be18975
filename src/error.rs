//! Error taxonomy.
//!
//! One typed error per component boundary, matching the error-handling
//! design in the specification (§7): decode errors are swallowed at the
//! chain/mempool boundary and never propagate, routing/fill/build errors
//! are surfaced as typed results to the matcher, storage errors are
//! retried below this layer, and configuration errors are fatal at
//! startup.

use thiserror::Error;

/// Failure decoding a produced output's datum into an order.
///
/// Decode errors are never fatal: the caller (`ChainFollower` /
/// `MempoolObserver`) logs and skips the output.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("output has no datum")]
    MissingDatum,

    #[error("datum nft_name is empty")]
    EmptyNftName,

    #[error("malformed CBOR: {0}")]
    MalformedCbor(String),

    #[error("unexpected constructor tag: expected {expected}, got {actual}")]
    UnexpectedConstructor { expected: u64, actual: u64 },

    #[error("missing required datum field: {0}")]
    MissingField(&'static str),

    #[error("datum field {field} had the wrong shape: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

/// Errors from `SmartOrderRouter::find_route` and friends.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RouterError {
    #[error("no order book for pair {0}")]
    NoOrderBook(String),

    #[error("order book for pair {0} has no orders on the required side")]
    NoOrders(String),

    #[error("every candidate order exceeded the slippage bound of {0} bps")]
    SlippageExceeded(u32),

    #[error("no intermediate asset connects {input} to {output}")]
    NoIntermediate { input: String, output: String },

    #[error("no multi-hop route found")]
    NoMultiHopRoute,

    #[error("multi-hop routing is disabled")]
    MultiHopDisabled,
}

/// Errors constructing a fill plan from a chosen route.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FillError {
    #[error("partial fill would underflow offered_amount ({offered} - {input})")]
    UnderflowOnPartial { offered: u64, input: u64 },

    #[error("fill amount {fill} exceeds offered amount {offered}")]
    FillExceedsOffered { fill: u64, offered: u64 },

    #[error("reward asset quantity resolved to zero")]
    ZeroRewardAsset,

    #[error("matcher fee would exceed taker input")]
    MatcherFeeWouldExceedInput,
}

/// Errors from the external tx-builder / signer collaborator.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("tx-builder rejected the plan: {0}")]
    BuilderRejected(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Errors from the external KV-store collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage operation failed: {0}")]
    OperationFailed(String),

    #[error("stored record was malformed: {0}")]
    Corrupt(String),
}

/// Fatal configuration errors, raised only at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    #[error("persisted config fingerprint does not match current configuration: stored={stored:?}, current={current:?}")]
    FingerprintMismatch { stored: String, current: String },

    #[error("configuration load failed: {0}")]
    LoadFailed(String),
}
