//! Transaction-builder interface (spec §6 "Tx-builder interface", §9
//! "Interface abstraction over tx-builder"). The core never selects
//! inputs, balances fees, or signs; it only describes what the
//! transaction must contain.

use async_trait::async_trait;

use crate::core::asset::AssetId;
use crate::error::BuildError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoRef {
    pub tx_hash: String,
    pub index: u32,
}

/// The redeemer attached to one consumed script input, lowered from
/// `crate::core::fill_planner::Redeemer` into the builder's
/// constructor-tag/fields shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRedeemer {
    pub input: UtxoRef,
    pub constructor_tag: u64,
    pub fields: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractPayment {
    pub address: String,
    pub datum_cbor: Vec<u8>,
    pub lovelace: u64,
    pub assets: Vec<(AssetId, u64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlainPayment {
    pub address: String,
    pub lovelace: u64,
    pub assets: Vec<(AssetId, u64)>,
}

#[derive(Debug, Clone, Default)]
pub struct TxBuildRequest {
    pub input_utxos: Vec<UtxoRef>,
    pub wallet_utxos: Vec<UtxoRef>,
    pub reference_inputs: Vec<UtxoRef>,
    pub redeemers: Vec<PlannedRedeemer>,
    pub contract_payments: Vec<ContractPayment>,
    pub plain_payments: Vec<PlainPayment>,
    pub ttl: u64,
    pub fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx(pub Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx(pub Vec<u8>);

/// Transaction assembly: input selection, fee balancing, and signing all
/// live behind this interface; the core calls only these three methods.
#[async_trait]
pub trait TxBuilder: Send + Sync {
    async fn build(&self, request: TxBuildRequest) -> Result<UnsignedTx, BuildError>;
    async fn sign(&self, unsigned: UnsignedTx) -> Result<SignedTx, BuildError>;
    fn to_bytes(&self, signed: &SignedTx) -> Vec<u8>;
}
