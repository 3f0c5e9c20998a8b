//! Read and submit interfaces onto both chains.
//!
//! The protocol code only talks to these traits. [`ethereum::EthereumClient`]
//! and [`aergo::AergoClient`] adapt them onto real nodes; tests plug in
//! in-memory ledgers.

pub mod aergo;
pub mod ethereum;

use alloy::{
    eips::BlockId,
    primitives::{Address, B256, Bytes, U256},
    rpc::types::{EIP1186AccountProofResponse, TransactionReceipt, TransactionRequest},
};
use serde_json::Value;

use crate::{address::AergoAddress, error::Result, keys::StateKey};

pub use aergo::{AergoBlockHeader, AergoClient, AergoStateProof, ContractProof, StateVarProof};
pub use ethereum::EthereumClient;

/// Read access to an Ethereum node.
#[async_trait::async_trait]
pub trait EthereumRead: Send + Sync {
    /// Raw 32-byte storage word, as of `block`.
    async fn storage_at(&self, contract: Address, key: B256, block: BlockId) -> Result<U256>;

    /// `eth_getProof` for `keys` of `contract` at `height`.
    async fn proof(
        &self,
        contract: Address,
        keys: Vec<B256>,
        height: u64,
    ) -> Result<EIP1186AccountProofResponse>;

    /// `eth_call` of `tx` at the latest block.
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes>;

    /// Deployed runtime bytecode of `contract`.
    async fn code_at(&self, contract: Address) -> Result<Bytes>;

    /// Current head height.
    async fn block_number(&self) -> Result<u64>;
}

/// Direct transaction submission on Ethereum, for operations a connected wallet
/// authorizes itself.
#[async_trait::async_trait]
pub trait EthereumSend: EthereumRead {
    /// Account transactions are sent from, if the client holds one.
    fn default_sender(&self) -> Option<Address>;

    /// Sign, broadcast and wait for the receipt.
    async fn send(&self, tx: TransactionRequest) -> Result<TransactionReceipt>;
}

/// Read access to an Aergo node.
#[async_trait::async_trait]
pub trait AergoRead: Send + Sync {
    /// Query state variables of `contract`, one result per key. `None` marks a
    /// key that was never written. `root` pins the query to a past state.
    async fn query_state(
        &self,
        contract: &AergoAddress,
        keys: &[StateKey],
        root: Option<B256>,
    ) -> Result<Vec<Option<Value>>>;

    /// Merkle proof of `keys` in `contract` state under `root`.
    async fn query_state_proof(
        &self,
        contract: &AergoAddress,
        keys: &[StateKey],
        root: B256,
    ) -> Result<AergoStateProof>;

    /// Header of the block at `height`.
    async fn block_header(&self, height: u64) -> Result<AergoBlockHeader>;

    /// Current best height.
    async fn best_height(&self) -> Result<u64>;
}
