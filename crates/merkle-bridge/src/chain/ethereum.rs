//! Ethereum adapter over an alloy provider.

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    network::EthereumWallet,
    primitives::{Address, B256, Bytes, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{EIP1186AccountProofResponse, TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::{RpcError, TransportErrorKind},
};
use tracing::{debug, info};

use super::{EthereumRead, EthereumSend};
use crate::error::{BridgeError, Result};

/// Ethereum client backed by any alloy [`Provider`].
///
/// Transactions are signed by whatever wallet the provider carries; use
/// [`EthereumClient::connect_with_signer`] for a local key.
#[derive(Debug, Clone)]
pub struct EthereumClient<P = DynProvider> {
    provider: P,
    sender: Option<Address>,
}

impl EthereumClient<DynProvider> {
    /// Connect a read-only client.
    pub async fn connect(rpc_url: &str) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .connect(rpc_url)
            .await
            .map_err(|e| BridgeError::Rpc(format!("connect {rpc_url}: {e}")))?;

        Ok(Self::new(provider.erased()))
    }

    /// Connect a client that signs transactions with `signer`.
    pub async fn connect_with_signer(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self> {
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect(rpc_url)
            .await
            .map_err(|e| BridgeError::Rpc(format!("connect {rpc_url}: {e}")))?;

        Ok(Self::new(provider.erased()).with_sender(sender))
    }
}

impl<P> EthereumClient<P> {
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            sender: None,
        }
    }

    /// Account used as `from` on transactions built by the bridge.
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }
}

fn pinned_height(block: BlockId) -> Option<u64> {
    match block {
        BlockId::Number(BlockNumberOrTag::Number(n)) => Some(n),
        _ => None,
    }
}

/// Only JSON-RPC error objects carry node semantics. Transport failures are
/// plain RPC errors whatever their text says.
fn rpc_error(e: RpcError<TransportErrorKind>, height: Option<u64>) -> BridgeError {
    match e.as_error_resp() {
        Some(payload) => BridgeError::from_rpc_message(payload.message.to_string(), height),
        None => BridgeError::Rpc(e.to_string()),
    }
}

#[async_trait::async_trait]
impl<P: Provider> EthereumRead for EthereumClient<P> {
    async fn storage_at(&self, contract: Address, key: B256, block: BlockId) -> Result<U256> {
        let value = self
            .provider
            .get_storage_at(contract, U256::from_be_bytes(key.0))
            .block_id(block)
            .await
            .map_err(|e| rpc_error(e, pinned_height(block)))?;

        debug!(%contract, %key, ?block, %value, "eth_getStorageAt");
        Ok(value)
    }

    async fn proof(
        &self,
        contract: Address,
        keys: Vec<B256>,
        height: u64,
    ) -> Result<EIP1186AccountProofResponse> {
        debug!(%contract, ?keys, height, "eth_getProof");
        self.provider
            .get_proof(contract, keys)
            .block_id(BlockId::number(height))
            .await
            .map_err(|e| rpc_error(e, Some(height)))
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes> {
        self.provider.call(tx).await.map_err(|e| rpc_error(e, None))
    }

    async fn code_at(&self, contract: Address) -> Result<Bytes> {
        self.provider
            .get_code_at(contract)
            .await
            .map_err(|e| rpc_error(e, None))
    }

    async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| rpc_error(e, None))
    }
}

#[async_trait::async_trait]
impl<P: Provider> EthereumSend for EthereumClient<P> {
    fn default_sender(&self) -> Option<Address> {
        self.sender
    }

    async fn send(&self, tx: TransactionRequest) -> Result<TransactionReceipt> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| rpc_error(e, None))?;
        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, "transaction broadcast, waiting for receipt");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| BridgeError::Rpc(format!("receipt for {tx_hash}: {e}")))?;

        info!(
            %tx_hash,
            status = receipt.status(),
            block = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "transaction mined"
        );
        Ok(receipt)
    }
}
