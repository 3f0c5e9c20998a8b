//! The bridge pair as one client.
//!
//! [`MerkleBridge`] binds both chain clients to the two bridge contracts and a
//! storage layout. The per-direction operations live in [`eth_to_aergo`] and
//! [`aergo_to_eth`].

pub mod aergo_to_eth;
pub mod eth_to_aergo;

use alloy::{
    primitives::{Address, B256, keccak256},
    signers::local::PrivateKeySigner,
};
use tracing::{debug, info};

use crate::{
    address::AergoAddress,
    anchor::{self, AnchorStatus},
    chain::{AergoClient, AergoRead, EthereumClient, EthereumRead},
    config::BridgeConfig,
    error::{BridgeError, Result},
    keys::StateKey,
    layout::StorageLayout,
    reconcile::{AergoLedger, EthereumLedger},
};

/// Gas limit of bridge transactions when none is configured.
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

/// Client of one Ethereum/Aergo bridge contract pair.
#[derive(Debug, Clone)]
pub struct MerkleBridge<E, A> {
    eth: E,
    aergo: A,
    eth_bridge: Address,
    aergo_bridge: AergoAddress,
    aergo_erc20: Address,
    layout: StorageLayout,
    gas_limit: u64,
}

impl<E, A> MerkleBridge<E, A> {
    /// `aergo_erc20` is the Ethereum contract of the native Aergo token.
    pub fn new(eth: E, aergo: A, eth_bridge: Address, aergo_bridge: AergoAddress, aergo_erc20: Address) -> Self {
        Self {
            eth,
            aergo,
            eth_bridge,
            aergo_bridge,
            aergo_erc20,
            layout: StorageLayout::default(),
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }

    pub fn with_layout(mut self, layout: StorageLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn eth(&self) -> &E {
        &self.eth
    }

    pub fn aergo(&self) -> &A {
        &self.aergo
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn eth_bridge(&self) -> Address {
        self.eth_bridge
    }

    pub fn aergo_bridge(&self) -> &AergoAddress {
        &self.aergo_bridge
    }
}

impl MerkleBridge<EthereumClient, AergoClient> {
    /// Connect read-only clients for the configured bridge pair.
    pub async fn from_config(config: &BridgeConfig) -> Result<Self> {
        config.validate()?;
        let eth = EthereumClient::connect(&config.ethereum.rpc_url).await?;
        Ok(Self::assemble(config, eth))
    }

    /// Like [`Self::from_config`], with an Ethereum key for direct sends.
    pub async fn from_config_with_signer(config: &BridgeConfig, signer: PrivateKeySigner) -> Result<Self> {
        config.validate()?;
        let eth = EthereumClient::connect_with_signer(&config.ethereum.rpc_url, signer).await?;
        Ok(Self::assemble(config, eth))
    }

    fn assemble(config: &BridgeConfig, eth: EthereumClient) -> Self {
        info!(
            eth_rpc = %config.ethereum.rpc_url,
            aergo_rpc = %config.aergo.rpc_url,
            eth_bridge = %config.ethereum.bridge_address,
            aergo_bridge = %config.aergo.bridge_address,
            layout_version = config.layout.version,
            "bridge client ready"
        );
        Self::new(
            eth,
            AergoClient::new(&config.aergo.rpc_url),
            config.ethereum.bridge_address,
            config.aergo.bridge_address.clone(),
            config.ethereum.aergo_erc20,
        )
        .with_layout(config.layout.clone())
        .with_gas_limit(config.ethereum.gas_limit)
    }
}

impl<E: EthereumRead, A: AergoRead> MerkleBridge<E, A> {
    /// Compare the deployed Ethereum bridge bytecode with the hash the layout
    /// was written for. Layouts without a hash are not checked.
    pub async fn check_layout(&self) -> Result<()> {
        let Some(expected) = self.layout.code_hash else {
            debug!(version = self.layout.version, "layout has no code hash, skipping check");
            return Ok(());
        };

        let code = self.eth.code_at(self.eth_bridge).await?;
        let actual = keccak256(&code);
        if code.is_empty() || actual != expected {
            return Err(BridgeError::LayoutMismatch {
                expected: expected.to_string(),
                actual: if code.is_empty() {
                    "no code".to_string()
                } else {
                    actual.to_string()
                },
            });
        }

        debug!(version = self.layout.version, %actual, "bridge bytecode matches layout");
        Ok(())
    }

    /// Progress of Ethereum state anchoring onto Aergo.
    pub async fn eth_anchor_status(&self) -> Result<AnchorStatus> {
        anchor::eth_anchor_status(&self.aergo, &self.aergo_bridge, &self.layout.aergo, &self.eth).await
    }

    /// Progress of Aergo state anchoring onto Ethereum.
    pub async fn aergo_anchor_status(&self) -> Result<AnchorStatus> {
        anchor::aergo_anchor_status(&self.eth, self.eth_bridge, &self.layout.ethereum, &self.aergo).await
    }

    pub(crate) fn eth_ledger(&self, key: B256) -> EthereumLedger<'_, E> {
        EthereumLedger::new(&self.eth, self.eth_bridge, key, self.layout.ethereum.anchor_height)
    }

    pub(crate) fn aergo_ledger(&self, key: StateKey) -> AergoLedger<'_, A> {
        AergoLedger::new(&self.aergo, &self.aergo_bridge, key, &self.layout.aergo)
    }
}
