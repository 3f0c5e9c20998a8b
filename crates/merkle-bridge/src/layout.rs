//! Bridge contract storage layouts.
//!
//! Storage keys are derived from the position of state variables inside the
//! deployed bridge contracts. A reordering of the contract's declarations
//! silently moves every key, so the positions live here as a versioned schema
//! loaded from configuration. Setting `code_hash` pins the schema to a specific
//! deployment; [`crate::MerkleBridge::check_layout`] then refuses to run against
//! different bytecode.

use std::collections::HashSet;

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Layout of both bridge contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLayout {
    /// Schema version, bumped whenever a slot or variable name changes.
    #[serde(default = "default_version")]
    pub version: u32,

    /// keccak256 of the Ethereum bridge runtime bytecode this layout describes.
    #[serde(default)]
    pub code_hash: Option<B256>,

    #[serde(default)]
    pub ethereum: EthereumSlots,

    #[serde(default)]
    pub aergo: AergoStateVars,
}

/// Storage slot indices of the EthMerkleBridge state variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthereumSlots {
    /// `_anchorHeight`: last Aergo height whose root was anchored on Ethereum.
    #[serde(default = "default_eth_anchor_height")]
    pub anchor_height: u64,

    /// `_locks`: per account reference, total locked on Ethereum. Unfreezes and
    /// mints on Aergo are proven against this map.
    #[serde(default = "default_eth_locks")]
    pub locks: u64,

    /// `_unlocks`: per account reference, total already unlocked on Ethereum.
    #[serde(default = "default_eth_unlocks")]
    pub unlocks: u64,
}

/// State variable names of the Aergo bridge contract, including Aergo's `_sv__`
/// storage prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AergoStateVars {
    #[serde(default = "default_aergo_anchor_height")]
    pub anchor_height: String,

    #[serde(default = "default_aergo_t_anchor")]
    pub t_anchor: String,

    #[serde(default = "default_aergo_t_final")]
    pub t_final: String,

    /// Map prefix for freezes and burns toward Ethereum.
    #[serde(default = "default_aergo_burns")]
    pub burns: String,

    /// Map prefix for unfreezes of native aergo locked on Ethereum.
    #[serde(default = "default_aergo_unfreezes")]
    pub unfreezes: String,

    /// Map prefix for mints of Ethereum ERC20 tokens.
    #[serde(default = "default_aergo_mints")]
    pub mints: String,
}

fn default_version() -> u32 {
    1
}

fn default_eth_anchor_height() -> u64 {
    1
}

fn default_eth_locks() -> u64 {
    3
}

fn default_eth_unlocks() -> u64 {
    6
}

fn default_aergo_anchor_height() -> String {
    "_sv__anchorHeight".to_string()
}

fn default_aergo_t_anchor() -> String {
    "_sv__tAnchor".to_string()
}

fn default_aergo_t_final() -> String {
    "_sv__tFinal".to_string()
}

fn default_aergo_burns() -> String {
    "_sv__burns-".to_string()
}

fn default_aergo_unfreezes() -> String {
    "_sv__unfreezes-".to_string()
}

fn default_aergo_mints() -> String {
    "_sv__mints-".to_string()
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            version: default_version(),
            code_hash: None,
            ethereum: EthereumSlots::default(),
            aergo: AergoStateVars::default(),
        }
    }
}

impl Default for EthereumSlots {
    fn default() -> Self {
        Self {
            anchor_height: default_eth_anchor_height(),
            locks: default_eth_locks(),
            unlocks: default_eth_unlocks(),
        }
    }
}

impl Default for AergoStateVars {
    fn default() -> Self {
        Self {
            anchor_height: default_aergo_anchor_height(),
            t_anchor: default_aergo_t_anchor(),
            t_final: default_aergo_t_final(),
            burns: default_aergo_burns(),
            unfreezes: default_aergo_unfreezes(),
            mints: default_aergo_mints(),
        }
    }
}

impl StorageLayout {
    /// Reject layouts where two variables share a slot or a name.
    pub fn validate(&self) -> Result<()> {
        let eth = &self.ethereum;
        let slots = [eth.anchor_height, eth.locks, eth.unlocks];
        if slots.iter().collect::<HashSet<_>>().len() != slots.len() {
            return Err(BridgeError::Config(format!(
                "layout v{}: ethereum slots must be distinct, got {slots:?}",
                self.version
            )));
        }

        let aergo = &self.aergo;
        let names = [
            &aergo.anchor_height,
            &aergo.t_anchor,
            &aergo.t_final,
            &aergo.burns,
            &aergo.unfreezes,
            &aergo.mints,
        ];
        if names.iter().any(|n| n.is_empty()) {
            return Err(BridgeError::Config(format!(
                "layout v{}: aergo state variable names must not be empty",
                self.version
            )));
        }
        if names.iter().collect::<HashSet<_>>().len() != names.len() {
            return Err(BridgeError::Config(format!(
                "layout v{}: aergo state variable names must be distinct",
                self.version
            )));
        }

        Ok(())
    }
}
