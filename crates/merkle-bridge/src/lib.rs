//! Client toolkit for the Ethereum <-> Aergo merkle bridge.
//!
//! Each bridge contract periodically anchors the other chain's state root.
//! Deposits on one side become withdrawable on the other once anchored, by
//! submitting a merkle proof of the deposit at the anchored height. This crate
//! derives the storage keys involved, reconciles deposited and withdrawn
//! totals, builds the proofs and assembles the settlement transactions.

pub mod address;
pub mod amount;
pub mod anchor;
pub mod chain;
pub mod config;
pub mod error;
pub mod keys;
pub mod layout;
pub mod proof;
pub mod reconcile;
pub mod settlement;
pub mod transfer;

#[cfg(test)]
mod tests;

pub use address::AergoAddress;
pub use anchor::AnchorStatus;
pub use chain::{AergoClient, EthereumClient};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use keys::DerivedKeys;
pub use layout::StorageLayout;
pub use proof::Unverified;
pub use reconcile::Withdrawable;
pub use settlement::{AergoTx, UnlockArgs};
pub use transfer::MerkleBridge;
