//! Storage key derivation.
//!
//! Every balance the bridge tracks lives in a map keyed by an *account
//! reference*: receiver bytes followed by asset bytes. On Ethereum the map entry
//! sits at `keccak256(account_ref ++ pad32(slot))` in the bridge's storage trie;
//! on Aergo it is the state variable `<map prefix> ++ account_ref`.
//!
//! Ethereum addresses contribute their 20 raw bytes, Aergo addresses their 52
//! ASCII characters. Byte order and case must match the contracts exactly or
//! the keys silently point at empty slots.

use alloy::primitives::{Address, B256, Bytes, keccak256};

use crate::{address::AergoAddress, layout::StorageLayout};

/// Which way value moves through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    EthToAergo,
    AergoToEth,
}

/// The settlement a derived key pair is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferKind {
    /// Aergo freeze or burn, settled by `unlock` on Ethereum.
    Unlock,
    /// Ethereum lock of the Aergo ERC20, settled by `unfreeze` on Aergo.
    Unfreeze,
    /// Ethereum lock of any other ERC20, settled by `mint` on Aergo.
    Mint,
}

impl TransferKind {
    pub fn direction(self) -> Direction {
        match self {
            Self::Unlock => Direction::AergoToEth,
            Self::Unfreeze | Self::Mint => Direction::EthToAergo,
        }
    }
}

/// Receiver on the destination chain paired with the asset on the source chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetRef {
    bytes: Vec<u8>,
}

impl AssetRef {
    /// Account reference for a receiver on Ethereum.
    pub fn eth_receiver(receiver: Address, asset: Address) -> Self {
        let mut bytes = Vec::with_capacity(40);
        bytes.extend_from_slice(receiver.as_slice());
        bytes.extend_from_slice(asset.as_slice());
        Self { bytes }
    }

    /// Account reference for a receiver on Aergo.
    pub fn aergo_receiver(receiver: &AergoAddress, asset: Address) -> Self {
        let mut bytes = Vec::with_capacity(72);
        bytes.extend_from_slice(receiver.as_bytes());
        bytes.extend_from_slice(asset.as_slice());
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A raw Aergo contract state key. Aergo hashes it node-side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey(Bytes);

impl StateKey {
    /// A state variable without map index, e.g. `_sv__anchorHeight`.
    pub fn var(name: &str) -> Self {
        Self(Bytes::copy_from_slice(name.as_bytes()))
    }

    /// An entry of a map state variable.
    pub fn map_entry(prefix: &str, account_ref: &AssetRef) -> Self {
        let mut key = Vec::with_capacity(prefix.len() + account_ref.as_bytes().len());
        key.extend_from_slice(prefix.as_bytes());
        key.extend_from_slice(account_ref.as_bytes());
        Self(key.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Ethereum storage trie key of a `mapping(bytes => uint)` entry at `slot`.
pub fn eth_trie_key(account_ref: &AssetRef, slot: u64) -> B256 {
    let mut preimage = Vec::with_capacity(account_ref.as_bytes().len() + 32);
    preimage.extend_from_slice(account_ref.as_bytes());
    preimage.extend_from_slice(B256::left_padding_from(&slot.to_be_bytes()).as_slice());
    keccak256(preimage)
}

/// Ethereum storage key of a plain value variable at `slot`.
pub fn eth_slot_key(slot: u64) -> B256 {
    B256::left_padding_from(&slot.to_be_bytes())
}

/// The pair of keys tracking one receiver/asset balance on both chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKeys {
    pub kind: TransferKind,
    /// Key in the Ethereum bridge storage trie.
    pub eth_trie_key: B256,
    /// Key in the Aergo bridge contract state.
    pub aergo_state_key: StateKey,
}

impl DerivedKeys {
    /// Aergo freeze/burn toward `receiver` on Ethereum: the deposit lives in the
    /// Aergo `burns` map, the settled total in the Ethereum `_unlocks` map.
    pub fn unlock(receiver: Address, asset: Address, layout: &StorageLayout) -> Self {
        let account_ref = AssetRef::eth_receiver(receiver, asset);
        Self {
            kind: TransferKind::Unlock,
            eth_trie_key: eth_trie_key(&account_ref, layout.ethereum.unlocks),
            aergo_state_key: StateKey::map_entry(&layout.aergo.burns, &account_ref),
        }
    }

    /// Ethereum lock of the Aergo ERC20 toward `receiver` on Aergo.
    pub fn unfreeze(receiver: &AergoAddress, asset: Address, layout: &StorageLayout) -> Self {
        let account_ref = AssetRef::aergo_receiver(receiver, asset);
        Self {
            kind: TransferKind::Unfreeze,
            eth_trie_key: eth_trie_key(&account_ref, layout.ethereum.locks),
            aergo_state_key: StateKey::map_entry(&layout.aergo.unfreezes, &account_ref),
        }
    }

    /// Ethereum lock of a foreign ERC20 toward `receiver` on Aergo.
    pub fn mint(receiver: &AergoAddress, asset: Address, layout: &StorageLayout) -> Self {
        let account_ref = AssetRef::aergo_receiver(receiver, asset);
        Self {
            kind: TransferKind::Mint,
            eth_trie_key: eth_trie_key(&account_ref, layout.ethereum.locks),
            aergo_state_key: StateKey::map_entry(&layout.aergo.mints, &account_ref),
        }
    }

    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address::parse_eth_address,
        tests::fixtures::{AERGO_ERC20, AERGO_RECEIVER, ETH_RECEIVER, TEST_ERC20},
    };
    use alloy::primitives::b256;

    fn receiver() -> Address {
        parse_eth_address(ETH_RECEIVER).unwrap()
    }

    fn aergo_erc20() -> Address {
        parse_eth_address(AERGO_ERC20).unwrap()
    }

    #[test]
    fn test_unlock_trie_key_layout() {
        let keys = DerivedKeys::unlock(receiver(), aergo_erc20(), &StorageLayout::default());

        let mut preimage = Vec::new();
        preimage.extend_from_slice(receiver().as_slice());
        preimage.extend_from_slice(aergo_erc20().as_slice());
        preimage.extend_from_slice(&[0u8; 31]);
        preimage.push(0x06);
        assert_eq!(keys.eth_trie_key, keccak256(&preimage));

        assert_eq!(
            keys.eth_trie_key,
            b256!("e5513f20d1c63d4947323e7b263dea312475f9a869140c6dc917507654dbe00e")
        );
    }

    #[test]
    fn test_unlock_state_key() {
        let keys = DerivedKeys::unlock(receiver(), aergo_erc20(), &StorageLayout::default());
        let key = keys.aergo_state_key.as_bytes();

        assert_eq!(&key[..11], b"_sv__burns-");
        assert_eq!(&key[11..31], receiver().as_slice());
        assert_eq!(&key[31..], aergo_erc20().as_slice());
        assert_eq!(keys.direction(), Direction::AergoToEth);
    }

    #[test]
    fn test_unfreeze_keys() {
        let aergo_receiver: AergoAddress = AERGO_RECEIVER.parse().unwrap();
        let keys = DerivedKeys::unfreeze(&aergo_receiver, aergo_erc20(), &StorageLayout::default());

        let mut preimage = AERGO_RECEIVER.as_bytes().to_vec();
        preimage.extend_from_slice(aergo_erc20().as_slice());
        preimage.extend_from_slice(&[0u8; 31]);
        preimage.push(0x03);
        assert_eq!(keys.eth_trie_key, keccak256(&preimage));
        assert_eq!(
            keys.eth_trie_key,
            b256!("9339aa3bfc7aa2ab4342f6806d8913e6d0a0e7e13eac13999f6a36d2a8c40e8c")
        );

        let mut state_key = format!("_sv__unfreezes-{AERGO_RECEIVER}").into_bytes();
        state_key.extend_from_slice(aergo_erc20().as_slice());
        assert_eq!(keys.aergo_state_key.as_bytes(), state_key.as_slice());
        assert_eq!(keys.direction(), Direction::EthToAergo);
    }

    #[test]
    fn test_mint_shares_lock_key_with_unfreeze() {
        let aergo_receiver: AergoAddress = AERGO_RECEIVER.parse().unwrap();
        let asset = parse_eth_address(TEST_ERC20).unwrap();
        let layout = StorageLayout::default();

        let mint = DerivedKeys::mint(&aergo_receiver, asset, &layout);
        let unfreeze = DerivedKeys::unfreeze(&aergo_receiver, asset, &layout);

        assert_eq!(mint.eth_trie_key, unfreeze.eth_trie_key);
        assert_ne!(mint.aergo_state_key, unfreeze.aergo_state_key);
        assert!(mint.aergo_state_key.as_bytes().starts_with(b"_sv__mints-"));
    }

    #[test]
    fn test_keys_are_deterministic_and_input_sensitive() {
        let layout = StorageLayout::default();
        let a = DerivedKeys::unlock(receiver(), aergo_erc20(), &layout);
        let b = DerivedKeys::unlock(receiver(), aergo_erc20(), &layout);
        assert_eq!(a, b);

        let other_asset = parse_eth_address(TEST_ERC20).unwrap();
        let c = DerivedKeys::unlock(receiver(), other_asset, &layout);
        assert_ne!(a.eth_trie_key, c.eth_trie_key);
        assert_ne!(a.aergo_state_key, c.aergo_state_key);

        let d = DerivedKeys::unlock(Address::repeat_byte(0x11), aergo_erc20(), &layout);
        assert_ne!(a.eth_trie_key, d.eth_trie_key);

        // swapping receiver and asset must not collide
        let e = DerivedKeys::unlock(aergo_erc20(), receiver(), &layout);
        assert_ne!(a.eth_trie_key, e.eth_trie_key);
    }

    #[test]
    fn test_layout_slot_drives_key() {
        let mut layout = StorageLayout::default();
        let before = DerivedKeys::unlock(receiver(), aergo_erc20(), &layout);
        layout.ethereum.unlocks = 7;
        let after = DerivedKeys::unlock(receiver(), aergo_erc20(), &layout);
        assert_ne!(before.eth_trie_key, after.eth_trie_key);
        assert_eq!(before.aergo_state_key, after.aergo_state_key);
    }

    #[test]
    fn test_eth_slot_key() {
        assert_eq!(
            eth_slot_key(1),
            b256!("0000000000000000000000000000000000000000000000000000000000000001")
        );
    }
}
