//! Deposit proofs at the anchored height.
//!
//! A settlement on the destination chain is only accepted against the source
//! state root the destination bridge has anchored. The proof is therefore always
//! requested at the destination's recorded anchor height, never at the tip.

use alloy::{primitives::U256, rpc::types::EIP1186AccountProofResponse};
use tracing::debug;

use crate::{
    chain::{AergoRead, AergoStateProof, EthereumRead},
    error::{BridgeError, Result},
    reconcile::{AergoLedger, EthereumLedger, SettlementLedger},
};

/// A proof exactly as the node returned it.
///
/// Nothing here checks the proof against the anchored root. The destination
/// contract does that on settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Unverified<P> {
    proof: P,
    anchor_height: u64,
    amount: U256,
}

impl<P> Unverified<P> {
    pub(crate) fn new(proof: P, anchor_height: u64, amount: U256) -> Self {
        Self {
            proof,
            anchor_height,
            amount,
        }
    }

    /// Source height the proof was taken at.
    pub fn anchor_height(&self) -> u64 {
        self.anchor_height
    }

    /// Cumulative deposit the proof claims.
    pub fn amount(&self) -> U256 {
        self.amount
    }

    pub fn as_unverified(&self) -> &P {
        &self.proof
    }

    pub fn into_unverified(self) -> P {
        self.proof
    }
}

/// A source ledger able to prove its deposit at a past height.
#[async_trait::async_trait]
pub trait ProofSource: Send + Sync {
    type Proof: Send;

    async fn proof_at(&self, height: u64) -> Result<Self::Proof>;

    /// Deposit value carried by `proof`; zero when the key is not included.
    fn proven_deposit(&self, proof: &Self::Proof) -> Result<U256>;
}

/// Fetch the proof of `source`'s deposit at the height `dest` last anchored.
pub async fn build_deposit_proof<S, D>(source: &S, dest: &D) -> Result<Unverified<S::Proof>>
where
    S: ProofSource + ?Sized,
    D: SettlementLedger + ?Sized,
{
    let height = dest.anchor_height().await?;
    if height == 0 {
        return Err(BridgeError::NotYetAvailable(
            "no source state has been anchored yet".to_string(),
        ));
    }

    let proof = source
        .proof_at(height)
        .await
        .map_err(|e| e.at_height(height))?;
    let amount = source.proven_deposit(&proof)?;
    if amount.is_zero() {
        return Err(BridgeError::NotYetAvailable(format!(
            "no deposit included at anchored height {height}"
        )));
    }

    debug!(height, %amount, "deposit proof built");
    Ok(Unverified::new(proof, height, amount))
}

#[async_trait::async_trait]
impl<E: EthereumRead + ?Sized> ProofSource for EthereumLedger<'_, E> {
    type Proof = EIP1186AccountProofResponse;

    async fn proof_at(&self, height: u64) -> Result<Self::Proof> {
        self.client.proof(self.bridge, vec![self.key], height).await
    }

    fn proven_deposit(&self, proof: &Self::Proof) -> Result<U256> {
        match proof.storage_proof.as_slice() {
            [entry] => Ok(entry.value),
            other => Err(BridgeError::MalformedProof(format!(
                "expected one storage proof, got {}",
                other.len()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl<A: AergoRead + ?Sized> ProofSource for AergoLedger<'_, A> {
    type Proof = AergoStateProof;

    async fn proof_at(&self, height: u64) -> Result<Self::Proof> {
        let root = self.root_at(height).await?;
        self.client
            .query_state_proof(self.bridge, std::slice::from_ref(&self.key), root)
            .await
    }

    fn proven_deposit(&self, proof: &Self::Proof) -> Result<U256> {
        match proof.var_proofs.as_slice() {
            [var] => var.amount(),
            other => Err(BridgeError::MalformedProof(format!(
                "expected one state variable proof, got {}",
                other.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address::AergoAddress,
        keys::{DerivedKeys, eth_slot_key},
        layout::StorageLayout,
        tests::{
            fixtures::*,
            mock::{MockAergo, MockEthereum},
        },
    };
    use alloy::primitives::B256;

    #[tokio::test]
    async fn test_lock_proof_at_aergo_anchor() {
        let layout = StorageLayout::default();
        let receiver: AergoAddress = AERGO_RECEIVER.parse().unwrap();
        let bridge: AergoAddress = AERGO_BRIDGE.parse().unwrap();
        let keys = DerivedKeys::unfreeze(&receiver, aergo_erc20(), &layout);

        let eth = MockEthereum::new(1_000);
        eth.set_storage(eth_bridge(), keys.eth_trie_key, 400, amount());
        eth.set_storage(eth_bridge(), keys.eth_trie_key, 800, amount() * U256::from(2));
        let aergo = MockAergo::new(9_000);
        aergo.set_state(None, &crate::keys::StateKey::var("_sv__anchorHeight"), serde_json::json!(500));

        let source = EthereumLedger::new(&eth, eth_bridge(), keys.eth_trie_key, 1);
        let dest = AergoLedger::new(&aergo, &bridge, keys.aergo_state_key.clone(), &layout.aergo);

        let proof = build_deposit_proof(&source, &dest).await.unwrap();
        assert_eq!(proof.anchor_height(), 500);
        assert_eq!(proof.amount(), amount());

        let raw = proof.into_unverified();
        assert_eq!(raw.storage_proof.len(), 1);
        assert_eq!(raw.storage_proof[0].value, amount());
        assert!(!raw.storage_proof[0].proof.is_empty());
        assert_eq!(eth.proof_heights(), vec![500]);
    }

    #[tokio::test]
    async fn test_burn_proof_at_eth_anchor() {
        let layout = StorageLayout::default();
        let bridge: AergoAddress = AERGO_BRIDGE.parse().unwrap();
        let keys = DerivedKeys::unlock(eth_receiver(), aergo_erc20(), &layout);

        let aergo = MockAergo::new(9_000);
        let root = aergo.add_header(7_000);
        aergo.set_state(Some(root), &keys.aergo_state_key, serde_json::json!({"_bignum": "10000000000000000000"}));
        let eth = MockEthereum::new(1_000);
        eth.set_storage(eth_bridge(), eth_slot_key(1), 0, U256::from(7_000));

        let source = AergoLedger::new(&aergo, &bridge, keys.aergo_state_key.clone(), &layout.aergo);
        let dest = EthereumLedger::new(&eth, eth_bridge(), keys.eth_trie_key, 1);

        let proof = build_deposit_proof(&source, &dest).await.unwrap();
        assert_eq!(proof.anchor_height(), 7_000);
        assert_eq!(proof.amount(), amount());
        let var = &proof.as_unverified().var_proofs[0];
        assert!(var.inclusion);
        assert!(!var.audit_path.is_empty());
    }

    #[tokio::test]
    async fn test_absent_deposit_is_not_ready() {
        let layout = StorageLayout::default();
        let bridge: AergoAddress = AERGO_BRIDGE.parse().unwrap();
        let keys = DerivedKeys::unlock(eth_receiver(), aergo_erc20(), &layout);

        let aergo = MockAergo::new(9_000);
        aergo.add_header(7_000);
        let eth = MockEthereum::new(1_000);
        eth.set_storage(eth_bridge(), eth_slot_key(1), 0, U256::from(7_000));

        let source = AergoLedger::new(&aergo, &bridge, keys.aergo_state_key.clone(), &layout.aergo);
        let dest = EthereumLedger::new(&eth, eth_bridge(), keys.eth_trie_key, 1);

        let err = build_deposit_proof(&source, &dest).await.unwrap_err();
        assert!(err.is_not_ready());
    }

    #[tokio::test]
    async fn test_nothing_anchored_is_not_ready() {
        let layout = StorageLayout::default();
        let bridge: AergoAddress = AERGO_BRIDGE.parse().unwrap();
        let keys = DerivedKeys::unlock(eth_receiver(), aergo_erc20(), &layout);
        let aergo = MockAergo::new(9_000);
        let eth = MockEthereum::new(1_000);

        let source = AergoLedger::new(&aergo, &bridge, keys.aergo_state_key.clone(), &layout.aergo);
        let dest = EthereumLedger::new(&eth, eth_bridge(), keys.eth_trie_key, 1);

        assert!(build_deposit_proof(&source, &dest).await.unwrap_err().is_not_ready());
    }

    #[tokio::test]
    async fn test_pruned_proof_height_is_fatal() {
        let layout = StorageLayout::default();
        let receiver: AergoAddress = AERGO_RECEIVER.parse().unwrap();
        let bridge: AergoAddress = AERGO_BRIDGE.parse().unwrap();
        let keys = DerivedKeys::unfreeze(&receiver, aergo_erc20(), &layout);

        let eth = MockEthereum::new(1_000);
        eth.set_storage(eth_bridge(), keys.eth_trie_key, 10, amount());
        eth.prune_below(600);
        let aergo = MockAergo::new(9_000);
        aergo.set_state(None, &crate::keys::StateKey::var("_sv__anchorHeight"), serde_json::json!("500"));

        let source = EthereumLedger::new(&eth, eth_bridge(), keys.eth_trie_key, 1);
        let dest = AergoLedger::new(&aergo, &bridge, keys.aergo_state_key.clone(), &layout.aergo);

        let err = build_deposit_proof(&source, &dest).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::HistoricalStateUnavailable { height: Some(500), .. }
        ));
    }

    #[test]
    fn test_unverified_accessors() {
        let proof = Unverified::new(B256::repeat_byte(1), 12, U256::from(3));
        assert_eq!(proof.anchor_height(), 12);
        assert_eq!(proof.amount(), U256::from(3));
        assert_eq!(*proof.as_unverified(), B256::repeat_byte(1));
        assert_eq!(proof.into_unverified(), B256::repeat_byte(1));
    }
}
