//! Aergo to Ethereum: freeze or burn on Aergo, then unlock on Ethereum.
//!
//! Freezing native aer and burning pegged ARC1 tokens both add to the Aergo
//! `burns` map; `unlock` on Ethereum releases the ERC20 against a proof of that
//! map at the Aergo height Ethereum last anchored.

use alloy::{
    primitives::{Address, U256},
    rpc::types::TransactionReceipt,
};
use tracing::info;

use super::MerkleBridge;
use crate::{
    address::AergoAddress,
    chain::{AergoRead, AergoStateProof, EthereumRead, EthereumSend},
    error::Result,
    keys::DerivedKeys,
    proof::{Unverified, build_deposit_proof},
    reconcile::{Withdrawable, reconcile},
    settlement::{self, AergoTx, UnlockArgs},
};

impl<E, A> MerkleBridge<E, A> {
    /// Unsigned Aergo `freeze` of `amount` aer toward `receiver` on Ethereum.
    pub fn build_freeze_tx(&self, sender: &AergoAddress, amount: U256, receiver: Address) -> AergoTx {
        settlement::freeze_tx(sender, &self.aergo_bridge, receiver, amount)
    }

    /// Unsigned Aergo `burn` of pegged `minted_token` toward `receiver` on
    /// Ethereum.
    pub fn build_burn_tx(
        &self,
        sender: &AergoAddress,
        amount: U256,
        minted_token: &AergoAddress,
        receiver: Address,
    ) -> AergoTx {
        settlement::burn_tx(sender, &self.aergo_bridge, receiver, amount, minted_token)
    }
}

impl<E: EthereumRead, A: AergoRead> MerkleBridge<E, A> {
    /// `token` unlockable now by `receiver` on Ethereum, and the amount frozen
    /// or burnt on Aergo but not yet anchored.
    pub async fn unlockeable(&self, receiver: Address, token: Address) -> Result<Withdrawable> {
        let keys = DerivedKeys::unlock(receiver, token, &self.layout);
        let source = self.aergo_ledger(keys.aergo_state_key);
        let dest = self.eth_ledger(keys.eth_trie_key);

        let balances = reconcile(&source, &dest).await?.withdrawable()?;
        info!(%receiver, %token, withdrawable = %balances.withdrawable, pending = %balances.pending, "unlockeable");
        Ok(balances)
    }

    /// Proof of the total burnt toward `receiver` for `token`, at the Aergo
    /// height Ethereum last anchored.
    pub async fn build_burn_proof(&self, receiver: Address, token: Address) -> Result<Unverified<AergoStateProof>> {
        let keys = DerivedKeys::unlock(receiver, token, &self.layout);
        let source = self.aergo_ledger(keys.aergo_state_key);
        let dest = self.eth_ledger(keys.eth_trie_key);
        build_deposit_proof(&source, &dest).await
    }

    /// Burn proof of the Aergo ERC20, i.e. of frozen aer.
    pub async fn build_freeze_proof(&self, receiver: Address) -> Result<Unverified<AergoStateProof>> {
        self.build_burn_proof(receiver, self.aergo_erc20).await
    }

    /// Arguments of the `unlock` call, for signing with an external wallet.
    pub async fn build_unlock_args(&self, receiver: Address, token: Address) -> Result<UnlockArgs> {
        let proof = self.build_burn_proof(receiver, token).await?;
        UnlockArgs::from_proof(receiver, token, &proof)
    }
}

impl<E: EthereumSend, A: AergoRead> MerkleBridge<E, A> {
    /// Unlock everything anchored for `receiver` and `token` on Ethereum.
    pub async fn unlock(&self, receiver: Address, token: Address) -> Result<TransactionReceipt> {
        let args = self.build_unlock_args(receiver, token).await?;
        info!(%receiver, %token, balance = %args.balance, leaf_height = args.leaf_height, "unlocking on ethereum");

        let tx = args.to_transaction(self.eth_bridge, self.eth.default_sender(), self.gas_limit);
        self.eth.send(tx).await
    }
}
