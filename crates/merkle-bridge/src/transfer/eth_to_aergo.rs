//! Ethereum to Aergo: lock on Ethereum, then unfreeze or mint on Aergo.
//!
//! Locks of the Aergo ERC20 are released as native aer by `unfreeze`; locks of
//! any other ERC20 are minted as a pegged ARC1 token by `mint`. Both are proven
//! against the Ethereum `_locks` map at the height Aergo last anchored.

use alloy::{
    primitives::{Address, U256},
    rpc::types::{EIP1186AccountProofResponse, TransactionReceipt, TransactionRequest},
    sol_types::SolCall,
};
use tracing::{info, warn};

use super::MerkleBridge;
use crate::{
    address::AergoAddress,
    chain::{AergoRead, EthereumRead, EthereumSend},
    error::{BridgeError, Result},
    keys::DerivedKeys,
    proof::{Unverified, build_deposit_proof},
    reconcile::{Withdrawable, reconcile},
    settlement::{self, AergoTx, IERC20Allowance, lock_calldata},
};

impl<E: EthereumRead, A: AergoRead> MerkleBridge<E, A> {
    async fn eth_to_aergo_withdrawable(&self, keys: DerivedKeys) -> Result<Withdrawable> {
        let source = self.eth_ledger(keys.eth_trie_key);
        let dest = self.aergo_ledger(keys.aergo_state_key);
        let snapshot = reconcile(&source, &dest).await?;
        snapshot.withdrawable()
    }

    /// Aer unfreezable now by `receiver` on Aergo, and aer locked on Ethereum
    /// but not yet anchored.
    pub async fn unfreezeable(&self, receiver: &AergoAddress) -> Result<Withdrawable> {
        let keys = DerivedKeys::unfreeze(receiver, self.aergo_erc20, &self.layout);
        let balances = self.eth_to_aergo_withdrawable(keys).await?;
        info!(%receiver, withdrawable = %balances.withdrawable, pending = %balances.pending, "unfreezeable");
        Ok(balances)
    }

    /// Pegged `token` mintable now by `receiver` on Aergo, and the amount
    /// locked but not yet anchored.
    pub async fn minteable(&self, receiver: &AergoAddress, token: Address) -> Result<Withdrawable> {
        let keys = DerivedKeys::mint(receiver, token, &self.layout);
        let balances = self.eth_to_aergo_withdrawable(keys).await?;
        info!(%receiver, %token, withdrawable = %balances.withdrawable, pending = %balances.pending, "minteable");
        Ok(balances)
    }

    /// Proof of the total `token` locked toward `receiver`, at the Ethereum
    /// height Aergo last anchored.
    pub async fn build_lock_proof(
        &self,
        receiver: &AergoAddress,
        token: Address,
    ) -> Result<Unverified<EIP1186AccountProofResponse>> {
        let keys = DerivedKeys::unfreeze(receiver, token, &self.layout);
        let source = self.eth_ledger(keys.eth_trie_key);
        let dest = self.aergo_ledger(keys.aergo_state_key);
        build_deposit_proof(&source, &dest).await
    }

    /// Unsigned Aergo `unfreeze` of all anchored aer locked toward `receiver`.
    pub async fn build_unfreeze_tx(&self, sender: &AergoAddress, receiver: &AergoAddress) -> Result<AergoTx> {
        let proof = self.build_lock_proof(receiver, self.aergo_erc20).await?;
        settlement::unfreeze_tx(sender, &self.aergo_bridge, receiver, &proof)
    }

    /// Unsigned Aergo `mint` of all anchored `token` locked toward `receiver`.
    pub async fn build_mint_tx(
        &self,
        sender: &AergoAddress,
        receiver: &AergoAddress,
        token: Address,
    ) -> Result<AergoTx> {
        if token == self.aergo_erc20 {
            return Err(BridgeError::InvalidAmount(
                "the Aergo ERC20 is unfrozen, not minted".to_string(),
            ));
        }
        let proof = self.build_lock_proof(receiver, token).await?;
        settlement::mint_tx(sender, &self.aergo_bridge, receiver, token, &proof)
    }
}

impl<E: EthereumSend, A: AergoRead> MerkleBridge<E, A> {
    fn eth_tx(&self, to: Address, input: Vec<u8>) -> TransactionRequest {
        let tx = TransactionRequest::default()
            .to(to)
            .input(input.into())
            .gas_limit(self.gas_limit);
        match self.eth.default_sender() {
            Some(from) => tx.from(from),
            None => tx,
        }
    }

    /// Let the bridge pull `amount` more of `token` from the sender.
    ///
    /// Uses `increaseAllowance`, falling back to the older `increaseApproval`
    /// when the token rejects it.
    pub async fn increase_approval(&self, token: Address, amount: U256) -> Result<TransactionReceipt> {
        let allowance = IERC20Allowance::increaseAllowanceCall {
            spender: self.eth_bridge,
            addedValue: amount,
        }
        .abi_encode();

        let input = match self.eth.call(self.eth_tx(token, allowance.clone())).await {
            Ok(_) => allowance,
            Err(BridgeError::Rpc(reason)) if reason.contains("revert") => {
                warn!(%token, %reason, "increaseAllowance rejected, trying increaseApproval");
                IERC20Allowance::increaseApprovalCall {
                    spender: self.eth_bridge,
                    addedValue: amount,
                }
                .abi_encode()
            }
            Err(e) => return Err(e),
        };

        self.eth.send(self.eth_tx(token, input)).await
    }

    /// Lock `amount` of `token` in the Ethereum bridge for `receiver` on Aergo.
    pub async fn lock(&self, token: Address, amount: U256, receiver: &AergoAddress) -> Result<TransactionReceipt> {
        info!(%token, %amount, %receiver, "locking on ethereum");
        let input = lock_calldata(token, amount, receiver);
        self.eth.send(self.eth_tx(self.eth_bridge, input.to_vec())).await
    }
}
