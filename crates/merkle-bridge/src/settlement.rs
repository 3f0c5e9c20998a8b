//! Settlement transactions.
//!
//! Proofs are reshaped into the argument layout of the destination contract.
//! Ethereum settlements come out as [`TransactionRequest`]s; Aergo calls come out
//! as unsigned [`AergoTx`]s for an external wallet to sign.

use alloy::{
    primitives::{Address, B256, Bytes, U256},
    rpc::types::{EIP1186AccountProofResponse, TransactionRequest},
    sol,
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    address::{AergoAddress, eth_address_arg},
    amount::BigNum,
    chain::AergoStateProof,
    error::{BridgeError, Result},
    proof::Unverified,
};

sol! {
    /// Entry points of the Ethereum side bridge.
    interface IEthMerkleBridge {
        function lock(address token, uint256 amount, string receiver) external returns (bool);
        function unlock(
            address receiver,
            uint256 balance,
            address token,
            bytes32[] mp,
            bytes32 bitmap,
            uint8 leafHeight
        ) external returns (bool);
        function _tAnchor() external view returns (uint256);
        function _tFinal() external view returns (uint256);
    }

    /// Allowance extensions; tokens implement one or the other.
    interface IERC20Allowance {
        function increaseAllowance(address spender, uint256 addedValue) external returns (bool);
        function increaseApproval(address spender, uint256 addedValue) external returns (bool);
    }
}

/// Aergo transaction type of a contract call.
pub const TX_TYPE_CALL: u32 = 5;

/// Function call payload of an Aergo contract transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContractCall {
    pub name: String,
    pub args: Vec<Value>,
}

/// An unsigned Aergo contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AergoTx {
    pub from: AergoAddress,
    pub to: AergoAddress,
    /// Native value sent with the call, e.g. `"0 aer"`.
    pub amount: String,
    pub payload: ContractCall,
    #[serde(rename = "type")]
    pub tx_type: u32,
}

impl AergoTx {
    fn call(from: &AergoAddress, to: &AergoAddress, name: &str, args: Vec<Value>) -> Self {
        Self {
            from: from.clone(),
            to: to.clone(),
            amount: "0 aer".to_string(),
            payload: ContractCall {
                name: name.to_string(),
                args,
            },
            tx_type: TX_TYPE_CALL,
        }
    }

    /// The payload as the JSON text carried in the transaction body.
    pub fn payload_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.payload)?)
    }
}

/// Right-pad a proof node into a 32-byte word.
fn pad_word(node: &[u8]) -> Result<B256> {
    if node.len() > 32 {
        return Err(BridgeError::MalformedProof(format!(
            "proof node of {} bytes does not fit a word",
            node.len()
        )));
    }
    Ok(B256::right_padding_from(node))
}

/// Arguments of `EthMerkleBridge.unlock`, for direct sending or for an external
/// wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockArgs {
    pub receiver: Address,
    pub balance: U256,
    pub token: Address,
    pub mp: Vec<B256>,
    pub bitmap: B256,
    pub leaf_height: u8,
}

impl UnlockArgs {
    /// Shape an Aergo burn or freeze proof into `unlock` arguments.
    pub fn from_proof(
        receiver: Address,
        token: Address,
        proof: &Unverified<AergoStateProof>,
    ) -> Result<Self> {
        let var = proof
            .as_unverified()
            .var_proofs
            .first()
            .ok_or_else(|| BridgeError::MalformedProof("no state variable proof".to_string()))?;

        let mp = var
            .audit_path
            .iter()
            .map(|node| pad_word(node))
            .collect::<Result<Vec<_>>>()?;
        let leaf_height = u8::try_from(var.height).map_err(|_| {
            BridgeError::MalformedProof(format!("leaf height {} exceeds a byte", var.height))
        })?;

        Ok(Self {
            receiver,
            balance: var.amount()?,
            token,
            mp,
            bitmap: pad_word(&var.bitmap)?,
            leaf_height,
        })
    }

    pub fn calldata(&self) -> Bytes {
        IEthMerkleBridge::unlockCall {
            receiver: self.receiver,
            balance: self.balance,
            token: self.token,
            mp: self.mp.clone(),
            bitmap: self.bitmap,
            leafHeight: self.leaf_height,
        }
        .abi_encode()
        .into()
    }

    /// The `unlock` call as an unsigned transaction.
    pub fn to_transaction(&self, bridge: Address, from: Option<Address>, gas_limit: u64) -> TransactionRequest {
        let tx = TransactionRequest::default()
            .to(bridge)
            .input(self.calldata().into())
            .gas_limit(gas_limit);
        match from {
            Some(from) => tx.from(from),
            None => tx,
        }
    }
}

/// Calldata of `EthMerkleBridge.lock`.
pub fn lock_calldata(token: Address, amount: U256, receiver: &AergoAddress) -> Bytes {
    IEthMerkleBridge::lockCall {
        token,
        amount,
        receiver: receiver.to_string(),
    }
    .abi_encode()
    .into()
}

/// The single storage proof of an `eth_getProof` answer, with its nodes as
/// `0x` hex strings.
fn lock_proof_args(proof: &Unverified<EIP1186AccountProofResponse>) -> Result<(U256, Vec<Value>)> {
    let entry = match proof.as_unverified().storage_proof.as_slice() {
        [entry] => entry,
        other => {
            return Err(BridgeError::MalformedProof(format!(
                "expected one storage proof, got {}",
                other.len()
            )));
        }
    };
    let nodes = entry
        .proof
        .iter()
        .map(|node| Value::String(alloy::hex::encode_prefixed(node)))
        .collect();
    Ok((entry.value, nodes))
}

/// `unfreeze(receiver, balance, proof)` on the Aergo bridge.
pub fn unfreeze_tx(
    sender: &AergoAddress,
    bridge: &AergoAddress,
    receiver: &AergoAddress,
    proof: &Unverified<EIP1186AccountProofResponse>,
) -> Result<AergoTx> {
    let (balance, nodes) = lock_proof_args(proof)?;
    let args = vec![
        Value::String(receiver.to_string()),
        BigNum(balance).to_json(),
        Value::Array(nodes),
    ];
    Ok(AergoTx::call(sender, bridge, "unfreeze", args))
}

/// `mint(receiver, balance, tokenOrigin, proof)` on the Aergo bridge.
pub fn mint_tx(
    sender: &AergoAddress,
    bridge: &AergoAddress,
    receiver: &AergoAddress,
    token_origin: Address,
    proof: &Unverified<EIP1186AccountProofResponse>,
) -> Result<AergoTx> {
    let (balance, nodes) = lock_proof_args(proof)?;
    let args = vec![
        Value::String(receiver.to_string()),
        BigNum(balance).to_json(),
        Value::String(eth_address_arg(&token_origin)),
        Value::Array(nodes),
    ];
    Ok(AergoTx::call(sender, bridge, "mint", args))
}

/// `freeze(receiver, amount)` on the Aergo bridge; the frozen aer travel as
/// the transaction value.
pub fn freeze_tx(sender: &AergoAddress, bridge: &AergoAddress, receiver: Address, amount: U256) -> AergoTx {
    let mut tx = AergoTx::call(
        sender,
        bridge,
        "freeze",
        vec![Value::String(eth_address_arg(&receiver)), BigNum(amount).to_json()],
    );
    tx.amount = format!("{amount} aer");
    tx
}

/// `burn(receiver, amount, token)` on the Aergo bridge, for tokens it minted.
pub fn burn_tx(
    sender: &AergoAddress,
    bridge: &AergoAddress,
    receiver: Address,
    amount: U256,
    minted_token: &AergoAddress,
) -> AergoTx {
    AergoTx::call(
        sender,
        bridge,
        "burn",
        vec![
            Value::String(eth_address_arg(&receiver)),
            BigNum(amount).to_json(),
            Value::String(minted_token.to_string()),
        ],
    )
}
