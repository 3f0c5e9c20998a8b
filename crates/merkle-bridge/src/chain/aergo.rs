//! Aergo adapter over the node's JSON-RPC gateway.
//!
//! Binary fields (state keys, roots, proof nodes and state values) travel as
//! standard base64. State values are the JSON text the Lua contract stored.

use alloy::primitives::{B256, Bytes, U256};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::AergoRead;
use crate::{
    address::AergoAddress,
    amount::{parse_amount_value, parse_height_value},
    error::{BridgeError, Result},
    keys::StateKey,
};

/// Inclusion proof of one contract state variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateVarProof {
    #[serde(default)]
    pub inclusion: bool,
    #[serde(default, with = "base64_bytes")]
    pub key: Bytes,
    /// Raw stored value, JSON encoded by the contract. Empty when not included.
    #[serde(default, with = "base64_bytes")]
    pub value: Bytes,
    #[serde(default, with = "base64_seq")]
    pub audit_path: Vec<Bytes>,
    #[serde(default, with = "base64_bytes")]
    pub bitmap: Bytes,
    /// Height of the leaf in the sparse merkle trie.
    #[serde(default)]
    pub height: u32,
}

impl StateVarProof {
    /// The stored value, or `None` when the variable was never written.
    pub fn decoded_value(&self) -> Result<Option<Value>> {
        if !self.inclusion || self.value.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&self.value)?))
    }

    /// The stored value read as an amount; unwritten variables count as zero.
    pub fn amount(&self) -> Result<U256> {
        match self.decoded_value()? {
            Some(value) => parse_amount_value(&value),
            None => Ok(U256::ZERO),
        }
    }
}

/// Inclusion proof of the contract account in the global state trie.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractProof {
    #[serde(default)]
    pub inclusion: bool,
    #[serde(default, with = "base64_bytes")]
    pub key: Bytes,
    #[serde(default, with = "base64_seq")]
    pub audit_path: Vec<Bytes>,
    #[serde(default, with = "base64_bytes")]
    pub bitmap: Bytes,
    #[serde(default)]
    pub height: u32,
}

/// Answer to a contract state query: one variable proof per requested key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AergoStateProof {
    #[serde(default)]
    pub contract_proof: ContractProof,
    #[serde(default)]
    pub var_proofs: Vec<StateVarProof>,
}

/// The header fields the bridge needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AergoBlockHeader {
    pub height: u64,
    /// Root of the global state trie after this block.
    pub blocks_root_hash: B256,
}

#[derive(Deserialize)]
struct RawBlockMetadata {
    header: RawBlockHeader,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlockHeader {
    block_no: Value,
    #[serde(alias = "blocksroothash", with = "base64_bytes")]
    blocks_root_hash: Bytes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlockchainStatus {
    best_height: Value,
}

/// JSON-RPC client for an Aergo node.
#[derive(Debug, Clone)]
pub struct AergoClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl AergoClient {
    pub fn new(rpc_url: &str) -> Self {
        Self::with_client(rpc_url, reqwest::Client::new())
    }

    /// Reuse a configured HTTP client (timeouts, proxies, TLS roots).
    pub fn with_client(rpc_url: &str, client: reqwest::Client) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            client,
        }
    }

    /// Send one JSON-RPC call. Only the `error` member of a response goes
    /// through `classify`; transport and HTTP failures are plain RPC errors.
    async fn request(
        &self,
        method: &str,
        params: Value,
        classify: impl FnOnce(String) -> BridgeError + Send,
    ) -> Result<Value> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self.client.post(&self.rpc_url).json(&request).send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text)
            .map_err(|_| BridgeError::Rpc(format!("{method}: HTTP {status} with body: {text}")))?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            debug!(method, %message, "aergo rpc error");
            return Err(classify(message));
        }
        if !status.is_success() {
            return Err(BridgeError::Rpc(format!("{method}: HTTP {status}")));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| BridgeError::MalformedResponse(format!("{method}: no result in response")))
    }

    async fn state_query(
        &self,
        contract: &AergoAddress,
        keys: &[StateKey],
        root: Option<B256>,
        compressed: bool,
    ) -> Result<AergoStateProof> {
        let storage_keys: Vec<String> = keys.iter().map(|k| STANDARD.encode(k.as_bytes())).collect();
        let params = serde_json::json!([{
            "contractAddress": contract.as_str(),
            "storageKeys": storage_keys,
            "root": root.map(|r| STANDARD.encode(r)),
            "compressed": compressed,
        }]);
        debug!(%contract, keys = keys.len(), ?root, compressed, "queryContractState");

        let result = self
            .request("queryContractState", params, |message| match root {
                Some(_) => BridgeError::from_root_rpc_message(message),
                None => BridgeError::from_rpc_message(message, None),
            })
            .await?;
        let proof: AergoStateProof = serde_json::from_value(result)?;
        if proof.var_proofs.len() != keys.len() {
            return Err(BridgeError::MalformedResponse(format!(
                "queryContractState: asked for {} keys, got {} proofs",
                keys.len(),
                proof.var_proofs.len()
            )));
        }
        Ok(proof)
    }
}

#[async_trait::async_trait]
impl AergoRead for AergoClient {
    async fn query_state(
        &self,
        contract: &AergoAddress,
        keys: &[StateKey],
        root: Option<B256>,
    ) -> Result<Vec<Option<Value>>> {
        let proof = self.state_query(contract, keys, root, false).await?;
        proof.var_proofs.iter().map(StateVarProof::decoded_value).collect()
    }

    async fn query_state_proof(
        &self,
        contract: &AergoAddress,
        keys: &[StateKey],
        root: B256,
    ) -> Result<AergoStateProof> {
        self.state_query(contract, keys, Some(root), true).await
    }

    async fn block_header(&self, height: u64) -> Result<AergoBlockHeader> {
        let result = self
            .request("getBlockMetadata", serde_json::json!([height]), |message| {
                BridgeError::from_rpc_message(message, Some(height))
            })
            .await?;
        let raw: RawBlockMetadata = serde_json::from_value(result)?;

        let block_no = parse_height_value(&raw.header.block_no)?;
        if block_no != height {
            return Err(BridgeError::MalformedResponse(format!(
                "asked for block {height}, node returned {block_no}"
            )));
        }
        let blocks_root_hash = B256::try_from(raw.header.blocks_root_hash.as_ref()).map_err(|_| {
            BridgeError::MalformedResponse(format!(
                "block {height}: blocks root hash is {} bytes",
                raw.header.blocks_root_hash.len()
            ))
        })?;

        Ok(AergoBlockHeader {
            height,
            blocks_root_hash,
        })
    }

    async fn best_height(&self) -> Result<u64> {
        let result = self
            .request("blockchain", serde_json::json!([]), |message| {
                BridgeError::from_rpc_message(message, None)
            })
            .await?;
        let status: RawBlockchainStatus = serde_json::from_value(result)?;
        parse_height_value(&status.best_height)
    }
}

mod base64_bytes {
    use super::*;
    use serde::{Deserializer, Serializer, de};

    pub(super) fn serialize<S: Serializer>(bytes: &Bytes, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Bytes, D::Error> {
        let text = Option::<String>::deserialize(d)?.unwrap_or_default();
        STANDARD.decode(text).map(Bytes::from).map_err(de::Error::custom)
    }
}

mod base64_seq {
    use super::*;
    use serde::{Deserializer, Serializer, de};

    pub(super) fn serialize<S: Serializer>(nodes: &[Bytes], s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_seq(nodes.iter().map(|n| STANDARD.encode(n)))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<Vec<Bytes>, D::Error> {
        Option::<Vec<String>>::deserialize(d)?
            .unwrap_or_default()
            .into_iter()
            .map(|n| STANDARD.decode(n).map(Bytes::from).map_err(de::Error::custom))
            .collect()
    }
}
