//! Anchor progress of both bridge directions.

use alloy::{
    eips::BlockId,
    primitives::{Address, U256},
    rpc::types::TransactionRequest,
    sol_types::{SolCall, SolType, sol_data},
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    address::AergoAddress,
    amount::parse_height_value,
    chain::{AergoRead, EthereumRead},
    error::{BridgeError, Result},
    keys::{StateKey, eth_slot_key},
    layout::{AergoStateVars, EthereumSlots},
    settlement::IEthMerkleBridge,
};

/// Where a bridge stands relative to the chain it anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnchorStatus {
    /// Last anchored height of the anchored chain.
    pub last_anchor_height: u64,
    /// Minimum number of anchored-chain blocks between two anchors.
    pub t_anchor: u64,
    /// Blocks an anchored-chain block needs before it is final.
    pub t_final: u64,
    /// Best height of the anchored chain right now.
    pub best_height: u64,
}

impl AnchorStatus {
    /// Blocks left before the next anchor may be made. Zero when overdue.
    pub fn blocks_until_next_anchor(&self) -> u64 {
        let elapsed = self.best_height.saturating_sub(self.last_anchor_height);
        self.t_anchor.saturating_sub(elapsed)
    }
}

fn required_height(value: Option<&Option<Value>>, name: &str) -> Result<u64> {
    match value {
        Some(Some(v)) => parse_height_value(v),
        _ => Err(BridgeError::NotYetAvailable(format!("{name} is not set"))),
    }
}

/// Anchoring of Ethereum state onto Aergo.
pub async fn eth_anchor_status<A, E>(
    aergo: &A,
    aergo_bridge: &AergoAddress,
    vars: &AergoStateVars,
    eth: &E,
) -> Result<AnchorStatus>
where
    A: AergoRead + ?Sized,
    E: EthereumRead + ?Sized,
{
    let keys = [
        StateKey::var(&vars.anchor_height),
        StateKey::var(&vars.t_anchor),
        StateKey::var(&vars.t_final),
    ];
    let values = aergo.query_state(aergo_bridge, &keys, None).await?;

    Ok(AnchorStatus {
        last_anchor_height: match values.first() {
            Some(Some(v)) => parse_height_value(v)?,
            _ => 0,
        },
        t_anchor: required_height(values.get(1), &vars.t_anchor)?,
        t_final: required_height(values.get(2), &vars.t_final)?,
        best_height: eth.block_number().await?,
    })
}

async fn call_u64<E: EthereumRead + ?Sized, C: SolCall>(eth: &E, bridge: Address, call: C) -> Result<u64> {
    let tx = TransactionRequest::default()
        .to(bridge)
        .input(call.abi_encode().into());
    let output = eth.call(tx).await?;
    let value = <sol_data::Uint<256> as SolType>::abi_decode(&output)?;
    u64::try_from(value).map_err(|_| {
        BridgeError::MalformedResponse(format!("{} returned {value}, not a block count", C::SIGNATURE))
    })
}

/// Anchoring of Aergo state onto Ethereum.
pub async fn aergo_anchor_status<E, A>(
    eth: &E,
    eth_bridge: Address,
    slots: &EthereumSlots,
    aergo: &A,
) -> Result<AnchorStatus>
where
    E: EthereumRead + ?Sized,
    A: AergoRead + ?Sized,
{
    let raw: U256 = eth
        .storage_at(eth_bridge, eth_slot_key(slots.anchor_height), BlockId::latest())
        .await?;
    let last_anchor_height = u64::try_from(raw)
        .map_err(|_| BridgeError::MalformedResponse(format!("anchor height slot holds {raw}")))?;

    Ok(AnchorStatus {
        last_anchor_height,
        t_anchor: call_u64(eth, eth_bridge, IEthMerkleBridge::_tAnchorCall {}).await?,
        t_final: call_u64(eth, eth_bridge, IEthMerkleBridge::_tFinalCall {}).await?,
        best_height: aergo.best_height().await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layout::StorageLayout,
        tests::{
            fixtures::*,
            mock::{MockAergo, MockEthereum},
        },
    };
    use alloy::sol_types::SolValue;

    #[test]
    fn test_blocks_until_next_anchor() {
        let status = AnchorStatus {
            last_anchor_height: 100,
            t_anchor: 25,
            t_final: 5,
            best_height: 110,
        };
        assert_eq!(status.blocks_until_next_anchor(), 15);

        let overdue = AnchorStatus {
            best_height: 200,
            ..status
        };
        assert_eq!(overdue.blocks_until_next_anchor(), 0);

        // node behind the anchor it reports
        let lagging = AnchorStatus {
            best_height: 90,
            ..status
        };
        assert_eq!(lagging.blocks_until_next_anchor(), 25);
    }

    #[tokio::test]
    async fn test_eth_anchor_status() {
        let layout = StorageLayout::default();
        let bridge: AergoAddress = AERGO_BRIDGE.parse().unwrap();
        let aergo = MockAergo::new(1);
        aergo.set_state(None, &StateKey::var("_sv__anchorHeight"), serde_json::json!(980));
        aergo.set_state(None, &StateKey::var("_sv__tAnchor"), serde_json::json!(25));
        aergo.set_state(None, &StateKey::var("_sv__tFinal"), serde_json::json!("12"));
        let eth = MockEthereum::new(1_000);

        let status = eth_anchor_status(&aergo, &bridge, &layout.aergo, &eth).await.unwrap();
        assert_eq!(
            status,
            AnchorStatus {
                last_anchor_height: 980,
                t_anchor: 25,
                t_final: 12,
                best_height: 1_000,
            }
        );
        assert_eq!(status.blocks_until_next_anchor(), 5);
    }

    #[tokio::test]
    async fn test_eth_anchor_status_requires_periods() {
        let layout = StorageLayout::default();
        let bridge: AergoAddress = AERGO_BRIDGE.parse().unwrap();
        let aergo = MockAergo::new(1);
        let eth = MockEthereum::new(1_000);

        let err = eth_anchor_status(&aergo, &bridge, &layout.aergo, &eth).await.unwrap_err();
        assert!(err.is_not_ready());
    }

    #[tokio::test]
    async fn test_aergo_anchor_status() {
        let layout = StorageLayout::default();
        let eth = MockEthereum::new(1_000);
        eth.set_storage(eth_bridge(), eth_slot_key(1), 0, U256::from(7_000));
        eth.set_call(
            eth_bridge(),
            IEthMerkleBridge::_tAnchorCall::SELECTOR,
            Ok(U256::from(100).abi_encode().into()),
        );
        eth.set_call(
            eth_bridge(),
            IEthMerkleBridge::_tFinalCall::SELECTOR,
            Ok(U256::from(10).abi_encode().into()),
        );
        let aergo = MockAergo::new(7_040);

        let status = aergo_anchor_status(&eth, eth_bridge(), &layout.ethereum, &aergo).await.unwrap();
        assert_eq!(status.last_anchor_height, 7_000);
        assert_eq!(status.t_anchor, 100);
        assert_eq!(status.t_final, 10);
        assert_eq!(status.best_height, 7_040);
        assert_eq!(status.blocks_until_next_anchor(), 60);
    }
}
