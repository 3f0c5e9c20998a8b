//! Withdrawable and pending balances.
//!
//! Each transfer direction has a *source* chain holding the cumulative deposit
//! and a *destination* chain holding the cumulative settled amount plus the
//! height of the last source state it anchored. Three snapshots of those
//! balances are reconciled into two numbers:
//!
//! ```text
//! withdrawable = anchored_deposit - total_withdrawn
//! pending      = total_deposit    - anchored_deposit
//! ```
//!
//! Both are exact signed values. A negative result means the bridge state is
//! inconsistent, or the contracts moved on between reads; it is surfaced as is.

use alloy::{
    eips::BlockId,
    primitives::{Address, B256, I256, U256},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    address::AergoAddress,
    amount::{parse_amount_value, parse_height_value, signed_difference},
    chain::{AergoRead, EthereumRead},
    error::{BridgeError, Result},
    keys::{StateKey, eth_slot_key},
    layout::AergoStateVars,
};

/// Cumulative deposits into the bridge on the source chain.
#[async_trait::async_trait]
pub trait DepositLedger: Send + Sync {
    /// Deposit at the latest state, pending amounts included.
    async fn deposit_latest(&self) -> Result<U256>;

    /// Deposit as of the source block `height`.
    async fn deposit_at(&self, height: u64) -> Result<U256>;
}

/// What the destination bridge has anchored and paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettlementState {
    /// Last source height whose state root was anchored. Zero before the first
    /// anchor.
    pub anchor_height: u64,
    /// Cumulative amount already settled for the key.
    pub settled: U256,
}

/// Settlements and anchors on the destination chain.
#[async_trait::async_trait]
pub trait SettlementLedger: Send + Sync {
    async fn anchor_height(&self) -> Result<u64>;

    /// Anchor height and settled amount, read against one state.
    async fn settlement_state(&self) -> Result<SettlementState>;
}

/// The three balances of one receiver/asset pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorSnapshot {
    pub anchor_height: u64,
    pub total_deposit: U256,
    pub anchored_deposit: U256,
    pub total_withdrawn: U256,
}

impl AnchorSnapshot {
    pub fn withdrawable(&self) -> Result<Withdrawable> {
        Ok(Withdrawable {
            withdrawable: signed_difference(self.anchored_deposit, self.total_withdrawn)?,
            pending: signed_difference(self.total_deposit, self.anchored_deposit)?,
        })
    }
}

/// Amount settleable now, and amount waiting for the next anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Withdrawable {
    pub withdrawable: I256,
    pub pending: I256,
}

impl Withdrawable {
    /// Decimal strings in base units, `(withdrawable, pending)`.
    pub fn to_strings(&self) -> (String, String) {
        (self.withdrawable.to_string(), self.pending.to_string())
    }

    /// True when either figure is negative.
    pub fn is_inconsistent(&self) -> bool {
        self.withdrawable.is_negative() || self.pending.is_negative()
    }
}

/// Read the three snapshots and reconcile them.
///
/// Never-written keys read as zero at the ledger level; every read error,
/// not-ready included, is returned as is.
pub async fn reconcile<S, D>(source: &S, dest: &D) -> Result<AnchorSnapshot>
where
    S: DepositLedger + ?Sized,
    D: SettlementLedger + ?Sized,
{
    let total_deposit = source.deposit_latest().await?;
    let SettlementState {
        anchor_height,
        settled,
    } = dest.settlement_state().await?;

    // nothing anchored yet, so nothing can be proven
    let anchored_deposit = if anchor_height == 0 {
        U256::ZERO
    } else {
        source
            .deposit_at(anchor_height)
            .await
            .map_err(|e| e.at_height(anchor_height))?
    };

    let snapshot = AnchorSnapshot {
        anchor_height,
        total_deposit,
        anchored_deposit,
        total_withdrawn: settled,
    };

    if snapshot.anchored_deposit < snapshot.total_withdrawn
        || snapshot.total_deposit < snapshot.anchored_deposit
    {
        warn!(?snapshot, "bridge balances out of order");
    } else {
        debug!(?snapshot, "reconciled");
    }

    Ok(snapshot)
}

/// One storage entry of the Ethereum bridge, as source or destination ledger.
#[derive(Debug)]
pub struct EthereumLedger<'a, E: ?Sized> {
    pub(crate) client: &'a E,
    pub(crate) bridge: Address,
    pub(crate) key: B256,
    pub(crate) anchor_slot: u64,
}

impl<'a, E: EthereumRead + ?Sized> EthereumLedger<'a, E> {
    pub fn new(client: &'a E, bridge: Address, key: B256, anchor_slot: u64) -> Self {
        Self {
            client,
            bridge,
            key,
            anchor_slot,
        }
    }

    async fn anchor_height_at(&self, block: BlockId) -> Result<u64> {
        let raw = self
            .client
            .storage_at(self.bridge, eth_slot_key(self.anchor_slot), block)
            .await?;
        u64::try_from(raw).map_err(|_| {
            BridgeError::MalformedResponse(format!("anchor height slot holds {raw}, not a height"))
        })
    }
}

#[async_trait::async_trait]
impl<E: EthereumRead + ?Sized> DepositLedger for EthereumLedger<'_, E> {
    async fn deposit_latest(&self) -> Result<U256> {
        self.client
            .storage_at(self.bridge, self.key, BlockId::latest())
            .await
    }

    async fn deposit_at(&self, height: u64) -> Result<U256> {
        self.client
            .storage_at(self.bridge, self.key, BlockId::number(height))
            .await
    }
}

#[async_trait::async_trait]
impl<E: EthereumRead + ?Sized> SettlementLedger for EthereumLedger<'_, E> {
    async fn anchor_height(&self) -> Result<u64> {
        self.anchor_height_at(BlockId::latest()).await
    }

    async fn settlement_state(&self) -> Result<SettlementState> {
        // pin both reads to one block so they describe the same state
        let head = self.client.block_number().await?;
        let block = BlockId::number(head);

        let anchor_height = self.anchor_height_at(block).await?;
        let settled = self.client.storage_at(self.bridge, self.key, block).await?;
        Ok(SettlementState {
            anchor_height,
            settled,
        })
    }
}

/// One state variable of the Aergo bridge, as source or destination ledger.
#[derive(Debug)]
pub struct AergoLedger<'a, A: ?Sized> {
    pub(crate) client: &'a A,
    pub(crate) bridge: &'a AergoAddress,
    pub(crate) key: StateKey,
    pub(crate) vars: &'a AergoStateVars,
}

impl<'a, A: AergoRead + ?Sized> AergoLedger<'a, A> {
    pub fn new(client: &'a A, bridge: &'a AergoAddress, key: StateKey, vars: &'a AergoStateVars) -> Self {
        Self {
            client,
            bridge,
            key,
            vars,
        }
    }

    /// State root of the Aergo block at `height`.
    pub(crate) async fn root_at(&self, height: u64) -> Result<B256> {
        let header = self
            .client
            .block_header(height)
            .await
            .map_err(|e| e.at_height(height))?;
        Ok(header.blocks_root_hash)
    }

    async fn read_amount(&self, root: Option<B256>) -> Result<U256> {
        let values = self
            .client
            .query_state(self.bridge, std::slice::from_ref(&self.key), root)
            .await?;
        amount_or_zero(values.first())
    }
}

fn amount_or_zero(value: Option<&Option<Value>>) -> Result<U256> {
    match value {
        Some(Some(v)) => parse_amount_value(v),
        _ => Ok(U256::ZERO),
    }
}

#[async_trait::async_trait]
impl<A: AergoRead + ?Sized> DepositLedger for AergoLedger<'_, A> {
    async fn deposit_latest(&self) -> Result<U256> {
        self.read_amount(None).await
    }

    async fn deposit_at(&self, height: u64) -> Result<U256> {
        let root = self.root_at(height).await?;
        self.read_amount(Some(root))
            .await
            .map_err(|e| e.at_height(height))
    }
}

#[async_trait::async_trait]
impl<A: AergoRead + ?Sized> SettlementLedger for AergoLedger<'_, A> {
    async fn anchor_height(&self) -> Result<u64> {
        let key = StateKey::var(&self.vars.anchor_height);
        let values = self
            .client
            .query_state(self.bridge, std::slice::from_ref(&key), None)
            .await?;
        match values.first() {
            Some(Some(v)) => parse_height_value(v),
            _ => Ok(0),
        }
    }

    async fn settlement_state(&self) -> Result<SettlementState> {
        // one query, so both values come from the same state
        let keys = [StateKey::var(&self.vars.anchor_height), self.key.clone()];
        let values = self.client.query_state(self.bridge, &keys, None).await?;

        let anchor_height = match values.first() {
            Some(Some(v)) => parse_height_value(v)?,
            _ => 0,
        };
        Ok(SettlementState {
            anchor_height,
            settled: amount_or_zero(values.get(1))?,
        })
    }
}
