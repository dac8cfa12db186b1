//! The protocol-agnostic state records every parser produces and the cache
//! stores. Protocol modules under `crate::protocols` only ever build one of
//! these from a decoded datum — they never define their own key scheme.

use serde::{Deserialize, Serialize};

use crate::asset::{AssetAmount, AssetId};
use crate::scope::{Protocol, ScopedKey};

/// A two-asset AMM or order-book pool's current reserves and fee schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    pub pool_id: String,
    pub protocol: Protocol,
    pub network: String,
    pub asset_x: AssetAmount,
    pub asset_y: AssetAmount,
    pub fee_num: u64,
    pub fee_denom: u64,
    pub slot: u64,
    pub block_hash: String,
    pub tx_hash: String,
    pub tx_index: u32,
    pub timestamp: i64,
    pub updated_at: i64,
    pub from_mempool: bool,
    /// Set when the datum does not carry reserves in-datum and no
    /// accompanying UTxO value was supplied to fill them (Minswap v1).
    pub reserves_unknown: bool,
}

impl PoolState {
    pub fn key(&self) -> ScopedKey {
        ScopedKey::new(self.network.clone(), self.protocol, self.pool_id.clone())
    }

    /// `y / x`, zero when `x` is zero.
    pub fn price_xy(&self) -> f64 {
        if self.asset_x.amount == 0 {
            0.0
        } else {
            self.asset_y.amount as f64 / self.asset_x.amount as f64
        }
    }

    /// `x / y`, zero when `y` is zero.
    pub fn price_yx(&self) -> f64 {
        if self.asset_y.amount == 0 {
            0.0
        } else {
            self.asset_x.amount as f64 / self.asset_y.amount as f64
        }
    }

    /// `1 - fee_num/fee_denom`, zero when `fee_denom` is zero.
    pub fn swap_fee(&self) -> f64 {
        if self.fee_denom == 0 {
            0.0
        } else {
            1.0 - (self.fee_num as f64 / self.fee_denom as f64)
        }
    }
}

/// The four `LendingState` shapes a lending-market protocol can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LendingVariant {
    Market {
        total_supply: AssetAmount,
        total_borrow: AssetAmount,
        interest_rate_bps: u64,
        collateral_factor_bps: u64,
    },
    Loan {
        principal: AssetAmount,
        collateral: AssetAmount,
        interest_rate_bps: u64,
        due_date: i64,
        borrower: Option<String>,
        lender: Option<String>,
    },
    LoanOffer {
        principal: AssetAmount,
        collateral: AssetAmount,
        interest_rate_bps: u64,
        lender: Option<String>,
    },
    Position {
        supplied: AssetAmount,
        borrowed: AssetAmount,
        collateral_factor_bps: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LendingState {
    pub state_id: String,
    pub protocol: Protocol,
    pub network: String,
    pub underlying: AssetId,
    pub collateral: Option<AssetId>,
    pub variant: LendingVariant,
    pub slot: u64,
    pub tx_hash: String,
    pub updated_at: i64,
}

impl LendingState {
    pub fn key(&self) -> ScopedKey {
        ScopedKey::new(self.network.clone(), self.protocol, self.state_id.clone())
    }
}

/// Collateralized debt position state for a synthetics protocol.
///
/// `fees_type`/`last_updated`/`iasset_fees` are populated only for
/// protocols whose datum carries an accumulated-fees sub-structure
/// (currently Indigo's `AccumulatedFees`) and are `None` elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CDPState {
    pub id: String,
    pub protocol: Protocol,
    pub network: String,
    pub has_owner: bool,
    pub owner: String,
    pub synthetic: AssetId,
    pub minted: u64,
    pub start_time: i64,
    pub fees_type: Option<u8>,
    pub last_updated: Option<i64>,
    pub iasset_fees: Option<i64>,
    pub slot: u64,
    pub tx_hash: String,
    pub updated_at: i64,
}

impl CDPState {
    pub fn key(&self) -> ScopedKey {
        ScopedKey::new(self.network.clone(), self.protocol, self.id.clone())
    }
}

/// An exact rational with a lossy float approximation alongside it for
/// display — every price in an `OrderState` is kept both ways so consumers
/// can choose precision over convenience.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RationalPrice {
    pub numerator: u64,
    pub denominator: u64,
}

impl RationalPrice {
    pub fn new(numerator: u64, denominator: u64) -> Self {
        Self { numerator, denominator }
    }

    pub fn as_f64(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }
}

/// A Genius Yield order-book order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    pub id: String,
    pub protocol: Protocol,
    pub network: String,
    pub owner_pubkey_hash: String,
    pub offered: AssetAmount,
    pub original_amount: u64,
    pub asked: AssetId,
    pub price: RationalPrice,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub partial_fills: u64,
    pub slot: u64,
    pub tx_hash: String,
    pub updated_at: i64,
}

impl OrderState {
    pub fn key(&self) -> ScopedKey {
        ScopedKey::new(self.network.clone(), self.protocol, self.id.clone())
    }

    /// `offered.amount > 0` and within the (optional) activity window.
    pub fn is_active(&self, now_ms: i64) -> bool {
        if self.offered.amount == 0 {
            return false;
        }
        if let Some(start) = self.start_time {
            if start > now_ms {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if end <= now_ms {
                return false;
            }
        }
        true
    }

    /// Percentage of `original_amount` already filled. Mirrors a known
    /// upstream quirk: returns 0 (instead of a negative/>100% figure) when
    /// `offered` has somehow grown past `original_amount`, and logs a
    /// warning at the call site rather than diverging from that behavior.
    pub fn fill_percent(&self) -> f64 {
        if self.original_amount == 0 || self.offered.amount >= self.original_amount {
            if self.offered.amount > self.original_amount {
                tracing::warn!(
                    order_id = %self.id,
                    offered = self.offered.amount,
                    original = self.original_amount,
                    "offered amount exceeds original_amount, invariant violated"
                );
            }
            return 0.0;
        }
        let filled = self.original_amount - self.offered.amount;
        filled as f64 / self.original_amount as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondStatus {
    Active,
    Matured,
    Claimed,
}

/// An Optim bond position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondState {
    pub id: String,
    pub protocol: Protocol,
    pub network: String,
    pub principal: u64,
    pub interest_rate_bps: u64,
    pub start_epoch: u64,
    pub end_epoch: u64,
    pub stake_pool_hash: String,
    pub accrued_rewards: u64,
    pub status: BondStatus,
    pub slot: u64,
    pub tx_hash: String,
    pub updated_at: i64,
}

impl BondState {
    pub fn key(&self) -> ScopedKey {
        ScopedKey::new(self.network.clone(), self.protocol, self.id.clone())
    }
}

/// A standalone on-chain price observation (Optim OADA oracle feed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceFeed {
    pub asset: AssetId,
    pub protocol: Protocol,
    pub network: String,
    pub price: i64,
    pub denominator: i64,
    pub valid_from: i64,
    pub valid_to: i64,
    pub slot: u64,
    pub tx_hash: String,
    pub updated_at: i64,
}

impl PriceFeed {
    /// `price / denominator`, zero when `denominator` is zero.
    pub fn price_float(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.price as f64 / self.denominator as f64
        }
    }
}

/// Either of the two things a `BondParser` can hand back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BondOrFeed {
    Bond(BondState),
    Feed(PriceFeed),
}

/// The per-transaction delta a mempool projection applies to a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MempoolTxEffect {
    pub tx_hash: String,
    pub pool_id: String,
    pub protocol: Protocol,
    pub sequence: u64,
    pub timestamp: i64,
    pub delta_x: i64,
    pub delta_y: i64,
    pub resulting_x: u64,
    pub resulting_y: u64,
    pub resulting_price: f64,
    pub new_fee_num: Option<u64>,
    pub new_fee_denom: Option<u64>,
    pub fee_changed: bool,
    pub projected_state: PoolState,
}
