//! The external-interface types described in spec.md section 6: the event
//! shapes the core consumes from an indexer or mempool client, and the
//! `EventSource` seam those collaborators implement against. Nothing in
//! this crate implements `EventSource` — it exists purely so the
//! coordinator can be exercised and tested without a real chain-sync
//! client wired in.

use std::collections::HashSet;

/// A single transaction output as the event source reports it.
#[derive(Debug, Clone)]
pub struct Output {
    pub address: String,
    pub datum: Option<Vec<u8>>,
    /// Multi-asset value as `(unit, amount)` pairs; `"lovelace"` for ADA.
    pub value: Vec<(String, u64)>,
}

/// Block-level context shared by every output in a `TransactionEvent`.
#[derive(Debug, Clone)]
pub struct TxContext {
    pub tx_hash: String,
    pub tx_index: u32,
    pub slot: u64,
    pub block_hash: String,
    pub timestamp: i64,
}

/// A confirmed transaction, as reported by the chain-sync indexer.
#[derive(Debug, Clone)]
pub struct TransactionEvent {
    pub context: TxContext,
    pub outputs: Vec<Output>,
}

/// A chain rollback to `slot`; every cached and persisted record at or
/// after this slot is invalidated.
#[derive(Debug, Clone)]
pub struct RollbackEvent {
    pub slot: u64,
    pub block_hash: String,
}

/// An unconfirmed transaction seen in the mempool.
#[derive(Debug, Clone)]
pub struct MempoolTransaction {
    pub tx_hash: String,
    pub outputs: Vec<Output>,
}

/// Seam the coordinator is driven through. An indexer/mempool client
/// implements this and calls the registered handlers as events arrive;
/// nothing in this crate provides an implementation.
pub trait EventSource: Send + Sync {
    fn on_transaction(&mut self, handler: Box<dyn Fn(TransactionEvent) + Send + Sync>);
    fn on_rollback(&mut self, handler: Box<dyn Fn(RollbackEvent) + Send + Sync>);
}

/// Plain configuration data handed to the coordinator at construction.
/// Never loaded from a file or environment by this crate — that belongs
/// to whatever binary assembles the oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub network: String,
    pub pool_addresses: HashSet<String>,
    pub market_addresses: HashSet<String>,
    pub oracle_addresses: HashSet<String>,
    pub storage_directory: String,
}

impl OracleConfig {
    pub fn new(network: impl Into<String>, storage_directory: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            pool_addresses: HashSet::new(),
            market_addresses: HashSet::new(),
            oracle_addresses: HashSet::new(),
            storage_directory: storage_directory.into(),
        }
    }
}

/// A cache update fanned out to subscribers: current price(s)/amounts plus
/// the previous price when one was known.
#[derive(Debug, Clone)]
pub struct PriceUpdate {
    pub entity_id: String,
    pub protocol: crate::scope::Protocol,
    pub price_xy: f64,
    pub price_yx: f64,
    pub asset_x_amount: u64,
    pub asset_y_amount: u64,
    pub slot: u64,
    pub timestamp: i64,
    pub previous_price_xy: Option<f64>,
    pub percent_change: Option<f64>,
}

impl PriceUpdate {
    pub fn from_pool(state: &crate::models::PoolState, previous_price_xy: Option<f64>) -> Self {
        let price_xy = state.price_xy();
        let percent_change = previous_price_xy.and_then(|prev| {
            if prev == 0.0 {
                None
            } else {
                Some((price_xy - prev) / prev * 100.0)
            }
        });
        Self {
            entity_id: state.pool_id.clone(),
            protocol: state.protocol,
            price_xy,
            price_yx: state.price_yx(),
            asset_x_amount: state.asset_x.amount,
            asset_y_amount: state.asset_y.amount,
            slot: state.slot,
            timestamp: state.timestamp,
            previous_price_xy,
            percent_change,
        }
    }
}

/// A cache update for a `LendingState` record.
#[derive(Debug, Clone)]
pub struct LendingUpdate {
    pub entity_id: String,
    pub protocol: crate::scope::Protocol,
    pub slot: u64,
    pub updated_at: i64,
}
