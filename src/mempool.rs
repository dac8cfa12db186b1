//! Per-transaction mempool effect tracking: what a pending, unconfirmed
//! transaction would do to a pool's reserves, kept around long enough to
//! support counterfactual price queries until the transaction confirms or
//! drops out of the mempool.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::models::{MempoolTxEffect, PoolState};

/// Per-pool mempool state: the last confirmed snapshot plus an ordered set
/// of pending effects layered on top of it.
pub struct MempoolPoolTracker {
    pool_id: String,
    confirmed: Option<PoolState>,
    pending: HashMap<String, MempoolTxEffect>,
    tx_order: Vec<String>,
    next_sequence: u64,
}

impl MempoolPoolTracker {
    pub fn new(pool_id: impl Into<String>) -> Self {
        Self {
            pool_id: pool_id.into(),
            confirmed: None,
            pending: HashMap::new(),
            tx_order: Vec::new(),
            next_sequence: 0,
        }
    }

    pub fn confirmed(&self) -> Option<&PoolState> {
        self.confirmed.as_ref()
    }

    pub fn pending(&self, tx_hash: &str) -> Option<&MempoolTxEffect> {
        self.pending.get(tx_hash)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Ordered by arrival (sequence).
    pub fn order(&self) -> &[String] {
        &self.tx_order
    }

    /// Idempotent: a repeated `tx_hash` returns the effect already stored,
    /// leaving sequence numbers untouched.
    pub fn add_pending(&mut self, tx_hash: impl Into<String>, new_state: PoolState) -> MempoolTxEffect {
        let tx_hash = tx_hash.into();
        if let Some(existing) = self.pending.get(&tx_hash) {
            return existing.clone();
        }

        let (confirmed_x, confirmed_y, confirmed_fee) = match &self.confirmed {
            Some(c) => (c.asset_x.amount, c.asset_y.amount, (c.fee_num, c.fee_denom)),
            None => (0, 0, (new_state.fee_num, new_state.fee_denom)),
        };

        let delta_x = new_state.asset_x.amount as i64 - confirmed_x as i64;
        let delta_y = new_state.asset_y.amount as i64 - confirmed_y as i64;
        let fee_changed = (new_state.fee_num, new_state.fee_denom) != confirmed_fee;

        let effect = MempoolTxEffect {
            tx_hash: tx_hash.clone(),
            pool_id: self.pool_id.clone(),
            protocol: new_state.protocol,
            sequence: self.next_sequence,
            timestamp: new_state.timestamp,
            delta_x,
            delta_y,
            resulting_x: new_state.asset_x.amount,
            resulting_y: new_state.asset_y.amount,
            resulting_price: new_state.price_xy(),
            new_fee_num: fee_changed.then_some(new_state.fee_num),
            new_fee_denom: fee_changed.then_some(new_state.fee_denom),
            fee_changed,
            projected_state: new_state,
        };

        self.next_sequence += 1;
        self.tx_order.push(tx_hash.clone());
        self.pending.insert(tx_hash, effect.clone());
        effect
    }

    /// Rebuilds the order list from the surviving entries sorted by
    /// sequence, so concurrent add/remove never leaves a stale ordering.
    pub fn remove_pending(&mut self, tx_hash: &str) {
        self.pending.remove(tx_hash);
        self.rebuild_order();
    }

    pub fn set_confirmed(&mut self, new_state: PoolState) {
        if self.pending.remove(&new_state.tx_hash).is_some() {
            self.rebuild_order();
        }
        self.confirmed = Some(new_state);
    }

    fn rebuild_order(&mut self) {
        let mut remaining: Vec<&MempoolTxEffect> = self.pending.values().collect();
        remaining.sort_by_key(|effect| effect.sequence);
        self.tx_order = remaining.into_iter().map(|effect| effect.tx_hash.clone()).collect();
    }
}

/// `(effect.resulting_price - confirmed_price) / confirmed_price * 100`,
/// zero when `confirmed_price` is zero.
pub fn price_impact(effect: &MempoolTxEffect, confirmed_price: f64) -> f64 {
    if confirmed_price == 0.0 {
        0.0
    } else {
        (effect.resulting_price - confirmed_price) / confirmed_price * 100.0
    }
}

/// Indexes pending effects by `tx_hash` across every pool they touch, so
/// dropping a confirmed transaction updates every affected pool's tracker
/// in one call instead of requiring the caller to know which pools a tx
/// touched.
#[derive(Default)]
pub struct MempoolManager {
    trackers: RwLock<HashMap<String, MempoolPoolTracker>>,
    tx_to_pools: RwLock<HashMap<String, HashSet<String>>>,
}

impl MempoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pending(&self, pool_id: &str, tx_hash: &str, new_state: PoolState) -> MempoolTxEffect {
        let effect = {
            let mut trackers = self.trackers.write().unwrap();
            let tracker = trackers
                .entry(pool_id.to_string())
                .or_insert_with(|| MempoolPoolTracker::new(pool_id));
            tracker.add_pending(tx_hash, new_state)
        };
        self.tx_to_pools
            .write()
            .unwrap()
            .entry(tx_hash.to_string())
            .or_default()
            .insert(pool_id.to_string());
        effect
    }

    /// Confirm `new_state` on its pool's tracker, removing the matching
    /// pending entry if one exists, and drop the tx_hash index entry once
    /// no pool references it any more.
    pub fn set_confirmed(&self, pool_id: &str, new_state: PoolState) {
        let tx_hash = new_state.tx_hash.clone();
        {
            let mut trackers = self.trackers.write().unwrap();
            let tracker = trackers
                .entry(pool_id.to_string())
                .or_insert_with(|| MempoolPoolTracker::new(pool_id));
            tracker.set_confirmed(new_state);
        }
        self.drop_tx_from_pool(&tx_hash, pool_id);
    }

    pub fn remove_pending(&self, pool_id: &str, tx_hash: &str) {
        if let Some(tracker) = self.trackers.write().unwrap().get_mut(pool_id) {
            tracker.remove_pending(tx_hash);
        }
        self.drop_tx_from_pool(tx_hash, pool_id);
    }

    fn drop_tx_from_pool(&self, tx_hash: &str, pool_id: &str) {
        let mut index = self.tx_to_pools.write().unwrap();
        if let Some(pools) = index.get_mut(tx_hash) {
            pools.remove(pool_id);
            if pools.is_empty() {
                index.remove(tx_hash);
            }
        }
    }

    pub fn pending_count(&self, pool_id: &str) -> usize {
        self.trackers
            .read()
            .unwrap()
            .get(pool_id)
            .map(|t| t.pending_count())
            .unwrap_or(0)
    }

    pub fn pending(&self, pool_id: &str, tx_hash: &str) -> Option<MempoolTxEffect> {
        self.trackers.read().unwrap().get(pool_id)?.pending(tx_hash).cloned()
    }

    pub fn confirmed(&self, pool_id: &str) -> Option<PoolState> {
        self.trackers.read().unwrap().get(pool_id)?.confirmed().cloned()
    }

    pub fn order(&self, pool_id: &str) -> Vec<String> {
        self.trackers
            .read()
            .unwrap()
            .get(pool_id)
            .map(|t| t.order().to_vec())
            .unwrap_or_default()
    }

    pub fn pools_for_tx(&self, tx_hash: &str) -> HashSet<String> {
        self.tx_to_pools.read().unwrap().get(tx_hash).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetAmount;
    use crate::scope::Protocol;

    fn pool_state(x: u64, y: u64, tx_hash: &str) -> PoolState {
        PoolState {
            pool_id: "pool1".to_string(),
            protocol: Protocol::MinswapV2,
            network: "mainnet".to_string(),
            asset_x: AssetAmount::ada(x),
            asset_y: AssetAmount::ada(y),
            fee_num: 997,
            fee_denom: 1000,
            slot: 0,
            block_hash: String::new(),
            tx_hash: tx_hash.to_string(),
            tx_index: 0,
            timestamp: 0,
            updated_at: 0,
            from_mempool: true,
            reserves_unknown: false,
        }
    }

    fn confirmed_pool() -> PoolState {
        let mut p = pool_state(100_000_000, 200_000_000, "confirmed");
        p.from_mempool = false;
        p
    }

    #[test]
    fn scenario_4_mempool_ordering() {
        let manager = MempoolManager::new();
        manager.set_confirmed("pool1", confirmed_pool());

        let effect_a = manager.add_pending("pool1", "tx_a", pool_state(101_000_000, 199_000_000, "tx_a"));
        let effect_b = manager.add_pending("pool1", "tx_b", pool_state(102_000_000, 198_000_000, "tx_b"));

        assert_eq!(manager.pending_count("pool1"), 2);
        assert_eq!(effect_a.delta_x, 1_000_000);
        assert_eq!(effect_a.delta_y, -1_000_000);
        assert_eq!(effect_a.sequence, 0);
        assert_eq!(effect_b.sequence, 1);

        manager.set_confirmed("pool1", pool_state(101_000_000, 199_000_000, "tx_a"));

        assert_eq!(manager.pending_count("pool1"), 1);
        let remaining = manager.pending("pool1", "tx_b").unwrap();
        assert_eq!(remaining.sequence, 1);
        assert_eq!(manager.order("pool1"), vec!["tx_b".to_string()]);
    }

    #[test]
    fn add_pending_is_idempotent() {
        let manager = MempoolManager::new();
        manager.set_confirmed("pool1", confirmed_pool());
        let first = manager.add_pending("pool1", "tx_a", pool_state(101_000_000, 199_000_000, "tx_a"));
        let second = manager.add_pending("pool1", "tx_a", pool_state(999, 999, "tx_a"));
        assert_eq!(first.sequence, second.sequence);
        assert_eq!(first.resulting_x, second.resulting_x);
    }

    #[test]
    fn tx_index_entry_drops_once_last_pool_releases_it() {
        let manager = MempoolManager::new();
        manager.set_confirmed("pool1", confirmed_pool());
        manager.add_pending("pool1", "tx_shared", pool_state(1, 1, "tx_shared"));
        assert_eq!(manager.pools_for_tx("tx_shared").len(), 1);

        manager.remove_pending("pool1", "tx_shared");
        assert!(manager.pools_for_tx("tx_shared").is_empty());
    }

    #[test]
    fn price_impact_is_zero_on_zero_confirmed_price() {
        let effect = manager_effect();
        assert_eq!(price_impact(&effect, 0.0), 0.0);
    }

    fn manager_effect() -> MempoolTxEffect {
        let manager = MempoolManager::new();
        manager.set_confirmed("pool1", confirmed_pool());
        manager.add_pending("pool1", "tx_a", pool_state(101_000_000, 199_000_000, "tx_a"))
    }
}
