//! The concurrent state cache: one `StateCache<S>` per state kind, bundled
//! into an [`OracleCaches`] the coordinator holds. Readers take the read
//! lock; `put`/`delete_at_or_after_slot` take the write lock; subscriber
//! fan-out happens under the read lock via a bounded `tokio::sync::broadcast`
//! channel, so a slow subscriber drops updates rather than blocking anyone
//! else — the "bounded, single-writer event log with per-subscriber
//! cursors" spec.md section 9 asks for instead of a lock-plus-channel hybrid.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use crate::models::{BondState, CDPState, LendingState, OrderState, PoolState};
use crate::scope::ScopedKey;

const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

/// Records that can live in a `StateCache`.
pub trait HasKey {
    fn cache_key(&self) -> ScopedKey;
}

/// Records carrying the slot at which they were produced, so rollback can
/// invalidate by slot without protocol-specific knowledge.
pub trait HasSlot {
    fn cache_slot(&self) -> u64;
}

macro_rules! impl_cache_traits {
    ($ty:ty) => {
        impl HasKey for $ty {
            fn cache_key(&self) -> ScopedKey {
                self.key()
            }
        }
        impl HasSlot for $ty {
            fn cache_slot(&self) -> u64 {
                self.slot
            }
        }
    };
}

impl_cache_traits!(PoolState);
impl_cache_traits!(LendingState);
impl_cache_traits!(CDPState);
impl_cache_traits!(OrderState);
impl_cache_traits!(BondState);

/// A fanned-out cache mutation.
#[derive(Debug, Clone)]
pub enum CacheUpdate<S> {
    Put(S),
    RolledBack { slot: u64 },
}

/// A single protocol kind's live state, keyed by `(network, protocol, id)`.
pub struct StateCache<S> {
    entries: RwLock<HashMap<ScopedKey, S>>,
    sender: broadcast::Sender<CacheUpdate<S>>,
}

impl<S: Clone + HasSlot + HasKey> Default for StateCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + HasSlot + HasKey> StateCache<S> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            sender,
        }
    }

    pub fn get(&self, key: &ScopedKey) -> Option<S> {
        self.entries.read().unwrap().get(key).cloned()
    }

    /// A stable snapshot at the moment of the call.
    pub fn get_all(&self) -> Vec<S> {
        self.entries.read().unwrap().values().cloned().collect()
    }

    pub fn get_all_by_protocol(&self, protocol: crate::scope::Protocol) -> Vec<S> {
        self.entries
            .read()
            .unwrap()
            .values()
            .filter(|state| state.cache_key().protocol == protocol)
            .cloned()
            .collect()
    }

    /// Overwrite the prior value for `state.cache_key()` and fan out the
    /// update. A subscriber with a full buffer simply misses this one; the
    /// write to the map always succeeds.
    pub fn put(&self, state: S) {
        let key = state.cache_key();
        self.entries.write().unwrap().insert(key, state.clone());
        let _ = self.sender.send(CacheUpdate::Put(state));
    }

    /// Delete every entry with `slot >= slot`, atomically with respect to
    /// other readers (a single write-lock section), and notify subscribers.
    pub fn delete_at_or_after_slot(&self, slot: u64) {
        {
            let mut entries = self.entries.write().unwrap();
            entries.retain(|_, state| state.cache_slot() < slot);
        }
        let _ = self.sender.send(CacheUpdate::RolledBack { slot });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate<S>> {
        self.sender.subscribe()
    }
}

/// Every protocol kind's cache, bundled for the coordinator to hold as one
/// field instead of five.
#[derive(Default)]
pub struct OracleCaches {
    pub pools: StateCache<PoolState>,
    pub lending: StateCache<LendingState>,
    pub cdps: StateCache<CDPState>,
    pub orders: StateCache<OrderState>,
    pub bonds: StateCache<BondState>,
}

impl OracleCaches {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetAmount;
    use crate::scope::Protocol;

    fn pool(pool_id: &str, slot: u64) -> PoolState {
        PoolState {
            pool_id: pool_id.to_string(),
            protocol: Protocol::MinswapV2,
            network: "mainnet".to_string(),
            asset_x: AssetAmount::ada(100),
            asset_y: AssetAmount::ada(200),
            fee_num: 997,
            fee_denom: 1000,
            slot,
            block_hash: "bh".to_string(),
            tx_hash: "tx".to_string(),
            tx_index: 0,
            timestamp: 0,
            updated_at: 0,
            from_mempool: false,
            reserves_unknown: false,
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = StateCache::<PoolState>::new();
        cache.put(pool("p1", 10));
        let got = cache.get(&pool("p1", 10).cache_key()).unwrap();
        assert_eq!(got.pool_id, "p1");
    }

    #[test]
    fn later_confirmed_update_for_same_key_wins() {
        let cache = StateCache::<PoolState>::new();
        cache.put(pool("p1", 10));
        cache.put(pool("p1", 20));
        let got = cache.get(&pool("p1", 10).cache_key()).unwrap();
        assert_eq!(got.slot, 20);
        assert_eq!(cache.get_all().len(), 1);
    }

    #[test]
    fn rollback_retains_only_older_slots() {
        let cache = StateCache::<PoolState>::new();
        cache.put(pool("p1", 100));
        cache.put(pool("p2", 200));
        cache.put(pool("p3", 300));

        cache.delete_at_or_after_slot(200);

        let remaining = cache.get_all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].pool_id, "p1");
    }

    #[tokio::test]
    async fn subscriber_receives_put_and_rollback_events() {
        let cache = StateCache::<PoolState>::new();
        let mut rx = cache.subscribe();

        cache.put(pool("p1", 10));
        match rx.recv().await.unwrap() {
            CacheUpdate::Put(state) => assert_eq!(state.pool_id, "p1"),
            CacheUpdate::RolledBack { .. } => panic!("expected Put"),
        }

        cache.delete_at_or_after_slot(5);
        match rx.recv().await.unwrap() {
            CacheUpdate::RolledBack { slot } => assert_eq!(slot, 5),
            CacheUpdate::Put(_) => panic!("expected RolledBack"),
        }
    }

    #[test]
    fn lagging_subscriber_drops_updates_without_blocking_writer() {
        let cache = StateCache::<PoolState>::new();
        let mut rx = cache.subscribe();

        for i in 0..(SUBSCRIBER_CHANNEL_CAPACITY as u64 + 10) {
            cache.put(pool("p1", i));
        }

        // The writer never blocked; the lagging receiver observes `Lagged`
        // rather than the full backlog.
        let err = rx.try_recv().unwrap_err();
        assert!(matches!(err, broadcast::error::TryRecvError::Lagged(_)));
    }
}
