//! Wires the parser registry, caches, mempool tracker, and persistence
//! adapters into the state machine described in spec.md sections 4.7 and 6:
//! confirmed transactions populate the cache and disk, rollbacks invalidate
//! both, and mempool transactions project a pending effect without ever
//! touching disk.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

use crate::cache::OracleCaches;
use crate::event::{LendingUpdate, OracleConfig, PriceUpdate, RollbackEvent, TransactionEvent};
use crate::mempool::MempoolManager;
use crate::models::{BondState, CDPState, LendingState, OrderState, PoolState};
use crate::parsers::{DatumContext, ParserRegistry};
use crate::persistence::PersistenceAdapter;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// One `PersistenceAdapter` per state kind, opened under the configured
/// storage directory.
pub struct PersistenceAdapters {
    pub pools: PersistenceAdapter<PoolState>,
    pub lending: PersistenceAdapter<LendingState>,
    pub cdps: PersistenceAdapter<CDPState>,
    pub orders: PersistenceAdapter<OrderState>,
    pub bonds: PersistenceAdapter<BondState>,
}

impl PersistenceAdapters {
    pub fn open(storage_directory: &str) -> Result<Self, crate::error::StorageError> {
        Ok(Self {
            pools: PersistenceAdapter::open(storage_directory, "oracle_pool")?,
            lending: PersistenceAdapter::open(storage_directory, "lending_state")?,
            cdps: PersistenceAdapter::open(storage_directory, "cdp_state")?,
            orders: PersistenceAdapter::open(storage_directory, "order_state")?,
            bonds: PersistenceAdapter::open(storage_directory, "bond_state")?,
        })
    }

    fn flush_all(&self) {
        for result in [
            self.pools.flush(),
            self.lending.flush(),
            self.cdps.flush(),
            self.orders.flush(),
            self.bonds.flush(),
        ] {
            if let Err(err) = result {
                tracing::warn!(error = %err, "failed to flush persistence store on stop");
            }
        }
    }
}

pub struct OracleCoordinator {
    config: OracleConfig,
    registry: ParserRegistry,
    caches: OracleCaches,
    mempool: MempoolManager,
    persistence: PersistenceAdapters,
    price_updates: broadcast::Sender<PriceUpdate>,
    lending_updates: broadcast::Sender<LendingUpdate>,
    stopped: AtomicBool,
}

impl OracleCoordinator {
    pub fn new(config: OracleConfig, registry: ParserRegistry) -> Result<Self, crate::error::StorageError> {
        let persistence = PersistenceAdapters::open(&config.storage_directory)?;
        let (price_updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (lending_updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Ok(Self {
            config,
            registry,
            caches: OracleCaches::new(),
            mempool: MempoolManager::new(),
            persistence,
            price_updates,
            lending_updates,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn caches(&self) -> &OracleCaches {
        &self.caches
    }

    pub fn mempool(&self) -> &MempoolManager {
        &self.mempool
    }

    pub fn subscribe_price_updates(&self) -> broadcast::Receiver<PriceUpdate> {
        self.price_updates.subscribe()
    }

    pub fn subscribe_lending_updates(&self) -> broadcast::Receiver<LendingUpdate> {
        self.lending_updates.subscribe()
    }

    /// A confirmed transaction: try every output against the configured
    /// address sets and, on a successful decode, update cache, mempool
    /// confirmed-snapshot, and disk. A parse failure on one output never
    /// aborts the rest.
    pub fn handle_transaction(&self, event: TransactionEvent) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        for output in &event.outputs {
            let Some(datum) = &output.datum else { continue };
            let ctx = DatumContext::new(
                event.context.tx_hash.clone(),
                event.context.tx_index,
                event.context.slot,
                event.context.timestamp,
            );

            if self.config.pool_addresses.contains(&output.address) {
                if let Some(mut state) = self.registry.parse_pool(datum, &ctx, &output.value) {
                    self.apply_pool_update(&event, &mut state, false);
                }
            }
            if self.config.market_addresses.contains(&output.address)
                || self.config.oracle_addresses.contains(&output.address)
            {
                if let Some(mut state) = self.registry.parse_lending(datum, &ctx) {
                    state.network = self.config.network.clone();
                    self.caches.lending.put(state.clone());
                    if let Err(err) = self.persistence.lending.put(&state.key(), &state) {
                        tracing::warn!(error = %err, "failed to persist lending state");
                    }
                    let _ = self.lending_updates.send(LendingUpdate {
                        entity_id: state.state_id.clone(),
                        protocol: state.protocol,
                        slot: state.slot,
                        updated_at: state.updated_at,
                    });
                }
            }

            // Order, CDP, and bond contracts have no dedicated address
            // configuration in spec.md section 6 — each registered parser
            // already self-filters by constructor tag, so every datum is
            // simply offered to all three remaining contract kinds.
            if let Some(mut state) = self.registry.parse_order(datum, &ctx) {
                state.network = self.config.network.clone();
                self.caches.orders.put(state.clone());
                if let Err(err) = self.persistence.orders.put(&state.key(), &state) {
                    tracing::warn!(error = %err, "failed to persist order state");
                }
            }
            if let Some(mut state) = self.registry.parse_cdp(datum, &ctx) {
                state.network = self.config.network.clone();
                self.caches.cdps.put(state.clone());
                if let Err(err) = self.persistence.cdps.put(&state.key(), &state) {
                    tracing::warn!(error = %err, "failed to persist CDP state");
                }
            }
            if let Some(bond_or_feed) = self.registry.parse_bond(datum, &ctx) {
                if let crate::models::BondOrFeed::Bond(mut state) = bond_or_feed {
                    state.network = self.config.network.clone();
                    self.caches.bonds.put(state.clone());
                    if let Err(err) = self.persistence.bonds.put(&state.key(), &state) {
                        tracing::warn!(error = %err, "failed to persist bond state");
                    }
                }
            }
        }
    }

    fn apply_pool_update(&self, event: &TransactionEvent, state: &mut PoolState, from_mempool: bool) {
        state.network = self.config.network.clone();
        state.block_hash = event.context.block_hash.clone();
        state.from_mempool = from_mempool;

        let previous_price = self.caches.pools.get(&state.key()).map(|p| p.price_xy());

        self.caches.pools.put(state.clone());
        self.mempool.set_confirmed(&state.pool_id, state.clone());
        if !from_mempool {
            if let Err(err) = self.persistence.pools.put(&state.key(), state) {
                tracing::warn!(error = %err, "failed to persist pool state");
            }
        }

        let _ = self.price_updates.send(PriceUpdate::from_pool(state, previous_price));
    }

    /// Invalidate every cached and persisted record at or after
    /// `event.slot`. No update events are emitted for a rollback.
    pub fn handle_rollback(&self, event: RollbackEvent) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        self.caches.pools.delete_at_or_after_slot(event.slot);
        self.caches.lending.delete_at_or_after_slot(event.slot);
        self.caches.cdps.delete_at_or_after_slot(event.slot);
        self.caches.orders.delete_at_or_after_slot(event.slot);
        self.caches.bonds.delete_at_or_after_slot(event.slot);

        for result in [
            self.persistence.pools.delete_prefix_at_or_after_slot(event.slot),
            self.persistence.lending.delete_prefix_at_or_after_slot(event.slot),
            self.persistence.cdps.delete_prefix_at_or_after_slot(event.slot),
            self.persistence.orders.delete_prefix_at_or_after_slot(event.slot),
            self.persistence.bonds.delete_prefix_at_or_after_slot(event.slot),
        ] {
            if let Err(err) = result {
                tracing::warn!(error = %err, "failed to apply rollback to persistence store");
            }
        }
    }

    /// Identical to `handle_transaction`'s pool path, except provenance
    /// fields unknown in the mempool are zeroed, `from_mempool` is set, and
    /// nothing is written to disk; the mempool tracker's pending effect is
    /// recorded on top of the cache update.
    pub fn handle_mempool_transaction(&self, tx: crate::event::MempoolTransaction) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        for output in &tx.outputs {
            let Some(datum) = &output.datum else { continue };
            if !self.config.pool_addresses.contains(&output.address) {
                continue;
            }
            let ctx = DatumContext::new(tx.tx_hash.clone(), 0, 0, 0);
            if let Some(mut state) = self.registry.parse_pool(datum, &ctx, &output.value) {
                state.network = self.config.network.clone();
                state.tx_hash = tx.tx_hash.clone();
                state.tx_index = 0;
                state.slot = 0;
                state.from_mempool = true;

                let previous_price = self.caches.pools.get(&state.key()).map(|p| p.price_xy());
                self.caches.pools.put(state.clone());
                self.mempool.add_pending(&state.pool_id, &tx.tx_hash, state.clone());
                let _ = self.price_updates.send(PriceUpdate::from_pool(&state, previous_price));
            }
        }
    }

    /// Idempotent: a second call is a no-op. Flushes every persistence
    /// store; in-flight handler callbacks are expected to complete
    /// normally since `stop()` only gates future calls, never cancels a
    /// call already in progress.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.persistence.flush_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Output, TxContext};
    use crate::protocols::minswap_v2;
    use crate::scope::Protocol;

    fn registry() -> ParserRegistry {
        let mut r = ParserRegistry::new();
        r.register_pool(Box::new(minswap_v2::MinswapV2Parser));
        r
    }

    fn asset_constr(policy: &str, name: &str) -> crate::codec::PlutusValue {
        crate::codec::PlutusValue::Constr {
            tag: 0,
            fields: vec![
                crate::codec::PlutusValue::Bytes(hex::decode(policy).unwrap()),
                crate::codec::PlutusValue::Bytes(name.as_bytes().to_vec()),
            ],
        }
    }

    fn pool_datum() -> Vec<u8> {
        use crate::codec::PlutusValue;
        let fee_pair = PlutusValue::List(vec![PlutusValue::Int(30), PlutusValue::Int(30)]);
        PlutusValue::Constr {
            tag: 0,
            fields: vec![
                PlutusValue::Bytes(vec![0u8; 28]),
                asset_constr("", ""),
                asset_constr("abcdef", "MIN"),
                PlutusValue::Int(1_000_000_000),
                PlutusValue::Int(500_000_000),
                PlutusValue::Int(750_000_000),
                fee_pair,
                PlutusValue::Constr { tag: 1, fields: vec![] },
                PlutusValue::Constr { tag: 0, fields: vec![] },
            ],
        }
        .encode()
    }

    fn coordinator() -> (OracleCoordinator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = OracleConfig::new("mainnet", dir.path().to_str().unwrap());
        config.pool_addresses.insert("addr_pool".to_string());
        let coordinator = OracleCoordinator::new(config, registry()).unwrap();
        (coordinator, dir)
    }

    fn tx_event() -> TransactionEvent {
        TransactionEvent {
            context: TxContext {
                tx_hash: "txhash".to_string(),
                tx_index: 0,
                slot: 100,
                block_hash: "blockhash".to_string(),
                timestamp: 1_700_000_000_000,
            },
            outputs: vec![Output {
                address: "addr_pool".to_string(),
                datum: Some(pool_datum()),
                value: vec![],
            }],
        }
    }

    #[test]
    fn confirmed_transaction_populates_cache_and_disk() {
        let (coordinator, _dir) = coordinator();
        coordinator.handle_transaction(tx_event());

        let pools = coordinator.caches().pools.get_all_by_protocol(Protocol::MinswapV2);
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].asset_x.amount, 500_000_000);
        assert!(!pools[0].reserves_unknown);

        let loaded = coordinator.persistence.pools.get(&pools[0].key()).unwrap();
        assert!(loaded.is_some());
    }

    #[test]
    fn rollback_clears_cache_and_disk() {
        let (coordinator, _dir) = coordinator();
        coordinator.handle_transaction(tx_event());
        let key = coordinator.caches().pools.get_all_by_protocol(Protocol::MinswapV2)[0].key();

        coordinator.handle_rollback(RollbackEvent {
            slot: 50,
            block_hash: "rollback".to_string(),
        });

        assert!(coordinator.caches().pools.get(&key).is_none());
        assert!(coordinator.persistence.pools.get(&key).unwrap().is_none());
    }

    #[test]
    fn stop_is_idempotent() {
        let (coordinator, _dir) = coordinator();
        coordinator.stop();
        coordinator.stop();
        coordinator.handle_transaction(tx_event());
        // Handlers after stop() are no-ops: nothing lands in the cache.
        assert!(coordinator.caches().pools.get_all_by_protocol(Protocol::MinswapV2).is_empty());
    }
}
