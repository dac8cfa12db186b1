//! Durable persistence for cache state, backed by `sled` — a pure-Rust
//! embedded ordered key-value store. Grounded in the role `pallas-rolldb`
//! plays over `rocksdb` in the teacher repo ("one embedded store,
//! rollback-aware, iterator-based bulk load"), but `sled` replaces
//! `rocksdb` here: the key scheme below is a single flat ordered keyspace,
//! which maps onto one `sled::Tree` with prefix iteration rather than
//! needing rocksdb's column-family ceremony, and `sled` needs no system
//! library to vendor. See DESIGN.md for the full justification.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::HasSlot;
use crate::error::StorageError;
use crate::scope::ScopedKey;

/// `"<kind>_<network>:<protocol>:<id>"` — the flat key every record is
/// stored under, regardless of which `sled::Tree` it lives in.
fn encode_key(kind: &str, key: &ScopedKey) -> Vec<u8> {
    format!("{kind}_{key}").into_bytes()
}

/// One embedded store for one state kind (`oracle_pool`, `lending_state`,
/// `cdp_state`, `order_state`, `bond_state`).
pub struct PersistenceAdapter<S> {
    db: sled::Db,
    kind: &'static str,
    _marker: std::marker::PhantomData<S>,
}

impl<S> PersistenceAdapter<S>
where
    S: Serialize + DeserializeOwned + Clone + HasSlot,
{
    /// Opens (creating if absent) `<root>/<kind>`. Failure here is fatal to
    /// the oracle's `start()` per spec.md section 7.
    pub fn open(root: impl AsRef<Path>, kind: &'static str) -> Result<Self, StorageError> {
        let db = sled::open(root.as_ref().join(kind))?;
        Ok(Self {
            db,
            kind,
            _marker: std::marker::PhantomData,
        })
    }

    /// Marshal errors surface to the caller, who logs and continues —
    /// a single failed write never aborts event processing.
    pub fn put(&self, key: &ScopedKey, state: &S) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(state).map_err(StorageError::Encode)?;
        self.db.insert(encode_key(self.kind, key), bytes)?;
        Ok(())
    }

    pub fn get(&self, key: &ScopedKey) -> Result<Option<S>, StorageError> {
        let Some(bytes) = self.db.get(encode_key(self.kind, key))? else {
            return Ok(None);
        };
        let state = serde_json::from_slice(&bytes).map_err(|source| StorageError::Decode {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(state))
    }

    pub fn delete(&self, key: &ScopedKey) -> Result<(), StorageError> {
        self.db.remove(encode_key(self.kind, key))?;
        Ok(())
    }

    /// Scans every record in this store and deletes those whose slot is
    /// `>= slot`. A value that fails to parse is logged and skipped, never
    /// treated as a match (forward-tolerant load, spec.md section 7).
    pub fn delete_prefix_at_or_after_slot(&self, slot: u64) -> Result<(), StorageError> {
        let mut to_delete = Vec::new();
        for entry in self.db.iter() {
            let (key, bytes) = entry?;
            match serde_json::from_slice::<S>(&bytes) {
                Ok(state) if state.cache_slot() >= slot => to_delete.push(key),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %err,
                        "skipping unparsable record during rollback scan"
                    );
                }
            }
        }
        for key in to_delete {
            self.db.remove(key)?;
        }
        Ok(())
    }

    /// Load every record this store holds. A single bad value logs a
    /// warning and is skipped; the rest of the iteration continues.
    /// Flush buffered writes to disk. Called once from the coordinator's
    /// `stop()`.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn load_all(&self) -> Result<Vec<S>, StorageError> {
        let mut out = Vec::new();
        for entry in self.db.iter() {
            let (key, bytes) = entry?;
            match serde_json::from_slice::<S>(&bytes) {
                Ok(state) => out.push(state),
                Err(err) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %err,
                        "skipping unparsable record on load"
                    );
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetAmount;
    use crate::models::PoolState;
    use crate::scope::Protocol;

    fn pool(pool_id: &str, slot: u64) -> PoolState {
        PoolState {
            pool_id: pool_id.to_string(),
            protocol: Protocol::MinswapV2,
            network: "mainnet".to_string(),
            asset_x: AssetAmount::ada(1),
            asset_y: AssetAmount::ada(2),
            fee_num: 997,
            fee_denom: 1000,
            slot,
            block_hash: String::new(),
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
        let dir = tempfile::tempdir().unwrap();
        let store: PersistenceAdapter<PoolState> = PersistenceAdapter::open(dir.path(), "oracle_pool").unwrap();
        let state = pool("p1", 10);
        store.put(&state.key(), &state).unwrap();
        let loaded = store.get(&state.key()).unwrap().unwrap();
        assert_eq!(loaded.pool_id, "p1");
    }

    #[test]
    fn delete_removes_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let store: PersistenceAdapter<PoolState> = PersistenceAdapter::open(dir.path(), "oracle_pool").unwrap();
        let state = pool("p1", 10);
        store.put(&state.key(), &state).unwrap();
        store.delete(&state.key()).unwrap();
        assert!(store.get(&state.key()).unwrap().is_none());
    }

    #[test]
    fn rollback_deletes_only_slots_at_or_after_the_cut() {
        let dir = tempfile::tempdir().unwrap();
        let store: PersistenceAdapter<PoolState> = PersistenceAdapter::open(dir.path(), "oracle_pool").unwrap();
        let p1 = pool("p1", 100);
        let p2 = pool("p2", 200);
        let p3 = pool("p3", 300);
        store.put(&p1.key(), &p1).unwrap();
        store.put(&p2.key(), &p2).unwrap();
        store.put(&p3.key(), &p3).unwrap();

        store.delete_prefix_at_or_after_slot(200).unwrap();

        let remaining = store.load_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].pool_id, "p1");
    }

    #[test]
    fn load_all_skips_an_unparsable_value_and_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let store: PersistenceAdapter<PoolState> = PersistenceAdapter::open(dir.path(), "oracle_pool").unwrap();
        let good = pool("p1", 1);
        store.put(&good.key(), &good).unwrap();
        store
            .db
            .insert(encode_key("oracle_pool", &ScopedKey::new("mainnet", Protocol::MinswapV2, "corrupt")), b"not json".to_vec())
            .unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].pool_id, "p1");
    }
}
