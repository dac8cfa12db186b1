//! The asset model shared by every protocol parser.

use serde::{Deserialize, Serialize};

/// A Cardano native asset class: a minting policy id plus an asset name.
///
/// The empty/empty pair is the ADA sentinel ("lovelace"). A non-ADA
/// `AssetId` always has a non-empty policy — see [`AssetId::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId {
    policy_id: Vec<u8>,
    name: Vec<u8>,
}

impl AssetId {
    /// Cardano policy ids are 28-byte script hashes; asset names are at
    /// most 32 bytes. Construction does not enforce the upper bounds — the
    /// chain itself already did, and exact CBOR round-trip matters more
    /// than prematurely rejecting values this decoder only ever reads.
    pub fn new(policy_id: Vec<u8>, name: Vec<u8>) -> Self {
        Self { policy_id, name }
    }

    pub fn ada() -> Self {
        Self {
            policy_id: Vec::new(),
            name: Vec::new(),
        }
    }

    pub fn from_hex(policy_hex: &str, name_hex: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self::new(hex::decode(policy_hex)?, hex::decode(name_hex)?))
    }

    /// Parse a chain-indexer "unit" string: `"lovelace"` for ADA, else the
    /// concatenated `hex(policy)hex(name)` a UTxO value line reports (the
    /// first 56 hex characters are always the 28-byte policy id).
    pub fn from_unit(unit: &str) -> Result<Self, hex::FromHexError> {
        if unit.is_empty() || unit == "lovelace" {
            return Ok(Self::ada());
        }
        if unit.len() < 56 {
            return Self::from_hex(unit, "");
        }
        let (policy_hex, name_hex) = unit.split_at(56);
        Self::from_hex(policy_hex, name_hex)
    }

    pub fn is_ada(&self) -> bool {
        self.policy_id.is_empty() && self.name.is_empty()
    }

    pub fn policy_id(&self) -> &[u8] {
        &self.policy_id
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn policy_hex(&self) -> String {
        hex::encode(&self.policy_id)
    }

    pub fn name_hex(&self) -> String {
        hex::encode(&self.name)
    }

    /// `"lovelace"` for ADA, else `hex(policy) "." hex(name)`.
    pub fn fingerprint(&self) -> String {
        if self.is_ada() {
            "lovelace".to_string()
        } else {
            format!("{}.{}", self.policy_hex(), self.name_hex())
        }
    }

    /// `hex(policy)hex(name)` with no separator — the concatenated "unit"
    /// form most chain indexers (Kupo, Blockfrost) return.
    pub fn unit(&self) -> String {
        if self.is_ada() {
            "lovelace".to_string()
        } else {
            format!("{}{}", self.policy_hex(), self.name_hex())
        }
    }
}

/// A quantity of a specific asset class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    pub class: AssetId,
    pub amount: u64,
}

impl AssetAmount {
    pub fn new(class: AssetId, amount: u64) -> Self {
        Self { class, amount }
    }

    pub fn ada(amount: u64) -> Self {
        Self::new(AssetId::ada(), amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ada_fingerprint_is_lovelace() {
        assert_eq!(AssetId::ada().fingerprint(), "lovelace");
        assert!(AssetId::ada().is_ada());
    }

    #[test]
    fn non_ada_fingerprint_is_dotted_hex() {
        let id = AssetId::from_hex("abcdef", "4d494e").unwrap();
        assert_eq!(id.fingerprint(), "abcdef.4d494e");
        assert!(!id.is_ada());
    }

    #[test]
    fn equality_is_by_component() {
        let a = AssetId::from_hex("ab", "01").unwrap();
        let b = AssetId::from_hex("ab", "01").unwrap();
        let c = AssetId::from_hex("ab", "02").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
