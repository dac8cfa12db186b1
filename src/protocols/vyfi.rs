//! VyFi AMM pools. Reserves live directly in the datum (`treasuryA`,
//! `treasuryB`), unlike most of the other AMMs in this crate, but asset
//! *identity* still has to be recovered from the UTxO's multi-asset value:
//! the pool NFT is whichever entry carries amount 1, asset A is ADA, and
//! asset B is the remaining multi-unit non-ADA entry. `parse_pool_datum`
//! fills in amounts with placeholder ADA identities; [`pool_from_value`]
//! swaps in the real asset classes once the value is available.

use crate::asset::{AssetAmount, AssetId};
use crate::codec::{decode_into, ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::PoolState;
use crate::parsers::{DatumContext, PoolParser};
use crate::scope::Protocol;

const FEE_NUM: u64 = 997;
const FEE_DENOM: u64 = 1000;

struct PoolDatum {
    treasury_a: u64,
    treasury_b: u64,
}

impl ConstrSchema for PoolDatum {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        if tag != 0 {
            return Err(DecodeError::UnexpectedTag {
                got: tag,
                expected: "0".to_string(),
            });
        }
        if fields.len() < 3 {
            return Err(DecodeError::shape(format!(
                "vyfi pool datum expected at least 3 fields (treasuryA, treasuryB, issuedShares), got {}",
                fields.len()
            )));
        }
        Ok(PoolDatum {
            treasury_a: fields[0].as_u64()?,
            treasury_b: fields[1].as_u64()?,
            // fields[2]: issuedShares — not part of PoolState, decoded only
            // to validate shape.
        })
    }
}

pub struct VyFiParser;

impl PoolParser for VyFiParser {
    fn protocol(&self) -> Protocol {
        Protocol::VyFi
    }

    fn parse_pool_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<PoolState>, DecodeError> {
        let decoded: PoolDatum = match decode_into(datum) {
            Ok(d) => d,
            Err(DecodeError::UnexpectedTag { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(PoolState {
            pool_id: format!("vyfi_{}_{}", ctx.tx_hash, ctx.tx_index),
            protocol: Protocol::VyFi,
            network: String::new(),
            asset_x: AssetAmount::new(AssetId::ada(), decoded.treasury_a),
            asset_y: AssetAmount::new(AssetId::ada(), decoded.treasury_b),
            fee_num: FEE_NUM,
            fee_denom: FEE_DENOM,
            slot: ctx.slot,
            block_hash: String::new(),
            tx_hash: ctx.tx_hash.clone(),
            tx_index: ctx.tx_index,
            timestamp: ctx.timestamp,
            updated_at: ctx.timestamp,
            from_mempool: false,
            // Amounts are already correct (read from the datum); this flag
            // means "asset identity still needs `pool_from_value`".
            reserves_unknown: true,
        }))
    }

    fn refine_with_value(
        &self,
        _datum: &[u8],
        value: &[(String, u64)],
        state: PoolState,
    ) -> Result<Option<PoolState>, DecodeError> {
        pool_from_value(value, state)
    }
}

/// Identify the pool NFT, asset A (ADA), and asset B from a pool UTxO's
/// value: exactly one entry must carry amount 1 (the NFT), and exactly one
/// non-ADA entry must carry amount >= 2 (asset B).
pub fn identify_assets(value: &[(String, u64)]) -> Result<(String, AssetId, AssetId), DecodeError> {
    let nfts: Vec<&(String, u64)> = value.iter().filter(|(_, amount)| *amount == 1).collect();
    if nfts.len() != 1 {
        return Err(DecodeError::shape(format!(
            "expected exactly one amount-1 entry (pool NFT), found {}",
            nfts.len()
        )));
    }

    let tokens: Vec<&(String, u64)> = value
        .iter()
        .filter(|(unit, amount)| *amount >= 2 && unit != "lovelace")
        .collect();
    if tokens.len() != 1 {
        return Err(DecodeError::shape(format!(
            "expected exactly one multi-unit non-ADA entry (asset B), found {}",
            tokens.len()
        )));
    }

    let asset_b = AssetId::from_unit(&tokens[0].0).map_err(|e| DecodeError::shape(e.to_string()))?;
    Ok((nfts[0].0.clone(), AssetId::ada(), asset_b))
}

/// Swap the placeholder ADA identities `parse_pool_datum` leaves behind for
/// the real asset classes recovered from the UTxO value. A value with the
/// wrong NFT/token shape is a decode failure, not a skip — propagated as an
/// `Err`, matching `identify_assets`.
pub fn pool_from_value(value: &[(String, u64)], mut state: PoolState) -> Result<Option<PoolState>, DecodeError> {
    let (nft_unit, asset_a, asset_b) = identify_assets(value)?;
    state.pool_id = format!("vyfi_{nft_unit}");
    state.asset_x.class = asset_a;
    state.asset_y.class = asset_b;
    state.reserves_unknown = false;
    Ok(Some(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DatumContext {
        DatumContext::new("dead", 0, 5, 1_700_000_000_000)
    }

    fn datum() -> Vec<u8> {
        PlutusValue::Constr {
            tag: 0,
            fields: vec![
                PlutusValue::Int(2_000_000_000),
                PlutusValue::Int(1_000_000_000),
                PlutusValue::Int(1_500_000_000),
            ],
        }
        .encode()
    }

    #[test]
    fn decodes_scenario_6_reserves_and_fee() {
        let parser = VyFiParser;
        let state = parser.parse_pool_datum(&datum(), &ctx()).unwrap().unwrap();
        assert_eq!(state.asset_x.amount, 2_000_000_000);
        assert_eq!(state.asset_y.amount, 1_000_000_000);
        assert_eq!(state.fee_num, 997);
        assert_eq!(state.fee_denom, 1000);
    }

    #[test]
    fn identifies_nft_and_asset_b_from_value() {
        let token_hex = format!("{}4d494e", hex::encode([2u8; 28]));
        let nft_hex = format!("{}4e4654", hex::encode([3u8; 28]));
        let value = vec![
            ("lovelace".to_string(), 1_000_000),
            (token_hex.clone(), 500_000),
            (nft_hex.clone(), 1),
        ];
        let (nft, asset_a, asset_b) = identify_assets(&value).unwrap();
        assert_eq!(nft, nft_hex);
        assert!(asset_a.is_ada());
        assert_eq!(asset_b.unit(), token_hex);
    }

    #[test]
    fn rejects_zero_or_multiple_nfts() {
        let value = vec![("lovelace".to_string(), 1_000_000)];
        assert!(identify_assets(&value).is_err());

        let nft_hex = format!("{}4e4654", hex::encode([3u8; 28]));
        let value = vec![(nft_hex.clone(), 1), (nft_hex, 1)];
        assert!(identify_assets(&value).is_err());
    }
}
