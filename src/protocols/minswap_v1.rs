//! Minswap v1 AMM pools.
//!
//! The v1 pool datum carries no reserve or asset information at all — it is
//! a bare presence marker (constructor 0, no fields of interest to this
//! decoder). Reserves and asset identities live entirely in the UTxO's
//! multi-asset value, so `parse_pool_datum` can only confirm "this is a v1
//! pool output" and must mark the result `reserves_unknown`; callers that
//! have the accompanying value should use [`pool_from_value`] instead.

use crate::asset::{AssetAmount, AssetId};
use crate::codec::{ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::PoolState;
use crate::parsers::{DatumContext, PoolParser};
use crate::scope::Protocol;

const LP_TOKEN_POLICY_ID: &str = "e4214b7cce62ac6fbba385d164df48e157eae5863521b4b67ca71d86";
const POOL_NFT_POLICY_ID: &str = "0be55d262b29f564998ff81efe21bdc0022621c12f15af08d0f2ddb1";
const POOL_FEE_NUM: u64 = 997;
const POOL_FEE_DENOM: u64 = 1000;

struct PoolDatum;

impl ConstrSchema for PoolDatum {
    fn decode_fields(tag: u64, _fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        if tag != 0 {
            return Err(DecodeError::UnexpectedTag {
                got: tag,
                expected: "0".to_string(),
            });
        }
        Ok(PoolDatum)
    }
}

pub struct MinswapV1Parser;

impl PoolParser for MinswapV1Parser {
    fn protocol(&self) -> Protocol {
        Protocol::MinswapV1
    }

    fn parse_pool_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<PoolState>, DecodeError> {
        let value = PlutusValue::decode(datum)?;
        if !value.is_constr() {
            return Ok(None);
        }
        if crate::codec::decode_into::<PoolDatum>(datum).is_err() {
            return Ok(None);
        }

        Ok(Some(PoolState {
            pool_id: format!("minswap_v1_{}_{}", ctx.tx_hash, ctx.tx_index),
            protocol: Protocol::MinswapV1,
            network: String::new(),
            asset_x: AssetAmount::ada(0),
            asset_y: AssetAmount::ada(0),
            fee_num: POOL_FEE_NUM,
            fee_denom: POOL_FEE_DENOM,
            slot: ctx.slot,
            block_hash: String::new(),
            tx_hash: ctx.tx_hash.clone(),
            tx_index: ctx.tx_index,
            timestamp: ctx.timestamp,
            updated_at: ctx.timestamp,
            from_mempool: false,
            reserves_unknown: true,
        }))
    }

    fn refine_with_value(
        &self,
        _datum: &[u8],
        value: &[(String, u64)],
        state: PoolState,
    ) -> Result<Option<PoolState>, DecodeError> {
        let ctx = DatumContext::new(state.tx_hash.clone(), state.tx_index, state.slot, state.timestamp);
        pool_from_value(value, &ctx)
    }
}

/// Build a fully-populated `PoolState` from the UTxO's multi-asset value,
/// mirroring the teacher's `liquidity_pool_from_utxo`: strip the pool NFT
/// and LP tokens, and whatever two asset lines remain are the reserves.
pub fn pool_from_value(
    value: &[(String, u64)],
    ctx: &DatumContext,
) -> Result<Option<PoolState>, DecodeError> {
    let relevant: Vec<&(String, u64)> = value
        .iter()
        .filter(|(unit, _)| !unit.starts_with(LP_TOKEN_POLICY_ID) && !unit.starts_with(POOL_NFT_POLICY_ID))
        .collect();

    if relevant.len() < 2 {
        return Ok(None);
    }

    let pool_id = value
        .iter()
        .find(|(unit, _)| unit.starts_with(POOL_NFT_POLICY_ID))
        .map(|(unit, _)| format!("minswap_v1_{unit}"))
        .unwrap_or_else(|| format!("minswap_v1_{}_{}", ctx.tx_hash, ctx.tx_index));

    let (idx_a, idx_b) = if relevant.len() == 2 { (0, 1) } else { (1, 2) };
    let (unit_a, amount_a) = relevant[idx_a];
    let (unit_b, amount_b) = relevant[idx_b];

    let asset_x = AssetAmount::new(AssetId::from_unit(unit_a).map_err(|e| DecodeError::shape(e.to_string()))?, *amount_a);
    let asset_y = AssetAmount::new(AssetId::from_unit(unit_b).map_err(|e| DecodeError::shape(e.to_string()))?, *amount_b);

    Ok(Some(PoolState {
        pool_id,
        protocol: Protocol::MinswapV1,
        network: String::new(),
        asset_x,
        asset_y,
        fee_num: POOL_FEE_NUM,
        fee_denom: POOL_FEE_DENOM,
        slot: ctx.slot,
        block_hash: String::new(),
        tx_hash: ctx.tx_hash.clone(),
        tx_index: ctx.tx_index,
        timestamp: ctx.timestamp,
        updated_at: ctx.timestamp,
        from_mempool: false,
        reserves_unknown: false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DatumContext {
        DatumContext::new("deadbeef", 0, 100, 1_700_000_000_000)
    }

    #[test]
    fn marker_datum_decodes_with_reserves_unknown() {
        let datum = PlutusValue::Constr { tag: 0, fields: vec![] }.encode();
        let parser = MinswapV1Parser;
        let state = parser.parse_pool_datum(&datum, &ctx()).unwrap().unwrap();
        assert!(state.reserves_unknown);
        assert_eq!(state.protocol, Protocol::MinswapV1);
    }

    #[test]
    fn foreign_tag_is_not_my_datum() {
        let datum = PlutusValue::Constr { tag: 3, fields: vec![] }.encode();
        let parser = MinswapV1Parser;
        assert!(parser.parse_pool_datum(&datum, &ctx()).unwrap().is_none());
    }

    #[test]
    fn pool_from_value_extracts_reserves() {
        let policy = hex::encode([0xabu8; 28]);
        let value = vec![
            ("lovelace".to_string(), 500_000_000),
            (format!("{policy}4d494e"), 750_000_000),
            (format!("{POOL_NFT_POLICY_ID}4d494e"), 1),
        ];
        let state = pool_from_value(&value, &ctx()).unwrap().unwrap();
        assert!(!state.reserves_unknown);
        assert_eq!(state.asset_x.amount, 500_000_000);
        assert_eq!(state.asset_y.amount, 750_000_000);
    }
}
