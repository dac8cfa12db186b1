//! SundaeSwap v3 AMM pools. The v3 datum separates a bid-side and ask-side
//! fee; this decoder reports their arithmetic mean as a single retained
//! fraction, which is an approximation the caller should be aware of when
//! the two sides diverge (SundaeSwap v3 rarely sets them unequal in
//! practice, but the datum allows it).

use crate::asset::{AssetAmount, AssetId};
use crate::codec::{decode_into, ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::PoolState;
use crate::parsers::{DatumContext, PoolParser};
use crate::scope::Protocol;

const LP_TOKEN_POLICY_ID: &str = "e0302560ced2fdcbfcb2602697df970cd0d6a38f94b32703f51c312b";
const FEE_DENOM: u64 = 10_000;

struct PoolDatum {
    bid_fee_bps: u64,
    ask_fee_bps: u64,
    lovelace_deduction: i64,
}

impl ConstrSchema for PoolDatum {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        if tag != 0 {
            return Err(DecodeError::UnexpectedTag {
                got: tag,
                expected: "0".to_string(),
            });
        }
        if fields.len() < 8 {
            return Err(DecodeError::shape(format!(
                "sundaeswap v3 pool datum expected at least 8 fields, got {}",
                fields.len()
            )));
        }
        Ok(PoolDatum {
            bid_fee_bps: fields[3].as_u64()?,
            ask_fee_bps: fields[4].as_u64()?,
            lovelace_deduction: fields[7].as_i64()?,
        })
    }
}

pub struct SundaeSwapV3Parser;

impl PoolParser for SundaeSwapV3Parser {
    fn protocol(&self) -> Protocol {
        Protocol::SundaeSwapV3
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

        let mean_fee_bps = (decoded.bid_fee_bps + decoded.ask_fee_bps) / 2;
        let fee_num = FEE_DENOM.saturating_sub(mean_fee_bps);

        // The lovelace deduction only matters once reserves are known, so
        // `pool_from_value` takes it explicitly rather than storing it here.
        let _ = decoded.lovelace_deduction;

        Ok(Some(PoolState {
            pool_id: format!("sundaeswap_v3_{}_{}", ctx.tx_hash, ctx.tx_index),
            protocol: Protocol::SundaeSwapV3,
            network: String::new(),
            asset_x: AssetAmount::new(AssetId::ada(), 0),
            asset_y: AssetAmount::new(AssetId::ada(), 0),
            fee_num,
            fee_denom: FEE_DENOM,
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
        datum: &[u8],
        value: &[(String, u64)],
        state: PoolState,
    ) -> Result<Option<PoolState>, DecodeError> {
        let decoded: PoolDatum = decode_into(datum)?;
        pool_from_value(value, decoded.lovelace_deduction, state)
    }
}

/// Fill in reserves from the UTxO value, applying the datum's lovelace
/// deduction (a protocol-level rebate subtracted from whichever side is
/// ADA) the same way the teacher's `liquidity_pool_from_utxo_extend` does.
pub fn pool_from_value(
    value: &[(String, u64)],
    lovelace_deduction: i64,
    mut state: PoolState,
) -> Result<Option<PoolState>, DecodeError> {
    let mut pool_id = state.pool_id.clone();
    let relevant: Vec<&(String, u64)> = value
        .iter()
        .filter(|(unit, _)| {
            if unit.starts_with(LP_TOKEN_POLICY_ID) {
                pool_id = unit.clone();
                false
            } else {
                true
            }
        })
        .collect();

    if relevant.len() < 2 || relevant.len() > 3 {
        return Ok(None);
    }
    let (idx_a, idx_b) = if relevant.len() == 2 { (0, 1) } else { (1, 2) };
    let (unit_a, amount_a) = relevant[idx_a];
    let (unit_b, amount_b) = relevant[idx_b];

    let asset_a = AssetId::from_unit(unit_a).map_err(|e| DecodeError::shape(e.to_string()))?;
    let asset_b = AssetId::from_unit(unit_b).map_err(|e| DecodeError::shape(e.to_string()))?;
    let mut amount_a = *amount_a;
    let mut amount_b = *amount_b;

    if lovelace_deduction != 0 {
        let deduction = lovelace_deduction.unsigned_abs();
        if asset_a.is_ada() {
            amount_a = amount_a.saturating_sub(deduction);
        } else if asset_b.is_ada() {
            amount_b = amount_b.saturating_sub(deduction);
        }
    }

    state.pool_id = pool_id;
    state.asset_x = AssetAmount::new(asset_a, amount_a);
    state.asset_y = AssetAmount::new(asset_b, amount_b);
    state.reserves_unknown = false;
    Ok(Some(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DatumContext {
        DatumContext::new("face", 0, 10, 1_700_000_000_000)
    }

    fn datum(bid_bps: i128, ask_bps: i128, deduction: i128) -> Vec<u8> {
        PlutusValue::Constr {
            tag: 0,
            fields: vec![
                PlutusValue::Bytes(vec![]),
                PlutusValue::List(vec![]),
                PlutusValue::Int(1_000_000),
                PlutusValue::Int(bid_bps),
                PlutusValue::Int(ask_bps),
                PlutusValue::Int(0),
                PlutusValue::Int(0),
                PlutusValue::Int(deduction),
            ],
        }
        .encode()
    }

    #[test]
    fn mean_of_bid_and_ask_fee_is_reported() {
        let parser = SundaeSwapV3Parser;
        let state = parser.parse_pool_datum(&datum(20, 40, 0), &ctx()).unwrap().unwrap();
        assert_eq!(state.fee_num, 10_000 - 30);
        assert_eq!(state.fee_denom, 10_000);
    }

    #[test]
    fn lovelace_deduction_applies_to_ada_side() {
        let value = vec![
            ("lovelace".to_string(), 1_000_000_000),
            (format!("{}{}", hex::encode([1u8; 28]), "4d494e"), 500_000_000),
        ];
        let base = PoolState {
            pool_id: "x".to_string(),
            protocol: Protocol::SundaeSwapV3,
            network: String::new(),
            asset_x: AssetAmount::ada(0),
            asset_y: AssetAmount::ada(0),
            fee_num: 9970,
            fee_denom: 10_000,
            slot: 0,
            block_hash: String::new(),
            tx_hash: "x".to_string(),
            tx_index: 0,
            timestamp: 0,
            updated_at: 0,
            from_mempool: false,
            reserves_unknown: true,
        };
        let state = pool_from_value(&value, 1_000_000, base).unwrap().unwrap();
        assert_eq!(state.asset_x.amount, 999_000_000);
    }
}
