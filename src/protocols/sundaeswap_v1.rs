//! SundaeSwap v1 AMM pools. The datum carries only the pool's LP fee
//! fraction; reserves live in the UTxO value, same split as Minswap v1.

use crate::asset::{AssetAmount, AssetId};
use crate::codec::{decode_into, ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::PoolState;
use crate::parsers::{DatumContext, PoolParser};
use crate::scope::Protocol;

const LP_TOKEN_POLICY_ID: &str = "0029cb7c88c7567b63d1a512c0ed626aa169688ec980730c0473b913";

struct PoolDatum {
    fee_numerator: u64,
    fee_denominator: u64,
}

impl ConstrSchema for PoolDatum {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        if tag != 0 {
            return Err(DecodeError::UnexpectedTag {
                got: tag,
                expected: "0".to_string(),
            });
        }
        if fields.len() < 4 {
            return Err(DecodeError::shape(format!(
                "sundaeswap v1 pool datum expected at least 4 fields, got {}",
                fields.len()
            )));
        }
        let fee_fields = fields[3].expect_constr(0).or_else(|_| fields[3].as_list())?;
        if fee_fields.len() < 2 {
            return Err(DecodeError::shape(format!(
                "sundaeswap v1 fee pair expected 2 fields, got {}",
                fee_fields.len()
            )));
        }
        Ok(PoolDatum {
            fee_numerator: fee_fields[0].as_u64()?,
            fee_denominator: fee_fields[1].as_u64()?,
        })
    }
}

pub struct SundaeSwapV1Parser;

impl PoolParser for SundaeSwapV1Parser {
    fn protocol(&self) -> Protocol {
        Protocol::SundaeSwapV1
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

        let fee_num = if decoded.fee_numerator >= decoded.fee_denominator {
            0
        } else {
            decoded.fee_denominator - decoded.fee_numerator
        };

        Ok(Some(PoolState {
            pool_id: format!("sundaeswap_v1_{}_{}", ctx.tx_hash, ctx.tx_index),
            protocol: Protocol::SundaeSwapV1,
            network: String::new(),
            asset_x: AssetAmount::new(AssetId::ada(), 0),
            asset_y: AssetAmount::new(AssetId::ada(), 0),
            fee_num,
            fee_denom: decoded.fee_denominator,
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
        pool_from_value(value, state)
    }
}

/// Fill in reserves and pool id from the UTxO value once the LP token unit
/// (and therefore the two reserve lines) is known.
pub fn pool_from_value(
    value: &[(String, u64)],
    fee: PoolState,
) -> Result<Option<PoolState>, DecodeError> {
    let mut pool_id = fee.pool_id.clone();
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

    let mut state = fee;
    state.pool_id = pool_id;
    state.asset_x = AssetAmount::new(
        AssetId::from_unit(unit_a).map_err(|e| DecodeError::shape(e.to_string()))?,
        *amount_a,
    );
    state.asset_y = AssetAmount::new(
        AssetId::from_unit(unit_b).map_err(|e| DecodeError::shape(e.to_string()))?,
        *amount_b,
    );
    state.reserves_unknown = false;
    Ok(Some(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DatumContext {
        DatumContext::new("cafe", 0, 50, 1_700_000_000_000)
    }

    fn datum(numerator: i128, denominator: i128) -> Vec<u8> {
        PlutusValue::Constr {
            tag: 0,
            fields: vec![
                PlutusValue::Constr { tag: 0, fields: vec![] },
                PlutusValue::Bytes(vec![1, 2, 3]),
                PlutusValue::Int(1_000_000),
                PlutusValue::Constr {
                    tag: 0,
                    fields: vec![PlutusValue::Int(numerator), PlutusValue::Int(denominator)],
                },
            ],
        }
        .encode()
    }

    #[test]
    fn fee_is_retained_fraction() {
        let parser = SundaeSwapV1Parser;
        let state = parser.parse_pool_datum(&datum(3, 1000), &ctx()).unwrap().unwrap();
        assert_eq!(state.fee_num, 997);
        assert_eq!(state.fee_denom, 1000);
        assert!(state.reserves_unknown);
    }

    #[test]
    fn fee_exceeding_denom_clamps_to_zero() {
        let parser = SundaeSwapV1Parser;
        let state = parser.parse_pool_datum(&datum(2000, 1000), &ctx()).unwrap().unwrap();
        assert_eq!(state.fee_num, 0);
    }
}
