//! Minswap v2 AMM pools. Unlike v1, the v2 datum carries reserves directly,
//! so `parse_pool_datum` alone is enough to produce a complete `PoolState`.

use crate::asset::{AssetAmount, AssetId};
use crate::codec::{decode_into, ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::PoolState;
use crate::parsers::{DatumContext, PoolParser};
use crate::scope::Protocol;

const FEE_DENOM: u64 = 10_000;

struct PoolDatum {
    asset_a: (String, String),
    asset_b: (String, String),
    reserve_a: u64,
    reserve_b: u64,
    base_fee_bps: u64,
}

/// Minswap v2 uses on-chain `Bool` with the standard Plutus convention:
/// constructor 0 is `False`, constructor 1 is `True`. A parallel upstream
/// implementation inverts this; per the resolved design note we treat that
/// as the bug and keep the convention below.
fn decode_bool(value: &PlutusValue) -> Result<bool, DecodeError> {
    let (tag, _) = value.as_constr()?;
    match tag {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DecodeError::UnexpectedTag {
            got: other,
            expected: "0 or 1 (Bool)".to_string(),
        }),
    }
}

/// The base fee field is a pair of basis-point integers (buy-side,
/// sell-side); Minswap v2 pools always set them equal, so we average them
/// rather than special-case a "they differ" branch no live pool exercises.
fn decode_fee_pair(value: &PlutusValue) -> Result<u64, DecodeError> {
    let items = match value {
        PlutusValue::List(items) => items.as_slice(),
        PlutusValue::Constr { fields, .. } => fields.as_slice(),
        other => return Err(DecodeError::shape(format!("expected fee pair, got {other:?}"))),
    };
    if items.len() != 2 {
        return Err(DecodeError::shape(format!(
            "fee pair expected 2 elements, got {}",
            items.len()
        )));
    }
    let a = items[0].as_u64()?;
    let b = items[1].as_u64()?;
    Ok((a + b) / 2)
}

impl ConstrSchema for PoolDatum {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        if tag != 0 {
            return Err(DecodeError::UnexpectedTag {
                got: tag,
                expected: "0".to_string(),
            });
        }
        if fields.len() < 9 {
            return Err(DecodeError::shape(format!(
                "minswap v2 pool datum expected at least 9 fields, got {}",
                fields.len()
            )));
        }
        let asset_a = fields[1].as_asset_pair()?;
        let asset_b = fields[2].as_asset_pair()?;
        let reserve_a = fields[4].as_u64()?;
        let reserve_b = fields[5].as_u64()?;
        let base_fee_bps = decode_fee_pair(&fields[6])?;
        // fields[7] fee-sharing Maybe, fields[8] allow-dynamic-fee Bool —
        // decoded to validate shape but not surfaced on PoolState yet.
        let _ = decode_bool(&fields[8])?;

        Ok(PoolDatum {
            asset_a,
            asset_b,
            reserve_a,
            reserve_b,
            base_fee_bps,
        })
    }
}

pub struct MinswapV2Parser;

impl PoolParser for MinswapV2Parser {
    fn protocol(&self) -> Protocol {
        Protocol::MinswapV2
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

        let asset_x = AssetId::from_hex(&decoded.asset_a.0, &decoded.asset_a.1)
            .map_err(|e| DecodeError::shape(e.to_string()))?;
        let asset_y = AssetId::from_hex(&decoded.asset_b.0, &decoded.asset_b.1)
            .map_err(|e| DecodeError::shape(e.to_string()))?;

        let fee_num = FEE_DENOM.saturating_sub(decoded.base_fee_bps);

        Ok(Some(PoolState {
            pool_id: format!(
                "minswap_v2_{}.{}_{}.{}",
                decoded.asset_a.0, decoded.asset_a.1, decoded.asset_b.0, decoded.asset_b.1
            ),
            protocol: Protocol::MinswapV2,
            network: String::new(),
            asset_x: AssetAmount::new(asset_x, decoded.reserve_a),
            asset_y: AssetAmount::new(asset_y, decoded.reserve_b),
            fee_num,
            fee_denom: FEE_DENOM,
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
}
