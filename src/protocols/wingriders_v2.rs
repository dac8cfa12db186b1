//! WingRiders v2 AMM pools. Four separate fee components sum to the swap
//! fee; the "treasury" datum fields are accumulated protocol fees, not
//! reserves, so they are subtracted from the UTxO value's raw amounts
//! rather than used as reserves directly (see `pool_from_value`). Stable
//! pool variants (identified by a populated `WingRidersV2Special` trailing
//! field) are recognized but not modeled — the caller gets `Ok(None)`.

use crate::asset::{AssetAmount, AssetId};
use crate::codec::{decode_into, ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::PoolState;
use crate::parsers::{DatumContext, PoolParser};
use crate::scope::Protocol;

const POOL_VALIDITY_POLICY: &str = "6fdc63a1d71dc2c65502b79baae7fb543185702b12c3c5fb639ed737";
const MIN_POOL_ADA: u64 = 3_000_000;
const FEE_DENOM: u64 = 10_000;

struct PoolDatum {
    asset_a: (String, String),
    asset_b: (String, String),
    swap_fee: u64,
    protocol_fee: u64,
    project_fee: u64,
    reserve_fee: u64,
    treasury_a: u64,
    treasury_b: u64,
    project_treasury_a: u64,
    project_treasury_b: u64,
    is_stable: bool,
}

impl ConstrSchema for PoolDatum {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        if tag != 0 {
            return Err(DecodeError::UnexpectedTag {
                got: tag,
                expected: "0".to_string(),
            });
        }
        if fields.len() < 14 {
            return Err(DecodeError::shape(format!(
                "wingriders v2 pool datum expected at least 14 fields, got {}",
                fields.len()
            )));
        }

        let asset_a = (fields[1].as_hex()?, fields[2].as_hex()?);
        let asset_b = (fields[3].as_hex()?, fields[4].as_hex()?);
        let swap_fee = fields[5].as_u64()?;
        let protocol_fee = fields[6].as_u64()?;
        let project_fee = fields[7].as_u64()?;
        let reserve_fee = fields[8].as_u64()?;
        let treasury_a = fields[12].as_u64()?;
        let treasury_b = fields[13].as_u64()?;
        let project_treasury_a = fields.get(14).and_then(|f| f.as_u64().ok()).unwrap_or(0);
        let project_treasury_b = fields.get(15).and_then(|f| f.as_u64().ok()).unwrap_or(0);
        let is_stable = fields.get(20).map(|f| f.is_nonempty_constr()).unwrap_or(false);

        Ok(PoolDatum {
            asset_a,
            asset_b,
            swap_fee,
            protocol_fee,
            project_fee,
            reserve_fee,
            treasury_a,
            treasury_b,
            project_treasury_a,
            project_treasury_b,
            is_stable,
        })
    }
}

pub struct WingRidersV2Parser;

impl PoolParser for WingRidersV2Parser {
    fn protocol(&self) -> Protocol {
        Protocol::WingRidersV2
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

        if decoded.is_stable {
            return Ok(None);
        }

        let asset_x = AssetId::from_hex(&decoded.asset_a.0, &decoded.asset_a.1)
            .map_err(|e| DecodeError::shape(e.to_string()))?;
        let asset_y = AssetId::from_hex(&decoded.asset_b.0, &decoded.asset_b.1)
            .map_err(|e| DecodeError::shape(e.to_string()))?;

        let fee_bps = decoded.swap_fee + decoded.protocol_fee + decoded.project_fee + decoded.reserve_fee;
        let fee_num = FEE_DENOM.saturating_sub(fee_bps);

        Ok(Some(PoolState {
            pool_id: format!(
                "wingriders_v2_{}.{}_{}.{}",
                decoded.asset_a.0, decoded.asset_a.1, decoded.asset_b.0, decoded.asset_b.1
            ),
            protocol: Protocol::WingRidersV2,
            network: String::new(),
            asset_x: AssetAmount::new(asset_x, 0),
            asset_y: AssetAmount::new(asset_y, 0),
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
        let treasury_a = decoded.treasury_a + decoded.project_treasury_a;
        let treasury_b = decoded.treasury_b + decoded.project_treasury_b;
        pool_from_value(value, treasury_a, treasury_b, state)
    }
}

/// Compute real reserves for `state` (whose `asset_x`/`asset_y` amounts are
/// still zero): raw UTxO amounts minus the pool's own treasury/project-
/// treasury accumulation, with the standard 3 ADA minimum-UTxO deposit
/// subtracted from whichever side is ADA.
pub fn pool_from_value(
    value: &[(String, u64)],
    treasury_a: u64,
    treasury_b: u64,
    mut state: PoolState,
) -> Result<Option<PoolState>, DecodeError> {
    let relevant: Vec<&(String, u64)> = value
        .iter()
        .filter(|(unit, _)| !unit.starts_with(POOL_VALIDITY_POLICY))
        .collect();
    if relevant.len() < 2 {
        return Ok(None);
    }
    let (idx_a, idx_b) = if relevant.len() == 2 { (0, 1) } else { (1, 2) };
    let (unit_a, raw_a) = relevant[idx_a];
    let (unit_b, raw_b) = relevant[idx_b];

    let reserve_a = if unit_a == "lovelace" {
        raw_a.saturating_sub(MIN_POOL_ADA)
    } else {
        *raw_a
    }
    .saturating_sub(treasury_a);
    let reserve_b = if unit_b == "lovelace" {
        raw_b.saturating_sub(MIN_POOL_ADA)
    } else {
        *raw_b
    }
    .saturating_sub(treasury_b);

    state.asset_x.amount = reserve_a;
    state.asset_y.amount = reserve_b;
    state.reserves_unknown = false;
    Ok(Some(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DatumContext {
        DatumContext::new("beef", 1, 20, 1_700_000_000_000)
    }

    fn datum(stable: bool) -> Vec<u8> {
        let mut fields = vec![
            PlutusValue::Bytes(vec![]),
            PlutusValue::Bytes(vec![]),
            PlutusValue::Bytes(vec![]),
            PlutusValue::Bytes(hex::decode("ab").unwrap()),
            PlutusValue::Bytes(b"TOK".to_vec()),
            PlutusValue::Int(25),
            PlutusValue::Int(5),
            PlutusValue::Int(0),
            PlutusValue::Int(5),
            PlutusValue::Int(10_000),
            PlutusValue::Int(0),
            PlutusValue::Int(0),
            PlutusValue::Int(1_000),
            PlutusValue::Int(2_000),
        ];
        for _ in 0..6 {
            fields.push(PlutusValue::Int(0));
        }
        fields.push(if stable {
            PlutusValue::Constr { tag: 0, fields: vec![PlutusValue::Int(1)] }
        } else {
            PlutusValue::Constr { tag: 1, fields: vec![] }
        });
        PlutusValue::Constr { tag: 0, fields }.encode()
    }

    #[test]
    fn fee_is_sum_of_four_components_and_reserves_start_unknown() {
        let parser = WingRidersV2Parser;
        let state = parser.parse_pool_datum(&datum(false), &ctx()).unwrap().unwrap();
        assert_eq!(state.fee_num, 10_000 - 35);
        assert_eq!(state.asset_x.amount, 0);
        assert_eq!(state.asset_y.amount, 0);
        assert!(state.reserves_unknown);
    }

    #[test]
    fn refine_with_value_subtracts_treasury_and_min_ada_deposit() {
        let parser = WingRidersV2Parser;
        let raw_datum = datum(false);
        let state = parser.parse_pool_datum(&raw_datum, &ctx()).unwrap().unwrap();

        // treasury_a = 1_000, treasury_b = 2_000 (see `datum`); MIN_POOL_ADA
        // is subtracted from the lovelace side before the treasury figure.
        let value = vec![
            ("lovelace".to_string(), MIN_POOL_ADA + 1_000 + 500_000),
            ("sometoken".to_string(), 2_000 + 750_000),
        ];
        let refined = parser.refine_with_value(&raw_datum, &value, state).unwrap().unwrap();
        assert_eq!(refined.asset_x.amount, 500_000);
        assert_eq!(refined.asset_y.amount, 750_000);
        assert!(!refined.reserves_unknown);
    }

    #[test]
    fn stable_pool_variant_is_skipped() {
        let parser = WingRidersV2Parser;
        assert!(parser.parse_pool_datum(&datum(true), &ctx()).unwrap().is_none());
    }
}
