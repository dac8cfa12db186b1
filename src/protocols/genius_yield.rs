//! Genius Yield order-book orders: decoding, fill-amount math, and the
//! activity-window check used to decide whether an order can still be
//! matched.

use crate::asset::{AssetAmount, AssetId};
use crate::codec::{decode_into, ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::{OrderState, RationalPrice};
use crate::parsers::{DatumContext, OrderParser};
use crate::scope::Protocol;

struct OrderDatum {
    owner_pubkey_hash: String,
    offered_policy: String,
    offered_name: String,
    offered_amount: u64,
    original_amount: u64,
    asked_policy: String,
    asked_name: String,
    price_num: u64,
    price_denom: u64,
    start_time: Option<i64>,
    end_time: Option<i64>,
    partial_fills: u64,
    nft_name: String,
}

fn decode_maybe_int(value: &PlutusValue) -> Result<Option<i64>, DecodeError> {
    let (tag, fields) = value.as_constr()?;
    match tag {
        0 => Ok(Some(
            fields
                .first()
                .ok_or_else(|| DecodeError::shape("Just(_) missing field"))?
                .as_i64()?,
        )),
        1 => Ok(None),
        other => Err(DecodeError::UnexpectedTag {
            got: other,
            expected: "0 (Just) or 1 (Nothing)".to_string(),
        }),
    }
}

impl ConstrSchema for OrderDatum {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        if tag != 0 {
            return Err(DecodeError::UnexpectedTag {
                got: tag,
                expected: "0".to_string(),
            });
        }
        if fields.len() < 10 {
            return Err(DecodeError::shape(format!(
                "genius yield order datum expected at least 10 fields, got {}",
                fields.len()
            )));
        }

        let (offered_policy, offered_name) = fields[1].as_asset_pair()?;
        let offered_amount = fields[2].as_u64()?;
        let original_amount = fields[3].as_u64()?;
        let (asked_policy, asked_name) = fields[4].as_asset_pair()?;
        let price_pair = fields[5].expect_constr(0).or_else(|_| fields[5].as_list())?;
        if price_pair.len() != 2 {
            return Err(DecodeError::shape("price must be a (numerator, denominator) pair"));
        }
        let price_num = price_pair[0].as_u64()?;
        let price_denom = price_pair[1].as_u64()?;
        let start_time = decode_maybe_int(&fields[6])?;
        let end_time = decode_maybe_int(&fields[7])?;
        let partial_fills = fields[8].as_u64()?;
        let nft_name = fields[9].as_hex()?;

        Ok(OrderDatum {
            owner_pubkey_hash: fields[0].as_hex()?,
            offered_policy,
            offered_name,
            offered_amount,
            original_amount,
            asked_policy,
            asked_name,
            price_num,
            price_denom,
            start_time,
            end_time,
            partial_fills,
            nft_name,
        })
    }
}

pub struct GeniusYieldParser;

impl OrderParser for GeniusYieldParser {
    fn protocol(&self) -> Protocol {
        Protocol::GeniusYield
    }

    fn parse_order_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<OrderState>, DecodeError> {
        let decoded: OrderDatum = match decode_into(datum) {
            Ok(d) => d,
            Err(DecodeError::UnexpectedTag { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let offered = AssetId::from_hex(&decoded.offered_policy, &decoded.offered_name)
            .map_err(|e| DecodeError::shape(e.to_string()))?;
        let asked = AssetId::from_hex(&decoded.asked_policy, &decoded.asked_name)
            .map_err(|e| DecodeError::shape(e.to_string()))?;

        Ok(Some(OrderState {
            id: decoded.nft_name,
            protocol: Protocol::GeniusYield,
            network: String::new(),
            owner_pubkey_hash: decoded.owner_pubkey_hash,
            offered: AssetAmount::new(offered, decoded.offered_amount),
            original_amount: decoded.original_amount,
            asked,
            price: RationalPrice::new(decoded.price_num, decoded.price_denom),
            start_time: decoded.start_time,
            end_time: decoded.end_time,
            partial_fills: decoded.partial_fills,
            slot: ctx.slot,
            tx_hash: ctx.tx_hash.clone(),
            updated_at: ctx.timestamp,
        }))
    }
}

/// `(offered, remainder)` for consuming `asked` units of the order's asked
/// asset, per spec's fill-amount algorithm. All arithmetic is done in
/// `u128` to avoid overflow on large amounts before the final cast.
pub fn calculate_fill_amount(order: &OrderState, asked: u64) -> (u64, u64) {
    let price_num = order.price.numerator as u128;
    let price_denom = order.price.denominator as u128;
    if price_num == 0 {
        return (0, asked);
    }

    let asked = asked as u128;
    let max_offered = asked * price_denom / price_num;
    let remaining_offered = order.offered.amount as u128;
    let offered = max_offered.min(remaining_offered);
    let used_asked = offered * price_num / price_denom;
    let remainder_asked = asked.saturating_sub(used_asked);

    (offered as u64, remainder_asked as u64)
}
