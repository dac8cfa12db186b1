//! Optim staking bonds and the oracle price feed their maturity payout
//! depends on. Both live under the same validator, told apart by the outer
//! constructor tag, so the parser returns [`BondOrFeed`] rather than forcing
//! a split across two contract kinds.

use crate::codec::{decode_into, ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::{BondOrFeed, BondState, BondStatus, PriceFeed};
use crate::parsers::{BondParser, DatumContext};
use crate::scope::Protocol;

fn decode_status(value: &PlutusValue) -> Result<BondStatus, DecodeError> {
    let (tag, _) = value.as_constr()?;
    match tag {
        0 => Ok(BondStatus::Active),
        1 => Ok(BondStatus::Matured),
        2 => Ok(BondStatus::Claimed),
        other => Err(DecodeError::UnexpectedTag {
            got: other,
            expected: "0 (Active), 1 (Matured), or 2 (Claimed)".to_string(),
        }),
    }
}

enum Datum {
    Bond {
        principal: u64,
        interest_rate_bps: u64,
        start_epoch: u64,
        end_epoch: u64,
        stake_pool_hash: String,
        accrued_rewards: u64,
        status: BondStatus,
    },
    Feed {
        policy_hex: String,
        name_hex: String,
        price: i64,
        denominator: i64,
        valid_from: i64,
        valid_to: i64,
    },
}

impl ConstrSchema for Datum {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        match tag {
            0 => {
                if fields.len() != 7 {
                    return Err(DecodeError::shape(format!(
                        "optim bond datum expected 7 fields, got {}",
                        fields.len()
                    )));
                }
                Ok(Datum::Bond {
                    principal: fields[0].as_u64()?,
                    interest_rate_bps: fields[1].as_u64()?,
                    start_epoch: fields[2].as_u64()?,
                    end_epoch: fields[3].as_u64()?,
                    stake_pool_hash: fields[4].as_hex()?,
                    accrued_rewards: fields[5].as_u64()?,
                    status: decode_status(&fields[6])?,
                })
            }
            1 => {
                if fields.len() != 6 {
                    return Err(DecodeError::shape(format!(
                        "optim price feed datum expected 6 fields, got {}",
                        fields.len()
                    )));
                }
                let (policy_hex, name_hex) = fields[0].as_asset_pair()?;
                Ok(Datum::Feed {
                    policy_hex,
                    name_hex,
                    price: fields[1].as_i64()?,
                    denominator: fields[2].as_i64()?,
                    valid_from: fields[3].as_i64()?,
                    valid_to: fields[4].as_i64()?,
                })
                // fields[5]: oracle operator signature — not modeled.
            }
            other => Err(DecodeError::UnexpectedTag {
                got: other,
                expected: "0 (Bond) or 1 (PriceFeed)".to_string(),
            }),
        }
    }
}

pub struct OptimParser;

impl BondParser for OptimParser {
    fn protocol(&self) -> Protocol {
        Protocol::Optim
    }

    fn parse_bond_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<BondOrFeed>, DecodeError> {
        let decoded: Datum = match decode_into(datum) {
            Ok(d) => d,
            Err(DecodeError::UnexpectedTag { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(match decoded {
            Datum::Bond {
                principal,
                interest_rate_bps,
                start_epoch,
                end_epoch,
                stake_pool_hash,
                accrued_rewards,
                status,
            } => BondOrFeed::Bond(BondState {
                id: format!("optim_{}_{}", ctx.tx_hash, ctx.tx_index),
                protocol: Protocol::Optim,
                network: String::new(),
                principal,
                interest_rate_bps,
                start_epoch,
                end_epoch,
                stake_pool_hash,
                accrued_rewards,
                status,
                slot: ctx.slot,
                tx_hash: ctx.tx_hash.clone(),
                updated_at: ctx.timestamp,
            }),
            Datum::Feed {
                policy_hex,
                name_hex,
                price,
                denominator,
                valid_from,
                valid_to,
            } => BondOrFeed::Feed(PriceFeed {
                asset: crate::asset::AssetId::from_hex(&policy_hex, &name_hex)
                    .map_err(|e| DecodeError::shape(e.to_string()))?,
                protocol: Protocol::Optim,
                network: String::new(),
                price,
                denominator,
                valid_from,
                valid_to,
                slot: ctx.slot,
                tx_hash: ctx.tx_hash.clone(),
                updated_at: ctx.timestamp,
            }),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DatumContext {
        DatumContext::new("optimtx", 0, 3, 1_700_000_000_000)
    }

    #[test]
    fn decodes_active_bond() {
        let datum = PlutusValue::Constr {
            tag: 0,
            fields: vec![
                PlutusValue::Int(100_000_000),
                PlutusValue::Int(450),
                PlutusValue::Int(400),
                PlutusValue::Int(450),
                PlutusValue::Bytes(vec![1u8; 28]),
                PlutusValue::Int(2_000_000),
                PlutusValue::Constr { tag: 0, fields: vec![] },
            ],
        }
        .encode();
        let parser = OptimParser;
        let result = parser.parse_bond_datum(&datum, &ctx()).unwrap().unwrap();
        match result {
            BondOrFeed::Bond(bond) => {
                assert_eq!(bond.principal, 100_000_000);
                assert!(matches!(bond.status, BondStatus::Active));
            }
            BondOrFeed::Feed(_) => panic!("expected Bond"),
        }
    }

    #[test]
    fn decodes_price_feed() {
        let datum = PlutusValue::Constr {
            tag: 1,
            fields: vec![
                PlutusValue::Constr {
                    tag: 0,
                    fields: vec![PlutusValue::Bytes(vec![]), PlutusValue::Bytes(vec![])],
                },
                PlutusValue::Int(1_234_500),
                PlutusValue::Int(1_000_000),
                PlutusValue::Int(1_700_000_000_000),
                PlutusValue::Int(1_700_000_600_000),
                PlutusValue::Bytes(vec![]),
            ],
        }
        .encode();
        let parser = OptimParser;
        let result = parser.parse_bond_datum(&datum, &ctx()).unwrap().unwrap();
        match result {
            BondOrFeed::Feed(feed) => {
                assert!((feed.price_float() - 1.2345).abs() < 1e-9);
            }
            BondOrFeed::Bond(_) => panic!("expected Feed"),
        }
    }

    #[test]
    fn foreign_tag_is_not_my_datum() {
        let datum = PlutusValue::Constr { tag: 9, fields: vec![] }.encode();
        let parser = OptimParser;
        assert!(parser.parse_bond_datum(&datum, &ctx()).unwrap().is_none());
    }
}
