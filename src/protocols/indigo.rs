//! Indigo collateralized debt positions (CDPs for synthetic iAssets).
//!
//! The datum is double-wrapped: the outer constructor-0 carries a single
//! field that is itself a constructor-0 carrying the four real fields. A
//! decoder that unwraps only once will see a non-constructor payload where
//! it expects an owner hash and mistake this for "not my datum" — the
//! unwrap depth is declared as a constant on the schema so that mistake is
//! impossible to make silently.

use crate::codec::{decode_into, ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::CDPState;
use crate::parsers::{CDPParser, DatumContext};
use crate::scope::Protocol;

/// Number of constructor layers `decode_fields` must peel before reaching
/// the real CDP fields.
pub const UNWRAP_DEPTH: u8 = 2;

/// `AccumulatedFees` is a tagged union: constructor 0 carries the running
/// interest accrual, constructor 1 carries lovelace fee totals.
enum AccumulatedFees {
    InterestIAssetAmount { last_updated_ms: i64, iasset_amount: i64 },
    FeesLovelacesAmount { treasury: i64, indy_stakers: i64 },
}

impl AccumulatedFees {
    fn fees_type(&self) -> u8 {
        match self {
            AccumulatedFees::InterestIAssetAmount { .. } => 0,
            AccumulatedFees::FeesLovelacesAmount { .. } => 1,
        }
    }
}

fn decode_accumulated_fees(value: &PlutusValue) -> Result<AccumulatedFees, DecodeError> {
    let (tag, fields) = value.as_constr()?;
    match tag {
        0 => {
            if fields.len() != 2 {
                return Err(DecodeError::shape("InterestIAssetAmount expects 2 fields"));
            }
            Ok(AccumulatedFees::InterestIAssetAmount {
                last_updated_ms: fields[0].as_i64()?,
                iasset_amount: fields[1].as_i64()?,
            })
        }
        1 => {
            if fields.len() != 2 {
                return Err(DecodeError::shape("FeesLovelacesAmount expects 2 fields"));
            }
            Ok(AccumulatedFees::FeesLovelacesAmount {
                treasury: fields[0].as_i64()?,
                indy_stakers: fields[1].as_i64()?,
            })
        }
        other => Err(DecodeError::UnexpectedTag {
            got: other,
            expected: "0 (InterestIAssetAmount) or 1 (FeesLovelacesAmount)".to_string(),
        }),
    }
}

struct CdpDatum {
    has_owner: bool,
    owner_hex: String,
    iasset_hex: String,
    minted: i64,
    fees_type: u8,
    last_updated: i64,
    iasset_fees: i64,
}

impl ConstrSchema for CdpDatum {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        if tag != 0 || fields.len() != 1 {
            return Err(DecodeError::UnexpectedTag {
                got: tag,
                expected: "0 with a single inner-constructor field".to_string(),
            });
        }
        let inner = fields[0].expect_constr(0)?;
        if inner.len() != 4 {
            return Err(DecodeError::shape(format!(
                "indigo inner CDP constructor expected 4 fields, got {}",
                inner.len()
            )));
        }

        let (has_owner, owner_hex) = match inner[0].as_constr()? {
            (0, just_fields) => {
                if just_fields.len() != 1 {
                    return Err(DecodeError::shape("MaybePubKeyHash Just expects 1 field"));
                }
                (true, just_fields[0].as_hex()?)
            }
            (1, _) => (false, String::new()),
            (other, _) => {
                return Err(DecodeError::UnexpectedTag {
                    got: other,
                    expected: "0 (Just) or 1 (Nothing)".to_string(),
                })
            }
        };

        let iasset_hex = inner[1].as_hex()?;
        let minted = inner[2].as_i64()?;
        let fees = decode_accumulated_fees(&inner[3])?;
        let fees_type = fees.fees_type();
        let (last_updated, iasset_fees) = match fees {
            AccumulatedFees::InterestIAssetAmount { last_updated_ms, iasset_amount } => {
                (last_updated_ms, iasset_amount)
            }
            AccumulatedFees::FeesLovelacesAmount { treasury, indy_stakers } => (treasury, indy_stakers),
        };

        Ok(CdpDatum {
            has_owner,
            owner_hex,
            iasset_hex,
            minted,
            fees_type,
            last_updated,
            iasset_fees,
        })
    }
}

pub struct IndigoParser;

impl CDPParser for IndigoParser {
    fn protocol(&self) -> Protocol {
        Protocol::Indigo
    }

    fn parse_cdp_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<CDPState>, DecodeError> {
        let decoded: CdpDatum = match decode_into(datum) {
            Ok(d) => d,
            Err(DecodeError::UnexpectedTag { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let minted = u64::try_from(decoded.minted)
            .map_err(|_| DecodeError::shape("minted amount must be non-negative"))?;

        Ok(Some(CDPState {
            id: format!("indigo_{}_{}", ctx.tx_hash, ctx.tx_index),
            protocol: Protocol::Indigo,
            network: String::new(),
            has_owner: decoded.has_owner,
            owner: decoded.owner_hex,
            synthetic: crate::asset::AssetId::new(vec![], hex::decode(&decoded.iasset_hex).unwrap_or_default()),
            minted,
            start_time: decoded.last_updated,
            fees_type: Some(decoded.fees_type),
            last_updated: Some(decoded.last_updated),
            iasset_fees: Some(decoded.iasset_fees),
            slot: ctx.slot,
            tx_hash: ctx.tx_hash.clone(),
            updated_at: ctx.timestamp,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DatumContext {
        DatumContext::new("indigotx", 0, 42, 1_704_067_200_000)
    }

    fn scenario_2_datum() -> Vec<u8> {
        let owner_bytes: Vec<u8> = (0u8..28).collect();
        let just_owner = PlutusValue::Constr {
            tag: 0,
            fields: vec![PlutusValue::Bytes(owner_bytes)],
        };
        let fees = PlutusValue::Constr {
            tag: 0,
            fields: vec![PlutusValue::Int(1_704_067_200_000), PlutusValue::Int(50_000)],
        };
        let inner = PlutusValue::Constr {
            tag: 0,
            fields: vec![
                just_owner,
                PlutusValue::Bytes(b"iUSD".to_vec()),
                PlutusValue::Int(100_000_000),
                fees,
            ],
        };
        PlutusValue::Constr { tag: 0, fields: vec![inner] }.encode()
    }

    #[test]
    fn decodes_scenario_2_double_wrapped_cdp() {
        let parser = IndigoParser;
        let state = parser.parse_cdp_datum(&scenario_2_datum(), &ctx()).unwrap().unwrap();

        assert!(state.has_owner);
        assert_eq!(state.owner, hex::encode((0u8..28).collect::<Vec<u8>>()));
        assert_eq!(state.synthetic.name_hex(), hex::encode("iUSD"));
        assert_eq!(state.minted, 100_000_000);
        assert_eq!(state.start_time, 1_704_067_200_000);
        assert_eq!(state.fees_type, Some(0));
        assert_eq!(state.last_updated, Some(1_704_067_200_000));
        assert_eq!(state.iasset_fees, Some(50_000));
    }

    #[test]
    fn single_level_constructor_is_not_my_datum() {
        // A plain, non-double-wrapped constructor-0 must not be mistaken
        // for a CDP — its sole field is an integer, not a constructor.
        let datum = PlutusValue::Constr {
            tag: 0,
            fields: vec![PlutusValue::Int(7)],
        }
        .encode();
        let parser = IndigoParser;
        assert!(parser.parse_cdp_datum(&datum, &ctx()).unwrap().is_none());
    }

    #[test]
    fn nothing_owner_yields_no_owner() {
        let nothing = PlutusValue::Constr { tag: 1, fields: vec![] };
        let fees = PlutusValue::Constr {
            tag: 0,
            fields: vec![PlutusValue::Int(0), PlutusValue::Int(0)],
        };
        let inner = PlutusValue::Constr {
            tag: 0,
            fields: vec![nothing, PlutusValue::Bytes(b"iBTC".to_vec()), PlutusValue::Int(1), fees],
        };
        let datum = PlutusValue::Constr { tag: 0, fields: vec![inner] }.encode();
        let parser = IndigoParser;
        let state = parser.parse_cdp_datum(&datum, &ctx()).unwrap().unwrap();
        assert!(!state.has_owner);
        assert_eq!(state.owner, "");
    }
}
