//! Butane stablecoin CDPs. The validator's datum is a six-constructor sum
//! type covering the whole lifecycle of the UTxO (open CDP, liquidation
//! request, settings, ...); only constructor 1 carries an open collateralized
//! position. The other five are legitimate, just not CDPs — `Ok(None)`.

use crate::asset::AssetId;
use crate::codec::{decode_into, ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::CDPState;
use crate::parsers::{CDPParser, DatumContext};
use crate::scope::Protocol;

const CDP_CONSTRUCTOR: u64 = 1;

struct MonoDatum {
    owner_hex: Option<String>,
    synthetic_hex: String,
    minted: u64,
}

impl ConstrSchema for MonoDatum {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        if tag != CDP_CONSTRUCTOR {
            // Any of the other five constructors (manager settings,
            // liquidation order, etc.) is a recognized-but-foreign shape.
            return Err(DecodeError::UnexpectedTag {
                got: tag,
                expected: CDP_CONSTRUCTOR.to_string(),
            });
        }
        if fields.len() < 3 {
            return Err(DecodeError::shape(format!(
                "butane CDP constructor expected at least 3 fields, got {}",
                fields.len()
            )));
        }

        let owner_hex = match fields[0].as_constr() {
            Ok((0, just_fields)) => Some(
                just_fields
                    .first()
                    .ok_or_else(|| DecodeError::shape("Just(_) owner missing field"))?
                    .as_hex()?,
            ),
            Ok((1, _)) => None,
            Ok((other, _)) => {
                return Err(DecodeError::UnexpectedTag {
                    got: other,
                    expected: "0 (Just) or 1 (Nothing)".to_string(),
                })
            }
            Err(_) => Some(fields[0].as_hex()?),
        };

        Ok(MonoDatum {
            owner_hex,
            synthetic_hex: fields[1].as_hex()?,
            minted: fields[2].as_u64()?,
        })
    }
}

pub struct ButaneParser;

impl CDPParser for ButaneParser {
    fn protocol(&self) -> Protocol {
        Protocol::Butane
    }

    fn parse_cdp_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<CDPState>, DecodeError> {
        let decoded: MonoDatum = match decode_into(datum) {
            Ok(d) => d,
            Err(DecodeError::UnexpectedTag { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let has_owner = decoded.owner_hex.is_some();
        Ok(Some(CDPState {
            id: format!("butane_{}_{}", ctx.tx_hash, ctx.tx_index),
            protocol: Protocol::Butane,
            network: String::new(),
            has_owner,
            owner: decoded.owner_hex.unwrap_or_default(),
            synthetic: AssetId::from_hex("", &decoded.synthetic_hex)
                .map_err(|e| DecodeError::shape(e.to_string()))?,
            minted: decoded.minted,
            start_time: ctx.timestamp,
            fees_type: None,
            last_updated: None,
            iasset_fees: None,
            slot: ctx.slot,
            tx_hash: ctx.tx_hash.clone(),
            updated_at: ctx.timestamp,
        }))
    }
}
