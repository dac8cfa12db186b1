//! Splash (Spectrum-derived) AMM pools. A single contract address hosts two
//! pool variants distinguished by the datum's own constructor tag:
//! constant-product (tag 0) and stableswap (tag 1, carrying an extra
//! amplification coefficient). Both decode to the same `PoolState` shape.

use crate::asset::{AssetAmount, AssetId};
use crate::codec::{decode_into, ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::PoolState;
use crate::parsers::{DatumContext, PoolParser};
use crate::scope::Protocol;

const FEE_DENOM: u64 = 100_000;

enum PoolVariant {
    ConstantProduct,
    Stableswap { amplification: u64 },
}

struct PoolDatum {
    asset_a: (String, String),
    asset_b: (String, String),
    fee_num: u64,
    variant: PoolVariant,
}

impl ConstrSchema for PoolDatum {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        match tag {
            0 => {
                if fields.len() < 3 {
                    return Err(DecodeError::shape(format!(
                        "splash constant-product datum expected at least 3 fields, got {}",
                        fields.len()
                    )));
                }
                Ok(PoolDatum {
                    asset_a: fields[0].as_asset_pair()?,
                    asset_b: fields[1].as_asset_pair()?,
                    fee_num: fields[2].as_u64()?,
                    variant: PoolVariant::ConstantProduct,
                })
            }
            1 => {
                if fields.len() < 4 {
                    return Err(DecodeError::shape(format!(
                        "splash stableswap datum expected at least 4 fields, got {}",
                        fields.len()
                    )));
                }
                Ok(PoolDatum {
                    asset_a: fields[0].as_asset_pair()?,
                    asset_b: fields[1].as_asset_pair()?,
                    fee_num: fields[2].as_u64()?,
                    variant: PoolVariant::Stableswap {
                        amplification: fields[3].as_u64()?,
                    },
                })
            }
            other => Err(DecodeError::UnexpectedTag {
                got: other,
                expected: "0 (constant-product) or 1 (stableswap)".to_string(),
            }),
        }
    }
}

pub struct SplashParser;

impl PoolParser for SplashParser {
    fn protocol(&self) -> Protocol {
        Protocol::Splash
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

        if let PoolVariant::Stableswap { amplification } = decoded.variant {
            tracing::debug!(amplification, "splash stableswap pool decoded");
        }

        Ok(Some(PoolState {
            pool_id: format!(
                "splash_{}.{}_{}.{}",
                decoded.asset_a.0, decoded.asset_a.1, decoded.asset_b.0, decoded.asset_b.1
            ),
            protocol: Protocol::Splash,
            network: String::new(),
            asset_x: AssetAmount::new(asset_x, 0),
            asset_y: AssetAmount::new(asset_y, 0),
            fee_num: decoded.fee_num,
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DatumContext {
        DatumContext::new("splashtx", 0, 1, 1_700_000_000_000)
    }

    fn asset_constr(policy: &str, name: &str) -> PlutusValue {
        PlutusValue::Constr {
            tag: 0,
            fields: vec![
                PlutusValue::Bytes(hex::decode(policy).unwrap()),
                PlutusValue::Bytes(name.as_bytes().to_vec()),
            ],
        }
    }

    #[test]
    fn constant_product_variant_decodes() {
        let datum = PlutusValue::Constr {
            tag: 0,
            fields: vec![
                asset_constr("", ""),
                asset_constr("ab", "TOK"),
                PlutusValue::Int(99_700),
            ],
        }
        .encode();
        let parser = SplashParser;
        let state = parser.parse_pool_datum(&datum, &ctx()).unwrap().unwrap();
        assert_eq!(state.fee_denom, 100_000);
        assert!(state.reserves_unknown);
    }

    #[test]
    fn stableswap_variant_decodes() {
        let datum = PlutusValue::Constr {
            tag: 1,
            fields: vec![
                asset_constr("", ""),
                asset_constr("cd", "USD"),
                PlutusValue::Int(99_950),
                PlutusValue::Int(100),
            ],
        }
        .encode();
        let parser = SplashParser;
        let state = parser.parse_pool_datum(&datum, &ctx()).unwrap().unwrap();
        assert_eq!(state.fee_num, 99_950);
    }

    #[test]
    fn foreign_tag_is_not_my_datum() {
        let datum = PlutusValue::Constr { tag: 5, fields: vec![] }.encode();
        let parser = SplashParser;
        assert!(parser.parse_pool_datum(&datum, &ctx()).unwrap().is_none());
    }
}
