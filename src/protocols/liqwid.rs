//! Liqwid money-market datums: a market's aggregate supply/borrow state, an
//! individual loan, a standing loan offer, or a depositor's position. The
//! four are a genuine sum type — told apart by the outer constructor tag,
//! matching [`LendingVariant`]'s four-way split one-for-one.

use crate::asset::AssetAmount;
use crate::codec::{decode_into, ConstrSchema, PlutusValue};
use crate::error::DecodeError;
use crate::models::{LendingState, LendingVariant};
use crate::parsers::{DatumContext, LendingParser};
use crate::scope::Protocol;

fn decode_maybe_hex(value: &PlutusValue) -> Result<Option<String>, DecodeError> {
    match value.as_constr()? {
        (0, fields) => Ok(Some(
            fields
                .first()
                .ok_or_else(|| DecodeError::shape("Just(_) missing field"))?
                .as_hex()?,
        )),
        (1, _) => Ok(None),
        (other, _) => Err(DecodeError::UnexpectedTag {
            got: other,
            expected: "0 (Just) or 1 (Nothing)".to_string(),
        }),
    }
}

fn decode_amount(value: &PlutusValue) -> Result<AssetAmount, DecodeError> {
    let fields = value.expect_constr(0)?;
    if fields.len() != 2 {
        return Err(DecodeError::shape("asset amount pair expects 2 fields"));
    }
    let (policy, name) = fields[0].as_asset_pair()?;
    let class = crate::asset::AssetId::from_hex(&policy, &name)
        .map_err(|e| DecodeError::shape(e.to_string()))?;
    Ok(AssetAmount::new(class, fields[1].as_u64()?))
}

enum Datum {
    Market {
        total_supply: AssetAmount,
        total_borrow: AssetAmount,
        interest_rate_bps: u64,
        collateral_factor_bps: u64,
    },
    Loan {
        principal: AssetAmount,
        collateral: AssetAmount,
        interest_rate_bps: u64,
        due_date: i64,
        borrower: Option<String>,
        lender: Option<String>,
    },
    LoanOffer {
        principal: AssetAmount,
        collateral: AssetAmount,
        interest_rate_bps: u64,
        lender: Option<String>,
    },
    Position {
        supplied: AssetAmount,
        borrowed: AssetAmount,
        collateral_factor_bps: u64,
    },
}

impl ConstrSchema for Datum {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError> {
        match tag {
            0 => {
                if fields.len() != 4 {
                    return Err(DecodeError::shape(format!(
                        "liqwid Market expected 4 fields, got {}",
                        fields.len()
                    )));
                }
                Ok(Datum::Market {
                    total_supply: decode_amount(&fields[0])?,
                    total_borrow: decode_amount(&fields[1])?,
                    interest_rate_bps: fields[2].as_u64()?,
                    collateral_factor_bps: fields[3].as_u64()?,
                })
            }
            1 => {
                if fields.len() != 6 {
                    return Err(DecodeError::shape(format!(
                        "liqwid Loan expected 6 fields, got {}",
                        fields.len()
                    )));
                }
                Ok(Datum::Loan {
                    principal: decode_amount(&fields[0])?,
                    collateral: decode_amount(&fields[1])?,
                    interest_rate_bps: fields[2].as_u64()?,
                    due_date: fields[3].as_i64()?,
                    borrower: decode_maybe_hex(&fields[4])?,
                    lender: decode_maybe_hex(&fields[5])?,
                })
            }
            2 => {
                if fields.len() != 4 {
                    return Err(DecodeError::shape(format!(
                        "liqwid LoanOffer expected 4 fields, got {}",
                        fields.len()
                    )));
                }
                Ok(Datum::LoanOffer {
                    principal: decode_amount(&fields[0])?,
                    collateral: decode_amount(&fields[1])?,
                    interest_rate_bps: fields[2].as_u64()?,
                    lender: decode_maybe_hex(&fields[3])?,
                })
            }
            3 => {
                if fields.len() != 3 {
                    return Err(DecodeError::shape(format!(
                        "liqwid Position expected 3 fields, got {}",
                        fields.len()
                    )));
                }
                Ok(Datum::Position {
                    supplied: decode_amount(&fields[0])?,
                    borrowed: decode_amount(&fields[1])?,
                    collateral_factor_bps: fields[2].as_u64()?,
                })
            }
            other => Err(DecodeError::UnexpectedTag {
                got: other,
                expected: "0 (Market), 1 (Loan), 2 (LoanOffer), or 3 (Position)".to_string(),
            }),
        }
    }
}

pub struct LiqwidParser;

impl LendingParser for LiqwidParser {
    fn protocol(&self) -> Protocol {
        Protocol::Liqwid
    }

    fn parse_lending_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<LendingState>, DecodeError> {
        let decoded: Datum = match decode_into(datum) {
            Ok(d) => d,
            Err(DecodeError::UnexpectedTag { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let (underlying, collateral, variant) = match decoded {
            Datum::Market {
                total_supply,
                total_borrow,
                interest_rate_bps,
                collateral_factor_bps,
            } => (
                total_supply.class.clone(),
                None,
                LendingVariant::Market {
                    total_supply,
                    total_borrow,
                    interest_rate_bps,
                    collateral_factor_bps,
                },
            ),
            Datum::Loan {
                principal,
                collateral,
                interest_rate_bps,
                due_date,
                borrower,
                lender,
            } => (
                principal.class.clone(),
                Some(collateral.class.clone()),
                LendingVariant::Loan {
                    principal,
                    collateral,
                    interest_rate_bps,
                    due_date,
                    borrower,
                    lender,
                },
            ),
            Datum::LoanOffer {
                principal,
                collateral,
                interest_rate_bps,
                lender,
            } => (
                principal.class.clone(),
                Some(collateral.class.clone()),
                LendingVariant::LoanOffer {
                    principal,
                    collateral,
                    interest_rate_bps,
                    lender,
                },
            ),
            Datum::Position {
                supplied,
                borrowed,
                collateral_factor_bps,
            } => (
                supplied.class.clone(),
                None,
                LendingVariant::Position {
                    supplied,
                    borrowed,
                    collateral_factor_bps,
                },
            ),
        };

        Ok(Some(LendingState {
            state_id: format!("liqwid_{}_{}", ctx.tx_hash, ctx.tx_index),
            protocol: Protocol::Liqwid,
            network: String::new(),
            underlying,
            collateral,
            variant,
            slot: ctx.slot,
            tx_hash: ctx.tx_hash.clone(),
            updated_at: ctx.timestamp,
        }))
    }
}
