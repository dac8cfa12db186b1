//! CBOR writer for the constructor-tag encoding in spec'd use.
//!
//! Plutus datum writers encode constructor field lists with *indefinite*-
//! length arrays (major type 4, break-terminated) for the compact tag forms,
//! and a definite-length two-element envelope for the general `Tag(102, ...)`
//! form. This mirrors `pallas-primitives`'s `Constr<A>` encoder
//! (`plutus_data.rs`), which reaches for `Encoder::begin_array()`/`end()` for
//! exactly the same reason rather than hand-writing CBOR headers.

use minicbor::data::{Int, Tag};
use minicbor::encode::{Encode, Encoder, Write};

use super::PlutusValue;

impl<C> Encode<C> for PlutusValue {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, ctx: &mut C) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            PlutusValue::Int(n) => encode_int(*n, e),
            PlutusValue::Bytes(b) => {
                e.bytes(b)?;
                Ok(())
            }
            PlutusValue::List(items) => {
                e.array(items.len() as u64)?;
                for item in items {
                    Encode::encode(item, e, ctx)?;
                }
                Ok(())
            }
            PlutusValue::Map(pairs) => {
                e.map(pairs.len() as u64)?;
                for (k, val) in pairs {
                    Encode::encode(k, e, ctx)?;
                    Encode::encode(val, e, ctx)?;
                }
                Ok(())
            }
            PlutusValue::Constr { tag, fields } => encode_constr(*tag, fields, e, ctx),
        }
    }
}

fn encode_int<W: Write>(n: i128, e: &mut Encoder<W>) -> Result<(), minicbor::encode::Error<W::Error>> {
    let int = Int::try_from(n).map_err(|_| minicbor::encode::Error::message("plutus integer out of CBOR int range"))?;
    e.int(int)?;
    Ok(())
}

fn encode_constr<C, W: Write>(
    tag: u64,
    fields: &[PlutusValue],
    e: &mut Encoder<W>,
    ctx: &mut C,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    match tag {
        0..=6 => {
            e.tag(Tag::Unassigned(121 + tag))?;
            encode_indefinite_fields(fields, e, ctx)
        }
        7..=127 => {
            e.tag(Tag::Unassigned(1280 + (tag - 7)))?;
            encode_indefinite_fields(fields, e, ctx)
        }
        _ => {
            // General envelope: Tag(102, [index, fields]), both arrays definite-length.
            e.tag(Tag::Unassigned(102))?;
            e.array(2)?;
            encode_int(tag as i128, e)?;
            e.array(fields.len() as u64)?;
            for field in fields {
                Encode::encode(field, e, ctx)?;
            }
            Ok(())
        }
    }
}

fn encode_indefinite_fields<C, W: Write>(
    fields: &[PlutusValue],
    e: &mut Encoder<W>,
    ctx: &mut C,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.begin_array()?;
    for field in fields {
        Encode::encode(field, e, ctx)?;
    }
    e.end()?;
    Ok(())
}

pub(super) fn write_value(v: &PlutusValue, buf: &mut Vec<u8>) {
    let mut encoded = minicbor::to_vec(v).expect("encoding a PlutusValue to CBOR is infallible");
    buf.append(&mut encoded);
}
