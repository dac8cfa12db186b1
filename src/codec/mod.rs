//! Constructor-tagged CBOR codec for Plutus datums.
//!
//! Cardano smart contracts encode algebraic data as CBOR values tagged with
//! a semantic tag identifying the constructor: `Tag(121+k, Array(fields))`
//! for small alternatives, `Tag(1280+(k-7), Array(fields))` for larger ones,
//! and a general envelope (`Tag(102, Array([index, fields]))`) beyond that.
//! Every protocol module in `crate::protocols` decodes its datum through
//! this module — it is the single place that knows the tag arithmetic, so
//! adding a new protocol means writing a `ConstrSchema` impl, not a new
//! decode routine.

use crate::error::DecodeError;

mod wire;

/// A decoded (or about-to-be-encoded) Plutus value.
///
/// All integer magnitudes this system observes fit in 64 bits, but Plutus
/// integers are arbitrary precision, so the in-memory representation is
/// `i128` to avoid silently truncating anything wider than `i64` before the
/// caller has a chance to reject it explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlutusValue {
    Int(i128),
    Bytes(Vec<u8>),
    List(Vec<PlutusValue>),
    Map(Vec<(PlutusValue, PlutusValue)>),
    Constr { tag: u64, fields: Vec<PlutusValue> },
}

impl PlutusValue {
    /// Decode a full CBOR byte string into a `PlutusValue`.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw: ciborium::value::Value = ciborium::de::from_reader(bytes)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        from_cbor(&raw)
    }

    /// Encode back to CBOR bytes via `minicbor`, reproducing the upstream
    /// writer's tag convention bit-for-bit (indefinite-length field arrays
    /// for small and medium constructor tags).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        wire::write_value(self, &mut buf);
        buf
    }

    pub fn as_int(&self) -> Result<i128, DecodeError> {
        match self {
            PlutusValue::Int(n) => Ok(*n),
            other => Err(DecodeError::shape(format!("expected integer, got {other:?}"))),
        }
    }

    pub fn as_u64(&self) -> Result<u64, DecodeError> {
        let n = self.as_int()?;
        u64::try_from(n).map_err(|_| DecodeError::shape(format!("integer {n} out of u64 range")))
    }

    pub fn as_i64(&self) -> Result<i64, DecodeError> {
        let n = self.as_int()?;
        i64::try_from(n).map_err(|_| DecodeError::shape(format!("integer {n} out of i64 range")))
    }

    pub fn as_bytes(&self) -> Result<&[u8], DecodeError> {
        match self {
            PlutusValue::Bytes(b) => Ok(b),
            other => Err(DecodeError::shape(format!("expected bytes, got {other:?}"))),
        }
    }

    pub fn as_hex(&self) -> Result<String, DecodeError> {
        self.as_bytes().map(hex::encode)
    }

    pub fn as_list(&self) -> Result<&[PlutusValue], DecodeError> {
        match self {
            PlutusValue::List(items) => Ok(items),
            other => Err(DecodeError::shape(format!("expected list, got {other:?}"))),
        }
    }

    /// Return `(tag, fields)` if this value is a constructor, regardless of
    /// which tag it carries.
    pub fn as_constr(&self) -> Result<(u64, &[PlutusValue]), DecodeError> {
        match self {
            PlutusValue::Constr { tag, fields } => Ok((*tag, fields)),
            other => Err(DecodeError::shape(format!("expected constructor, got {other:?}"))),
        }
    }

    /// Return this value's fields if it is a constructor with the expected tag.
    pub fn expect_constr(&self, expected: u64) -> Result<&[PlutusValue], DecodeError> {
        let (tag, fields) = self.as_constr()?;
        if tag != expected {
            return Err(DecodeError::UnexpectedTag {
                got: tag,
                expected: expected.to_string(),
            });
        }
        Ok(fields)
    }

    /// True for any constructor value, regardless of tag or arity.
    pub fn is_constr(&self) -> bool {
        matches!(self, PlutusValue::Constr { .. })
    }

    /// True for a constructor with at least one field — used to tell a
    /// Plutus `Nothing` (`Constr(1, [])`, empty) apart from a populated
    /// optional sub-structure encoded as a non-empty constructor.
    pub fn is_nonempty_constr(&self) -> bool {
        matches!(self, PlutusValue::Constr { fields, .. } if !fields.is_empty())
    }

    /// Decode a two-field `(policy_bytes, name_bytes)` asset constructor,
    /// returning `(policy_hex, name_hex)`.
    pub fn as_asset_pair(&self) -> Result<(String, String), DecodeError> {
        let fields = self.expect_constr(0)?;
        if fields.len() != 2 {
            return Err(DecodeError::shape(format!(
                "asset constr expected 2 fields, got {}",
                fields.len()
            )));
        }
        Ok((fields[0].as_hex()?, fields[1].as_hex()?))
    }
}

/// Decodes into a typed, schema-carrying record.
///
/// Implementors declare which constructor tag(s) they accept and how to
/// turn the field list into `Self`; [`decode_into`] does the peek-and-dispatch
/// that would otherwise be duplicated in every protocol module.
pub trait ConstrSchema: Sized {
    fn decode_fields(tag: u64, fields: &[PlutusValue]) -> Result<Self, DecodeError>;
}

/// Decode raw CBOR bytes into `T` by peeking the outer constructor tag and
/// dispatching to `T::decode_fields`.
pub fn decode_into<T: ConstrSchema>(bytes: &[u8]) -> Result<T, DecodeError> {
    let value = PlutusValue::decode(bytes)?;
    let (tag, fields) = value.as_constr()?;
    T::decode_fields(tag, fields)
}

fn from_cbor(v: &ciborium::value::Value) -> Result<PlutusValue, DecodeError> {
    use ciborium::value::Value as Cbor;
    match v {
        Cbor::Integer(i) => {
            let n: i128 = (*i).into();
            Ok(PlutusValue::Int(n))
        }
        Cbor::Bytes(b) => Ok(PlutusValue::Bytes(b.clone())),
        Cbor::Array(items) => Ok(PlutusValue::List(
            items.iter().map(from_cbor).collect::<Result<_, _>>()?,
        )),
        Cbor::Map(pairs) => {
            let mut out = Vec::with_capacity(pairs.len());
            for (k, val) in pairs {
                out.push((from_cbor(k)?, from_cbor(val)?));
            }
            Ok(PlutusValue::Map(out))
        }
        Cbor::Tag(t, inner) => from_tag(*t, inner),
        other => Err(DecodeError::shape(format!(
            "unsupported top-level CBOR major type: {other:?}"
        ))),
    }
}

fn as_array(v: &ciborium::value::Value) -> Result<&Vec<ciborium::value::Value>, DecodeError> {
    match v {
        ciborium::value::Value::Array(items) => Ok(items),
        other => Err(DecodeError::shape(format!("expected array, got {other:?}"))),
    }
}

fn from_tag(tag: u64, inner: &ciborium::value::Value) -> Result<PlutusValue, DecodeError> {
    if (121..=127).contains(&tag) {
        let fields = as_array(inner)?;
        return Ok(PlutusValue::Constr {
            tag: tag - 121,
            fields: fields.iter().map(from_cbor).collect::<Result<_, _>>()?,
        });
    }
    if (1280..=1400).contains(&tag) {
        let fields = as_array(inner)?;
        return Ok(PlutusValue::Constr {
            tag: tag - 1280 + 7,
            fields: fields.iter().map(from_cbor).collect::<Result<_, _>>()?,
        });
    }
    if tag == 102 {
        let envelope = as_array(inner)?;
        if envelope.len() != 2 {
            return Err(DecodeError::shape(
                "general constructor envelope (tag 102) expected exactly 2 elements",
            ));
        }
        let ctor_tag = from_cbor(&envelope[0])?.as_u64()?;
        let fields = as_array(&envelope[1])?;
        return Ok(PlutusValue::Constr {
            tag: ctor_tag,
            fields: fields.iter().map(from_cbor).collect::<Result<_, _>>()?,
        });
    }
    Err(DecodeError::UnexpectedTag {
        got: tag,
        expected: "constructor tag (121-127, 1280-1400, or general envelope 102)".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_constructor_tags() {
        for tag in 0u64..=6 {
            let value = PlutusValue::Constr {
                tag,
                fields: vec![PlutusValue::Int(42), PlutusValue::Bytes(vec![1, 2, 3])],
            };
            let bytes = value.encode();
            let decoded = PlutusValue::decode(&bytes).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn round_trips_medium_constructor_tags() {
        for tag in [7u64, 42, 127] {
            let value = PlutusValue::Constr {
                tag,
                fields: vec![PlutusValue::Bytes(vec![])],
            };
            let bytes = value.encode();
            let decoded = PlutusValue::decode(&bytes).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn round_trips_general_constructor_envelope() {
        let value = PlutusValue::Constr {
            tag: 128,
            fields: vec![PlutusValue::Int(-7)],
        };
        let bytes = value.encode();
        let decoded = PlutusValue::decode(&bytes).unwrap();
        assert_eq!(decoded, value);

        let value = PlutusValue::Constr {
            tag: 9999,
            fields: vec![],
        };
        let bytes = value.encode();
        let decoded = PlutusValue::decode(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn round_trips_nested_lists_and_maps() {
        let value = PlutusValue::List(vec![
            PlutusValue::Map(vec![(PlutusValue::Int(1), PlutusValue::Bytes(vec![9]))]),
            PlutusValue::Constr {
                tag: 1,
                fields: vec![],
            },
        ]);
        let bytes = value.encode();
        let decoded = PlutusValue::decode(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        // Tag 24 is a real CBOR tag (encoded CBOR data item) but not one of
        // our constructor conventions.
        let mut buf = Vec::new();
        ciborium::ser::into_writer(
            &ciborium::value::Value::Tag(24, Box::new(ciborium::value::Value::Bytes(vec![0]))),
            &mut buf,
        )
        .unwrap();
        let err = PlutusValue::decode(&buf).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedTag { got: 24, .. }));
    }

    #[test]
    fn asset_pair_decodes_policy_and_name() {
        let value = PlutusValue::Constr {
            tag: 0,
            fields: vec![
                PlutusValue::Bytes(hex::decode("abcdef").unwrap()),
                PlutusValue::Bytes(b"MIN".to_vec()),
            ],
        };
        let (policy, name) = value.as_asset_pair().unwrap();
        assert_eq!(policy, "abcdef");
        assert_eq!(name, hex::encode("MIN"));
    }

    #[test]
    fn is_nonempty_constr_distinguishes_nothing_from_populated() {
        let nothing = PlutusValue::Constr { tag: 1, fields: vec![] };
        let just = PlutusValue::Constr { tag: 0, fields: vec![PlutusValue::Int(1)] };
        assert!(!nothing.is_nonempty_constr());
        assert!(just.is_nonempty_constr());
    }
}
