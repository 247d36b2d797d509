//! CBOR (RFC 8949) encoding with YANG-SID substitution (RFC 9254, §4.3).
//!
//! [`CborValue`] is a small value tree that mirrors the subset of CBOR the
//! device actually uses. Map keys are always textual YANG instance paths at
//! the Rust level; SID substitution (tag 256) happens transparently at the
//! wire boundary so callers never think in SIDs directly. Canonical map-key
//! ordering is enforced by sorting on each key's *encoded* bytes, per RFC
//! 8949 §4.2.1 — not on the logical key value.

use ciborium::value::{Integer, Value};
use vdsp_sid::SidTable;

use crate::error::{ProtocolError, Result};

/// Tag 44 — `bits`.
pub const TAG_BITS: u64 = 44;
/// Tag 45 — `enumeration`.
pub const TAG_ENUMERATION: u64 = 45;
/// Tag 46 — `identityref`.
pub const TAG_IDENTITYREF: u64 = 46;
/// Tag 47 — `instance-identifier`.
pub const TAG_INSTANCE_IDENTIFIER: u64 = 47;
/// Tag 256 — SID.
pub const TAG_SID: u64 = 256;
/// Tag 257 — delta-SID.
pub const TAG_DELTA_SID: u64 = 257;

/// A CBOR value in the subset this codec supports (§3, §4.3).
///
/// Integers are carried as `i128` so that values beyond 2^53 (unsigned or
/// signed) survive the round trip without truncation, per the "numeric
/// semantics" requirement.
#[derive(Debug, Clone, PartialEq)]
pub enum CborValue {
    /// CBOR `null`.
    Null,
    /// CBOR boolean.
    Bool(bool),
    /// CBOR integer, any width.
    Integer(i128),
    /// CBOR double-precision float.
    Float(f64),
    /// CBOR text string (major type 3).
    Text(String),
    /// CBOR byte string (major type 2).
    Bytes(Vec<u8>),
    /// `bits` (tag 44): a bitmask carried as a byte string.
    Bits(Vec<u8>),
    /// `enumeration` (tag 45): the enum's assigned integer value.
    Enumeration(i64),
    /// `identityref` (tag 46): the identity's SID.
    IdentityRef(u32),
    /// `instance-identifier` (tag 47): the textual instance path.
    InstanceIdentifier(String),
    /// CBOR array.
    Array(Vec<CborValue>),
    /// CBOR map. Keys are YANG instance paths (SID-substituted on the wire
    /// when the path is known to the table) or plain text for everything
    /// else.
    Map(Vec<(String, CborValue)>),
}

fn int_to_value(value: i128) -> Value {
    if let Ok(v) = i64::try_from(value) {
        Value::Integer(Integer::from(v))
    } else {
        // ciborium's Integer covers i128 directly via its own conversions.
        Value::Integer(Integer::try_from(value).unwrap_or(Integer::from(i64::MAX)))
    }
}

fn value_to_int(value: &Value) -> Option<i128> {
    match value {
        Value::Integer(i) => Some(i128::from(*i)),
        _ => None,
    }
}

fn to_ciborium_value(value: &CborValue, sids: &SidTable) -> Result<Value> {
    Ok(match value {
        CborValue::Null => Value::Null,
        CborValue::Bool(b) => Value::Bool(*b),
        CborValue::Integer(i) => int_to_value(*i),
        CborValue::Float(f) => Value::Float(*f),
        CborValue::Text(s) => Value::Text(s.clone()),
        CborValue::Bytes(b) => Value::Bytes(b.clone()),
        CborValue::Bits(b) => Value::Tag(TAG_BITS, Box::new(Value::Bytes(b.clone()))),
        CborValue::Enumeration(n) => Value::Tag(TAG_ENUMERATION, Box::new(int_to_value(i128::from(*n)))),
        CborValue::IdentityRef(sid) => {
            Value::Tag(TAG_IDENTITYREF, Box::new(int_to_value(i128::from(*sid))))
        },
        CborValue::InstanceIdentifier(s) => {
            Value::Tag(TAG_INSTANCE_IDENTIFIER, Box::new(Value::Text(s.clone())))
        },
        CborValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(to_ciborium_value(item, sids)?);
            }
            Value::Array(out)
        },
        CborValue::Map(entries) => Value::Map(encode_canonical_map(entries, sids)?),
    })
}

fn encode_canonical_map(entries: &[(String, CborValue)], sids: &SidTable) -> Result<Vec<(Value, Value)>> {
    let mut keyed = Vec::with_capacity(entries.len());
    for (path, inner) in entries {
        let key_value = match sids.sid_for_path(path) {
            Some(sid) => Value::Tag(TAG_SID, Box::new(int_to_value(i128::from(sid)))),
            None => Value::Text(path.clone()),
        };
        let mut key_bytes = Vec::new();
        ciborium::ser::into_writer(&key_value, &mut key_bytes)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        keyed.push((key_bytes, key_value, to_ciborium_value(inner, sids)?));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, k, v)| (k, v)).collect())
}

fn from_ciborium_value(value: &Value, sids: &SidTable) -> CborValue {
    match value {
        Value::Null => CborValue::Null,
        Value::Bool(b) => CborValue::Bool(*b),
        Value::Integer(i) => CborValue::Integer(i128::from(*i)),
        Value::Float(f) => CborValue::Float(*f),
        Value::Text(s) => CborValue::Text(s.clone()),
        Value::Bytes(b) => CborValue::Bytes(b.clone()),
        Value::Tag(TAG_BITS, inner) => match inner.as_bytes() {
            Some(b) => CborValue::Bits(b.clone()),
            None => from_ciborium_value(inner, sids),
        },
        Value::Tag(TAG_ENUMERATION, inner) => {
            value_to_int(inner).map_or_else(|| from_ciborium_value(inner, sids), |n| CborValue::Enumeration(n as i64))
        },
        Value::Tag(TAG_IDENTITYREF, inner) => {
            value_to_int(inner).map_or_else(|| from_ciborium_value(inner, sids), |n| CborValue::IdentityRef(n as u32))
        },
        Value::Tag(TAG_INSTANCE_IDENTIFIER, inner) => match inner.as_text() {
            Some(s) => CborValue::InstanceIdentifier(s.to_string()),
            None => from_ciborium_value(inner, sids),
        },
        Value::Array(items) => {
            CborValue::Array(items.iter().map(|v| from_ciborium_value(v, sids)).collect())
        },
        Value::Map(entries) => CborValue::Map(decode_map_keys(entries, sids)),
        Value::Tag(_, inner) => from_ciborium_value(inner, sids),
        other => CborValue::Text(format!("{other:?}")),
    }
}

fn decode_map_keys(entries: &[(Value, Value)], sids: &SidTable) -> Vec<(String, CborValue)> {
    entries
        .iter()
        .map(|(key, value)| {
            let path = match key {
                Value::Tag(TAG_SID, inner) => value_to_int(inner)
                    .and_then(|sid| u32::try_from(sid).ok())
                    .map_or_else(|| "SID:?".to_string(), |sid| resolve_sid_key(sid, sids)),
                Value::Text(s) => s.clone(),
                other => format!("{other:?}"),
            };
            (path, from_ciborium_value(value, sids))
        })
        .collect()
}

fn resolve_sid_key(sid: u32, sids: &SidTable) -> String {
    sids.path_for_sid(sid).map_or_else(|| format!("SID:{sid}"), ToString::to_string)
}

/// Encode a value to CBOR bytes, substituting known YANG paths in map keys
/// with their SID (§4.3 "Map keys that are YANG instance paths are
/// substituted by the SID table").
///
/// # Errors
///
/// `ProtocolError::CborEncode` if the underlying CBOR writer fails.
pub fn encode(value: &CborValue, sids: &SidTable) -> Result<Vec<u8>> {
    let cv = to_ciborium_value(value, sids)?;
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&cv, &mut buf).map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
    Ok(buf)
}

/// Decode CBOR bytes to a value, resolving SID map keys back to their
/// textual path (or `SID:<n>` if the table has no entry for it, §4.3).
///
/// # Errors
///
/// `ProtocolError::CborDecode` if the bytes are not valid CBOR.
pub fn decode(bytes: &[u8], sids: &SidTable) -> Result<CborValue> {
    let cv: Value = ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))?;
    Ok(from_ciborium_value(&cv, sids))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use vdsp_sid::SidTable;

    use super::*;

    #[test]
    fn scenario_f_sid_map_collision_round_trips_through_table() {
        let sids = SidTable::embedded();
        let value = CborValue::Map(vec![(
            "/ietf-interfaces:interfaces".to_string(),
            CborValue::Bool(true),
        )]);

        let encoded = encode(&value, &sids).expect("encodes");

        // The key must be tag 256 wrapping the integer SID 1000.
        let raw: Value = ciborium::de::from_reader(encoded.as_slice()).expect("raw decode");
        let Value::Map(entries) = raw else { panic!("expected a map") };
        assert_eq!(entries.len(), 1);
        match &entries[0].0 {
            Value::Tag(256, inner) => assert_eq!(inner.as_integer(), Some(Integer::from(1000))),
            other => panic!("expected tag 256, got {other:?}"),
        }

        let decoded = decode(&encoded, &sids).expect("decodes");
        assert_eq!(decoded, value);
    }

    #[test]
    fn unknown_path_is_emitted_as_plain_text_key() {
        let sids = SidTable::embedded();
        let value = CborValue::Map(vec![("/no/such:path".to_string(), CborValue::Integer(1))]);
        let encoded = encode(&value, &sids).expect("encodes");
        let decoded = decode(&encoded, &sids).expect("decodes");
        assert_eq!(decoded, value);
    }

    #[test]
    fn unresolvable_sid_key_decodes_as_opaque_identifier() {
        let sids = SidTable::embedded();
        let raw = Value::Map(vec![(
            Value::Tag(TAG_SID, Box::new(Value::Integer(Integer::from(999_999)))),
            Value::Bool(false),
        )]);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&raw, &mut buf).unwrap();

        let decoded = decode(&buf, &sids).expect("decodes");
        let CborValue::Map(entries) = decoded else { panic!("expected a map") };
        assert_eq!(entries[0].0, "SID:999999");
    }

    #[test]
    fn large_integers_survive_without_truncation() {
        let sids = SidTable::embedded();
        let huge = (1i128 << 60) + 7;
        let value = CborValue::Integer(huge);
        let encoded = encode(&value, &sids).expect("encodes");
        let decoded = decode(&encoded, &sids).expect("decodes");
        assert_eq!(decoded, value);
    }

    proptest! {
        /// Invariant 3 (§3, §8): `decode(encode(v)) == v`, and canonical
        /// map-key order is stable under re-encoding.
        #[test]
        fn prop_scalar_round_trip(
            b in any::<bool>(),
            i in -1_000_000i64..1_000_000i64,
            s in "[a-zA-Z0-9/_:-]{0,32}",
        ) {
            let sids = SidTable::embedded();
            for value in [CborValue::Bool(b), CborValue::Integer(i128::from(i)), CborValue::Text(s)] {
                let encoded = encode(&value, &sids).expect("encodes");
                let decoded = decode(&encoded, &sids).expect("decodes");
                prop_assert_eq!(decoded, value);
            }
        }

        #[test]
        fn prop_map_key_order_is_stable_under_re_encoding(
            keys in prop::collection::hash_set("[a-z]{1,10}", 1..6),
        ) {
            let sids = SidTable::embedded();
            let entries: Vec<(String, CborValue)> =
                keys.into_iter().map(|k| (k, CborValue::Integer(0))).collect();
            let value = CborValue::Map(entries);

            let encoded_once = encode(&value, &sids).expect("encodes");
            let decoded = decode(&encoded_once, &sids).expect("decodes");
            let encoded_twice = encode(&decoded, &sids).expect("encodes");
            prop_assert_eq!(encoded_once, encoded_twice);
        }
    }
}
