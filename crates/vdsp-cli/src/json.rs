//! Bridges CLI-facing JSON (`set <path> <value-json>`, `rpc <path>
//! [<params-json>]`) to the wire-level [`CborValue`] tree (§6).

use vdsp_proto::cbor::CborValue;

/// Parses a JSON literal from the command line into a [`CborValue`].
///
/// # Errors
///
/// Propagates `serde_json`'s parse error on malformed input.
pub fn parse(text: &str) -> Result<CborValue, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    Ok(from_json(&value))
}

fn from_json(value: &serde_json::Value) -> CborValue {
    match value {
        serde_json::Value::Null => CborValue::Null,
        serde_json::Value::Bool(b) => CborValue::Bool(*b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(|i| CborValue::Integer(i128::from(i)))
            .unwrap_or_else(|| CborValue::Float(n.as_f64().unwrap_or(0.0))),
        serde_json::Value::String(s) => CborValue::Text(s.clone()),
        serde_json::Value::Array(items) => CborValue::Array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(entries) => {
            CborValue::Map(entries.iter().map(|(k, v)| (k.clone(), from_json(v))).collect())
        },
    }
}

/// Renders a [`CborValue`] as a JSON string for display (§6 `get`/`rpc`
/// output).
#[must_use]
pub fn render(value: &CborValue) -> String {
    to_json(value).to_string()
}

fn to_json(value: &CborValue) -> serde_json::Value {
    match value {
        CborValue::Null => serde_json::Value::Null,
        CborValue::Bool(b) => serde_json::Value::Bool(*b),
        CborValue::Integer(i) => i128_to_json(*i),
        CborValue::Float(f) => serde_json::Number::from_f64(*f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        CborValue::Text(s) | CborValue::InstanceIdentifier(s) => serde_json::Value::String(s.clone()),
        CborValue::Bytes(b) | CborValue::Bits(b) => {
            serde_json::Value::String(b.iter().map(|byte| format!("{byte:02x}")).collect())
        },
        CborValue::Enumeration(n) => serde_json::Value::Number((*n).into()),
        CborValue::IdentityRef(sid) => serde_json::Value::Number((*sid).into()),
        CborValue::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        CborValue::Map(entries) => serde_json::Value::Object(
            entries.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
    }
}

fn i128_to_json(i: i128) -> serde_json::Value {
    i64::try_from(i).map_or_else(|_| serde_json::Value::String(i.to_string()), |i| i.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_object_into_cbor_map() {
        let value = parse(r#"{"a": 1, "b": true}"#).expect("valid json");
        let CborValue::Map(entries) = value else { panic!("expected a map") };
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn renders_map_as_json_object() {
        let value = CborValue::Map(vec![("a".to_string(), CborValue::Integer(1))]);
        assert_eq!(render(&value), r#"{"a":1}"#);
    }

    #[test]
    fn large_integer_renders_as_string_to_avoid_precision_loss() {
        let huge = (1i128 << 62) + 7;
        assert_eq!(render(&CborValue::Integer(huge)), format!("\"{huge}\""));
    }
}
