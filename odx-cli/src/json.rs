//! JSON rendition of parameter value trees.
//!
//! Structures map to objects and repeated fields to arrays. Two shapes
//! need markers to stay unambiguous: byte fields are `{"$bytes": "a1b2"}`
//! and mux-case/table-row selections are `{"$case": "...", "$value": ...}`.

use anyhow::{Context, Result, bail};
use odx_db::{OdxValue, ParamValue};
use serde_json::{Map, Value};

/// Parse hex bytes, tolerating whitespace and `0x` prefixes.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text
        .split([' ', ',', '\t'])
        .map(|chunk| chunk.strip_prefix("0x").unwrap_or(chunk))
        .collect();
    if cleaned.len() % 2 != 0 {
        bail!("Odd number of hex digits in '{text}'");
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .with_context(|| format!("'{text}' is not a valid hex byte string"))
        })
        .collect()
}

pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn from_param_value(value: &ParamValue) -> Value {
    match value {
        ParamValue::Atomic(OdxValue::Integer(v)) => Value::from(*v),
        ParamValue::Atomic(OdxValue::Float(v)) => Value::from(*v),
        ParamValue::Atomic(OdxValue::String(v)) => Value::from(v.clone()),
        ParamValue::Atomic(OdxValue::Bytes(v)) => {
            let mut map = Map::new();
            map.insert("$bytes".into(), Value::from(hex_string(v)));
            Value::Object(map)
        }
        ParamValue::Struct(fields) => {
            let mut map = Map::new();
            for (name, field) in fields {
                map.insert(name.clone(), from_param_value(field));
            }
            Value::Object(map)
        }
        ParamValue::List(items) => Value::Array(items.iter().map(from_param_value).collect()),
        ParamValue::Selected { name, value } => {
            let mut map = Map::new();
            map.insert("$case".into(), Value::from(name.clone()));
            map.insert("$value".into(), from_param_value(value));
            Value::Object(map)
        }
    }
}

pub fn to_param_value(value: &Value) -> Result<ParamValue> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(ParamValue::Atomic(OdxValue::Integer(v)))
            } else if let Some(v) = n.as_f64() {
                Ok(ParamValue::Atomic(OdxValue::Float(v)))
            } else {
                bail!("Number {n} is out of the supported range");
            }
        }
        Value::String(s) => Ok(ParamValue::Atomic(OdxValue::String(s.clone()))),
        Value::Array(items) => Ok(ParamValue::List(
            items.iter().map(to_param_value).collect::<Result<_>>()?,
        )),
        Value::Object(map) => {
            if let Some(hex) = map.get("$bytes") {
                let Some(hex) = hex.as_str() else {
                    bail!("$bytes expects a hex string");
                };
                return Ok(ParamValue::Atomic(OdxValue::Bytes(parse_hex(hex)?)));
            }
            if let Some(case) = map.get("$case") {
                let Some(name) = case.as_str() else {
                    bail!("$case expects a case or row name");
                };
                let inner = match map.get("$value") {
                    Some(v) => to_param_value(v)?,
                    None => ParamValue::Struct(Vec::new()),
                };
                return Ok(ParamValue::Selected {
                    name: name.to_string(),
                    value: Box::new(inner),
                });
            }
            let mut fields = Vec::with_capacity(map.len());
            for (name, field) in map {
                fields.push((name.clone(), to_param_value(field)?));
            }
            Ok(ParamValue::Struct(fields))
        }
        Value::Bool(_) | Value::Null => {
            bail!("Parameter values must be numbers, strings, arrays or objects")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn hex_parsing_tolerates_separators() {
        assert_eq!(parse_hex("10 03").unwrap(), vec![0x10, 0x03]);
        assert_eq!(parse_hex("0x10,0x03").unwrap(), vec![0x10, 0x03]);
        assert!(parse_hex("1").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn value_tree_round_trips() {
        let value = ParamValue::Struct(vec![
            ("Mode".into(), ParamValue::Atomic(OdxValue::Integer(3))),
            (
                "Payload".into(),
                ParamValue::Selected {
                    name: "Vin".into(),
                    value: Box::new(ParamValue::Struct(vec![(
                        "Data".into(),
                        ParamValue::Atomic(OdxValue::Bytes(vec![0xa1, 0xb2])),
                    )])),
                },
            ),
            (
                "Items".into(),
                ParamValue::List(vec![ParamValue::Atomic(OdxValue::Float(2.5))]),
            ),
        ]);
        let rendered = from_param_value(&value);
        assert_eq!(
            rendered,
            json!({
                "Mode": 3,
                "Payload": {"$case": "Vin", "$value": {"Data": {"$bytes": "a1b2"}}},
                "Items": [2.5],
            })
        );
        assert_eq!(to_param_value(&rendered).unwrap(), value);
    }
}
