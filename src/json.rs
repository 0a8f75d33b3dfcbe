//! Building [`Value`] trees from JSON.

use facet_core::Facet;

use crate::{
    decode::decode,
    error::DecodeError,
    value::{Map, Number, Value},
};

/// Parses `source` as JSON and decodes it into `output`.
///
/// Numbers become [`Value::Int`], [`Value::Uint`] or [`Value::Float`]; use
/// [`to_value_with_numbers`] to keep them as deferred [`Number`]s instead.
pub fn decode_str<T: Facet<'static>>(source: &str, output: &mut T) -> Result<(), DecodeError> {
    let json: serde_json::Value = serde_json::from_str(source)?;
    decode(&Value::from(json), output)
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        convert(json, number_value)
    }
}

/// Converts JSON, keeping every number as its source text so the target
/// decides the precision.
pub fn to_value_with_numbers(json: serde_json::Value) -> Value {
    convert(json, |number| Value::Number(Number::new(number.to_string())))
}

fn convert(json: serde_json::Value, number: fn(serde_json::Number) -> Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => number(n),
        serde_json::Value::String(text) => Value::Text(text),
        serde_json::Value::Array(items) => Value::Seq(
            items
                .into_iter()
                .map(|item| convert(item, number))
                .collect(),
        ),
        serde_json::Value::Object(object) => Value::Map(
            object
                .into_iter()
                .map(|(key, value)| (key, convert(value, number)))
                .collect::<Map>(),
        ),
    }
}

fn number_value(number: serde_json::Number) -> Value {
    if let Some(i) = number.as_i64() {
        Value::Int(i)
    } else if let Some(u) = number.as_u64() {
        Value::Uint(u)
    } else if let Some(x) = number.as_f64() {
        Value::Float(x)
    } else {
        Value::Number(Number::new(number.to_string()))
    }
}
