//! Conversion of store rows into plain records.

use serde_json::{Map, Number, Value};

use super::store::{StoreRow, StoreValue};

/// A result row as returned to the caller: field names to scalar values, in select-list order.
pub type Record = Map<String, Value>;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Convert one row. Temporal values become ISO-8601 text. Text holding a JSON object is
/// flattened into the record, without overwriting fields the row already has.
pub fn to_record(row: StoreRow) -> Record {
    let mut record = Record::new();
    let mut structured = vec![];

    for (name, value) in row.columns {
        match value {
            StoreValue::Text(text) => match parse_object(&text) {
                Some(object) => structured.push((name, object)),
                None => {
                    record.insert(name, Value::String(text));
                }
            },
            StoreValue::Json(Value::Object(object)) => structured.push((name, object)),
            other => {
                record.insert(name, to_value(other));
            }
        }
    }

    for (name, object) in structured {
        if object.keys().any(|key| record.contains_key(key)) {
            // flattening would clobber a real column; keep the raw text instead
            record.insert(name, Value::String(Value::Object(object).to_string()));
            continue;
        }
        for (key, value) in object {
            record.insert(key, flatten_value(value));
        }
    }

    record
}

/// The JSON value for a single store value.
pub fn to_value(value: StoreValue) -> Value {
    match value {
        StoreValue::Null => Value::Null,
        StoreValue::Bool(b) => Value::Bool(b),
        StoreValue::Int(i) => Value::Number(i.into()),
        StoreValue::UInt(u) => Value::Number(u.into()),
        StoreValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        StoreValue::Decimal(text) => decimal(text),
        StoreValue::Text(text) => Value::String(text),
        StoreValue::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        StoreValue::Date(date) => Value::String(date.format(DATE_FORMAT).to_string()),
        StoreValue::Time(time) => Value::String(time.format(TIME_FORMAT).to_string()),
        StoreValue::DateTime(date_time) => {
            Value::String(date_time.format(DATE_TIME_FORMAT).to_string())
        }
        StoreValue::Timestamp(timestamp) => Value::String(timestamp.to_rfc3339()),
        StoreValue::Json(json) => flatten_value(json),
    }
}

/// Decimals become numbers when they print back the same way, otherwise they stay text.
fn decimal(text: String) -> Value {
    if let Ok(integer) = text.parse::<i64>() {
        return Value::Number(integer.into());
    }
    match text.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(number) if number.to_string() == text => Value::Number(number),
        _ => Value::String(text),
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    if !text.trim_start().starts_with('{') {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Nested structures stay as serialized text so every field remains a scalar.
fn flatten_value(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar,
    }
}
