//! Standard response parsers.
//!
//! Parsers turn a response body into a value, failing with
//! [`NetworkError::InvalidData`] when the body cannot be interpreted.

use crate::{NetworkError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Parse JSON data as an array.
pub fn json_array_parser(data: &[u8]) -> Result<Vec<Value>> {
    match serde_json::from_slice::<Value>(data)? {
        Value::Array(array) => Ok(array),
        other => Err(NetworkError::invalid_data(format!(
            "expected a JSON array, found {}",
            json_kind(&other)
        ))),
    }
}

/// Parse JSON data as a dictionary.
pub fn json_dictionary_parser(data: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(data)? {
        Value::Object(dictionary) => Ok(dictionary),
        other => Err(NetworkError::invalid_data(format!(
            "expected a JSON dictionary, found {}",
            json_kind(&other)
        ))),
    }
}

/// Deserialize JSON data into `T`.
pub fn json_decoder<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(data)?)
}

/// Return the data untouched.
pub fn data_parser(data: &[u8]) -> Result<bytes::Bytes> {
    Ok(bytes::Bytes::copy_from_slice(data))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a dictionary",
    }
}
