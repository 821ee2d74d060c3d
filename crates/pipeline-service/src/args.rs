//! Readers for the keyword maps services receive.

use serde::de::DeserializeOwned;
use serde_json::Value;

use pipeline_core::error::AppError;
use pipeline_core::result::AppResult;
use pipeline_core::types::Record;

pub(crate) fn opt_str<'a>(args: &'a Record, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn opt_usize(args: &Record, key: &str) -> Option<usize> {
    args.get(key).and_then(Value::as_u64).map(|n| n as usize)
}

/// A non-null value, if present.
pub(crate) fn opt_value(args: &Record, key: &str) -> Option<Value> {
    args.get(key).filter(|v| !v.is_null()).cloned()
}

/// A nested keyword map; absent or null means empty.
pub(crate) fn record(args: &Record, key: &str) -> AppResult<Record> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(Record::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(AppError::validation(format!(
            "Argument '{key}' must be an object, got {other}"
        ))),
    }
}

/// A list of strings; absent or null means empty.
pub(crate) fn strings(args: &Record, key: &str) -> AppResult<Vec<String>> {
    typed::<Option<Vec<String>>>(args, key).map(Option::unwrap_or_default)
}

/// Deserialize an argument into `T`, treating a missing key as `null`.
pub(crate) fn typed<T: DeserializeOwned>(args: &Record, key: &str) -> AppResult<T> {
    let value = args.get(key).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| AppError::validation(format!("Invalid argument '{key}': {e}")))
}

pub(crate) fn required<T: DeserializeOwned>(args: &Record, key: &str) -> AppResult<T> {
    if args.get(key).is_none_or(Value::is_null) {
        return Err(AppError::validation(format!("Missing required argument: {key}")));
    }
    typed(args, key)
}
