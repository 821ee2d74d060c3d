//! Record helpers shared by the store backends.

use serde_json::Value;

use pipeline_core::error::AppError;
use pipeline_core::result::AppResult;
use pipeline_core::traits::Entity;
use pipeline_core::types::Record;
use pipeline_core::types::record::value_to_string;

/// Store-level model name (`Person` → `person`).
pub(crate) fn model_name<E: Entity>() -> String {
    E::MODEL_NAME.to_lowercase()
}

/// Whether the record lacks a usable primary key value.
pub(crate) fn pk_missing<E: Entity>(record: &Record) -> bool {
    record.get(&E::pk_info().name).is_none_or(Value::is_null)
}

/// Text form of the record's primary key.
pub(crate) fn pk_text<E: Entity>(record: &Record) -> AppResult<String> {
    let info = E::pk_info();
    record
        .get(&info.name)
        .filter(|v| !v.is_null())
        .map(value_to_string)
        .ok_or_else(|| {
            AppError::validation(format!("{} record has no '{}'", E::MODEL_NAME, info.name))
        })
}

/// Round-trip a record through `E`, filling defaults and rejecting
/// values that do not fit the entity.
pub(crate) fn normalize<E: Entity>(record: Record) -> AppResult<(E, Record)> {
    let entity = E::from_record(record).map_err(|e| {
        AppError::validation(format!("Invalid {} data: {}", E::MODEL_NAME, e.message))
    })?;
    let normalized = entity.to_record()?;
    Ok((entity, normalized))
}

/// Copy of `row` with `changes` applied on top.
pub(crate) fn merged(row: &Record, changes: &Record) -> Record {
    let mut next = row.clone();
    for (key, value) in changes {
        next.insert(key.clone(), value.clone());
    }
    next
}

/// Subset of `data` restricted to `fields`.
pub(crate) fn pick(data: &Record, fields: &[String]) -> Record {
    fields
        .iter()
        .filter_map(|f| data.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}
