//! Entity traits that let generic managers and services work with any
//! record type.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::pk::PkInfo;
use crate::types::record::Record;

/// A persistable record type.
///
/// Entities round-trip through [`Record`] maps; stores and services only
/// ever read fields by name.
pub trait Entity: Serialize + DeserializeOwned + Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Model name used in cache keys, log lines and search results.
    const MODEL_NAME: &'static str;

    /// Primary key name and kind.
    fn pk_info() -> PkInfo;

    /// Every field the entity declares.
    fn field_names() -> &'static [&'static str];

    /// Fields matched by free-text search.
    fn search_fields() -> &'static [&'static str] {
        &[]
    }

    /// Human-readable representation.
    fn display(&self) -> String;

    fn has_field(name: &str) -> bool {
        Self::field_names().contains(&name)
    }

    fn to_record(&self) -> AppResult<Record> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(AppError::serialization(format!(
                "{} serialized to a non-object value: {other}",
                Self::MODEL_NAME
            ))),
        }
    }

    fn from_record(record: Record) -> AppResult<Self> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }

    /// Value of the primary key field.
    fn pk_value(&self) -> AppResult<Value> {
        let info = Self::pk_info();
        self.to_record()?
            .remove(&info.name)
            .ok_or_else(|| {
                AppError::internal(format!("{} has no '{}' field", Self::MODEL_NAME, info.name))
            })
    }

    /// Value of an arbitrary field, `Null` when absent.
    fn field_value(&self, field: &str) -> AppResult<Value> {
        Ok(self.to_record()?.remove(field).unwrap_or(Value::Null))
    }
}

/// Entities that belong to a user.
pub trait HasOwner {
    /// Field holding the owning user's id, used to build ownership filters.
    fn owner_field() -> &'static str;

    /// Id of the owning user, if any.
    fn owner_id(&self) -> Option<String>;

    /// Whether `user_id` owns this entity.
    fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id().is_some_and(|owner| owner == user_id)
    }
}
