//! Person entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pipeline_core::traits::{Entity, HasOwner};
use pipeline_core::types::PkInfo;

/// A person profile, keyed by UUID and owned by a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// Primary key.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Contact email, used as an alternate lookup key.
    #[serde(default)]
    pub email: Option<String>,
    /// Id of the owning user account.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Person {
    /// A new, unowned person with a fresh primary key.
    pub fn new(name: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            email: email.map(str::to_string),
            user_id: None,
            title: None,
            bio: None,
            created_at: Utc::now(),
        }
    }

    /// Assign the owning user.
    pub fn owned_by(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

const FIELDS: &[&str] = &["uuid", "name", "email", "user_id", "title", "bio", "created_at"];

impl Entity for Person {
    const MODEL_NAME: &'static str = "Person";

    fn pk_info() -> PkInfo {
        PkInfo::uuid("uuid")
    }

    fn field_names() -> &'static [&'static str] {
        FIELDS
    }

    fn search_fields() -> &'static [&'static str] {
        &["name", "email", "title", "bio"]
    }

    fn display(&self) -> String {
        match &self.email {
            Some(email) => format!("{} <{email}>", self.name),
            None => self.name.clone(),
        }
    }
}

impl HasOwner for Person {
    fn owner_field() -> &'static str {
        "user_id"
    }

    fn owner_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_record_fills_defaults() {
        let record = json!({"uuid": Uuid::new_v4(), "name": "Ada"})
            .as_object()
            .cloned()
            .unwrap();
        let person = Person::from_record(record).unwrap();
        assert_eq!(person.email, None);
        assert_eq!(person.display(), "Ada");
    }

    #[test]
    fn test_ownership() {
        let person = Person {
            uuid: Uuid::new_v4(),
            name: "Ada".into(),
            email: Some("ada@example.com".into()),
            user_id: Some("u-1".into()),
            title: None,
            bio: None,
            created_at: Utc::now(),
        };
        assert!(person.is_owned_by("u-1"));
        assert!(!person.is_owned_by("u-2"));
        assert_eq!(person.display(), "Ada <ada@example.com>");
    }
}
