//! Tag entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pipeline_core::traits::Entity;
use pipeline_core::types::PkInfo;

/// A tag with an integer primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Number of items carrying the tag.
    #[serde(default)]
    pub usage_count: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Entity for Tag {
    const MODEL_NAME: &'static str = "Tag";

    fn pk_info() -> PkInfo {
        PkInfo::id()
    }

    fn field_names() -> &'static [&'static str] {
        &["id", "name", "slug", "description", "usage_count", "created_at"]
    }

    fn search_fields() -> &'static [&'static str] {
        &["name", "slug", "description"]
    }

    fn display(&self) -> String {
        self.name.clone()
    }
}
