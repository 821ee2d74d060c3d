//! Primary-key descriptors.
//!
//! Generic CRUD code accepts either `id` or `uuid` for an entity's primary
//! key; [`PkInfo`] records which one the entity actually uses.

use serde::{Deserialize, Serialize};

/// Keys that callers may use to refer to a primary key.
pub const PK_ALIASES: [&str; 3] = ["pk", "id", "uuid"];

/// Kind of primary key an entity declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PkKind {
    /// Surrogate integer key.
    Id,
    /// UUID key.
    Uuid,
}

/// Name and kind of an entity's primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PkKind,
}

impl PkInfo {
    pub fn new(name: impl Into<String>, kind: PkKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// An integer key named `id`.
    pub fn id() -> Self {
        Self::new("id", PkKind::Id)
    }

    /// A UUID key with the given field name.
    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, PkKind::Uuid)
    }

    /// The alternate name callers may use: `id` for UUID keys, `uuid` for
    /// integer keys.
    pub fn alias(&self) -> &'static str {
        match self.kind {
            PkKind::Uuid => "id",
            PkKind::Id => "uuid",
        }
    }

    /// Whether `key` names this primary key (its field name, `pk`, or the
    /// alias).
    pub fn is_pk_key(&self, key: &str) -> bool {
        key == self.name || key == "pk" || key == self.alias()
    }

    /// Map `pk`, `id` or `uuid` onto the real field name; other keys pass
    /// through.
    pub fn resolve<'a>(&'a self, key: &'a str) -> &'a str {
        if PK_ALIASES.contains(&key) {
            &self.name
        } else {
            key
        }
    }
}
