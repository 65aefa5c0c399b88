//! Catalog entry types.
//!
//! The store keeps one JSON object per app under the collection path, keyed by
//! a push id. Field names on the wire are camelCase.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a catalog entry.
///
/// Assigned by the data store when the entry is created and never changed
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    /// Wrap a store key.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AppId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The editable fields of a catalog entry.
///
/// Updates send exactly this set; `createdAt` is never part of a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppFields {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    /// Remote image URL or an embedded `data:` URL.
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub category: String,
}

impl AppFields {
    /// Category to display, falling back to a generic label.
    #[must_use]
    pub fn category_label(&self) -> &str {
        let category = self.category.trim();
        if category.is_empty() { "App" } else { category }
    }

    /// Whether an icon has been set.
    #[must_use]
    pub fn has_icon(&self) -> bool {
        !self.icon_url.is_empty()
    }
}

/// A catalog entry as mirrored from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRecord {
    pub id: AppId,
    #[serde(flatten)]
    pub fields: AppFields,
    /// Creation time. `None` when the stored value is missing or unparseable.
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AppRecord {
    /// Build a record from a store key and the stored JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object with at least a `name`.
    pub fn from_stored(id: AppId, value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let fields = AppFields::deserialize(value)?;
        let created_at = value
            .get("createdAt")
            .and_then(serde_json::Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc));

        Ok(Self {
            id,
            fields,
            created_at,
        })
    }
}

/// A new entry ready to be appended to the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewApp {
    #[serde(flatten)]
    pub fields: AppFields,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}
