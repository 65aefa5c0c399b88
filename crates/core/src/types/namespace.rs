//! Store namespace derived from the configured application identifier.

use core::fmt;

use thiserror::Error;

/// Application identifier used when none is configured.
pub const DEFAULT_APP_ID: &str = "default-app-id";

/// Characters the realtime database does not allow in path segments.
const FORBIDDEN: [char; 5] = ['.', '#', '$', '[', ']'];

/// Longest key the realtime database accepts, in UTF-8 bytes.
const MAX_KEY_BYTES: usize = 768;

/// A record key that does not name exactly one child of the collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid record key: {0:?}")]
pub struct InvalidKey(pub String);

/// Location of the app collection inside the realtime database.
///
/// Always `artifacts/<app-id>/public/data/apps`, with forbidden characters in
/// the app id replaced by `_`. A blank app id means [`DEFAULT_APP_ID`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    app_id: String,
}

impl CollectionPath {
    /// Build the collection path for an application identifier.
    #[must_use]
    pub fn for_app(raw_app_id: &str) -> Self {
        let raw_app_id = match raw_app_id.trim() {
            "" => DEFAULT_APP_ID,
            trimmed => trimmed,
        };
        Self {
            app_id: sanitize_segment(raw_app_id),
        }
    }

    /// The sanitized application identifier.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Path of the whole collection, without leading slash.
    #[must_use]
    pub fn collection(&self) -> String {
        format!("artifacts/{}/public/data/apps", self.app_id)
    }

    /// Path of a single entry in the collection.
    ///
    /// Keys are used verbatim, never rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidKey`] for an empty or oversized key, or one holding a
    /// `/`, a control character, or any of `. # $ [ ]`.
    pub fn entry(&self, id: &str) -> Result<String, InvalidKey> {
        let valid = !id.is_empty()
            && id.len() <= MAX_KEY_BYTES
            && !id
                .chars()
                .any(|c| c == '/' || c.is_control() || FORBIDDEN.contains(&c));
        if valid {
            Ok(format!("{}/{id}", self.collection()))
        } else {
            Err(InvalidKey(id.to_string()))
        }
    }
}

impl Default for CollectionPath {
    fn default() -> Self {
        Self::for_app(DEFAULT_APP_ID)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.collection())
    }
}

/// Replace characters that are illegal in a database key with `_`.
#[must_use]
pub fn sanitize_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect()
}
