//! Read-only mirror of the app collection.
//!
//! The mirror is rebuilt from scratch on every snapshot. There is no merge
//! with earlier snapshots: whatever the latest snapshot holds is the catalog.

use std::cmp::Ordering;

use serde_json::Value;

use crate::types::{AppId, AppRecord};

/// The mirrored catalog plus its loading state.
#[derive(Debug, Clone)]
pub struct Catalog {
    apps: Vec<AppRecord>,
    loading: bool,
    revision: u64,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            apps: Vec::new(),
            loading: true,
            revision: 0,
        }
    }
}

impl Catalog {
    /// Replace the catalog with the contents of a snapshot.
    ///
    /// Returns the number of children that could not be decoded and were
    /// left out.
    pub fn apply_snapshot(&mut self, snapshot: &Value) -> usize {
        let (apps, skipped) = decode_snapshot(snapshot);
        self.apps = apps;
        self.loading = false;
        self.revision += 1;
        skipped
    }

    /// Stop showing the loading indicator, keeping the current list.
    pub const fn finish_loading(&mut self) {
        self.loading = false;
    }

    /// Entries, most recently created first.
    #[must_use]
    pub fn apps(&self) -> &[AppRecord] {
        &self.apps
    }

    #[must_use]
    pub fn get(&self, id: &AppId) -> Option<&AppRecord> {
        self.apps.iter().find(|app| &app.id == id)
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Number of snapshots applied so far.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }
}

/// Decode a collection snapshot into sorted records.
///
/// Accepts an object keyed by store id, an array (the store's rendering of
/// integer keys), or `null` for an empty collection.
#[must_use]
pub fn decode_snapshot(snapshot: &Value) -> (Vec<AppRecord>, usize) {
    let children: Vec<(String, &Value)> = match snapshot {
        Value::Object(children) => children
            .iter()
            .map(|(key, value)| (key.clone(), value))
            .collect(),
        Value::Array(children) => children
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.is_null())
            .map(|(index, value)| (index.to_string(), value))
            .collect(),
        Value::Null => Vec::new(),
        _ => return (Vec::new(), 1),
    };

    let mut skipped = 0;
    let mut apps = Vec::with_capacity(children.len());
    for (key, value) in children {
        match AppRecord::from_stored(AppId::new(key), value) {
            Ok(record) => apps.push(record),
            Err(_) => skipped += 1,
        }
    }

    apps.sort_by(newest_first);
    (apps, skipped)
}

/// Newest `createdAt` first; entries without a timestamp last; ties by id.
fn newest_first(a: &AppRecord, b: &AppRecord) -> Ordering {
    match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}
