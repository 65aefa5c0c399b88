//! Admin form draft.
//!
//! Holds the fields being edited, the record being edited (if any), and turns
//! the draft into a create or update request.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AppFields, AppId, AppRecord, NewApp};

/// Largest icon, in bytes, that is embedded into a record.
pub const MAX_ICON_BYTES: usize = 800_000;

/// Content type used when the upload does not name one.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Reasons a draft cannot be used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Image must be at most 800 KB (got {size} bytes)")]
    IconTooLarge { size: usize },
    #[error("{field} is required")]
    MissingField { field: &'static str },
}

/// What a valid draft asks the store to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Create(NewApp),
    Update { id: AppId, fields: AppFields },
}

/// The admin form's private state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminForm {
    pub fields: AppFields,
    pub editing: Option<AppRecord>,
}

impl AdminForm {
    /// Load a record into the draft for editing.
    pub fn begin_edit(&mut self, record: &AppRecord) {
        self.fields = record.fields.clone();
        self.editing = Some(record.clone());
    }

    /// Discard the draft and go back to an empty create form.
    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub const fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    /// Embed an uploaded icon as a `data:` URL.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::IconTooLarge`] above [`MAX_ICON_BYTES`]; the
    /// current icon is left untouched.
    pub fn attach_icon(&mut self, bytes: &[u8], content_type: Option<&str>) -> Result<(), FormError> {
        if bytes.len() > MAX_ICON_BYTES {
            return Err(FormError::IconTooLarge { size: bytes.len() });
        }

        let content_type = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(FALLBACK_CONTENT_TYPE);
        self.fields.icon_url = format!("data:{content_type};base64,{}", STANDARD.encode(bytes));
        Ok(())
    }

    /// Build the store request for this draft.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::MissingField`] when name, description or url is
    /// blank.
    pub fn submission(&self, now: DateTime<Utc>) -> Result<Submission, FormError> {
        for (field, value) in [
            ("Name", &self.fields.name),
            ("Description", &self.fields.description),
            ("URL", &self.fields.url),
        ] {
            if value.trim().is_empty() {
                return Err(FormError::MissingField { field });
            }
        }

        Ok(match &self.editing {
            Some(record) => Submission::Update {
                id: record.id.clone(),
                fields: self.fields.clone(),
            },
            None => Submission::Create(NewApp {
                fields: self.fields.clone(),
                created_at: now,
            }),
        })
    }
}
