//! User-facing messages.

use serde::{Deserialize, Serialize};

/// How a notice is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    /// Non-blocking banner.
    Advisory,
    /// Modal message the user must acknowledge.
    Blocking,
}

/// A message surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn advisory(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Advisory,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn blocking(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Blocking,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        matches!(self.kind, NoticeKind::Blocking)
    }
}
