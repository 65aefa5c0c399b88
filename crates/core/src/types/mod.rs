//! Core types for App Hub.
//!
//! This module provides type-safe wrappers for the catalog's domain concepts.

pub mod app;
pub mod email;
pub mod namespace;

pub use app::{AppFields, AppId, AppRecord, NewApp};
pub use email::{Email, EmailError};
pub use namespace::{CollectionPath, DEFAULT_APP_ID, InvalidKey};
