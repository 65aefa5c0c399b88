//! App Hub Core - types and client logic shared by the App Hub server.
//!
//! # Architecture
//!
//! The core crate contains types, pure state transitions, and the capability
//! traits for the two hosted services App Hub depends on. It performs no I/O
//! itself: the identity provider and the realtime data store are injected
//! through [`ports::IdentityProvider`] and [`ports::DataStore`], so every
//! piece of logic here can be exercised with in-memory fakes.
//!
//! # Modules
//!
//! - [`types`] - Catalog records, email addresses, and store namespaces
//! - [`identity`] - Users, credentials, and session classification
//! - [`error`] - Provider error codes and their suppression rules
//! - [`ports`] - Capability traits for the identity provider and data store
//! - [`controller`] - Session/view controller (pure transitions + async driver)
//! - [`catalog`] - Read-only mirror of the app collection
//! - [`form`] - Admin form draft and icon encoding
//! - [`publish`] - Admin write operations against the data store
//! - [`notice`] - User-facing advisory and blocking messages

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod controller;
pub mod error;
pub mod form;
pub mod identity;
pub mod notice;
pub mod ports;
pub mod publish;
pub mod types;

pub use catalog::Catalog;
pub use controller::{Controller, ControllerState, Effect, Event, ViewState};
pub use error::{ProviderError, ProviderErrorCode};
pub use form::{AdminForm, FormError, MAX_ICON_BYTES, Submission};
pub use identity::{AdminEmail, Credential, Session, User};
pub use notice::{Notice, NoticeKind};
pub use ports::{DataStore, IdentityProvider, SnapshotStream};
pub use publish::{Publisher, Saved};
pub use types::*;
