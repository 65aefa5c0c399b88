//! Capability traits for the hosted services.
//!
//! Both traits are object safe so the server can hold them as
//! `Arc<dyn IdentityProvider>` / `Arc<dyn DataStore>` and tests can swap in
//! fakes.

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::error::ProviderError;
use crate::identity::Credential;
use crate::types::{AppFields, AppId, CollectionPath, NewApp};

/// Stream of full collection snapshots.
///
/// Each item is the complete JSON value at the subscribed path (`Null` when
/// the collection is empty). The stream ends after yielding an error.
pub type SnapshotStream = BoxStream<'static, Result<serde_json::Value, ProviderError>>;

/// Hosted authentication service.
///
/// Every successful sign-in yields a fresh [`Credential`]; callers treat that
/// as a "current user changed" notification.
pub trait IdentityProvider: Send + Sync {
    /// Create or resume an anonymous guest identity.
    fn sign_in_anonymously(&self) -> BoxFuture<'_, Result<Credential, ProviderError>>;

    /// Exchange a pre-provisioned one-time token for an identity.
    fn sign_in_with_custom_token<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<Credential, ProviderError>>;

    /// Exchange a federated (Google) ID token for an identity.
    fn sign_in_with_federated<'a>(
        &'a self,
        id_token: &'a str,
    ) -> BoxFuture<'a, Result<Credential, ProviderError>>;

    /// End the given identity.
    fn sign_out<'a>(&'a self, credential: &'a Credential)
    -> BoxFuture<'a, Result<(), ProviderError>>;
}

/// Hosted realtime key/value store holding the app collection.
pub trait DataStore: Send + Sync {
    /// Subscribe to the collection and receive a full snapshot on every change.
    fn subscribe<'a>(
        &'a self,
        path: &'a CollectionPath,
        auth: Option<&'a Credential>,
    ) -> BoxFuture<'a, Result<SnapshotStream, ProviderError>>;

    /// Append a new entry, returning the key the store assigned.
    fn push<'a>(
        &'a self,
        path: &'a CollectionPath,
        app: &'a NewApp,
        auth: Option<&'a Credential>,
    ) -> BoxFuture<'a, Result<AppId, ProviderError>>;

    /// Patch the editable fields of an existing entry.
    fn update<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a AppId,
        fields: &'a AppFields,
        auth: Option<&'a Credential>,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Delete an entry.
    fn remove<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a AppId,
        auth: Option<&'a Credential>,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;
}
