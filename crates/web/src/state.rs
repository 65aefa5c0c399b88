//! Application state shared across handlers.

use std::sync::Arc;

use apphub_core::{AdminEmail, Catalog, CollectionPath, DataStore, IdentityProvider};
use tokio::sync::RwLock;

use crate::config::WebConfig;
use crate::firebase::{FirebaseError, IdentityToolkitClient, RealtimeDatabaseClient};
use crate::sync::{CatalogSync, SyncGuard};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The providers are trait objects so tests can
/// run the router against in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: WebConfig,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DataStore>,
    collection: CollectionPath,
    catalog: Arc<RwLock<Catalog>>,
}

impl AppState {
    /// Create state around the given providers.
    #[must_use]
    pub fn new(
        config: WebConfig,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DataStore>,
    ) -> Self {
        let collection = CollectionPath::for_app(&config.app_id);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                identity,
                store,
                collection,
                catalog: Arc::new(RwLock::new(Catalog::default())),
            }),
        }
    }

    /// Create state backed by the Firebase REST clients.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn from_config(config: WebConfig) -> Result<Self, FirebaseError> {
        let identity = IdentityToolkitClient::new(&config.firebase, &config.base_url)?;
        let store = RealtimeDatabaseClient::new(&config.firebase)?;
        Ok(Self::new(config, Arc::new(identity), Arc::new(store)))
    }

    #[must_use]
    pub fn config(&self) -> &WebConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> &dyn DataStore {
        self.inner.store.as_ref()
    }

    /// Location of the app collection for the configured app id.
    #[must_use]
    pub fn collection(&self) -> &CollectionPath {
        &self.inner.collection
    }

    #[must_use]
    pub fn admin_email(&self) -> &AdminEmail {
        &self.inner.config.admin_email
    }

    /// The mirrored catalog, written only by the sync task.
    #[must_use]
    pub fn catalog(&self) -> &Arc<RwLock<Catalog>> {
        &self.inner.catalog
    }

    /// Start mirroring the collection. Keep the guard alive for as long as
    /// the catalog should stay current.
    #[must_use]
    pub fn start_catalog_sync(&self) -> SyncGuard {
        CatalogSync::new(
            Arc::clone(&self.inner.identity),
            Arc::clone(&self.inner.store),
            self.inner.collection.clone(),
            Arc::clone(&self.inner.catalog),
        )
        .with_initial_token(self.inner.config.initial_auth_token.clone())
        .with_grace(self.inner.config.startup_grace)
        .spawn()
    }
}
