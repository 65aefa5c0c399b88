//! Background task mirroring the app collection into the shared catalog.
//!
//! One task per server. It signs in with its own identity (initial token,
//! then anonymous), subscribes to the collection, and replaces the catalog
//! with every snapshot. The task lives as long as its [`SyncGuard`].

use std::sync::Arc;
use std::time::Duration;

use apphub_core::{
    Catalog, CollectionPath, Credential, DataStore, IdentityProvider, ProviderError,
    ProviderErrorCode, SnapshotStream,
};
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Consecutive credential revocations tolerated without a snapshot in between.
const MAX_RESUBSCRIBES: u32 = 3;

/// Owns the running sync task; dropping it aborts the subscription.
#[derive(Debug)]
pub struct SyncGuard {
    handle: JoinHandle<()>,
}

impl SyncGuard {
    /// Whether the task has stopped on its own.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// How a subscription ended.
struct StreamEnd {
    delivered: usize,
    error: Option<ProviderError>,
}

/// Keeps a [`Catalog`] equal to the store's latest snapshot.
pub struct CatalogSync {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DataStore>,
    path: CollectionPath,
    catalog: Arc<RwLock<Catalog>>,
    initial_token: Option<SecretString>,
    grace: Duration,
}

impl CatalogSync {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DataStore>,
        path: CollectionPath,
        catalog: Arc<RwLock<Catalog>>,
    ) -> Self {
        Self {
            identity,
            store,
            path,
            catalog,
            initial_token: None,
            grace: Duration::from_secs(2),
        }
    }

    /// Token tried before anonymous sign-in.
    #[must_use]
    pub fn with_initial_token(mut self, token: Option<SecretString>) -> Self {
        self.initial_token = token;
        self
    }

    /// Delay after sign-in at which the loading indicator is cleared even
    /// without a snapshot.
    #[must_use]
    pub const fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run on the tokio runtime until the guard is dropped.
    #[must_use]
    pub fn spawn(self) -> SyncGuard {
        SyncGuard {
            handle: tokio::spawn(self.run()),
        }
    }

    #[instrument(skip_all, fields(path = %self.path))]
    async fn run(self) {
        let credential = self.sign_in().await;
        tokio::join!(self.follow(credential), self.grace_timer());
        debug!("Catalog sync stopped");
    }

    async fn grace_timer(&self) {
        tokio::time::sleep(self.grace).await;
        let mut catalog = self.catalog.write().await;
        if catalog.is_loading() {
            debug!("Startup grace elapsed before first snapshot");
            catalog.finish_loading();
        }
    }

    /// Subscribe, and resubscribe with a fresh identity when the store
    /// revokes the current one.
    async fn follow(&self, mut credential: Option<Credential>) {
        let mut revocations = 0;

        loop {
            let end = match self.store.subscribe(&self.path, credential.as_ref()).await {
                Ok(stream) => self.consume(stream).await,
                Err(e) => StreamEnd {
                    delivered: 0,
                    error: Some(e),
                },
            };

            if end.delivered > 0 {
                revocations = 0;
            }

            match end.error {
                Some(e) if e.code == ProviderErrorCode::InvalidCredential => {
                    revocations += 1;
                    if revocations > MAX_RESUBSCRIBES {
                        warn!(error = %e, "Credential revoked repeatedly; catalog sync stopped");
                        break;
                    }
                    info!(attempt = revocations, "Credential revoked; resubscribing");
                    credential = self.sign_in().await;
                }
                Some(e) => {
                    warn!(error = %e, "Catalog subscription failed");
                    break;
                }
                None => {
                    info!("Catalog subscription closed");
                    break;
                }
            }
        }

        self.catalog.write().await.finish_loading();
    }

    async fn consume(&self, mut stream: SnapshotStream) -> StreamEnd {
        let mut delivered = 0;

        while let Some(item) = stream.next().await {
            match item {
                Ok(snapshot) => {
                    let mut catalog = self.catalog.write().await;
                    let skipped = catalog.apply_snapshot(&snapshot);
                    delivered += 1;
                    if skipped > 0 {
                        warn!(skipped, "Skipped malformed catalog entries");
                    }
                    debug!(
                        apps = catalog.apps().len(),
                        revision = catalog.revision(),
                        "Catalog snapshot applied"
                    );
                }
                Err(e) => {
                    return StreamEnd {
                        delivered,
                        error: Some(e),
                    };
                }
            }
        }

        StreamEnd {
            delivered,
            error: None,
        }
    }

    /// Token first, then anonymous. `None` subscribes without auth.
    async fn sign_in(&self) -> Option<Credential> {
        if let Some(token) = &self.initial_token {
            match self
                .identity
                .sign_in_with_custom_token(token.expose_secret())
                .await
            {
                Ok(credential) => return Some(credential),
                Err(e) => warn!(error = %e, "Sync token sign-in skipped"),
            }
        }

        match self.identity.sign_in_anonymously().await {
            Ok(credential) => {
                debug!(uid = %credential.user.uid, "Sync identity established");
                Some(credential)
            }
            Err(e) if e.is_suppressed() => {
                debug!(error = %e, "Anonymous sign-in unavailable; reading without auth");
                None
            }
            Err(e) => {
                warn!(error = %e, "Sync sign-in failed; reading without auth");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use apphub_core::{AppFields, AppId, NewApp, User};
    use futures::future::BoxFuture;
    use serde_json::{Value, json};

    use super::*;

    struct FakeIdentity {
        anonymous_calls: AtomicUsize,
    }

    impl FakeIdentity {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                anonymous_calls: AtomicUsize::new(0),
            })
        }
    }

    impl IdentityProvider for FakeIdentity {
        fn sign_in_anonymously(&self) -> BoxFuture<'_, Result<Credential, ProviderError>> {
            let n = self.anonymous_calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                Ok(Credential::new(
                    User::anonymous(format!("sync-{n}")),
                    format!("id-{n}"),
                    "refresh",
                ))
            })
        }

        fn sign_in_with_custom_token<'a>(
            &'a self,
            _token: &'a str,
        ) -> BoxFuture<'a, Result<Credential, ProviderError>> {
            Box::pin(async {
                Err(ProviderError::new(
                    ProviderErrorCode::InvalidCredential,
                    "INVALID_CUSTOM_TOKEN",
                ))
            })
        }

        fn sign_in_with_federated<'a>(
            &'a self,
            _id_token: &'a str,
        ) -> BoxFuture<'a, Result<Credential, ProviderError>> {
            Box::pin(async { Err(ProviderError::network("unused")) })
        }

        fn sign_out<'a>(
            &'a self,
            _credential: &'a Credential,
        ) -> BoxFuture<'a, Result<(), ProviderError>> {
            Box::pin(async { Ok(()) })
        }
    }

    type Script = Vec<Result<Value, ProviderError>>;

    /// Serves one scripted stream per subscribe call; afterwards a stream
    /// that never yields.
    struct ScriptedStore {
        scripts: Mutex<VecDeque<Script>>,
        subscriptions: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedStore {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                subscriptions: Mutex::new(Vec::new()),
            })
        }

        fn subscription_tokens(&self) -> Vec<Option<String>> {
            self.subscriptions.lock().unwrap().clone()
        }
    }

    impl DataStore for ScriptedStore {
        fn subscribe<'a>(
            &'a self,
            _path: &'a CollectionPath,
            auth: Option<&'a Credential>,
        ) -> BoxFuture<'a, Result<SnapshotStream, ProviderError>> {
            self.subscriptions
                .lock()
                .unwrap()
                .push(auth.map(|c| c.id_token.clone()));
            let script = self.scripts.lock().unwrap().pop_front();
            Box::pin(async move {
                Ok(match script {
                    Some(items) => futures::stream::iter(items).boxed(),
                    None => futures::stream::pending().boxed(),
                })
            })
        }

        fn push<'a>(
            &'a self,
            _path: &'a CollectionPath,
            _app: &'a NewApp,
            _auth: Option<&'a Credential>,
        ) -> BoxFuture<'a, Result<AppId, ProviderError>> {
            Box::pin(async { Err(ProviderError::network("unused")) })
        }

        fn update<'a>(
            &'a self,
            _path: &'a CollectionPath,
            _id: &'a AppId,
            _fields: &'a AppFields,
            _auth: Option<&'a Credential>,
        ) -> BoxFuture<'a, Result<(), ProviderError>> {
            Box::pin(async { Err(ProviderError::network("unused")) })
        }

        fn remove<'a>(
            &'a self,
            _path: &'a CollectionPath,
            _id: &'a AppId,
            _auth: Option<&'a Credential>,
        ) -> BoxFuture<'a, Result<(), ProviderError>> {
            Box::pin(async { Err(ProviderError::network("unused")) })
        }
    }

    fn revoked() -> ProviderError {
        ProviderError::new(ProviderErrorCode::InvalidCredential, "Credential revoked")
    }

    fn sync(
        identity: Arc<FakeIdentity>,
        store: Arc<ScriptedStore>,
        catalog: Arc<RwLock<Catalog>>,
    ) -> CatalogSync {
        CatalogSync::new(identity, store, CollectionPath::default(), catalog)
            .with_grace(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_catalog_follows_latest_snapshot() {
        let snapshots = vec![
            Ok(json!({"a": {"name": "A", "createdAt": "2024-01-01T00:00:00Z"}})),
            Ok(json!({
                "a": {"name": "A", "createdAt": "2024-01-01T00:00:00Z"},
                "b": {"name": "B", "createdAt": "2024-02-01T00:00:00Z"}
            })),
            Ok(json!({"b": {"name": "B", "createdAt": "2024-02-01T00:00:00Z"}})),
        ];
        let store = ScriptedStore::new(vec![snapshots]);
        let catalog = Arc::new(RwLock::new(Catalog::default()));

        sync(FakeIdentity::new(), store.clone(), catalog.clone())
            .follow(Some(Credential::new(User::anonymous("s"), "tok", "r")))
            .await;

        let catalog = catalog.read().await;
        let names: Vec<&str> = catalog.apps().iter().map(|a| a.fields.name.as_str()).collect();
        assert_eq!(names, vec!["B"]);
        assert_eq!(catalog.revision(), 3);
        assert!(!catalog.is_loading());
        assert_eq!(store.subscription_tokens(), vec![Some("tok".to_string())]);
    }

    #[tokio::test]
    async fn test_subscription_error_keeps_last_list() {
        let store = ScriptedStore::new(vec![vec![
            Ok(json!({"a": {"name": "A"}})),
            Err(ProviderError::permission_denied("Permission denied")),
        ]]);
        let catalog = Arc::new(RwLock::new(Catalog::default()));

        sync(FakeIdentity::new(), store, catalog.clone())
            .follow(None)
            .await;

        let catalog = catalog.read().await;
        assert_eq!(catalog.apps().len(), 1);
        assert!(!catalog.is_loading());
    }

    #[tokio::test]
    async fn test_revoked_credential_resubscribes_with_new_identity() {
        let identity = FakeIdentity::new();
        let store = ScriptedStore::new(vec![
            vec![Ok(json!({"a": {"name": "A"}})), Err(revoked())],
            vec![Ok(json!({"b": {"name": "B"}}))],
        ]);
        let catalog = Arc::new(RwLock::new(Catalog::default()));

        let task = sync(identity.clone(), store.clone(), catalog.clone());
        let first = task.sign_in().await;
        task.follow(first).await;

        assert_eq!(
            store.subscription_tokens(),
            vec![Some("id-0".to_string()), Some("id-1".to_string())]
        );
        assert_eq!(identity.anonymous_calls.load(Ordering::SeqCst), 2);
        let catalog = catalog.read().await;
        assert_eq!(catalog.apps()[0].fields.name, "B");
    }

    #[tokio::test]
    async fn test_repeated_revocation_gives_up() {
        let store = ScriptedStore::new(vec![
            vec![Err(revoked())],
            vec![Err(revoked())],
            vec![Err(revoked())],
            vec![Err(revoked())],
            vec![Ok(json!({"never": {"name": "N"}}))],
        ]);
        let catalog = Arc::new(RwLock::new(Catalog::default()));

        sync(FakeIdentity::new(), store.clone(), catalog.clone())
            .follow(None)
            .await;

        assert_eq!(store.subscription_tokens().len(), 4);
        let catalog = catalog.read().await;
        assert!(catalog.apps().is_empty());
        assert!(!catalog.is_loading());
    }

    #[tokio::test]
    async fn test_grace_clears_loading_without_snapshot() {
        let store = ScriptedStore::new(Vec::new());
        let catalog = Arc::new(RwLock::new(Catalog::default()));

        let _guard = sync(FakeIdentity::new(), store, catalog.clone())
            .with_grace(Duration::from_millis(10))
            .spawn();

        for _ in 0..100 {
            if !catalog.read().await.is_loading() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!catalog.read().await.is_loading());
        assert_eq!(catalog.read().await.revision(), 0);
    }

    #[tokio::test]
    async fn test_dropping_guard_stops_task() {
        let store = ScriptedStore::new(Vec::new());
        let catalog = Arc::new(RwLock::new(Catalog::default()));

        let guard = sync(FakeIdentity::new(), store.clone(), catalog.clone()).spawn();
        for _ in 0..100 {
            if !store.subscription_tokens().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!guard.is_finished());
        drop(guard);

        for _ in 0..100 {
            if Arc::strong_count(&catalog) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(Arc::strong_count(&catalog), 1);
    }
}
