//! Admin write operations.
//!
//! Each write is a single request. Nothing is applied locally: the mirror
//! only changes when the store's next snapshot arrives. Rejections come back
//! as blocking notices naming the failed action.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::form::{AdminForm, Submission};
use crate::identity::Credential;
use crate::notice::Notice;
use crate::ports::DataStore;
use crate::types::{AppId, CollectionPath};

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Saved {
    Created(AppId),
    Updated(AppId),
}

/// Issues admin writes against the collection.
pub struct Publisher<'a> {
    store: &'a dyn DataStore,
    path: &'a CollectionPath,
}

impl<'a> Publisher<'a> {
    #[must_use]
    pub fn new(store: &'a dyn DataStore, path: &'a CollectionPath) -> Self {
        Self { store, path }
    }

    /// Submit the draft as a create or update, resetting it on success.
    ///
    /// # Errors
    ///
    /// Returns a blocking notice when there is no identity, the draft is
    /// incomplete, or the store rejects the write. The draft is kept.
    #[instrument(skip_all, fields(editing = form.is_editing()))]
    pub async fn save(
        &self,
        form: &mut AdminForm,
        credential: Option<&Credential>,
        now: DateTime<Utc>,
    ) -> Result<Saved, Notice> {
        let Some(credential) = credential else {
            return Err(Notice::blocking("Connection lost."));
        };

        let submission = form
            .submission(now)
            .map_err(|e| Notice::blocking(e.to_string()))?;

        let saved = match submission {
            Submission::Create(app) => self
                .store
                .push(self.path, &app, Some(credential))
                .await
                .map(Saved::Created),
            Submission::Update { id, fields } => self
                .store
                .update(self.path, &id, &fields, Some(credential))
                .await
                .map(|()| Saved::Updated(id)),
        }
        .map_err(|e| {
            warn!(error = %e, "Save rejected by store");
            Notice::blocking(format!("Failed to save (check permissions): {e}"))
        })?;

        info!(result = ?saved, "App saved");
        form.cancel();
        Ok(saved)
    }

    /// Delete an entry.
    ///
    /// # Errors
    ///
    /// Returns a blocking notice when the store rejects the delete.
    #[instrument(skip(self, credential), fields(id = %id))]
    pub async fn delete(&self, id: &AppId, credential: Option<&Credential>) -> Result<(), Notice> {
        self.store
            .remove(self.path, id, credential)
            .await
            .map_err(|e| {
                warn!(error = %e, "Delete rejected by store");
                Notice::blocking(format!("Failed to delete (check permissions): {e}"))
            })?;
        info!("App deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use futures::future::BoxFuture;

    use super::*;
    use crate::error::ProviderError;
    use crate::identity::User;
    use crate::ports::SnapshotStream;
    use crate::types::{AppFields, AppRecord, NewApp};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Push(NewApp),
        Update(AppId, AppFields),
        Remove(AppId),
    }

    #[derive(Default)]
    struct FakeStore {
        calls: Mutex<Vec<Call>>,
        reject: Option<ProviderError>,
    }

    impl FakeStore {
        fn rejecting(error: ProviderError) -> Self {
            Self {
                calls: Mutex::default(),
                reject: Some(error),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push(call);
            self.reject.clone().map_or(Ok(()), Err)
        }
    }

    impl DataStore for FakeStore {
        fn subscribe<'a>(
            &'a self,
            _path: &'a CollectionPath,
            _auth: Option<&'a Credential>,
        ) -> BoxFuture<'a, Result<SnapshotStream, ProviderError>> {
            Box::pin(async { Err(ProviderError::network("not used")) })
        }

        fn push<'a>(
            &'a self,
            _path: &'a CollectionPath,
            app: &'a NewApp,
            _auth: Option<&'a Credential>,
        ) -> BoxFuture<'a, Result<AppId, ProviderError>> {
            let result = self.record(Call::Push(app.clone()));
            Box::pin(async move { result.map(|()| AppId::new("-Nnew")) })
        }

        fn update<'a>(
            &'a self,
            _path: &'a CollectionPath,
            id: &'a AppId,
            fields: &'a AppFields,
            _auth: Option<&'a Credential>,
        ) -> BoxFuture<'a, Result<(), ProviderError>> {
            let result = self.record(Call::Update(id.clone(), fields.clone()));
            Box::pin(async move { result })
        }

        fn remove<'a>(
            &'a self,
            _path: &'a CollectionPath,
            id: &'a AppId,
            _auth: Option<&'a Credential>,
        ) -> BoxFuture<'a, Result<(), ProviderError>> {
            let result = self.record(Call::Remove(id.clone()));
            Box::pin(async move { result })
        }
    }

    fn admin_credential() -> Credential {
        Credential::new(User::federated("a", "owner@example.com"), "id", "refresh")
    }

    fn draft() -> AdminForm {
        AdminForm {
            fields: AppFields {
                name: "Timer".to_string(),
                description: "Counts down".to_string(),
                url: "https://timer.example.com".to_string(),
                ..AppFields::default()
            },
            editing: None,
        }
    }

    #[tokio::test]
    async fn test_create_pushes_and_resets_form() {
        let store = FakeStore::default();
        let path = CollectionPath::default();
        let publisher = Publisher::new(&store, &path);
        let mut form = draft();
        let now: DateTime<Utc> = "2024-09-09T09:09:09Z".parse().unwrap();

        let saved = publisher
            .save(&mut form, Some(&admin_credential()), now)
            .await
            .unwrap();

        assert_eq!(saved, Saved::Created(AppId::new("-Nnew")));
        assert_eq!(
            store.calls(),
            vec![Call::Push(NewApp {
                fields: draft().fields,
                created_at: now,
            })]
        );
        assert_eq!(form, AdminForm::default());
    }

    #[tokio::test]
    async fn test_unchanged_edit_sends_identical_patch() {
        let store = FakeStore::default();
        let path = CollectionPath::default();
        let publisher = Publisher::new(&store, &path);
        let record = AppRecord {
            id: AppId::new("R"),
            fields: draft().fields,
            created_at: None,
        };
        let mut form = AdminForm::default();
        form.begin_edit(&record);

        let saved = publisher
            .save(&mut form, Some(&admin_credential()), Utc::now())
            .await
            .unwrap();

        assert_eq!(saved, Saved::Updated(AppId::new("R")));
        assert_eq!(
            store.calls(),
            vec![Call::Update(AppId::new("R"), record.fields.clone())]
        );
    }

    #[tokio::test]
    async fn test_rejected_save_keeps_draft_and_names_action() {
        let store = FakeStore::rejecting(ProviderError::permission_denied("Permission denied"));
        let path = CollectionPath::default();
        let publisher = Publisher::new(&store, &path);
        let mut form = draft();

        let notice = publisher
            .save(&mut form, Some(&admin_credential()), Utc::now())
            .await
            .unwrap_err();

        assert!(notice.is_blocking());
        assert_eq!(
            notice.message,
            "Failed to save (check permissions): Permission denied"
        );
        assert_eq!(form, draft());
    }

    #[tokio::test]
    async fn test_save_without_identity_makes_no_call() {
        let store = FakeStore::default();
        let path = CollectionPath::default();
        let publisher = Publisher::new(&store, &path);
        let mut form = draft();

        let notice = publisher.save(&mut form, None, Utc::now()).await.unwrap_err();

        assert_eq!(notice.message, "Connection lost.");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_draft_makes_no_call() {
        let store = FakeStore::default();
        let path = CollectionPath::default();
        let publisher = Publisher::new(&store, &path);
        let mut form = AdminForm::default();

        let notice = publisher
            .save(&mut form, Some(&admin_credential()), Utc::now())
            .await
            .unwrap_err();

        assert_eq!(notice.message, "Name is required");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_issues_remove() {
        let store = FakeStore::default();
        let path = CollectionPath::default();
        let publisher = Publisher::new(&store, &path);

        publisher
            .delete(&AppId::new("X"), Some(&admin_credential()))
            .await
            .unwrap();

        assert_eq!(store.calls(), vec![Call::Remove(AppId::new("X"))]);
    }

    #[tokio::test]
    async fn test_rejected_delete_is_blocking_notice() {
        let store = FakeStore::rejecting(ProviderError::permission_denied("Permission denied"));
        let path = CollectionPath::default();
        let publisher = Publisher::new(&store, &path);

        let notice = publisher
            .delete(&AppId::new("X"), Some(&admin_credential()))
            .await
            .unwrap_err();

        assert_eq!(
            notice.message,
            "Failed to delete (check permissions): Permission denied"
        );
    }
}
