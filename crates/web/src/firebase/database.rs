//! Realtime Database REST client.

use std::sync::Arc;
use std::time::Duration;

use apphub_core::{
    AppFields, AppId, CollectionPath, Credential, DataStore, InvalidKey, NewApp, ProviderError,
    ProviderErrorCode, SnapshotStream,
};
use async_stream::stream;
use futures::StreamExt;
use futures::future::BoxFuture;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::FirebaseError;
use super::sse::{self, StreamMessage};
use crate::config::FirebaseConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Realtime Database API client.
#[derive(Clone)]
pub struct RealtimeDatabaseClient {
    inner: Arc<RealtimeDatabaseClientInner>,
}

struct RealtimeDatabaseClientInner {
    /// Requests with a timeout.
    client: reqwest::Client,
    /// Long-lived event streams; no overall timeout.
    streaming: reqwest::Client,
    root: Url,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

impl RealtimeDatabaseClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP clients fail to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, FirebaseError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let streaming = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(RealtimeDatabaseClientInner {
                client,
                streaming,
                root: config.database_url.clone(),
            }),
        })
    }

    /// URL of `<path>.json`, authenticated with the credential's ID token.
    ///
    /// Each path segment is percent-encoded, so a key can never leave its
    /// segment or reach the query string.
    fn location_url(&self, path: &str, auth: Option<&Credential>) -> Result<Url, FirebaseError> {
        let mut url = self.inner.root.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            segments.pop_if_empty();
            let mut parts = path.split('/').peekable();
            while let Some(part) = parts.next() {
                if parts.peek().is_some() {
                    segments.push(part);
                } else {
                    segments.push(&format!("{part}.json"));
                }
            }
        }
        if let Some(credential) = auth {
            url.query_pairs_mut().append_pair("auth", &credential.id_token);
        }
        Ok(url)
    }

    /// Append a child with a generated key.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected by rules.
    #[instrument(skip(self, value, auth), fields(path = %path))]
    pub async fn post<B: serde::Serialize + Sync>(
        &self,
        path: &str,
        value: &B,
        auth: Option<&Credential>,
    ) -> Result<String, FirebaseError> {
        let url = self.location_url(path, auth)?;
        let response = self.inner.client.post(url).json(value).send().await?;
        let created: PushResponse = Self::handle_response(response).await?;
        Ok(created.name)
    }

    /// Merge the given children into a location.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected by rules.
    #[instrument(skip(self, value, auth), fields(path = %path))]
    pub async fn patch<B: serde::Serialize + Sync>(
        &self,
        path: &str,
        value: &B,
        auth: Option<&Credential>,
    ) -> Result<(), FirebaseError> {
        let url = self.location_url(path, auth)?;
        let response = self.inner.client.patch(url).json(value).send().await?;
        let _: Value = Self::handle_response(response).await?;
        Ok(())
    }

    /// Delete a location.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected by rules.
    #[instrument(skip(self, auth), fields(path = %path))]
    pub async fn delete(&self, path: &str, auth: Option<&Credential>) -> Result<(), FirebaseError> {
        let url = self.location_url(path, auth)?;
        let response = self.inner.client.delete(url).send().await?;
        let _: Value = Self::handle_response(response).await?;
        Ok(())
    }

    /// Open an event stream on a location.
    ///
    /// Each item is the full value at the location after a change. The
    /// stream ends after yielding an error (`cancel`, `auth_revoked`, or a
    /// transport failure).
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be opened.
    #[instrument(skip(self, auth), fields(path = %path))]
    pub async fn listen(
        &self,
        path: &str,
        auth: Option<&Credential>,
    ) -> Result<SnapshotStream, FirebaseError> {
        let url = self.location_url(path, auth)?;
        let response = self
            .inner
            .streaming
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::parse_error(response).await);
        }
        debug!("Event stream opened");

        Ok(stream! {
            let mut tree = Value::Null;
            let mut pending = Vec::new();
            let mut buffer = String::new();
            let mut bytes = std::pin::pin!(response.bytes_stream());

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(ProviderError::from(FirebaseError::Http(e)));
                        return;
                    }
                };
                if let Err(e) = sse::push_chunk(&mut pending, &mut buffer, &chunk) {
                    yield Err(ProviderError::from(e));
                    return;
                }

                while let Some(block) = sse::extract_event(&mut buffer) {
                    let Some(event) = sse::parse_event(&block) else {
                        continue;
                    };
                    match sse::decode(&event) {
                        Ok(Some(StreamMessage::Cancel(reason))) => {
                            warn!(reason = %reason, "Event stream cancelled");
                            yield Err(ProviderError::from(FirebaseError::Cancelled(reason)));
                            return;
                        }
                        Ok(Some(StreamMessage::AuthRevoked)) => {
                            debug!("Event stream credential revoked");
                            yield Err(ProviderError::from(FirebaseError::AuthRevoked));
                            return;
                        }
                        Ok(Some(message)) => {
                            if sse::apply(&mut tree, message) {
                                yield Ok(tree.clone());
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(ProviderError::from(e));
                            return;
                        }
                    }
                }
            }
            debug!("Event stream closed by server");
        }
        .boxed())
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FirebaseError> {
        if response.status().is_success() {
            let text = response.text().await?;
            return serde_json::from_str(&text)
                .map_err(|e| FirebaseError::Parse(format!("Failed to parse response: {e}")));
        }
        Err(Self::parse_error(response).await)
    }

    /// Error bodies look like `{"error": "Permission denied"}`.
    async fn parse_error(response: reqwest::Response) -> FirebaseError {
        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => {
                let message = serde_json::from_str::<ErrorResponse>(&body)
                    .map(|parsed| parsed.error)
                    .unwrap_or_else(|_| format!("HTTP {status}"));
                FirebaseError::Database { status, message }
            }
            Err(e) => FirebaseError::Http(e),
        }
    }
}

fn invalid_key(error: InvalidKey) -> ProviderError {
    ProviderError::new(ProviderErrorCode::Malformed, error.to_string())
}

impl DataStore for RealtimeDatabaseClient {
    fn subscribe<'a>(
        &'a self,
        path: &'a CollectionPath,
        auth: Option<&'a Credential>,
    ) -> BoxFuture<'a, Result<SnapshotStream, ProviderError>> {
        Box::pin(async move {
            self.listen(&path.collection(), auth)
                .await
                .map_err(ProviderError::from)
        })
    }

    fn push<'a>(
        &'a self,
        path: &'a CollectionPath,
        app: &'a NewApp,
        auth: Option<&'a Credential>,
    ) -> BoxFuture<'a, Result<AppId, ProviderError>> {
        Box::pin(async move {
            self.post(&path.collection(), app, auth)
                .await
                .map(AppId::new)
                .map_err(ProviderError::from)
        })
    }

    fn update<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a AppId,
        fields: &'a AppFields,
        auth: Option<&'a Credential>,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let entry = path.entry(id.as_str()).map_err(invalid_key)?;
            self.patch(&entry, fields, auth)
                .await
                .map_err(ProviderError::from)
        })
    }

    fn remove<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a AppId,
        auth: Option<&'a Credential>,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let entry = path.entry(id.as_str()).map_err(invalid_key)?;
            self.delete(&entry, auth)
                .await
                .map_err(ProviderError::from)
        })
    }
}
