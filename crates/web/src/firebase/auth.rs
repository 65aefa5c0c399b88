//! Identity Toolkit REST client.
//!
//! Sign-in methods used:
//!
//! - `accounts:signUp` with no email/password creates an anonymous user
//! - `accounts:signInWithCustomToken` followed by `accounts:lookup` for the
//!   user profile
//! - `accounts:signInWithIdp` exchanges a Google ID token
//!
//! Sign-out has no REST counterpart; ID tokens are short-lived bearer tokens,
//! so dropping the credential is the sign-out.

use std::sync::Arc;
use std::time::Duration;

use apphub_core::{Credential, IdentityProvider, ProviderError, User};
use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use super::FirebaseError;
use crate::config::FirebaseConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Identity Toolkit API client.
#[derive(Clone)]
pub struct IdentityToolkitClient {
    inner: Arc<IdentityToolkitClientInner>,
}

struct IdentityToolkitClientInner {
    client: reqwest::Client,
    endpoint: Url,
    api_key: SecretString,
    request_uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest {
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomTokenRequest<'a> {
    token: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
    refresh_token: String,
    local_id: Option<String>,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl IdentityToolkitClient {
    /// Create a new client.
    ///
    /// `request_uri` is sent with federated sign-ins and must be a URL the
    /// project accepts (the site's base URL).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &FirebaseConfig, request_uri: &str) -> Result<Self, FirebaseError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            inner: Arc::new(IdentityToolkitClientInner {
                client,
                endpoint: config.auth_endpoint.clone(),
                api_key: config.api_key.clone(),
                request_uri: request_uri.to_string(),
            }),
        })
    }

    /// Create an anonymous user.
    ///
    /// # Errors
    ///
    /// Returns the toolkit error, e.g. `ADMIN_ONLY_OPERATION` when anonymous
    /// sign-in is disabled for the project.
    #[instrument(skip(self))]
    pub async fn sign_up_anonymous(&self) -> Result<Credential, FirebaseError> {
        let response: TokenResponse = self
            .call(
                "signUp",
                &SignUpRequest {
                    return_secure_token: true,
                },
            )
            .await?;

        let uid = response.local_id.clone().unwrap_or_default();
        debug!(uid = %uid, "Anonymous user signed in");
        Ok(Credential::new(
            User::anonymous(uid),
            response.id_token,
            response.refresh_token,
        ))
    }

    /// Exchange a custom token, then look up the resulting user.
    ///
    /// # Errors
    ///
    /// Returns the toolkit error for an invalid token or failed lookup.
    #[instrument(skip_all)]
    pub async fn sign_in_custom_token(&self, token: &str) -> Result<Credential, FirebaseError> {
        let response: TokenResponse = self
            .call(
                "signInWithCustomToken",
                &CustomTokenRequest {
                    token,
                    return_secure_token: true,
                },
            )
            .await?;

        let lookup: LookupResponse = self
            .call(
                "lookup",
                &LookupRequest {
                    id_token: &response.id_token,
                },
            )
            .await?;
        let profile = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| FirebaseError::Parse("lookup returned no user".to_string()))?;

        debug!(uid = %profile.local_id, "Custom token user signed in");
        Ok(Credential::new(
            User {
                uid: profile.local_id,
                email: profile.email,
                email_verified: profile.email_verified,
                is_anonymous: false,
            },
            response.id_token,
            response.refresh_token,
        ))
    }

    /// Exchange a Google ID token.
    ///
    /// # Errors
    ///
    /// Returns the toolkit error, e.g. `INVALID_IDP_RESPONSE`.
    #[instrument(skip_all)]
    pub async fn sign_in_with_google(&self, id_token: &str) -> Result<Credential, FirebaseError> {
        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", id_token)
            .append_pair("providerId", "google.com")
            .finish();

        let response: TokenResponse = self
            .call(
                "signInWithIdp",
                &IdpRequest {
                    post_body,
                    request_uri: &self.inner.request_uri,
                    return_secure_token: true,
                    return_idp_credential: true,
                },
            )
            .await?;

        let uid = response
            .local_id
            .ok_or_else(|| FirebaseError::Parse("signInWithIdp returned no localId".to_string()))?;
        debug!(uid = %uid, "Federated user signed in");
        Ok(Credential::new(
            User {
                uid,
                email: response.email,
                email_verified: response.email_verified,
                is_anonymous: false,
            },
            response.id_token,
            response.refresh_token,
        ))
    }

    fn method_url(&self, method: &str) -> Result<Url, FirebaseError> {
        // "./" keeps the colon in "accounts:x" from being read as a scheme.
        let mut url = self.inner.endpoint.join(&format!("./accounts:{method}"))?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());
        Ok(url)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, FirebaseError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.method_url(method)?;
        let response = self.inner.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&text)
                .map_err(|e| FirebaseError::Parse(format!("Failed to parse {method} response: {e}")));
        }

        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|body| body.error.message)
            .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
        Err(FirebaseError::Identity { message })
    }
}

impl IdentityProvider for IdentityToolkitClient {
    fn sign_in_anonymously(&self) -> BoxFuture<'_, Result<Credential, ProviderError>> {
        Box::pin(async move { self.sign_up_anonymous().await.map_err(ProviderError::from) })
    }

    fn sign_in_with_custom_token<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<Credential, ProviderError>> {
        Box::pin(async move { self.sign_in_custom_token(token).await.map_err(ProviderError::from) })
    }

    fn sign_in_with_federated<'a>(
        &'a self,
        id_token: &'a str,
    ) -> BoxFuture<'a, Result<Credential, ProviderError>> {
        Box::pin(async move { self.sign_in_with_google(id_token).await.map_err(ProviderError::from) })
    }

    fn sign_out<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            debug!(uid = %credential.user.uid, "Signed out locally");
            Ok(())
        })
    }
}
