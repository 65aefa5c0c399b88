//! Per-visitor client state and the extractors that load it.
//!
//! Every request is one UI event against the visitor's [`ClientState`]: the
//! handler loads it from the session, drives a [`Controller`] over it, and
//! saves it back before responding.

use apphub_core::{AdminForm, Controller, ControllerState, Credential, ViewState};
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::debug;

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Session key under which [`ClientState`] is stored.
pub const CLIENT_STATE_KEY: &str = "client";

/// What one visitor's browser tab would hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientState {
    pub controller: ControllerState,
    pub credential: Option<Credential>,
    pub form: AdminForm,
    /// Whether the startup sign-in chain has run for this visitor.
    pub initialized: bool,
}

/// Extractor for the visitor's session and client state.
pub struct ClientSession {
    session: Session,
    pub state: ClientState,
}

impl<S> FromRequestParts<S> for ClientSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let state = session
            .get::<ClientState>(CLIENT_STATE_KEY)
            .await?
            .unwrap_or_default();

        Ok(Self { session, state })
    }
}

impl ClientSession {
    /// Take the controller state out for one event. Pair with
    /// [`ClientSession::restore`].
    pub fn controller<'a>(&mut self, app: &'a AppState) -> Controller<'a> {
        Controller::new(
            app.identity(),
            app.admin_email(),
            std::mem::take(&mut self.state.controller),
            self.state.credential.take(),
        )
    }

    /// Put the controller's state and credential back.
    pub fn restore(&mut self, controller: Controller<'_>) {
        let (state, credential) = controller.into_parts();
        self.state.controller = state;
        self.state.credential = credential;
    }

    /// Run the startup sign-in chain on the visitor's first request.
    pub async fn ensure_identity(&mut self, app: &AppState) {
        if self.state.initialized {
            return;
        }

        let token = app
            .config()
            .initial_auth_token
            .as_ref()
            .map(|token| token.expose_secret().to_string());

        let mut controller = self.controller(app);
        controller.establish_initial_identity(token.as_deref()).await;
        self.restore(controller);
        self.state.initialized = true;
        debug!(session = ?self.state.controller.session, "Visitor identity established");
    }

    /// Ask for a view; returns the view actually shown.
    pub fn navigate(&mut self, app: &AppState, view: ViewState) -> ViewState {
        let mut controller = self.controller(app);
        controller.navigate(view);
        self.restore(controller);
        self.state.controller.view
    }

    /// Issue a new session id, keeping the data. Called when the visitor
    /// gains admin rights.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store rejects the change.
    pub async fn cycle_id(&self) -> Result<(), AppError> {
        self.session.cycle_id().await?;
        Ok(())
    }

    /// Persist the client state.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store rejects the write.
    pub async fn save(&self) -> Result<(), AppError> {
        self.session.insert(CLIENT_STATE_KEY, &self.state).await?;
        Ok(())
    }
}

/// Extractor that admits only the configured admin.
///
/// Anyone else is sent to the login view.
pub struct RequireAdmin(pub ClientSession);

/// Rejection for [`RequireAdmin`].
pub enum AdminRejection {
    RedirectToLogin,
    Failed(AppError),
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::Failed(e) => e.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AdminRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let client = ClientSession::from_request_parts(parts, state)
            .await
            .map_err(AdminRejection::Failed)?;

        if !client.state.controller.is_admin() {
            return Err(AdminRejection::RedirectToLogin);
        }

        if let Some(credential) = &client.state.credential {
            set_sentry_user(&credential.user.uid, credential.user.email.as_deref());
        }

        Ok(Self(client))
    }
}
