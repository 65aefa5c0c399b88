//! Admin sign-in and logout.
//!
//! The Google sign-in button runs in the browser and hands its ID token to
//! `POST /login/google`; the exchange with the identity provider happens
//! server-side.

use apphub_core::{Notice, ViewState};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::ClientSession;
use crate::state::AppState;

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub site_name: String,
    pub admin_email: String,
    pub google_client_id: Option<String>,
    pub error: Option<String>,
    pub notices: Vec<Notice>,
}

impl LoginTemplate {
    fn new(state: &AppState, client: &mut ClientSession) -> Self {
        Self {
            site_name: state.config().site_name.clone(),
            admin_email: state.admin_email().to_string(),
            google_client_id: state.config().google_client_id.clone(),
            error: client.state.controller.login_error.clone(),
            notices: client.state.controller.take_notices(),
        }
    }
}

/// Form posted by the sign-in button callback.
#[derive(Debug, Deserialize)]
pub struct GoogleCredentialForm {
    pub credential: String,
}

/// Display the sign-in view, or the dashboard for a signed-in admin.
#[instrument(skip_all)]
pub async fn login_page(State(state): State<AppState>, mut client: ClientSession) -> Result<Response> {
    client.ensure_identity(&state).await;
    if client.navigate(&state, ViewState::Login) == ViewState::Admin {
        client.save().await?;
        return Ok(Redirect::to("/admin").into_response());
    }

    let page = LoginTemplate::new(&state, &mut client);
    client.save().await?;
    Ok(page.into_response())
}

/// Exchange a Google ID token for an identity.
///
/// Outcomes:
///
/// - admin account: dashboard
/// - other account: signed out again, home with a notice
/// - failed exchange: login view with the error
#[instrument(skip_all)]
pub async fn google_sign_in(
    State(state): State<AppState>,
    mut client: ClientSession,
    Form(form): Form<GoogleCredentialForm>,
) -> Result<Response> {
    let id_token = form.credential.trim();
    if id_token.is_empty() {
        return Err(AppError::BadRequest("Missing credential".to_string()));
    }

    client.ensure_identity(&state).await;
    let mut controller = client.controller(&state);
    controller.navigate(ViewState::Login);
    controller.sign_in_federated(id_token).await;
    client.restore(controller);

    let response = match client.state.controller.view {
        ViewState::Admin => {
            if let Some(credential) = &client.state.credential {
                set_sentry_user(&credential.user.uid, credential.user.email.as_deref());
            }
            info!("Admin signed in");
            client.cycle_id().await?;
            Redirect::to("/admin").into_response()
        }
        ViewState::Home => Redirect::to("/").into_response(),
        ViewState::Login => LoginTemplate::new(&state, &mut client).into_response(),
    };

    client.save().await?;
    Ok(response)
}

/// Sign out and fall back to a guest identity.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, mut client: ClientSession) -> Result<Redirect> {
    let mut controller = client.controller(&state);
    controller.logout().await;
    client.restore(controller);
    client.state.form.cancel();
    client.save().await?;

    clear_sentry_user();
    info!("Logged out");
    Ok(Redirect::to("/"))
}
