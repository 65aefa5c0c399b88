//! Public catalog.

use apphub_core::{AppRecord, Notice, ViewState};
use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::ClientSession;
use crate::state::AppState;

/// Catalog page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub site_name: String,
    pub apps: Vec<AppRecord>,
    pub loading: bool,
    pub advisory: Option<String>,
    pub notices: Vec<Notice>,
    pub is_admin: bool,
}

/// Display the catalog.
///
/// The first request of a visitor establishes their identity.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, mut client: ClientSession) -> Result<HomeTemplate> {
    client.ensure_identity(&state).await;
    client.navigate(&state, ViewState::Home);
    let notices = client.state.controller.take_notices();
    client.save().await?;

    let catalog = state.catalog().read().await;
    Ok(HomeTemplate {
        site_name: state.config().site_name.clone(),
        apps: catalog.apps().to_vec(),
        loading: catalog.is_loading(),
        advisory: client.state.controller.advisory.clone(),
        notices,
        is_admin: client.state.controller.is_admin(),
    })
}
