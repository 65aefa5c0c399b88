//! Admin dashboard and catalog writes.
//!
//! Writes never touch the local catalog; the list changes when the store's
//! next snapshot arrives. Failures are queued as notices on the dashboard.

use apphub_core::{AdminForm, AppId, AppRecord, MAX_ICON_BYTES, Notice, Publisher, ViewState};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, State},
    response::Redirect,
};
use chrono::Utc;
use tracing::{debug, instrument};

use crate::error::{AppError, Result};
use crate::middleware::{ClientState, RequireAdmin};
use crate::state::AppState;

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin.html")]
pub struct AdminTemplate {
    pub site_name: String,
    pub admin_email: String,
    pub apps: Vec<AppRecord>,
    pub loading: bool,
    pub notices: Vec<Notice>,
    pub form: AdminForm,
    pub max_icon_kb: usize,
}

/// Text fields and icon posted by the admin form.
#[derive(Debug, Default)]
struct AppUpload {
    name: Option<String>,
    description: Option<String>,
    url: Option<String>,
    category: Option<String>,
    icon: Option<IconUpload>,
}

#[derive(Debug)]
struct IconUpload {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

impl AppUpload {
    async fn read(multipart: &mut Multipart) -> Result<Self> {
        let mut upload = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "icon" {
                let content_type = field.content_type().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                // An empty file part means no new icon was chosen.
                if !bytes.is_empty() {
                    upload.icon = Some(IconUpload {
                        bytes: bytes.to_vec(),
                        content_type,
                    });
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            match name.as_str() {
                "name" => upload.name = Some(value),
                "description" => upload.description = Some(value),
                "url" => upload.url = Some(value),
                "category" => upload.category = Some(value),
                _ => {}
            }
        }

        Ok(upload)
    }

    /// Copy the posted text fields into the draft.
    fn apply_text(&mut self, form: &mut AdminForm) {
        let fields = &mut form.fields;
        for (target, value) in [
            (&mut fields.name, self.name.take()),
            (&mut fields.description, self.description.take()),
            (&mut fields.url, self.url.take()),
            (&mut fields.category, self.category.take()),
        ] {
            if let Some(value) = value {
                *target = value;
            }
        }
    }
}

/// Display the dashboard.
#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(mut client): RequireAdmin,
) -> Result<AdminTemplate> {
    client.navigate(&state, ViewState::Admin);
    let notices = client.state.controller.take_notices();
    client.save().await?;

    let admin_email = client
        .state
        .credential
        .as_ref()
        .and_then(|c| c.user.email.clone())
        .unwrap_or_else(|| state.admin_email().to_string());

    let catalog = state.catalog().read().await;
    Ok(AdminTemplate {
        site_name: state.config().site_name.clone(),
        admin_email,
        apps: catalog.apps().to_vec(),
        loading: catalog.is_loading(),
        notices,
        form: client.state.form.clone(),
        max_icon_kb: MAX_ICON_BYTES / 1000,
    })
}

/// Save the draft as a new record or as an update of the record being
/// edited.
///
/// An oversized icon aborts the save before any store call; the posted text
/// is kept in the draft.
#[instrument(skip_all)]
pub async fn save_app(
    State(state): State<AppState>,
    RequireAdmin(mut client): RequireAdmin,
    mut multipart: Multipart,
) -> Result<Redirect> {
    let mut upload = AppUpload::read(&mut multipart).await?;
    let ClientState {
        controller,
        credential,
        form,
        ..
    } = &mut client.state;

    upload.apply_text(form);

    let icon_accepted = match &upload.icon {
        Some(icon) => match form.attach_icon(&icon.bytes, icon.content_type.as_deref()) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Icon rejected");
                controller.push_notice(Notice::blocking(e.to_string()));
                false
            }
        },
        None => true,
    };

    if icon_accepted {
        let publisher = Publisher::new(state.store(), state.collection());
        if let Err(notice) = publisher.save(form, credential.as_ref(), Utc::now()).await {
            controller.push_notice(notice);
        }
    }

    client.save().await?;
    Ok(Redirect::to("/admin"))
}

/// Discard the draft.
#[instrument(skip_all)]
pub async fn cancel_edit(RequireAdmin(mut client): RequireAdmin) -> Result<Redirect> {
    client.state.form.cancel();
    client.save().await?;
    Ok(Redirect::to("/admin"))
}

/// Load a mirrored record into the draft.
#[instrument(skip_all, fields(id = %id))]
pub async fn edit_app(
    State(state): State<AppState>,
    RequireAdmin(mut client): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let id = AppId::new(id);
    {
        let catalog = state.catalog().read().await;
        let record = catalog
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("app {id}")))?;
        client.state.form.begin_edit(record);
    }

    client.save().await?;
    Ok(Redirect::to("/admin"))
}

/// Delete a mirrored record.
#[instrument(skip_all, fields(id = %id))]
pub async fn delete_app(
    State(state): State<AppState>,
    RequireAdmin(mut client): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let id = AppId::new(id);
    if state.catalog().read().await.get(&id).is_none() {
        return Err(AppError::NotFound(format!("app {id}")));
    }

    let publisher = Publisher::new(state.store(), state.collection());

    match publisher.delete(&id, client.state.credential.as_ref()).await {
        Ok(()) => {
            let editing_deleted = client
                .state
                .form
                .editing
                .as_ref()
                .is_some_and(|record| record.id == id);
            if editing_deleted {
                client.state.form.cancel();
            }
        }
        Err(notice) => client.state.controller.push_notice(notice),
    }

    client.save().await?;
    Ok(Redirect::to("/admin"))
}
