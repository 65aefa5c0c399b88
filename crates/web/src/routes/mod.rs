//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Pages (rate limited: they may create a guest identity)
//! GET  /                         - Public catalog
//! GET  /login                    - Admin sign-in view
//!
//! # Auth (strictly rate limited)
//! POST /login/google             - Google ID token from the sign-in button
//! POST /logout                   - Sign out, back to a guest identity
//!
//! # Admin (admin only, others are sent to /login)
//! GET  /admin                    - Dashboard: form and catalog list
//! POST /admin/apps               - Save the draft (multipart, create or update)
//! POST /admin/apps/cancel        - Discard the draft
//! GET  /admin/apps/{id}/edit     - Load a record into the draft
//! POST /admin/apps/{id}/delete   - Delete a record
//! ```
//!
//! Health checks and static assets are mounted by [`crate::app`].

pub mod admin;
pub mod home;
pub mod login;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::middleware::{page_rate_limiter, sign_in_rate_limiter};
use crate::state::AppState;

/// Largest accepted admin form body. Comfortably above the icon limit so an
/// oversized icon is reported to the admin instead of failing the request.
const ADMIN_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Create the application routes.
pub fn routes() -> Router<AppState> {
    let pages = Router::new()
        .route("/", get(home::index))
        .route("/login", get(login::login_page))
        .route_layer(page_rate_limiter());

    let auth = Router::new()
        .route("/login/google", post(login::google_sign_in))
        .route("/logout", post(login::logout))
        .route_layer(sign_in_rate_limiter());

    Router::new()
        .merge(pages)
        .merge(auth)
        .nest("/admin", admin_routes())
}

/// Create the admin routes router.
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::dashboard))
        .route("/apps", post(admin::save_app))
        .route("/apps/cancel", post(admin::cancel_edit))
        .route("/apps/{id}/edit", get(admin::edit_app))
        .route("/apps/{id}/delete", post(admin::delete_app))
        .layer(DefaultBodyLimit::max(ADMIN_BODY_LIMIT))
}
