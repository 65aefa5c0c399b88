//! Session/view controller.
//!
//! The controller reconciles the identity reported by the provider with the
//! view the user is on, and keeps the admin view reachable only for the
//! configured admin account.
//!
//! # Structure
//!
//! - [`transition`] is a pure function `(state, event) -> (state, effects)`.
//! - [`Controller`] drives it: it runs each [`Effect`] against an
//!   [`IdentityProvider`] and feeds the resulting identity change back in as a
//!   new [`Event`], in the order the provider answered.
//!
//! ```text
//!             IdentityChanged(admin)             Navigate(Login)
//!   Home ───────────────────────────▶ (stays)   Home ─────────────▶ Login
//!   Login ──────────────────────────▶ Admin     Login ── admin ───▶ Admin
//!   any  ── IdentityChanged(other) ─▶ Home + [SignOut, ReAnonymize]
//!   Admin ─ IdentityChanged(guest) ─▶ Home
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::ProviderError;
use crate::identity::{AdminEmail, Credential, Session, User};
use crate::notice::Notice;
use crate::ports::IdentityProvider;

/// Which screen is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewState {
    /// Public catalog.
    #[default]
    Home,
    /// Admin sign-in.
    Login,
    /// Admin dashboard.
    Admin,
}

/// Everything the presentation layer reads from the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    pub session: Session,
    pub view: ViewState,
    /// Startup sign-in problem shown as a banner on the catalog.
    pub advisory: Option<String>,
    /// Last federated sign-in failure, shown on the login view.
    pub login_error: Option<String>,
    /// Blocking notices not yet shown.
    pub notices: Vec<Notice>,
}

impl ControllerState {
    /// Whether the admin view may be shown.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.session, Session::AuthenticatedAdmin)
    }

    /// Queue a blocking notice.
    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Remove and return all queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

/// Inputs to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The provider reported a new current user (or none).
    IdentityChanged(Option<User>),
    /// The user asked for a view.
    Navigate(ViewState),
    /// Guest sign-in at startup failed.
    InitialSignInFailed(ProviderError),
    /// Federated sign-in from the login view failed.
    FederatedSignInFailed(ProviderError),
    /// The user pressed logout.
    LogoutRequested,
}

/// Provider calls requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// End the current identity.
    SignOut,
    /// Best-effort anonymous sign-in; failures are ignored.
    ReAnonymize,
}

/// Compute the next state for an event.
#[must_use]
pub fn transition(
    state: &ControllerState,
    event: Event,
    admin: &AdminEmail,
) -> (ControllerState, Vec<Effect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        Event::IdentityChanged(user) => {
            let session = admin.classify(user.as_ref());
            next.session = session;
            if user.is_some() {
                next.advisory = None;
            }

            match session {
                Session::AuthenticatedAdmin => {
                    next.login_error = None;
                    if next.view == ViewState::Login {
                        next.view = ViewState::Admin;
                    }
                }
                Session::AuthenticatedNonAdmin => {
                    next.push_notice(Notice::blocking(format!(
                        "Access denied. Only for {admin}"
                    )));
                    next.view = ViewState::Home;
                    effects.push(Effect::SignOut);
                    effects.push(Effect::ReAnonymize);
                }
                Session::Unauthenticated | Session::AnonymousGuest => {
                    if next.view == ViewState::Admin {
                        next.view = ViewState::Home;
                    }
                }
            }
        }
        Event::Navigate(view) => {
            next.view = match view {
                ViewState::Home => ViewState::Home,
                ViewState::Login | ViewState::Admin if state.is_admin() => ViewState::Admin,
                ViewState::Login | ViewState::Admin => ViewState::Login,
            };
            if view == ViewState::Login {
                next.login_error = None;
            }
        }
        Event::InitialSignInFailed(error) => {
            if !error.is_suppressed() {
                next.advisory = Some(format!("Guest mode limited: {}", error.message));
            }
        }
        Event::FederatedSignInFailed(error) => {
            next.login_error = Some(format!("Sign-in failed: {}", error.message));
        }
        Event::LogoutRequested => {
            next.view = ViewState::Home;
            effects.push(Effect::SignOut);
            effects.push(Effect::ReAnonymize);
        }
    }

    (next, effects)
}

enum Work {
    Event(Event),
    Effect(Effect),
}

/// Drives [`transition`] against a live identity provider.
///
/// Constructed per UI action from the persisted state and credential, and
/// dismantled with [`Controller::into_parts`] afterwards.
pub struct Controller<'a> {
    provider: &'a dyn IdentityProvider,
    admin: &'a AdminEmail,
    state: ControllerState,
    credential: Option<Credential>,
}

impl<'a> Controller<'a> {
    #[must_use]
    pub fn new(
        provider: &'a dyn IdentityProvider,
        admin: &'a AdminEmail,
        state: ControllerState,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            provider,
            admin,
            state,
            credential,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ControllerState {
        &self.state
    }

    #[must_use]
    pub const fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Give back the state and credential for persistence.
    #[must_use]
    pub fn into_parts(self) -> (ControllerState, Option<Credential>) {
        (self.state, self.credential)
    }

    /// Run the startup sign-in chain if no identity is established yet.
    ///
    /// Order: pre-provisioned token (failures logged and skipped), then
    /// anonymous sign-in. Suppressed anonymous failures are swallowed; others
    /// become an advisory on the catalog.
    #[instrument(skip_all, fields(has_token = initial_token.is_some()))]
    pub async fn establish_initial_identity(&mut self, initial_token: Option<&str>) {
        if self.credential.is_some() {
            return;
        }

        if let Some(token) = initial_token {
            match self.provider.sign_in_with_custom_token(token).await {
                Ok(credential) => {
                    self.adopt(credential).await;
                    return;
                }
                Err(e) => warn!(error = %e, "Initial token sign-in skipped"),
            }
        }

        match self.provider.sign_in_anonymously().await {
            Ok(credential) => self.adopt(credential).await,
            Err(e) => {
                debug!(error = %e, suppressed = e.is_suppressed(), "Anonymous sign-in failed");
                self.dispatch(Event::InitialSignInFailed(e)).await;
            }
        }
    }

    /// Sign in with a federated ID token from the login view.
    #[instrument(skip_all)]
    pub async fn sign_in_federated(&mut self, id_token: &str) {
        match self.provider.sign_in_with_federated(id_token).await {
            Ok(credential) => self.adopt(credential).await,
            Err(e) => {
                warn!(error = %e, "Federated sign-in failed");
                self.dispatch(Event::FederatedSignInFailed(e)).await;
            }
        }
    }

    /// Explicit logout: sign out, go home, and fall back to a guest identity.
    pub async fn logout(&mut self) {
        self.dispatch(Event::LogoutRequested).await;
    }

    /// Switch views. Navigation never calls the provider.
    pub fn navigate(&mut self, view: ViewState) {
        let (next, effects) = transition(&self.state, Event::Navigate(view), self.admin);
        debug_assert!(effects.is_empty());
        self.state = next;
    }

    async fn adopt(&mut self, credential: Credential) {
        let user = credential.user.clone();
        self.credential = Some(credential);
        self.dispatch(Event::IdentityChanged(Some(user))).await;
    }

    /// Apply an event and every event its effects produce, depth first, so
    /// notifications are handled in the order the provider produced them.
    pub async fn dispatch(&mut self, event: Event) {
        let mut work = VecDeque::from([Work::Event(event)]);

        while let Some(item) = work.pop_front() {
            match item {
                Work::Event(event) => {
                    let (next, effects) = transition(&self.state, event, self.admin);
                    self.state = next;
                    for effect in effects.into_iter().rev() {
                        work.push_front(Work::Effect(effect));
                    }
                }
                Work::Effect(effect) => {
                    if let Some(event) = self.run_effect(effect).await {
                        work.push_front(Work::Event(event));
                    }
                }
            }
        }
    }

    async fn run_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::SignOut => {
                let credential = self.credential.take()?;
                if let Err(e) = self.provider.sign_out(&credential).await {
                    warn!(error = %e, "Sign-out rejected; dropping local credential anyway");
                }
                Some(Event::IdentityChanged(None))
            }
            Effect::ReAnonymize => match self.provider.sign_in_anonymously().await {
                Ok(credential) => {
                    let user = credential.user.clone();
                    self.credential = Some(credential);
                    Some(Event::IdentityChanged(Some(user)))
                }
                Err(e) => {
                    debug!(error = %e, "Re-anonymization failed");
                    None
                }
            },
        }
    }
}
