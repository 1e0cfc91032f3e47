//! Client-side state models.
//!
//! Each model keeps its data in a single `RwSignal`, and every completed
//! operation writes its result with one `update`, so views never see a
//! half-applied transition. Models are plain values handed to their
//! consumers; [`AppState`] bundles the four of them around one [`ApiClient`].

pub mod meeting;
pub mod organization;
pub mod session;
pub mod zoom;

use leptos::*;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::{
    api::{ApiClient, ApiError},
    config::RuntimeConfig,
    utils::{storage::Storage, timer},
};

pub use meeting::{MeetingFilter, MeetingState, MeetingStore};
pub use organization::{OrganizationState, OrganizationStore};
pub use session::{SessionState, SessionStore};
pub use zoom::{ConnectionStatus, ZoomConnection, ZoomSettings, ZoomState, ZoomStore};

/// State that carries a transient, user-visible error.
pub trait TransientError {
    fn error_slot(&mut self) -> &mut Option<ApiError>;
}

/// Publishes backend and network errors into a model's `error` field and
/// clears them after the display window, or earlier when the next operation
/// starts.
#[derive(Clone)]
pub struct ErrorReporter {
    generation: Rc<Cell<u64>>,
    display_for: Duration,
}

impl ErrorReporter {
    pub fn new(display_for: Duration) -> Self {
        Self {
            generation: Rc::new(Cell::new(0)),
            display_for,
        }
    }

    fn bump(&self) -> u64 {
        let next = self.generation.get().wrapping_add(1);
        self.generation.set(next);
        next
    }

    /// Starts a user action: drops any displayed error and applies `apply`
    /// in the same update.
    pub fn begin<S: TransientError + 'static>(&self, state: RwSignal<S>, apply: impl FnOnce(&mut S)) {
        self.bump();
        state.update(|s| {
            *s.error_slot() = None;
            apply(s);
        });
    }

    /// Applies `apply` and, for reportable errors, stores `error`, all in
    /// one update.
    pub fn fail<S: TransientError + 'static>(
        &self,
        state: RwSignal<S>,
        error: &ApiError,
        apply: impl FnOnce(&mut S),
    ) {
        if !error.is_reportable() {
            state.update(apply);
            return;
        }
        let generation = self.bump();
        state.update(|s| {
            apply(s);
            *s.error_slot() = Some(error.clone());
        });
        let counter = self.generation.clone();
        timer::schedule(self.display_for, move || {
            if counter.get() == generation {
                state.try_update(|s| *s.error_slot() = None);
            }
        });
    }

    pub fn clear<S: TransientError + 'static>(&self, state: RwSignal<S>) {
        self.bump();
        state.update(|s| *s.error_slot() = None);
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(Duration::from_millis(RuntimeConfig::default().error_display_ms))
    }
}

/// The application's explicit context object.
#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
    pub session: SessionStore,
    pub organizations: OrganizationStore,
    pub zoom: ZoomStore,
    pub meetings: MeetingStore,
}

impl AppState {
    /// Wires every model to `api`. `durable` backs data that must survive a
    /// reload; `transient` holds credentials of sessions started without
    /// "remember me".
    pub fn new(api: ApiClient, durable: Storage, transient: Storage, config: &RuntimeConfig) -> Self {
        let errors = ErrorReporter::new(Duration::from_millis(config.error_display_ms));
        let session = SessionStore::new(api.clone(), durable.clone(), transient, errors.clone());
        let organizations = OrganizationStore::new(api.clone(), durable.clone(), errors.clone());
        let zoom = ZoomStore::new(
            api.clone(),
            durable.clone(),
            ZoomSettings::from_config(config),
            errors.clone(),
        );
        let meetings = MeetingStore::new(api.clone(), durable, errors);

        let invalidate_session = session.invalidator();
        let reset_organizations = organizations.invalidator();
        let reset_zoom = zoom.invalidator();
        let reset_meetings = meetings.invalidator();
        let reset_workspace: Rc<dyn Fn()> = Rc::new(move || {
            reset_organizations();
            reset_zoom();
            reset_meetings();
        });
        session.on_signed_out({
            let reset_workspace = reset_workspace.clone();
            move || reset_workspace()
        });
        api.on_unauthorized(move || {
            invalidate_session();
            reset_workspace();
        });

        Self {
            api,
            session,
            organizations,
            zoom,
            meetings,
        }
    }

    /// Browser wiring: `localStorage` plus `sessionStorage`, configuration
    /// from [`crate::config`].
    pub fn browser(config: &RuntimeConfig) -> Self {
        let api = ApiClient::new().with_timeout(Duration::from_millis(config.request_timeout_ms));
        Self::new(api, Storage::local(), Storage::session(), config)
    }

    /// Restores every model from storage.
    pub fn hydrate(&self) {
        self.session.hydrate();
        if self.session.snapshot().is_authenticated {
            self.organizations.hydrate();
            self.zoom.hydrate();
            self.meetings.hydrate();
        } else {
            self.reset_workspace();
        }
    }

    /// Signs out and drops every user-scoped model, locally and in storage,
    /// whatever the backend answers. Any other loss of the session (a
    /// rejected refresh, a 401) resets the same models.
    pub async fn logout(&self) {
        self.session.logout().await;
    }

    fn reset_workspace(&self) {
        self.organizations.reset();
        self.zoom.reset();
        self.meetings.reset();
    }
}
