//! Zoom connection for the selected organization.
//!
//! ```text
//! disconnected --connect--> connecting --success--> connected
//!                           connecting --failure--> error
//! connected --disconnect--> disconnected
//! connected --refresh--> connecting --success--> connected
//!                                   --failure--> disconnected
//! ```
//!
//! Those are the moves local actions may make. A status check against the
//! backend is authoritative and may land on `connected` or `disconnected`
//! from any state.
//!
//! A connection is only ever `connected` with both an access token and the
//! account it belongs to.

use chrono::{DateTime, Duration, Utc};
use leptos::*;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use super::{ErrorReporter, TransientError};
use crate::{
    api::{
        ApiClient, ApiError, Id, Meeting, MeetingSource, ZoomAccount, ZoomExchangeRequest,
        ZoomRefreshRequest, ZoomStatusResponse, ZoomTokenResponse,
    },
    config::RuntimeConfig,
    utils::{
        oauth::{AuthorizationFlow, AuthorizationHandle, CallbackParams},
        storage::{keys, Storage},
        time, timer, validation,
    },
};

/// Zoom tokens are treated as expired this long before their stated expiry.
pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomSettings {
    pub client_id: Option<String>,
    pub authorize_url: String,
    pub redirect_uri: Option<String>,
    pub oauth_timeout: std::time::Duration,
}

impl ZoomSettings {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            client_id: config
                .zoom_client_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
            authorize_url: config.zoom_authorize_url.clone(),
            redirect_uri: config.zoom_redirect_uri.clone(),
            oauth_timeout: std::time::Duration::from_secs(config.oauth_timeout_secs),
        }
    }
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    /// Moves local actions may make. [`ZoomState::sync`] bypasses this.
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus as S;
        matches!(
            (self, next),
            (S::Disconnected, S::Connecting)
                | (S::Connecting, S::Connected | S::Error | S::Disconnected)
                | (S::Connected, S::Disconnected | S::Connecting)
                | (S::Error, S::Connecting | S::Disconnected)
        ) || self == next
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoomConnection {
    pub status: ConnectionStatus,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub account: Option<ZoomAccount>,
    pub token_expiry: Option<DateTime<Utc>>,
}

impl ZoomConnection {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
            && self.access_token.is_some()
            && self.account.is_some()
    }

    /// Unknown expiry counts as still valid.
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expiry
            .map(|expiry| time::is_expired(expiry, now, Duration::seconds(TOKEN_EXPIRY_SKEW_SECS)))
            .unwrap_or(false)
    }

    fn from_status(status: ZoomStatusResponse) -> Self {
        match (status.connected, status.access_token, status.account) {
            (true, Some(access_token), Some(account)) => Self {
                status: ConnectionStatus::Connected,
                access_token: Some(access_token),
                refresh_token: status.refresh_token,
                account: Some(account),
                token_expiry: status.expires_at,
            },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoomState {
    pub organization_id: Option<Id>,
    pub connection: ZoomConnection,
    pub meetings: Vec<Meeting>,
    pub loading: bool,
    pub error: Option<ApiError>,
}

impl TransientError for ZoomState {
    fn error_slot(&mut self) -> &mut Option<ApiError> {
        &mut self.error
    }
}

impl ZoomState {
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status
    }

    fn transition(&mut self, next: ConnectionStatus) -> bool {
        if !self.connection.status.can_transition_to(next) {
            log::warn!(
                "Ignoring Zoom status change {:?} -> {:?}",
                self.connection.status,
                next
            );
            return false;
        }
        self.connection.status = next;
        true
    }

    /// Replaces the connection with the backend's report. A pending
    /// authorization flow keeps `connecting` unless the backend already
    /// reports a live connection.
    fn sync(&mut self, reported: ZoomConnection, flow_in_progress: bool) {
        if flow_in_progress && !reported.is_connected() {
            return;
        }
        if !self.connection.status.can_transition_to(reported.status) {
            log::debug!(
                "Backend reports Zoom {:?} while local status is {:?}",
                reported.status,
                self.connection.status
            );
        }
        self.connection = reported;
    }

    /// Switches the model to `organization_id`, dropping meetings of any
    /// other organization.
    fn select(&mut self, organization_id: &Id) {
        if self.organization_id.as_ref() != Some(organization_id) {
            self.meetings.clear();
            self.organization_id = Some(organization_id.clone());
        }
    }

    fn drop_connection(&mut self) {
        self.connection = ZoomConnection::default();
        self.meetings.clear();
        self.loading = false;
    }
}

/// Non-secret part of the persisted connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConnectionBundle {
    organization_id: Option<Id>,
    status: ConnectionStatus,
    token_expiry: Option<DateTime<Utc>>,
}

fn token_expiry(response: &ZoomTokenResponse, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    response
        .expires_at
        .or_else(|| response.expires_in.and_then(|secs| time::checked_after(now, secs)))
}

struct PendingConnect {
    handle: AuthorizationHandle,
    organization_id: Id,
    redirect_uri: String,
}

type PendingSlot = Rc<RefCell<Option<PendingConnect>>>;

/// Cancels the pending flow if its state still matches and returns the model
/// to `disconnected`.
fn abandon(state: RwSignal<ZoomState>, pending: &PendingSlot, flow_state: Option<&str>) -> bool {
    let taken = {
        let mut slot = pending.borrow_mut();
        let matches = match (slot.as_ref(), flow_state) {
            (Some(current), Some(expected)) => current.handle.state() == expected,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if matches {
            slot.take()
        } else {
            None
        }
    };
    let Some(flow) = taken else {
        return false;
    };
    flow.handle.cancel();
    state.try_update(|s| {
        if s.connection.status == ConnectionStatus::Connecting {
            s.transition(ConnectionStatus::Disconnected);
            s.loading = false;
        }
    });
    true
}

#[derive(Clone)]
pub struct ZoomStore {
    state: RwSignal<ZoomState>,
    api: ApiClient,
    storage: Storage,
    settings: ZoomSettings,
    errors: ErrorReporter,
    pending: PendingSlot,
}

impl ZoomStore {
    pub fn new(api: ApiClient, storage: Storage, settings: ZoomSettings, errors: ErrorReporter) -> Self {
        Self {
            state: create_rw_signal(ZoomState::default()),
            api,
            storage,
            settings,
            errors,
            pending: Rc::new(RefCell::new(None)),
        }
    }

    pub fn state(&self) -> RwSignal<ZoomState> {
        self.state
    }

    pub fn snapshot(&self) -> ZoomState {
        self.state.get_untracked()
    }

    /// `state` value of the authorization flow in progress, if any.
    pub fn pending_state(&self) -> Option<String> {
        self.pending
            .borrow()
            .as_ref()
            .map(|pending| pending.handle.state().to_string())
    }

    fn persist(&self, state: &ZoomState) {
        self.storage.clear(keys::ZOOM);
        if !state.is_connected() {
            return;
        }
        let connection = &state.connection;
        self.storage.set(
            keys::ZOOM_CONNECTION,
            &ConnectionBundle {
                organization_id: state.organization_id.clone(),
                status: connection.status,
                token_expiry: connection.token_expiry,
            },
        );
        self.storage
            .set_optional(keys::ZOOM_ACCESS_TOKEN, connection.access_token.as_ref());
        self.storage
            .set_optional(keys::ZOOM_REFRESH_TOKEN, connection.refresh_token.as_ref());
        self.storage
            .set_optional(keys::ZOOM_ACCOUNT, connection.account.as_ref());
    }

    fn commit(&self, change: impl FnOnce(&mut ZoomState)) -> ZoomState {
        let mut next = self.snapshot();
        change(&mut next);
        next.loading = false;
        self.persist(&next);
        self.state.set(next.clone());
        next
    }

    pub fn hydrate(&self) {
        let Some(bundle) = self.storage.get::<ConnectionBundle>(keys::ZOOM_CONNECTION) else {
            self.storage.clear(keys::ZOOM);
            return;
        };
        let access_token = self.storage.get::<String>(keys::ZOOM_ACCESS_TOKEN);
        let refresh_token = self.storage.get::<String>(keys::ZOOM_REFRESH_TOKEN);
        let account = self.storage.get::<ZoomAccount>(keys::ZOOM_ACCOUNT);

        let connection = match (bundle.status, access_token, account) {
            (ConnectionStatus::Connected, Some(access_token), Some(account)) => ZoomConnection {
                status: ConnectionStatus::Connected,
                access_token: Some(access_token),
                refresh_token,
                account: Some(account),
                token_expiry: bundle.token_expiry,
            },
            _ => {
                log::warn!("Discarding incomplete Zoom connection found in storage");
                self.storage.clear(keys::ZOOM);
                ZoomConnection::default()
            }
        };
        self.state.update(|s| {
            s.organization_id = bundle.organization_id;
            s.connection = connection;
        });
    }

    /// Syncs the model with the backend's view of `organization_id`. An
    /// expired token on a live connection is refreshed straight away.
    pub async fn check_status(&self, organization_id: &Id) -> Result<ZoomConnection, ApiError> {
        if organization_id.is_blank() {
            return Err(ApiError::validation("Organization id is required"));
        }
        self.errors.begin(self.state, |s| s.loading = true);
        let status = match self.api.zoom_status(organization_id).await {
            Ok(status) => status,
            Err(err) => {
                self.errors.fail(self.state, &err, |s| s.loading = false);
                return Err(err);
            }
        };

        let flow_in_progress = self.pending.borrow().is_some();
        let next = self.commit(|s| {
            s.select(organization_id);
            s.sync(ZoomConnection::from_status(status), flow_in_progress);
        });

        if next.is_connected() && next.connection.token_expired(time::now()) {
            self.refresh_token().await?;
            return Ok(self.snapshot().connection);
        }
        Ok(next.connection)
    }

    /// Starts an authorization flow for `organization_id`. The flow settles
    /// through [`handle_callback`](Self::handle_callback), through
    /// [`cancel_connect`](Self::cancel_connect), or as cancelled once the
    /// configured timeout passes.
    pub fn initiate_connect(
        &self,
        organization_id: &Id,
        redirect_uri: Option<&str>,
    ) -> Result<AuthorizationFlow, ApiError> {
        if organization_id.is_blank() {
            return Err(ApiError::validation("Organization id is required"));
        }
        let Some(client_id) = self.settings.client_id.as_deref() else {
            return Err(ApiError::validation("Zoom integration is not configured"));
        };
        let Some(redirect_uri) = redirect_uri
            .or(self.settings.redirect_uri.as_deref())
            .filter(|uri| !uri.trim().is_empty())
        else {
            return Err(ApiError::validation("A Zoom redirect URI is required"));
        };

        abandon(self.state, &self.pending, None);

        let flow = AuthorizationFlow::start(&self.settings.authorize_url, client_id, redirect_uri);
        let handle = flow.handle();
        *self.pending.borrow_mut() = Some(PendingConnect {
            handle: handle.clone(),
            organization_id: organization_id.clone(),
            redirect_uri: redirect_uri.to_string(),
        });
        self.errors.begin(self.state, |s| {
            s.select(organization_id);
            s.transition(ConnectionStatus::Connecting);
        });

        let state = self.state;
        let pending = self.pending.clone();
        let flow_state = flow.request.state.clone();
        timer::schedule(self.settings.oauth_timeout, move || {
            if abandon(state, &pending, Some(&flow_state)) {
                log::info!("Zoom authorization timed out");
            }
        });
        log::debug!("Zoom authorization started for organization {}", organization_id);
        Ok(flow)
    }

    /// Hands the provider callback to the pending flow. Returns `false` when
    /// no flow was waiting.
    pub fn handle_callback(&self, params: CallbackParams) -> bool {
        self.pending
            .borrow()
            .as_ref()
            .map(|pending| pending.handle.resolve(params))
            .unwrap_or(false)
    }

    pub fn cancel_connect(&self) -> bool {
        abandon(self.state, &self.pending, None)
    }

    /// Exchanges the authorization code for tokens and loads the connected
    /// account. `state` must match the flow started by
    /// [`initiate_connect`](Self::initiate_connect).
    pub async fn complete_connect(&self, code: &str, state: &str) -> Result<ZoomConnection, ApiError> {
        validation::require(code, "Authorization code")?;
        let Some(pending) = self.pending.borrow_mut().take() else {
            return Err(ApiError::validation("No Zoom authorization is in progress"));
        };
        if pending.handle.state() != state {
            pending.handle.cancel();
            log::warn!("Zoom callback state mismatch; rejecting authorization");
            self.state.update(|s| {
                s.transition(ConnectionStatus::Error);
            });
            return Err(ApiError::validation(
                "Authorization state does not match; please try connecting again",
            ));
        }

        self.errors.begin(self.state, |s| s.loading = true);
        let request = ZoomExchangeRequest {
            organization_id: pending.organization_id.clone(),
            code: code.to_string(),
            state: state.to_string(),
            redirect_uri: pending.redirect_uri.clone(),
        };
        let result = async {
            let tokens = self.api.zoom_exchange_code(&request).await?;
            let account = self.api.zoom_account(&tokens.access_token).await?;
            Ok::<_, ApiError>((tokens, account))
        }
        .await;

        match result {
            Ok((tokens, account)) => {
                let expiry = token_expiry(&tokens, time::now());
                let next = self.commit(|s| {
                    s.select(&pending.organization_id);
                    s.connection.access_token = Some(tokens.access_token);
                    s.connection.refresh_token = tokens.refresh_token;
                    s.connection.account = Some(account);
                    s.connection.token_expiry = expiry;
                    s.transition(ConnectionStatus::Connected);
                });
                log::info!("Zoom connected for organization {}", pending.organization_id);
                Ok(next.connection)
            }
            Err(err) => {
                self.errors.fail(self.state, &err, |s| {
                    s.loading = false;
                    s.transition(ConnectionStatus::Error);
                });
                Err(err)
            }
        }
    }

    /// Runs a whole authorization: starts the flow, waits for the callback
    /// and completes the connection.
    pub async fn connect(
        &self,
        organization_id: &Id,
        redirect_uri: Option<&str>,
    ) -> Result<ZoomConnection, ApiError> {
        let flow = self.initiate_connect(organization_id, redirect_uri)?;
        #[cfg(target_arch = "wasm32")]
        let _popup = match crate::utils::popup::open(&flow.request, flow.handle()) {
            Ok(popup) => popup,
            Err(err) => {
                self.cancel_connect();
                return Err(err);
            }
        };
        let flow_state = flow.request.state.clone();

        match flow.result().await {
            Ok(code) => self.complete_connect(&code.code, &code.state).await,
            Err(err) => {
                let still_ours = self.pending_state().as_deref() == Some(flow_state.as_str());
                if still_ours {
                    self.pending.borrow_mut().take();
                }
                if err.is_cancelled() {
                    self.state.update(|s| {
                        if s.connection.status == ConnectionStatus::Connecting {
                            s.transition(ConnectionStatus::Disconnected);
                        }
                    });
                } else {
                    self.errors.fail(self.state, &err, |s| {
                        s.transition(ConnectionStatus::Error);
                    });
                }
                Err(err)
            }
        }
    }

    /// Drops the connection locally, then tells the backend on a
    /// best-effort basis.
    pub async fn disconnect(&self, organization_id: &Id) -> Result<(), ApiError> {
        if organization_id.is_blank() {
            return Err(ApiError::validation("Organization id is required"));
        }
        abandon(self.state, &self.pending, None);
        self.storage.clear(keys::ZOOM);
        self.errors.begin(self.state, |s| {
            s.transition(ConnectionStatus::Disconnected);
            s.drop_connection();
        });
        if let Err(err) = self.api.zoom_disconnect(organization_id).await {
            log::warn!("Backend Zoom disconnect failed: {}", err);
        }
        log::info!("Zoom disconnected for organization {}", organization_id);
        Ok(())
    }

    /// Renews the access token. Any failure disconnects.
    pub async fn refresh_token(&self) -> Result<ZoomConnection, ApiError> {
        let snapshot = self.snapshot();
        let Some(organization_id) = snapshot.organization_id.clone() else {
            return Err(ApiError::validation("No organization is linked to Zoom"));
        };
        let Some(refresh_token) = snapshot.connection.refresh_token.clone() else {
            return Err(ApiError::NoRefreshToken);
        };

        self.errors.begin(self.state, |s| {
            s.loading = true;
            s.transition(ConnectionStatus::Connecting);
        });
        let request = ZoomRefreshRequest {
            organization_id,
            refresh_token: refresh_token.clone(),
        };
        match self.api.zoom_refresh_token(&request).await {
            Ok(tokens) => {
                let expiry = token_expiry(&tokens, time::now());
                let next = self.commit(|s| {
                    s.connection.access_token = Some(tokens.access_token);
                    s.connection.refresh_token = tokens.refresh_token.or(Some(refresh_token));
                    s.connection.token_expiry = expiry;
                    s.transition(ConnectionStatus::Connected);
                });
                log::debug!("Zoom token refreshed");
                Ok(next.connection)
            }
            Err(err) => {
                log::warn!("Zoom token refresh failed; disconnecting: {}", err);
                self.storage.clear(keys::ZOOM);
                self.errors.fail(self.state, &err, |s| {
                    s.transition(ConnectionStatus::Disconnected);
                    s.drop_connection();
                });
                Err(err)
            }
        }
    }

    /// Replaces the organization's Zoom meetings. Requires a live
    /// connection for `organization_id`.
    pub async fn list_meetings(&self, organization_id: &Id) -> Result<Vec<Meeting>, ApiError> {
        let snapshot = self.snapshot();
        if snapshot.organization_id.as_ref() != Some(organization_id) || !snapshot.is_connected() {
            return Err(ApiError::validation(
                "Zoom is not connected for this organization",
            ));
        }
        let connection = if snapshot.connection.token_expired(time::now()) {
            self.refresh_token().await?
        } else {
            snapshot.connection
        };
        let Some(token) = connection.access_token else {
            return Err(ApiError::validation(
                "Zoom is not connected for this organization",
            ));
        };

        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.zoom_meetings(organization_id, &token).await {
            Ok(meetings) => {
                let meetings: Vec<Meeting> = meetings
                    .into_iter()
                    .map(|mut meeting| {
                        meeting.source = MeetingSource::Zoom;
                        if meeting.organization_id.is_none() {
                            meeting.organization_id = Some(organization_id.clone());
                        }
                        meeting
                    })
                    .collect();
                self.state.update(|s| {
                    s.meetings = meetings.clone();
                    s.loading = false;
                });
                Ok(meetings)
            }
            Err(err) => {
                self.errors.fail(self.state, &err, |s| s.loading = false);
                Err(err)
            }
        }
    }

    pub fn reset(&self) {
        abandon(self.state, &self.pending, None);
        self.storage.clear(keys::ZOOM);
        self.state.set(ZoomState::default());
    }

    pub(crate) fn invalidator(&self) -> impl Fn() + 'static {
        let state = self.state;
        let storage = self.storage.clone();
        let pending = self.pending.clone();
        move || {
            abandon(state, &pending, None);
            storage.clear(keys::ZOOM);
            state.try_set(ZoomState::default());
        }
    }
}
