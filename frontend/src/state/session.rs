use chrono::{DateTime, Duration, Utc};
use leptos::*;
use std::cell::RefCell;
use std::rc::Rc;

use super::{ErrorReporter, TransientError};
use crate::{
    api::{ApiClient, ApiError, AuthResponse, LoginRequest, Profile, RegisterRequest, RegisterResponse},
    utils::{
        storage::{keys, Storage},
        time,
        validation,
    },
};

/// Window assumed when the backend does not say when an OTP expires.
pub const DEFAULT_OTP_WINDOW_SECS: i64 = 600;

const ACCESS_TOKEN_SKEW_SECS: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub is_authenticated: bool,
    pub user: Option<Profile>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Set between a successful registration and OTP verification.
    pub registration_email: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub remember_me: bool,
    pub loading: bool,
    pub error: Option<ApiError>,
}

impl TransientError for SessionState {
    fn error_slot(&mut self) -> &mut Option<ApiError> {
        &mut self.error
    }
}

impl SessionState {
    pub fn display_name(&self) -> Option<String> {
        self.user.as_ref().map(Profile::display_name)
    }

    /// Seconds left before the pending OTP expires, floored at zero.
    pub fn otp_seconds_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.otp_expires_at
            .map(|expires| (expires - now).num_seconds().max(0))
    }

    pub fn otp_expired(&self, now: DateTime<Utc>) -> bool {
        self.otp_seconds_remaining(now) == Some(0)
    }

    pub fn access_token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.access_token.as_deref().and_then(time::jwt_expires_at)
    }

    fn access_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.access_token_expires_at()
            .map(|expires| time::is_expired(expires, now, Duration::seconds(ACCESS_TOKEN_SKEW_SECS)))
            .unwrap_or(false)
    }

    fn sign_out(&mut self) {
        *self = Self::default();
    }
}

fn otp_deadline(response: &RegisterResponse, now: DateTime<Utc>) -> DateTime<Utc> {
    response
        .otp_expires_at
        .or_else(|| response.expires_in.and_then(|secs| time::checked_after(now, secs)))
        .unwrap_or_else(|| now + Duration::seconds(DEFAULT_OTP_WINDOW_SECS))
}

fn validate_registration(request: &RegisterRequest) -> Result<(), ApiError> {
    validation::require(&request.first_name, "First name")?;
    validation::require(&request.last_name, "Last name")?;
    validation::validate_email(&request.email)?;
    if request.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    Ok(())
}

type SignedOutHook = Rc<dyn Fn()>;

/// Authentication and registration state for one browser session.
#[derive(Clone)]
pub struct SessionStore {
    state: RwSignal<SessionState>,
    api: ApiClient,
    durable: Storage,
    transient: Storage,
    errors: ErrorReporter,
    on_signed_out: Rc<RefCell<Option<SignedOutHook>>>,
}

impl SessionStore {
    pub fn new(api: ApiClient, durable: Storage, transient: Storage, errors: ErrorReporter) -> Self {
        Self {
            state: create_rw_signal(SessionState::default()),
            api,
            durable,
            transient,
            errors,
            on_signed_out: Rc::new(RefCell::new(None)),
        }
    }

    /// Runs `hook` whenever this store drops the local session: logout,
    /// rejected refresh, or a profile that cannot be loaded after refresh.
    pub fn on_signed_out(&self, hook: impl Fn() + 'static) {
        *self.on_signed_out.borrow_mut() = Some(Rc::new(hook));
    }

    pub fn state(&self) -> RwSignal<SessionState> {
        self.state
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.get_untracked()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn storage_for(&self, remember_me: bool) -> &Storage {
        if remember_me {
            &self.durable
        } else {
            &self.transient
        }
    }

    fn clear_storage(&self) {
        self.durable.clear(keys::SESSION);
        self.transient.clear(keys::SESSION);
    }

    fn persist(&self, state: &SessionState) {
        self.clear_storage();
        let storage = self.storage_for(state.remember_me);
        storage.set_optional(keys::TOKEN, state.access_token.as_ref());
        storage.set_optional(keys::REFRESH_TOKEN, state.refresh_token.as_ref());
        storage.set_optional(keys::USER_PROFILE, state.user.as_ref());
    }

    /// Drops local credentials without contacting the backend.
    fn clear_local(&self) {
        self.api.set_bearer(None);
        self.clear_storage();
        self.state.update(SessionState::sign_out);
        let hook = self.on_signed_out.borrow().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub(crate) fn invalidator(&self) -> impl Fn() + 'static {
        let state = self.state;
        let durable = self.durable.clone();
        let transient = self.transient.clone();
        move || {
            durable.clear(keys::SESSION);
            transient.clear(keys::SESSION);
            state.try_update(SessionState::sign_out);
        }
    }

    /// Restores a persisted session. Token and profile must both be present;
    /// a partial set is discarded.
    pub fn hydrate(&self) {
        for (storage, remember_me) in [(&self.durable, true), (&self.transient, false)] {
            let token = storage.get::<String>(keys::TOKEN);
            let user = storage.get::<Profile>(keys::USER_PROFILE);
            match (token, user) {
                (Some(token), Some(user)) => {
                    let refresh_token = storage.get::<String>(keys::REFRESH_TOKEN);
                    self.api.set_bearer(Some(token.clone()));
                    self.state.update(|s| {
                        s.is_authenticated = true;
                        s.user = Some(user);
                        s.access_token = Some(token);
                        s.refresh_token = refresh_token;
                        s.remember_me = remember_me;
                        s.registration_email = None;
                        s.otp_expires_at = None;
                    });
                    log::debug!("Session restored from storage");
                    return;
                }
                (None, None) => {
                    if storage.raw(keys::REFRESH_TOKEN).is_some() {
                        storage.remove(keys::REFRESH_TOKEN);
                    }
                }
                _ => {
                    log::warn!("Discarding partial session found in storage");
                    storage.clear(keys::SESSION);
                }
            }
        }
        self.api.set_bearer(None);
        self.state.update(|s| {
            s.is_authenticated = false;
            s.user = None;
            s.access_token = None;
            s.refresh_token = None;
            s.remember_me = false;
        });
    }

    /// Starts a registration. On success the OTP step is pending for
    /// `request.email`; the user is not signed in yet.
    pub async fn register(&self, request: RegisterRequest) -> Result<(), ApiError> {
        validate_registration(&request)?;
        if self.snapshot().is_authenticated {
            return Err(ApiError::validation(
                "Sign out before registering a new account",
            ));
        }
        let request = RegisterRequest {
            email: validation::normalize_email(&request.email),
            ..request
        };

        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.register(&request).await {
            Ok(response) => {
                let expires = otp_deadline(&response, time::now());
                self.state.update(|s| {
                    s.registration_email = Some(request.email.clone());
                    s.otp_expires_at = Some(expires);
                    s.loading = false;
                });
                log::info!("Registration started; awaiting OTP confirmation");
                Ok(())
            }
            Err(err) => {
                self.errors.fail(self.state, &err, |s| s.loading = false);
                Err(err)
            }
        }
    }

    pub async fn resend_otp(&self) -> Result<(), ApiError> {
        let Some(email) = self.snapshot().registration_email else {
            return Err(ApiError::validation("There is no registration to confirm"));
        };
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.resend_otp(&email).await {
            Ok(response) => {
                let expires = otp_deadline(&response, time::now());
                self.state.update(|s| {
                    s.otp_expires_at = Some(expires);
                    s.loading = false;
                });
                Ok(())
            }
            Err(err) => {
                self.errors.fail(self.state, &err, |s| s.loading = false);
                Err(err)
            }
        }
    }

    pub fn reset_registration(&self) {
        self.state.update(|s| {
            s.registration_email = None;
            s.otp_expires_at = None;
        });
    }

    /// Confirms a registration. Failure keeps the pending registration so
    /// the user can retry.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<(), ApiError> {
        validation::validate_email(email)?;
        validation::validate_otp(code)?;
        let email = validation::normalize_email(email);

        self.errors.begin(self.state, |s| s.loading = true);
        let result = match self.api.verify_otp(&email, code).await {
            Ok(response) => self.establish(response, true).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            self.errors.fail(self.state, err, |s| s.loading = false);
        }
        result
    }

    pub async fn login(&self, email: &str, password: &str, remember_me: bool) -> Result<(), ApiError> {
        validation::validate_credentials(email, password)?;
        let request = LoginRequest {
            email: validation::normalize_email(email),
            password: password.to_string(),
            remember_me,
        };

        self.errors.begin(self.state, |s| s.loading = true);
        let result = match self.api.login(&request).await {
            Ok(response) => self.establish(response, remember_me).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            self.errors.fail(self.state, err, |s| s.loading = false);
        }
        result
    }

    /// Installs a freshly issued session in one step.
    async fn establish(&self, response: AuthResponse, remember_me: bool) -> Result<(), ApiError> {
        let previous = self.api.bearer();
        self.api.set_bearer(Some(response.access_token.clone()));
        let user = match response.user {
            Some(raw) => Profile::from(raw),
            None => match self.api.get_me().await {
                Ok(profile) => profile,
                Err(err) => {
                    self.api.set_bearer(previous);
                    return Err(err);
                }
            },
        };

        let mut next = self.snapshot();
        next.is_authenticated = true;
        next.user = Some(user);
        next.access_token = Some(response.access_token);
        next.refresh_token = response.refresh_token;
        next.registration_email = None;
        next.otp_expires_at = None;
        next.remember_me = remember_me;
        next.loading = false;
        self.persist(&next);
        self.state.set(next);
        log::info!("Signed in");
        Ok(())
    }

    fn stored_refresh_token(&self) -> Option<(String, bool)> {
        if let Some(token) = self.snapshot().refresh_token {
            return Some((token, self.snapshot().remember_me));
        }
        self.durable
            .get::<String>(keys::REFRESH_TOKEN)
            .map(|token| (token, true))
            .or_else(|| {
                self.transient
                    .get::<String>(keys::REFRESH_TOKEN)
                    .map(|token| (token, false))
            })
    }

    /// Exchanges the refresh token for a new access token. A rejected
    /// refresh signs the user out; a network failure leaves the session in
    /// place so the call can be retried.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let Some((refresh_token, remember_me)) = self.stored_refresh_token() else {
            return Err(ApiError::NoRefreshToken);
        };

        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.refresh_session(&refresh_token).await {
            Ok(response) => {
                let mut next = self.snapshot();
                if let Some(raw) = response.user {
                    next.user = Some(Profile::from(raw));
                }
                if next.user.is_none() {
                    self.api.set_bearer(Some(response.access_token.clone()));
                    match self.api.get_me().await {
                        Ok(profile) => next.user = Some(profile),
                        Err(err) => {
                            self.clear_local();
                            self.errors.fail(self.state, &err, |_| {});
                            return Err(err);
                        }
                    }
                }
                next.is_authenticated = true;
                next.access_token = Some(response.access_token.clone());
                next.refresh_token = response.refresh_token.or(Some(refresh_token));
                next.remember_me = remember_me;
                next.loading = false;
                self.api.set_bearer(Some(response.access_token));
                self.persist(&next);
                self.state.set(next);
                log::debug!("Access token refreshed");
                Ok(())
            }
            Err(err) if err.is_network() => {
                self.errors.fail(self.state, &err, |s| s.loading = false);
                Err(err)
            }
            Err(err) => {
                log::warn!("Refresh rejected; signing out: {}", err);
                self.clear_local();
                self.errors.fail(self.state, &err, |_| {});
                Err(err)
            }
        }
    }

    /// Refreshes first when the access token is known to be expired.
    pub async fn ensure_fresh(&self) -> Result<(), ApiError> {
        let state = self.snapshot();
        if state.is_authenticated && state.access_token_expired(time::now()) {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Signs out. The backend is told on a best-effort basis; local state
    /// and storage are cleared regardless of its answer.
    pub async fn logout(&self) {
        let refresh_token = self.stored_refresh_token().map(|(token, _)| token);
        if self.api.has_bearer() || refresh_token.is_some() {
            if let Err(err) = self.api.logout(refresh_token.as_deref()).await {
                log::warn!("Backend logout failed; clearing local session anyway: {}", err);
            }
        }
        self.clear_local();
        log::info!("Signed out");
    }

    pub async fn fetch_profile(&self) -> Result<Profile, ApiError> {
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.get_me().await {
            Ok(profile) => {
                let mut next = self.snapshot();
                if next.is_authenticated {
                    next.user = Some(profile.clone());
                }
                next.loading = false;
                if next.is_authenticated {
                    self.persist(&next);
                }
                self.state.set(next);
                Ok(profile)
            }
            Err(err) => {
                self.errors.fail(self.state, &err, |s| s.loading = false);
                Err(err)
            }
        }
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        validation::validate_email(email)?;
        self.errors.begin(self.state, |s| s.loading = true);
        let result = self
            .api
            .request_password_reset(&validation::normalize_email(email))
            .await;
        match &result {
            Ok(()) => self.state.update(|s| s.loading = false),
            Err(err) => self.errors.fail(self.state, err, |s| s.loading = false),
        }
        result
    }

    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<(), ApiError> {
        validation::require(token, "Reset token")?;
        if password.is_empty() {
            return Err(ApiError::validation("Password is required"));
        }
        if password != confirmation {
            return Err(ApiError::validation("Passwords do not match"));
        }
        self.errors.begin(self.state, |s| s.loading = true);
        let result = self.api.reset_password(token.trim(), password).await;
        match &result {
            Ok(()) => self.state.update(|s| s.loading = false),
            Err(err) => self.errors.fail(self.state, err, |s| s.loading = false),
        }
        result
    }
}
