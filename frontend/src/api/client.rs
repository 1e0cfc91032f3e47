use reqwest::{header::HeaderMap, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::{
    api::types::{ApiError, NetworkErrorKind},
    config,
};

type UnauthorizedHook = Rc<dyn Fn()>;

/// Whether a call is made on behalf of the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Auth {
    /// Attach the bearer credential; a 401 invalidates the session.
    Bearer,
    /// Anonymous call (login, registration, refresh).
    Anonymous,
}

/// HTTP client for the backend API.
///
/// Clones share the bearer credential slot and the unauthorized hook, so a
/// credential set through one clone is used by every other clone. Separate
/// `ApiClient::new*` instances are fully independent.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Option<String>,
    timeout: Option<Duration>,
    credential: Rc<RefCell<Option<String>>>,
    on_unauthorized: Rc<RefCell<Option<UnauthorizedHook>>>,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: None,
            timeout: None,
            credential: Rc::new(RefCell::new(None)),
            on_unauthorized: Rc::new(RefCell::new(None)),
        }
    }

    pub fn new_with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::new()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }

    pub(crate) async fn url(&self, path: &str) -> String {
        let base = match &self.base_url {
            Some(base) => base.clone(),
            None => config::await_api_base_url().await,
        };
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
            .unwrap_or_else(|| Duration::from_millis(config::current().request_timeout_ms))
    }

    pub fn set_bearer(&self, token: Option<String>) {
        *self.credential.borrow_mut() = token;
    }

    pub fn bearer(&self) -> Option<String> {
        self.credential.borrow().clone()
    }

    pub fn has_bearer(&self) -> bool {
        self.credential.borrow().is_some()
    }

    /// Registers the callback run when an authenticated call comes back 401.
    pub fn on_unauthorized(&self, hook: impl Fn() + 'static) {
        *self.on_unauthorized.borrow_mut() = Some(Rc::new(hook));
    }

    fn auth_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.credential.borrow().as_ref() {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", token)
                    .parse()
                    .map_err(|_| ApiError::validation("Invalid token format"))?,
            );
        }
        Ok(headers)
    }

    fn handle_unauthorized_status(&self, status: StatusCode, auth: Auth) {
        if status != StatusCode::UNAUTHORIZED || auth != Auth::Bearer || !self.has_bearer() {
            return;
        }
        log::warn!("Backend rejected the session credential; signing out locally");
        self.set_bearer(None);
        let hook = self.on_unauthorized.borrow().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Sends the request and maps transport failures and non-2xx statuses
    /// onto [`ApiError`].
    pub(crate) async fn dispatch(
        &self,
        request: RequestBuilder,
        auth: Auth,
    ) -> Result<Response, ApiError> {
        let mut request = request.timeout(self.request_timeout());
        if auth == Auth::Bearer {
            request = request.headers(self.auth_headers()?);
        }
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        self.handle_unauthorized_status(status, auth);
        let body = response.text().await.unwrap_or_default();
        let error = ApiError::from_response(status.as_u16(), &body);
        if status.is_server_error() {
            log::error!("Backend error {}: {}", status.as_u16(), body);
        } else {
            log::debug!("Request rejected with {}: {}", status.as_u16(), error);
        }
        Err(error)
    }

    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        auth: Auth,
    ) -> Result<T, ApiError> {
        let response = self.dispatch(request, auth).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Like [`execute`](Self::execute) for endpoints whose body is irrelevant.
    pub(crate) async fn execute_empty(
        &self,
        request: RequestBuilder,
        auth: Auth,
    ) -> Result<(), ApiError> {
        self.dispatch(request, auth).await.map(|_| ())
    }
}

fn transport_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::network(
            NetworkErrorKind::Timeout,
            "The server took too long to respond. Please try again.",
        )
    } else {
        log::warn!("Request failed: {}", error);
        ApiError::network(
            NetworkErrorKind::Unreachable,
            "Unable to reach the server. Check your connection and try again.",
        )
    }
}
