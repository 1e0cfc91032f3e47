//! Authorization-code flow plumbing for third-party OAuth providers.
//!
//! [`AuthorizationFlow::start`] produces the provider URL plus a pending
//! future. The future settles exactly once: with the callback's `code`, with
//! the provider's `error`, or as [`ApiError::Cancelled`] when a handle calls
//! [`AuthorizationHandle::cancel`] or every handle is dropped.

use futures::channel::oneshot;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use std::cell::RefCell;
use std::rc::Rc;

use crate::api::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub state: String,
}

impl CallbackParams {
    /// Parses the query part of a callback URL (with or without the leading `?`).
    pub fn from_query(query: &str) -> Self {
        let query = query.split_once('?').map_or(query, |(_, rest)| rest);
        let query = query.split('#').next().unwrap_or_default();
        let mut params = Self::default();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value);
            match key {
                "code" => params.code = Some(value),
                "state" => params.state = Some(value),
                "error" => params.error = Some(value),
                "error_description" => params.error_description = Some(value),
                _ => {}
            }
        }
        params
    }

    fn into_outcome(self) -> Result<AuthorizationCode, ApiError> {
        if let Some(error) = self.error {
            let message = self.error_description.unwrap_or_else(|| error.clone());
            if error == "access_denied" {
                log::info!("Authorization declined at the provider: {}", message);
                return Err(ApiError::Cancelled);
            }
            return Err(ApiError::validation(format!(
                "Authorization failed: {}",
                message
            )));
        }
        match (self.code, self.state) {
            (Some(code), Some(state)) if !code.is_empty() => Ok(AuthorizationCode { code, state }),
            _ => Err(ApiError::validation(
                "Authorization callback is missing the code or state",
            )),
        }
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, NON_ALPHANUMERIC).to_string()
}

pub fn build_authorize_url(
    authorize_url: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> String {
    let separator = if authorize_url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}response_type=code&client_id={}&redirect_uri={}&state={}",
        authorize_url,
        separator,
        encode_component(client_id),
        encode_component(redirect_uri),
        encode_component(state)
    )
}

type Outcome = Result<AuthorizationCode, ApiError>;

/// Resolves or cancels a pending [`AuthorizationFlow`].
#[derive(Clone)]
pub struct AuthorizationHandle {
    sender: Rc<RefCell<Option<oneshot::Sender<Outcome>>>>,
    state: Rc<str>,
}

impl AuthorizationHandle {
    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        self.sender
            .borrow()
            .as_ref()
            .map(|sender| !sender.is_canceled())
            .unwrap_or(false)
    }

    /// Settles the flow from the provider callback. Returns `false` when the
    /// flow had already settled.
    pub fn resolve(&self, params: CallbackParams) -> bool {
        self.settle(params.into_outcome())
    }

    pub fn cancel(&self) -> bool {
        self.settle(Err(ApiError::Cancelled))
    }

    fn settle(&self, outcome: Outcome) -> bool {
        match self.sender.borrow_mut().take() {
            Some(sender) => sender.send(outcome).is_ok(),
            None => false,
        }
    }
}

pub struct AuthorizationFlow {
    pub request: AuthorizationRequest,
    handle: AuthorizationHandle,
    receiver: oneshot::Receiver<Outcome>,
}

impl AuthorizationFlow {
    pub fn start(authorize_url: &str, client_id: &str, redirect_uri: &str) -> Self {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = build_authorize_url(authorize_url, client_id, redirect_uri, &state);
        let (sender, receiver) = oneshot::channel();
        Self {
            handle: AuthorizationHandle {
                sender: Rc::new(RefCell::new(Some(sender))),
                state: Rc::from(state.as_str()),
            },
            request: AuthorizationRequest {
                url,
                state,
                redirect_uri: redirect_uri.to_string(),
            },
            receiver,
        }
    }

    pub fn handle(&self) -> AuthorizationHandle {
        self.handle.clone()
    }

    pub async fn result(self) -> Result<AuthorizationCode, ApiError> {
        let Self {
            handle, receiver, ..
        } = self;
        // Keep no sender alive on our side: once every external handle is
        // gone the receiver observes cancellation.
        drop(handle);
        receiver.await.unwrap_or(Err(ApiError::Cancelled))
    }
}
