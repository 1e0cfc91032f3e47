//! Browser popup driving an [`AuthorizationHandle`].
//!
//! The callback page either posts its query string to the opener or is read
//! directly once the popup is back on our origin. Closing the popup before a
//! callback arrives cancels the flow.

use gloo_timers::callback::Interval;
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::MessageEvent;

use crate::{
    api::ApiError,
    utils::{
        oauth::{AuthorizationHandle, AuthorizationRequest, CallbackParams},
        storage::window,
    },
};

const POPUP_FEATURES: &str = "width=600,height=700,menubar=no,toolbar=no";
const POLL_INTERVAL_MS: u32 = 500;

/// Keeps the popup watched while alive; dropping it detaches every listener
/// and closes the popup.
pub struct Popup {
    popup: web_sys::Window,
    listener: Closure<dyn FnMut(MessageEvent)>,
    _watcher: Interval,
}

impl Drop for Popup {
    fn drop(&mut self) {
        if let Ok(window) = window() {
            let _ = window.remove_event_listener_with_callback(
                "message",
                self.listener.as_ref().unchecked_ref(),
            );
        }
        if !self.popup.closed().unwrap_or(true) {
            let _ = self.popup.close();
        }
    }
}

pub fn open(request: &AuthorizationRequest, handle: AuthorizationHandle) -> Result<Popup, ApiError> {
    let window = window().map_err(ApiError::validation)?;
    let popup = window
        .open_with_url_and_target_and_features(&request.url, "zoom-oauth", POPUP_FEATURES)
        .ok()
        .flatten()
        .ok_or_else(|| {
            ApiError::validation("The Zoom window was blocked. Allow popups and try again.")
        })?;
    let origin = window.location().origin().unwrap_or_default();

    let message_handle = handle.clone();
    let listener = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
        if event.origin() != origin {
            return;
        }
        if let Some(query) = event.data().as_string() {
            let params = CallbackParams::from_query(&query);
            if params.code.is_some() || params.error.is_some() {
                message_handle.resolve(params);
            }
        }
    });
    window
        .add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
        .map_err(|_| ApiError::validation("Unable to listen for the Zoom callback"))?;

    let watched = popup.clone();
    let redirect_uri = request.redirect_uri.clone();
    let watcher = Interval::new(POLL_INTERVAL_MS, move || {
        if !handle.is_pending() {
            return;
        }
        if watched.closed().unwrap_or(true) {
            log::info!("Zoom authorization window closed");
            handle.cancel();
            return;
        }
        // Cross-origin until the provider redirects back to us.
        if let Ok(href) = watched.location().href() {
            if href.starts_with(&redirect_uri) {
                handle.resolve(CallbackParams::from_query(&href));
                let _ = watched.close();
            }
        }
    });

    Ok(Popup {
        popup,
        listener,
        _watcher: watcher,
    })
}
