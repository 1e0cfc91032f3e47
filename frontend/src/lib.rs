//! Client state layer for the MeetScribe web app: session, organizations,
//! Zoom connection and meetings, backed by the MeetScribe REST API.

pub mod api;
pub mod app;
pub mod config;
pub mod state;
pub mod utils;

#[cfg(test)]
mod test_support;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() {
    use leptos::*;

    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"Logger already initialized".into());
    }
    log::info!("Starting MeetScribe frontend (wasm)");

    spawn_local(async move {
        config::init().await;
        let app_state = state::AppState::browser(&config::current());
        app_state.hydrate();
        mount_to_body(move || {
            view! {
                <app::AppProvider state=app_state>
                    <app::SessionStatus/>
                </app::AppProvider>
            }
        });
    });
}
