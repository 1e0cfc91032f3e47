//! Hands the [`AppState`] to views through leptos context.

use leptos::*;

use crate::state::AppState;

pub fn provide_app_state(state: AppState) {
    provide_context(state);
}

/// The state placed by the nearest [`AppProvider`], if any.
pub fn use_app_state() -> Option<AppState> {
    use_context::<AppState>()
}

#[component]
pub fn AppProvider(state: AppState, children: Children) -> impl IntoView {
    provide_app_state(state);
    view! { <>{children()}</> }
}

/// Signed-in user and the latest session error.
#[component]
pub fn SessionStatus() -> impl IntoView {
    let Some(app) = use_app_state() else {
        return view! { <p>"Application state is not available"</p> }.into_view();
    };
    let session = app.session.state();
    let who = move || {
        session.with(|s| {
            s.display_name()
                .map(|name| format!("Signed in as {}", name))
                .unwrap_or_else(|| "Signed out".to_string())
        })
    };
    let error = move || session.with(|s| s.error.clone());
    view! {
        <div class="session-status">
            <span>{who}</span>
            {move || error().map(|err| view! { <p class="error">{err}</p> })}
        </div>
    }
    .into_view()
}
