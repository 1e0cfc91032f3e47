use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_ZOOM_AUTHORIZE_URL: &str = "https://zoom.us/oauth/authorize";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub api_base_url: Option<String>,
    pub zoom_client_id: Option<String>,
    pub zoom_authorize_url: String,
    pub zoom_redirect_uri: Option<String>,
    pub request_timeout_ms: u64,
    pub oauth_timeout_secs: u64,
    pub error_display_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            zoom_client_id: None,
            zoom_authorize_url: DEFAULT_ZOOM_AUTHORIZE_URL.to_string(),
            zoom_redirect_uri: None,
            request_timeout_ms: 30_000,
            oauth_timeout_secs: 300,
            error_display_ms: 5_000,
        }
    }
}

impl RuntimeConfig {
    pub fn api_base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL)
    }
}

static CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// The resolved configuration, or defaults before [`init`] completes.
pub fn current() -> RuntimeConfig {
    CONFIG.get().cloned().unwrap_or_default()
}

fn cache(config: RuntimeConfig) -> RuntimeConfig {
    let _ = CONFIG.set(config);
    current()
}

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::RuntimeConfig;

    fn read_global(name: &str) -> Option<RuntimeConfig> {
        let window = web_sys::window()?;
        let any = js_sys::Reflect::get(&window, &name.into()).ok()?;
        if any.is_undefined() || any.is_null() {
            return None;
        }
        let json = js_sys::JSON::stringify(&any).ok()?.as_string()?;
        parse_with_upper_keys(&json)
    }

    /// Accepts both `api_base_url` and `API_BASE_URL` style keys.
    fn parse_with_upper_keys(json: &str) -> Option<RuntimeConfig> {
        let value: serde_json::Value = serde_json::from_str(json).ok()?;
        let object = value.as_object()?;
        let normalized: serde_json::Map<String, serde_json::Value> = object
            .iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value.clone()))
            .collect();
        serde_json::from_value(serde_json::Value::Object(normalized)).ok()
    }

    /// `window.__MEETSCRIBE_ENV` (env.js) wins over `window.__MEETSCRIBE_CONFIG`.
    pub(super) fn snapshot_from_globals() -> Option<RuntimeConfig> {
        read_global("__MEETSCRIBE_ENV").or_else(|| read_global("__MEETSCRIBE_CONFIG"))
    }

    pub(super) fn write_window_config(config: &RuntimeConfig) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Ok(json) = serde_json::to_string(config) else {
            return;
        };
        if let Ok(value) = js_sys::JSON::parse(&json) {
            let _ = js_sys::Reflect::set(&window, &"__MEETSCRIBE_CONFIG".into(), &value);
        }
    }

    pub(super) async fn fetch_runtime_config() -> Option<RuntimeConfig> {
        let origin = web_sys::window()?.location().origin().ok()?;
        let resp = reqwest::get(format!("{}/config.json", origin)).await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json::<RuntimeConfig>().await.ok()
    }
}

/// Resolves the configuration once per process: page globals first, then
/// `./config.json`, then defaults.
pub async fn load() -> RuntimeConfig {
    if let Some(cached) = CONFIG.get() {
        return cached.clone();
    }
    #[cfg(target_arch = "wasm32")]
    {
        if let Some(existing) = browser::snapshot_from_globals() {
            return cache(existing);
        }
        if let Some(config) = browser::fetch_runtime_config().await {
            browser::write_window_config(&config);
            return cache(config);
        }
        log::warn!(
            "No runtime config found; using API base URL {}",
            DEFAULT_API_BASE_URL
        );
    }
    cache(RuntimeConfig::default())
}

pub async fn await_api_base_url() -> String {
    load().await.api_base_url().to_string()
}

pub async fn init() {
    let config = load().await;
    log::info!("Runtime config initialized (api: {})", config.api_base_url());
}
