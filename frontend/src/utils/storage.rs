//! Persistent storage adapter.
//!
//! Every read and write of browser storage goes through [`Storage`]. A handle
//! without a backend (host builds, browsers with storage disabled) turns all
//! operations into no-ops, and `get` returns `None`.

use serde::{de::DeserializeOwned, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Logical keys owned by the state models.
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const REFRESH_TOKEN: &str = "refresh-token";
    pub const USER_PROFILE: &str = "user-profile";
    pub const CURRENT_ORGANIZATION: &str = "current-organization";
    pub const USER_ORGANIZATIONS: &str = "user-organizations-cache";
    pub const ZOOM_CONNECTION: &str = "zoom-connection-bundle";
    pub const ZOOM_ACCESS_TOKEN: &str = "zoom-access-token";
    pub const ZOOM_REFRESH_TOKEN: &str = "zoom-refresh-token";
    pub const ZOOM_ACCOUNT: &str = "zoom-account-info";
    pub const USER_MEETINGS: &str = "cached-user-meetings";

    pub const SESSION: &[&str] = &[TOKEN, REFRESH_TOKEN, USER_PROFILE];
    pub const ORGANIZATION: &[&str] = &[CURRENT_ORGANIZATION, USER_ORGANIZATIONS];
    pub const ZOOM: &[&str] = &[
        ZOOM_CONNECTION,
        ZOOM_ACCESS_TOKEN,
        ZOOM_REFRESH_TOKEN,
        ZOOM_ACCOUNT,
    ];
    pub const ALL: &[&str] = &[
        TOKEN,
        REFRESH_TOKEN,
        USER_PROFILE,
        CURRENT_ORGANIZATION,
        USER_ORGANIZATIONS,
        ZOOM_CONNECTION,
        ZOOM_ACCESS_TOKEN,
        ZOOM_REFRESH_TOKEN,
        ZOOM_ACCOUNT,
        USER_MEETINGS,
    ];
}

/// Raw string key/value store behind a [`Storage`] handle.
pub trait StorageBackend {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), String>;
    fn remove_item(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), String> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }
}

#[cfg(target_arch = "wasm32")]
pub struct BrowserStorage(web_sys::Storage);

#[cfg(target_arch = "wasm32")]
impl StorageBackend for BrowserStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.0.get_item(key).ok().flatten()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), String> {
        self.0
            .set_item(key, value)
            .map_err(|_| format!("Failed to write `{}` to storage", key))
    }

    fn remove_item(&self, key: &str) {
        let _ = self.0.remove_item(key);
    }
}

#[cfg(target_arch = "wasm32")]
pub fn window() -> Result<web_sys::Window, String> {
    web_sys::window().ok_or_else(|| "No window object".to_string())
}

#[cfg(target_arch = "wasm32")]
fn local_storage() -> Result<web_sys::Storage, String> {
    window()?
        .local_storage()
        .map_err(|_| "No localStorage".to_string())?
        .ok_or_else(|| "No localStorage".to_string())
}

#[cfg(target_arch = "wasm32")]
fn session_storage() -> Result<web_sys::Storage, String> {
    window()?
        .session_storage()
        .map_err(|_| "No sessionStorage".to_string())?
        .ok_or_else(|| "No sessionStorage".to_string())
}

#[derive(Clone, Default)]
pub struct Storage {
    backend: Option<Rc<dyn StorageBackend>>,
}

impl Storage {
    pub fn with_backend(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Some(Rc::new(backend)),
        }
    }

    pub fn memory() -> Self {
        Self::with_backend(MemoryStorage::default())
    }

    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    /// `localStorage`, or an unavailable handle outside the browser.
    pub fn local() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            match local_storage() {
                Ok(storage) => return Self::with_backend(BrowserStorage(storage)),
                Err(err) => log::warn!("{}; persistence disabled", err),
            }
        }
        Self::unavailable()
    }

    /// `sessionStorage`, or an unavailable handle outside the browser.
    pub fn session() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            match session_storage() {
                Ok(storage) => return Self::with_backend(BrowserStorage(storage)),
                Err(err) => log::warn!("{}; persistence disabled", err),
            }
        }
        Self::unavailable()
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Reads and decodes `key`. An entry that is not valid JSON for `T` is
    /// removed and reported as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;
        let raw = backend.get_item(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("Dropping corrupted storage entry `{}`: {}", key, err);
                backend.remove_item(key);
                None
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                log::warn!("Failed to encode storage entry `{}`: {}", key, err);
                return;
            }
        };
        if let Err(err) = backend.set_item(key, &encoded) {
            log::warn!("{}", err);
        }
    }

    /// Writes `value`, or removes the key when it is `None`.
    pub fn set_optional<T: Serialize>(&self, key: &str, value: Option<&T>) {
        match value {
            Some(value) => self.set(key, value),
            None => self.remove(key),
        }
    }

    pub fn remove(&self, key: &str) {
        if let Some(backend) = self.backend.as_ref() {
            backend.remove_item(key);
        }
    }

    pub fn clear(&self, keys: &[&str]) {
        for key in keys {
            self.remove(key);
        }
    }

    pub(crate) fn raw(&self, key: &str) -> Option<String> {
        self.backend.as_ref()?.get_item(key)
    }

    #[cfg(test)]
    pub(crate) fn set_raw(&self, key: &str, value: &str) {
        if let Some(backend) = self.backend.as_ref() {
            let _ = backend.set_item(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: u32,
        name: String,
    }

    #[test]
    fn set_then_get_returns_stored_value() {
        let storage = Storage::memory();
        let sample = Sample {
            id: 7,
            name: "Acme".into(),
        };
        storage.set("sample", &sample);
        assert_eq!(storage.get::<Sample>("sample"), Some(sample));
    }

    #[test]
    fn corrupted_entry_is_removed_and_reads_as_none() {
        let storage = Storage::memory();
        storage.set_raw("sample", "{not json");
        assert_eq!(storage.get::<Sample>("sample"), None);
        assert!(storage.raw("sample").is_none());
    }

    #[test]
    fn entry_with_wrong_shape_is_removed() {
        let storage = Storage::memory();
        storage.set("sample", &vec![1, 2, 3]);
        assert_eq!(storage.get::<Sample>("sample"), None);
        assert!(storage.raw("sample").is_none());
    }

    #[test]
    fn unavailable_storage_is_a_no_op() {
        let storage = Storage::unavailable();
        assert!(!storage.is_available());
        storage.set("token", &"abc");
        storage.remove("token");
        storage.clear(keys::ALL);
        assert_eq!(storage.get::<String>("token"), None);
    }

    #[test]
    fn clear_removes_only_listed_keys() {
        let storage = Storage::memory();
        storage.set(keys::TOKEN, &"abc");
        storage.set(keys::CURRENT_ORGANIZATION, &"org");
        storage.clear(keys::SESSION);
        assert_eq!(storage.get::<String>(keys::TOKEN), None);
        assert_eq!(
            storage.get::<String>(keys::CURRENT_ORGANIZATION),
            Some("org".to_string())
        );
    }

    #[test]
    fn set_optional_none_removes_key() {
        let storage = Storage::memory();
        storage.set(keys::TOKEN, &"abc");
        storage.set_optional::<String>(keys::TOKEN, None);
        assert!(storage.raw(keys::TOKEN).is_none());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn browser_storage_is_unavailable_on_host() {
        assert!(!Storage::local().is_available());
        assert!(!Storage::session().is_available());
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn local_storage_round_trips_json_values() {
        let storage = Storage::local();
        assert!(storage.is_available());
        storage.set("meetscribe-test", &vec!["a", "b"]);
        assert_eq!(
            storage.get::<Vec<String>>("meetscribe-test"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        storage.remove("meetscribe-test");
        assert!(storage.raw("meetscribe-test").is_none());
    }
}
