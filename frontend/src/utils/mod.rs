pub mod oauth;
#[cfg(target_arch = "wasm32")]
pub mod popup;
pub mod storage;
pub mod time;
pub mod timer;
pub mod validation;
