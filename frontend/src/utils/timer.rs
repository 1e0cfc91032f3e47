use std::time::Duration;

/// Runs `callback` once after `delay`.
///
/// Timers only exist in the browser; on the host target the callback is
/// dropped without running.
pub fn schedule(delay: Duration, callback: impl FnOnce() + 'static) {
    #[cfg(target_arch = "wasm32")]
    {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        gloo_timers::callback::Timeout::new(millis, callback).forget();
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (delay, callback);
    }
}

