use std::future::Future;

pub fn with_runtime<T>(f: impl FnOnce() -> T) -> T {
    let runtime = leptos::create_runtime();
    let result = f();
    runtime.dispose();
    result
}

/// Async flavour of [`with_runtime`]; the runtime lives until `f`'s future
/// completes.
pub async fn with_runtime_async<F, Fut, T>(f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let runtime = leptos::create_runtime();
    let result = f().await;
    runtime.dispose();
    result
}
