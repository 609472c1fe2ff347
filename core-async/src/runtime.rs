//! Runtime utilities that wrap Tokio's runtime primitives so that downstream
//! crates never need to depend on Tokio directly.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion using a lightweight runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be built. Intended for entry points and
/// tests generated by `#[core_async::main]` / `#[core_async::test]`.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Like [`block_on`], but returns `None` instead of panicking when no runtime
/// can be built.
pub fn try_block_on<F>(future: F) -> Option<F::Output>
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .ok()
        .map(|runtime| runtime.block_on(future))
}

/// Runs the future on a current-thread runtime whose clock starts paused.
///
/// Timers then complete instantly once every task is idle, so tests of
/// debounce windows and reconciliation ticks run without real waiting.
#[cfg(feature = "test-util")]
pub fn block_on_paused<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("core_async::runtime::block_on_paused: failed to build Tokio runtime")
        .block_on(future)
}
