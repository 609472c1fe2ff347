//! Task spawning and execution.
//!
//! Platform bridges deliver callbacks (remote commands, player observers) on
//! threads the core does not control, which may not be inside a tokio
//! runtime. [`spawn_detached`] covers that case: it spawns on the current
//! runtime when there is one and otherwise drives the future on a short-lived
//! helper thread.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, AbortHandle, JoinError, JoinHandle};

use std::future::Future;

/// Spawns a new asynchronous task on the current tokio runtime.
///
/// # Panics
///
/// Panics when called outside a runtime. Use [`spawn_detached`] from
/// platform callback threads.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Runs `future` without waiting for it and without requiring a runtime
/// context on the calling thread.
///
/// Returns the join handle when the future was spawned on a runtime, and
/// `None` when it was handed to a helper thread.
pub fn spawn_detached<F>(future: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future)),
        Err(_) => {
            std::thread::spawn(move || {
                let _ = crate::runtime::try_block_on(future);
            });
            None
        }
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_spawn_detached_outside_runtime_runs_on_helper_thread() {
        let (tx, rx) = mpsc::channel();
        let handle = spawn_detached(async move {
            tx.send(7).unwrap();
        });
        assert!(handle.is_none());
        assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap(), 7);
    }

    #[tokio::test]
    async fn test_spawn_detached_inside_runtime_returns_handle() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = spawn_detached(async move {
            let _ = tx.send(());
        });
        assert!(handle.is_some());
        rx.await.unwrap();
    }
}
