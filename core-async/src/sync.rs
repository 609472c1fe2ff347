//! Synchronization primitives.
//!
//! Async-aware channels and locks come from tokio. `CancellationToken` comes
//! from tokio-util and is used to stop long-running loops (reconciliation
//! ticks, progress reporting) from the outside.
//!
//! Playback state itself is guarded by `parking_lot` locks in the core
//! crates, since it is never held across an `.await`.

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Barrier, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::{CancellationToken, DropGuard};
