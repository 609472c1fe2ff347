//! Marker traits that keep bridge trait bounds in one place.
//!
//! Bridge implementations are shared across the coordination thread, timer
//! tasks and platform callback threads, so every capability must be
//! `Send + Sync`. Spelling the bound through these markers keeps the trait
//! definitions short and lets the bound evolve in one spot.

/// Marker trait for capabilities shared across threads.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}

/// Marker trait for values moved into spawned tasks.
pub trait PlatformSend: Send {}

impl<T> PlatformSend for T where T: Send {}
