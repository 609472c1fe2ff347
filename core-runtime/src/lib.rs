//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the video playback core:
//! - Logging and tracing infrastructure
//! - Configuration management (host bridges and feature flags)
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the playback and service
//! crates depend on. It establishes the logging conventions, the fail-fast
//! configuration checks and the broadcast channel that carries every
//! host-facing event.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
