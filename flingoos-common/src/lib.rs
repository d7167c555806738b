//! # Flingoos Common Library
//!
//! Shared code for the Flingoos session services including:
//! - Session event types (SessionEvent enum) and the EventBus notification hub
//! - Progress and workflow result payloads carried by events
//! - SSE streaming helpers
//! - Configuration loading and data folder resolution

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
