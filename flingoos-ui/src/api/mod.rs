//! HTTP API handlers for flingoos-ui
//!
//! REST endpoints for session control plus the SSE event stream.

pub mod health;
pub mod session;
pub mod sse;

pub use health::health_routes;
pub use session::session_routes;
pub use sse::event_stream;
