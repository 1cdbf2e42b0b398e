//! Seedreel Web - HTTP and WebSocket front end
//!
//! Serves the control channel clients use to start sessions, the range
//! streaming endpoint for the primary media file, WebVTT captions and the
//! static player assets.

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]

pub mod error;
pub mod handlers;
pub mod realtime;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, ServerError, router, run_server};
