//! HTTP surface: OAuth login, the JSON API and the HTML shell.

pub mod api;
pub mod server;
pub mod session;

pub use api::{AppState, SharedState};
pub use server::{build_router, build_state, start_server};
