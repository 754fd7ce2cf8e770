pub mod dashboard_task;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers so the binary can build the router from one place.
pub use rest::{get_view_handler, ingest_reading_handler, list_sessions_handler, set_target_handler};
pub use ws_handler::ws_handler;
