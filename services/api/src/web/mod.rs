pub mod activity;
pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the handlers the binary wires into the router.
pub use activity::activity_ws_handler;
pub use middleware::require_session;
