pub mod auth;
pub mod config;
pub mod error;
pub mod forms;
pub mod models;
pub mod openapi;
pub mod rate_limit;
pub mod render;
pub mod repo;
pub mod routes;
pub mod security;
pub mod session;
pub mod upload;

// Re-export commonly used items for tests / binaries
pub use config::Config;
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
