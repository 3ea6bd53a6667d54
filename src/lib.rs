//! Orgtree - department, position and custom field administration
//!
//! Departments and positions are self-referencing trees managed through one
//! generic hierarchy service; custom fields are a flat ordered list.

pub mod config;
pub mod custom_field;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod hierarchy;
pub mod ordering;
pub mod routes;
pub mod state;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
