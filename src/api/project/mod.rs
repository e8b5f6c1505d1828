pub mod dto;
pub mod handlers;
pub mod models;
pub mod service;

// Re-export commonly used types
pub use handlers::project_config;
pub use service::{ProjectService, ServiceError, StreamSettings};
