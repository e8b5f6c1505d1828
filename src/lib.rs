pub mod api;
pub mod config;
pub mod progress;
pub mod shutdown;
pub mod store;
pub mod worker;
