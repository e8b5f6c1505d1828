pub mod memory;
pub mod models;
pub mod project_store;

// Re-export commonly used types
pub use memory::MemoryProjectStore;
pub use models::{Project, ProjectStatus, RequirementsSummary};
pub use project_store::{ProjectStore, StoreError};
