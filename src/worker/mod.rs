pub mod compiler;
pub mod dispatcher;
pub mod generator;
pub mod job_run;
pub mod roles;

// Re-export commonly used types
pub use dispatcher::DispatchSettings;
pub use generator::{Generator, SimulatedGenerator};
pub use job_run::JobRun;
pub use roles::{WorkerRole, WorkerResult};
