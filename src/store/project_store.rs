use crate::store::models::Project;

/// Store-level errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("project not found: {0}")]
    NotFound(String),

    /// The update closure refused the mutation; the record is unchanged.
    #[error("{0}")]
    Rejected(String),
}

/// Authoritative project storage.
///
/// The orchestration core treats the store as synchronous: every state or
/// progress mutation is persisted before anything else observes it. `update`
/// is the single serialization point for concurrent writers to one project,
/// so transition guards (at-most-one-active-run) run inside it.
pub trait ProjectStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Project>;

    fn save(&self, project: Project);

    /// Atomic read-modify-write. The closure observes the current record and
    /// may refuse the mutation by returning an error, which leaves the record
    /// untouched.
    fn update(
        &self,
        id: &str,
        f: &mut dyn FnMut(&mut Project) -> Result<(), String>,
    ) -> Result<Project, StoreError>;

    fn list(&self) -> Vec<Project>;

    fn delete(&self, id: &str) -> bool;

    fn get_file(&self, id: &str) -> Option<Vec<u8>>;

    fn save_file(&self, id: &str, content: Vec<u8>);
}
