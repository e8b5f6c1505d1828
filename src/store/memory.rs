use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::store::models::Project;
use crate::store::project_store::{ProjectStore, StoreError};

/// In-memory `ProjectStore`.
///
/// A single `RwLock` over both maps keeps `update` atomic with respect to
/// every other accessor, which is what serializes concurrent writers to the
/// same project (progress writes from the run vs. transitions from the API).
pub struct MemoryProjectStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    projects: HashMap<String, Project>,
    files: HashMap<String, Vec<u8>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryProjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectStore for MemoryProjectStore {
    fn get(&self, id: &str) -> Option<Project> {
        self.inner.read().unwrap().projects.get(id).cloned()
    }

    fn save(&self, project: Project) {
        debug!("Saving project: id={}, status={:?}", project.id, project.status);
        self.inner
            .write()
            .unwrap()
            .projects
            .insert(project.id.clone(), project);
    }

    fn update(
        &self,
        id: &str,
        f: &mut dyn FnMut(&mut Project) -> Result<(), String>,
    ) -> Result<Project, StoreError> {
        let mut inner = self.inner.write().unwrap();

        // Apply to a copy so a rejected update leaves the record untouched.
        let mut candidate = inner
            .projects
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        f(&mut candidate).map_err(StoreError::Rejected)?;
        inner.projects.insert(id.to_string(), candidate.clone());
        Ok(candidate)
    }

    fn list(&self) -> Vec<Project> {
        let mut projects: Vec<Project> =
            self.inner.read().unwrap().projects.values().cloned().collect();
        projects.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        projects
    }

    fn delete(&self, id: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        inner.files.remove(id);
        inner.projects.remove(id).is_some()
    }

    fn get_file(&self, id: &str) -> Option<Vec<u8>> {
        self.inner.read().unwrap().files.get(id).cloned()
    }

    fn save_file(&self, id: &str, content: Vec<u8>) {
        debug!("Saving file for project {} ({} bytes)", id, content.len());
        self.inner.write().unwrap().files.insert(id.to_string(), content);
    }
}
