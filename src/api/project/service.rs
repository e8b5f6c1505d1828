use std::fmt;
use std::sync::Arc;

use actix_web::{HttpResponse, ResponseError};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::project::dto::{ProcessingStatus, ResetResponse, TechDocResponse};
use crate::api::validation::ErrorResponse;
use crate::progress::ProgressRegistry;
use crate::store::{Project, ProjectStatus, ProjectStore, RequirementsSummary, StoreError};
use crate::worker::{DispatchSettings, Generator, JobRun};

/// Service-level errors
#[derive(Debug)]
pub enum ServiceError {
    /// Project not found
    NotFound(String),

    /// Request is invalid (bad file type, empty payload, not yet processed)
    InvalidInput(String),

    /// Transition refused by the state machine
    Conflict(String),

    /// Store operation failed
    Storage(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NotFound(id) => write!(f, "Project not found: {id}"),
            ServiceError::InvalidInput(msg) => write!(f, "Invalid request: {msg}"),
            ServiceError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            ServiceError::Storage(msg) => write!(f, "Storage error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::NotFound(_) => {
                warn!("{}", self);
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "Not found".to_string(),
                    fields: serde_json::json!({"message": "Project not found"}),
                })
            }
            ServiceError::InvalidInput(msg) => {
                warn!("{}", self);
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Invalid request".to_string(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
            ServiceError::Conflict(msg) => {
                warn!("{}", self);
                HttpResponse::Conflict().json(ErrorResponse {
                    error: "Conflict".to_string(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
            ServiceError::Storage(msg) => {
                error!("{}", self);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
        }
    }
}

/// Streaming protocol knobs, configurable for tests.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub heartbeat_ms: u64,
    pub max_lifetime_secs: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            heartbeat_ms: 1500,
            max_lifetime_secs: 300,
        }
    }
}

/// Project service: every lifecycle transition funnels through here, so the
/// state machine guards live in exactly one place.
pub struct ProjectService {
    store: Arc<dyn ProjectStore>,
    registry: Arc<ProgressRegistry>,
    generator: Arc<dyn Generator>,
    dispatch_settings: DispatchSettings,
    stream_settings: StreamSettings,
}

impl ProjectService {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        registry: Arc<ProgressRegistry>,
        generator: Arc<dyn Generator>,
        dispatch_settings: DispatchSettings,
        stream_settings: StreamSettings,
    ) -> Self {
        Self {
            store,
            registry,
            generator,
            dispatch_settings,
            stream_settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ProjectStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ProgressRegistry> {
        &self.registry
    }

    pub fn stream_settings(&self) -> &StreamSettings {
        &self.stream_settings
    }

    /// Create a project from a named source document.
    pub fn create_project(&self, name: &str, file_name: &str, content: Vec<u8>) -> Project {
        let id = Uuid::new_v4().to_string();
        let project = Project::new(id.clone(), name.to_string(), file_name.to_string(), content.len());
        self.store.save(project.clone());
        self.store.save_file(&id, content);
        info!("Project created: {} - {}", id, file_name);
        project
    }

    pub fn list_projects(&self) -> Vec<Project> {
        self.store.list()
    }

    pub fn get_project(&self, id: &str) -> Result<Project, ServiceError> {
        self.store
            .get(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    /// Control surface: start processing.
    ///
    /// Guards: a `completed` project is a no-op success without a new run; a
    /// `processing` project rejects the request. The status flip happens as a
    /// compare-and-set inside the store's lock, so two concurrent calls start
    /// exactly one run.
    pub fn start_processing(&self, id: &str) -> Result<ProcessingStatus, ServiceError> {
        let project = self.get_project(id)?;

        if project.status == ProjectStatus::Completed {
            return Ok(ProcessingStatus {
                project_id: id.to_string(),
                status: ProjectStatus::Completed,
                message: "Project already processed".to_string(),
            });
        }

        let project = self
            .store
            .update(id, &mut |p| {
                if !p.status.accepts_process() {
                    return Err(format!("Project is already {}", p.status.as_str()));
                }
                p.status = ProjectStatus::Processing;
                p.progress_message = Some("Processing started".to_string());
                p.current_step = None;
                p.total_steps = None;
                Ok(())
            })
            .map_err(|e| match e {
                StoreError::NotFound(id) => ServiceError::NotFound(id),
                StoreError::Rejected(msg) => ServiceError::Conflict(msg),
            })?;

        let source_text = match self.store.get_file(id) {
            Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            None => {
                // Run start failure: the transition already happened, so
                // surface it on the record.
                let _ = self.store.update(id, &mut |p| {
                    p.status = ProjectStatus::Error;
                    p.progress_message = Some("Error: source document missing".to_string());
                    Ok(())
                });
                return Err(ServiceError::Storage("source document missing".to_string()));
            }
        };

        let run = JobRun {
            run_id: Uuid::new_v4().to_string(),
            project_id: id.to_string(),
            project_name: project.name.clone(),
            source_text: Arc::new(source_text),
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            generator: Arc::clone(&self.generator),
            settings: self.dispatch_settings.clone(),
        };

        // The caller gets its response immediately; the run continues in the
        // background and reports through the store and the progress channel.
        tokio::spawn(run.run());

        Ok(ProcessingStatus {
            project_id: id.to_string(),
            status: ProjectStatus::Processing,
            message: "Processing started".to_string(),
        })
    }

    /// Control surface: reset back to `uploaded`, clearing results and
    /// progress and detaching the progress channel.
    ///
    /// No mid-run cancellation exists: a reset during an active run leaves
    /// the run executing, and its eventual completion overwrites this state.
    pub fn reset(&self, id: &str) -> Result<ResetResponse, ServiceError> {
        let project = self
            .store
            .update(id, &mut |p| {
                if p.status == ProjectStatus::Processing {
                    warn!("Reset during active run for project {}; run keeps executing", p.id);
                }
                p.clear_results();
                Ok(())
            })
            .map_err(|e| match e {
                StoreError::NotFound(id) => ServiceError::NotFound(id),
                StoreError::Rejected(msg) => ServiceError::Storage(msg),
            })?;

        self.registry.remove(id);
        info!("Reset project: {}", id);

        Ok(ResetResponse {
            message: "Project reset successfully".to_string(),
            status: project.status,
        })
    }

    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        if !self.store.delete(id) {
            return Err(ServiceError::NotFound(id.to_string()));
        }
        self.registry.remove(id);
        info!("Project deleted: {}", id);
        Ok(())
    }

    pub fn techdoc(&self, id: &str) -> Result<TechDocResponse, ServiceError> {
        let project = self.get_project(id)?;
        let content = project.tech_doc.ok_or_else(|| {
            ServiceError::InvalidInput("Technical documentation not yet generated".to_string())
        })?;
        let word_count = content.split_whitespace().count();
        Ok(TechDocResponse {
            project_id: project.id,
            project_name: project.name,
            content,
            word_count,
        })
    }

    pub fn requirements(&self, id: &str) -> Result<RequirementsSummary, ServiceError> {
        let project = self.get_project(id)?;
        project
            .requirements
            .ok_or_else(|| ServiceError::InvalidInput("Project not yet processed".to_string()))
    }

    /// Startup recovery: any project stuck in `processing` from a previous
    /// process lifetime is forced to `error`. In-flight runs are never
    /// resumed across restarts.
    pub fn recover_interrupted(&self) -> usize {
        let mut recovered = 0;
        for project in self.store.list() {
            if project.status == ProjectStatus::Processing {
                let result = self.store.update(&project.id, &mut |p| {
                    p.status = ProjectStatus::Error;
                    p.progress_message =
                        Some("Processing interrupted - service restarted".to_string());
                    Ok(())
                });
                if result.is_ok() {
                    warn!("Reset stuck project: {}", project.id);
                    recovered += 1;
                }
            }
        }
        recovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryProjectStore;
    use crate::worker::generator::testing::CountingGenerator;
    use crate::worker::SimulatedGenerator;
    use tokio::time::{sleep, timeout, Duration};

    fn service_with(generator: Arc<dyn Generator>) -> (Arc<ProjectService>, Arc<MemoryProjectStore>) {
        let store = Arc::new(MemoryProjectStore::new());
        let service = Arc::new(ProjectService::new(
            store.clone(),
            Arc::new(ProgressRegistry::new()),
            generator,
            DispatchSettings {
                attempts: 1,
                timeout_secs: 5,
                jitter_ms: 0,
            },
            StreamSettings::default(),
        ));
        (service, store)
    }

    async fn wait_for_terminal(store: &MemoryProjectStore, id: &str) -> ProjectStatus {
        timeout(Duration::from_secs(10), async {
            loop {
                if let Some(p) = store.get(id) {
                    if p.status.is_terminal() {
                        return p.status;
                    }
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("run did not reach a terminal status")
    }

    #[tokio::test]
    async fn process_on_completed_project_is_a_no_op() {
        let generator = Arc::new(CountingGenerator::new());
        let (service, store) = service_with(generator.clone());

        let project = service.create_project("Demo", "demo.txt", b"content".to_vec());
        store
            .update(&project.id, &mut |p| {
                p.status = ProjectStatus::Completed;
                Ok(())
            })
            .unwrap();

        let status = service.start_processing(&project.id).unwrap();
        assert_eq!(status.status, ProjectStatus::Completed);
        assert!(status.message.contains("already processed"));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_process_calls_start_exactly_one_run() {
        let generator = Arc::new(CountingGenerator::new());
        let (service, store) = service_with(generator.clone());
        let project = service.create_project("Demo", "demo.txt", b"source text".to_vec());

        let s1 = service.clone();
        let s2 = service.clone();
        let id1 = project.id.clone();
        let id2 = project.id.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { s1.start_processing(&id1) }),
            tokio::spawn(async move { s2.start_processing(&id2) }),
        );
        let results = [r1.unwrap(), r2.unwrap()];

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(ServiceError::Conflict(_))))
            .count();
        assert_eq!(accepted, 1, "exactly one call must win the transition");
        assert_eq!(rejected, 1);

        assert_eq!(wait_for_terminal(&store, &project.id).await, ProjectStatus::Completed);
        // One run means one generation call per worker role.
        assert_eq!(generator.call_count(), 4);
    }

    #[tokio::test]
    async fn interrupted_projects_are_recovered_to_error_at_startup() {
        let (service, store) = service_with(Arc::new(SimulatedGenerator::instant()));
        let project = service.create_project("Demo", "demo.txt", b"content".to_vec());
        store
            .update(&project.id, &mut |p| {
                p.status = ProjectStatus::Processing;
                Ok(())
            })
            .unwrap();

        assert_eq!(service.recover_interrupted(), 1);

        let recovered = store.get(&project.id).unwrap();
        assert_eq!(recovered.status, ProjectStatus::Error);
        assert!(recovered.progress_message.unwrap().contains("interrupted"));
    }

    #[tokio::test]
    async fn full_scenario_upload_process_poll_to_completed() {
        let (service, store) = service_with(Arc::new(SimulatedGenerator::instant()));

        let content = "specification line\n".repeat(527); // ~10,000 characters
        assert!(content.len() >= 10_000);
        let project = service.create_project("spec", "spec.txt", content.into_bytes());

        let status = service.start_processing(&project.id).unwrap();
        assert_eq!(status.status, ProjectStatus::Processing);

        assert_eq!(wait_for_terminal(&store, &project.id).await, ProjectStatus::Completed);

        let doc = service.techdoc(&project.id).unwrap();
        assert!(!doc.content.is_empty());
        for role in crate::worker::WorkerRole::ALL {
            assert!(doc.content.contains(role.section_title()));
        }

        let finished = store.get(&project.id).unwrap();
        assert_eq!(finished.current_step, Some(4));
        assert_eq!(finished.total_steps, Some(4));
    }

    #[tokio::test]
    async fn reset_returns_project_to_uploaded_and_clears_results() {
        let (service, store) = service_with(Arc::new(SimulatedGenerator::instant()));
        let project = service.create_project("Demo", "demo.txt", b"content".to_vec());

        service.start_processing(&project.id).unwrap();
        wait_for_terminal(&store, &project.id).await;

        let reset = service.reset(&project.id).unwrap();
        assert_eq!(reset.status, ProjectStatus::Uploaded);

        let cleared = store.get(&project.id).unwrap();
        assert!(cleared.tech_doc.is_none());
        assert!(cleared.requirements.is_none());
        assert!(cleared.current_step.is_none());

        // The project can be processed again after reset.
        let again = service.start_processing(&project.id).unwrap();
        assert_eq!(again.status, ProjectStatus::Processing);
        assert_eq!(wait_for_terminal(&store, &project.id).await, ProjectStatus::Completed);
    }

    #[tokio::test]
    async fn techdoc_before_processing_is_rejected() {
        let (service, _store) = service_with(Arc::new(SimulatedGenerator::instant()));
        let project = service.create_project("Demo", "demo.txt", b"content".to_vec());
        assert!(matches!(
            service.techdoc(&project.id),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            service.requirements(&project.id),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_project_and_channel() {
        let (service, store) = service_with(Arc::new(SimulatedGenerator::instant()));
        let project = service.create_project("Demo", "demo.txt", b"content".to_vec());
        service.registry().publish(&project.id, 25, "step", None);

        service.delete(&project.id).unwrap();
        assert!(store.get(&project.id).is_none());
        assert!(matches!(
            service.delete(&project.id),
            Err(ServiceError::NotFound(_))
        ));
    }
}
