use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a project.
///
/// Valid transitions: `Uploaded -> Processing -> {Completed, Error}`, and
/// `Completed`/`Error` back to `Uploaded` via an explicit reset. Everything
/// else is rejected by the service layer.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Uploaded,
    Processing,
    Completed,
    Error,
}

impl ProjectStatus {
    /// Terminal statuses end an active progress stream.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Error)
    }

    /// Whether a `process` request may start a new run from this status.
    /// `Completed` is excluded: re-processing a finished project is a no-op.
    pub fn accepts_process(self) -> bool {
        matches!(self, ProjectStatus::Uploaded | ProjectStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Uploaded => "uploaded",
            ProjectStatus::Processing => "processing",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Error => "error",
        }
    }
}

/// Summary counts extracted from the generated requirements section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequirementsSummary {
    pub functional_count: usize,
    pub non_functional_count: usize,
    pub user_roles_count: usize,
    pub use_cases_count: usize,
    pub features_count: usize,
}

/// Authoritative record for one uploaded SRS document.
///
/// Mutated exclusively through `ProjectStore::update` by the service layer
/// and the active job run; the progress stream only ever reads it.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub file_name: String,
    pub file_size: usize,
    pub status: ProjectStatus,
    pub uploaded_at: DateTime<Utc>,
    pub progress_message: Option<String>,
    pub current_step: Option<u32>,
    pub total_steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<RequirementsSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech_doc: Option<String>,
}

impl Project {
    pub fn new(id: String, name: String, file_name: String, file_size: usize) -> Self {
        Self {
            id,
            name,
            file_name,
            file_size,
            status: ProjectStatus::Uploaded,
            uploaded_at: Utc::now(),
            progress_message: None,
            current_step: None,
            total_steps: None,
            requirements: None,
            tech_doc: None,
        }
    }

    /// Clear everything a reset is supposed to clear, keeping identity and
    /// file metadata intact.
    pub fn clear_results(&mut self) {
        self.status = ProjectStatus::Uploaded;
        self.progress_message = Some("Ready to process".to_string());
        self.current_step = None;
        self.total_steps = None;
        self.requirements = None;
        self.tech_doc = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(ProjectStatus::Completed.is_terminal());
        assert!(ProjectStatus::Error.is_terminal());
        assert!(!ProjectStatus::Uploaded.is_terminal());
        assert!(!ProjectStatus::Processing.is_terminal());
    }

    #[test]
    fn process_guard_accepts_uploaded_and_error_only() {
        assert!(ProjectStatus::Uploaded.accepts_process());
        assert!(ProjectStatus::Error.accepts_process());
        assert!(!ProjectStatus::Processing.accepts_process());
        assert!(!ProjectStatus::Completed.accepts_process());
    }

    #[test]
    fn reset_clears_results_and_progress() {
        let mut project = Project::new(
            "p1".into(),
            "Demo".into(),
            "demo.txt".into(),
            42,
        );
        project.status = ProjectStatus::Completed;
        project.tech_doc = Some("doc".into());
        project.requirements = Some(RequirementsSummary::default());
        project.current_step = Some(4);
        project.total_steps = Some(4);

        project.clear_results();

        assert_eq!(project.status, ProjectStatus::Uploaded);
        assert!(project.tech_doc.is_none());
        assert!(project.requirements.is_none());
        assert!(project.current_step.is_none());
        assert_eq!(project.file_size, 42);
    }
}
