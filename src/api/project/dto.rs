use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::{Project, ProjectStatus};

/// Project metadata response.
#[derive(Serialize)]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
    pub file_name: String,
    pub file_size: usize,
    pub status: ProjectStatus,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
}

impl From<&Project> for ProjectResponse {
    fn from(p: &Project) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            file_name: p.file_name.clone(),
            file_size: p.file_size,
            status: p.status,
            uploaded_at: p.uploaded_at,
            progress_message: p.progress_message.clone(),
            current_step: p.current_step,
            total_steps: p.total_steps,
        }
    }
}

/// Response for the `process` control operation.
#[derive(Serialize)]
pub struct ProcessingStatus {
    pub project_id: String,
    pub status: ProjectStatus,
    pub message: String,
}

/// Response for the `reset` control operation.
#[derive(Serialize)]
pub struct ResetResponse {
    pub message: String,
    pub status: ProjectStatus,
}

/// Compiled document response.
#[derive(Serialize)]
pub struct TechDocResponse {
    pub project_id: String,
    pub project_name: String,
    pub content: String,
    pub word_count: usize,
}

/// Payload of a `progress` stream event.
#[derive(Serialize)]
pub struct StreamProgressData {
    pub status: ProjectStatus,
    pub message: String,
    pub current_step: u32,
    pub total_steps: u32,
    pub timestamp: DateTime<Utc>,
}
