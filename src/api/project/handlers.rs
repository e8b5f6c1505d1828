use actix_web::{
    delete, get, post,
    web::{self, Data, Path, ServiceConfig},
    HttpResponse, Responder,
};
use actix_multipart::form::{bytes::Bytes as MultipartBytes, MultipartForm};
use chrono::Utc;
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, info};

use crate::api::project::dto::{ProjectResponse, StreamProgressData};
use crate::api::project::models::{extension_allowed, name_from_file, NewProject};
use crate::api::project::service::{ProjectService, ServiceError};
use crate::store::ProjectStatus;
use crate::worker::WorkerRole;

/// Create a project from raw text supplied as JSON.
#[post("")]
async fn create_project(
    service: Data<ProjectService>,
    payload: actix_web_validator::Json<NewProject>,
) -> Result<HttpResponse, ServiceError> {
    let file_name = format!("{}.txt", payload.name);
    let project =
        service.create_project(&payload.name, &file_name, payload.content.clone().into_bytes());
    Ok(HttpResponse::Created().json(ProjectResponse::from(&project)))
}

#[derive(Debug, MultipartForm)]
struct UploadForm {
    #[multipart(rename = "file")]
    file: MultipartBytes,
}

/// Upload an SRS document and create a project.
///
/// Supported formats: plain text and markdown.
#[post("/upload")]
async fn upload_project(
    service: Data<ProjectService>,
    form: MultipartForm<UploadForm>,
) -> Result<HttpResponse, ServiceError> {
    let form = form.into_inner();
    let file_name = form
        .file
        .file_name
        .clone()
        .ok_or_else(|| ServiceError::InvalidInput("File must have a name".to_string()))?;

    if !extension_allowed(&file_name) {
        return Err(ServiceError::InvalidInput(format!(
            "Unsupported file type for '{file_name}'. Allowed: .txt, .md, .markdown"
        )));
    }
    if form.file.data.is_empty() {
        return Err(ServiceError::InvalidInput("File is empty".to_string()));
    }

    let name = name_from_file(&file_name);
    let project = service.create_project(&name, &file_name, form.file.data.to_vec());
    Ok(HttpResponse::Created().json(ProjectResponse::from(&project)))
}

/// Get list of all projects.
#[get("")]
async fn list_projects(service: Data<ProjectService>) -> impl Responder {
    let projects: Vec<ProjectResponse> = service
        .list_projects()
        .iter()
        .map(ProjectResponse::from)
        .collect();
    HttpResponse::Ok().json(projects)
}

/// Get project details.
#[get("/{id}")]
async fn get_project(
    service: Data<ProjectService>,
    path: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let project = service.get_project(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(ProjectResponse::from(&project)))
}

/// Start processing an uploaded project. Returns immediately; the run
/// executes in the background and reports through the progress stream.
#[post("/{id}/process")]
async fn process_project(
    service: Data<ProjectService>,
    path: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let status = service.start_processing(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(status))
}

/// Get the requirements summary for a processed project.
#[get("/{id}/requirements")]
async fn get_requirements(
    service: Data<ProjectService>,
    path: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let summary = service.requirements(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Get the compiled technical document.
#[get("/{id}/techdoc")]
async fn get_techdoc(
    service: Data<ProjectService>,
    path: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let doc = service.techdoc(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(doc))
}

/// Reset a project back to `uploaded` so it can be reprocessed.
#[post("/{id}/reset")]
async fn reset_project(
    service: Data<ProjectService>,
    path: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let reset = service.reset(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(reset))
}

/// Delete a project.
#[delete("/{id}")]
async fn delete_project(
    service: Data<ProjectService>,
    path: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    service.delete(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Project deleted successfully"
    })))
}

/// SSE response body: frames pushed by the stream driver task.
struct SseBody(mpsc::UnboundedReceiver<web::Bytes>);

impl Stream for SseBody {
    type Item = Result<web::Bytes, actix_web::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}

/// Stream real-time progress updates as Server-Sent Events.
#[get("/{id}/progress-stream")]
async fn progress_stream(service: Data<ProjectService>, path: Path<String>) -> HttpResponse {
    let project_id = path.into_inner();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(drive_progress_stream(service, project_id, tx));

    HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-cache"))
        .content_type("text/event-stream")
        .streaming(SseBody(rx))
}

fn sse_frame(event: &str, data: &str) -> web::Bytes {
    web::Bytes::from(format!("event: {event}\ndata: {data}\n\n"))
}

fn send(tx: &UnboundedSender<web::Bytes>, event: &str, data: &str) -> bool {
    tx.send(sse_frame(event, data)).is_ok()
}

fn progress_frame(data: &StreamProgressData) -> String {
    serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string())
}

/// The streaming protocol: authoritative snapshot first, then channel events
/// with heartbeats while idle, ending on the first terminal status, the
/// maximum stream lifetime, or client disconnect.
async fn drive_progress_stream(
    service: Data<ProjectService>,
    project_id: String,
    tx: UnboundedSender<web::Bytes>,
) {
    let total_steps = WorkerRole::ALL.len() as u32;

    let Some(project) = service.store().get(&project_id) else {
        send(
            &tx,
            "error",
            &serde_json::json!({ "error": "Project not found" }).to_string(),
        );
        return;
    };

    // A late-joining consumer is never blind: the current project state goes
    // out before any buffered deltas.
    let snapshot = StreamProgressData {
        status: project.status,
        message: project
            .progress_message
            .clone()
            .unwrap_or_else(|| "Starting...".to_string()),
        current_step: project.current_step.unwrap_or(0),
        total_steps: project.total_steps.unwrap_or(total_steps),
        timestamp: Utc::now(),
    };
    if !send(&tx, "progress", &progress_frame(&snapshot)) {
        return;
    }
    if project.status.is_terminal() {
        info!(
            "SSE stream ending for project {}: {}",
            project_id,
            project.status.as_str()
        );
        service.registry().remove(&project_id);
        return;
    }

    let mut events = service.registry().subscribe(&project_id);
    let settings = service.stream_settings().clone();
    let heartbeat = Duration::from_millis(settings.heartbeat_ms);
    let deadline = Instant::now() + Duration::from_secs(settings.max_lifetime_secs);
    let mut last_seq: Option<u64> = None;

    loop {
        if tx.is_closed() {
            break;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!("SSE stream for project {} hit max lifetime", project_id);
            break;
        }

        match timeout(heartbeat.min(remaining), events.recv()).await {
            Ok(Some(event)) => {
                // Out-of-order events are stale; the sequence is authoritative.
                if last_seq.is_some_and(|seen| event.seq <= seen) {
                    continue;
                }
                last_seq = Some(event.seq);

                let status = event.status.unwrap_or(ProjectStatus::Processing);
                let data = StreamProgressData {
                    status,
                    message: event.message,
                    current_step: u32::from(event.percent) * total_steps / 100,
                    total_steps,
                    timestamp: event.timestamp,
                };
                if !send(&tx, "progress", &progress_frame(&data)) {
                    break;
                }
                if status.is_terminal() {
                    info!(
                        "SSE stream ending for project {}: {}",
                        project_id,
                        status.as_str()
                    );
                    break;
                }
            }
            // Channel torn down underneath us (reset or delete).
            Ok(None) => break,
            Err(_) => {
                // Idle: the run may have finished between events, so the
                // authoritative record is re-checked before heartbeating.
                match service.store().get(&project_id) {
                    Some(p) if p.status.is_terminal() => {
                        let data = StreamProgressData {
                            status: p.status,
                            message: p
                                .progress_message
                                .clone()
                                .unwrap_or_else(|| "Done".to_string()),
                            current_step: p.current_step.unwrap_or(0),
                            total_steps: p.total_steps.unwrap_or(total_steps),
                            timestamp: Utc::now(),
                        };
                        send(&tx, "progress", &progress_frame(&data));
                        break;
                    }
                    Some(_) => {
                        let beat =
                            serde_json::json!({ "timestamp": Utc::now() }).to_string();
                        if !send(&tx, "heartbeat", &beat) {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    service.registry().remove(&project_id);
    debug!("SSE stream closed for project {}", project_id);
}

pub fn project_config(config: &mut ServiceConfig) {
    config.service(
        web::scope("projects")
            .service(create_project)
            .service(upload_project)
            .service(list_projects)
            .service(progress_stream)
            .service(get_requirements)
            .service(get_techdoc)
            .service(process_project)
            .service(reset_project)
            .service(delete_project)
            .service(get_project),
    );
}
