use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;
use std::sync::Arc;

use crate::store::ProjectStore;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    projects: Option<usize>,
}

/// Health check endpoint
///
/// General health check including store reachability.
/// Use for load balancers and uptime monitors.
#[get("/health")]
async fn health_check(store: web::Data<Arc<dyn ProjectStore>>) -> impl Responder {
    let projects = store.list().len();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        store: "available".to_string(),
        projects: Some(projects),
    })
}

/// Readiness check endpoint
///
/// Checks if the service is ready to accept traffic. With the in-process
/// store there is no external dependency to probe, so readiness mirrors
/// health; kept as a separate route for orchestrator probes.
#[get("/ready")]
async fn readiness_check(store: web::Data<Arc<dyn ProjectStore>>) -> impl Responder {
    let projects = store.list().len();
    HttpResponse::Ok().json(HealthResponse {
        status: "ready".to_string(),
        store: "available".to_string(),
        projects: Some(projects),
    })
}

/// Liveness check endpoint
///
/// Simple check that the process is alive. Does not check dependencies.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive".to_string(),
        store: "not_checked".to_string(),
        projects: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
