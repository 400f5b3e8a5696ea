use actix_web::{get, http::StatusCode, web, HttpResponse};

use crate::modules::status::service::{HealthState, StatusService};

#[get("/")]
pub async fn home(status: web::Data<StatusService>) -> HttpResponse {
    HttpResponse::Ok().json(status.descriptor())
}

/// 500 when storage is not configured, 503 when it is configured but unreachable.
#[get("/health")]
pub async fn health(status: web::Data<StatusService>) -> HttpResponse {
    let (state, report) = status.health().await;
    let code = match state {
        HealthState::Healthy => StatusCode::OK,
        HealthState::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
        HealthState::Unreachable => StatusCode::SERVICE_UNAVAILABLE,
    };
    HttpResponse::build(code).json(report)
}
