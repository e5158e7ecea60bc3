use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use log::warn;
use serde_json::json;

use crate::outbox::QUEUE_KEY;
use crate::state::AppState;
use crate::store::KeyValueStore;

/// Health check endpoint
///
/// Reports the API status, the current timestamp, and the outbox backlog.
/// Answers 503 when the store cannot be reached.
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    match state.store.list_len(QUEUE_KEY).await {
        Ok(pending) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "timestamp": Utc::now(),
            "outbox_pending": pending
        })),
        Err(err) => {
            warn!("Health check failed: {}", err);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "degraded",
                "timestamp": Utc::now(),
                "error": err.to_string()
            }))
        }
    }
}
