use crate::{auth::AuthenticatedUser, error::AppError, state::AppState};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;

/// Pending and dead-lettered message ids. Pending ids are listed in delivery order.
#[get("")]
pub async fn outbox_status(
    state: web::Data<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let pending = state.outbox.pending().await?;
    let dead_lettered = state.outbox.dead_letters().await?;
    Ok(HttpResponse::Ok().json(json!({
        "pending": pending,
        "dead_lettered": dead_lettered
    })))
}

/// Processes the next queued message and reports what happened to it.
#[post("/process")]
pub async fn process_next(
    state: web::Data<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let outcome = state.outbox.process_one().await?;
    Ok(HttpResponse::Ok().json(outcome))
}
