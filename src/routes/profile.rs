use crate::{
    auth::{generate_token, AuthenticatedUser},
    error::AppError,
    models::{user::user_key, User},
    state::AppState,
    store::KeyValueStore,
};
use actix_web::{put, web, HttpResponse, Responder};
use chrono::Utc;
use log::info;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordChange {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "New password must be at least 6 characters long"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

/// Changes the account email.
///
/// The record moves to its new key and the old key is deleted, so the previous
/// token stops working; the response carries a fresh one.
///
/// ## Responses:
/// - `200 OK`: `{ "message": ..., "token": ... }`.
/// - `400 Bad Request`: the email already belongs to another account.
/// - `422 Unprocessable Entity`: invalid email.
#[put("/update")]
pub async fn update_profile(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    update: web::Json<ProfileUpdate>,
) -> Result<impl Responder, AppError> {
    update.validate()?;
    let store = state.store.as_ref();
    let mut user = user.0;
    let previous_email = user.email.clone();

    if update.email != previous_email && User::exists(store, &update.email).await? {
        return Err(AppError::BadRequest("Email already in use".into()));
    }

    user.email = update.email.clone();
    user.updated_at = Some(Utc::now());
    user.save(store).await?;

    if user.email != previous_email {
        store.delete(&user_key(&previous_email)).await?;
        info!("User {} changed email to {}", previous_email, user.email);
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated successfully",
        "token": generate_token(&user.email)?
    })))
}

/// Changes the account password after checking the current one.
///
/// ## Responses:
/// - `200 OK`: `{ "message": ... }`.
/// - `400 Bad Request`: the current password is wrong.
/// - `422 Unprocessable Entity`: the new password is too short or does not match.
#[put("/change-password")]
pub async fn change_password(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    change: web::Json<PasswordChange>,
) -> Result<impl Responder, AppError> {
    change.validate()?;
    let mut user = user.0;

    if !user.check_password(&change.current_password)? {
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }

    user.set_password(&change.new_password)?;
    user.save(state.store.as_ref()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Password changed successfully"
    })))
}
