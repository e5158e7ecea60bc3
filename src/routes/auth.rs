use crate::{
    auth::{generate_token, AuthResponse, LoginRequest, RegisterRequest},
    error::AppError,
    models::User,
    notifications::{notify, welcome_mail},
    state::AppState,
};
use actix_web::{post, web, HttpResponse, Responder};
use log::info;
use validator::Validate;

/// Register a new user
///
/// Creates the account, queues the welcome email, and returns an authentication
/// token. A failure to queue the email does not fail the registration.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;
    let store = state.store.as_ref();

    if User::exists(store, &register_data.email).await? {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let user = User::new(&register_data.email, &register_data.password)?;
    user.save(store).await?;
    info!("Registered user {}", user.email);

    notify(&state.outbox, welcome_mail(&user.email)).await;

    let token = generate_token(&user.email)?;
    Ok(HttpResponse::Created().json(AuthResponse {
        token,
        email: user.email,
    }))
}

/// Login user
///
/// Authenticates a user and returns an authentication token.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let user = User::find(state.store.as_ref(), &login_data.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".into()))?;

    if !user.check_password(&login_data.password)? {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    let token = generate_token(&user.email)?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        email: user.email,
    }))
}
