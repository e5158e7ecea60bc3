use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::auth::Claims;
use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

/// The account behind the bearer token of the current request.
///
/// Reads the `Claims` that `AuthMiddleware` placed in the request extensions and
/// loads the matching record from the store. A token whose account no longer exists
/// (deleted, or renamed by a profile update) is rejected with 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<Claims>().cloned();
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let claims = claims.ok_or_else(|| {
                AppError::Unauthorized("Please login to access this page".into())
            })?;
            let state = state.ok_or_else(|| {
                AppError::InternalServerError("Application state is not configured".into())
            })?;

            match User::find(state.store.as_ref(), &claims.sub).await? {
                Some(user) => Ok(AuthenticatedUser(user)),
                None => Err(AppError::Unauthorized(
                    "User session expired. Please login again".into(),
                )
                .into()),
            }
        })
    }
}
