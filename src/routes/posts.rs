use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{Post, PostInput, User},
    notifications::{new_post_mail, notify},
    state::AppState,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use log::info;
use validator::Validate;

/// Lists every post, newest first.
///
/// Posts are found by scanning the `post:` key namespace, so records missing from
/// `posts:list` still show up here.
///
/// ## Responses:
/// - `200 OK`: JSON array of `Post` objects.
/// - `401 Unauthorized`: missing or invalid token.
#[get("")]
pub async fn list_posts(
    state: web::Data<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let posts = Post::all_by_key(state.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(posts))
}

/// Creates a post authored by the current user and broadcasts a "New Blog Post"
/// email to every registered account.
///
/// ## Request Body:
/// - `title`: required, at most 200 characters.
/// - `content`: required.
/// - `tags` (optional): list of tags.
///
/// ## Responses:
/// - `201 Created`: the new `Post`.
/// - `401 Unauthorized`: missing or invalid token.
/// - `422 Unprocessable Entity`: validation failed.
#[post("")]
pub async fn create_post(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    post_data: web::Json<PostInput>,
) -> Result<impl Responder, AppError> {
    post_data.validate()?;
    let store = state.store.as_ref();
    let author = user.0.email;

    let post = Post::new(post_data.into_inner(), &author);
    post.save(store).await?;
    info!("Post {} created by {}", post.id, author);

    let recipients = User::all_emails(store).await?;
    if !recipients.is_empty() {
        notify(&state.outbox, new_post_mail(recipients, &post.title, &author)).await;
    }

    Ok(HttpResponse::Created().json(post))
}
