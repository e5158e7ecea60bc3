use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{Post, UserProfile},
    state::AppState,
};
use actix_web::{get, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

/// Number of posts on the public front page.
const FEED_SIZE: usize = 6;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

/// The latest posts, newest first. Public.
#[get("/feed")]
pub async fn feed(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    let posts = Post::latest(state.store.as_ref(), FEED_SIZE).await?;
    Ok(HttpResponse::Ok().json(posts))
}

/// Posts whose title, content, or tags contain `query`, case-insensitively. Public.
///
/// ## Responses:
/// - `200 OK`: `{ "query": ..., "posts": [...] }`.
/// - `400 Bad Request`: `query` missing or blank.
#[get("/search")]
pub async fn search(
    state: web::Data<AppState>,
    params: web::Query<SearchQuery>,
) -> Result<impl Responder, AppError> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|query| !query.is_empty())
        .ok_or_else(|| AppError::BadRequest("A search query is required".into()))?;

    let posts: Vec<Post> = Post::all_listed(state.store.as_ref())
        .await?
        .into_iter()
        .filter(|post| post.matches(query))
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "query": query,
        "posts": posts
    })))
}

/// The current user's profile and their own posts, newest first.
#[get("/dashboard")]
pub async fn dashboard(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = user.0;
    let mut posts: Vec<Post> = Post::all_listed(state.store.as_ref())
        .await?
        .into_iter()
        .filter(|post| post.author == user.email)
        .collect();
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(HttpResponse::Ok().json(json!({
        "user": UserProfile::from(&user),
        "posts": posts
    })))
}
