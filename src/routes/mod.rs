pub mod auth;
pub mod feed;
pub mod health;
pub mod outbox;
pub mod posts;
pub mod profile;

use actix_web::web;

/// Registers every `/api` route. `health::health` lives outside this scope.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::login)
            .service(auth::register),
    )
    .service(
        web::scope("/posts")
            .service(posts::list_posts)
            .service(posts::create_post),
    )
    .service(
        web::scope("/profile")
            .service(profile::update_profile)
            .service(profile::change_password),
    )
    .service(
        web::scope("/outbox")
            .service(outbox::outbox_status)
            .service(outbox::process_next),
    )
    .service(feed::feed)
    .service(feed::search)
    .service(feed::dashboard);
}
