use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use log::info;
use std::io;
use std::sync::Arc;

use blogforge::auth::AuthMiddleware;
use blogforge::config::Config;
use blogforge::mail::SmtpMailer;
use blogforge::outbox::{run_drain_loop, Outbox};
use blogforge::routes::{self, health};
use blogforge::state::AppState;
use blogforge::store::RedisStore;

/// Messages processed per tick of the drain timer.
const DRAIN_BATCH: usize = 50;

fn startup_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(startup_error)?;

    let store = Arc::new(RedisStore::connect(&config.redis_url).await.map_err(startup_error)?);
    let mailer = Arc::new(SmtpMailer::from_settings(&config.smtp).map_err(startup_error)?);
    let outbox = Arc::new(Outbox::new(store.clone(), mailer, config.outbox.clone()));

    match config.drain_interval {
        Some(every) => {
            tokio::spawn(run_drain_loop(outbox.clone(), every, DRAIN_BATCH));
        }
        None => info!("Outbox drain timer disabled; use POST /api/outbox/process"),
    }

    let state = web::Data::new(AppState::new(store, outbox));

    info!("Starting blogforge server at {}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(health::health)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .configure(routes::config),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
