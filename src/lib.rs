#![doc = "The `blogforge` library crate."]
#![doc = ""]
#![doc = "This crate contains the domain models, the key-value store abstraction, the"]
#![doc = "email outbox, authentication, routing configuration, and error handling for the"]
#![doc = "blogforge application. The binary (`main.rs`) wires them into an HTTP server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod mail;
pub mod models;
pub mod notifications;
pub mod outbox;
pub mod routes;
pub mod state;
pub mod store;

pub use error::AppError;
pub use outbox::{Outbox, OutboxSettings, ProcessOutcome};
pub use state::AppState;
