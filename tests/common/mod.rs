#![allow(dead_code)]

use actix_web::body::{to_bytes, MessageBody};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::middleware::Logger;
use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use blogforge::auth::{AuthMiddleware, AuthResponse};
use blogforge::mail::{MailTransport, OutgoingMail, TransportError};
use blogforge::outbox::{Outbox, OutboxSettings};
use blogforge::routes::{self, health};
use blogforge::state::AppState;
use blogforge::store::{KeyValueStore, MemoryStore, StoreResult};

static JWT_SECRET: Once = Once::new();

pub fn ensure_jwt_secret() {
    JWT_SECRET.call_once(|| std::env::set_var("JWT_SECRET", "integration-test-secret"));
}

/// Mail transport that records what it was asked to send.
///
/// `fail_next(n)` makes the next `n` sends fail; `fail_always(true)` makes every send
/// fail; `with_delay` makes each send sleep before answering.
#[derive(Default)]
pub struct ScriptedTransport {
    sent: Mutex<Vec<OutgoingMail>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    always_fail: Mutex<bool>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn fail_always(&self, fail: bool) {
        *self.always_fail.lock().unwrap() = fail;
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|mail| mail.subject).collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for ScriptedTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if *self.always_fail.lock().unwrap() {
            return Err(TransportError::new("relay rejected message"));
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::new("connection reset by relay"));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// Store wrapper that refuses outbox writes while everything else works.
///
/// `all()` fails both the body write and the queue push; `queue_only()` lets the
/// body through and fails only the push onto the queue.
pub struct OutboxWritesFail {
    pub inner: MemoryStore,
    fail_body: bool,
}

impl OutboxWritesFail {
    pub fn all() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_body: true,
        }
    }

    pub fn queue_only() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_body: false,
        }
    }
}

fn refuse(key: &str) -> StoreResult<()> {
    if key.starts_with("email:") {
        Err(blogforge::store::StoreError::Unavailable("connection refused".into()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for OutboxWritesFail {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        if self.fail_body {
            refuse(key)?;
        }
        self.inner.set(key, value, ttl).await
    }
    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }
    async fn list_push(&self, key: &str, value: &str) -> StoreResult<()> {
        refuse(key)?;
        self.inner.list_push(key, value).await
    }
    async fn list_pop(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.list_pop(key).await
    }
    async fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        self.inner.list_range(key, start, stop).await
    }
    async fn list_len(&self, key: &str) -> StoreResult<usize> {
        self.inner.list_len(key).await
    }
    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.keys_with_prefix(prefix).await
    }
    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        self.inner.hash_set(key, fields).await
    }
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.inner.hash_get_all(key).await
    }
}

pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
    pub outbox: Arc<Outbox>,
    pub state: web::Data<AppState>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_settings(OutboxSettings::default())
    }

    pub fn with_settings(settings: OutboxSettings) -> Self {
        Self::with_transport(ScriptedTransport::new(), settings)
    }

    pub fn with_transport(transport: ScriptedTransport, settings: OutboxSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(transport);
        let outbox = Arc::new(Outbox::new(store.clone(), transport.clone(), settings));
        let state = web::Data::new(AppState::new(store.clone(), outbox.clone()));
        Self {
            store,
            transport,
            outbox,
            state,
        }
    }
}

/// The application as `main.rs` assembles it, minus CORS.
pub async fn init_app(
    state: web::Data<AppState>,
) -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
> {
    ensure_jwt_secret();
    test::init_service(
        App::new()
            .app_data(state)
            .wrap(Logger::default())
            .service(health::health)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .configure(routes::config),
            ),
    )
    .await
}

/// Sends a request and returns the status with the body parsed as JSON
/// (`Value::Null` for an empty or non-JSON body).
pub async fn send(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    req: test::TestRequest,
) -> (StatusCode, Value) {
    // AuthMiddleware rejects with an Err, which the server would render as a response.
    let (status, body) = match test::try_call_service(app, req.to_request()).await {
        Ok(resp) => {
            let status = resp.status();
            (status, test::read_body(resp).await)
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            (status, to_bytes(resp.into_body()).await.unwrap_or_default())
        }
    };
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// Registers an account and returns its token.
pub async fn register(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    email: &str,
    password: &str,
) -> String {
    let (status, body) = send(
        app,
        test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "email": email,
                "password": password,
                "confirm_password": password
            })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "Registration failed: {}", body);
    let auth: AuthResponse = serde_json::from_value(body).expect("Failed to parse auth response");
    auth.token
}
