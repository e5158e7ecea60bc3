use std::sync::Arc;

use crate::outbox::Outbox;
use crate::store::KeyValueStore;

/// Shared handles every request handler works with. Registered once as
/// `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KeyValueStore>,
    pub outbox: Arc<Outbox>,
}

impl AppState {
    pub fn new(store: Arc<dyn KeyValueStore>, outbox: Arc<Outbox>) -> Self {
        Self { store, outbox }
    }
}
