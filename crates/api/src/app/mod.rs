//! Application wiring: shared state and the routing tree.

pub mod dto;
pub mod errors;
pub mod routes;

use std::sync::Arc;

use axum::{Extension, Router};

use dossier_events::JobEventHub;
use dossier_infra::{InMemoryJobStore, JobQueue};

/// The concrete queue type this API wires (in-memory job store).
pub type SharedQueue = Arc<JobQueue<Arc<InMemoryJobStore>>>;

/// Shared handles available to every handler.
#[derive(Clone)]
pub struct AppState {
    pub queue: SharedQueue,
    pub hub: Arc<JobEventHub>,
}

/// Build the routing tree over the shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::analyses::router())
        .merge(routes::stream::router())
        .layer(Extension(state))
}
