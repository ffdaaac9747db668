use std::sync::Arc;

use dossier_analysis::build_registry;
use dossier_api::app::{build_router, AppState};
use dossier_events::JobEventHub;
use dossier_infra::{
    HttpEnrichmentProvider, InMemoryJobStore, InMemoryRecordStore, JobQueue, QueueConfig,
};

#[tokio::main]
async fn main() {
    dossier_observability::init();

    let provider_url = std::env::var("DOSSIER_PROVIDER_URL").unwrap_or_else(|_| {
        tracing::warn!("DOSSIER_PROVIDER_URL not set; using local dev default");
        "http://127.0.0.1:8091/v1/enrich".to_string()
    });

    let provider = Arc::new(HttpEnrichmentProvider::new(provider_url));
    let records = InMemoryRecordStore::arc();
    let registry = Arc::new(build_registry(provider, records));
    let hub = Arc::new(JobEventHub::default());

    let queue = Arc::new(JobQueue::new(
        InMemoryJobStore::arc(),
        registry,
        hub.clone(),
        QueueConfig::default(),
    ));
    let _workers = queue.start();

    let app = build_router(AppState { queue, hub });

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
