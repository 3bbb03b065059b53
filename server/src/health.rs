use std::sync::Arc;
use std::time::Instant;

use actix_web::{web, HttpResponse};
use serde::Serialize;

use taskchain_cluster::ChainCluster;

/// Wall-clock time the server came up, registered once as app data so
/// [`health`] can report how long the process has been running.
pub struct ServerStart(pub Instant);

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    chains_loaded: usize,
    uptime_secs: u64,
}

pub async fn health(
    cluster: web::Data<Arc<ChainCluster>>,
    start: web::Data<ServerStart>,
) -> HttpResponse {
    let chains_loaded = cluster.user_count().await;
    let uptime_secs = start.0.elapsed().as_secs();
    HttpResponse::Ok().json(HealthStatus { status: "ok", chains_loaded, uptime_secs })
}
