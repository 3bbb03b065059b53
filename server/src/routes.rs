use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use taskchain_cluster::ChainCluster;
use taskchain_socket::BundleCluster;

use crate::auth::AuthenticatedUser;

pub async fn websocket_connect(
    user: AuthenticatedUser,
    req: HttpRequest,
    stream: web::Payload,
    cluster: web::Data<Arc<ChainCluster>>,
    bundles: web::Data<Arc<BundleCluster>>,
) -> Result<HttpResponse, actix_web::Error> {
    taskchain_socket::connect(user.0, req, stream, cluster, bundles).await
}
