//! Websocket session actor and per-user connection bundles for the
//! real-time sync protocol: one [`SocketSession`] actor per connection, one
//! [`bundle::UserSocketBundle`] per user fanning broadcasts out to every
//! connection that user currently has open.

mod bundle;
mod handlers;
mod packet;
mod session;

use std::sync::Arc;

use actix_web::{web, Error, HttpRequest, HttpResponse};
use taskchain_cluster::ChainCluster;

pub use bundle::BundleCluster;
pub use handlers::HandlerError;
pub use packet::{SocketPacket, SocketSendPacket};
pub use session::SocketSession;

/// Upgrades an authenticated HTTP request to a websocket connection and
/// starts the per-connection session actor. `user_id` must already have
/// been established by the caller's auth middleware.
pub async fn connect(
    user_id: String,
    req: HttpRequest,
    stream: web::Payload,
    cluster: web::Data<Arc<ChainCluster>>,
    bundles: web::Data<Arc<BundleCluster>>,
) -> Result<HttpResponse, Error> {
    let session = SocketSession::new(user_id, cluster.get_ref().clone(), bundles.get_ref().clone());
    actix_web_actors::ws::start(session, &req, stream)
}
