use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, Handler, Message, StreamHandler, WrapFuture,
};
use actix_web_actors::ws;

use taskchain_cluster::ChainCluster;

use crate::bundle::BundleCluster;
use crate::handlers::{self, Broadcast, HandlerError};
use crate::packet::{SocketPacket, SocketSendPacket};

const TOPIC_LAST_BLOCK_NUMBER: &str = "lastBlockNumber";
const TOPIC_BROADCAST_TRANSACTION: &str = "broadcastTransaction";
const TOPIC_DELETE_TRANSACTION_AFTER: &str = "deleteTransactionAfter";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(45);

/// Tells a [`SocketSession`] to push a packet to its client. Used by
/// [`BundleCluster::broadcast`] to reach a session from outside its own
/// message loop.
#[derive(Message)]
#[rtype(result = "()")]
pub struct SendPacket(pub SocketSendPacket);

pub struct SocketSession {
    connection_id: String,
    user_id: String,
    cluster: Arc<ChainCluster>,
    bundles: Arc<BundleCluster>,
    last_heartbeat: Instant,
}

impl SocketSession {
    pub fn new(user_id: String, cluster: Arc<ChainCluster>, bundles: Arc<BundleCluster>) -> Self {
        SocketSession {
            connection_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            cluster,
            bundles,
            last_heartbeat: Instant::now(),
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                tracing::warn!(connection_id = %act.connection_id, user_id = %act.user_id, "heartbeat timed out, closing");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for SocketSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);
        tracing::info!(connection_id = %self.connection_id, user_id = %self.user_id, "client connected");

        let bundles = self.bundles.clone();
        let user_id = self.user_id.clone();
        let connection_id = self.connection_id.clone();
        let addr = ctx.address();
        ctx.spawn(
            async move { bundles.register(&user_id, connection_id, addr).await }.into_actor(self),
        );
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        tracing::info!(connection_id = %self.connection_id, user_id = %self.user_id, "client disconnected");
        let bundles = self.bundles.clone();
        let user_id = self.user_id.clone();
        let connection_id = self.connection_id.clone();
        ctx.spawn(
            async move { bundles.unregister(&user_id, &connection_id).await }.into_actor(self),
        );
    }
}

impl Handler<SendPacket> for SocketSession {
    type Result = ();

    fn handle(&mut self, msg: SendPacket, ctx: &mut Self::Context) {
        match serde_json::to_string(&msg.0) {
            Ok(text) => ctx.text(text),
            Err(err) => tracing::error!(%err, "failed to encode outgoing packet"),
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for SocketSession {
    fn handle(&mut self, item: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match item {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(%err, "websocket protocol error");
                ctx.stop();
                return;
            }
        };

        match msg {
            ws::Message::Ping(bytes) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&bytes);
            }
            ws::Message::Pong(_) => {
                self.last_heartbeat = Instant::now();
            }
            ws::Message::Text(text) => {
                self.last_heartbeat = Instant::now();
                self.handle_text(text.to_string(), ctx);
            }
            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Binary(_) | ws::Message::Continuation(_) | ws::Message::Nop => {}
        }
    }
}

impl SocketSession {
    fn handle_text(&self, raw: String, ctx: &mut ws::WebsocketContext<Self>) {
        let packet: SocketPacket = match serde_json::from_str(&raw) {
            Ok(packet) => packet,
            Err(err) => {
                tracing::warn!(%err, raw, "uncaught raw message");
                return;
            }
        };

        tracing::debug!(
            connection_id = %self.connection_id,
            user_id = %self.user_id,
            topic = %packet.topic,
            req_id = %packet.req_id,
            "received message"
        );

        let cluster = self.cluster.clone();
        let bundles = self.bundles.clone();
        let user_id = self.user_id.clone();
        let connection_id = self.connection_id.clone();
        let topic = packet.topic.clone();
        let req_id = packet.req_id.clone();

        let fut = async move {
            match handlers::dispatch(&cluster, &user_id, &topic, packet.data).await {
                Ok((data, broadcast)) => {
                    if let Some(broadcast) = broadcast {
                        tokio::spawn(fan_out(bundles, user_id, connection_id, broadcast));
                    }
                    Some(SocketSendPacket::ok(topic, req_id, data))
                }
                // Unknown topics are logged and silently ignored; every other
                // application error is reported back to the requester while
                // the session stays open.
                Err(HandlerError::UnknownTopic(topic)) => {
                    tracing::warn!(topic, "unknown socket topic");
                    None
                }
                Err(err) => Some(SocketSendPacket::err(topic, req_id, err.to_string())),
            }
        };

        ctx.spawn(fut.into_actor(self).map(|packet, _act, ctx| {
            if let Some(packet) = packet {
                if let Ok(text) = serde_json::to_string(&packet) {
                    ctx.text(text);
                }
            }
        }));
    }
}

/// Fans a commit or deletion out to the user's other live connections. Runs
/// after the reply has been handed back to the actor mailbox, so it never
/// holds up the requester and a broken peer can't stall the others.
async fn fan_out(
    bundles: Arc<BundleCluster>,
    user_id: String,
    connection_id: String,
    broadcast: Broadcast,
) {
    match broadcast {
        Broadcast::TransactionCommitted { last_block_number, block } => {
            bundles
                .broadcast(
                    &user_id,
                    SocketSendPacket::ok(TOPIC_LAST_BLOCK_NUMBER, "", serde_json::json!(last_block_number)),
                )
                .await;
            match serde_json::to_value(&block) {
                Ok(data) => {
                    bundles
                        .broadcast(&user_id, SocketSendPacket::ok(TOPIC_BROADCAST_TRANSACTION, "", data))
                        .await;
                }
                Err(err) => tracing::error!(%err, "failed to encode broadcast block"),
            }
        }
        Broadcast::BlocksDeleted { start, last_block_number } => {
            bundles
                .broadcast_except(
                    &user_id,
                    &connection_id,
                    SocketSendPacket::ok(TOPIC_DELETE_TRANSACTION_AFTER, "", serde_json::json!(start)),
                )
                .await;
            bundles
                .broadcast(
                    &user_id,
                    SocketSendPacket::ok(TOPIC_LAST_BLOCK_NUMBER, "", serde_json::json!(last_block_number)),
                )
                .await;
        }
    }
}
