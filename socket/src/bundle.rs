use std::collections::HashMap;

use actix::Addr;

use crate::packet::SocketSendPacket;
use crate::session::SocketSession;

/// One live connection for a user: enough to push a packet to it without
/// touching the websocket transport directly.
pub struct UserSocket {
    pub connection_id: String,
    addr: Addr<SocketSession>,
}

impl UserSocket {
    pub fn send(&self, packet: SocketSendPacket) {
        self.addr.do_send(crate::session::SendPacket(packet));
    }
}

/// Every live connection belonging to one user. A user can have more than
/// one open tab or device, so broadcasts fan out to all of them.
#[derive(Default)]
pub struct UserSocketBundle {
    sockets: HashMap<String, UserSocket>,
}

impl UserSocketBundle {
    pub fn add_socket(&mut self, connection_id: String, addr: Addr<SocketSession>) {
        self.sockets.insert(connection_id.clone(), UserSocket { connection_id, addr });
    }

    pub fn remove_socket(&mut self, connection_id: &str) {
        self.sockets.remove(connection_id);
    }

    pub fn get_socket(&self, connection_id: &str) -> Option<&UserSocket> {
        self.sockets.get(connection_id)
    }

    pub fn size(&self) -> usize {
        self.sockets.len()
    }

    pub fn broadcast(&self, packet: SocketSendPacket) {
        for socket in self.sockets.values() {
            socket.addr.do_send(crate::session::SendPacket(packet.clone()));
        }
    }

    pub fn broadcast_except(&self, exclude_connection_id: &str, packet: SocketSendPacket) {
        for socket in self.sockets.values() {
            if socket.connection_id != exclude_connection_id {
                socket.addr.do_send(crate::session::SendPacket(packet.clone()));
            }
        }
    }
}

/// Every user's [`UserSocketBundle`], keyed by user id.
#[derive(Default)]
pub struct BundleCluster {
    bundles: tokio::sync::RwLock<HashMap<String, UserSocketBundle>>,
}

impl BundleCluster {
    pub fn new() -> Self {
        BundleCluster::default()
    }

    pub async fn register(&self, user_id: &str, connection_id: String, addr: Addr<SocketSession>) {
        let mut bundles = self.bundles.write().await;
        bundles.entry(user_id.to_string()).or_default().add_socket(connection_id, addr);
    }

    pub async fn unregister(&self, user_id: &str, connection_id: &str) {
        let mut bundles = self.bundles.write().await;
        if let Some(bundle) = bundles.get_mut(user_id) {
            bundle.remove_socket(connection_id);
            if bundle.size() == 0 {
                bundles.remove(user_id);
            }
        }
    }

    /// Sends `packet` to every live connection for `user_id`, e.g. to push
    /// a newly committed block to every other tab the user has open.
    pub async fn broadcast(&self, user_id: &str, packet: SocketSendPacket) {
        let bundles = self.bundles.read().await;
        if let Some(bundle) = bundles.get(user_id) {
            bundle.broadcast(packet);
        }
    }

    /// Sends `packet` to every live connection for `user_id` except
    /// `exclude_connection_id`, e.g. to tell a user's other tabs that blocks
    /// were deleted out from under them without echoing it back to the tab
    /// that requested the deletion.
    pub async fn broadcast_except(
        &self,
        user_id: &str,
        exclude_connection_id: &str,
        packet: SocketSendPacket,
    ) {
        let bundles = self.bundles.read().await;
        if let Some(bundle) = bundles.get(user_id) {
            bundle.broadcast_except(exclude_connection_id, packet);
        }
    }

    pub async fn connection_count(&self, user_id: &str) -> usize {
        self.bundles.read().await.get(user_id).map(|b| b.size()).unwrap_or(0)
    }
}
