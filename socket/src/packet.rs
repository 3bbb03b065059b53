use serde::{Deserialize, Serialize};

/// A message as received from a client over the socket.
#[derive(Clone, Debug, Deserialize)]
pub struct SocketPacket {
    pub topic: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(rename = "reqId")]
    pub req_id: String,
}

/// A message sent back to a client, echoing the request id so the client
/// can match it to the request that triggered it.
#[derive(Clone, Debug, Serialize)]
pub struct SocketSendPacket {
    pub topic: String,
    pub data: serde_json::Value,
    #[serde(rename = "reqId")]
    pub req_id: String,
    pub success: bool,
    pub err_message: String,
}

impl SocketSendPacket {
    pub fn ok(topic: impl Into<String>, req_id: impl Into<String>, data: serde_json::Value) -> Self {
        SocketSendPacket {
            topic: topic.into(),
            data,
            req_id: req_id.into(),
            success: true,
            err_message: String::new(),
        }
    }

    pub fn err(topic: impl Into<String>, req_id: impl Into<String>, message: impl Into<String>) -> Self {
        SocketSendPacket {
            topic: topic.into(),
            data: serde_json::Value::Null,
            req_id: req_id.into(),
            success: false,
            err_message: message.into(),
        }
    }
}
