//! Topic handlers for the websocket protocol. Each handler takes the
//! authenticated user id and the raw `data` payload of a [`crate::packet::SocketPacket`]
//! and returns the JSON value to send back, plus any broadcast that should
//! fan out to the user's other live connections once the reply is sent.

use serde::Deserialize;

use taskchain_chain::ChainError;
use taskchain_cluster::ChainCluster;
use taskchain_primitives::{Block, Transaction};

pub const TOPIC_TEST: &str = "test";
pub const TOPIC_TRANSACTION: &str = "transaction";
pub const TOPIC_WAITING_BLOCK_NUMBER: &str = "waitingBlockNumber";
pub const TOPIC_LAST_BLOCK_NUMBER: &str = "lastBlockNumber";
pub const TOPIC_LAST_REMOTE_BLOCK: &str = "lastRemoteBlock";
pub const TOPIC_SYNC_BLOCKS: &str = "syncBlocks";
pub const TOPIC_COMMIT_TRANSACTIONS: &str = "commitTransactions";
pub const TOPIC_TX_HASH_BY_BLOCK_NUMBER: &str = "txHashByBlockNumber";
pub const TOPIC_BLOCK_HASH_BY_BLOCK_NUMBER: &str = "blockHashByBlockNumber";
pub const TOPIC_BLOCK_BY_BLOCK_NUMBER: &str = "blockByBlockNumber";
pub const TOPIC_STATE_BY_BLOCK_NUMBER: &str = "stateByBlockNumber";
pub const TOPIC_DELETE_MISMATCH_BLOCKS: &str = "deleteMismatchBlocks";
pub const TOPIC_CLEAR_STATE_PERMANENTLY: &str = "clearStatePermanently";

/// `end == -1` on the wire means "to the tip"; everywhere else a range is
/// `Option<i64>` with `None` meaning the same thing.
const NO_END: i64 = -1;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    #[error("malformed request: {0}")]
    MalformedRequest(#[from] serde_json::Error),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("range start must not exceed end")]
    InvalidRange,
    #[error("transaction {0} of {1} in bundle failed: {2}")]
    BundleItemFailed(usize, usize, Box<HandlerError>),
}

/// What the session loop should fan out to the user's bundle once a handler
/// that mutates the chain has returned its reply. Kept separate from the
/// reply value itself: the reply goes only to the requester, a broadcast
/// goes to every live connection (or every connection but one).
#[derive(Debug)]
pub enum Broadcast {
    TransactionCommitted { last_block_number: i64, block: Block },
    BlocksDeleted { start: i64, last_block_number: i64 },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxRequest {
    version: i32,
    #[serde(rename = "type")]
    tx_type: i64,
    timestamp: i64,
    content: serde_json::Value,
    block_number: i64,
    hash: String,
    block_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockNumberRequest {
    n: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockRangeRequest {
    start: i64,
    end: i64,
}

fn into_transaction(user_id: &str, req: &TxRequest) -> Transaction {
    Transaction {
        version: req.version,
        from: user_id.to_string(),
        tx_type: req.tx_type,
        timestamp: req.timestamp,
        content: req.content.clone(),
        hash: req.hash.clone(),
    }
}

/// Dispatches one decoded request to its handler. Returns the JSON reply
/// payload (sent only to the requester) and, when the handler committed or
/// deleted blocks, the broadcast the session loop should fan out afterward.
pub async fn dispatch(
    cluster: &ChainCluster,
    user_id: &str,
    topic: &str,
    data: serde_json::Value,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    match topic {
        TOPIC_TEST => Ok((data, None)),
        TOPIC_TRANSACTION => handle_transaction(cluster, user_id, data).await,
        TOPIC_WAITING_BLOCK_NUMBER => handle_waiting_block_number(cluster, user_id).await,
        TOPIC_LAST_BLOCK_NUMBER => handle_last_block_number(cluster, user_id).await,
        TOPIC_LAST_REMOTE_BLOCK => handle_last_remote_block(cluster, user_id).await,
        TOPIC_SYNC_BLOCKS => handle_sync_blocks(cluster, user_id, data).await,
        TOPIC_COMMIT_TRANSACTIONS => handle_commit_transactions(cluster, user_id, data).await,
        TOPIC_TX_HASH_BY_BLOCK_NUMBER => handle_tx_hash_by_block_number(cluster, user_id, data).await,
        TOPIC_BLOCK_HASH_BY_BLOCK_NUMBER => {
            handle_block_hash_by_block_number(cluster, user_id, data).await
        }
        TOPIC_BLOCK_BY_BLOCK_NUMBER => handle_block_by_block_number(cluster, user_id, data).await,
        TOPIC_STATE_BY_BLOCK_NUMBER => handle_state_by_block_number(cluster, user_id, data).await,
        TOPIC_DELETE_MISMATCH_BLOCKS => handle_delete_mismatch_blocks(cluster, user_id, data).await,
        TOPIC_CLEAR_STATE_PERMANENTLY => handle_clear_state_permanently(cluster, user_id).await,
        other => Err(HandlerError::UnknownTopic(other.to_string())),
    }
}

/// Applies one transaction request and reports the broadcast its commit
/// should trigger. Shared by the `transaction` topic and each step of
/// `commitTransactions`.
async fn commit_one(
    cluster: &ChainCluster,
    user_id: &str,
    req: TxRequest,
) -> Result<Broadcast, HandlerError> {
    let chain = cluster.get_or_create(user_id).await;
    let transaction = into_transaction(user_id, &req);
    let block = chain.apply_transaction(transaction, req.block_number, &req.block_hash).await?;
    let last_block_number = chain.last_block_number().await;
    Ok(Broadcast::TransactionCommitted { last_block_number, block })
}

async fn handle_transaction(
    cluster: &ChainCluster,
    user_id: &str,
    data: serde_json::Value,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let req: TxRequest = serde_json::from_value(data)?;
    let broadcast = commit_one(cluster, user_id, req).await?;
    Ok((serde_json::Value::Null, Some(broadcast)))
}

async fn handle_commit_transactions(
    cluster: &ChainCluster,
    user_id: &str,
    data: serde_json::Value,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let reqs: Vec<TxRequest> = serde_json::from_value(data)?;
    let total = reqs.len();
    let mut last = None;
    for (index, req) in reqs.into_iter().enumerate() {
        let broadcast = commit_one(cluster, user_id, req)
            .await
            .map_err(|e| HandlerError::BundleItemFailed(index, total, Box::new(e)))?;
        last = Some(broadcast);
    }
    Ok((serde_json::Value::Null, last))
}

async fn handle_waiting_block_number(
    cluster: &ChainCluster,
    user_id: &str,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let chain = cluster.get_or_create(user_id).await;
    Ok((serde_json::json!(chain.waiting_block_number().await), None))
}

async fn handle_last_block_number(
    cluster: &ChainCluster,
    user_id: &str,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let chain = cluster.get_or_create(user_id).await;
    Ok((serde_json::json!(chain.last_block_number().await), None))
}

async fn handle_last_remote_block(
    cluster: &ChainCluster,
    user_id: &str,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let chain = cluster.get_or_create(user_id).await;
    Ok((serde_json::to_value(chain.last_block().await)?, None))
}

async fn handle_sync_blocks(
    cluster: &ChainCluster,
    user_id: &str,
    data: serde_json::Value,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let req: BlockRangeRequest = serde_json::from_value(data)?;
    if req.start > req.end {
        return Err(HandlerError::InvalidRange);
    }
    let chain = cluster.get_or_create(user_id).await;
    let blocks = chain.blocks_in_range(req.start, req.end).await?;
    Ok((serde_json::to_value(blocks)?, None))
}

async fn handle_tx_hash_by_block_number(
    cluster: &ChainCluster,
    user_id: &str,
    data: serde_json::Value,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let req: BlockNumberRequest = serde_json::from_value(data)?;
    let chain = cluster.get_or_create(user_id).await;
    let block = chain.block_by_number(req.n).await?;
    let tx_hash = block.updates.map(|u| u.src_tx.hash).unwrap_or_default();
    Ok((serde_json::json!(tx_hash), None))
}

async fn handle_block_hash_by_block_number(
    cluster: &ChainCluster,
    user_id: &str,
    data: serde_json::Value,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let req: BlockNumberRequest = serde_json::from_value(data)?;
    let chain = cluster.get_or_create(user_id).await;
    let block = chain.block_by_number(req.n).await?;
    Ok((serde_json::json!(block.hash), None))
}

async fn handle_block_by_block_number(
    cluster: &ChainCluster,
    user_id: &str,
    data: serde_json::Value,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let req: BlockNumberRequest = serde_json::from_value(data)?;
    let chain = cluster.get_or_create(user_id).await;
    let block = chain.block_by_number(req.n).await?;
    Ok((serde_json::to_value(block)?, None))
}

async fn handle_state_by_block_number(
    cluster: &ChainCluster,
    user_id: &str,
    data: serde_json::Value,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let req: BlockNumberRequest = serde_json::from_value(data)?;
    let chain = cluster.get_or_create(user_id).await;
    let block = chain.block_by_number(req.n).await?;
    Ok((serde_json::to_value(block.state)?, None))
}

async fn handle_delete_mismatch_blocks(
    cluster: &ChainCluster,
    user_id: &str,
    data: serde_json::Value,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let req: BlockRangeRequest = serde_json::from_value(data)?;
    let end = if req.end == NO_END { None } else { Some(req.end) };
    if let Some(end) = end {
        if req.start > end {
            return Err(HandlerError::InvalidRange);
        }
    }
    let chain = cluster.get_or_create(user_id).await;
    chain.delete_block_interval(req.start, end).await?;
    let last_block_number = chain.last_block_number().await;
    let broadcast = Broadcast::BlocksDeleted { start: req.start, last_block_number };
    Ok((serde_json::Value::Null, Some(broadcast)))
}

async fn handle_clear_state_permanently(
    cluster: &ChainCluster,
    user_id: &str,
) -> Result<(serde_json::Value, Option<Broadcast>), HandlerError> {
    let chain = cluster.get_or_create(user_id).await;
    chain.clear().await?;
    Ok((serde_json::Value::Null, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;
    use taskchain_chain::BlockStore;
    use taskchain_primitives::Block;

    #[derive(Default)]
    struct FakeStore {
        by_user: StdMutex<HashMap<String, Vec<Block>>>,
    }

    #[async_trait]
    impl BlockStore for FakeStore {
        async fn insert_block(
            &self,
            user_id: &str,
            _transaction: &Transaction,
            block: &Block,
        ) -> anyhow::Result<()> {
            self.by_user.lock().unwrap().entry(user_id.to_string()).or_default().push(block.clone());
            Ok(())
        }

        async fn block_by_number(&self, user_id: &str, number: i64) -> anyhow::Result<Option<Block>> {
            Ok(self
                .by_user
                .lock()
                .unwrap()
                .get(user_id)
                .and_then(|blocks| blocks.iter().find(|b| b.number == number).cloned()))
        }

        async fn block_by_hash(&self, user_id: &str, hash: &str) -> anyhow::Result<Option<Block>> {
            Ok(self
                .by_user
                .lock()
                .unwrap()
                .get(user_id)
                .and_then(|blocks| blocks.iter().find(|b| b.hash == hash).cloned()))
        }

        async fn delete_blocks_in_range(
            &self,
            user_id: &str,
            start: i64,
            end: Option<i64>,
        ) -> anyhow::Result<()> {
            let upper = end.unwrap_or(i64::MAX);
            if let Some(blocks) = self.by_user.lock().unwrap().get_mut(user_id) {
                blocks.retain(|b| b.number < start || b.number > upper);
            }
            Ok(())
        }

        async fn delete_user(&self, user_id: &str) -> anyhow::Result<()> {
            self.by_user.lock().unwrap().remove(user_id);
            Ok(())
        }

        async fn load_all(&self) -> anyhow::Result<Vec<(String, Block)>> {
            Ok(self
                .by_user
                .lock()
                .unwrap()
                .iter()
                .flat_map(|(u, blocks)| blocks.iter().map(move |b| (u.clone(), b.clone())))
                .collect())
        }
    }

    fn cluster() -> ChainCluster {
        ChainCluster::new(Arc::new(FakeStore::default()))
    }

    async fn commit_task(cluster: &ChainCluster, user_id: &str, tid: &str) -> serde_json::Value {
        let chain = cluster.get_or_create(user_id).await;
        let block_number = chain.waiting_block_number().await;
        let block_hash =
            Block::expected_hash(block_number, &format!("tx-{tid}"), &chain.last_block().await.hash)
                .unwrap();
        serde_json::json!({
            "version": 1,
            "type": taskchain_transactions::tx::CREATE_TASK,
            "timestamp": 1,
            "content": {"tid": tid, "title": "x", "createdAt": 1, "prevTaskId": ""},
            "blockNumber": block_number,
            "hash": format!("tx-{tid}"),
            "blockHash": block_hash,
        })
    }

    #[tokio::test]
    async fn unknown_topic_is_rejected() {
        let cluster = cluster();
        let err = dispatch(&cluster, "alice", "notATopic", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, HandlerError::UnknownTopic(t) if t == "notATopic"));
    }

    #[tokio::test]
    async fn test_topic_echoes_payload() {
        let cluster = cluster();
        let (value, broadcast) =
            dispatch(&cluster, "alice", TOPIC_TEST, serde_json::json!("hello")).await.unwrap();
        assert_eq!(value, serde_json::json!("hello"));
        assert!(broadcast.is_none());
    }

    #[tokio::test]
    async fn transaction_advances_chain_and_reports_broadcast() {
        let cluster = cluster();
        let data = commit_task(&cluster, "alice", "t1").await;
        let (value, broadcast) = dispatch(&cluster, "alice", TOPIC_TRANSACTION, data).await.unwrap();
        assert!(value.is_null());
        match broadcast.unwrap() {
            Broadcast::TransactionCommitted { last_block_number, block } => {
                assert_eq!(last_block_number, 1);
                assert_eq!(block.number, 1);
            }
            _ => panic!("expected TransactionCommitted"),
        }
    }

    #[tokio::test]
    async fn transaction_with_mismatched_block_number_is_rejected() {
        let cluster = cluster();
        let mut data = commit_task(&cluster, "alice", "t1").await;
        data["blockNumber"] = serde_json::json!(5);
        let err = dispatch(&cluster, "alice", TOPIC_TRANSACTION, data).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Chain(ChainError::BlockNumberMismatch { expected: 1, actual: 5 })
        ));
    }

    #[tokio::test]
    async fn commit_transactions_applies_each_in_order() {
        let cluster = cluster();
        let bundle = serde_json::json!([
            commit_task(&cluster, "alice", "t1").await,
            commit_task(&cluster, "alice", "t2").await,
        ]);
        let (value, broadcast) =
            dispatch(&cluster, "alice", TOPIC_COMMIT_TRANSACTIONS, bundle).await.unwrap();
        assert!(value.is_null());
        let chain = cluster.get_or_create("alice").await;
        assert_eq!(chain.last_block_number().await, 2);
        match broadcast.unwrap() {
            Broadcast::TransactionCommitted { last_block_number, .. } => {
                assert_eq!(last_block_number, 2);
            }
            _ => panic!("expected TransactionCommitted"),
        }
    }

    #[tokio::test]
    async fn block_by_block_number_reports_not_found() {
        let cluster = cluster();
        let err = dispatch(
            &cluster,
            "alice",
            TOPIC_BLOCK_BY_BLOCK_NUMBER,
            serde_json::json!({"n": 9}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HandlerError::Chain(ChainError::BlockNotFound(9))));
    }

    #[tokio::test]
    async fn state_by_block_number_returns_state_after_tx() {
        let cluster = cluster();
        let data = commit_task(&cluster, "alice", "t1").await;
        dispatch(&cluster, "alice", TOPIC_TRANSACTION, data).await.unwrap();
        let (value, _) = dispatch(
            &cluster,
            "alice",
            TOPIC_STATE_BY_BLOCK_NUMBER,
            serde_json::json!({"n": 1}),
        )
        .await
        .unwrap();
        assert!(value["tasks"]["t1"].is_object());
    }

    #[tokio::test]
    async fn delete_mismatch_blocks_truncates_chain_and_reports_broadcast() {
        let cluster = cluster();
        let d1 = commit_task(&cluster, "alice", "t1").await;
        dispatch(&cluster, "alice", TOPIC_TRANSACTION, d1).await.unwrap();
        let d2 = commit_task(&cluster, "alice", "t2").await;
        dispatch(&cluster, "alice", TOPIC_TRANSACTION, d2).await.unwrap();

        let (value, broadcast) = dispatch(
            &cluster,
            "alice",
            TOPIC_DELETE_MISMATCH_BLOCKS,
            serde_json::json!({"start": 2, "end": -1}),
        )
        .await
        .unwrap();
        assert!(value.is_null());
        match broadcast.unwrap() {
            Broadcast::BlocksDeleted { start, last_block_number } => {
                assert_eq!(start, 2);
                assert_eq!(last_block_number, 1);
            }
            _ => panic!("expected BlocksDeleted"),
        }
        let chain = cluster.get_or_create("alice").await;
        assert_eq!(chain.last_block_number().await, 1);
    }

    #[tokio::test]
    async fn clear_state_permanently_wipes_chain() {
        let cluster = cluster();
        let data = commit_task(&cluster, "alice", "t1").await;
        dispatch(&cluster, "alice", TOPIC_TRANSACTION, data).await.unwrap();
        dispatch(&cluster, "alice", TOPIC_CLEAR_STATE_PERMANENTLY, serde_json::Value::Null)
            .await
            .unwrap();
        let chain = cluster.get_or_create("alice").await;
        assert_eq!(chain.last_block_number().await, 0);
    }
}
