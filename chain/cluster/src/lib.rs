//! Owns one [`Chain`] per user, created lazily on first contact and
//! reconstructed in full from the store at startup.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use taskchain_chain::{BlockStore, Chain};
use taskchain_primitives::Block;

pub struct ChainCluster {
    store: Arc<dyn BlockStore>,
    chains: RwLock<HashMap<String, Arc<Chain>>>,
}

impl ChainCluster {
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        ChainCluster { store, chains: RwLock::new(HashMap::new()) }
    }

    /// Reads every persisted block for every user and replays it into a
    /// freshly built chain. Call once at startup before serving traffic.
    pub async fn load_from_store(&self) -> anyhow::Result<()> {
        let all = self.store.load_all().await?;
        let mut by_user: HashMap<String, Vec<Block>> = HashMap::new();
        for (user_id, block) in all {
            by_user.entry(user_id).or_default().push(block);
        }

        let mut chains = self.chains.write().await;
        for (user_id, blocks) in by_user {
            let chain = Chain::from_history(user_id.clone(), self.store.clone(), blocks)?;
            chains.insert(user_id, Arc::new(chain));
        }
        tracing::info!(user_count = chains.len(), "restored chains from store");
        Ok(())
    }

    /// Double-checked locking: most calls find the chain under a read lock
    /// and never contend with each other; only the first caller for a given
    /// user takes the write lock.
    pub async fn get_or_create(&self, user_id: &str) -> Arc<Chain> {
        if let Some(chain) = self.chains.read().await.get(user_id) {
            return chain.clone();
        }
        let mut chains = self.chains.write().await;
        if let Some(chain) = chains.get(user_id) {
            return chain.clone();
        }
        let chain =
            Arc::new(Chain::genesis(user_id, self.store.clone()).expect("genesis block never fails"));
        chains.insert(user_id.to_string(), chain.clone());
        chain
    }

    pub async fn user_count(&self) -> usize {
        self.chains.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use taskchain_primitives::Transaction;

    #[derive(Default)]
    struct FakeStore {
        blocks: StdMutex<Vec<(String, Block)>>,
    }

    #[async_trait]
    impl BlockStore for FakeStore {
        async fn insert_block(
            &self,
            user_id: &str,
            _transaction: &Transaction,
            block: &Block,
        ) -> anyhow::Result<()> {
            self.blocks.lock().unwrap().push((user_id.to_string(), block.clone()));
            Ok(())
        }

        async fn block_by_number(&self, user_id: &str, number: i64) -> anyhow::Result<Option<Block>> {
            Ok(self
                .blocks
                .lock()
                .unwrap()
                .iter()
                .find(|(u, b)| u == user_id && b.number == number)
                .map(|(_, b)| b.clone()))
        }

        async fn block_by_hash(&self, user_id: &str, hash: &str) -> anyhow::Result<Option<Block>> {
            Ok(self
                .blocks
                .lock()
                .unwrap()
                .iter()
                .find(|(u, b)| u == user_id && b.hash == hash)
                .map(|(_, b)| b.clone()))
        }

        async fn delete_blocks_in_range(
            &self,
            user_id: &str,
            start: i64,
            end: Option<i64>,
        ) -> anyhow::Result<()> {
            let upper = end.unwrap_or(i64::MAX);
            self.blocks
                .lock()
                .unwrap()
                .retain(|(u, b)| !(u == user_id && b.number >= start && b.number <= upper));
            Ok(())
        }

        async fn delete_user(&self, user_id: &str) -> anyhow::Result<()> {
            self.blocks.lock().unwrap().retain(|(u, _)| u != user_id);
            Ok(())
        }

        async fn load_all(&self) -> anyhow::Result<Vec<(String, Block)>> {
            Ok(self.blocks.lock().unwrap().clone())
        }
    }

    fn create_task_tx(tid: &str) -> Transaction {
        Transaction {
            version: 1,
            from: "alice".into(),
            tx_type: taskchain_transactions::tx::CREATE_TASK,
            timestamp: 1,
            content: serde_json::json!({"tid": tid, "title": "x", "createdAt": 1}),
            hash: format!("tx-{tid}"),
        }
    }

    #[tokio::test]
    async fn get_or_create_caches_per_user() {
        let cluster = ChainCluster::new(Arc::new(FakeStore::default()));
        let a = cluster.get_or_create("alice").await;
        let b = cluster.get_or_create("alice").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cluster.user_count().await, 1);
    }

    #[tokio::test]
    async fn load_from_store_restores_full_history() {
        let store = Arc::new(FakeStore::default());
        let seed = ChainCluster::new(store.clone());
        let chain = seed.get_or_create("alice").await;

        let hash1 =
            Block::expected_hash(1, "tx-a", &chain.last_block().await.hash).unwrap();
        chain.apply_transaction(create_task_tx("a"), 1, &hash1).await.unwrap();
        let hash2 =
            Block::expected_hash(2, "tx-b", &chain.last_block().await.hash).unwrap();
        chain.apply_transaction(create_task_tx("b"), 2, &hash2).await.unwrap();

        let cluster = ChainCluster::new(store);
        cluster.load_from_store().await.unwrap();
        let restored = cluster.get_or_create("alice").await;
        assert_eq!(restored.last_block_number().await, 2);
        let block1 = restored.block_by_number(1).await.unwrap();
        assert!(block1.state.tasks.contains_key("a"));
    }
}
