//! A single user's chain: block numbering, hash linkage to the previous
//! block, and the lock that makes committing a transaction atomic with
//! respect to both the in-memory cache and the store.
//!
//! Block 0 is never persisted; it is reconstructed in memory by every
//! [`Chain`] on construction. Every other block is cached by number and
//! backfilled from the store on a cache miss.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use taskchain_primitives::{Block, BlockUpdates, State, Transaction};

mod store;

pub use store::BlockStore;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("block {0} not found")]
    BlockNotFound(i64),
    #[error("expected waiting block number {expected}, got {actual}")]
    BlockNumberMismatch { expected: i64, actual: i64 },
    #[error("expected block hash {expected}, got {given}")]
    BlockHashMismatch { expected: String, given: String },
    #[error("range start must be >= 1")]
    InvalidRange,
    #[error(transparent)]
    PreExecute(#[from] taskchain_transactions::PreExecuteError),
    #[error(transparent)]
    Apply(#[from] taskchain_transitions::ApplyError),
    #[error(transparent)]
    State(#[from] taskchain_primitives::StateError),
    #[error(transparent)]
    Encoding(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

struct Cache {
    blocks: BTreeMap<i64, Block>,
    last_block_number: i64,
}

/// One user's chain. `blocks` and `last_block_number` are always mutated
/// together, under the same lock, so a reader never observes a
/// `last_block_number` without the block it names.
pub struct Chain {
    user_id: String,
    store: Arc<dyn BlockStore>,
    cache: Mutex<Cache>,
}

impl Chain {
    /// A fresh chain holding nothing but the genesis block.
    pub fn genesis(user_id: impl Into<String>, store: Arc<dyn BlockStore>) -> Result<Self, ChainError> {
        let mut blocks = BTreeMap::new();
        blocks.insert(0, Block::genesis()?);
        Ok(Chain { user_id: user_id.into(), store, cache: Mutex::new(Cache { blocks, last_block_number: 0 }) })
    }

    /// Rebuilds a chain from its full persisted block history. `history` need
    /// not be sorted and must not include block 0, which is always synthetic.
    pub fn from_history(
        user_id: impl Into<String>,
        store: Arc<dyn BlockStore>,
        history: Vec<Block>,
    ) -> Result<Self, ChainError> {
        let mut blocks = BTreeMap::new();
        blocks.insert(0, Block::genesis()?);
        let mut last_block_number = 0;
        for block in history {
            last_block_number = last_block_number.max(block.number);
            blocks.insert(block.number, block);
        }
        Ok(Chain { user_id: user_id.into(), store, cache: Mutex::new(Cache { blocks, last_block_number }) })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn last_state(&self) -> State {
        let cache = self.cache.lock().await;
        cache.blocks[&cache.last_block_number].state.clone()
    }

    pub async fn last_block(&self) -> Block {
        let cache = self.cache.lock().await;
        cache.blocks[&cache.last_block_number].clone()
    }

    pub async fn last_block_number(&self) -> i64 {
        self.cache.lock().await.last_block_number
    }

    pub async fn waiting_block_number(&self) -> i64 {
        self.last_block_number().await + 1
    }

    /// Block 0 is always served from memory. Anything else is served from
    /// the cache if present, else read through to the store and backfilled.
    pub async fn block_by_number(&self, number: i64) -> Result<Block, ChainError> {
        {
            let cache = self.cache.lock().await;
            if let Some(block) = cache.blocks.get(&number) {
                return Ok(block.clone());
            }
        }
        let block = self
            .store
            .block_by_number(&self.user_id, number)
            .await
            .map_err(ChainError::Store)?
            .ok_or(ChainError::BlockNotFound(number))?;
        let mut cache = self.cache.lock().await;
        cache.blocks.entry(number).or_insert_with(|| block.clone());
        Ok(block)
    }

    pub async fn block_by_hash(&self, hash: &str) -> Result<Block, ChainError> {
        {
            let cache = self.cache.lock().await;
            if let Some(block) = cache.blocks.values().find(|b| b.hash == hash) {
                return Ok(block.clone());
            }
        }
        let block = self
            .store
            .block_by_hash(&self.user_id, hash)
            .await
            .map_err(ChainError::Store)?
            .ok_or_else(|| ChainError::BlockNotFound(-1))?;
        let mut cache = self.cache.lock().await;
        let number = block.number;
        cache.blocks.entry(number).or_insert_with(|| block.clone());
        Ok(block)
    }

    pub async fn blocks_in_range(&self, start: i64, end: i64) -> Result<Vec<Block>, ChainError> {
        let mut out = Vec::new();
        for number in start..=end {
            out.push(self.block_by_number(number).await?);
        }
        Ok(out)
    }

    /// Validates the request's waiting-block-number and block-hash claims,
    /// pre-executes and applies the transaction, and persists the result —
    /// all under one lock acquisition, so "block exists iff persisted" holds
    /// even when requests queue on the same user.
    pub async fn apply_transaction(
        &self,
        transaction: Transaction,
        block_number: i64,
        expected_block_hash: &str,
    ) -> Result<Block, ChainError> {
        let mut cache = self.cache.lock().await;

        let waiting = cache.last_block_number + 1;
        if block_number != waiting {
            return Err(ChainError::BlockNumberMismatch { expected: waiting, actual: block_number });
        }

        let prev = cache
            .blocks
            .get(&cache.last_block_number)
            .cloned()
            .ok_or(ChainError::BlockNotFound(cache.last_block_number))?;

        let computed_hash = Block::expected_hash(block_number, &transaction.hash, &prev.hash)?;
        if expected_block_hash != computed_hash {
            return Err(ChainError::BlockHashMismatch {
                expected: computed_hash,
                given: expected_block_hash.to_string(),
            });
        }

        let updates = taskchain_transactions::pre_execute(&prev.state, &transaction, block_number)?;
        let mut next_state = prev.state.clone();
        taskchain_transitions::apply_all(&mut next_state, &updates)?;
        next_state.validate()?;

        let block_updates = BlockUpdates { src_tx: transaction.clone(), transitions: updates };
        let block = Block::next(block_number, next_state, block_updates, prev.hash.clone())?;

        self.store.insert_block(&self.user_id, &transaction, &block).await.map_err(ChainError::Store)?;

        cache.blocks.insert(block_number, block.clone());
        cache.last_block_number = block_number;
        Ok(block)
    }

    /// Deletes `[start, end]` (or `[start, tip]` when `end` is `None`).
    /// Genesis can never be targeted since `start` must be at least 1.
    pub async fn delete_block_interval(&self, start: i64, end: Option<i64>) -> Result<(), ChainError> {
        if start < 1 {
            return Err(ChainError::InvalidRange);
        }
        let mut cache = self.cache.lock().await;
        self.store.delete_blocks_in_range(&self.user_id, start, end).await.map_err(ChainError::Store)?;

        if let Some(end) = end {
            if cache.blocks.keys().any(|&n| n > end) {
                tracing::warn!(
                    user_id = %self.user_id,
                    end,
                    "cached blocks survive past the end of a deleted range"
                );
            }
        }
        let upper = end.unwrap_or(i64::MAX);
        cache.blocks.retain(|&number, _| number < start || number > upper);
        cache.last_block_number = start - 1;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), ChainError> {
        let mut cache = self.cache.lock().await;
        self.store.delete_user(&self.user_id).await.map_err(ChainError::Store)?;
        cache.blocks = BTreeMap::from([(0, Block::genesis()?)]);
        cache.last_block_number = 0;
        Ok(())
    }
}
