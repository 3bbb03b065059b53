use async_trait::async_trait;

use taskchain_primitives::{Block, Transaction};

/// Persistence contract a [`crate::Chain`] needs: atomic append of one
/// (transaction, block) pair, point lookups by number or hash, ranged
/// deletion, and full wipe. Implementations own how blocks and transactions
/// are actually tabled; `Chain` never sees SQL.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Inserts `transaction` and `block` atomically: both rows exist or
    /// neither does.
    async fn insert_block(
        &self,
        user_id: &str,
        transaction: &Transaction,
        block: &Block,
    ) -> anyhow::Result<()>;

    async fn block_by_number(&self, user_id: &str, number: i64) -> anyhow::Result<Option<Block>>;

    async fn block_by_hash(&self, user_id: &str, hash: &str) -> anyhow::Result<Option<Block>>;

    /// Deletes blocks `[start, end]` and their referenced transactions.
    /// `end = None` means "to the tip".
    async fn delete_blocks_in_range(
        &self,
        user_id: &str,
        start: i64,
        end: Option<i64>,
    ) -> anyhow::Result<()>;

    /// Deletes every block and transaction belonging to `user_id`.
    async fn delete_user(&self, user_id: &str) -> anyhow::Result<()>;

    /// Every persisted block across every user, ascending by block number,
    /// each already joined against its source transaction. Used once, at
    /// cluster startup, to rebuild every chain's full history.
    async fn load_all(&self) -> anyhow::Result<Vec<(String, Block)>>;
}
