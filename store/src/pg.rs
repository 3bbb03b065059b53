use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::Row;

use taskchain_chain::BlockStore;
use taskchain_primitives::block::BlockUpdates;
use taskchain_primitives::{Block, Transaction, Updates};

/// Postgres-backed [`BlockStore`]. One row per transaction, one row per
/// block, linked by `tx_hash`; `insert_block` writes both inside a single
/// database transaction so a block is never visible without its source
/// transaction, and the transitions that produced it are persisted
/// alongside so a restart never has to re-derive them.
pub struct PgBlockStore {
    pool: PgPool,
}

impl PgBlockStore {
    pub fn new(pool: PgPool) -> Self {
        PgBlockStore { pool }
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_block(row: &sqlx::postgres::PgRow) -> Result<Block, sqlx::Error> {
        let state: serde_json::Value = row.try_get("state")?;
        let state = serde_json::from_value(state).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let transitions: serde_json::Value = row.try_get("transitions")?;
        let transitions: Updates =
            serde_json::from_value(transitions).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let content: serde_json::Value = row.try_get("content")?;
        let transaction = Transaction {
            version: row.try_get("version")?,
            from: row.try_get("from")?,
            tx_type: row.try_get("type")?,
            timestamp: row.try_get("timestamp")?,
            content,
            hash: row.try_get("tx_hash")?,
        };
        Ok(Block {
            number: row.try_get("block_number")?,
            state,
            updates: Some(BlockUpdates { src_tx: transaction, transitions }),
            prev_block_hash: row.try_get("prev_block_hash")?,
            hash: row.try_get("block_hash")?,
        })
    }
}

const SELECT_BLOCK: &str = r#"
    SELECT b.uid, b.block_number, b.block_hash, b.prev_block_hash, b.state, b.transitions,
           t.version, t.from, t.type, t.timestamp, t.content, t.hash AS tx_hash
    FROM blocks b
    JOIN transactions t ON t.hash = b.tx_hash
"#;

#[async_trait]
impl BlockStore for PgBlockStore {
    async fn insert_block(
        &self,
        user_id: &str,
        transaction: &Transaction,
        block: &Block,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO transactions (version, type, "from", timestamp, content, hash)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (hash) DO NOTHING"#,
        )
        .bind(transaction.version)
        .bind(transaction.tx_type)
        .bind(&transaction.from)
        .bind(transaction.timestamp)
        .bind(&transaction.content)
        .bind(&transaction.hash)
        .execute(&mut *tx)
        .await?;

        let state_json = serde_json::to_value(&block.state)?;
        let transitions = block.updates.as_ref().map(|u| &u.transitions);
        let transitions_json = serde_json::to_value(transitions)?;
        sqlx::query(
            r#"INSERT INTO blocks (uid, transitions, state, block_number, block_hash, tx_hash, prev_block_hash)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(user_id)
        .bind(&transitions_json)
        .bind(&state_json)
        .bind(block.number)
        .bind(&block.hash)
        .bind(&transaction.hash)
        .bind(&block.prev_block_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(user_id, block_number = block.number, "persisted block");
        Ok(())
    }

    async fn block_by_number(&self, user_id: &str, number: i64) -> anyhow::Result<Option<Block>> {
        let row = sqlx::query(&format!("{SELECT_BLOCK} WHERE b.uid = $1 AND b.block_number = $2"))
            .bind(user_id)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_block).transpose().map_err(Into::into)
    }

    async fn block_by_hash(&self, user_id: &str, hash: &str) -> anyhow::Result<Option<Block>> {
        let row = sqlx::query(&format!("{SELECT_BLOCK} WHERE b.uid = $1 AND b.block_hash = $2"))
            .bind(user_id)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_block).transpose().map_err(Into::into)
    }

    async fn delete_blocks_in_range(
        &self,
        user_id: &str,
        start: i64,
        end: Option<i64>,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        let end = end.unwrap_or(i64::MAX);

        sqlx::query(
            r#"DELETE FROM transactions
               WHERE hash IN (
                   SELECT tx_hash FROM blocks
                   WHERE uid = $1 AND block_number >= $2 AND block_number <= $3
               )"#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM blocks WHERE uid = $1 AND block_number >= $2 AND block_number <= $3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::warn!(user_id, start, end, "deleted block range");
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"DELETE FROM transactions WHERE hash IN (SELECT tx_hash FROM blocks WHERE uid = $1)"#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM blocks WHERE uid = $1").bind(user_id).execute(&mut *tx).await?;
        tx.commit().await?;
        tracing::warn!(user_id, "cleared all chain state");
        Ok(())
    }

    async fn load_all(&self) -> anyhow::Result<Vec<(String, Block)>> {
        let rows = sqlx::query(&format!("{SELECT_BLOCK} ORDER BY b.block_number ASC"))
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let user_id: String = row.try_get("uid")?;
            out.push((user_id, Self::row_to_block(row)?));
        }
        Ok(out)
    }
}
