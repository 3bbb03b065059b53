use serde::{Deserialize, Serialize};

use crate::state::State;
use crate::transaction::Transaction;
use crate::transition::Updates;

/// The ordered edits a transaction produced, paired with the transaction
/// itself. Stored alongside a [`Block`] so a client that already has the
/// prior block can replay the edit instead of re-downloading the full
/// state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUpdates {
    pub src_tx: Transaction,
    pub transitions: Updates,
}

/// One immutable, numbered entry in a user's chain: the state that results
/// from applying a transaction, plus enough metadata to re-verify the link
/// to the previous block.
///
/// `prev_block_hash` and `hash` are hex strings rather than [`taskchain_hash::Hash`]
/// so the wire representation matches exactly what clients and the store
/// persist; `hash` is computed over `number`, the source transaction's hash
/// and `prev_block_hash` — never over the resulting state, so the hash chain
/// stays valid even if the state encoding changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub number: i64,
    pub state: State,
    pub updates: Option<BlockUpdates>,
    pub prev_block_hash: String,
    pub hash: String,
}

#[derive(Serialize)]
struct HashableBlock<'a> {
    number: i64,
    tx_hash: &'a str,
    prev_block_hash: &'a str,
}

impl Block {
    /// Hash of the block at `number` whose source transaction hashes to
    /// `tx_hash` and whose predecessor is `prev_block_hash`. Exposed
    /// separately from [`Block::next`] so callers can verify a client's
    /// claimed block hash before committing anything.
    pub fn expected_hash(
        number: i64,
        tx_hash: &str,
        prev_block_hash: &str,
    ) -> Result<String, serde_json::Error> {
        let hashable = HashableBlock { number, tx_hash, prev_block_hash };
        Ok(taskchain_hash::hash_canonical(&hashable)?.to_hex())
    }

    pub fn genesis() -> Result<Self, serde_json::Error> {
        let state = State::new();
        let hash = Self::expected_hash(0, "", "")?;
        Ok(Block { number: 0, state, updates: None, prev_block_hash: String::new(), hash })
    }

    pub fn next(
        number: i64,
        state: State,
        updates: BlockUpdates,
        prev_block_hash: String,
    ) -> Result<Self, serde_json::Error> {
        let hash = Self::expected_hash(number, &updates.src_tx.hash, &prev_block_hash)?;
        Ok(Block { number, state, updates: Some(updates), prev_block_hash, hash })
    }
}
