//! Concrete storage adapters: Postgres for the append-only block/transaction
//! log, Redis for short-lived refresh tokens. Both are accessed through
//! traits defined by their consumers (`taskchain_chain::BlockStore`, this
//! crate's [`TokenStore`]) so the rest of the system never names `sqlx` or
//! `redis` directly.

mod pg;
mod redis_store;

pub use pg::PgBlockStore;
pub use redis_store::{RedisTokenStore, TokenStore, TokenStoreError};
