//! Wire and state types shared by every chain crate: tasks, categories,
//! transactions, transitions and blocks. Kept free of any execution or
//! persistence logic so it can be depended on from both the chain and the
//! socket layer without pulling in storage or networking crates.

pub mod block;
pub mod error;
pub mod state;
pub mod task;
pub mod transaction;
pub mod transition;

pub use block::{Block, BlockUpdates};
pub use error::StateError;
pub use state::{Positioned, State};
pub use task::{Category, CategoryId, Subtask, SubtaskId, Task, TaskId};
pub use transaction::Transaction;
pub use transition::{op, Transition, Updates};
