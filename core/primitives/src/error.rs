#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state invariant broken: {0}")]
    InvariantBroken(String),
    #[error("task {0} not found")]
    TaskNotFound(String),
    #[error("subtask {0} not found on task {1}")]
    SubtaskNotFound(String, String),
    #[error("category {0} not found")]
    CategoryNotFound(String),
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    #[error("invalid repeat period: {0}")]
    InvalidRepeatPeriod(String),
    #[error(transparent)]
    Encoding(#[from] serde_json::Error),
}
