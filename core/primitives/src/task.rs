use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type TaskId = String;
pub type SubtaskId = String;
pub type CategoryId = String;

/// Repeat cadence for a task's due date. `""` (the default) means the task
/// does not repeat.
pub const REPEAT_NONE: &str = "";
pub const REPEAT_DAY: &str = "day";
pub const REPEAT_WEEK: &str = "week";
pub const REPEAT_MONTH: &str = "month";
pub const REPEAT_YEAR: &str = "year";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "tid")]
    pub id: TaskId,
    pub title: String,
    pub created_at: i64,
    pub done_at: i64,
    pub memo: String,
    pub done: bool,
    pub due_date: i64,
    /// One of `""`, `"day"`, `"week"`, `"month"`, `"year"`.
    pub repeat_period: String,
    pub repeat_start_at: i64,
    /// Id of the successor task in this user's linear ordering. `""` marks
    /// the tail of the list.
    pub next: TaskId,
    pub subtasks: BTreeMap<SubtaskId, Subtask>,
    /// Set of category ids the task belongs to, encoded as a map to `true`
    /// to mirror the original wire format.
    pub categories: BTreeMap<CategoryId, bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    #[serde(rename = "sid")]
    pub id: SubtaskId,
    pub title: String,
    pub created_at: i64,
    pub done_at: i64,
    pub due_date: i64,
    pub done: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "cid")]
    pub id: CategoryId,
    pub title: String,
    pub secret: bool,
    pub locked: bool,
    pub color: String,
    pub created_at: i64,
}
