//! Turns a client [`Transaction`] into the ordered [`Transition`]s it
//! produces when applied against a given prior [`State`].
//!
//! This is "pre-execution": nothing here mutates state directly, it only
//! decides what the sequence of edits should be and validates every
//! precondition up front. `taskchain-transitions` then applies the result as
//! a pure mechanical replay, with no further decisions of its own. Splitting
//! the two means the exact same transitions can later be replayed by a
//! client that already trusts the prior state, without re-running
//! transaction-specific business logic such as repeat-period rollover.

use std::collections::BTreeMap;

use chrono::{Datelike, TimeZone, Timelike, Utc};
use serde::Deserialize;

use taskchain_primitives::task::{Category, Task};
use taskchain_primitives::transition::*;
use taskchain_primitives::{State, Transaction, Updates};

/// Transaction-type numeric codes, dispatched on `Transaction::tx_type`.
/// Sparse and semantically grouped: task-level ops live in the 10000s,
/// task-category ops in the 10100s, subtask ops in the 11000s, and category
/// ops in the 12000s.
pub mod tx {
    pub const INITIALIZE: i64 = 0;

    pub const CREATE_TASK: i64 = 10000;
    pub const DELETE_TASK: i64 = 10001;
    pub const UPDATE_TASK_ORDER: i64 = 10002;
    pub const UPDATE_TASK_TITLE: i64 = 10003;
    pub const UPDATE_TASK_DUE_DATE: i64 = 10004;
    pub const UPDATE_TASK_MEMO: i64 = 10005;
    pub const UPDATE_TASK_DONE: i64 = 10006;
    pub const UPDATE_TASK_REPEAT_PERIOD: i64 = 10007;

    pub const ADD_TASK_CATEGORY: i64 = 10100;
    pub const DELETE_TASK_CATEGORY: i64 = 10101;

    pub const CREATE_SUBTASK: i64 = 11000;
    pub const DELETE_SUBTASK: i64 = 11001;
    pub const UPDATE_SUBTASK_TITLE: i64 = 11002;
    pub const UPDATE_SUBTASK_DUE_DATE: i64 = 11003;
    pub const UPDATE_SUBTASK_DONE: i64 = 11004;

    pub const CREATE_CATEGORY: i64 = 12000;
    pub const DELETE_CATEGORY: i64 = 12001;
    pub const UPDATE_CATEGORY_COLOR: i64 = 12002;
}

#[derive(Debug, thiserror::Error)]
pub enum PreExecuteError {
    #[error("unknown transaction type {0}")]
    UnknownType(i64),
    #[error("malformed content for transaction type {0}: {1}")]
    MalformedContent(i64, serde_json::Error),
    #[error("task {0} not found")]
    TaskNotFound(String),
    #[error("subtask {1} not found on task {0}")]
    SubtaskNotFound(String, String),
    #[error("category {0} not found")]
    CategoryNotFound(String),
    #[error("state mismatch: {0}")]
    StateMismatch(String),
}

#[derive(Deserialize)]
struct InitializeContent {
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    categories: Vec<Category>,
}

/// Transaction-layer content for `TxCreateTask`. Carries `prev_task_id`,
/// which has no place on the transition-layer [`CreateTaskParams`] since
/// linking into the list is a decision, not a field of the created task.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskContent {
    tid: String,
    title: String,
    #[serde(default)]
    created_at: i64,
    #[serde(default)]
    done_at: i64,
    #[serde(default)]
    memo: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    due_date: i64,
    #[serde(default)]
    repeat_period: String,
    #[serde(default)]
    repeat_start_at: i64,
    #[serde(default)]
    categories: BTreeMap<String, bool>,
    #[serde(default)]
    prev_task_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteTaskContent {
    tid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTaskOrderContent {
    #[serde(rename = "tid")]
    id: String,
    target_task_id: String,
    after_target: bool,
}

/// Transaction-layer content for `TxUpdateTaskDone`. `done_at` is carried
/// separately from `UpdateTaskDoneParams` because it becomes its own
/// `UpdateTaskDoneAt` transition.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTaskDoneContent {
    tid: String,
    done: bool,
    #[serde(default)]
    done_at: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskCategoryContent {
    tid: String,
    cid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubtaskTargetContent {
    tid: String,
    sid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSubtaskDoneContent {
    tid: String,
    sid: String,
    done: bool,
    #[serde(default)]
    done_at: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteCategoryContent {
    cid: String,
}

/// Decides the sequence of transitions `transaction` produces against
/// `state`. Does not mutate `state`; callers apply the result separately.
/// `new_block_number` is accepted but unused by every transaction type
/// today: `TxInitialize` is accepted at any block number (see DESIGN.md).
pub fn pre_execute(
    state: &State,
    transaction: &Transaction,
    _new_block_number: i64,
) -> Result<Updates, PreExecuteError> {
    let tx_type = transaction.tx_type;
    let content = &transaction.content;
    let now = Utc::now().timestamp();
    fn parse<T: serde::de::DeserializeOwned>(
        tx_type: i64,
        c: &serde_json::Value,
    ) -> Result<T, PreExecuteError> {
        serde_json::from_value(c.clone()).map_err(|e| PreExecuteError::MalformedContent(tx_type, e))
    }

    let transitions = match tx_type {
        tx::INITIALIZE => initialize(parse(tx_type, content)?),
        tx::CREATE_TASK => create_task(state, parse(tx_type, content)?)?,
        tx::DELETE_TASK => delete_task(state, parse(tx_type, content)?)?,
        tx::UPDATE_TASK_ORDER => update_task_order(state, parse(tx_type, content)?)?,
        tx::UPDATE_TASK_TITLE => {
            let p: UpdateTaskTitleParams = parse(tx_type, content)?;
            require_task(state, &p.tid)?;
            vec![Transition::UpdateTaskTitle(p)]
        }
        tx::UPDATE_TASK_DUE_DATE => {
            let p: UpdateTaskDueDateParams = parse(tx_type, content)?;
            require_task(state, &p.tid)?;
            vec![Transition::UpdateTaskDueDate(p)]
        }
        tx::UPDATE_TASK_MEMO => {
            let p: UpdateTaskMemoParams = parse(tx_type, content)?;
            require_task(state, &p.tid)?;
            vec![Transition::UpdateTaskMemo(p)]
        }
        tx::UPDATE_TASK_DONE => update_task_done(state, parse(tx_type, content)?, now)?,
        tx::UPDATE_TASK_REPEAT_PERIOD => update_task_repeat_period(state, parse(tx_type, content)?)?,
        tx::ADD_TASK_CATEGORY => {
            let c: TaskCategoryContent = parse(tx_type, content)?;
            require_task(state, &c.tid)?;
            require_category(state, &c.cid)?;
            vec![Transition::CreateTaskCategory(CreateTaskCategoryParams { tid: c.tid, cid: c.cid })]
        }
        tx::DELETE_TASK_CATEGORY => {
            let c: TaskCategoryContent = parse(tx_type, content)?;
            require_task(state, &c.tid)?;
            require_category(state, &c.cid)?;
            vec![Transition::DeleteTaskCategory(DeleteTaskCategoryParams { tid: c.tid, cid: c.cid })]
        }
        tx::CREATE_SUBTASK => {
            let p: CreateSubtaskParams = parse(tx_type, content)?;
            require_task(state, &p.tid)?;
            vec![Transition::CreateSubtask(p)]
        }
        tx::DELETE_SUBTASK => {
            let c: SubtaskTargetContent = parse(tx_type, content)?;
            require_subtask(state, &c.tid, &c.sid)?;
            vec![Transition::DeleteSubtask(DeleteSubtaskParams { tid: c.tid, sid: c.sid })]
        }
        tx::UPDATE_SUBTASK_TITLE => {
            let p: UpdateSubtaskTitleParams = parse(tx_type, content)?;
            require_subtask(state, &p.tid, &p.sid)?;
            vec![Transition::UpdateSubtaskTitle(p)]
        }
        tx::UPDATE_SUBTASK_DUE_DATE => {
            let p: UpdateSubtaskDueDateParams = parse(tx_type, content)?;
            require_subtask(state, &p.tid, &p.sid)?;
            vec![Transition::UpdateSubtaskDueDate(p)]
        }
        tx::UPDATE_SUBTASK_DONE => {
            let c: UpdateSubtaskDoneContent = parse(tx_type, content)?;
            require_subtask(state, &c.tid, &c.sid)?;
            vec![
                Transition::UpdateSubtaskDone(UpdateSubtaskDoneParams {
                    tid: c.tid.clone(),
                    sid: c.sid.clone(),
                    done: c.done,
                }),
                Transition::UpdateSubtaskDoneAt(UpdateSubtaskDoneAtParams {
                    tid: c.tid,
                    sid: c.sid,
                    done_at: c.done_at,
                }),
            ]
        }
        tx::CREATE_CATEGORY => vec![Transition::CreateCategory(parse(tx_type, content)?)],
        tx::DELETE_CATEGORY => delete_category(state, parse(tx_type, content)?)?,
        tx::UPDATE_CATEGORY_COLOR => {
            let p: UpdateCategoryColorParams = parse(tx_type, content)?;
            require_category(state, &p.cid)?;
            vec![Transition::UpdateCategoryColor(p)]
        }
        other => return Err(PreExecuteError::UnknownType(other)),
    };

    Ok(Updates(transitions))
}

fn require_task<'a>(state: &'a State, tid: &str) -> Result<&'a Task, PreExecuteError> {
    state
        .tasks
        .get(tid)
        .ok_or_else(|| PreExecuteError::StateMismatch(format!("task {tid} not found")))
}

fn require_subtask(state: &State, tid: &str, sid: &str) -> Result<(), PreExecuteError> {
    let task = state
        .tasks
        .get(tid)
        .ok_or_else(|| PreExecuteError::StateMismatch(format!("task {tid} not found")))?;
    if !task.subtasks.contains_key(sid) {
        return Err(PreExecuteError::StateMismatch(format!(
            "subtask {sid} not found on task {tid}"
        )));
    }
    Ok(())
}

fn require_category(state: &State, cid: &str) -> Result<(), PreExecuteError> {
    if !state.categories.contains_key(cid) {
        return Err(PreExecuteError::StateMismatch(format!("category {cid} not found")));
    }
    Ok(())
}

fn initialize(content: InitializeContent) -> Vec<Transition> {
    let mut out = vec![Transition::DeleteAll];

    for category in &content.categories {
        out.push(Transition::CreateCategory(CreateCategoryParams {
            cid: category.id.clone(),
            title: category.title.clone(),
            secret: category.secret,
            locked: category.locked,
            color: category.color.clone(),
            created_at: category.created_at,
        }));
    }

    for task in &content.tasks {
        out.push(Transition::CreateTask(CreateTaskParams {
            tid: task.id.clone(),
            title: task.title.clone(),
            created_at: task.created_at,
            done_at: task.done_at,
            memo: task.memo.clone(),
            done: task.done,
            due_date: task.due_date,
            repeat_period: task.repeat_period.clone(),
            repeat_start_at: task.repeat_start_at,
            categories: task.categories.clone(),
        }));
        out.push(Transition::UpdateTaskNext(UpdateTaskNextParams {
            tid: task.id.clone(),
            next: task.next.clone(),
        }));
        for subtask in task.subtasks.values() {
            out.push(Transition::CreateSubtask(CreateSubtaskParams {
                tid: task.id.clone(),
                sid: subtask.id.clone(),
                title: subtask.title.clone(),
                created_at: subtask.created_at,
                due_date: subtask.due_date,
                done: subtask.done,
                done_at: subtask.done_at,
            }));
        }
    }

    out
}

fn create_task(
    state: &State,
    content: CreateTaskContent,
) -> Result<Vec<Transition>, PreExecuteError> {
    for cid in content.categories.keys() {
        require_category(state, cid).map_err(|_| PreExecuteError::CategoryNotFound(cid.clone()))?;
    }

    let mut out = vec![Transition::CreateTask(CreateTaskParams {
        tid: content.tid.clone(),
        title: content.title,
        created_at: content.created_at,
        done_at: content.done_at,
        memo: content.memo,
        done: content.done,
        due_date: content.due_date,
        repeat_period: content.repeat_period,
        repeat_start_at: content.repeat_start_at,
        categories: content.categories,
    })];

    if !content.prev_task_id.is_empty() {
        out.push(Transition::UpdateTaskNext(UpdateTaskNextParams {
            tid: content.prev_task_id,
            next: content.tid,
        }));
    }

    Ok(out)
}

fn delete_task(
    state: &State,
    content: DeleteTaskContent,
) -> Result<Vec<Transition>, PreExecuteError> {
    let positioned = state
        .sort_tasks()
        .map_err(|e| PreExecuteError::StateMismatch(e.to_string()))?;
    let entry = positioned
        .iter()
        .find(|p| p.task.id == content.tid)
        .ok_or_else(|| PreExecuteError::StateMismatch(format!("task {} not found", content.tid)))?;

    let mut out = Vec::new();
    if !entry.prev_id.is_empty() {
        out.push(Transition::UpdateTaskNext(UpdateTaskNextParams {
            tid: entry.prev_id.clone(),
            next: entry.task.next.clone(),
        }));
    }
    out.push(Transition::DeleteTask(DeleteTaskParams { tid: content.tid }));
    Ok(out)
}

/// Unlinks the source task from its current position, then relinks it
/// either immediately after or immediately before the target task.
fn update_task_order(
    state: &State,
    content: UpdateTaskOrderContent,
) -> Result<Vec<Transition>, PreExecuteError> {
    let positioned =
        state.sort_tasks().map_err(|e| PreExecuteError::StateMismatch(e.to_string()))?;
    let source = positioned
        .iter()
        .find(|p| p.task.id == content.id)
        .ok_or_else(|| PreExecuteError::StateMismatch(format!("task {} not found", content.id)))?;
    let target = positioned
        .iter()
        .find(|p| p.task.id == content.target_task_id)
        .ok_or_else(|| {
            PreExecuteError::StateMismatch(format!("task {} not found", content.target_task_id))
        })?;

    let source_prev_id = source.prev_id.clone();
    let source_next = source.task.next.clone();
    let target_next = target.task.next.clone();
    // If the target's predecessor is the source itself, removing the source
    // makes the target's new predecessor the source's old predecessor.
    let effective_target_prev = if target.prev_id == content.id {
        source_prev_id.clone()
    } else {
        target.prev_id.clone()
    };

    let mut out = Vec::new();
    if !source_prev_id.is_empty() {
        out.push(Transition::UpdateTaskNext(UpdateTaskNextParams {
            tid: source_prev_id,
            next: source_next,
        }));
    }

    if content.after_target {
        out.push(Transition::UpdateTaskNext(UpdateTaskNextParams {
            tid: content.target_task_id.clone(),
            next: content.id.clone(),
        }));
        out.push(Transition::UpdateTaskNext(UpdateTaskNextParams {
            tid: content.id,
            next: target_next,
        }));
    } else {
        if !effective_target_prev.is_empty() {
            out.push(Transition::UpdateTaskNext(UpdateTaskNextParams {
                tid: effective_target_prev,
                next: content.id.clone(),
            }));
        }
        out.push(Transition::UpdateTaskNext(UpdateTaskNextParams {
            tid: content.id,
            next: content.target_task_id,
        }));
    }

    Ok(out)
}

/// Marking a repeating task done rolls its due date forward instead of
/// completing it: the new due date is the smallest `dueDate + k*period`
/// (`k >= 1`, starting from `max(repeatStartAt, dueDate)`) strictly after
/// both `now` and the task's current due date.
fn update_task_done(
    state: &State,
    content: UpdateTaskDoneContent,
    now: i64,
) -> Result<Vec<Transition>, PreExecuteError> {
    let task = require_task(state, &content.tid)?;

    if task.repeat_period.is_empty() {
        return Ok(vec![
            Transition::UpdateTaskDone(UpdateTaskDoneParams {
                tid: content.tid.clone(),
                done: content.done,
            }),
            Transition::UpdateTaskDoneAt(UpdateTaskDoneAtParams {
                tid: content.tid,
                done_at: content.done_at,
            }),
        ]);
    }

    let floor = task.repeat_start_at.max(task.due_date);
    let next_due = roll_due_date_forward(floor, now, task.due_date, &task.repeat_period);
    Ok(vec![
        Transition::UpdateTaskDone(UpdateTaskDoneParams { tid: content.tid.clone(), done: false }),
        Transition::UpdateTaskDoneAt(UpdateTaskDoneAtParams {
            tid: content.tid.clone(),
            done_at: content.done_at,
        }),
        Transition::UpdateTaskDueDate(UpdateTaskDueDateParams { tid: content.tid, due_date: next_due }),
    ])
}

fn update_task_repeat_period(
    state: &State,
    p: UpdateTaskRepeatPeriodParams,
) -> Result<Vec<Transition>, PreExecuteError> {
    let task = require_task(state, &p.tid)?;
    let mut out = vec![Transition::UpdateTaskRepeatPeriod(p.clone())];
    if task.repeat_start_at == 0 && task.due_date != 0 {
        out.push(Transition::UpdateTaskRepeatStartAt(UpdateTaskRepeatStartAtParams {
            tid: p.tid,
            repeat_start_at: task.due_date,
        }));
    }
    Ok(out)
}

fn delete_category(
    state: &State,
    content: DeleteCategoryContent,
) -> Result<Vec<Transition>, PreExecuteError> {
    if !state.categories.contains_key(&content.cid) {
        return Err(PreExecuteError::StateMismatch(format!("category {} not found", content.cid)));
    }
    let referencing = state.tasks.values().filter(|t| t.categories.contains_key(&content.cid)).count();
    if referencing > 0 {
        return Err(PreExecuteError::StateMismatch(format!(
            "category {} still referenced by {} task(s)",
            content.cid, referencing
        )));
    }
    Ok(vec![Transition::DeleteCategory(DeleteCategoryParams { cid: content.cid })])
}

/// Repeatedly adds one period to `start` (unix seconds) until the result is
/// strictly after both `now` and `due_date`.
fn roll_due_date_forward(start: i64, now: i64, due_date: i64, period: &str) -> i64 {
    let mut current = Utc.timestamp_opt(start, 0).single().unwrap_or_else(Utc::now);
    loop {
        current = add_period(current, period);
        let ts = current.timestamp();
        if ts > now && ts > due_date {
            return ts;
        }
    }
}

fn add_period(dt: chrono::DateTime<Utc>, period: &str) -> chrono::DateTime<Utc> {
    match period {
        "day" => dt + chrono::Duration::days(1),
        "week" => dt + chrono::Duration::weeks(1),
        "month" => add_months(dt, 1),
        "year" => add_months(dt, 12),
        _ => dt,
    }
}

fn add_months(dt: chrono::DateTime<Utc>, months: i32) -> chrono::DateTime<Utc> {
    let total = dt.year() * 12 + (dt.month() as i32 - 1) + months;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let day = dt.day();
    let last_day = days_in_month(year, month);
    Utc.with_ymd_and_hms(year, month, day.min(last_day), dt.hour(), dt.minute(), dt.second())
        .single()
        .unwrap_or(dt)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next =
        Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).single().expect("valid date");
    let first_of_this =
        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single().expect("valid date");
    (first_of_next - first_of_this).num_days() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskchain_primitives::task::Task;

    fn tx(tx_type: i64, content: serde_json::Value) -> Transaction {
        Transaction {
            version: 1,
            from: "alice".into(),
            tx_type,
            timestamp: 1_700_000_000,
            content,
            hash: String::new(),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let state = State::new();
        let t = tx(999, serde_json::json!({}));
        assert!(matches!(pre_execute(&state, &t, 1), Err(PreExecuteError::UnknownType(999))));
    }

    #[test]
    fn initialize_emits_categories_then_tasks_with_next_links() {
        let state = State::new();
        let t = tx(
            tx::INITIALIZE,
            serde_json::json!({
                "categories": [{"cid": "c1", "title": "Work"}],
                "tasks": [{"tid": "t1", "title": "A", "next": "t2"}, {"tid": "t2", "title": "B"}],
            }),
        );
        let updates = pre_execute(&state, &t, 1).unwrap();
        assert!(matches!(updates.0[0], Transition::DeleteAll));
        assert!(matches!(updates.0[1], Transition::CreateCategory(_)));
        assert!(matches!(updates.0[2], Transition::CreateTask(_)));
        assert!(matches!(updates.0[3], Transition::UpdateTaskNext(_)));
    }

    #[test]
    fn create_task_rejects_unknown_category() {
        let state = State::new();
        let t = tx(
            tx::CREATE_TASK,
            serde_json::json!({"tid": "t1", "title": "x", "categories": {"missing": true}}),
        );
        assert!(matches!(
            pre_execute(&state, &t, 1),
            Err(PreExecuteError::CategoryNotFound(_))
        ));
    }

    #[test]
    fn create_task_with_prev_emits_link() {
        let mut state = State::new();
        state.tasks.insert("a".into(), Task { id: "a".into(), ..Default::default() });
        let t = tx(
            tx::CREATE_TASK,
            serde_json::json!({"tid": "b", "title": "x", "prevTaskId": "a"}),
        );
        let updates = pre_execute(&state, &t, 1).unwrap();
        assert_eq!(updates.0.len(), 2);
        match &updates.0[1] {
            Transition::UpdateTaskNext(p) => {
                assert_eq!(p.tid, "a");
                assert_eq!(p.next, "b");
            }
            other => panic!("expected UpdateTaskNext, got {other:?}"),
        }
    }

    #[test]
    fn delete_task_relinks_predecessor() {
        let mut state = State::new();
        state.tasks.insert("a".into(), Task { id: "a".into(), next: "b".into(), ..Default::default() });
        state.tasks.insert("b".into(), Task { id: "b".into(), next: "c".into(), ..Default::default() });
        state.tasks.insert("c".into(), Task { id: "c".into(), ..Default::default() });
        let t = tx(tx::DELETE_TASK, serde_json::json!({"tid": "b"}));
        let updates = pre_execute(&state, &t, 1).unwrap();
        assert_eq!(updates.0.len(), 2);
        match &updates.0[0] {
            Transition::UpdateTaskNext(p) => {
                assert_eq!(p.tid, "a");
                assert_eq!(p.next, "c");
            }
            other => panic!("expected UpdateTaskNext, got {other:?}"),
        }
        assert!(matches!(updates.0[1], Transition::DeleteTask(_)));
    }

    #[test]
    fn delete_head_task_emits_only_delete() {
        let mut state = State::new();
        state.tasks.insert("a".into(), Task { id: "a".into(), ..Default::default() });
        let t = tx(tx::DELETE_TASK, serde_json::json!({"tid": "a"}));
        let updates = pre_execute(&state, &t, 1).unwrap();
        assert_eq!(updates.0, vec![Transition::DeleteTask(DeleteTaskParams { tid: "a".into() })]);
    }

    #[test]
    fn update_task_order_after_target_unlinks_and_relinks() {
        let mut state = State::new();
        state.tasks.insert("a".into(), Task { id: "a".into(), next: "b".into(), ..Default::default() });
        state.tasks.insert("b".into(), Task { id: "b".into(), next: "".into(), ..Default::default() });
        state.tasks.insert("c".into(), Task { id: "c".into(), next: "a".into(), ..Default::default() });
        let t = tx(
            tx::UPDATE_TASK_ORDER,
            serde_json::json!({"tid": "c", "targetTaskId": "a", "afterTarget": true}),
        );
        let updates = pre_execute(&state, &t, 1).unwrap();
        // c has no predecessor (it's the head), so only the two relink steps fire.
        assert_eq!(
            updates.0,
            vec![
                Transition::UpdateTaskNext(UpdateTaskNextParams { tid: "a".into(), next: "c".into() }),
                Transition::UpdateTaskNext(UpdateTaskNextParams { tid: "c".into(), next: "b".into() }),
            ]
        );
    }

    #[test]
    fn update_task_done_without_repeat_emits_done_and_done_at() {
        let mut state = State::new();
        state.tasks.insert(
            "t1".into(),
            Task { id: "t1".into(), due_date: 1_700_000_000, ..Default::default() },
        );
        let t = tx(tx::UPDATE_TASK_DONE, serde_json::json!({"tid": "t1", "done": true, "doneAt": 5}));
        let updates = pre_execute(&state, &t, 1).unwrap();
        assert_eq!(
            updates.0,
            vec![
                Transition::UpdateTaskDone(UpdateTaskDoneParams { tid: "t1".into(), done: true }),
                Transition::UpdateTaskDoneAt(UpdateTaskDoneAtParams { tid: "t1".into(), done_at: 5 }),
            ]
        );
    }

    #[test]
    fn update_task_done_with_repeat_rolls_due_date_past_repeat_start() {
        let mut state = State::new();
        state.tasks.insert(
            "t1".into(),
            Task {
                id: "t1".into(),
                due_date: 1_700_000_000,
                repeat_period: "day".into(),
                repeat_start_at: 1_700_500_000,
                ..Default::default()
            },
        );
        let t = tx(tx::UPDATE_TASK_DONE, serde_json::json!({"tid": "t1", "done": true, "doneAt": 9}));
        let updates = pre_execute(&state, &t, 1).unwrap();
        assert_eq!(updates.0.len(), 3);
        match &updates.0[2] {
            Transition::UpdateTaskDueDate(p) => {
                assert!(p.due_date > 1_700_500_000);
                assert!(p.due_date > 1_700_000_000);
            }
            other => panic!("expected UpdateTaskDueDate, got {other:?}"),
        }
    }

    #[test]
    fn update_task_repeat_period_backfills_start_when_unset() {
        let mut state = State::new();
        state.tasks.insert(
            "t1".into(),
            Task { id: "t1".into(), due_date: 42, repeat_start_at: 0, ..Default::default() },
        );
        let t = tx(
            tx::UPDATE_TASK_REPEAT_PERIOD,
            serde_json::json!({"tid": "t1", "repeatPeriod": "week"}),
        );
        let updates = pre_execute(&state, &t, 1).unwrap();
        assert_eq!(updates.0.len(), 2);
        match &updates.0[1] {
            Transition::UpdateTaskRepeatStartAt(p) => assert_eq!(p.repeat_start_at, 42),
            other => panic!("expected UpdateTaskRepeatStartAt, got {other:?}"),
        }
    }

    #[test]
    fn delete_category_fails_when_referenced() {
        let mut state = State::new();
        state.categories.insert(
            "c1".into(),
            taskchain_primitives::task::Category { id: "c1".into(), ..Default::default() },
        );
        let mut t = Task { id: "a".into(), ..Default::default() };
        t.categories.insert("c1".into(), true);
        state.tasks.insert("a".into(), t);
        let tx = tx(tx::DELETE_CATEGORY, serde_json::json!({"cid": "c1"}));
        assert!(matches!(pre_execute(&state, &tx, 1), Err(PreExecuteError::StateMismatch(_))));
    }

    #[test]
    fn delete_category_succeeds_when_unreferenced() {
        let mut state = State::new();
        state.categories.insert(
            "c1".into(),
            taskchain_primitives::task::Category { id: "c1".into(), ..Default::default() },
        );
        let t = tx(tx::DELETE_CATEGORY, serde_json::json!({"cid": "c1"}));
        let updates = pre_execute(&state, &t, 1).unwrap();
        assert_eq!(updates.0, vec![Transition::DeleteCategory(DeleteCategoryParams { cid: "c1".into() })]);
    }
}
