//! Applies a single [`Transition`] to a [`State`] in place.
//!
//! Every function here is a pure, deterministic mutation: given the same
//! state and the same transition, the result is always identical. This layer
//! never decides anything — it does not check whether a category is locked,
//! still referenced, or whether a splice is legal. Those decisions are made
//! once, up front, by `taskchain-transactions`, which expands a client
//! transaction into the exact transition sequence that performs them. A
//! missing target here is always a sign that the upstream decision was wrong
//! (or state was corrupted), never something this layer should work around.

use taskchain_primitives::task::{Category, Subtask, Task};
use taskchain_primitives::transition::*;
use taskchain_primitives::{State, Transition};

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("task {0} not found")]
    TaskNotFound(String),
    #[error("subtask {1} not found on task {0}")]
    SubtaskNotFound(String, String),
    #[error("category {0} not found")]
    CategoryNotFound(String),
}

pub fn apply(state: &mut State, transition: &Transition) -> Result<(), ApplyError> {
    match transition {
        Transition::DeleteAll => delete_all(state),
        Transition::CreateTask(p) => create_task(state, p),
        Transition::DeleteTask(p) => delete_task(state, p),
        Transition::UpdateTaskNext(p) => with_task(state, &p.tid, |t| t.next = p.next.clone()),
        Transition::UpdateTaskTitle(p) => with_task(state, &p.tid, |t| t.title = p.title.clone()),
        Transition::UpdateTaskDueDate(p) => with_task(state, &p.tid, |t| t.due_date = p.due_date),
        Transition::UpdateTaskMemo(p) => with_task(state, &p.tid, |t| t.memo = p.memo.clone()),
        Transition::UpdateTaskDone(p) => with_task(state, &p.tid, |t| t.done = p.done),
        Transition::UpdateTaskDoneAt(p) => with_task(state, &p.tid, |t| t.done_at = p.done_at),
        Transition::UpdateTaskRepeatPeriod(p) => {
            with_task(state, &p.tid, |t| t.repeat_period = p.repeat_period.clone())
        }
        Transition::UpdateTaskRepeatStartAt(p) => {
            with_task(state, &p.tid, |t| t.repeat_start_at = p.repeat_start_at)
        }
        Transition::CreateTaskCategory(p) => {
            with_task(state, &p.tid, |t| {
                t.categories.insert(p.cid.clone(), true);
            })
        }
        Transition::DeleteTaskCategory(p) => {
            with_task(state, &p.tid, |t| {
                t.categories.remove(&p.cid);
            })
        }
        Transition::CreateSubtask(p) => create_subtask(state, p),
        Transition::DeleteSubtask(p) => delete_subtask(state, p),
        Transition::UpdateSubtaskTitle(p) => {
            with_subtask(state, &p.tid, &p.sid, |s| s.title = p.title.clone())
        }
        Transition::UpdateSubtaskDueDate(p) => {
            with_subtask(state, &p.tid, &p.sid, |s| s.due_date = p.due_date)
        }
        Transition::UpdateSubtaskDone(p) => {
            with_subtask(state, &p.tid, &p.sid, |s| s.done = p.done)
        }
        Transition::UpdateSubtaskDoneAt(p) => {
            with_subtask(state, &p.tid, &p.sid, |s| s.done_at = p.done_at)
        }
        Transition::CreateCategory(p) => create_category(state, p),
        Transition::DeleteCategory(p) => delete_category(state, p),
        Transition::UpdateCategoryColor(p) => {
            with_category(state, &p.cid, |c| c.color = p.color.clone())
        }
    }
}

pub fn apply_all(state: &mut State, updates: &Updates) -> Result<(), ApplyError> {
    for transition in &updates.0 {
        apply(state, transition)?;
    }
    Ok(())
}

fn delete_all(state: &mut State) -> Result<(), ApplyError> {
    state.tasks.clear();
    state.categories.clear();
    Ok(())
}

fn with_task(state: &mut State, tid: &str, f: impl FnOnce(&mut Task)) -> Result<(), ApplyError> {
    let task = state.tasks.get_mut(tid).ok_or_else(|| ApplyError::TaskNotFound(tid.to_string()))?;
    f(task);
    Ok(())
}

fn with_subtask(
    state: &mut State,
    tid: &str,
    sid: &str,
    f: impl FnOnce(&mut Subtask),
) -> Result<(), ApplyError> {
    let task = state.tasks.get_mut(tid).ok_or_else(|| ApplyError::TaskNotFound(tid.to_string()))?;
    let subtask = task
        .subtasks
        .get_mut(sid)
        .ok_or_else(|| ApplyError::SubtaskNotFound(tid.to_string(), sid.to_string()))?;
    f(subtask);
    Ok(())
}

fn with_category(
    state: &mut State,
    cid: &str,
    f: impl FnOnce(&mut Category),
) -> Result<(), ApplyError> {
    let category =
        state.categories.get_mut(cid).ok_or_else(|| ApplyError::CategoryNotFound(cid.to_string()))?;
    f(category);
    Ok(())
}

/// Inserts a task with the given scalar fields and categories set.
/// `next` always starts empty: linking into the list is a separate
/// `UpdateTaskNext` transition emitted alongside this one.
fn create_task(state: &mut State, p: &CreateTaskParams) -> Result<(), ApplyError> {
    let task = Task {
        id: p.tid.clone(),
        title: p.title.clone(),
        created_at: p.created_at,
        done_at: p.done_at,
        memo: p.memo.clone(),
        done: p.done,
        due_date: p.due_date,
        repeat_period: p.repeat_period.clone(),
        repeat_start_at: p.repeat_start_at,
        next: String::new(),
        subtasks: Default::default(),
        categories: p.categories.clone(),
    };
    state.tasks.insert(p.tid.clone(), task);
    Ok(())
}

fn delete_task(state: &mut State, p: &DeleteTaskParams) -> Result<(), ApplyError> {
    state.tasks.remove(&p.tid).ok_or_else(|| ApplyError::TaskNotFound(p.tid.clone()))?;
    Ok(())
}

fn create_subtask(state: &mut State, p: &CreateSubtaskParams) -> Result<(), ApplyError> {
    let task = state.tasks.get_mut(&p.tid).ok_or_else(|| ApplyError::TaskNotFound(p.tid.clone()))?;
    task.subtasks.insert(
        p.sid.clone(),
        Subtask {
            id: p.sid.clone(),
            title: p.title.clone(),
            created_at: p.created_at,
            due_date: p.due_date,
            done: p.done,
            done_at: p.done_at,
        },
    );
    Ok(())
}

fn delete_subtask(state: &mut State, p: &DeleteSubtaskParams) -> Result<(), ApplyError> {
    let task = state.tasks.get_mut(&p.tid).ok_or_else(|| ApplyError::TaskNotFound(p.tid.clone()))?;
    task.subtasks
        .remove(&p.sid)
        .ok_or_else(|| ApplyError::SubtaskNotFound(p.tid.clone(), p.sid.clone()))?;
    Ok(())
}

fn create_category(state: &mut State, p: &CreateCategoryParams) -> Result<(), ApplyError> {
    state.categories.insert(
        p.cid.clone(),
        Category {
            id: p.cid.clone(),
            title: p.title.clone(),
            secret: p.secret,
            locked: p.locked,
            color: p.color.clone(),
            created_at: p.created_at,
        },
    );
    Ok(())
}

fn delete_category(state: &mut State, p: &DeleteCategoryParams) -> Result<(), ApplyError> {
    state.categories.remove(&p.cid).ok_or_else(|| ApplyError::CategoryNotFound(p.cid.clone()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, next: &str) -> Task {
        Task { id: id.to_string(), next: next.to_string(), ..Task::default() }
    }

    #[test]
    fn create_task_inserts_with_empty_next() {
        let mut state = State::new();
        apply(
            &mut state,
            &Transition::CreateTask(CreateTaskParams {
                tid: "a".into(),
                title: "new".into(),
                created_at: 1,
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!(state.tasks["a"].next, "");
    }

    #[test]
    fn create_task_carries_categories_set() {
        let mut state = State::new();
        let mut categories = std::collections::BTreeMap::new();
        categories.insert("c1".to_string(), true);
        apply(
            &mut state,
            &Transition::CreateTask(CreateTaskParams {
                tid: "a".into(),
                title: "new".into(),
                created_at: 1,
                categories,
                ..Default::default()
            }),
        )
        .unwrap();
        assert!(state.tasks["a"].categories.contains_key("c1"));
    }

    #[test]
    fn delete_task_removes_without_relinking() {
        let mut state = State::new();
        state.tasks.insert("a".into(), task("a", "b"));
        state.tasks.insert("b".into(), task("b", "c"));
        state.tasks.insert("c".into(), task("c", ""));
        apply(&mut state, &Transition::DeleteTask(DeleteTaskParams { tid: "b".into() })).unwrap();
        assert!(!state.tasks.contains_key("b"));
        assert_eq!(state.tasks["a"].next, "b", "apply never rewrites other tasks' next pointers");
    }

    #[test]
    fn delete_missing_task_fails() {
        let mut state = State::new();
        let err =
            apply(&mut state, &Transition::DeleteTask(DeleteTaskParams { tid: "missing".into() }))
                .unwrap_err();
        assert!(matches!(err, ApplyError::TaskNotFound(_)));
    }

    #[test]
    fn update_task_next_sets_field_only() {
        let mut state = State::new();
        state.tasks.insert("a".into(), task("a", "b"));
        apply(
            &mut state,
            &Transition::UpdateTaskNext(UpdateTaskNextParams { tid: "a".into(), next: "".into() }),
        )
        .unwrap();
        assert_eq!(state.tasks["a"].next, "");
    }

    #[test]
    fn delete_category_does_not_check_references() {
        let mut state = State::new();
        state.categories.insert(
            "c1".into(),
            Category { id: "c1".into(), ..Category::default() },
        );
        let mut t = task("a", "");
        t.categories.insert("c1".into(), true);
        state.tasks.insert("a".into(), t);
        apply(&mut state, &Transition::DeleteCategory(DeleteCategoryParams { cid: "c1".into() }))
            .unwrap();
        assert!(!state.categories.contains_key("c1"));
        assert!(state.tasks["a"].categories.contains_key("c1"), "apply leaves the dangling reference; validation catches it");
    }

    #[test]
    fn create_subtask_then_delete() {
        let mut state = State::new();
        state.tasks.insert("a".into(), task("a", ""));
        apply(
            &mut state,
            &Transition::CreateSubtask(CreateSubtaskParams {
                tid: "a".into(),
                sid: "s1".into(),
                title: "sub".into(),
                created_at: 1,
                ..Default::default()
            }),
        )
        .unwrap();
        assert!(state.tasks["a"].subtasks.contains_key("s1"));
        apply(
            &mut state,
            &Transition::DeleteSubtask(DeleteSubtaskParams { tid: "a".into(), sid: "s1".into() }),
        )
        .unwrap();
        assert!(!state.tasks["a"].subtasks.contains_key("s1"));
    }

    #[test]
    fn apply_all_runs_transitions_in_order() {
        let mut state = State::new();
        let updates = Updates(vec![
            Transition::CreateCategory(CreateCategoryParams {
                cid: "c1".into(),
                title: "Work".into(),
                ..Default::default()
            }),
            Transition::CreateTask(CreateTaskParams {
                tid: "t1".into(),
                title: "A".into(),
                ..Default::default()
            }),
        ]);
        apply_all(&mut state, &updates).unwrap();
        assert!(state.categories.contains_key("c1"));
        assert!(state.tasks.contains_key("t1"));
    }
}
