use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::task::{Category, CategoryId, Task, TaskId};

/// A user's full task/category snapshot. Field order is the canonical JSON
/// field order, so it must not change without accepting a hash fork.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub tasks: BTreeMap<TaskId, Task>,
    pub categories: BTreeMap<CategoryId, Category>,
}

/// The id of a task together with the id of its predecessor in the linear
/// ordering (`""` if it is the head).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Positioned<'a> {
    pub task: &'a Task,
    pub prev_id: TaskId,
}

impl State {
    pub fn new() -> Self {
        State::default()
    }

    /// Hash of the task set only; categories never affect the chain hash.
    pub fn hash(&self) -> Result<taskchain_hash::Hash, serde_json::Error> {
        taskchain_hash::hash_canonical(&self.tasks)
    }

    /// Checks every structural invariant of the state:
    /// - the `next` pointers among `tasks` form a single linear chain with no
    ///   cycles and exactly one head (when any tasks exist)
    /// - every task's `categories` keys exist in `self.categories`
    pub fn validate(&self) -> Result<(), StateError> {
        self.sort_tasks()?;
        for task in self.tasks.values() {
            for cid in task.categories.keys() {
                if !self.categories.contains_key(cid) {
                    return Err(StateError::InvariantBroken(format!(
                        "task {} references unknown category {}",
                        task.id, cid
                    )));
                }
            }
        }
        Ok(())
    }

    /// Walks the `next`-linked list of tasks from its single head and
    /// returns each task paired with its predecessor id, in list order.
    ///
    /// Used both to validate the linear-ordering invariant and to serve
    /// ordered task listings to clients.
    pub fn sort_tasks(&self) -> Result<Vec<Positioned<'_>>, StateError> {
        if self.tasks.is_empty() {
            return Ok(Vec::new());
        }

        let mut has_predecessor: BTreeSet<&str> = BTreeSet::new();
        for task in self.tasks.values() {
            if !task.next.is_empty() {
                if !self.tasks.contains_key(&task.next) {
                    return Err(StateError::InvariantBroken(format!(
                        "task {} points to missing next task {}",
                        task.id, task.next
                    )));
                }
                if !has_predecessor.insert(task.next.as_str()) {
                    return Err(StateError::InvariantBroken(format!(
                        "task {} has more than one predecessor",
                        task.next
                    )));
                }
            }
        }

        let heads: Vec<&TaskId> = self
            .tasks
            .keys()
            .filter(|id| !has_predecessor.contains(id.as_str()))
            .collect();
        if heads.len() != 1 {
            return Err(StateError::InvariantBroken(format!(
                "expected exactly one task list head, found {}",
                heads.len()
            )));
        }

        let mut ordered = Vec::with_capacity(self.tasks.len());
        let mut prev_id = TaskId::new();
        let mut current = heads[0].clone();
        let mut visited = BTreeSet::new();
        loop {
            if !visited.insert(current.clone()) {
                return Err(StateError::InvariantBroken(format!(
                    "cycle detected in task list at {current}"
                )));
            }
            let task = self
                .tasks
                .get(&current)
                .ok_or_else(|| StateError::TaskNotFound(current.clone()))?;
            ordered.push(Positioned { task, prev_id: prev_id.clone() });
            prev_id = current.clone();
            if task.next.is_empty() {
                break;
            }
            current = task.next.clone();
        }

        if ordered.len() != self.tasks.len() {
            return Err(StateError::InvariantBroken(format!(
                "task list visits {} of {} tasks",
                ordered.len(),
                self.tasks.len()
            )));
        }

        Ok(ordered)
    }
}
