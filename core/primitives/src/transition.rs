use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Numeric operation codes, matching the original wire format exactly so
/// stored blocks stay byte-compatible across the rewrite.
pub mod op {
    pub const DELETE_ALL: i64 = 0;

    pub const CREATE_TASK: i64 = 100;
    pub const DELETE_TASK: i64 = 101;
    pub const UPDATE_TASK_NEXT: i64 = 102;
    pub const UPDATE_TASK_TITLE: i64 = 103;
    pub const UPDATE_TASK_DUE_DATE: i64 = 104;
    pub const UPDATE_TASK_MEMO: i64 = 105;
    pub const UPDATE_TASK_DONE: i64 = 106;
    pub const UPDATE_TASK_DONE_AT: i64 = 107;
    pub const UPDATE_TASK_REPEAT_PERIOD: i64 = 108;
    pub const UPDATE_TASK_REPEAT_START_AT: i64 = 109;

    pub const CREATE_TASK_CATEGORY: i64 = 200;
    pub const DELETE_TASK_CATEGORY: i64 = 201;

    pub const CREATE_SUBTASK: i64 = 300;
    pub const DELETE_SUBTASK: i64 = 301;
    pub const UPDATE_SUBTASK_TITLE: i64 = 302;
    pub const UPDATE_SUBTASK_DUE_DATE: i64 = 303;
    pub const UPDATE_SUBTASK_DONE: i64 = 304;
    pub const UPDATE_SUBTASK_DONE_AT: i64 = 305;

    pub const CREATE_CATEGORY: i64 = 400;
    pub const DELETE_CATEGORY: i64 = 401;
    pub const UPDATE_CATEGORY_COLOR: i64 = 402;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskParams {
    pub tid: String,
    pub title: String,
    pub created_at: i64,
    pub done_at: i64,
    pub memo: String,
    pub done: bool,
    pub due_date: i64,
    pub repeat_period: String,
    pub repeat_start_at: i64,
    pub categories: std::collections::BTreeMap<String, bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTaskParams {
    pub tid: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskNextParams {
    pub tid: String,
    pub next: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskTitleParams {
    pub tid: String,
    pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskDueDateParams {
    pub tid: String,
    pub due_date: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskMemoParams {
    pub tid: String,
    pub memo: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskDoneParams {
    pub tid: String,
    pub done: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskDoneAtParams {
    pub tid: String,
    pub done_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRepeatPeriodParams {
    pub tid: String,
    pub repeat_period: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRepeatStartAtParams {
    pub tid: String,
    pub repeat_start_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskCategoryParams {
    pub tid: String,
    pub cid: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTaskCategoryParams {
    pub tid: String,
    pub cid: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubtaskParams {
    pub tid: String,
    pub sid: String,
    pub title: String,
    pub created_at: i64,
    pub due_date: i64,
    pub done: bool,
    pub done_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSubtaskParams {
    pub tid: String,
    pub sid: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubtaskTitleParams {
    pub tid: String,
    pub sid: String,
    pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubtaskDueDateParams {
    pub tid: String,
    pub sid: String,
    pub due_date: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubtaskDoneParams {
    pub tid: String,
    pub sid: String,
    pub done: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubtaskDoneAtParams {
    pub tid: String,
    pub sid: String,
    pub done_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryParams {
    pub cid: String,
    pub title: String,
    pub secret: bool,
    pub locked: bool,
    pub color: String,
    pub created_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCategoryParams {
    pub cid: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryColorParams {
    pub cid: String,
    pub color: String,
}

/// One deterministic edit to a [`crate::state::State`]. The wire form is
/// `{"operation": <code>, "params": {...}}`; since serde's adjacently
/// tagged enum support only matches string tags against variant names, the
/// numeric `operation` codes are dispatched by hand via [`RawTransition`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    DeleteAll,
    CreateTask(CreateTaskParams),
    DeleteTask(DeleteTaskParams),
    UpdateTaskNext(UpdateTaskNextParams),
    UpdateTaskTitle(UpdateTaskTitleParams),
    UpdateTaskDueDate(UpdateTaskDueDateParams),
    UpdateTaskMemo(UpdateTaskMemoParams),
    UpdateTaskDone(UpdateTaskDoneParams),
    UpdateTaskDoneAt(UpdateTaskDoneAtParams),
    UpdateTaskRepeatPeriod(UpdateTaskRepeatPeriodParams),
    UpdateTaskRepeatStartAt(UpdateTaskRepeatStartAtParams),
    CreateTaskCategory(CreateTaskCategoryParams),
    DeleteTaskCategory(DeleteTaskCategoryParams),
    CreateSubtask(CreateSubtaskParams),
    DeleteSubtask(DeleteSubtaskParams),
    UpdateSubtaskTitle(UpdateSubtaskTitleParams),
    UpdateSubtaskDueDate(UpdateSubtaskDueDateParams),
    UpdateSubtaskDone(UpdateSubtaskDoneParams),
    UpdateSubtaskDoneAt(UpdateSubtaskDoneAtParams),
    CreateCategory(CreateCategoryParams),
    DeleteCategory(DeleteCategoryParams),
    UpdateCategoryColor(UpdateCategoryColorParams),
}

impl Transition {
    pub fn operation(&self) -> i64 {
        match self {
            Transition::DeleteAll => op::DELETE_ALL,
            Transition::CreateTask(_) => op::CREATE_TASK,
            Transition::DeleteTask(_) => op::DELETE_TASK,
            Transition::UpdateTaskNext(_) => op::UPDATE_TASK_NEXT,
            Transition::UpdateTaskTitle(_) => op::UPDATE_TASK_TITLE,
            Transition::UpdateTaskDueDate(_) => op::UPDATE_TASK_DUE_DATE,
            Transition::UpdateTaskMemo(_) => op::UPDATE_TASK_MEMO,
            Transition::UpdateTaskDone(_) => op::UPDATE_TASK_DONE,
            Transition::UpdateTaskDoneAt(_) => op::UPDATE_TASK_DONE_AT,
            Transition::UpdateTaskRepeatPeriod(_) => op::UPDATE_TASK_REPEAT_PERIOD,
            Transition::UpdateTaskRepeatStartAt(_) => op::UPDATE_TASK_REPEAT_START_AT,
            Transition::CreateTaskCategory(_) => op::CREATE_TASK_CATEGORY,
            Transition::DeleteTaskCategory(_) => op::DELETE_TASK_CATEGORY,
            Transition::CreateSubtask(_) => op::CREATE_SUBTASK,
            Transition::DeleteSubtask(_) => op::DELETE_SUBTASK,
            Transition::UpdateSubtaskTitle(_) => op::UPDATE_SUBTASK_TITLE,
            Transition::UpdateSubtaskDueDate(_) => op::UPDATE_SUBTASK_DUE_DATE,
            Transition::UpdateSubtaskDone(_) => op::UPDATE_SUBTASK_DONE,
            Transition::UpdateSubtaskDoneAt(_) => op::UPDATE_SUBTASK_DONE_AT,
            Transition::CreateCategory(_) => op::CREATE_CATEGORY,
            Transition::DeleteCategory(_) => op::DELETE_CATEGORY,
            Transition::UpdateCategoryColor(_) => op::UPDATE_CATEGORY_COLOR,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawTransition {
    operation: i64,
    params: serde_json::Value,
}

macro_rules! params_to_value {
    ($variant:expr) => {
        serde_json::to_value($variant).map_err(SerError::custom)?
    };
}

impl Serialize for Transition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let params = match self {
            Transition::DeleteAll => serde_json::Value::Object(Default::default()),
            Transition::CreateTask(p) => params_to_value!(p),
            Transition::DeleteTask(p) => params_to_value!(p),
            Transition::UpdateTaskNext(p) => params_to_value!(p),
            Transition::UpdateTaskTitle(p) => params_to_value!(p),
            Transition::UpdateTaskDueDate(p) => params_to_value!(p),
            Transition::UpdateTaskMemo(p) => params_to_value!(p),
            Transition::UpdateTaskDone(p) => params_to_value!(p),
            Transition::UpdateTaskDoneAt(p) => params_to_value!(p),
            Transition::UpdateTaskRepeatPeriod(p) => params_to_value!(p),
            Transition::UpdateTaskRepeatStartAt(p) => params_to_value!(p),
            Transition::CreateTaskCategory(p) => params_to_value!(p),
            Transition::DeleteTaskCategory(p) => params_to_value!(p),
            Transition::CreateSubtask(p) => params_to_value!(p),
            Transition::DeleteSubtask(p) => params_to_value!(p),
            Transition::UpdateSubtaskTitle(p) => params_to_value!(p),
            Transition::UpdateSubtaskDueDate(p) => params_to_value!(p),
            Transition::UpdateSubtaskDone(p) => params_to_value!(p),
            Transition::UpdateSubtaskDoneAt(p) => params_to_value!(p),
            Transition::CreateCategory(p) => params_to_value!(p),
            Transition::DeleteCategory(p) => params_to_value!(p),
            Transition::UpdateCategoryColor(p) => params_to_value!(p),
        };
        RawTransition { operation: self.operation(), params }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawTransition::deserialize(deserializer)?;
        fn parse<T: for<'a> Deserialize<'a>, E: DeError>(
            v: serde_json::Value,
        ) -> Result<T, E> {
            serde_json::from_value(v).map_err(E::custom)
        }
        Ok(match raw.operation {
            op::DELETE_ALL => Transition::DeleteAll,
            op::CREATE_TASK => Transition::CreateTask(parse(raw.params)?),
            op::DELETE_TASK => Transition::DeleteTask(parse(raw.params)?),
            op::UPDATE_TASK_NEXT => Transition::UpdateTaskNext(parse(raw.params)?),
            op::UPDATE_TASK_TITLE => Transition::UpdateTaskTitle(parse(raw.params)?),
            op::UPDATE_TASK_DUE_DATE => Transition::UpdateTaskDueDate(parse(raw.params)?),
            op::UPDATE_TASK_MEMO => Transition::UpdateTaskMemo(parse(raw.params)?),
            op::UPDATE_TASK_DONE => Transition::UpdateTaskDone(parse(raw.params)?),
            op::UPDATE_TASK_DONE_AT => Transition::UpdateTaskDoneAt(parse(raw.params)?),
            op::UPDATE_TASK_REPEAT_PERIOD => {
                Transition::UpdateTaskRepeatPeriod(parse(raw.params)?)
            }
            op::UPDATE_TASK_REPEAT_START_AT => {
                Transition::UpdateTaskRepeatStartAt(parse(raw.params)?)
            }
            op::CREATE_TASK_CATEGORY => Transition::CreateTaskCategory(parse(raw.params)?),
            op::DELETE_TASK_CATEGORY => Transition::DeleteTaskCategory(parse(raw.params)?),
            op::CREATE_SUBTASK => Transition::CreateSubtask(parse(raw.params)?),
            op::DELETE_SUBTASK => Transition::DeleteSubtask(parse(raw.params)?),
            op::UPDATE_SUBTASK_TITLE => Transition::UpdateSubtaskTitle(parse(raw.params)?),
            op::UPDATE_SUBTASK_DUE_DATE => Transition::UpdateSubtaskDueDate(parse(raw.params)?),
            op::UPDATE_SUBTASK_DONE => Transition::UpdateSubtaskDone(parse(raw.params)?),
            op::UPDATE_SUBTASK_DONE_AT => Transition::UpdateSubtaskDoneAt(parse(raw.params)?),
            op::CREATE_CATEGORY => Transition::CreateCategory(parse(raw.params)?),
            op::DELETE_CATEGORY => Transition::DeleteCategory(parse(raw.params)?),
            op::UPDATE_CATEGORY_COLOR => Transition::UpdateCategoryColor(parse(raw.params)?),
            other => {
                return Err(DeError::custom(format!("unknown transition operation {other}")))
            }
        })
    }
}

/// A bare ordered edit list, as produced by `apply_all`'s input. The wire
/// concept that pairs this with its source transaction is
/// [`crate::block::BlockUpdates`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Updates(pub Vec<Transition>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_all_round_trips_with_empty_params() {
        let json = serde_json::to_string(&Transition::DeleteAll).unwrap();
        assert_eq!(json, r#"{"operation":0,"params":{}}"#);
        let back: Transition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Transition::DeleteAll);
    }

    #[test]
    fn create_task_round_trips_with_numeric_operation() {
        let t = Transition::CreateTask(CreateTaskParams {
            tid: "t1".into(),
            title: "buy milk".into(),
            created_at: 100,
            ..Default::default()
        });
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["operation"], 100);
        assert_eq!(json["params"]["tid"], "t1");
        let back: Transition = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn unknown_operation_fails_to_parse() {
        let json = serde_json::json!({"operation": 9999, "params": {}});
        let result: Result<Transition, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }
}
