//! The persisted task record (C1) and its companion types.
//!
//! A [`Task`] is the on-disk shape a [`crate::job::Job`] compiles into. The
//! dispatcher ferries `task_args` through the store without interpreting it;
//! only the producing [`crate::job::JobKind`] and the consuming taxi know its
//! shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::priority::Priority;

/// Dense, positive, store-unique task identifier.
///
/// `0` is never assigned to a real task; [`crate::store::TaskStore::get_max_id`]
/// returns it to mean "store is empty".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of task discriminators. `Sleep` and `Die` are synthetic
/// terminal signals produced only by the selection protocol (C5), never by
/// user jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    RunScript,
    Copy,
    Spawn,
    Respawn,
    Sleep,
    Die,
}

impl TaskType {
    /// Whether this type is a synthetic signal inserted by the dispatcher
    /// rather than compiled from a user [`crate::job::Job`].
    pub fn is_synthetic(&self) -> bool {
        matches!(self, TaskType::Sleep | TaskType::Die)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Active,
    Complete,
    Failed,
    Recurring,
}

/// The canonical, persisted shape of a unit of work.
///
/// `task_args` stays an opaque [`serde_json::Value`] by design (spec §3): the
/// dispatcher never branches on its contents, only stores and returns it.
/// Typed construction happens one layer up, in [`crate::job::JobKind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    pub task_args: Value,
    pub depends_on: Vec<TaskId>,
    pub status: TaskStatus,
    pub for_taxi: Option<String>,
    pub by_taxi: Option<String>,
    pub is_recurring: bool,
    pub req_time: u64,
    pub start_time: Option<f64>,
    pub run_time: Option<f64>,
    pub priority: Priority,
}

impl Task {
    /// Build the `die` pseudo-task the selection protocol inserts when a
    /// taxi's blob is entirely empty (spec §4.5 step 2).
    pub fn die(id: TaskId, by_taxi: Option<String>) -> Self {
        Self::terminal_signal(id, TaskType::Die, by_taxi)
    }

    /// Build the `sleep` pseudo-task the selection protocol inserts when
    /// tasks are pending but none are ready (spec §4.5 step 5).
    pub fn sleep(id: TaskId, by_taxi: Option<String>) -> Self {
        Self::terminal_signal(id, TaskType::Sleep, by_taxi)
    }

    fn terminal_signal(id: TaskId, task_type: TaskType, by_taxi: Option<String>) -> Self {
        Self {
            id,
            task_type,
            task_args: Value::Null,
            depends_on: Vec::new(),
            status: TaskStatus::Pending,
            for_taxi: None,
            by_taxi,
            is_recurring: false,
            req_time: 0,
            start_time: None,
            run_time: None,
            // Invariant: terminal pseudo-tasks always carry the highest priority.
            priority: Priority::HIGHEST,
        }
    }
}

/// Payload shapes carried by the four user-constructible job kinds (spec §6).
/// `respawn`, `sleep`, and `die` carry no arguments.
#[derive(Debug, Clone)]
pub enum TaskArgs {
    RunScript {
        script: String,
        ncpu_fmt: String,
        cmd_line_args: HashMap<String, Value>,
    },
    Copy {
        src: String,
        dest: String,
    },
    Spawn {
        taxi_name: String,
        taxi_dir: String,
        taxi_nodes: u32,
        taxi_time: u64,
    },
    Empty,
}

impl TaskArgs {
    /// Flatten into the opaque JSON value that ends up on [`Task::task_args`].
    pub fn into_value(self) -> Value {
        match self {
            TaskArgs::RunScript {
                script,
                ncpu_fmt,
                cmd_line_args,
            } => serde_json::json!({
                "script": script,
                "ncpu_fmt": ncpu_fmt,
                "cmd_line_args": cmd_line_args,
            }),
            TaskArgs::Copy { src, dest } => serde_json::json!({ "src": src, "dest": dest }),
            TaskArgs::Spawn {
                taxi_name,
                taxi_dir,
                taxi_nodes,
                taxi_time,
            } => serde_json::json!({
                "taxi_name": taxi_name,
                "taxi_dir": taxi_dir,
                "taxi_nodes": taxi_nodes,
                "taxi_time": taxi_time,
            }),
            TaskArgs::Empty => Value::Null,
        }
    }
}
