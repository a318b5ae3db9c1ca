//! The user-facing, pre-persistence job description (C1 input) and forest
//! construction (C2).
//!
//! Jobs are transient: they exist only during pool construction and are
//! consumed by [`crate::dispatch::Dispatcher::initialize_new_job_pool`],
//! which compiles each one into a [`crate::task::Task`] and discards it.

mod forest;

pub use forest::build_forest;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DispatcherError, Result};
use crate::priority::Priority;
use crate::task::{Task, TaskArgs, TaskId, TaskStatus, TaskType};

/// Opaque, in-memory-only handle used to wire up dependencies before any
/// job has a store-assigned [`TaskId`]. Donor precedent: `GraphBuilder`
/// resolves string node ids into `petgraph::NodeIndex` handles; here the
/// handle is a `Uuid` so independently constructed jobs can reference each
/// other without a shared builder holding string labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(Uuid);

impl JobHandle {
    fn new() -> Self {
        JobHandle(Uuid::new_v4())
    }

    #[cfg(test)]
    pub(crate) fn new_for_test() -> Self {
        JobHandle(Uuid::new_v4())
    }
}

/// The four user-constructible job kinds. `respawn` carries no payload;
/// `sleep` and `die` are synthetic and never appear here (spec §3).
#[derive(Debug, Clone)]
pub enum JobKind {
    RunScript {
        script: String,
        ncpu_fmt: String,
        cmd_line_args: HashMap<String, serde_json::Value>,
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
    Respawn,
}

impl JobKind {
    fn task_type(&self) -> TaskType {
        match self {
            JobKind::RunScript { .. } => TaskType::RunScript,
            JobKind::Copy { .. } => TaskType::Copy,
            JobKind::Spawn { .. } => TaskType::Spawn,
            JobKind::Respawn => TaskType::Respawn,
        }
    }

    fn into_task_args(self) -> TaskArgs {
        match self {
            JobKind::RunScript {
                script,
                ncpu_fmt,
                cmd_line_args,
            } => TaskArgs::RunScript {
                script,
                ncpu_fmt,
                cmd_line_args,
            },
            JobKind::Copy { src, dest } => TaskArgs::Copy { src, dest },
            JobKind::Spawn {
                taxi_name,
                taxi_dir,
                taxi_nodes,
                taxi_time,
            } => TaskArgs::Spawn {
                taxi_name,
                taxi_dir,
                taxi_nodes,
                taxi_time,
            },
            JobKind::Respawn => TaskArgs::Empty,
        }
    }
}

/// The pre-persistence description of one unit of work (spec §3 "Job").
#[derive(Debug, Clone)]
pub struct Job {
    handle: JobHandle,
    kind: JobKind,
    depends_on: Vec<JobHandle>,
    trunk: bool,
    priority: Priority,
    req_time: u64,
    is_recurring: bool,
    for_taxi: Option<String>,
    status: TaskStatus,
}

impl Job {
    /// Start building a job of the given kind. Defaults: no dependencies,
    /// not a trunk, `priority = -1` (unset), `req_time = 0`, not recurring,
    /// claimable by any taxi, status `pending`.
    pub fn new(kind: JobKind) -> Self {
        Self {
            handle: JobHandle::new(),
            kind,
            depends_on: Vec::new(),
            trunk: false,
            priority: Priority::UNSET,
            req_time: 0,
            is_recurring: false,
            for_taxi: None,
            status: TaskStatus::Pending,
        }
    }

    /// The handle other jobs use to declare a dependency on this one.
    pub fn handle(&self) -> JobHandle {
        self.handle
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = JobHandle>) -> Self {
        self.depends_on = deps.into_iter().collect();
        self
    }

    /// Mark this job as lying on a stream's main path; forks in the forest
    /// happen at trunk jobs (spec §4.2).
    pub fn trunk(mut self, trunk: bool) -> Self {
        self.trunk = trunk;
        self
    }

    /// Set a user priority. Positive values are never overwritten by
    /// auto-assignment (spec §4.3).
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn req_time(mut self, seconds: u64) -> Self {
        self.req_time = seconds;
        self
    }

    pub fn recurring(mut self, is_recurring: bool) -> Self {
        self.is_recurring = is_recurring;
        self
    }

    /// Restrict this job to only ever be claimed by the named taxi.
    pub fn for_taxi(mut self, taxi_name: impl Into<String>) -> Self {
        self.for_taxi = Some(taxi_name.into());
        self
    }

    pub(crate) fn current_priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub(crate) fn is_trunk(&self) -> bool {
        self.trunk
    }

    pub(crate) fn depends_on_handles(&self) -> &[JobHandle] {
        &self.depends_on
    }

    /// Translate this job into its persisted [`Task`] shape (C1), given the
    /// id assigned to it and a map from every job's handle to its assigned
    /// id (spec §4.1).
    pub fn compile(self, id: TaskId, id_of: &HashMap<JobHandle, TaskId>) -> Result<Task> {
        if !id_of.contains_key(&self.handle) {
            return Err(DispatcherError::CompilationPrecondition(self.handle));
        }

        let mut depends_on = Vec::with_capacity(self.depends_on.len());
        for dep_handle in &self.depends_on {
            match id_of.get(dep_handle) {
                Some(dep_id) => depends_on.push(*dep_id),
                None => {
                    return Err(DispatcherError::DanglingDependency(self.handle, *dep_handle))
                }
            }
        }

        let task_type = self.kind.task_type();
        let task_args = self.kind.into_task_args().into_value();

        Ok(Task {
            id,
            task_type,
            task_args,
            depends_on,
            status: self.status,
            for_taxi: self.for_taxi,
            by_taxi: None,
            is_recurring: self.is_recurring,
            req_time: self.req_time,
            start_time: None,
            run_time: None,
            priority: self.priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let job = Job::new(JobKind::Respawn);
        assert_eq!(job.priority, Priority::UNSET);
        assert!(!job.trunk);
        assert!(job.depends_on.is_empty());
        assert!(!job.is_recurring);
    }

    #[test]
    fn compile_rejects_dangling_dependency() {
        let parent = Job::new(JobKind::Respawn);
        let parent_handle = parent.handle();
        let child = Job::new(JobKind::Respawn).depends_on([parent_handle]);
        let child_handle = child.handle();

        let mut id_of = HashMap::new();
        id_of.insert(child_handle, TaskId(2));
        // parent_handle deliberately omitted from id_of

        let err = child.compile(TaskId(2), &id_of).unwrap_err();
        assert!(matches!(err, DispatcherError::DanglingDependency(_, _)));
    }

    #[test]
    fn compile_rejects_missing_self_id() {
        let job = Job::new(JobKind::Respawn);
        let id_of = HashMap::new();
        let err = job.compile(TaskId(1), &id_of).unwrap_err();
        assert!(matches!(err, DispatcherError::CompilationPrecondition(_)));
    }

    #[test]
    fn compile_translates_dependency_handles_to_ids() {
        let parent = Job::new(JobKind::Respawn);
        let parent_handle = parent.handle();
        let child = Job::new(JobKind::Copy {
            src: "a".into(),
            dest: "b".into(),
        })
        .depends_on([parent_handle]);

        let mut id_of = HashMap::new();
        id_of.insert(parent_handle, TaskId(1));
        id_of.insert(child.handle(), TaskId(2));

        let task = child.compile(TaskId(2), &id_of).unwrap();
        assert_eq!(task.depends_on, vec![TaskId(1)]);
        assert_eq!(task.task_type, TaskType::Copy);
        assert_eq!(task.task_args["src"], "a");
    }
}
