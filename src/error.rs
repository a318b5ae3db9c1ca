//! Error taxonomy for the dispatcher subsystem.

use thiserror::Error;

use crate::job::JobHandle;
use crate::task::TaskId;

/// Result type used throughout the dispatcher.
pub type Result<T> = std::result::Result<T, DispatcherError>;

/// Errors raised by forest construction, priority assignment, the task
/// store, and the selection/completion protocols.
#[derive(Error, Debug)]
pub enum DispatcherError {
    /// A task's status changed between selection and claim; the caller
    /// should retry selection or fall through to a `sleep` pseudo-task.
    #[error("task {0:?} claim contention: status changed before the claim could complete")]
    ClaimContention(TaskId),

    /// The backing store is unreachable, corrupt, or rejected a write.
    /// The original cause is attached via `#[source]`.
    #[error("task store I/O error")]
    StoreIo(#[source] anyhow::Error),

    /// A job was compiled before it was assigned an id.
    #[error("job {0:?} was compiled before it was assigned an id")]
    CompilationPrecondition(JobHandle),

    /// A job depends on a handle that is not present in the same pool.
    #[error("job {0:?} depends on {1:?}, which is not present in the job pool")]
    DanglingDependency(JobHandle, JobHandle),

    /// The dependency graph contains a cycle.
    #[error("cyclic dependency detected among jobs in the pool")]
    CyclicDependency,

    /// A job's dependency chain never reaches a root reachable by the
    /// forest-construction walk.
    #[error("job {0:?} is not reachable from any root in the dependency forest")]
    OrphanJob(JobHandle),

    /// `initialize_new_job_pool` was called with an unrecognized or
    /// not-yet-implemented priority policy name.
    #[error("unsupported priority assignment policy: {0}")]
    UnsupportedPolicy(String),

    /// A taxi identifier was neither a `Taxi` nor a taxi name string.
    #[error("{0} is not a valid taxi identifier (neither a Taxi nor a taxi name)")]
    TypeMismatch(String),
}

impl From<sqlx::Error> for DispatcherError {
    fn from(err: sqlx::Error) -> Self {
        DispatcherError::StoreIo(err.into())
    }
}
